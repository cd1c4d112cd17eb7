use std::sync::atomic::{AtomicU64, Ordering};

use crate::router::error::DispatchError;
use crate::router::registry::WorkerDescriptor;

/// Pure round-robin pick: `workers[cursor mod N]` and the next cursor value.
pub fn pick(
    workers: &[WorkerDescriptor],
    cursor: u64,
) -> Result<(&WorkerDescriptor, u64), DispatchError> {
    if workers.is_empty() {
        return Err(DispatchError::NoWorkersAvailable);
    }
    let idx = (cursor % workers.len() as u64) as usize;
    Ok((&workers[idx], cursor.wrapping_add(1)))
}

/// Process-wide round-robin position. Each `advance` hands out a distinct
/// pre-increment value, so concurrent dispatches never share a ticket.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    next: AtomicU64,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
