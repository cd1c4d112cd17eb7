//! Dispatch core: worker registry, capability discovery, backend adapters,
//! round-robin selection and the dispatch orchestrator.

pub mod adapter;
pub mod capability;
pub mod dispatch;
pub mod error;
pub mod ir;
pub mod metrics;
pub mod registry;
pub mod selector;

pub use dispatch::Dispatcher;
pub use error::{AdapterError, DiscoveryError, DispatchError};
pub use self::metrics::RouterMetrics;
pub use registry::{BackendKind, WorkerDescriptor, WorkerRegistry};
