//! infer-router: inference request dispatch and backend protocol adaptation
//! infer-router：推理请求分发与后端协议适配

// Shared modules / 共享模块
pub mod config;

// Dispatch core / 分发核心
pub mod router;

// HTTP front door / HTTP入口
pub mod gateway;

// Re-exports / 重新导出
pub use config::{RouterConfig, WorkerConfig};
pub use router::dispatch::Dispatcher;
pub use router::error::DispatchError;
pub use router::ir::{ConversationTurn, NormalizedRequest, NormalizedResponse, Role};
