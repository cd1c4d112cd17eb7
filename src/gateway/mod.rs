//! Thin HTTP front door over the dispatch core
//! 分发核心之上的轻量HTTP入口

pub mod http_gateway;
pub mod types;

pub use http_gateway::HttpGateway;

#[cfg(test)]
mod http_gateway_test;
