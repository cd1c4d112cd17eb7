//! infer-router main entry point
//! infer-router 主入口点

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use infer_router::config::{init_tracing, CliArgs, RouterConfig};
use infer_router::gateway::HttpGateway;
use infer_router::router::metrics::install_prometheus;
use infer_router::router::{Dispatcher, WorkerRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = RouterConfig::load(&args)?;

    init_tracing(&config.logging.to_logging_config())?;
    let metrics = install_prometheus().context("install metrics recorder")?;

    let registry = Arc::new(
        WorkerRegistry::from_config(&config.workers).context("build worker registry")?,
    );

    tracing::info!("Router starting with:");
    tracing::info!("  - HTTP front door on: {}", config.http.addr);
    tracing::info!("  - Workers: {}", registry.len());
    for w in registry.list() {
        tracing::info!(
            "    [{}] {} at {} (endpoint: {})",
            w.id,
            w.kind,
            w.base_url,
            w.endpoint_path().as_deref().unwrap_or("<discovered>")
        );
    }
    tracing::info!(
        "  - Deadlines: discovery {}ms, generation {}ms",
        config.dispatch.discovery_timeout_ms,
        config.dispatch.generation_timeout_ms
    );

    let dispatcher = Arc::new(Dispatcher::new(registry, &config.dispatch));

    if config.dispatch.warm_up_on_start {
        let resolved = dispatcher.warm_up().await;
        tracing::info!(resolved, "Schema-discovered workers warmed up");
    }

    let config = Arc::new(config);
    let gateway = HttpGateway::new(config, dispatcher).with_metrics(metrics);
    gateway
        .start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Router shutting down");
        })
        .await?;

    tracing::info!("Router shutdown complete");
    Ok(())
}
