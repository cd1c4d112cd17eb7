//! Router command line arguments / 路由器命令行参数

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::RouterConfig;

/// Router command line arguments / 路由器命令行参数
#[derive(Parser, Debug, Clone)]
#[command(
    name = "infer-router",
    version = "0.1.0",
    about = "Inference request router for heterogeneous model-serving backends\n面向异构模型服务后端的推理请求路由器"
)]
pub struct CliArgs {
    /// Configuration file path / 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path / 配置文件路径"
    )]
    pub config: Option<String>,

    /// HTTP front door address / HTTP入口地址
    #[arg(
        long,
        value_name = "ADDR",
        help = "HTTP listen address (e.g., 0.0.0.0:8000) / HTTP监听地址"
    )]
    pub http_addr: Option<String>,

    /// Log level / 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level (trace, debug, info, warn, error) / 日志级别"
    )]
    pub log_level: Option<String>,

    /// Bearer key required on /v1/chat/completions / /v1/chat/completions所需的Bearer密钥
    #[arg(long, value_name = "KEY", env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl CliArgs {
    /// Apply CLI overrides (highest precedence) / 应用CLI覆盖（最高优先级）
    pub fn apply_to(&self, config: &mut RouterConfig) -> Result<()> {
        if let Some(addr) = self.http_addr.as_deref() {
            config.http.addr = addr
                .parse()
                .with_context(|| format!("invalid --http-addr: {}", addr))?;
        }
        if let Some(level) = self.log_level.as_ref().filter(|s| !s.trim().is_empty()) {
            config.logging.level = level.clone();
        }
        if let Some(key) = self.api_key.as_ref().filter(|s| !s.trim().is_empty()) {
            config.gateway.api_key = Some(key.trim().to_string());
        }
        Ok(())
    }
}
