//! Configuration management for the inference router
//! 推理路由器的配置管理
//!
//! Configuration is layered with the following precedence (highest first):
//! 配置按以下优先级分层（从高到低）：
//! 1. Command line arguments / 命令行参数
//! 2. Environment variables (`INFER_ROUTER_`, `__` nesting) / 环境变量
//! 3. Configuration file (TOML) / 配置文件（TOML）
//! 4. Default values / 默认值
//!
//! The worker list is read exactly once at startup and never re-read.
//! worker列表只在启动时读取一次，之后不再重新读取。

use anyhow::{anyhow, bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

pub mod base;
pub mod cli;

pub use base::*;
pub use cli::CliArgs;

use crate::router::registry::BackendKind;

/// Environment variable prefix / 环境变量前缀
pub const ENV_PREFIX: &str = "INFER_ROUTER_";

/// Default configuration file looked up in the working directory
/// 在工作目录中查找的默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Top-level router configuration / 路由器顶层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// HTTP front door settings / HTTP入口设置
    pub http: ServerConfig,
    /// Logging settings / 日志设置
    pub logging: LogConfig,
    /// Dispatch deadlines / 分发超时设置
    pub dispatch: DispatchConfig,
    /// Front door auth and naming / 入口鉴权与命名
    pub gateway: GatewayConfig,
    /// Ordered backend workers / 有序的后端worker列表
    pub workers: Vec<WorkerConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            http: ServerConfig::default(),
            logging: LogConfig::default(),
            dispatch: DispatchConfig::default(),
            gateway: GatewayConfig::default(),
            workers: vec![
                WorkerConfig {
                    base_url: "http://vllm-worker-service.llm.svc.cluster.local:8002".to_string(),
                    kind: BackendKind::CompletionWrap,
                    endpoint_path: Some("/v1/completions".to_string()),
                    model: Some("qwen2.5-0.5b".to_string()),
                },
                WorkerConfig {
                    base_url: "http://trt-worker-service.llm.svc.cluster.local:8003".to_string(),
                    kind: BackendKind::SchemaDiscovered,
                    endpoint_path: None,
                    model: None,
                },
            ],
        }
    }
}

/// Dispatch deadlines and startup behaviour / 分发超时与启动行为
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deadline for metadata (discovery) calls / 元数据（发现）调用超时（毫秒）
    pub discovery_timeout_ms: u64,
    /// Deadline for generation calls / 生成调用超时（毫秒）
    pub generation_timeout_ms: u64,
    /// Resolve schema-discovered workers at startup / 启动时解析schema发现类worker
    pub warm_up_on_start: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: 5_000,
            generation_timeout_ms: 25_000,
            warm_up_on_start: true,
        }
    }
}

impl DispatchConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

/// Front door settings / 入口设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Optional bearer key for the OpenAI-style API / OpenAI风格API的可选Bearer密钥
    pub api_key: Option<String>,
    /// Model name advertised on /v1/models / 在/v1/models中公布的模型名
    pub public_model_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            public_model_name: "qwen2.5-0.5b".to_string(),
        }
    }
}

/// One backend worker / 单个后端worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub base_url: String,
    pub kind: BackendKind,
    /// Ignored for schema_discovered workers / schema_discovered类型忽略此项
    #[serde(default)]
    pub endpoint_path: Option<String>,
    /// Forwarded as the wire `model` field / 作为请求体中的`model`字段转发
    #[serde(default)]
    pub model: Option<String>,
}

impl RouterConfig {
    /// Load configuration from defaults, file, environment and CLI
    /// 从默认值、文件、环境变量和CLI加载配置
    pub fn load(args: &CliArgs) -> Result<Self> {
        let file = match args.config.as_deref() {
            Some(path) => {
                let path = Path::new(path);
                if !path.is_file() {
                    bail!("configuration file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut config: RouterConfig = Figment::new()
            .merge(Serialized::defaults(RouterConfig::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to load configuration")?;

        args.apply_to(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration / 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            bail!("no workers configured");
        }
        for (idx, w) in self.workers.iter().enumerate() {
            let url = url::Url::parse(&w.base_url)
                .map_err(|e| anyhow!("worker {}: invalid base_url {:?}: {}", idx, w.base_url, e))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("worker {}: unsupported scheme {:?}", idx, url.scheme());
            }
            if let Some(p) = w.endpoint_path.as_deref() {
                if w.kind != BackendKind::SchemaDiscovered && !p.starts_with('/') {
                    bail!("worker {}: endpoint_path must start with '/': {:?}", idx, p);
                }
            }
        }
        if self.dispatch.discovery_timeout_ms == 0 || self.dispatch.generation_timeout_ms == 0 {
            bail!("dispatch timeouts must be non-zero");
        }
        if self.dispatch.discovery_timeout_ms >= self.dispatch.generation_timeout_ms {
            bail!(
                "discovery_timeout_ms ({}) must be shorter than generation_timeout_ms ({})",
                self.dispatch.discovery_timeout_ms,
                self.dispatch.generation_timeout_ms
            );
        }
        Ok(())
    }
}

/// Common logging configuration / 通用日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) / 日志级别
    pub level: String,
    /// Log format (json, compact, pretty) / 日志格式
    pub format: String,
    /// Enable file logging / 启用文件日志
    pub file_enabled: bool,
    /// Log file path / 日志文件路径
    pub file_path: Option<PathBuf>,
}

static FILE_LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_enabled: false,
            file_path: None,
        }
    }
}

/// Build one fmt layer (`json`, `compact`, anything else pretty) over `writer`
/// 基于 `writer` 构建一个fmt层（`json`、`compact`，其余为pretty）
fn format_layer<S, W>(
    format: &str,
    writer: W,
    ansi: bool,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    use tracing_subscriber::{fmt, Layer};

    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(ansi)
        .with_timer(fmt::time::uptime())
        .with_writer(writer);
    match format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ => layer.pretty().boxed(),
    }
}

/// Initialize tracing based on logging configuration
/// 基于日志配置初始化跟踪
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level.trim().is_empty() {
            EnvFilter::new("info")
        } else {
            EnvFilter::new(config.level.clone())
        }
    });

    let file_writer = match (config.file_enabled, config.file_path.as_ref()) {
        (true, Some(path)) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create log dir: {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file: {}", path.display()))?;
            let (file_writer, guard) = tracing_appender::non_blocking(file);
            let _ = FILE_LOG_GUARD.set(guard);
            Some(file_writer)
        }
        _ => None,
    };

    // File and stdout share the configured format; the file never gets ANSI codes.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(format_layer(&config.format, std::io::stdout, true))
        .with(file_writer.map(|w| format_layer(&config.format, w, false)))
        .try_init()
        .context("install tracing subscriber")?;

    Ok(())
}
