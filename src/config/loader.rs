//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `FABLER_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `FABLER_SERVER__HOST=127.0.0.1`
/// - `FABLER_SERVER__PORT=8080`
/// - `FABLER_LLM__BASE_URL=https://llm-gateway:8443`
/// - `FABLER_LLM__API_KEY=sk-...`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("llm.base_url", "https://api.openai.com")?
        .set_default("llm.model", "gpt-4o-mini")?
        .set_default("llm.timeout_secs", 180)?
        .set_default("llm.max_attempts", 3)?
        .set_default("llm.base_backoff_ms", 1000)?
        .set_default("llm.max_backoff_ms", 30_000)?
        .set_default("generation.outline_progress_share", 20)?
        .set_default("generation.max_chapter_attempts", 2)?
        .set_default("generation.first_temperature", 0.9)?
        .set_default("generation.retry_temperature", 0.7)?
        .set_default("generation.inter_chapter_delay_ms", 500)?
        .set_default("generation.job_timeout_secs", 45 * 60)?
        .set_default("generation.heartbeat_secs", 10)?
        .set_default("generation.stall_timeout_secs", 300)?
        .set_default("gc.enabled", true)?
        .set_default("gc.interval_secs", 600)?
        .set_default("gc.retention_secs", 3600)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: FABLER_
    // 层级分隔符: __ (双下划线)
    // 例如: FABLER_LLM__API_KEY=sk-...
    builder = builder.add_source(
        Environment::with_prefix("FABLER")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.llm.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "LLM base URL cannot be empty".to_string(),
        ));
    }

    if config.llm.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "LLM max attempts must be at least 1".to_string(),
        ));
    }

    if config.generation.max_chapter_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "Chapter attempt limit must be at least 1".to_string(),
        ));
    }

    if config.generation.outline_progress_share >= 100 {
        return Err(ConfigError::ValidationError(
            "Outline progress share must be below 100".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.generation.first_temperature)
        || !(0.0..=2.0).contains(&config.generation.retry_temperature)
    {
        return Err(ConfigError::ValidationError(
            "Sampling temperature must be within [0.0, 2.0]".to_string(),
        ));
    }

    if config.gc.enabled && config.gc.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "GC interval cannot be 0 when GC is enabled".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("LLM Base URL: {}", config.llm.base_url);
    tracing::info!("LLM Model: {}", config.llm.model);
    tracing::info!("LLM Timeout: {}s", config.llm.timeout_secs);
    tracing::info!("LLM Max Attempts: {}", config.llm.max_attempts);
    tracing::info!(
        "Chapter Attempts: {} (temperatures {} / {})",
        config.generation.max_chapter_attempts,
        config.generation.first_temperature,
        config.generation.retry_temperature
    );
    tracing::info!("Job Timeout: {}s", config.generation.job_timeout_secs);
    tracing::info!("Heartbeat: {}s", config.generation.heartbeat_secs);
    tracing::info!("Stall Window: {}s", config.generation.stall_timeout_secs);
    tracing::info!("GC Enabled: {}", config.gc.enabled);
    if config.gc.enabled {
        tracing::info!("GC Interval: {}s", config.gc.interval_secs);
        tracing::info!("Job Retention: {}s", config.gc.retention_secs);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
