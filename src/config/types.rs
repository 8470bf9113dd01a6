//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM 补全端点配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 生成流程配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// GC 配置
    #[serde(default)]
    pub gc: GcConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            gc: GcConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL（写入流订阅地址）
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            let host = if self.host == "0.0.0.0" {
                "localhost"
            } else {
                &self.host
            };
            format!("http://{}:{}", host, self.port)
        })
    }
}

/// LLM 补全端点配置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI 兼容端点的基础 URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API Key（通常通过环境变量注入）
    #[serde(default)]
    pub api_key: String,

    /// 模型标识
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// 单次请求超时时间（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// 网关层最大尝试次数（含首次）
    #[serde(default = "default_llm_max_attempts")]
    pub max_attempts: u32,

    /// 退避基准（毫秒）
    #[serde(default = "default_llm_backoff")]
    pub base_backoff_ms: u64,

    /// 退避上限（毫秒）
    #[serde(default = "default_llm_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    180
}

fn default_llm_max_attempts() -> u32 {
    3
}

fn default_llm_backoff() -> u64 {
    1000
}

fn default_llm_max_backoff() -> u64 {
    30_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_attempts: default_llm_max_attempts(),
            base_backoff_ms: default_llm_backoff(),
            max_backoff_ms: default_llm_max_backoff(),
        }
    }
}

/// 生成流程配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 大纲阶段占总进度的份额（百分点）
    #[serde(default = "default_outline_share")]
    pub outline_progress_share: u8,

    /// 每章最大起草尝试次数（含首次）
    #[serde(default = "default_chapter_attempts")]
    pub max_chapter_attempts: u32,

    /// 首次起草温度
    #[serde(default = "default_first_temperature")]
    pub first_temperature: f32,

    /// 重试起草温度
    #[serde(default = "default_retry_temperature")]
    pub retry_temperature: f32,

    /// 每章接受后的节流延迟（毫秒）
    #[serde(default = "default_inter_chapter_delay")]
    pub inter_chapter_delay_ms: u64,

    /// 任务墙钟超时（秒）
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// 流会话心跳间隔（秒）
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// 恢复协调器的静默窗口（秒）
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,
}

fn default_outline_share() -> u8 {
    20
}

fn default_chapter_attempts() -> u32 {
    2
}

fn default_first_temperature() -> f32 {
    0.9
}

fn default_retry_temperature() -> f32 {
    0.7
}

fn default_inter_chapter_delay() -> u64 {
    500
}

fn default_job_timeout() -> u64 {
    45 * 60
}

fn default_heartbeat() -> u64 {
    10
}

fn default_stall_timeout() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            outline_progress_share: default_outline_share(),
            max_chapter_attempts: default_chapter_attempts(),
            first_temperature: default_first_temperature(),
            retry_temperature: default_retry_temperature(),
            inter_chapter_delay_ms: default_inter_chapter_delay(),
            job_timeout_secs: default_job_timeout(),
            heartbeat_secs: default_heartbeat(),
            stall_timeout_secs: default_stall_timeout(),
        }
    }
}

/// GC 配置
#[derive(Debug, Clone, Deserialize)]
pub struct GcConfig {
    /// 是否启用终止任务回收
    #[serde(default = "default_gc_enabled")]
    pub enabled: bool,

    /// 扫描间隔（秒）
    #[serde(default = "default_gc_interval")]
    pub interval_secs: u64,

    /// 终止任务的保留窗口（秒）
    #[serde(default = "default_gc_retention")]
    pub retention_secs: u64,
}

fn default_gc_enabled() -> bool {
    true
}

fn default_gc_interval() -> u64 {
    600
}

fn default_gc_retention() -> u64 {
    3600
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: default_gc_enabled(),
            interval_secs: default_gc_interval(),
            retention_secs: default_gc_retention(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
