//! Completion Port - 文本补全引擎抽象
//!
//! 定义外部 LLM 补全服务的抽象接口，具体实现在 infrastructure/adapters 层。
//! 错误分类承载重试语义：Auth/Validation 不可重试，其余可按各自退避策略重试。

use async_trait::async_trait;
use thiserror::Error;

/// 补全错误
///
/// 分类决定网关的重试行为:
/// - Auth / Validation: 致命，立即上抛
/// - RateLimited: 退避与尝试次数成正比
/// - Server: 指数退避
/// - Timeout / Unknown: 固定退避
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CompletionError {
    /// 是否致命（不参与重试）
    pub fn is_fatal(&self) -> bool {
        matches!(self, CompletionError::Auth(_) | CompletionError::Validation(_))
    }
}

/// 补全请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// 提示词全文
    pub prompt: String,
    /// 输出 token 预算
    pub max_tokens: u32,
    /// 采样温度
    pub temperature: f32,
}

/// Completion Port
///
/// 外部文本补全服务的抽象接口，单次调用、不含重试
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// 执行一次补全请求，返回生成的文本
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(CompletionError::Auth("401".into()).is_fatal());
        assert!(CompletionError::Validation("bad prompt".into()).is_fatal());
        assert!(!CompletionError::RateLimited("429".into()).is_fatal());
        assert!(!CompletionError::Server("500".into()).is_fatal());
        assert!(!CompletionError::Timeout.is_fatal());
        assert!(!CompletionError::Unknown("?".into()).is_fatal());
    }
}
