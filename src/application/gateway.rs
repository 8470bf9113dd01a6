//! Completion Gateway - 补全网关
//!
//! 包装外部补全调用：按错误分类执行有界重试，
//! 每次尝试记录操作名、尝试序号与结果。操作名仅用于诊断，不影响行为。

use std::sync::Arc;

use super::error::GenerationError;
use super::ports::{CompletionError, CompletionPort, CompletionRequest};
use super::retry::{retry, RetryDecision, RetryPolicy};

/// 单次请求的采样参数
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 补全网关
///
/// 重试行为:
/// - Auth / Validation: 不重试
/// - RateLimited: 退避与尝试次数成正比，有上限
/// - Server: 指数退避，有上限
/// - Timeout / Unknown: 固定退避
/// - 尝试上限（默认 3）耗尽后以 CompletionFailed 上抛
pub struct CompletionGateway {
    engine: Arc<dyn CompletionPort>,
    policy: RetryPolicy,
}

impl CompletionGateway {
    pub fn new(engine: Arc<dyn CompletionPort>, policy: RetryPolicy) -> Self {
        Self { engine, policy }
    }

    /// 执行补全请求
    ///
    /// `operation` 是调用方提供的逻辑操作名（如 "outline"、"chapter 3"）
    pub async fn request(
        &self,
        operation: &str,
        prompt: String,
        opts: CompletionOptions,
    ) -> Result<String, GenerationError> {
        let policy = self.policy.clone();

        let result = retry(
            &self.policy,
            |error: &CompletionError, attempt| classify(&policy, error, attempt),
            |attempt| {
                let engine = self.engine.clone();
                let request = CompletionRequest {
                    prompt: prompt.clone(),
                    max_tokens: opts.max_tokens,
                    temperature: opts.temperature,
                };
                let operation = operation.to_string();
                async move {
                    tracing::debug!(
                        operation = %operation,
                        attempt = attempt,
                        prompt_len = request.prompt.len(),
                        max_tokens = request.max_tokens,
                        "Sending completion request"
                    );
                    match engine.complete(request).await {
                        Ok(text) => {
                            tracing::debug!(
                                operation = %operation,
                                attempt = attempt,
                                response_len = text.len(),
                                "Completion request succeeded"
                            );
                            Ok(text)
                        }
                        Err(e) => {
                            tracing::warn!(
                                operation = %operation,
                                attempt = attempt,
                                error = %e,
                                fatal = e.is_fatal(),
                                "Completion request failed"
                            );
                            Err(e)
                        }
                    }
                }
            },
        )
        .await;

        result.map_err(|source| GenerationError::CompletionFailed {
            operation: operation.to_string(),
            source,
        })
    }
}

/// 按错误类别映射到重试决定
fn classify(policy: &RetryPolicy, error: &CompletionError, attempt: u32) -> RetryDecision {
    match error {
        CompletionError::Auth(_) | CompletionError::Validation(_) => RetryDecision::Fatal,
        CompletionError::RateLimited(_) => RetryDecision::Retry {
            after: policy.linear(attempt),
        },
        CompletionError::Server(_) => RetryDecision::Retry {
            after: policy.exponential(attempt),
        },
        CompletionError::Timeout | CompletionError::Unknown(_) => RetryDecision::Retry {
            after: policy.fixed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FakeCompletionClient;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn opts() -> CompletionOptions {
        CompletionOptions {
            max_tokens: 256,
            temperature: 0.9,
        }
    }

    #[tokio::test]
    async fn test_success_passthrough() {
        let fake = Arc::new(FakeCompletionClient::new());
        fake.push_text("generated prose");
        let gateway = CompletionGateway::new(fake.clone(), fast_policy());

        let text = gateway
            .request("chapter 1", "prompt".to_string(), opts())
            .await
            .unwrap();
        assert_eq!(text, "generated prose");
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_three_server_errors_exhaust_exactly_three_attempts() {
        let fake = Arc::new(FakeCompletionClient::new());
        for _ in 0..3 {
            fake.push_error(CompletionError::Server("HTTP 500".into()));
        }
        let gateway = CompletionGateway::new(fake.clone(), fast_policy());

        let err = gateway
            .request("outline", "prompt".to_string(), opts())
            .await
            .unwrap_err();
        assert_eq!(fake.call_count(), 3);
        match err {
            GenerationError::CompletionFailed { operation, source } => {
                assert_eq!(operation, "outline");
                assert!(matches!(source, CompletionError::Server(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let fake = Arc::new(FakeCompletionClient::new());
        fake.push_error(CompletionError::Auth("401".into()));
        let gateway = CompletionGateway::new(fake.clone(), fast_policy());

        let err = gateway
            .request("outline", "prompt".to_string(), opts())
            .await
            .unwrap_err();
        assert_eq!(fake.call_count(), 1);
        assert!(matches!(
            err,
            GenerationError::CompletionFailed {
                source: CompletionError::Auth(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_recovers_from_transient_rate_limit() {
        let fake = Arc::new(FakeCompletionClient::new());
        fake.push_error(CompletionError::RateLimited("429".into()));
        fake.push_text("after backoff");
        let gateway = CompletionGateway::new(fake.clone(), fast_policy());

        let text = gateway
            .request("chapter 2", "prompt".to_string(), opts())
            .await
            .unwrap();
        assert_eq!(text, "after backoff");
        assert_eq!(fake.call_count(), 2);
    }
}
