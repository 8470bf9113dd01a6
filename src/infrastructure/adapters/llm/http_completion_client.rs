//! HTTP Completion Client - 调用外部 LLM HTTP 服务
//!
//! 实现 CompletionPort trait，通过 HTTP 调用 chat-completions 兼容端点
//!
//! 外部 API:
//! POST {base_url}/v1/chat/completions
//! Request: {"model": "...", "messages": [...], "max_tokens": N, "temperature": T}  (JSON)
//! Response: {"choices": [{"message": {"content": "..."}}]}
//!
//! 本客户端单次调用、不含重试；重试与错误分类由补全网关负责，
//! 这里只把传输层结果映射到 CompletionError 分类。

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{CompletionError, CompletionPort, CompletionRequest};

/// 补全请求体 (JSON)
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP 补全客户端配置
#[derive(Debug, Clone)]
pub struct HttpCompletionClientConfig {
    /// 补全服务基础 URL
    pub base_url: String,
    /// API Key（Bearer）
    pub api_key: String,
    /// 模型标识
    pub model: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpCompletionClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 180,
        }
    }
}

impl HttpCompletionClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 补全客户端
pub struct HttpCompletionClient {
    client: Client,
    config: HttpCompletionClientConfig,
}

impl HttpCompletionClient {
    /// 创建新的 HTTP 补全客户端
    pub fn new(config: HttpCompletionClientConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Unknown(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }
}

#[async_trait]
impl CompletionPort for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            url = %self.completions_url(),
            model = %body.model,
            prompt_len = body.messages[0].content.len(),
            max_tokens = body.max_tokens,
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else if e.is_connect() {
                    CompletionError::Server(format!("Cannot connect to completion service: {}", e))
                } else {
                    CompletionError::Unknown(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status, error_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Unknown(format!("Malformed response body: {}", e)))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                CompletionError::Unknown("Response contains no choices".to_string())
            })?;

        tracing::debug!(response_len = text.len(), "Completion received");
        Ok(text)
    }
}

/// 将 HTTP 状态码映射到错误分类
fn map_status(status: StatusCode, body: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CompletionError::Auth(format!("HTTP {}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            CompletionError::RateLimited(format!("HTTP {}: {}", status, body))
        }
        s if s.is_client_error() => {
            CompletionError::Validation(format!("HTTP {}: {}", status, body))
        }
        s if s.is_server_error() => {
            CompletionError::Server(format!("HTTP {}: {}", status, body))
        }
        _ => CompletionError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}
