//! LLM Adapters - 补全引擎适配器
//!
//! - HttpCompletionClient: 调用外部 chat-completions HTTP 服务
//! - FakeCompletionClient: 测试用，按脚本返回响应

mod fake_completion_client;
mod http_completion_client;

pub use fake_completion_client::FakeCompletionClient;
pub use http_completion_client::{HttpCompletionClient, HttpCompletionClientConfig};
