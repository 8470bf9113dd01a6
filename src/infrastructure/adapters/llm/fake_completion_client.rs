//! Fake Completion Client - 测试用补全客户端
//!
//! 按先进先出脚本返回响应或错误，并记录收到的每个请求，
//! 不实际调用外部服务

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{CompletionError, CompletionPort, CompletionRequest};

/// Fake 补全客户端
///
/// 脚本耗尽后返回 Unknown 错误
pub struct FakeCompletionClient {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicU32,
    /// 每次调用前的模拟延迟
    delay: Duration,
}

impl FakeCompletionClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    /// 设置每次调用的模拟推理延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 追加一条成功响应
    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(text.into()));
    }

    /// 追加一条错误响应
    pub fn push_error(&self, error: CompletionError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// 已收到的调用次数
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的请求副本（按顺序）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for FakeCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionPort for FakeCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Unknown("fake script exhausted".to_string())))
    }
}
