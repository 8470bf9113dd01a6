//! 有界重试组合子
//!
//! 以错误分类器和退避函数为参数的显式重试循环，
//! 供补全网关使用；尝试上限耗尽后返回最后一个错误。

use std::future::Future;
use std::time::Duration;

/// 单次失败后的处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 等待指定时长后重试
    Retry { after: Duration },
    /// 致命错误，立即上抛
    Fatal,
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 总尝试次数上限（含首次）
    pub max_attempts: u32,
    /// 退避基准
    pub base_backoff: Duration,
    /// 退避上限
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// 与尝试次数成正比的退避（限流场景）
    pub fn linear(&self, attempt: u32) -> Duration {
        (self.base_backoff * attempt).min(self.max_backoff)
    }

    /// 指数退避（服务端错误场景）
    pub fn exponential(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        (self.base_backoff * factor).min(self.max_backoff)
    }

    /// 固定退避
    pub fn fixed(&self) -> Duration {
        self.base_backoff.min(self.max_backoff)
    }
}

/// 执行有界重试
///
/// `op` 按尝试次数（1 起）调用；`classify` 决定失败是否重试及退避时长。
/// 尝试次数达到 `policy.max_attempts` 后返回最后一个错误。
pub async fn retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut classify: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(&E, u32) -> RetryDecision,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_attempts {
                    return Err(error);
                }
                match classify(&error, attempt) {
                    RetryDecision::Fatal => return Err(error),
                    RetryDecision::Retry { after } => {
                        tokio::time::sleep(after).await;
                    }
                }
            }
        }
    }
}
