//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（CompletionPort、JobRegistryPort）
//! - gateway: 补全网关（有界重试 + 错误分类）
//! - outline: 大纲合成器
//! - drafter: 章节起草器与质量门
//! - retry: 有界重试组合子
//! - error: 应用层错误定义

pub mod drafter;
pub mod error;
pub mod gateway;
pub mod outline;
pub mod ports;
pub mod retry;

// Re-exports
pub use drafter::{ChapterDrafter, ChapterDrafterConfig};
pub use error::GenerationError;
pub use gateway::{CompletionGateway, CompletionOptions};
pub use outline::OutlineSynthesizer;
pub use ports::{
    CompletionError, CompletionPort, CompletionRequest, GenerationJob, JobError, JobFailure,
    JobLogEntry, JobRegistryPort, JobResult, JobStatus,
};
pub use retry::{retry, RetryDecision, RetryPolicy};
