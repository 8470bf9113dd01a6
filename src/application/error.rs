//! 应用层错误定义
//!
//! 统一的生成流程错误类型

use thiserror::Error;

use super::ports::{CompletionError, JobError};
use crate::domain::story::StoryError;

/// 生成流程错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 补全网关重试耗尽或遇到致命错误
    #[error("Completion failed during {operation}: {source}")]
    CompletionFailed {
        operation: String,
        #[source]
        source: CompletionError,
    },

    /// 大纲输出无法解析为合法 JSON 数组
    #[error("Outline parse error: {0}")]
    OutlineParse(String),

    /// 大纲章节数与规格不符（从不静默截断或补齐）
    #[error("Outline count mismatch: expected {expected} chapters, got {actual}")]
    OutlineCountMismatch { expected: u32, actual: u32 },

    /// 输入规格无效
    #[error("Invalid story spec: {0}")]
    InvalidSpec(String),

    /// 墙钟超时（区别于上游错误耗尽）
    #[error("Job exceeded wall-clock time limit")]
    JobTimeout,

    /// 注册表错误
    #[error(transparent)]
    Job(#[from] JobError),
}

impl GenerationError {
    /// 失败操作的诊断标签，写入任务的终止错误记录
    pub fn operation(&self) -> String {
        match self {
            GenerationError::CompletionFailed { operation, .. } => operation.clone(),
            GenerationError::OutlineParse(_) | GenerationError::OutlineCountMismatch { .. } => {
                "outline".to_string()
            }
            GenerationError::InvalidSpec(_) => "validation".to_string(),
            GenerationError::JobTimeout => "timeout".to_string(),
            GenerationError::Job(_) => "registry".to_string(),
        }
    }
}

impl From<StoryError> for GenerationError {
    fn from(err: StoryError) -> Self {
        GenerationError::InvalidSpec(err.to_string())
    }
}
