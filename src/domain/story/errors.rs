//! Story Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("无效的标题: {0}")]
    InvalidTitle(String),

    #[error("无效的章节数: {0}")]
    InvalidChapterCount(String),

    #[error("无效的目标字数: {0}")]
    InvalidWordTarget(String),

    #[error("无效的大纲条目: {0}")]
    InvalidOutlineEntry(String),

    #[error("无效的章节内容: {0}")]
    InvalidChapterContent(String),
}
