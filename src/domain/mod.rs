//! Domain Layer - 领域层
//!
//! 包含一个限界上下文:
//! - Story Context: 故事规格、大纲、章节
//!
//! 共享的提示词构建模块（纯函数，无 I/O）

pub mod story;

mod prompt;

pub use prompt::{build_chapter_prompt, build_outline_prompt, RetryHint};
