//! Story Context - 故事限界上下文
//!
//! 职责:
//! - 故事规格（StorySpec）校验
//! - 大纲条目（OutlineEntry）管理
//! - 章节实体与字数统计

mod chapter;
mod errors;
mod outline;
mod spec;

pub use chapter::{count_words, Chapter};
pub use errors::StoryError;
pub use outline::OutlineEntry;
pub use spec::StorySpec;
