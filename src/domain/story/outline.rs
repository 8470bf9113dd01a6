//! Story Context - OutlineEntry

use serde::{Deserialize, Serialize};

use super::StoryError;

/// 大纲条目 - 每章一条
///
/// 不变量:
/// - index 从 1 开始，在大纲内连续且唯一
/// - title 和 summary 不可为空
///
/// 大纲由 OutlineSynthesizer 一次性产出，生成开始后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// 章节序号（1..=N）
    index: u32,
    /// 章节标题
    title: String,
    /// 章节概要
    summary: String,
}

impl OutlineEntry {
    pub fn new(
        index: u32,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Result<Self, StoryError> {
        let title = title.into();
        let summary = summary.into();
        if index == 0 {
            return Err(StoryError::InvalidOutlineEntry(
                "章节序号从 1 开始".to_string(),
            ));
        }
        if title.trim().is_empty() {
            return Err(StoryError::InvalidOutlineEntry(format!(
                "第 {} 章标题不能为空",
                index
            )));
        }
        if summary.trim().is_empty() {
            return Err(StoryError::InvalidOutlineEntry(format!(
                "第 {} 章概要不能为空",
                index
            )));
        }
        Ok(Self {
            index,
            title,
            summary,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_entry() {
        let entry = OutlineEntry::new(1, "启程", "主角离开村庄").unwrap();
        assert_eq!(entry.index(), 1);
        assert_eq!(entry.title(), "启程");
    }

    #[test]
    fn test_zero_index_rejected() {
        assert!(OutlineEntry::new(0, "标题", "概要").is_err());
    }

    #[test]
    fn test_empty_title_rejected() {
        assert!(OutlineEntry::new(1, "  ", "概要").is_err());
    }

    #[test]
    fn test_empty_summary_rejected() {
        assert!(OutlineEntry::new(1, "标题", "").is_err());
    }
}
