//! Story Context - Chapter

use serde::{Deserialize, Serialize};

use super::StoryError;

/// 按空白符切分统计字数
///
/// 质量门使用的唯一度量方式
pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// 已接受的章节 - 起草一条大纲条目的结果
///
/// 不变量:
/// - index 与对应 OutlineEntry 一致
/// - 接受后不可变；未通过的草稿被整体丢弃而非修补
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 章节序号（与大纲条目一致）
    index: u32,
    /// 章节标题
    title: String,
    /// 章节正文
    content: String,
    /// 实测字数
    word_count: u32,
    /// 是否达到首次尝试的下限
    meets_target: bool,
    /// 本章消耗的重试次数
    retries_used: u32,
}

impl Chapter {
    pub fn new(
        index: u32,
        title: impl Into<String>,
        content: impl Into<String>,
        meets_target: bool,
        retries_used: u32,
    ) -> Result<Self, StoryError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(StoryError::InvalidChapterContent(format!(
                "第 {} 章正文不能为空",
                index
            )));
        }
        let word_count = count_words(&content);
        Ok(Self {
            index,
            title: title.into(),
            content,
            word_count,
            meets_target,
            retries_used,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn word_count(&self) -> u32 {
        self.word_count
    }

    pub fn meets_target(&self) -> bool {
        self.meets_target
    }

    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words_whitespace_tokenization() {
        assert_eq!(count_words("one two three"), 3);
        assert_eq!(count_words("  spaced\tout\nwords  "), 3);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_chapter_measures_word_count() {
        let chapter = Chapter::new(1, "启程", "the road goes ever on", true, 0).unwrap();
        assert_eq!(chapter.word_count(), 5);
        assert!(chapter.meets_target());
        assert_eq!(chapter.retries_used(), 0);
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(Chapter::new(1, "启程", "   ", true, 0).is_err());
    }
}
