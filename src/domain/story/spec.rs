//! Story Context - StorySpec

use serde::{Deserialize, Serialize};

use super::StoryError;

/// 故事规格 - 生成任务的不可变输入
///
/// 不变量:
/// - chapters > 0
/// - words_per_chapter > 0
/// - variance < words_per_chapter（下限不能为负）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorySpec {
    /// 故事标题
    title: String,
    /// 题材标识（内容模板由外部调用方提供）
    genre: String,
    /// 子题材标识
    subgenre: String,
    /// 故事梗概
    synopsis: String,
    /// 目标总字数
    total_words: u32,
    /// 目标章节数
    chapters: u32,
    /// 每章目标字数
    words_per_chapter: u32,
    /// 允许的每章字数偏差
    variance: u32,
}

impl StorySpec {
    /// 创建故事规格
    ///
    /// `words_per_chapter` 传 0 时按 `total_words / chapters` 推导
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: impl Into<String>,
        genre: impl Into<String>,
        subgenre: impl Into<String>,
        synopsis: impl Into<String>,
        total_words: u32,
        chapters: u32,
        words_per_chapter: u32,
        variance: u32,
    ) -> Result<Self, StoryError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StoryError::InvalidTitle("标题不能为空".to_string()));
        }
        if chapters == 0 {
            return Err(StoryError::InvalidChapterCount(
                "章节数必须大于 0".to_string(),
            ));
        }

        let words_per_chapter = if words_per_chapter == 0 {
            total_words / chapters
        } else {
            words_per_chapter
        };
        if words_per_chapter == 0 {
            return Err(StoryError::InvalidWordTarget(
                "每章目标字数必须大于 0".to_string(),
            ));
        }
        if variance >= words_per_chapter {
            return Err(StoryError::InvalidWordTarget(format!(
                "偏差 {} 不能大于等于每章目标字数 {}",
                variance, words_per_chapter
            )));
        }

        Ok(Self {
            title,
            genre: genre.into(),
            subgenre: subgenre.into(),
            synopsis: synopsis.into(),
            total_words,
            chapters,
            words_per_chapter,
            variance,
        })
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn subgenre(&self) -> &str {
        &self.subgenre
    }

    pub fn synopsis(&self) -> &str {
        &self.synopsis
    }

    pub fn total_words(&self) -> u32 {
        self.total_words
    }

    pub fn chapters(&self) -> u32 {
        self.chapters
    }

    pub fn words_per_chapter(&self) -> u32 {
        self.words_per_chapter
    }

    pub fn variance(&self) -> u32 {
        self.variance
    }

    /// 首次尝试的最低接受字数
    pub fn min_words_first_attempt(&self) -> u32 {
        self.words_per_chapter - self.variance
    }

    /// 重试时的最低接受字数（目标的 90%）
    pub fn min_words_retry(&self) -> u32 {
        (f64::from(self.words_per_chapter) * 0.90).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(chapters: u32, wpc: u32, variance: u32) -> Result<StorySpec, StoryError> {
        StorySpec::new("测试故事", "fantasy", "epic", "一个梗概", 0, chapters, wpc, variance)
    }

    #[test]
    fn test_valid_spec() {
        let spec = spec(3, 500, 100).unwrap();
        assert_eq!(spec.chapters(), 3);
        assert_eq!(spec.min_words_first_attempt(), 400);
        assert_eq!(spec.min_words_retry(), 450);
    }

    #[test]
    fn test_zero_chapters_rejected() {
        assert!(spec(0, 500, 100).is_err());
    }

    #[test]
    fn test_zero_words_rejected() {
        assert!(spec(3, 0, 0).is_err());
    }

    #[test]
    fn test_words_per_chapter_derived_from_total() {
        let spec =
            StorySpec::new("测试", "fantasy", "epic", "梗概", 6000, 3, 0, 100).unwrap();
        assert_eq!(spec.words_per_chapter(), 2000);
    }

    #[test]
    fn test_variance_must_be_below_target() {
        assert!(spec(3, 500, 500).is_err());
    }

    #[test]
    fn test_retry_minimum_is_ninety_percent() {
        let spec = spec(1, 2000, 300).unwrap();
        assert_eq!(spec.min_words_first_attempt(), 1700);
        assert_eq!(spec.min_words_retry(), 1800);
    }
}
