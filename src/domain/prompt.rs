//! Prompt Builder - 提示词构建
//!
//! 纯函数模块：将故事规格、大纲条目和上文章节映射为补全请求文本。
//! 无 I/O、无状态、确定性，可对相同输入重复调用。
//!
//! 上文内容有界嵌入策略:
//! 1. 最近 2 章嵌入全文
//! 2. 更早的章节只嵌入标题 + 开头摘录
//! 3. 保证请求体不随章节数无界增长

use crate::domain::story::{Chapter, OutlineEntry, StorySpec};

/// 嵌入全文的最近章节数
const RECENT_FULL_CHAPTERS: usize = 2;

/// 早期章节的摘录长度（字符）
const EARLIER_EXCERPT_CHARS: usize = 300;

/// 重试提示 - 上一次草稿未达标时注入
#[derive(Debug, Clone, Copy)]
pub struct RetryHint {
    /// 上一次草稿的实测字数
    pub previous_word_count: u32,
    /// 本次尝试的最低字数要求
    pub min_words: u32,
}

/// 构建大纲生成提示词
///
/// 明确要求输出为可解析的 JSON 数组（恰好 N 个 {title, summary} 对象），
/// 使调用方能够确定性解析
pub fn build_outline_prompt(spec: &StorySpec) -> String {
    format!(
        "You are a novelist planning a {genre} ({subgenre}) novel titled \"{title}\".\n\
         \n\
         Synopsis:\n{synopsis}\n\
         \n\
         Create a chapter outline for this novel.\n\
         \n\
         Requirements:\n\
         - Exactly {chapters} chapters.\n\
         - Each chapter needs a short evocative title and a 2-3 sentence summary of its events.\n\
         - Summaries must form a continuous story arc from beginning to resolution.\n\
         \n\
         Respond with ONLY a JSON array of exactly {chapters} objects, each shaped as\n\
         {{\"title\": \"...\", \"summary\": \"...\"}}. No prose before or after the array.",
        genre = spec.genre(),
        subgenre = spec.subgenre(),
        title = spec.title(),
        synopsis = spec.synopsis(),
        chapters = spec.chapters(),
    )
}

/// 构建章节起草提示词
///
/// `prior_chapters` 必须是已接受章节的前缀（按序号升序）
pub fn build_chapter_prompt(
    spec: &StorySpec,
    entry: &OutlineEntry,
    prior_chapters: &[Chapter],
    retry_hint: Option<&RetryHint>,
) -> String {
    let target = spec.words_per_chapter();
    let variance = spec.variance();

    let mut prompt = format!(
        "You are writing chapter {index} of {total} of the {genre} ({subgenre}) novel \"{title}\".\n\
         \n\
         Novel synopsis:\n{synopsis}\n\
         \n",
        index = entry.index(),
        total = spec.chapters(),
        genre = spec.genre(),
        subgenre = spec.subgenre(),
        title = spec.title(),
        synopsis = spec.synopsis(),
    );

    if !prior_chapters.is_empty() {
        prompt.push_str("Story so far:\n");
        prompt.push_str(&format_prior_context(prior_chapters));
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Now write chapter {index}: \"{chapter_title}\"\n\
         Chapter summary: {summary}\n\
         \n\
         Target length: {target} words (acceptable range {min} to {max} words).\n\
         Write the chapter prose only. Do not include the chapter title, notes or commentary.\n",
        index = entry.index(),
        chapter_title = entry.title(),
        summary = entry.summary(),
        target = target,
        min = target.saturating_sub(variance),
        max = target + variance,
    ));

    if let Some(hint) = retry_hint {
        prompt.push_str(&format!(
            "\nIMPORTANT: your previous draft was only {previous} words, which is too short.\n\
             This draft MUST contain at least {min} words. Expand the chapter by deepening\n\
             scene descriptions, adding dialogue, exploring character interiority and\n\
             developing the events of the summary in more detail. Do not pad with repetition.\n",
            previous = hint.previous_word_count,
            min = hint.min_words,
        ));
    }

    prompt
}

/// 格式化上文章节：最近 2 章全文，更早的只保留标题和开头摘录
fn format_prior_context(prior_chapters: &[Chapter]) -> String {
    let full_from = prior_chapters.len().saturating_sub(RECENT_FULL_CHAPTERS);
    let mut out = String::new();

    for chapter in &prior_chapters[..full_from] {
        out.push_str(&format!(
            "Chapter {} ({}): {}\u{2026}\n",
            chapter.index(),
            chapter.title(),
            truncate_chars(chapter.content(), EARLIER_EXCERPT_CHARS),
        ));
    }

    for chapter in &prior_chapters[full_from..] {
        out.push_str(&format!(
            "--- Chapter {} ({}) ---\n{}\n",
            chapter.index(),
            chapter.title(),
            chapter.content(),
        ));
    }

    out
}

/// 按字符边界截断（避免切断多字节字符）
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::story::{Chapter, OutlineEntry, StorySpec};

    fn spec() -> StorySpec {
        StorySpec::new("远山", "fantasy", "epic", "少年踏上旅途", 0, 5, 500, 100).unwrap()
    }

    fn chapter(index: u32, content: &str) -> Chapter {
        Chapter::new(index, format!("第{}章", index), content, true, 0).unwrap()
    }

    #[test]
    fn test_outline_prompt_states_shape_and_count() {
        let prompt = build_outline_prompt(&spec());
        assert!(prompt.contains("Exactly 5 chapters"));
        assert!(prompt.contains("JSON array"));
        assert!(prompt.contains("\"title\""));
        assert!(prompt.contains("\"summary\""));
    }

    #[test]
    fn test_chapter_prompt_embeds_target_range() {
        let entry = OutlineEntry::new(1, "启程", "主角离开村庄").unwrap();
        let prompt = build_chapter_prompt(&spec(), &entry, &[], None);
        assert!(prompt.contains("Target length: 500 words"));
        assert!(prompt.contains("400 to 600 words"));
        assert!(!prompt.contains("IMPORTANT"));
    }

    #[test]
    fn test_retry_hint_injects_minimum() {
        let entry = OutlineEntry::new(2, "夜行", "穿越森林").unwrap();
        let hint = RetryHint {
            previous_word_count: 280,
            min_words: 450,
        };
        let prompt = build_chapter_prompt(&spec(), &entry, &[], Some(&hint));
        assert!(prompt.contains("only 280 words"));
        assert!(prompt.contains("at least 450 words"));
    }

    #[test]
    fn test_prior_context_is_bounded() {
        let long_body = "word ".repeat(500);
        let chapters: Vec<Chapter> = (1..=4).map(|i| chapter(i, &long_body)).collect();
        let entry = OutlineEntry::new(5, "终章", "结局").unwrap();

        let prompt = build_chapter_prompt(&spec(), &entry, &chapters, None);

        // 最近两章全文
        assert!(prompt.contains("--- Chapter 3"));
        assert!(prompt.contains("--- Chapter 4"));
        // 早期章节只保留摘录
        assert!(!prompt.contains("--- Chapter 1"));
        assert!(prompt.contains("Chapter 1 (第1章)"));
        let excerpt_line = prompt
            .lines()
            .find(|l| l.starts_with("Chapter 1"))
            .unwrap();
        assert!(excerpt_line.len() < EARLIER_EXCERPT_CHARS + 100);
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let entry = OutlineEntry::new(1, "启程", "主角离开村庄").unwrap();
        let a = build_chapter_prompt(&spec(), &entry, &[], None);
        let b = build_chapter_prompt(&spec(), &entry, &[], None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "多字节字符串测试内容";
        assert_eq!(truncate_chars(text, 4), "多字节字");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
