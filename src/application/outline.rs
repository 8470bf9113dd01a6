//! Outline Synthesizer - 大纲合成
//!
//! 构建大纲提示词、调用补全网关一次、解析响应为章节大纲。
//! 解析策略：整体 JSON 解析优先，失败后回退到扫描响应中
//! 第一个配平的数组子串。本层不重试；大纲步骤的整体重试由 worker 负责。

use std::sync::Arc;

use serde::Deserialize;

use super::error::GenerationError;
use super::gateway::{CompletionGateway, CompletionOptions};
use crate::domain::build_outline_prompt;
use crate::domain::story::{OutlineEntry, StorySpec};

/// 大纲生成的采样温度
const OUTLINE_TEMPERATURE: f32 = 0.8;

/// 每章大纲条目的 token 预算
const TOKENS_PER_ENTRY: u32 = 150;

/// 模型输出中的单个大纲条目
#[derive(Debug, Deserialize)]
struct RawOutlineEntry {
    title: String,
    summary: String,
}

/// 大纲合成器
pub struct OutlineSynthesizer {
    gateway: Arc<CompletionGateway>,
}

impl OutlineSynthesizer {
    pub fn new(gateway: Arc<CompletionGateway>) -> Self {
        Self { gateway }
    }

    /// 生成章节大纲
    ///
    /// 结果恰好包含 spec.chapters 条，数量不符为硬失败
    pub async fn create_outline(
        &self,
        spec: &StorySpec,
    ) -> Result<Vec<OutlineEntry>, GenerationError> {
        let prompt = build_outline_prompt(spec);
        let max_tokens = (spec.chapters() * TOKENS_PER_ENTRY + 256).max(1024);

        let raw = self
            .gateway
            .request(
                "outline",
                prompt,
                CompletionOptions {
                    max_tokens,
                    temperature: OUTLINE_TEMPERATURE,
                },
            )
            .await?;

        let entries = parse_outline(&raw, spec.chapters())?;

        tracing::info!(
            chapters = entries.len(),
            title = %spec.title(),
            "Outline synthesized"
        );
        Ok(entries)
    }

    /// 校验调用方预先提供的大纲（跳过合成时使用）
    pub fn validate_supplied(
        &self,
        spec: &StorySpec,
        entries: &[OutlineEntry],
    ) -> Result<(), GenerationError> {
        if entries.len() as u32 != spec.chapters() {
            return Err(GenerationError::OutlineCountMismatch {
                expected: spec.chapters(),
                actual: entries.len() as u32,
            });
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.index() != i as u32 + 1 {
                return Err(GenerationError::OutlineParse(format!(
                    "supplied outline indices must be contiguous from 1, got {} at position {}",
                    entry.index(),
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

/// 解析模型输出为大纲条目序列
fn parse_outline(raw: &str, expected: u32) -> Result<Vec<OutlineEntry>, GenerationError> {
    let parsed: Vec<RawOutlineEntry> = match serde_json::from_str(raw.trim()) {
        Ok(entries) => entries,
        // 回退：扫描响应中第一个能解析为条目数组的配平子串
        Err(_) => extract_embedded_entries(raw).ok_or_else(|| {
            GenerationError::OutlineParse(
                "response contains no parseable JSON array of {title, summary}".to_string(),
            )
        })?,
    };

    if parsed.len() as u32 != expected {
        return Err(GenerationError::OutlineCountMismatch {
            expected,
            actual: parsed.len() as u32,
        });
    }

    parsed
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            OutlineEntry::new(i as u32 + 1, raw.title, raw.summary)
                .map_err(|e| GenerationError::OutlineParse(e.to_string()))
        })
        .collect()
}

/// 扫描文本，返回第一个能解析为大纲条目的嵌入数组
fn extract_embedded_entries(text: &str) -> Option<Vec<RawOutlineEntry>> {
    for (pos, _) in text.match_indices('[') {
        if let Some(candidate) = balanced_array_at(text, pos) {
            if let Ok(entries) = serde_json::from_str::<Vec<RawOutlineEntry>>(candidate) {
                return Some(entries);
            }
        }
    }
    None
}

/// 从 `start`（指向 '['）提取括号配平的数组子串
///
/// 跳过字符串字面量内部的方括号与转义字符
fn balanced_array_at(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'[' if !in_string => depth += 1,
            b']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
