//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::ports::{GenerationJob, JobResult};
use crate::domain::story::{Chapter, OutlineEntry, StoryError, StorySpec};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// Story DTOs
// ============================================================================

/// 故事规格请求体
#[derive(Debug, Deserialize)]
pub struct StorySpecDto {
    pub title: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub subgenre: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub total_words: u32,
    pub chapters: u32,
    #[serde(default)]
    pub words_per_chapter: u32,
    #[serde(default = "default_variance")]
    pub variance: u32,
}

fn default_variance() -> u32 {
    200
}

impl StorySpecDto {
    /// 转换为领域规格，校验失败即拒绝请求
    pub fn into_spec(self) -> Result<StorySpec, StoryError> {
        StorySpec::new(
            self.title,
            self.genre,
            self.subgenre,
            self.synopsis,
            self.total_words,
            self.chapters,
            self.words_per_chapter,
            self.variance,
        )
    }
}

/// 大纲条目（请求与响应共用）
#[derive(Debug, Serialize, Deserialize)]
pub struct OutlineItemDto {
    pub index: u32,
    pub title: String,
    pub summary: String,
}

impl OutlineItemDto {
    pub fn from_entry(entry: &OutlineEntry) -> Self {
        Self {
            index: entry.index(),
            title: entry.title().to_string(),
            summary: entry.summary().to_string(),
        }
    }

    pub fn into_entry(self) -> Result<OutlineEntry, StoryError> {
        OutlineEntry::new(self.index, self.title, self.summary)
    }
}

#[derive(Debug, Deserialize)]
pub struct OutlineRequest {
    pub spec: StorySpecDto,
}

#[derive(Debug, Serialize)]
pub struct OutlineResponseDto {
    pub entries: Vec<OutlineItemDto>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub spec: StorySpecDto,
    /// 预先提供的大纲，存在时跳过合成
    #[serde(default)]
    pub outline: Option<Vec<OutlineItemDto>>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponseDto {
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChapterDto {
    pub index: u32,
    pub title: String,
    pub content: String,
    pub word_count: u32,
    pub meets_target: bool,
    pub retries_used: u32,
}

impl ChapterDto {
    pub fn from_chapter(chapter: &Chapter) -> Self {
        Self {
            index: chapter.index(),
            title: chapter.title().to_string(),
            content: chapter.content().to_string(),
            word_count: chapter.word_count(),
            meets_target: chapter.meets_target(),
            retries_used: chapter.retries_used(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResultDto {
    pub chapter_count: u32,
    pub total_words: u32,
    pub all_meet_target: bool,
    pub chapters: Vec<ChapterDto>,
}

impl JobResultDto {
    pub fn from_result(result: &JobResult) -> Self {
        Self {
            chapter_count: result.chapter_count,
            total_words: result.total_words,
            all_meet_target: result.all_meet_target,
            chapters: result.chapters.iter().map(ChapterDto::from_chapter).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponseDto {
    pub job_id: String,
    pub status: String,
    pub progress: u8,
    pub chapters_accepted: u32,
    pub total_chapters: u32,
    pub current_chapter: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResultDto>,
}

impl StatusResponseDto {
    pub fn from_job(job: &GenerationJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status.as_str().to_string(),
            progress: job.progress,
            chapters_accepted: job.chapters.len() as u32,
            total_chapters: job.spec.chapters(),
            current_chapter: job.current_chapter,
            latest_event: job.latest_event().map(str::to_string),
            error: job.failure.as_ref().map(|f| f.message.clone()),
            failed_operation: job.failure.as_ref().map(|f| f.operation.clone()),
            result: job.result.as_ref().map(JobResultDto::from_result),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreamStartResponseDto {
    pub stream_id: String,
    pub subscribe_url: String,
}
