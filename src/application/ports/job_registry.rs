//! Job Registry Port - 生成任务注册表
//!
//! 定义任务生命周期管理的抽象接口，具体实现在 infrastructure/memory 层。
//! 注册表是唯一的共享可变结构；同一任务只允许一个推进者（driver）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::story::{Chapter, OutlineEntry, StorySpec};

/// Job Registry 错误
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job is terminal: {0}")]
    Terminal(String),

    #[error("Non-contiguous chapter append: expected index {expected}, got {actual}")]
    NonContiguousChapter { expected: u32, actual: u32 },
}

/// 任务状态
///
/// `Failed` 和 `Cancelled` 为吸收态，可从任意非终止态进入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已分配，尚未开始
    Initialized,
    /// 正在生成大纲
    OutlineCreation,
    /// 正在逐章起草
    Drafting,
    /// 全部章节完成
    Completed,
    /// 失败（终止）
    Failed,
    /// 已取消（终止）
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Initialized => "initialized",
            JobStatus::OutlineCreation => "outline_creation",
            JobStatus::Drafting => "drafting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// 人类可读事件日志条目（追加写）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// 终止错误记录
///
/// operation 标明失败的操作，供调用方区分
/// “输入无效”与“可整体重试”的失败
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub operation: String,
    pub message: String,
}

/// 聚合结果 - 仅在 Completed 后存在
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub chapters: Vec<Chapter>,
    pub chapter_count: u32,
    pub total_words: u32,
    pub all_meet_target: bool,
}

/// 生成任务
///
/// 不变量:
/// - chapters 是前缀完整的：第 i+1 章接受前第 i 章必须已接受
/// - progress 单调不减
/// - 终止态后除 GC 外不再变更
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub job_id: String,
    pub spec: StorySpec,
    pub outline: Vec<OutlineEntry>,
    pub chapters: Vec<Chapter>,
    pub status: JobStatus,
    pub progress: u8,
    pub current_chapter: u32,
    pub log: Vec<JobLogEntry>,
    pub failure: Option<JobFailure>,
    pub result: Option<JobResult>,
    /// 当前是否有推进者持有该任务
    pub driving: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    pub fn new(spec: StorySpec) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            spec,
            outline: Vec::new(),
            chapters: Vec::new(),
            status: JobStatus::Initialized,
            progress: 0,
            current_chapter: 0,
            log: Vec::new(),
            failure: None,
            result: None,
            driving: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// 最近一条日志
    pub fn latest_event(&self) -> Option<&str> {
        self.log.last().map(|e| e.message.as_str())
    }
}

/// Job Registry Port
///
/// 管理任务的生命周期；所有状态存储在内存中，终止后保留一段
/// 回收窗口供轮询方读取，随后被 GC 清除
pub trait JobRegistryPort: Send + Sync {
    /// 注册新任务
    fn create(&self, job: GenerationJob) -> Result<String, JobError>;

    /// 获取任务快照（克隆，不阻塞）
    fn get(&self, job_id: &str) -> Option<GenerationJob>;

    /// 设置任务状态；终止态任务拒绝变更
    fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), JobError>;

    /// 写入大纲（每任务一次）
    fn set_outline(&self, job_id: &str, outline: Vec<OutlineEntry>) -> Result<(), JobError>;

    /// 追加已接受章节，要求严格延续前缀；返回接受后的章节数
    fn append_chapter(&self, job_id: &str, chapter: Chapter) -> Result<u32, JobError>;

    /// 更新进度；只允许单调递增（回退值被忽略）
    fn set_progress(&self, job_id: &str, progress: u8) -> Result<(), JobError>;

    /// 更新当前正在处理的章节序号
    fn set_current_chapter(&self, job_id: &str, chapter: u32) -> Result<(), JobError>;

    /// 追加人类可读事件日志
    fn log_event(&self, job_id: &str, message: String) -> Result<(), JobError>;

    /// 标记完成并聚合结果
    fn complete(&self, job_id: &str) -> Result<(), JobError>;

    /// 标记失败并记录终止错误
    fn fail(&self, job_id: &str, failure: JobFailure) -> Result<(), JobError>;

    /// 请求取消；对已终止任务幂等，返回是否发生了状态变更
    fn cancel(&self, job_id: &str) -> Result<bool, JobError>;

    /// 认领推进权；同一任务同时只有一个推进者
    fn claim_driver(&self, job_id: &str) -> Result<bool, JobError>;

    /// 释放推进权
    fn release_driver(&self, job_id: &str);

    /// 删除任务
    fn remove(&self, job_id: &str);

    /// 清除终止超过保留窗口的任务，返回清除数量
    fn sweep_expired(&self, retention_secs: u64) -> usize;
}
