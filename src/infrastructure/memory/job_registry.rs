//! In-Memory Job Registry Implementation
//!
//! 任务状态全部保存在进程内存中；终止态任务保留一段回收窗口
//! 供轮询方读取，由后台 GC 循环清除

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{
    GenerationJob, JobError, JobFailure, JobLogEntry, JobRegistryPort, JobResult, JobStatus,
};
use crate::domain::story::{Chapter, OutlineEntry};

/// 内存任务注册表
pub struct InMemoryJobRegistry {
    /// job_id -> GenerationJob
    jobs: DashMap<String, GenerationJob>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn with_job<T>(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut GenerationJob) -> Result<T, JobError>,
    ) -> Result<T, JobError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        let result = f(&mut job);
        job.updated_at = Utc::now();
        result
    }
}

impl Default for InMemoryJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistryPort for InMemoryJobRegistry {
    fn create(&self, job: GenerationJob) -> Result<String, JobError> {
        let job_id = job.job_id.clone();
        if self.jobs.contains_key(&job_id) {
            return Err(JobError::AlreadyExists(job_id));
        }
        self.jobs.insert(job_id.clone(), job);
        tracing::info!(job_id = %job_id, "Job created");
        Ok(job_id)
    }

    fn get(&self, job_id: &str) -> Option<GenerationJob> {
        self.jobs.get(job_id).map(|j| j.clone())
    }

    fn set_status(&self, job_id: &str, status: JobStatus) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            if job.status.is_terminal() {
                return Err(JobError::Terminal(job_id.to_string()));
            }
            let old = job.status;
            job.status = status;
            if status.is_terminal() {
                job.completed_at = Some(Utc::now());
            }
            tracing::debug!(
                job_id = %job_id,
                old_status = old.as_str(),
                new_status = status.as_str(),
                "Job status changed"
            );
            Ok(())
        })
    }

    fn set_outline(&self, job_id: &str, outline: Vec<OutlineEntry>) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            job.outline = outline;
            Ok(())
        })
    }

    fn append_chapter(&self, job_id: &str, chapter: Chapter) -> Result<u32, JobError> {
        self.with_job(job_id, |job| {
            let expected = job.chapters.len() as u32 + 1;
            if chapter.index() != expected {
                return Err(JobError::NonContiguousChapter {
                    expected,
                    actual: chapter.index(),
                });
            }
            job.chapters.push(chapter);
            Ok(job.chapters.len() as u32)
        })
    }

    fn set_progress(&self, job_id: &str, progress: u8) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            // 进度单调不减
            if progress > job.progress {
                job.progress = progress.min(100);
            }
            Ok(())
        })
    }

    fn set_current_chapter(&self, job_id: &str, chapter: u32) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            job.current_chapter = chapter;
            Ok(())
        })
    }

    fn log_event(&self, job_id: &str, message: String) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            job.log.push(JobLogEntry {
                at: Utc::now(),
                message,
            });
            Ok(())
        })
    }

    fn complete(&self, job_id: &str) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            if job.status.is_terminal() {
                return Err(JobError::Terminal(job_id.to_string()));
            }
            let chapters = job.chapters.clone();
            let total_words = chapters.iter().map(|c| c.word_count()).sum();
            let all_meet_target = chapters.iter().all(|c| c.meets_target());
            job.result = Some(JobResult {
                chapter_count: chapters.len() as u32,
                total_words,
                all_meet_target,
                chapters,
            });
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.completed_at = Some(Utc::now());
            tracing::info!(
                job_id = %job_id,
                total_words = total_words,
                "Job completed"
            );
            Ok(())
        })
    }

    fn fail(&self, job_id: &str, failure: JobFailure) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            if job.status.is_terminal() {
                return Err(JobError::Terminal(job_id.to_string()));
            }
            tracing::error!(
                job_id = %job_id,
                operation = %failure.operation,
                error = %failure.message,
                "Job failed"
            );
            job.failure = Some(failure);
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    fn cancel(&self, job_id: &str) -> Result<bool, JobError> {
        self.with_job(job_id, |job| {
            if job.status.is_terminal() {
                // 对终止任务幂等
                return Ok(false);
            }
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
            tracing::info!(job_id = %job_id, "Job cancelled");
            Ok(true)
        })
    }

    fn claim_driver(&self, job_id: &str) -> Result<bool, JobError> {
        self.with_job(job_id, |job| {
            if job.driving {
                return Ok(false);
            }
            job.driving = true;
            Ok(true)
        })
    }

    fn release_driver(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.driving = false;
        }
    }

    fn remove(&self, job_id: &str) {
        if self.jobs.remove(job_id).is_some() {
            tracing::debug!(job_id = %job_id, "Job removed");
        }
    }

    fn sweep_expired(&self, retention_secs: u64) -> usize {
        let now = Utc::now();
        let retention = chrono::Duration::seconds(retention_secs as i64);

        let expired: Vec<String> = self
            .jobs
            .iter()
            .filter_map(|entry| {
                let terminal_since = entry.completed_at?;
                if entry.status.is_terminal() && now - terminal_since > retention {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        let count = expired.len();
        for job_id in expired {
            self.jobs.remove(&job_id);
        }
        if count > 0 {
            tracing::info!(count = count, "Expired jobs swept");
        }
        count
    }
}

/// 启动注册表 GC 循环
///
/// 周期性清除终止超过保留窗口的任务，约束内存占用
pub fn spawn_registry_gc(
    registry: Arc<dyn JobRegistryPort>,
    interval: Duration,
    retention_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            registry.sweep_expired(retention_secs);
        }
    })
}
