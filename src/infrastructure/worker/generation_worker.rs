//! Generation Worker - 任务状态机驱动循环
//!
//! 每个任务由单个后台 task 顺序推进:
//! Initialized → OutlineCreation → Drafting(1..N) → Completed，
//! Failed / Cancelled 为吸收态。
//!
//! 约定:
//! - 任务内严格串行：第 i+1 章的提示词依赖第 i 章已接受的正文
//! - 取消只在章节边界生效，从不中断在途请求
//! - 墙钟超时强制进入 Failed，错误标签区别于上游错误
//! - 循环从已接受章节数 +1 处开始起草，同一条路径服务
//!   新任务与恢复续跑；已有大纲时跳过合成

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::application::error::GenerationError;
use crate::application::ports::{JobError, JobFailure, JobRegistryPort, JobStatus};
use crate::application::{ChapterDrafter, OutlineSynthesizer};
use crate::domain::story::{Chapter, OutlineEntry, StorySpec};
use crate::infrastructure::events::{GenerationEvent, StreamPublisher};

/// Worker 配置
#[derive(Debug, Clone)]
pub struct GenerationWorkerConfig {
    /// 大纲阶段占总进度的份额（百分点）
    pub outline_progress_share: u8,
    /// 任务墙钟超时（秒）
    pub job_timeout_secs: u64,
    /// 每章接受后的节流延迟（毫秒），对外部端点的请求频率礼让
    pub inter_chapter_delay_ms: u64,
}

impl Default for GenerationWorkerConfig {
    fn default() -> Self {
        Self {
            outline_progress_share: 20,
            job_timeout_secs: 45 * 60,
            inter_chapter_delay_ms: 500,
        }
    }
}

/// 生成 Worker
///
/// 同一实例可同时驱动多个互不相关的任务；
/// 同一任务的推进权由注册表的 driver 认领保证唯一
pub struct GenerationWorker {
    config: GenerationWorkerConfig,
    registry: Arc<dyn JobRegistryPort>,
    synthesizer: Arc<OutlineSynthesizer>,
    drafter: Arc<ChapterDrafter>,
    publisher: Arc<StreamPublisher>,
}

impl GenerationWorker {
    pub fn new(
        config: GenerationWorkerConfig,
        registry: Arc<dyn JobRegistryPort>,
        synthesizer: Arc<OutlineSynthesizer>,
        drafter: Arc<ChapterDrafter>,
        publisher: Arc<StreamPublisher>,
    ) -> Self {
        Self {
            config,
            registry,
            synthesizer,
            drafter,
            publisher,
        }
    }

    /// 认领任务并在后台启动推进循环
    ///
    /// 返回是否成功启动；推进权已被占用时返回 false
    pub fn spawn(self: &Arc<Self>, job_id: &str) -> bool {
        match self.registry.claim_driver(job_id) {
            Ok(true) => {
                let worker = self.clone();
                let job_id = job_id.to_string();
                tokio::spawn(async move {
                    worker.run(job_id).await;
                });
                true
            }
            Ok(false) => {
                tracing::debug!(job_id = %job_id, "Job already has an active driver");
                false
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to claim job driver");
                false
            }
        }
    }

    async fn run(self: Arc<Self>, job_id: String) {
        let timeout = Duration::from_secs(self.config.job_timeout_secs);
        let deadline = Instant::now() + timeout;

        // 外层 timeout 兜底在途请求挂死；边界检查负责常规超时
        let outcome = tokio::time::timeout(timeout, self.drive(&job_id, deadline)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fail_job(&job_id, e),
            Err(_elapsed) => self.fail_job(&job_id, GenerationError::JobTimeout),
        }

        self.registry.release_driver(&job_id);

        // 终止后关闭流通道，所有监听者收尾
        if let Some(job) = self.registry.get(&job_id) {
            if job.status.is_terminal() {
                self.publisher.unregister(&job_id);
            }
        }
    }

    /// 推进任务直到终止或取消
    async fn drive(&self, job_id: &str, deadline: Instant) -> Result<(), GenerationError> {
        let job = self
            .registry
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        let spec = job.spec.clone();
        let total = spec.chapters();

        if self.stop_requested(job_id) {
            return Ok(());
        }

        let outline = if job.outline.is_empty() {
            match self.synthesize_outline(job_id, &spec).await? {
                Some(outline) => outline,
                // 大纲期间被取消
                None => return Ok(()),
            }
        } else {
            // 恢复续跑或调用方预供大纲
            job.outline.clone()
        };
        self.registry
            .set_progress(job_id, self.config.outline_progress_share)?;

        let mut accepted: Vec<Chapter> = job.chapters.clone();

        for index in accepted.len() as u32 + 1..=total {
            if self.stop_requested(job_id) {
                tracing::info!(job_id = %job_id, chapter = index, "Generation stopped before chapter");
                let _ = self
                    .registry
                    .log_event(job_id, format!("Cancelled before chapter {}", index));
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(GenerationError::JobTimeout);
            }

            let entry = &outline[index as usize - 1];
            if let Err(JobError::Terminal(_)) = self.registry.set_status(job_id, JobStatus::Drafting)
            {
                return Ok(());
            }
            self.registry.set_current_chapter(job_id, index)?;
            self.registry.log_event(
                job_id,
                format!("Drafting chapter {} of {}: {}", index, total, entry.title()),
            )?;
            self.publish_chapter_start(job_id, entry);

            let chapter = self.drafter.draft_chapter(&spec, entry, &accepted).await?;

            // 取消发生在起草期间也照常接受本章，只阻止下一章
            let accepted_count = self.registry.append_chapter(job_id, chapter.clone())?;
            let progress = self.progress_for(accepted_count, total);
            self.registry.set_progress(job_id, progress)?;
            self.registry.log_event(
                job_id,
                format!(
                    "Chapter {} accepted ({} words{})",
                    index,
                    chapter.word_count(),
                    if chapter.meets_target() {
                        ""
                    } else {
                        ", under target"
                    }
                ),
            )?;
            self.publisher.publish(
                job_id,
                GenerationEvent::ChapterComplete {
                    job_id: job_id.to_string(),
                    chapter: chapter.index(),
                    title: chapter.title().to_string(),
                    word_count: chapter.word_count(),
                    meets_target: chapter.meets_target(),
                    progress,
                },
            );
            accepted.push(chapter);

            if index < total && self.config.inter_chapter_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_chapter_delay_ms))
                    .await;
            }
        }

        match self.registry.complete(job_id) {
            Ok(()) => {
                let total_words: u32 = accepted.iter().map(|c| c.word_count()).sum();
                self.registry.log_event(
                    job_id,
                    format!(
                        "Generation complete: {} chapters, {} words",
                        accepted.len(),
                        total_words
                    ),
                )?;
                self.publisher.publish(
                    job_id,
                    GenerationEvent::Complete {
                        job_id: job_id.to_string(),
                        chapter_count: accepted.len() as u32,
                        total_words,
                    },
                );
                Ok(())
            }
            // 最后一章起草期间被取消
            Err(JobError::Terminal(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// 大纲合成步骤，整体重试至多一次
    ///
    /// 致命的网关错误（认证/校验）不参与步骤级重试；
    /// 任务已被取消时返回 None
    async fn synthesize_outline(
        &self,
        job_id: &str,
        spec: &StorySpec,
    ) -> Result<Option<Vec<OutlineEntry>>, GenerationError> {
        if let Err(JobError::Terminal(_)) =
            self.registry.set_status(job_id, JobStatus::OutlineCreation)
        {
            return Ok(None);
        }
        self.registry
            .log_event(job_id, "Creating chapter outline".to_string())?;
        self.publisher.publish(
            job_id,
            GenerationEvent::Status {
                job_id: job_id.to_string(),
                status: JobStatus::OutlineCreation.as_str().to_string(),
                progress: 0,
                message: "Creating chapter outline".to_string(),
            },
        );

        let outline = match self.synthesizer.create_outline(spec).await {
            Ok(outline) => outline,
            Err(first_err) if outline_step_retryable(&first_err) => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %first_err,
                    "Outline synthesis failed, retrying step once"
                );
                self.registry
                    .log_event(job_id, "Outline synthesis failed, retrying".to_string())?;
                self.synthesizer.create_outline(spec).await?
            }
            Err(fatal) => return Err(fatal),
        };

        self.registry.set_outline(job_id, outline.clone())?;
        self.registry.log_event(
            job_id,
            format!("Outline ready with {} chapters", outline.len()),
        )?;
        Ok(Some(outline))
    }

    fn publish_chapter_start(&self, job_id: &str, entry: &OutlineEntry) {
        self.publisher.publish(
            job_id,
            GenerationEvent::ChapterPlanning {
                job_id: job_id.to_string(),
                chapter: entry.index(),
                title: entry.title().to_string(),
            },
        );
        self.publisher.publish(
            job_id,
            GenerationEvent::ChapterWriting {
                job_id: job_id.to_string(),
                chapter: entry.index(),
                title: entry.title().to_string(),
            },
        );
    }

    /// 大纲份额 + 剩余份额按已接受章节线性插值
    fn progress_for(&self, accepted: u32, total: u32) -> u8 {
        let share = u32::from(self.config.outline_progress_share);
        let drafted = (100 - share) * accepted / total.max(1);
        (share + drafted).min(100) as u8
    }

    /// 任务被取消或已从注册表消失
    fn stop_requested(&self, job_id: &str) -> bool {
        match self.registry.get(job_id) {
            Some(job) => job.status == JobStatus::Cancelled,
            None => true,
        }
    }

    fn fail_job(&self, job_id: &str, error: GenerationError) {
        let failure = JobFailure {
            operation: error.operation(),
            message: error.to_string(),
        };
        let _ = self.registry.log_event(
            job_id,
            format!("Job failed during {}: {}", failure.operation, failure.message),
        );
        // 已终止（如被取消）时失败标记不再覆盖
        let _ = self.registry.fail(job_id, failure.clone());
        self.publisher.publish(
            job_id,
            GenerationEvent::Error {
                job_id: job_id.to_string(),
                operation: failure.operation,
                message: failure.message,
            },
        );
    }
}

/// 大纲步骤级重试的准入
///
/// 解析类失败可能因模型输出抖动而在重试后成功；
/// 认证/校验类失败重试无意义
fn outline_step_retryable(error: &GenerationError) -> bool {
    match error {
        GenerationError::OutlineParse(_) | GenerationError::OutlineCountMismatch { .. } => true,
        GenerationError::CompletionFailed { source, .. } => !source.is_fatal(),
        _ => false,
    }
}
