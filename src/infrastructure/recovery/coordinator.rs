//! Recovery Coordinator - 生成会话看门狗

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::application::ports::JobRegistryPort;
use crate::infrastructure::events::StreamPublisher;
use crate::infrastructure::worker::GenerationWorker;

/// 恢复协调器配置
#[derive(Debug, Clone)]
pub struct RecoveryCoordinatorConfig {
    /// 无任何事件（含心跳）视为卡死的静默窗口（秒）
    pub stall_timeout_secs: u64,
}

impl Default for RecoveryCoordinatorConfig {
    fn default() -> Self {
        Self {
            stall_timeout_secs: 300,
        }
    }
}

/// 恢复协调器
///
/// 每个流会话一个监视任务；监视任务只订阅事件，从不向通道写入
pub struct RecoveryCoordinator {
    config: RecoveryCoordinatorConfig,
    registry: Arc<dyn JobRegistryPort>,
    publisher: Arc<StreamPublisher>,
    worker: Arc<GenerationWorker>,
}

impl RecoveryCoordinator {
    pub fn new(
        config: RecoveryCoordinatorConfig,
        registry: Arc<dyn JobRegistryPort>,
        publisher: Arc<StreamPublisher>,
        worker: Arc<GenerationWorker>,
    ) -> Self {
        Self {
            config,
            registry,
            publisher,
            worker,
        }
    }

    /// 启动对一个流会话的监视
    pub fn watch(self: &Arc<Self>, job_id: &str) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            coordinator.monitor(job_id).await;
        })
    }

    async fn monitor(&self, job_id: String) {
        let stall = Duration::from_secs(self.config.stall_timeout_secs);
        let mut rx = match self.publisher.subscribe(&job_id) {
            Some(rx) => rx,
            None => {
                tracing::debug!(job_id = %job_id, "No stream channel to watch");
                return;
            }
        };

        loop {
            match tokio::time::timeout(stall, rx.recv()).await {
                Ok(Ok(event)) => {
                    if event.is_terminal() {
                        tracing::debug!(job_id = %job_id, "Watched stream reached terminal event");
                        return;
                    }
                }
                // 落后于广播缓冲只说明事件密集，会话是活的
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::debug!(job_id = %job_id, skipped = skipped, "Watcher lagged behind");
                }
                Ok(Err(RecvError::Closed)) => {
                    tracing::warn!(job_id = %job_id, "Stream channel closed mid-session");
                    self.fail_over(&job_id, "channel closed");
                    return;
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        job_id = %job_id,
                        stall_secs = self.config.stall_timeout_secs,
                        "Stream stalled, no events within window"
                    );
                    self.fail_over(&job_id, "stream stalled");
                    return;
                }
            }
        }
    }

    /// 推送路径失效后的故障转移
    ///
    /// 注销通道让后续交付回落到状态轮询；任务未终止且没有
    /// 活跃推进者时重新接管续跑
    fn fail_over(&self, job_id: &str, reason: &str) {
        self.publisher.unregister(job_id);

        let job = match self.registry.get(job_id) {
            Some(job) => job,
            None => return,
        };
        if job.status.is_terminal() {
            return;
        }

        let _ = self.registry.log_event(
            job_id,
            format!("Push delivery lost ({}), falling back to polling", reason),
        );

        // spawn 内部经由 driver 认领保证不会出现双推进者
        if self.worker.spawn(job_id) {
            tracing::info!(job_id = %job_id, reason = reason, "Generation resumed after failover");
        } else {
            tracing::info!(
                job_id = %job_id,
                reason = reason,
                "Driver still active, polling delivery continues"
            );
        }
    }
}
