//! Heartbeat - 流会话心跳
//!
//! 独立于生成进度的周期性存活信号，让监听者与恢复协调器
//! 能区分“仍在工作”和“静默卡死”

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::JobRegistryPort;

use super::publisher::{GenerationEvent, StreamPublisher};

/// 启动一个流会话的心跳任务
///
/// 任务终止或通道注销后自行退出
pub fn spawn_heartbeat(
    publisher: Arc<StreamPublisher>,
    registry: Arc<dyn JobRegistryPort>,
    stream_id: String,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一个 tick 立即返回，跳过
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if !publisher.is_registered(&stream_id) {
                break;
            }
            match registry.get(&stream_id) {
                Some(job) if !job.status.is_terminal() => {
                    publisher.publish(
                        &stream_id,
                        GenerationEvent::Heartbeat {
                            job_id: stream_id.clone(),
                            at: Utc::now(),
                        },
                    );
                }
                _ => break,
            }
        }
        tracing::debug!(stream_id = %stream_id, "Heartbeat stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{GenerationJob, JobFailure};
    use crate::domain::story::StorySpec;
    use crate::infrastructure::memory::InMemoryJobRegistry;

    fn new_job() -> GenerationJob {
        let spec =
            StorySpec::new("测试", "fantasy", "epic", "梗概", 0, 3, 500, 100).unwrap();
        GenerationJob::new(spec)
    }

    #[tokio::test]
    async fn test_heartbeat_ticks_while_job_active() {
        let registry: Arc<dyn JobRegistryPort> = Arc::new(InMemoryJobRegistry::new());
        let publisher = Arc::new(StreamPublisher::new());

        let job_id = registry.create(new_job()).unwrap();
        let mut rx = publisher.register(&job_id);

        let _handle = spawn_heartbeat(
            publisher.clone(),
            registry.clone(),
            job_id.clone(),
            Duration::from_millis(10),
        );

        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
                .await
                .expect("heartbeat not received in time")
                .unwrap();
            assert!(matches!(event, GenerationEvent::Heartbeat { .. }));
        }
    }

    #[tokio::test]
    async fn test_heartbeat_stops_on_terminal_job() {
        let registry: Arc<dyn JobRegistryPort> = Arc::new(InMemoryJobRegistry::new());
        let publisher = Arc::new(StreamPublisher::new());

        let job_id = registry.create(new_job()).unwrap();
        let _rx = publisher.register(&job_id);
        registry
            .fail(
                &job_id,
                JobFailure {
                    operation: "outline".to_string(),
                    message: "boom".to_string(),
                },
            )
            .unwrap();

        let handle = spawn_heartbeat(
            publisher.clone(),
            registry.clone(),
            job_id.clone(),
            Duration::from_millis(5),
        );

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("heartbeat task did not stop")
            .unwrap();
    }
}
