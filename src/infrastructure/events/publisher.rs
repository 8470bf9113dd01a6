//! Stream Publisher - 生成事件广播
//!
//! 每个流会话一条 broadcast 通道；生成循环向通道发布类型化事件，
//! 监听者（WebSocket 连接、恢复协调器）各自订阅。
//! 无接收者时发布只记 debug 日志，从不影响生成。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// 通道缓冲容量
const CHANNEL_CAPACITY: usize = 256;

/// 生成事件
///
/// 封闭的标签联合，穷尽匹配；新增事件类型是编译期检查的变更
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum GenerationEvent {
    /// 订阅握手
    Connected { job_id: String },
    /// 状态/进度变更
    Status {
        job_id: String,
        status: String,
        progress: u8,
        message: String,
    },
    /// 开始准备某章（读取大纲条目）
    ChapterPlanning {
        job_id: String,
        chapter: u32,
        title: String,
    },
    /// 某章起草中
    ChapterWriting {
        job_id: String,
        chapter: u32,
        title: String,
    },
    /// 某章已接受
    ChapterComplete {
        job_id: String,
        chapter: u32,
        title: String,
        word_count: u32,
        meets_target: bool,
        progress: u8,
    },
    /// 全部章节完成（终止）
    Complete {
        job_id: String,
        chapter_count: u32,
        total_words: u32,
    },
    /// 任务失败（终止）
    Error {
        job_id: String,
        operation: String,
        message: String,
    },
    /// 心跳 - 独立于生成进度的存活信号
    Heartbeat { job_id: String, at: DateTime<Utc> },
}

impl GenerationEvent {
    /// 是否为流的终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationEvent::Complete { .. } | GenerationEvent::Error { .. }
        )
    }
}

/// 流事件发布器
pub struct StreamPublisher {
    /// stream_id -> broadcast sender
    channels: DashMap<String, broadcast::Sender<GenerationEvent>>,
}

impl StreamPublisher {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 注册流会话的事件通道
    pub fn register(&self, stream_id: &str) -> broadcast::Receiver<GenerationEvent> {
        if let Some(sender) = self.channels.get(stream_id) {
            return sender.subscribe();
        }
        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        self.channels.insert(stream_id.to_string(), tx);
        tracing::debug!(stream_id = %stream_id, "Stream channel registered");
        rx
    }

    /// 注销流会话（关闭通道，所有订阅者收到 Closed）
    pub fn unregister(&self, stream_id: &str) {
        if self.channels.remove(stream_id).is_some() {
            tracing::debug!(stream_id = %stream_id, "Stream channel unregistered");
        }
    }

    /// 订阅流会话的事件
    pub fn subscribe(&self, stream_id: &str) -> Option<broadcast::Receiver<GenerationEvent>> {
        self.channels.get(stream_id).map(|s| s.subscribe())
    }

    /// 会话通道是否仍然注册
    pub fn is_registered(&self, stream_id: &str) -> bool {
        self.channels.contains_key(stream_id)
    }

    /// 发布事件到指定流
    ///
    /// 未注册的流（批处理任务）与无接收者的通道都是无操作
    pub fn publish(&self, stream_id: &str, event: GenerationEvent) {
        if let Some(sender) = self.channels.get(stream_id) {
            if let Err(e) = sender.send(event) {
                tracing::debug!(
                    stream_id = %stream_id,
                    error = %e,
                    "Failed to publish event (no receivers)"
                );
            }
        }
    }
}

impl Default for StreamPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let publisher = StreamPublisher::new();
        let mut rx = publisher.register("s1");

        publisher.publish(
            "s1",
            GenerationEvent::Connected {
                job_id: "s1".to_string(),
            },
        );

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, GenerationEvent::Connected { .. }));
    }

    #[tokio::test]
    async fn test_publish_without_channel_is_noop() {
        let publisher = StreamPublisher::new();
        // 未注册的流：批处理任务
        publisher.publish(
            "batch-job",
            GenerationEvent::Heartbeat {
                job_id: "batch-job".to_string(),
                at: Utc::now(),
            },
        );
    }

    #[tokio::test]
    async fn test_unregister_closes_subscribers() {
        let publisher = StreamPublisher::new();
        let mut rx = publisher.register("s1");
        publisher.unregister("s1");

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(!publisher.is_registered("s1"));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_only_subsequent_events() {
        let publisher = StreamPublisher::new();
        let _rx_early = publisher.register("s1");

        publisher.publish(
            "s1",
            GenerationEvent::Status {
                job_id: "s1".to_string(),
                status: "drafting".to_string(),
                progress: 40,
                message: "before".to_string(),
            },
        );

        let mut late = publisher.subscribe("s1").unwrap();
        publisher.publish(
            "s1",
            GenerationEvent::Status {
                job_id: "s1".to_string(),
                status: "drafting".to_string(),
                progress: 60,
                message: "after".to_string(),
            },
        );

        // 晚订阅者只收到订阅之后的事件，没有历史回放
        match late.recv().await.unwrap() {
            GenerationEvent::Status { progress, .. } => assert_eq!(progress, 60),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = GenerationEvent::ChapterComplete {
            job_id: "j".to_string(),
            chapter: 2,
            title: "夜行".to_string(),
            word_count: 1980,
            meets_target: true,
            progress: 43,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chapter_complete");
        assert_eq!(json["data"]["chapter"], 2);
    }

    #[test]
    fn test_terminal_events() {
        assert!(GenerationEvent::Complete {
            job_id: "j".to_string(),
            chapter_count: 3,
            total_words: 6000,
        }
        .is_terminal());
        assert!(GenerationEvent::Error {
            job_id: "j".to_string(),
            operation: "outline".to_string(),
            message: "boom".to_string(),
        }
        .is_terminal());
        assert!(!GenerationEvent::Heartbeat {
            job_id: "j".to_string(),
            at: Utc::now(),
        }
        .is_terminal());
    }
}
