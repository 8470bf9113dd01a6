//! Application State

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::JobRegistryPort;
use crate::application::OutlineSynthesizer;
use crate::infrastructure::events::StreamPublisher;
use crate::infrastructure::recovery::RecoveryCoordinator;
use crate::infrastructure::worker::GenerationWorker;

/// 应用状态
///
/// 注册表与发布器为内存实现；worker 与恢复协调器共享同一份
pub struct AppState {
    pub registry: Arc<dyn JobRegistryPort>,
    pub publisher: Arc<StreamPublisher>,
    pub synthesizer: Arc<OutlineSynthesizer>,
    pub worker: Arc<GenerationWorker>,
    pub recovery: Arc<RecoveryCoordinator>,

    /// 流会话的心跳间隔
    pub heartbeat_interval: Duration,
    /// 公开的 Base URL，用于拼接流订阅地址
    pub public_base_url: String,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn JobRegistryPort>,
        publisher: Arc<StreamPublisher>,
        synthesizer: Arc<OutlineSynthesizer>,
        worker: Arc<GenerationWorker>,
        recovery: Arc<RecoveryCoordinator>,
        heartbeat_interval: Duration,
        public_base_url: String,
    ) -> Self {
        Self {
            registry,
            publisher,
            synthesizer,
            worker,
            recovery,
            heartbeat_interval,
            public_base_url,
        }
    }

    /// 流订阅地址（WebSocket）
    pub fn subscribe_url(&self, stream_id: &str) -> String {
        let ws_base = self
            .public_base_url
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        format!("{}/ws/stream/{}", ws_base.trim_end_matches('/'), stream_id)
    }
}
