//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping              GET   健康检查
//! - /api/story/outline     POST  同步合成大纲（不创建任务）
//! - /api/story/generate    POST  提交批处理生成任务（轮询交付）
//! - /api/story/status      POST  查询任务状态
//! - /api/story/cancel      POST  取消任务
//! - /api/story/stream      POST  提交流式生成会话（推送交付）
//! - /ws/stream/{id}        WS    流会话事件订阅

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route(
            "/ws/stream/:stream_id",
            get(handlers::stream_websocket_handler),
        )
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/story", story_routes())
}

/// Story 路由
fn story_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/outline", post(handlers::create_outline))
        .route("/generate", post(handlers::generate))
        .route("/status", post(handlers::status))
        .route("/cancel", post(handlers::cancel))
        .route("/stream", post(handlers::start_stream))
}
