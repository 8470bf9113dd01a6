//! Stream WebSocket Handler
//!
//! 客户端订阅一个流会话的事件。连接断开只影响该连接，
//! 通道与生成循环不受影响；客户端可重连并从当前进度继续接收。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::infrastructure::events::GenerationEvent;
use crate::infrastructure::http::state::AppState;

/// 流会话 WebSocket 连接处理
pub async fn stream_websocket_handler(
    ws: WebSocketUpgrade,
    Path(stream_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream_socket(socket, stream_id, state))
}

async fn handle_stream_socket(socket: WebSocket, stream_id: String, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // 会话通道必须已注册；不存在则拒绝连接
    let mut event_rx = match state.publisher.subscribe(&stream_id) {
        Some(rx) => rx,
        None => {
            tracing::warn!(stream_id = %stream_id, "WebSocket rejected: unknown stream");
            let _ = sender.close().await;
            return;
        }
    };

    tracing::info!(stream_id = %stream_id, "Stream WebSocket connected");

    // 握手事件：订阅者只收到此后的事件，没有历史回放
    let connected = GenerationEvent::Connected {
        job_id: stream_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&connected) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    let stream_id_for_forward = stream_id.clone();
    let stream_id_for_receive = stream_id.clone();

    // 事件转发任务
    let forward_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    let msg = match serde_json::to_string(&event) {
                        Ok(json) => Message::Text(json),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize event");
                            continue;
                        }
                    };

                    if let Err(e) = sender.send(msg).await {
                        tracing::debug!(
                            stream_id = %stream_id_for_forward,
                            error = %e,
                            "Failed to send WebSocket message"
                        );
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                // 落后只丢中间事件，继续接收
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        stream_id = %stream_id_for_forward,
                        skipped = skipped,
                        "WebSocket subscriber lagged"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
        let _ = sender.close().await;
    });

    // 接收客户端消息（心跳与关闭）
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!(stream_id = %stream_id_for_receive, "WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(stream_id = %stream_id_for_receive, error = %e, "WebSocket error");
                    break;
                }
                // Ping 由 axum 自动回 pong；其他消息忽略
                _ => {}
            }
        }
    });

    // 等待任一任务完成
    tokio::select! {
        _ = forward_task => {}
        _ = receive_task => {}
    }

    // 连接级清理只到此为止；通道归会话所有，等终止时由 worker 注销
    tracing::info!(stream_id = %stream_id, "Stream WebSocket disconnected");
}
