//! Story Handlers
//!
//! 生成任务的提交、查询与取消。`generate` 走批处理模式（轮询交付）；
//! `stream` 在同一状态机上附加流式推送（事件通道 + 心跳 + 看门狗）。

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::ports::GenerationJob;
use crate::domain::story::OutlineEntry;
use crate::infrastructure::events::spawn_heartbeat;
use crate::infrastructure::http::dto::{
    ApiResponse, Empty, GenerateRequest, GenerateResponseDto, JobIdRequest, OutlineItemDto,
    OutlineRequest, OutlineResponseDto, StatusResponseDto, StreamStartResponseDto,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// Outline
// ============================================================================

/// 同步合成大纲，不创建任务
pub async fn create_outline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OutlineRequest>,
) -> Result<Json<ApiResponse<OutlineResponseDto>>, ApiError> {
    let spec = req.spec.into_spec()?;
    let entries = state.synthesizer.create_outline(&spec).await?;

    Ok(Json(ApiResponse::success(OutlineResponseDto {
        entries: entries.iter().map(OutlineItemDto::from_entry).collect(),
    })))
}

// ============================================================================
// Generate (batch mode)
// ============================================================================

/// 提交批处理生成任务，立即返回 job_id
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<ApiResponse<GenerateResponseDto>>, ApiError> {
    let job = build_job(&state, req)?;
    let job_id = state.registry.create(job)?;

    if !state.worker.spawn(&job_id) {
        return Err(ApiError::Internal(format!(
            "Failed to start generation for job {}",
            job_id
        )));
    }

    tracing::info!(job_id = %job_id, "Generation job submitted");
    Ok(Json(ApiResponse::success(GenerateResponseDto { job_id })))
}

/// 校验请求并构建任务记录
///
/// 预供大纲在此处校验数量与序号，校验失败整个请求被拒绝
fn build_job(state: &Arc<AppState>, req: GenerateRequest) -> Result<GenerationJob, ApiError> {
    let spec = req.spec.into_spec()?;

    let mut job = GenerationJob::new(spec);
    if let Some(items) = req.outline {
        let entries: Vec<OutlineEntry> = items
            .into_iter()
            .map(OutlineItemDto::into_entry)
            .collect::<Result<_, _>>()?;
        state
            .synthesizer
            .validate_supplied(&job.spec, &entries)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        job.outline = entries;
    }
    Ok(job)
}

// ============================================================================
// Status / Cancel
// ============================================================================

/// 查询任务状态快照；重复查询不改变任务状态
pub async fn status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<StatusResponseDto>>, ApiError> {
    let job = state
        .registry
        .get(&req.job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", req.job_id)))?;

    Ok(Json(ApiResponse::success(StatusResponseDto::from_job(
        &job,
    ))))
}

/// 请求取消；对已终止任务幂等
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JobIdRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let changed = state.registry.cancel(&req.job_id)?;
    if changed {
        tracing::info!(job_id = %req.job_id, "Cancellation requested");
    }

    Ok(Json(ApiResponse::ok()))
}

// ============================================================================
// Stream (push mode)
// ============================================================================

/// 提交流式生成会话
///
/// 与 `generate` 同一条状态机，额外注册事件通道、
/// 启动心跳与恢复看门狗；stream_id 即 job_id
pub async fn start_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<ApiResponse<StreamStartResponseDto>>, ApiError> {
    let job = build_job(&state, req)?;
    let job_id = state.registry.create(job)?;

    // 通道必须先于 worker 注册，首个事件不丢失
    state.publisher.register(&job_id);

    if !state.worker.spawn(&job_id) {
        state.publisher.unregister(&job_id);
        state.registry.remove(&job_id);
        return Err(ApiError::Internal(format!(
            "Failed to start generation for stream {}",
            job_id
        )));
    }

    spawn_heartbeat(
        state.publisher.clone(),
        state.registry.clone(),
        job_id.clone(),
        state.heartbeat_interval,
    );
    state.recovery.watch(&job_id);

    tracing::info!(stream_id = %job_id, "Stream session started");

    let subscribe_url = state.subscribe_url(&job_id);
    Ok(Json(ApiResponse::success(StreamStartResponseDto {
        stream_id: job_id,
        subscribe_url,
    })))
}
