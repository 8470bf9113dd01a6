//! 端到端生成流程测试
//!
//! 用脚本化的 Fake 补全客户端驱动完整编排：
//! 大纲合成 → 逐章起草（质量门）→ 状态机终止，
//! 以及流式交付、取消与恢复故障转移。

use std::sync::Arc;
use std::time::Duration;

use fabler::application::ports::{
    CompletionError, GenerationJob, JobRegistryPort, JobStatus,
};
use fabler::application::{
    ChapterDrafter, ChapterDrafterConfig, CompletionGateway, OutlineSynthesizer, RetryPolicy,
};
use fabler::domain::story::{Chapter, OutlineEntry, StorySpec};
use fabler::infrastructure::adapters::FakeCompletionClient;
use fabler::infrastructure::events::{GenerationEvent, StreamPublisher};
use fabler::infrastructure::http::{create_routes, AppState};
use fabler::infrastructure::memory::InMemoryJobRegistry;
use fabler::infrastructure::recovery::{RecoveryCoordinator, RecoveryCoordinatorConfig};
use fabler::infrastructure::worker::{GenerationWorker, GenerationWorkerConfig};

struct Harness {
    fake: Arc<FakeCompletionClient>,
    registry: Arc<dyn JobRegistryPort>,
    publisher: Arc<StreamPublisher>,
    worker: Arc<GenerationWorker>,
    recovery: Arc<RecoveryCoordinator>,
    state: Arc<AppState>,
}

fn harness() -> Harness {
    harness_with(Duration::ZERO, 1)
}

fn harness_with(completion_delay: Duration, stall_timeout_secs: u64) -> Harness {
    let fake = Arc::new(FakeCompletionClient::new().with_delay(completion_delay));
    let policy = RetryPolicy {
        max_attempts: 3,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    };
    let gateway = Arc::new(CompletionGateway::new(fake.clone(), policy));
    let synthesizer = Arc::new(OutlineSynthesizer::new(gateway.clone()));
    let drafter = Arc::new(ChapterDrafter::new(gateway, ChapterDrafterConfig::default()));

    let registry: Arc<dyn JobRegistryPort> = Arc::new(InMemoryJobRegistry::new());
    let publisher = Arc::new(StreamPublisher::new());

    let worker = Arc::new(GenerationWorker::new(
        GenerationWorkerConfig {
            outline_progress_share: 20,
            job_timeout_secs: 30,
            inter_chapter_delay_ms: 0,
        },
        registry.clone(),
        synthesizer.clone(),
        drafter,
        publisher.clone(),
    ));
    let recovery = Arc::new(RecoveryCoordinator::new(
        RecoveryCoordinatorConfig { stall_timeout_secs },
        registry.clone(),
        publisher.clone(),
        worker.clone(),
    ));
    let state = Arc::new(AppState::new(
        registry.clone(),
        publisher.clone(),
        synthesizer,
        worker.clone(),
        recovery.clone(),
        Duration::from_millis(50),
        "http://localhost:5070".to_string(),
    ));

    Harness {
        fake,
        registry,
        publisher,
        worker,
        recovery,
        state,
    }
}

fn words(n: usize) -> String {
    vec!["lorem"; n].join(" ")
}

fn outline_json(n: usize) -> String {
    let entries: Vec<String> = (1..=n)
        .map(|i| format!(r#"{{"title": "Chapter {i}", "summary": "What happens in chapter {i}."}}"#))
        .collect();
    format!("[{}]", entries.join(","))
}

fn spec(chapters: u32) -> StorySpec {
    StorySpec::new(
        "The Long Road",
        "fantasy",
        "epic",
        "A courier crosses a dying empire.",
        0,
        chapters,
        500,
        100,
    )
    .unwrap()
}

async fn wait_terminal(registry: &Arc<dyn JobRegistryPort>, job_id: &str) -> GenerationJob {
    for _ in 0..600 {
        if let Some(job) = registry.get(job_id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

// ============================================================================
// 批处理模式
// ============================================================================

#[tokio::test]
async fn batch_job_runs_outline_then_chapters_to_completion() {
    let h = harness();
    h.fake.push_text(outline_json(3));
    for _ in 0..3 {
        h.fake.push_text(words(500));
    }

    let job_id = h.registry.create(GenerationJob::new(spec(3))).unwrap();
    assert!(h.worker.spawn(&job_id));

    let job = wait_terminal(&h.registry, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.outline.len(), 3);

    let result = job.result.expect("completed job must carry a result");
    assert_eq!(result.chapter_count, 3);
    assert_eq!(result.total_words, 1500);
    assert!(result.all_meet_target);

    // 日志记录了每个阶段
    let log: Vec<&str> = job.log.iter().map(|e| e.message.as_str()).collect();
    assert!(log.iter().any(|m| m.contains("outline")));
    assert!(log.iter().any(|m| m.contains("Chapter 3 accepted")));
    assert!(log.iter().any(|m| m.contains("Generation complete")));

    // 1 次大纲 + 3 次章节请求
    assert_eq!(h.fake.call_count(), 4);
}

#[tokio::test]
async fn quality_gate_retries_short_chapter_then_accepts_under_target() {
    // 目标 500 / 偏差 100：首次下限 400，重试下限 450
    let h = harness();
    h.fake.push_text(outline_json(2));
    h.fake.push_text(words(500)); // 第 1 章首发达标
    h.fake.push_text(words(300)); // 第 2 章首发过短
    h.fake.push_text(words(420)); // 重试仍低于 450，照常接受

    let job_id = h.registry.create(GenerationJob::new(spec(2))).unwrap();
    assert!(h.worker.spawn(&job_id));

    let job = wait_terminal(&h.registry, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);

    let result = job.result.unwrap();
    assert!(!result.all_meet_target);
    assert!(result.chapters[0].meets_target());
    assert_eq!(result.chapters[0].retries_used(), 0);
    assert!(!result.chapters[1].meets_target());
    assert_eq!(result.chapters[1].retries_used(), 1);
    assert_eq!(result.chapters[1].word_count(), 420);

    // 重试提示词注入了 90% 下限与上次差额
    let requests = h.fake.requests();
    assert!(requests[3].prompt.contains("at least 450 words"));
    assert!(requests[3].prompt.contains("only 300 words"));
    // 重试温度更低
    assert!(requests[3].temperature < requests[2].temperature);
}

#[tokio::test]
async fn fatal_auth_error_fails_job_with_operation_label() {
    let h = harness();
    h.fake.push_text(outline_json(2));
    h.fake.push_text(words(500));
    h.fake
        .push_error(CompletionError::Auth("HTTP 401: bad key".into()));

    let job_id = h.registry.create(GenerationJob::new(spec(2))).unwrap();
    assert!(h.worker.spawn(&job_id));

    let job = wait_terminal(&h.registry, &job_id).await;
    assert_eq!(job.status, JobStatus::Failed);

    let failure = job.failure.expect("failed job must carry an error record");
    assert_eq!(failure.operation, "chapter 2");
    assert!(failure.message.contains("bad key"));

    // 第 1 章已接受，失败发生在章节边界
    assert_eq!(job.chapters.len(), 1);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn repeated_status_reads_do_not_advance_the_job() {
    let h = harness();
    h.fake.push_text(outline_json(2));
    h.fake.push_text(words(500));
    h.fake.push_text(words(500));

    let job_id = h.registry.create(GenerationJob::new(spec(2))).unwrap();
    assert!(h.worker.spawn(&job_id));
    let job = wait_terminal(&h.registry, &job_id).await;

    let again = h.registry.get(&job_id).unwrap();
    assert_eq!(job.progress, again.progress);
    assert_eq!(job.chapters.len(), again.chapters.len());
    assert_eq!(job.log.len(), again.log.len());
}

#[tokio::test]
async fn cancellation_stops_at_chapter_boundary() {
    let h = harness_with(Duration::from_millis(60), 60);
    h.fake.push_text(outline_json(5));
    for _ in 0..5 {
        h.fake.push_text(words(500));
    }

    let job_id = h.registry.create(GenerationJob::new(spec(5))).unwrap();
    assert!(h.worker.spawn(&job_id));

    // 等第一章落位后请求取消
    for _ in 0..300 {
        if h.registry
            .get(&job_id)
            .map(|j| !j.chapters.is_empty())
            .unwrap_or(false)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.registry.cancel(&job_id).unwrap());

    let job = wait_terminal(&h.registry, &job_id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.result.is_none());

    // 在途章节允许完成，但不再起草全部 5 章
    tokio::time::sleep(Duration::from_millis(400)).await;
    let job = h.registry.get(&job_id).unwrap();
    assert!(job.chapters.len() < 5);

    // 再次取消幂等
    assert!(!h.registry.cancel(&job_id).unwrap());
}

// ============================================================================
// 流式模式
// ============================================================================

#[tokio::test]
async fn stream_session_broadcasts_typed_events_in_order() {
    let h = harness();
    h.fake.push_text(outline_json(2));
    h.fake.push_text(words(500));
    h.fake.push_text(words(500));

    let job_id = h.registry.create(GenerationJob::new(spec(2))).unwrap();
    let mut rx = h.publisher.register(&job_id);
    assert!(h.worker.spawn(&job_id));

    let mut seen = Vec::new();
    loop {
        match rx.recv().await {
            Ok(event) => {
                let terminal = event.is_terminal();
                seen.push(event);
                if terminal {
                    break;
                }
            }
            Err(e) => panic!("channel closed before terminal event: {e}"),
        }
    }

    assert!(matches!(seen.first(), Some(GenerationEvent::Status { .. })));
    let planning = seen
        .iter()
        .filter(|e| matches!(e, GenerationEvent::ChapterPlanning { .. }))
        .count();
    let complete = seen
        .iter()
        .filter(|e| matches!(e, GenerationEvent::ChapterComplete { .. }))
        .count();
    assert_eq!(planning, 2);
    assert_eq!(complete, 2);
    match seen.last() {
        Some(GenerationEvent::Complete {
            chapter_count,
            total_words,
            ..
        }) => {
            assert_eq!(*chapter_count, 2);
            assert_eq!(*total_words, 1000);
        }
        other => panic!("expected terminal Complete, got {other:?}"),
    }

    // 终止后通道被注销
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!h.publisher.is_registered(&job_id));
}

#[tokio::test]
async fn stream_failure_broadcasts_error_event() {
    let h = harness();
    for _ in 0..6 {
        h.fake
            .push_error(CompletionError::Server("HTTP 503".into()));
    }

    let job_id = h.registry.create(GenerationJob::new(spec(2))).unwrap();
    let mut rx = h.publisher.register(&job_id);
    assert!(h.worker.spawn(&job_id));

    let mut terminal = None;
    while let Ok(event) = rx.recv().await {
        if event.is_terminal() {
            terminal = Some(event);
            break;
        }
    }
    match terminal {
        Some(GenerationEvent::Error {
            operation, message, ..
        }) => {
            assert_eq!(operation, "outline");
            assert!(message.contains("HTTP 503"));
        }
        other => panic!("expected Error event, got {other:?}"),
    }
}

// ============================================================================
// 恢复与故障转移
// ============================================================================

#[tokio::test]
async fn watchdog_resumes_stalled_job_preserving_accepted_prefix() {
    let h = harness_with(Duration::ZERO, 1);

    // 推进者消失的会话：大纲齐全，前 3 章已接受，通道静默
    let mut job = GenerationJob::new(spec(7));
    job.outline = (1..=7)
        .map(|i| OutlineEntry::new(i, format!("Chapter {i}"), "summary").unwrap())
        .collect();
    job.chapters = (1..=3)
        .map(|i| Chapter::new(i, format!("Chapter {i}"), words(500), true, 0).unwrap())
        .collect();
    job.status = JobStatus::Drafting;
    let prefix = job.chapters.clone();
    let job_id = h.registry.create(job).unwrap();
    h.publisher.register(&job_id);

    for _ in 0..4 {
        h.fake.push_text(words(500));
    }

    h.recovery.watch(&job_id);
    let job = wait_terminal(&h.registry, &job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.chapters.len(), 7);
    // 已接受前缀原样保留，未重新起草
    assert_eq!(&job.chapters[..3], &prefix[..]);
    assert_eq!(h.fake.call_count(), 4);
    // 故障转移后推送路径已拆除，交付回落到轮询
    assert!(!h.publisher.is_registered(&job_id));
    assert!(job
        .log
        .iter()
        .any(|e| e.message.contains("falling back to polling")));
}

#[tokio::test]
async fn watchdog_ignores_terminal_jobs() {
    let h = harness_with(Duration::ZERO, 1);
    let mut job = GenerationJob::new(spec(2));
    job.status = JobStatus::Drafting;
    let job_id = h.registry.create(job).unwrap();
    h.publisher.register(&job_id);
    h.registry.cancel(&job_id).unwrap();

    let handle = h.recovery.watch(&job_id);
    handle.await.unwrap();

    assert_eq!(h.fake.call_count(), 0);
    assert_eq!(
        h.registry.get(&job_id).unwrap().status,
        JobStatus::Cancelled
    );
}

// ============================================================================
// HTTP 层
// ============================================================================

mod http_api {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn router(h: &Harness) -> axum::Router {
        create_routes().with_state(h.state.clone())
    }

    async fn post_json(router: axum::Router, uri: &str, body: Value) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ping_reports_ok() {
        let h = harness();
        let request = Request::builder()
            .uri("/api/ping")
            .body(Body::empty())
            .unwrap();
        let response = router(&h).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn generate_then_poll_status_to_completion() {
        let h = harness();
        h.fake.push_text(outline_json(2));
        h.fake.push_text(words(500));
        h.fake.push_text(words(500));

        let body = post_json(
            router(&h),
            "/api/story/generate",
            json!({
                "spec": {
                    "title": "The Long Road",
                    "genre": "fantasy",
                    "chapters": 2,
                    "words_per_chapter": 500,
                    "variance": 100
                }
            }),
        )
        .await;
        assert_eq!(body["errno"], 0);
        let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

        wait_terminal(&h.registry, &job_id).await;

        let status = post_json(
            router(&h),
            "/api/story/status",
            json!({ "job_id": job_id }),
        )
        .await;
        assert_eq!(status["errno"], 0);
        let data = &status["data"];
        assert_eq!(data["status"], "completed");
        assert_eq!(data["progress"], 100);
        assert_eq!(data["chapters_accepted"], 2);
        assert_eq!(data["total_chapters"], 2);
        assert_eq!(data["result"]["total_words"], 1000);
    }

    #[tokio::test]
    async fn invalid_spec_is_rejected_with_errno_400() {
        let h = harness();
        let body = post_json(
            router(&h),
            "/api/story/generate",
            json!({
                "spec": { "title": "   ", "chapters": 2, "words_per_chapter": 500 }
            }),
        )
        .await;
        assert_eq!(body["errno"], 400);
        assert_eq!(h.fake.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_job_status_is_errno_404() {
        let h = harness();
        let body = post_json(
            router(&h),
            "/api/story/status",
            json!({ "job_id": "no-such-job" }),
        )
        .await;
        assert_eq!(body["errno"], 404);
    }

    #[tokio::test]
    async fn mismatched_supplied_outline_is_rejected() {
        let h = harness();
        let body = post_json(
            router(&h),
            "/api/story/generate",
            json!({
                "spec": { "title": "t", "chapters": 3, "words_per_chapter": 500 },
                "outline": [
                    { "index": 1, "title": "a", "summary": "s" },
                    { "index": 2, "title": "b", "summary": "s" }
                ]
            }),
        )
        .await;
        assert_eq!(body["errno"], 400);
    }

    #[tokio::test]
    async fn stream_start_returns_subscribe_url_and_runs_to_completion() {
        let h = harness();
        h.fake.push_text(outline_json(2));
        h.fake.push_text(words(500));
        h.fake.push_text(words(500));

        let body = post_json(
            router(&h),
            "/api/story/stream",
            json!({
                "spec": { "title": "t", "chapters": 2, "words_per_chapter": 500, "variance": 100 }
            }),
        )
        .await;
        assert_eq!(body["errno"], 0);
        let stream_id = body["data"]["stream_id"].as_str().unwrap().to_string();
        let url = body["data"]["subscribe_url"].as_str().unwrap();
        assert!(url.starts_with("ws://"));
        assert!(url.ends_with(&format!("/ws/stream/{stream_id}")));

        let job = wait_terminal(&h.registry, &stream_id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_over_http() {
        let h = harness_with(Duration::from_millis(60), 60);
        h.fake.push_text(outline_json(3));
        for _ in 0..3 {
            h.fake.push_text(words(500));
        }

        let body = post_json(
            router(&h),
            "/api/story/generate",
            json!({
                "spec": { "title": "t", "chapters": 3, "words_per_chapter": 500, "variance": 100 }
            }),
        )
        .await;
        let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

        let first = post_json(router(&h), "/api/story/cancel", json!({ "job_id": job_id })).await;
        assert_eq!(first["errno"], 0);
        let second = post_json(router(&h), "/api/story/cancel", json!({ "job_id": job_id })).await;
        assert_eq!(second["errno"], 0);

        let job = wait_terminal(&h.registry, &job_id).await;
        assert_eq!(job.status, JobStatus::Cancelled);
    }
}
