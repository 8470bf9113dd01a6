//! Fabler - LLM 长篇小说生成编排服务
//!
//! 架构:
//! - Domain: story/ (规格、大纲、章节、质量门), prompt
//! - Application: gateway, outline, drafter, ports
//! - Infrastructure: http, memory, worker, events, recovery, adapters

use std::sync::Arc;
use std::time::Duration;

use fabler::application::{
    ChapterDrafter, ChapterDrafterConfig, CompletionGateway, OutlineSynthesizer, RetryPolicy,
};
use fabler::config::{load_config, print_config};
use fabler::infrastructure::adapters::{HttpCompletionClient, HttpCompletionClientConfig};
use fabler::infrastructure::events::StreamPublisher;
use fabler::infrastructure::http::{AppState, HttpServer, ServerConfig};
use fabler::infrastructure::memory::{spawn_registry_gc, InMemoryJobRegistry};
use fabler::infrastructure::recovery::{RecoveryCoordinator, RecoveryCoordinatorConfig};
use fabler::infrastructure::worker::{GenerationWorker, GenerationWorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},fabler={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Fabler - LLM 长篇小说生成编排服务");
    print_config(&config);

    // 创建 LLM 补全客户端
    let llm_config = HttpCompletionClientConfig {
        base_url: config.llm.base_url.clone(),
        api_key: config.llm.api_key.clone(),
        model: config.llm.model.clone(),
        timeout_secs: config.llm.timeout_secs,
    };
    let engine = Arc::new(
        HttpCompletionClient::new(llm_config)
            .map_err(|e| anyhow::anyhow!("Failed to build completion client: {}", e))?,
    );

    // 补全网关：有界重试 + 错误分类
    let policy = RetryPolicy {
        max_attempts: config.llm.max_attempts,
        base_backoff: Duration::from_millis(config.llm.base_backoff_ms),
        max_backoff: Duration::from_millis(config.llm.max_backoff_ms),
    };
    let gateway = Arc::new(CompletionGateway::new(engine, policy));

    let synthesizer = Arc::new(OutlineSynthesizer::new(gateway.clone()));
    let drafter = Arc::new(ChapterDrafter::new(
        gateway,
        ChapterDrafterConfig {
            max_attempts: config.generation.max_chapter_attempts,
            first_temperature: config.generation.first_temperature,
            retry_temperature: config.generation.retry_temperature,
        },
    ));

    // 内存任务注册表 + 事件发布器
    let registry = InMemoryJobRegistry::new().arc();
    let publisher = StreamPublisher::new().arc();

    // 生成 Worker
    let worker = Arc::new(GenerationWorker::new(
        GenerationWorkerConfig {
            outline_progress_share: config.generation.outline_progress_share,
            job_timeout_secs: config.generation.job_timeout_secs,
            inter_chapter_delay_ms: config.generation.inter_chapter_delay_ms,
        },
        registry.clone(),
        synthesizer.clone(),
        drafter,
        publisher.clone(),
    ));

    // 恢复协调器
    let recovery = Arc::new(RecoveryCoordinator::new(
        RecoveryCoordinatorConfig {
            stall_timeout_secs: config.generation.stall_timeout_secs,
        },
        registry.clone(),
        publisher.clone(),
        worker.clone(),
    ));

    // 终止任务 GC
    if config.gc.enabled {
        spawn_registry_gc(
            registry.clone(),
            Duration::from_secs(config.gc.interval_secs),
            config.gc.retention_secs,
        );
    }

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        registry,
        publisher,
        synthesizer,
        worker,
        recovery,
        Duration::from_secs(config.generation.heartbeat_secs),
        config.server.public_base_url(),
    ));

    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
