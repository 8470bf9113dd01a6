//! Fabler - LLM 长篇小说生成编排服务
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Story Context: 故事规格、大纲、章节与质量门规则
//! - Prompt: 纯函数的提示词构建
//!
//! 应用层 (application/):
//! - Ports: 端口定义（CompletionPort, JobRegistryPort）
//! - Gateway: 补全网关（有界重试 + 错误分类）
//! - Outline / Drafter: 大纲合成与逐章起草
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Memory: JobRegistry 内存实现 + GC
//! - Worker: 生成状态机驱动循环
//! - Events: 流事件广播与心跳
//! - Recovery: 流会话看门狗与故障转移
//! - Adapters: LLM 补全客户端

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
