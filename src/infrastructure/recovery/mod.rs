//! Recovery Layer - 流会话恢复协调
//!
//! 监视每个流会话的事件通道，区分三种情况：
//! - 正常事件流（含心跳）：会话存活
//! - 通道关闭或长时间静默：推送路径失效
//! - 任务已终止：监视结束
//!
//! 推送路径失效且任务未终止时执行故障转移：注销失效通道，
//! 让任务回落到纯轮询交付，并在任务失去推进者时重新接管。
//! 已接受的章节前缀原样保留，续跑从下一章开始。

mod coordinator;

pub use coordinator::{RecoveryCoordinator, RecoveryCoordinatorConfig};
