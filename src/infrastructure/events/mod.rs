//! Events Layer - 流式事件推送

mod heartbeat;
mod publisher;

pub use heartbeat::spawn_heartbeat;
pub use publisher::{GenerationEvent, StreamPublisher};
