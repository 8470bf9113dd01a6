//! Memory Layer - 内存实现

mod job_registry;

pub use job_registry::{spawn_registry_gc, InMemoryJobRegistry};
