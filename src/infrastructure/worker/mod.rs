//! Worker Layer - 后台生成循环

mod generation_worker;

pub use generation_worker::{GenerationWorker, GenerationWorkerConfig};
