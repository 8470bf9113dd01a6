//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod completion;
mod job_registry;

pub use completion::{CompletionError, CompletionPort, CompletionRequest};
pub use job_registry::{
    GenerationJob, JobError, JobFailure, JobLogEntry, JobRegistryPort, JobResult, JobStatus,
};
