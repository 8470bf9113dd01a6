//! Infrastructure Adapters - 出站适配器

pub mod llm;

pub use llm::{FakeCompletionClient, HttpCompletionClient, HttpCompletionClientConfig};
