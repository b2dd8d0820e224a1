//! Generation loop, configuration store and the end-to-end pipeline.

pub mod generation;
pub mod pipeline;
pub mod retry;
pub mod store;

#[cfg(test)]
mod test_support;

pub use generation::{
    ExistingBlocks, Generated, GenerationRequest, GenerationSettings, generate_configuration,
};
pub use pipeline::{ContextReport, GenerationOutput, Pipeline, PipelineSettings, context_report};
pub use retry::{AttemptOutcome, Attempted, RetryPolicy, run_bounded};
pub use store::{
    ConfigStore, FileStore, InMemoryStore, StoredConfiguration, content_hash, store_from_config,
};
