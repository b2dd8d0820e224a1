//! Configuration for devgen: `.devgen/config.toml` discovery, environment
//! overrides, validation and source attribution.

mod discovery;
mod model;
mod sources;
mod validation;

pub use discovery::{ENV_CONTEXT_TOKEN_BUDGET, ENV_EMBEDDING, ENV_MAX_RETRIES, ENV_MODEL};
pub use model::*;
