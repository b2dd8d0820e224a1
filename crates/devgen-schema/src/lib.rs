//! Devcontainer document types, the completion output contract, and schema
//! validation.

pub mod compose;
pub mod contract;
pub mod devcontainer;
pub mod validator;

pub use compose::{ComposeDocument, ComposeService, validate_compose};
pub use contract::{
    GenerationEnvelope, RESPONSE_SCHEMA_NAME, RenderFailure, RenderedDocuments, parse_envelope,
    response_schema,
};
pub use devcontainer::{BuildConfig, ComposeFileRef, DevContainer, LifecycleCommand};
pub use validator::{
    ValidationOutcome, base_schema, check_devcontainer, validate_against, validate_devcontainer,
};
