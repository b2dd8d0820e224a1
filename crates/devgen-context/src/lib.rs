//! Repository context for devgen
//!
//! - [`tokens`]: token counting and truncation against a budget
//! - [`section`]: the `<<SECTION: … >>` delimiter codec
//! - [`model`]: fetched repository data and the assembled context
//! - [`assembler`]: fixed-order concatenation of sections
//! - [`truncate`]: budget enforcement that protects the structural prefix

pub mod assembler;
pub mod model;
pub mod section;
pub mod tokens;
pub mod truncate;

pub use assembler::assemble;
pub use model::{
    ExistingFile, FetchedFile, LanguageProfile, RepositoryContext, RepositorySnapshot,
};
pub use section::Section;
pub use tokens::Tokenizer;
pub use truncate::truncate_context;
