//! Fixed-order concatenation of a snapshot into the context document.
//!
//! Order: structure, important files (fetch order), languages, existing
//! devcontainer.json, existing compose file. The truncator relies on the
//! languages section closing the protected prefix.

use crate::model::{
    EXISTING_COMPOSE_LABEL, EXISTING_DEVCONTAINER_LABEL, LANGUAGES_LABEL, RepositoryContext,
    RepositorySnapshot, STRUCTURE_LABEL, file_label,
};
use crate::section::{
    self, EXISTING_COMPOSE_CLOSE, EXISTING_COMPOSE_OPEN, EXISTING_DEVCONTAINER_CLOSE,
    EXISTING_DEVCONTAINER_OPEN, Section,
};
use crate::tokens::Tokenizer;

/// Sections of `snapshot` in context order
#[must_use]
pub fn sections(snapshot: &RepositorySnapshot) -> Vec<Section> {
    let mut sections = Vec::with_capacity(snapshot.files.len() + 4);

    sections.push(Section::new(STRUCTURE_LABEL, snapshot.structure.join("\n")));
    sections.extend(
        snapshot
            .files
            .iter()
            .map(|file| Section::new(file_label(file.name()), file.content.as_str())),
    );
    sections.push(Section::new(LANGUAGES_LABEL, snapshot.languages.render()));

    if let Some(existing) = &snapshot.existing_devcontainer {
        sections.push(Section::new(
            EXISTING_DEVCONTAINER_LABEL,
            section::encode_block(
                EXISTING_DEVCONTAINER_OPEN,
                EXISTING_DEVCONTAINER_CLOSE,
                &existing.content,
            ),
        ));
    }
    if let Some(existing) = &snapshot.existing_compose {
        sections.push(Section::new(
            EXISTING_COMPOSE_LABEL,
            section::encode_block(EXISTING_COMPOSE_OPEN, EXISTING_COMPOSE_CLOSE, &existing.content),
        ));
    }

    sections
}

/// Assemble the context document and count its tokens
pub fn assemble(snapshot: &RepositorySnapshot, tokenizer: &Tokenizer) -> RepositoryContext {
    let text = section::encode(&sections(snapshot));
    let tokens = tokenizer.count(&text);

    tracing::debug!(
        repo_url = %snapshot.repo_url,
        sections = snapshot.files.len() + 2,
        file_tokens = snapshot.file_tokens,
        tokens,
        "assembled repository context"
    );

    RepositoryContext::new(text, tokens, false)
}
