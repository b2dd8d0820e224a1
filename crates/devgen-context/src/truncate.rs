//! Budget enforcement for the assembled context.
//!
//! Everything up to and including the `Repository Languages` end marker is
//! the protected prefix. Only the text after it is cut, unless the prefix
//! alone is over budget, in which case the prefix is cut and the rest dropped.

use devgen_utils::error::TokenizerError;

use crate::model::{LANGUAGES_LABEL, RepositoryContext};
use crate::section;
use crate::tokens::Tokenizer;

/// Return a context whose token count is at most `budget`.
///
/// A context already within budget is returned unchanged.
pub fn truncate_context(
    context: &RepositoryContext,
    budget: usize,
    tokenizer: &Tokenizer,
) -> Result<RepositoryContext, TokenizerError> {
    if context.tokens() <= budget {
        return Ok(context.clone());
    }

    let text = context.as_str();
    // Without a languages marker nothing is protected
    let split = section::end_offset(text, LANGUAGES_LABEL).unwrap_or(0);
    let (important, remaining) = text.split_at(split);
    let important_tokens = tokenizer.count(important);

    if important_tokens > budget {
        tracing::warn!(
            important_tokens,
            budget,
            "protected context exceeds budget; cutting structure and dropping file bodies"
        );
        let cut = tokenizer.truncate(important, budget)?;
        let tokens = tokenizer.count(&cut);
        return Ok(RepositoryContext::new(cut, tokens, true));
    }

    // Token counts are not additive across a join, so shrink the tail
    // allowance until the joined text fits.
    let mut allowance = budget - important_tokens;
    loop {
        let tail = tokenizer.truncate(remaining, allowance)?;
        let joined = format!("{important}{tail}");
        let tokens = tokenizer.count(&joined);
        if tokens <= budget {
            tracing::info!(
                before = context.tokens(),
                after = tokens,
                budget,
                "truncated repository context"
            );
            return Ok(RepositoryContext::new(joined, tokens, true));
        }
        if allowance == 0 {
            let cut = tokenizer.truncate(&joined, budget)?;
            let tokens = tokenizer.count(&cut);
            return Ok(RepositoryContext::new(cut, tokens, true));
        }
        allowance = allowance.saturating_sub(tokens - budget);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::model::{FetchedFile, LanguageProfile, RepositorySnapshot, STRUCTURE_LABEL};
    use proptest::prelude::*;

    fn tokenizer() -> &'static Tokenizer {
        Tokenizer::shared().unwrap()
    }

    fn snapshot(structure_lines: usize, file_body: &str) -> RepositorySnapshot {
        RepositorySnapshot {
            repo_url: "https://github.com/acme/widgets".to_string(),
            structure: (0..structure_lines).map(|i| format!("dir_{i}/")).collect(),
            files: vec![FetchedFile {
                path: "README.md".to_string(),
                content: file_body.to_string(),
                tokens: tokenizer().count(file_body),
            }],
            file_tokens: tokenizer().count(file_body),
            languages: LanguageProfile {
                entries: vec![("Python".to_string(), 1234)],
            },
            existing_devcontainer: None,
            existing_compose: None,
        }
    }

    #[test]
    fn test_within_budget_is_unchanged() {
        let context = assemble(&snapshot(3, "short readme"), tokenizer());
        let out = truncate_context(&context, context.tokens(), tokenizer()).unwrap();
        assert_eq!(out, context);
        assert!(!out.is_truncated());
    }

    #[test]
    fn test_protected_prefix_survives() {
        let mut snap = snapshot(3, "");
        snap.files.clear();
        // Files come before languages, so push bulky text after the prefix
        // through an existing-config section instead.
        snap.existing_devcontainer = Some(devgen_existing("word ".repeat(2_000)));
        let context = assemble(&snap, tokenizer());

        let split = section::end_offset(context.as_str(), LANGUAGES_LABEL).unwrap();
        let prefix = &context.as_str()[..split];
        let budget = tokenizer().count(prefix) + 50;
        let out = truncate_context(&context, budget, tokenizer()).unwrap();

        assert!(out.tokens() <= budget);
        assert!(out.is_truncated());
        assert!(out.as_str().starts_with(prefix));
        assert!(out.as_str().len() > prefix.len());
    }

    #[test]
    fn test_prefix_over_budget_is_hard_cut() {
        let context = assemble(&snapshot(400, "tail"), tokenizer());
        let out = truncate_context(&context, 40, tokenizer()).unwrap();

        assert!(out.tokens() <= 40);
        assert!(out.as_str().starts_with("<<SECTION: Repository Structure >>"));
        assert!(section::end_offset(out.as_str(), LANGUAGES_LABEL).is_none());
    }

    #[test]
    fn test_file_sections_before_languages_are_protected() {
        let body = "install instructions ".repeat(50);
        let context = assemble(&snapshot(2, &body), tokenizer());
        let out = truncate_context(&context, context.tokens() - 1, tokenizer()).unwrap();

        // Nothing follows languages, so the whole context is the prefix
        assert!(out.tokens() < context.tokens());
        assert_eq!(section::count(out.as_str(), STRUCTURE_LABEL), 1);
    }

    fn devgen_existing(content: String) -> crate::model::ExistingFile {
        crate::model::ExistingFile {
            content,
            source_url: "https://raw.githubusercontent.com/acme/widgets/main/.devcontainer.json"
                .to_string(),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_output_within_budget(
            lines in 0usize..40,
            body in "\\PC{0,300}",
            tail in "\\PC{0,600}",
            budget in 1usize..400,
        ) {
            let mut snap = snapshot(lines, &body);
            snap.existing_devcontainer = Some(devgen_existing(tail));
            let context = assemble(&snap, tokenizer());
            let out = truncate_context(&context, budget, tokenizer()).unwrap();

            prop_assert!(out.tokens() <= budget);
            prop_assert_eq!(out.tokens(), tokenizer().count(out.as_str()));
        }

        #[test]
        fn prop_truncation_is_idempotent(
            lines in 0usize..20,
            tail in "[a-z ]{0,800}",
            budget in 1usize..300,
        ) {
            let mut snap = snapshot(lines, "readme");
            snap.existing_devcontainer = Some(devgen_existing(tail));
            let context = assemble(&snap, tokenizer());
            let once = truncate_context(&context, budget, tokenizer()).unwrap();
            let twice = truncate_context(&once, budget, tokenizer()).unwrap();

            prop_assert_eq!(once.as_str(), twice.as_str());
        }
    }
}
