//! Token counting and truncation under the gpt-4o (`o200k_base`) encoding.

use std::sync::LazyLock;

use devgen_utils::error::TokenizerError;
use tiktoken_rs::CoreBPE;

static SHARED: LazyLock<Result<Tokenizer, String>> = LazyLock::new(|| {
    tiktoken_rs::o200k_base()
        .map(|bpe| Tokenizer { bpe })
        .map_err(|e| e.to_string())
});

/// BPE tokenizer used for every budget in the pipeline.
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").field("encoding", &"o200k_base").finish()
    }
}

impl Tokenizer {
    /// Process-wide tokenizer, loaded on first use.
    pub fn shared() -> Result<&'static Tokenizer, TokenizerError> {
        SHARED
            .as_ref()
            .map_err(|e| TokenizerError::Unavailable(format!("failed to load o200k_base: {e}")))
    }

    /// Deterministic token count of `text`
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Cut `text` down to at most `budget` tokens.
    ///
    /// Text already within budget is returned unchanged, so the operation is
    /// idempotent. Otherwise the first `budget` tokens are decoded; when that
    /// slice ends inside a multi-byte character, or the decoded text re-encodes
    /// to more tokens, the slice is shortened until the result fits.
    pub fn truncate(&self, text: &str, budget: usize) -> Result<String, TokenizerError> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= budget {
            return Ok(text.to_string());
        }

        let mut take = budget;
        let mut last_error = None;
        while take > 0 {
            match self.bpe.decode(tokens[..take].to_vec()) {
                Ok(decoded) if self.count(&decoded) <= budget => return Ok(decoded),
                Ok(_) => {}
                Err(e) => last_error = Some(e.to_string()),
            }
            take -= 1;
        }

        if let Some(e) = last_error {
            tracing::debug!(error = %e, budget, "no decodable token prefix fits the budget");
        }
        Ok(String::new())
    }
}
