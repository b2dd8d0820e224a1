//! Delimiter codec for the flattened context document.
//!
//! A section is written as
//!
//! ```text
//! <<SECTION: label >>
//! body
//! <<END_SECTION: label >>
//! ```
//!
//! and existing-configuration payloads are wrapped in
//! `<<EXISTING_DEVCONTAINER>>` / `<<EXISTING_DOCKER_COMPOSE>>` blocks.
//! [`decode`] inverts [`encode`] for any bodies that do not themselves contain
//! an end marker for the same label.

use serde::{Deserialize, Serialize};

const START_PREFIX: &str = "<<SECTION: ";
const END_PREFIX: &str = "<<END_SECTION: ";
const MARKER_SUFFIX: &str = " >>";

/// Section separator in the flattened context
pub const SECTION_JOIN: &str = "\n\n";

pub const EXISTING_DEVCONTAINER_OPEN: &str = "<<EXISTING_DEVCONTAINER>>";
pub const EXISTING_DEVCONTAINER_CLOSE: &str = "<<END_EXISTING_DEVCONTAINER>>";
pub const EXISTING_COMPOSE_OPEN: &str = "<<EXISTING_DOCKER_COMPOSE>>";
pub const EXISTING_COMPOSE_CLOSE: &str = "<<END_EXISTING_DOCKER_COMPOSE>>";

/// One labelled section of the context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub label: String,
    pub body: String,
}

impl Section {
    pub fn new(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}\n{}\n{}",
            start_marker(&self.label),
            self.body,
            end_marker(&self.label)
        )
    }
}

#[must_use]
pub fn start_marker(label: &str) -> String {
    format!("{START_PREFIX}{label}{MARKER_SUFFIX}")
}

#[must_use]
pub fn end_marker(label: &str) -> String {
    format!("{END_PREFIX}{label}{MARKER_SUFFIX}")
}

/// Encode sections in order, separated by [`SECTION_JOIN`]
#[must_use]
pub fn encode(sections: &[Section]) -> String {
    sections
        .iter()
        .map(Section::encode)
        .collect::<Vec<_>>()
        .join(SECTION_JOIN)
}

/// Decode every well-formed section in `text`, in document order.
///
/// A start marker without its matching end marker ends decoding, which is
/// what a context cut by truncation looks like.
#[must_use]
pub fn decode(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(START_PREFIX) {
        let after_prefix = &rest[start + START_PREFIX.len()..];
        let Some(label_end) = after_prefix.find(MARKER_SUFFIX) else {
            break;
        };
        let label = &after_prefix[..label_end];
        let after_marker = &after_prefix[label_end + MARKER_SUFFIX.len()..];
        let Some(body_start) = after_marker.strip_prefix('\n') else {
            rest = after_marker;
            continue;
        };

        let closing = format!("\n{}", end_marker(label));
        let Some(body_len) = body_start.find(&closing) else {
            break;
        };

        sections.push(Section::new(label, &body_start[..body_len]));
        rest = &body_start[body_len + closing.len()..];
    }

    sections
}

/// Body of the first section labelled `label`
#[must_use]
pub fn find<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let start = start_marker(label);
    let from = text.find(&start)? + start.len();
    let body = text[from..].strip_prefix('\n')?;
    let end = body.find(&format!("\n{}", end_marker(label)))?;
    Some(&body[..end])
}

/// Byte offset just past the first end marker for `label`
#[must_use]
pub fn end_offset(text: &str, label: &str) -> Option<usize> {
    let marker = end_marker(label);
    text.find(&marker).map(|pos| pos + marker.len())
}

/// Number of start markers for `label`
#[must_use]
pub fn count(text: &str, label: &str) -> usize {
    text.matches(&start_marker(label)).count()
}

/// Wrap `body` in an open/close block pair
#[must_use]
pub fn encode_block(open: &str, close: &str, body: &str) -> String {
    format!("{open}\n{}\n{close}", body.trim())
}

/// Trimmed content of the first `open`…`close` block
#[must_use]
pub fn extract_block<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let from = text.find(open)? + open.len();
    let len = text[from..].find(close)?;
    Some(text[from..from + len].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Section> {
        vec![
            Section::new("Repository Structure", "src/\n    main.rs\nCargo.toml"),
            Section::new("Content of Cargo.toml", "[package]\nname = \"widgets\""),
            Section::new("Repository Languages", "Rust: 1200 lines"),
        ]
    }

    #[test]
    fn test_encode_format() {
        let encoded = Section::new("Repository Languages", "Python: 10 lines").encode();
        assert_eq!(
            encoded,
            "<<SECTION: Repository Languages >>\nPython: 10 lines\n<<END_SECTION: Repository Languages >>"
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let sections = sample();
        assert_eq!(decode(&encode(&sections)), sections);
    }

    #[test]
    fn test_decode_handles_empty_body_and_noise() {
        let text = format!(
            "preamble\n{}\n\ntrailing",
            Section::new("Repository Structure", "").encode()
        );
        assert_eq!(decode(&text), vec![Section::new("Repository Structure", "")]);
    }

    #[test]
    fn test_decode_stops_at_cut_section() {
        let mut text = encode(&sample());
        text.push_str("\n\n<<SECTION: Content of README.md >>\n# Wid");
        assert_eq!(decode(&text).len(), 3);
    }

    #[test]
    fn test_find_and_end_offset() {
        let text = encode(&sample());
        assert_eq!(find(&text, "Content of Cargo.toml"), Some("[package]\nname = \"widgets\""));
        assert_eq!(find(&text, "Content of go.mod"), None);

        let end = end_offset(&text, "Repository Languages").unwrap();
        assert_eq!(end, text.len());
        assert!(text[..end].ends_with("<<END_SECTION: Repository Languages >>"));
    }

    #[test]
    fn test_count_markers() {
        let text = encode(&sample());
        assert_eq!(count(&text, "Repository Structure"), 1);
        assert_eq!(count(&text, "Existing devcontainer.json"), 0);
    }

    #[test]
    fn test_block_round_trip() {
        let block = encode_block(
            EXISTING_DEVCONTAINER_OPEN,
            EXISTING_DEVCONTAINER_CLOSE,
            "\n{\"name\": \"x\"}\n",
        );
        let text = format!("before\n{block}\nafter");
        assert_eq!(
            extract_block(&text, EXISTING_DEVCONTAINER_OPEN, EXISTING_DEVCONTAINER_CLOSE),
            Some("{\"name\": \"x\"}")
        );
        assert_eq!(
            extract_block(&text, EXISTING_COMPOSE_OPEN, EXISTING_COMPOSE_CLOSE),
            None
        );
    }
}
