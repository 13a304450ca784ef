//! Structured-output parsing for oracle replies.
//!
//! Models frequently wrap JSON in Markdown code fences. The parser strips
//! the fence markers and attempts a strict JSON parse, reporting failures
//! as a recoverable `PipelineError::Parse`.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::types::PipelineError;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?").expect("valid fence regex"))
}

/// Remove code-fence markers and surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    fence_pattern().replace_all(raw, "").trim().to_string()
}

/// Parse an oracle reply into a JSON value.
pub fn parse(raw: &str) -> Result<serde_json::Value, PipelineError> {
    let cleaned = strip_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| PipelineError::Parse {
        message: e.to_string(),
        cleaned,
    })
}

/// Parse an oracle reply straight into a typed payload.
pub fn parse_as<T: DeserializeOwned>(raw: &str) -> Result<T, PipelineError> {
    let value = parse(raw)?;
    serde_json::from_value(value.clone()).map_err(|e| PipelineError::Parse {
        message: e.to_string(),
        cleaned: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
