//! Error types for Prospector.
//!
//! Library crates use [`ProspectorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Longest raw-response snippet carried inside an error.
const MAX_SNIPPET_LEN: usize = 200;

/// Top-level error type for all Prospector operations.
#[derive(Debug, thiserror::Error)]
pub enum ProspectorError {
    /// Missing or invalid configuration (ICP, provider credentials).
    /// Fatal; raised pre-flight before any external call.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP failure from the directory or generation service.
    /// Recoverable via the strategy ladder or an explicit empty result.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Generation output that no stage of the parse ladder could recover.
    /// Carries a bounded snippet of the raw text for diagnostics.
    #[error("unparseable generation output: {snippet}")]
    Unparseable { snippet: String },

    /// Parsed generation object missing a required field, or a bounded
    /// numeric field out of range. Names the offending field.
    #[error("schema violation: {field}")]
    Schema { field: String },

    /// Durable-store write failure. Never swallowed; already-produced
    /// results are still surfaced to the caller flagged degraded.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Optimistic-concurrency version mismatch on a mission write.
    #[error("write conflict: expected version {expected}, found {actual}")]
    Conflict { expected: i64, actual: i64 },

    /// Data validation error (bad input, wrong phase, invalid format).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProspectorError>;

impl ProspectorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an unparseable-output error, truncating the raw text to a
    /// diagnostic-sized snippet.
    pub fn unparseable(raw: &str) -> Self {
        let snippet = if raw.len() > MAX_SNIPPET_LEN {
            let mut end = MAX_SNIPPET_LEN;
            while !raw.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &raw[..end])
        } else {
            raw.to_string()
        };
        Self::Unparseable { snippet }
    }

    /// Create a schema-violation error naming the offending field.
    pub fn schema(field: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProspectorError::config("missing APOLLO_API_KEY");
        assert_eq!(err.to_string(), "config error: missing APOLLO_API_KEY");

        let err = ProspectorError::schema("contacts.0.rank");
        assert_eq!(err.to_string(), "schema violation: contacts.0.rank");

        let err = ProspectorError::Conflict {
            expected: 3,
            actual: 5,
        };
        assert!(err.to_string().contains("expected version 3"));
    }

    #[test]
    fn unparseable_truncates_long_raw_text() {
        let raw = "x".repeat(5000);
        let err = ProspectorError::unparseable(&raw);
        match err {
            ProspectorError::Unparseable { snippet } => {
                assert!(snippet.chars().count() <= 201);
                assert!(snippet.ends_with('…'));
            }
            _ => panic!("expected Unparseable"),
        }
    }

    #[test]
    fn unparseable_keeps_short_raw_text() {
        let err = ProspectorError::unparseable("not json");
        match err {
            ProspectorError::Unparseable { snippet } => assert_eq!(snippet, "not json"),
            _ => panic!("expected Unparseable"),
        }
    }
}
