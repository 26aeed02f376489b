//! Error types for the city-engine core.

use thiserror::Error;

/// Fatal errors produced by map generation.
///
/// Only conditions that make the requested map impossible surface as
/// errors. Recoverable conditions (an exhausted seed search, a coastline
/// that never reaches the world edge, a buffer that collapses a sliver
/// polygon) resolve to well-defined empty outputs and a log line instead.
#[derive(Debug, Error)]
pub enum MapError {
    /// A parameter was out of its documented range.
    #[error("invalid parameter '{name}': {reason}")]
    ParamInvalid { name: String, reason: String },

    /// World dimensions must be strictly positive.
    #[error("world dimensions must be positive, got {x} x {y}")]
    InvalidDimensions { x: f64, y: f64 },

    /// The parameter document could not be parsed.
    #[error("malformed parameter document: {0}")]
    ParamParse(String),

    /// An output file could not be written.
    #[error("{0}")]
    Io(String),
}

impl MapError {
    /// Shorthand for a [`MapError::ParamInvalid`] with owned strings.
    pub fn param(name: &str, reason: impl Into<String>) -> Self {
        MapError::ParamInvalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        MapError::ParamParse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_invalid_includes_name_and_reason() {
        let err = MapError::param("zoom", "must lie in [0.3, 20]");
        let msg = format!("{err}");
        assert!(msg.contains("zoom"), "missing param name in: {msg}");
        assert!(msg.contains("[0.3, 20]"), "missing reason in: {msg}");
    }

    #[test]
    fn invalid_dimensions_includes_both_values() {
        let err = MapError::InvalidDimensions { x: -5.0, y: 0.0 };
        let msg = format!("{err}");
        assert!(msg.contains("-5"), "missing x in: {msg}");
        assert!(msg.contains('0'), "missing y in: {msg}");
    }

    #[test]
    fn serde_error_converts_to_param_parse() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope");
        let err = MapError::from(bad.unwrap_err());
        assert!(matches!(err, MapError::ParamParse(_)));
    }

    #[test]
    fn map_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MapError>();
    }

    #[test]
    fn map_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<MapError>();
    }
}
