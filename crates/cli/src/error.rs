//! CLI failure kinds and their process exit codes.
//!
//! Failures split into the input side (the parameter document) and the
//! output side (files we write). Input problems get codes 3-5 so scripts
//! can tell "fix your JSON" (3), "fix a value" (4), and "fix the world
//! rectangle" (5) apart; anything that went wrong while producing output
//! is 6. clap reserves exit code 2 for argument parse errors.

use city_engine_core::MapError;
use std::fmt;

/// A CLI failure, carrying the human-readable cause.
pub enum CliError {
    /// The parameter document could not be read or parsed. Exit code 3.
    ParamsUnreadable(String),
    /// A parameter value is outside its documented range. Exit code 4.
    ParamsInvalid(String),
    /// The requested world rectangle is impossible (non-positive
    /// dimensions). Exit code 5.
    BadDimensions(String),
    /// An output file could not be serialized or written. Exit code 6.
    WriteFailed(String),
}

impl CliError {
    /// Returns the process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ParamsUnreadable(_) => 3,
            CliError::ParamsInvalid(_) => 4,
            CliError::BadDimensions(_) => 5,
            CliError::WriteFailed(_) => 6,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::ParamsUnreadable(msg) => write!(f, "cannot load parameters: {msg}"),
            CliError::ParamsInvalid(msg) => write!(f, "{msg}"),
            CliError::BadDimensions(msg) => write!(f, "{msg}"),
            CliError::WriteFailed(msg) => write!(f, "cannot write output: {msg}"),
        }
    }
}

impl From<MapError> for CliError {
    fn from(e: MapError) -> Self {
        match e {
            MapError::ParamParse(msg) => CliError::ParamsUnreadable(msg),
            MapError::InvalidDimensions { .. } => CliError::BadDimensions(e.to_string()),
            MapError::ParamInvalid { .. } => CliError::ParamsInvalid(e.to_string()),
            MapError::Io(msg) => CliError::WriteFailed(msg),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        // Parameter JSON goes through MapParams::from_json_str, so a
        // serde error here is always on the output path.
        CliError::WriteFailed(e.to_string())
    }
}
