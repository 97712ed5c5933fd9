//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("Invalid value {value:?} for option {key}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid boolean {value:?} for option {key} (expected True or False)")]
    InvalidBoolean { key: String, value: String },

    #[error("Missing mandatory option: {0}")]
    MissingOption(&'static str),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PoseError {
    #[error("Pose key needs 6 or 9 values, got {0}")]
    InvalidLength(usize),

    #[error("Pose key contains a non-integer token: {0:?}")]
    InvalidToken(String),
}
