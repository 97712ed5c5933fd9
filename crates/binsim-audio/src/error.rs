//! Audio error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build stream: {0}")]
    StreamBuildError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("{path}: sample rate {actual} does not match configured rate {expected}")]
    SampleRateMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },
}

pub type AudioResult<T> = Result<T, AudioError>;
