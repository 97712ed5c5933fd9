//! Filter store error types
//!
//! All of these surface at startup; no error paths exist at audio time.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to read filter list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed filter list line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("Referenced filter file not found: {0}")]
    MissingFile(PathBuf),

    #[error("WAV error in {path}: {message}")]
    Wav { path: PathBuf, message: String },

    #[error("{path}: sample rate {actual} does not match configured rate {expected}")]
    SampleRateMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("{path}: expected a stereo impulse response, got {channels} channel(s)")]
    ChannelCount { path: PathBuf, channels: u16 },

    #[error("{path}: unsupported sample format ({bits}-bit {format:?})")]
    UnsupportedFormat {
        path: PathBuf,
        bits: u16,
        format: hound::SampleFormat,
    },

    #[error("Headphone compensation enabled but the filter list has no HPFILTER entry")]
    MissingHeadphoneFilter,
}

pub type FilterResult<T> = Result<T, FilterError>;
