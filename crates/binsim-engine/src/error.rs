//! Engine error types

use thiserror::Error;

use binsim_audio::AudioError;
use binsim_control::ControlError;
use binsim_core::ConfigError;
use binsim_filter::FilterError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}

pub type EngineResult<T> = Result<T, EngineError>;
