//! Control error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Failed to set up OSC socket: {0}")]
    Socket(#[from] std::io::Error),
}

pub type ControlResult<T> = Result<T, ControlError>;
