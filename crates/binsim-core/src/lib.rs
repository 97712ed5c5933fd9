//! binsim-core: shared types for the binsim binaural renderer
//!
//! Pose keys, the startup configuration record, and the sample type used
//! across the workspace.

mod config;
mod error;
mod pose;

pub use config::{parse_boolean, split_soundfile_list, Config};
pub use error::{ConfigError, PoseError};
pub use pose::{CustomValues, Orientation, Pose, Position};

/// Audio sample type used throughout the engine
pub type Sample = f32;

/// Number of integers in a full pose key
pub const POSE_KEY_LEN: usize = 9;
