//! binsim-control: asynchronous control surface
//!
//! An OSC/UDP receiver thread translates `/pyBinSim*` messages into pose
//! keys, playlist requests, and pause flags. The audio thread observes them
//! through [`CommandState`] at block boundaries: per-channel dirty flags
//! with acquire/release pairing plus pose slots behind nanosecond-held
//! mutexes.

mod error;
mod receiver;
mod state;

pub use error::{ControlError, ControlResult};
pub use receiver::{OscReceiver, DEFAULT_OSC_PORT};
pub use state::{CommandState, KeySlice};
