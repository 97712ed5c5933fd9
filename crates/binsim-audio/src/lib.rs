//! binsim-audio: audio device output and sound sources
//!
//! cpal-based stereo output at a fixed block size, plus the double-buffered
//! sound source whose file decoding runs on a background loader thread so
//! the audio callback never touches the filesystem.

mod device;
mod error;
mod source;
mod stream;

pub use device::default_output_device;
pub use error::{AudioError, AudioResult};
pub use source::SoundSource;
pub use stream::{AudioStream, RenderCallback, StreamParams};
