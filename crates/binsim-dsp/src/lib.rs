//! binsim-dsp: partitioned FFT convolution
//!
//! Uniformly partitioned overlap-save convolution with crossfaded filter
//! switching and an optional split early/late reverb composition. The
//! convolver is allocation-free after construction and safe to drive from an
//! audio callback.

mod convolver;
mod fade;
mod fft;
mod filter;

pub use convolver::Convolver;
pub use fade::{crossfade_in, crossfade_out};
pub use fft::BlockFft;
pub use filter::BinauralFilter;
