//! Real FFT plan pair for block transforms

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use binsim_core::Sample;

/// Forward/inverse real FFT pair over a `2 * block_size` window
///
/// All spectra have `block_size + 1` unique bins. The inverse transform is
/// unnormalized; multiply a round trip by [`BlockFft::scale`].
#[derive(Clone)]
pub struct BlockFft {
    block_size: usize,
    fwd: Arc<dyn RealToComplex<Sample>>,
    inv: Arc<dyn ComplexToReal<Sample>>,
}

impl BlockFft {
    pub fn new(block_size: usize) -> Self {
        let mut planner = RealFftPlanner::<Sample>::new();
        let fwd = planner.plan_fft_forward(block_size * 2);
        let inv = planner.plan_fft_inverse(block_size * 2);

        Self {
            block_size,
            fwd,
            inv,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Transform window length (`2 * block_size`)
    pub fn window_len(&self) -> usize {
        self.block_size * 2
    }

    /// Unique spectrum bins (`block_size + 1`)
    pub fn bins(&self) -> usize {
        self.block_size + 1
    }

    /// Forward transform. `time` is used as scratch and overwritten.
    pub fn forward(&self, time: &mut [Sample], spectrum: &mut [Complex<Sample>]) {
        self.fwd.process(time, spectrum).ok();
    }

    /// Inverse transform. `spectrum` is used as scratch and overwritten.
    pub fn inverse(&self, spectrum: &mut [Complex<Sample>], time: &mut [Sample]) {
        self.inv.process(spectrum, time).ok();
    }

    /// Normalization factor for a forward + inverse round trip
    pub fn scale(&self) -> Sample {
        1.0 / self.window_len() as Sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_roundtrip() {
        let fft = BlockFft::new(64);
        let mut time: Vec<Sample> = (0..fft.window_len())
            .map(|i| (i as Sample * 0.37).sin())
            .collect();
        let original = time.clone();

        let mut spectrum = vec![Complex::new(0.0, 0.0); fft.bins()];
        fft.forward(&mut time, &mut spectrum);

        let mut restored = vec![0.0; fft.window_len()];
        fft.inverse(&mut spectrum, &mut restored);

        let scale = fft.scale();
        for (&r, &o) in restored.iter().zip(&original) {
            assert_abs_diff_eq!(r * scale, o, epsilon = 1e-5);
        }
    }
}
