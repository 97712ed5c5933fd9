//! Frequency-domain binaural filter entity
//!
//! One BRIR/HRTF pair, partitioned into blocks and transformed to the
//! frequency domain once at load time. Filters are immutable after
//! construction; the convolver copies their blocks into its own state.

use rustfft::num_complex::Complex;

use binsim_core::Sample;

use crate::fft::BlockFft;

/// Blocked frequency-domain filter: per ear a `(blocks, B + 1)` matrix
pub struct BinauralFilter {
    left: Vec<Vec<Complex<Sample>>>,
    right: Vec<Vec<Complex<Sample>>>,
    block_size: usize,
}

impl BinauralFilter {
    /// All-zero filter of the given shape (renders silence)
    pub fn zeroed(blocks: usize, block_size: usize) -> Self {
        let zero_row = vec![Complex::new(0.0, 0.0); block_size + 1];
        Self {
            left: vec![zero_row.clone(); blocks],
            right: vec![zero_row; blocks],
            block_size,
        }
    }

    /// Transform a time-domain impulse-response pair to blocked spectra.
    ///
    /// `left` and `right` must already have their final length, a multiple
    /// of the FFT block size. Each block is zero-padded to `2B` before the
    /// forward transform. Wrong-size input is a programmer error.
    pub fn from_time_domain(fft: &BlockFft, left: &[Sample], right: &[Sample]) -> Self {
        let block_size = fft.block_size();
        assert_eq!(left.len(), right.len());
        assert!(!left.is_empty() && left.len() % block_size == 0);

        let blocks = left.len() / block_size;
        let mut padded = vec![0.0; fft.window_len()];

        let mut transform = |ir: &[Sample]| -> Vec<Vec<Complex<Sample>>> {
            ir.chunks(block_size)
                .map(|chunk| {
                    padded[..block_size].copy_from_slice(chunk);
                    padded[block_size..].fill(0.0);
                    let mut spectrum = vec![Complex::new(0.0, 0.0); fft.bins()];
                    fft.forward(&mut padded, &mut spectrum);
                    spectrum
                })
                .collect()
        };

        let left = transform(left);
        let right = transform(right);
        debug_assert_eq!(left.len(), blocks);

        Self {
            left,
            right,
            block_size,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.left.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Spectrum bins per block (`B + 1`)
    pub fn bins(&self) -> usize {
        self.block_size + 1
    }

    pub fn left_block(&self, index: usize) -> &[Complex<Sample>] {
        &self.left[index]
    }

    pub fn right_block(&self, index: usize) -> &[Complex<Sample>] {
        &self.right[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_shape() {
        let filter = BinauralFilter::zeroed(4, 128);
        assert_eq!(filter.num_blocks(), 4);
        assert_eq!(filter.bins(), 129);
        assert!(filter.left_block(3).iter().all(|c| c.norm() == 0.0));
    }

    #[test]
    fn test_dirac_spectrum_is_flat() {
        let fft = BlockFft::new(64);
        let mut ir = vec![0.0; 128];
        ir[0] = 1.0;

        let filter = BinauralFilter::from_time_domain(&fft, &ir, &ir);

        // A unit impulse at sample 0 transforms to an all-ones spectrum
        for bin in filter.left_block(0) {
            assert!((bin.re - 1.0).abs() < 1e-5);
            assert!(bin.im.abs() < 1e-5);
        }
        // The second block is empty
        assert!(filter.right_block(1).iter().all(|c| c.norm() < 1e-6));
    }
}
