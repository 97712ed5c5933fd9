//! Uniformly partitioned overlap-save convolver
//!
//! Convolves a stream of `B`-sample blocks (mono or stereo input) with a
//! time-varying stereo filter of `N` blocks, producing one stereo block per
//! call. Supports:
//! - cosine-squared crossfading between the previous and the new filter,
//!   both evaluated against the same frequency-domain delay line
//! - a split early/late composition where the late reverb part is staged
//!   independently and merged into the composite filter with a one-block
//!   overlap at the early/late seam
//!
//! `process` performs no allocation and never fails; wrong-size filters are
//! a setup-time programmer error.

use rustfft::num_complex::Complex;

use binsim_core::Sample;

use crate::fade::{crossfade_in, crossfade_out};
use crate::fft::BlockFft;
use crate::filter::BinauralFilter;

/// Partitioned overlap-save convolver for one source channel
pub struct Convolver {
    block_size: usize,
    /// Early filter partitions (the full filter when not splitting)
    early_blocks: usize,
    /// Late reverb partitions (0 disables the split composition)
    late_blocks: usize,
    /// Rows in the FDL and the composite filter (`early + late`)
    total_blocks: usize,
    /// Two independent input windows when true (headphone compensation)
    stereo: bool,
    fft: BlockFft,

    /// Sliding `2B` input windows
    window_left: Vec<Sample>,
    window_right: Vec<Sample>,

    /// Frequency-domain delay lines, row 0 newest
    fdl_left: Vec<Vec<Complex<Sample>>>,
    fdl_right: Vec<Vec<Complex<Sample>>>,

    /// Active composite filter
    tf_left: Vec<Vec<Complex<Sample>>>,
    tf_right: Vec<Vec<Complex<Sample>>>,
    /// Composite filter before the last change, kept for crossfading
    tf_left_prev: Vec<Vec<Complex<Sample>>>,
    tf_right_prev: Vec<Vec<Complex<Sample>>>,

    /// Staged early part, merged on rebuild
    early_left: Vec<Vec<Complex<Sample>>>,
    early_right: Vec<Vec<Complex<Sample>>>,
    /// Staged late part, merged on rebuild
    late_left: Vec<Vec<Complex<Sample>>>,
    late_right: Vec<Vec<Complex<Sample>>>,

    fade_in: Vec<Sample>,
    fade_out: Vec<Sample>,

    // Preallocated scratch
    fft_scratch: Vec<Sample>,
    time_scratch: Vec<Sample>,
    spectrum_left: Vec<Complex<Sample>>,
    spectrum_right: Vec<Complex<Sample>>,
    spectrum_left_prev: Vec<Complex<Sample>>,
    spectrum_right_prev: Vec<Complex<Sample>>,
    output_left: Vec<Sample>,
    output_right: Vec<Sample>,
    output_left_prev: Vec<Sample>,
    output_right_prev: Vec<Sample>,

    process_counter: u64,
    crossfade_pending: bool,
    rebuild_pending: bool,
}

impl Convolver {
    /// Create a convolver for a filter of `early_blocks + late_blocks`
    /// partitions of `block_size` samples. Pass `late_blocks = 0` to disable
    /// the split composition. `stereo` selects two independent input windows
    /// instead of one window feeding both ears.
    pub fn new(block_size: usize, early_blocks: usize, late_blocks: usize, stereo: bool) -> Self {
        assert!(block_size > 0 && early_blocks > 0);

        let total_blocks = early_blocks + late_blocks;
        let fft = BlockFft::new(block_size);
        let bins = fft.bins();
        let zero_row = vec![Complex::new(0.0, 0.0); bins];

        log::debug!(
            "Convolver: init (block {}, early {}, late {}, stereo {})",
            block_size,
            early_blocks,
            late_blocks,
            stereo
        );

        Self {
            block_size,
            early_blocks,
            late_blocks,
            total_blocks,
            stereo,
            window_left: vec![0.0; block_size * 2],
            window_right: vec![0.0; block_size * 2],
            fdl_left: vec![zero_row.clone(); total_blocks],
            fdl_right: vec![zero_row.clone(); total_blocks],
            tf_left: vec![zero_row.clone(); total_blocks],
            tf_right: vec![zero_row.clone(); total_blocks],
            tf_left_prev: vec![zero_row.clone(); total_blocks],
            tf_right_prev: vec![zero_row.clone(); total_blocks],
            early_left: vec![zero_row.clone(); early_blocks],
            early_right: vec![zero_row.clone(); early_blocks],
            late_left: vec![zero_row.clone(); late_blocks],
            late_right: vec![zero_row; late_blocks],
            fade_in: crossfade_in(block_size),
            fade_out: crossfade_out(block_size),
            fft_scratch: vec![0.0; block_size * 2],
            time_scratch: vec![0.0; block_size * 2],
            spectrum_left: vec![Complex::new(0.0, 0.0); bins],
            spectrum_right: vec![Complex::new(0.0, 0.0); bins],
            spectrum_left_prev: vec![Complex::new(0.0, 0.0); bins],
            spectrum_right_prev: vec![Complex::new(0.0, 0.0); bins],
            output_left: vec![0.0; block_size],
            output_right: vec![0.0; block_size],
            output_left_prev: vec![0.0; block_size],
            output_right_prev: vec![0.0; block_size],
            fft,
            process_counter: 0,
            crossfade_pending: false,
            rebuild_pending: false,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    /// Number of completed `process` calls
    pub fn process_count(&self) -> u64 {
        self.process_counter
    }

    /// Stage a new early filter (the whole filter when not splitting).
    ///
    /// The active composite is preserved for crossfading; the new composite
    /// is built at the start of the next `process` call. The filter must
    /// have at least `early_blocks` partitions of matching block size.
    pub fn set_early_ir(&mut self, filter: &BinauralFilter, crossfade: bool) {
        debug_assert_eq!(filter.block_size(), self.block_size);
        debug_assert!(filter.num_blocks() >= self.early_blocks);

        for (dst, src) in self.tf_left_prev.iter_mut().zip(&self.tf_left) {
            dst.copy_from_slice(src);
        }
        for (dst, src) in self.tf_right_prev.iter_mut().zip(&self.tf_right) {
            dst.copy_from_slice(src);
        }

        for block in 0..self.early_blocks {
            self.early_left[block].copy_from_slice(filter.left_block(block));
            self.early_right[block].copy_from_slice(filter.right_block(block));
        }

        self.rebuild_pending = true;
        self.crossfade_pending = crossfade;
    }

    /// Stage a new late reverb filter.
    ///
    /// No crossfade is scheduled; the fade-in window baked into late filters
    /// at load time smooths the transition.
    pub fn set_late_ir(&mut self, filter: &BinauralFilter) {
        debug_assert_eq!(filter.block_size(), self.block_size);
        debug_assert!(filter.num_blocks() >= self.late_blocks);

        for block in 0..self.late_blocks {
            self.late_left[block].copy_from_slice(filter.left_block(block));
            self.late_right[block].copy_from_slice(filter.right_block(block));
        }

        self.rebuild_pending = true;
    }

    /// Convolve one mono input block; returns the left and right output
    /// blocks. Short terminal blocks are zero-padded.
    pub fn process(&mut self, block: &[Sample]) -> (&[Sample], &[Sample]) {
        debug_assert!(!self.stereo, "stereo convolver fed with a mono block");
        debug_assert!(block.len() <= self.block_size);

        self.ingest_mono(block);
        self.render();
        (&self.output_left, &self.output_right)
    }

    /// Convolve one stereo input block (left feeds the left FDL, right the
    /// right FDL); returns the left and right output blocks.
    pub fn process_stereo(&mut self, left: &[Sample], right: &[Sample]) -> (&[Sample], &[Sample]) {
        debug_assert!(self.stereo, "mono convolver fed with a stereo block");
        debug_assert!(left.len() <= self.block_size && right.len() <= self.block_size);

        self.ingest_stereo(left, right);
        self.render();
        (&self.output_left, &self.output_right)
    }

    /// Clear all signal state (windows, delay lines, outputs); the staged
    /// and active filters are kept.
    pub fn reset(&mut self) {
        self.window_left.fill(0.0);
        self.window_right.fill(0.0);
        for row in self.fdl_left.iter_mut().chain(self.fdl_right.iter_mut()) {
            row.fill(Complex::new(0.0, 0.0));
        }
        self.output_left.fill(0.0);
        self.output_right.fill(0.0);
        self.output_left_prev.fill(0.0);
        self.output_right_prev.fill(0.0);
        self.process_counter = 0;
        self.crossfade_pending = false;
    }

    fn ingest_mono(&mut self, block: &[Sample]) {
        let first = self.process_counter == 0;
        push_window(&mut self.window_left, block, first, self.block_size);

        self.fdl_left.rotate_right(1);
        self.fdl_right.rotate_right(1);

        self.fft_scratch.copy_from_slice(&self.window_left);
        self.fft.forward(&mut self.fft_scratch, &mut self.fdl_left[0]);
        // one window feeds both delay lines
        self.fdl_right[0].copy_from_slice(&self.fdl_left[0]);
    }

    fn ingest_stereo(&mut self, left: &[Sample], right: &[Sample]) {
        let first = self.process_counter == 0;
        push_window(&mut self.window_left, left, first, self.block_size);
        push_window(&mut self.window_right, right, first, self.block_size);

        self.fdl_left.rotate_right(1);
        self.fdl_right.rotate_right(1);

        self.fft_scratch.copy_from_slice(&self.window_left);
        self.fft.forward(&mut self.fft_scratch, &mut self.fdl_left[0]);
        self.fft_scratch.copy_from_slice(&self.window_right);
        self.fft.forward(&mut self.fft_scratch, &mut self.fdl_right[0]);
    }

    /// Merge the staged early and late parts into the composite filter.
    ///
    /// Rows `0..E` take the early part. Late row 0 adds onto row `E-1` (the
    /// faded seam block), late rows `1..L` land in rows `E..E+L-1`. The last
    /// allocated row stays zero.
    fn rebuild_filter(&mut self) {
        for block in 0..self.early_blocks {
            self.tf_left[block].copy_from_slice(&self.early_left[block]);
            self.tf_right[block].copy_from_slice(&self.early_right[block]);
        }

        if self.late_blocks > 0 {
            let seam = self.early_blocks - 1;
            for (bin, &value) in self.late_left[0].iter().enumerate() {
                self.tf_left[seam][bin] += value;
            }
            for (bin, &value) in self.late_right[0].iter().enumerate() {
                self.tf_right[seam][bin] += value;
            }
            for block in 1..self.late_blocks {
                self.tf_left[self.early_blocks + block - 1].copy_from_slice(&self.late_left[block]);
                self.tf_right[self.early_blocks + block - 1]
                    .copy_from_slice(&self.late_right[block]);
            }
        }

        self.rebuild_pending = false;
    }

    fn render(&mut self) {
        if self.rebuild_pending {
            self.rebuild_filter();
        }
        let crossfade = self.crossfade_pending;

        spectral_sum(&self.tf_left, &self.fdl_left, &mut self.spectrum_left);
        spectral_sum(&self.tf_right, &self.fdl_right, &mut self.spectrum_right);
        if crossfade {
            spectral_sum(&self.tf_left_prev, &self.fdl_left, &mut self.spectrum_left_prev);
            spectral_sum(
                &self.tf_right_prev,
                &self.fdl_right,
                &mut self.spectrum_right_prev,
            );
        }

        // Inverse transform; the first B samples are aliased and dropped
        let scale = self.fft.scale();
        let tail = self.block_size..;

        self.fft.inverse(&mut self.spectrum_left, &mut self.time_scratch);
        scaled_copy(&self.time_scratch[tail.clone()], scale, &mut self.output_left);
        self.fft.inverse(&mut self.spectrum_right, &mut self.time_scratch);
        scaled_copy(&self.time_scratch[tail.clone()], scale, &mut self.output_right);

        if crossfade {
            self.fft
                .inverse(&mut self.spectrum_left_prev, &mut self.time_scratch);
            scaled_copy(&self.time_scratch[tail.clone()], scale, &mut self.output_left_prev);
            self.fft
                .inverse(&mut self.spectrum_right_prev, &mut self.time_scratch);
            scaled_copy(&self.time_scratch[tail], scale, &mut self.output_right_prev);

            for n in 0..self.block_size {
                self.output_left[n] = self.output_left[n] * self.fade_in[n]
                    + self.output_left_prev[n] * self.fade_out[n];
                self.output_right[n] = self.output_right[n] * self.fade_in[n]
                    + self.output_right_prev[n] * self.fade_out[n];
            }
            self.crossfade_pending = false;
        }

        self.process_counter += 1;
    }
}

/// Slide the `2B` window left by one block and append the new block,
/// zero-padding short terminal blocks.
fn push_window(window: &mut [Sample], block: &[Sample], first: bool, block_size: usize) {
    if !first {
        window.copy_within(block_size.., 0);
    }
    let tail = &mut window[block_size..];
    let fresh = block.len().min(block_size);
    tail[..fresh].copy_from_slice(&block[..fresh]);
    tail[fresh..].fill(0.0);
}

/// `out[k] = Σ_i tf[i][k] · fdl[i][k]`
fn spectral_sum(
    tf: &[Vec<Complex<Sample>>],
    fdl: &[Vec<Complex<Sample>>],
    out: &mut [Complex<Sample>],
) {
    out.fill(Complex::new(0.0, 0.0));
    for (tf_block, fdl_block) in tf.iter().zip(fdl) {
        for ((acc, a), b) in out.iter_mut().zip(tf_block).zip(fdl_block) {
            *acc += a * b;
        }
    }
}

fn scaled_copy(src: &[Sample], scale: Sample, dst: &mut [Sample]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BinauralFilter;

    const B: usize = 64;
    const TOLERANCE: Sample = 1e-4;

    /// Deterministic noise without a rand dependency
    fn noise(samples: usize, seed: u64) -> Vec<Sample> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        (0..samples)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state as f64 / u64::MAX as f64) as Sample * 2.0 - 1.0
            })
            .collect()
    }

    fn dirac_filter(fft: &BlockFft, blocks: usize, left_at: Option<usize>, right_at: Option<usize>) -> BinauralFilter {
        let mut left = vec![0.0; blocks * B];
        let mut right = vec![0.0; blocks * B];
        if let Some(i) = left_at {
            left[i] = 1.0;
        }
        if let Some(i) = right_at {
            right[i] = 1.0;
        }
        BinauralFilter::from_time_domain(fft, &left, &right)
    }

    fn run_blocks(conv: &mut Convolver, input: &[Sample]) -> (Vec<Sample>, Vec<Sample>) {
        let mut left = Vec::with_capacity(input.len());
        let mut right = Vec::with_capacity(input.len());
        for block in input.chunks(B) {
            let (l, r) = conv.process(block);
            left.extend_from_slice(l);
            right.extend_from_slice(r);
        }
        (left, right)
    }

    #[test]
    fn test_zero_input_yields_zero_output() {
        let fft = BlockFft::new(B);
        let mut conv = Convolver::new(B, 4, 0, false);
        conv.set_early_ir(&dirac_filter(&fft, 4, Some(10), Some(20)), false);

        let (left, right) = run_blocks(&mut conv, &vec![0.0; B * 8]);
        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    }

    #[test]
    fn test_dirac_roundtrip() {
        let fft = BlockFft::new(B);
        let blocks = 4;

        for filter_block in 0..blocks {
            let mut conv = Convolver::new(B, blocks, 0, false);
            conv.set_early_ir(
                &dirac_filter(&fft, blocks, Some(filter_block * B), None),
                false,
            );

            let mut input = vec![0.0; B * (blocks + 2)];
            input[0] = 1.0;
            let (left, right) = run_blocks(&mut conv, &input);

            for (i, &sample) in left.iter().enumerate() {
                if i == filter_block * B {
                    assert!(
                        (sample - 1.0).abs() < TOLERANCE,
                        "block {}: expected impulse at {}, got {}",
                        filter_block,
                        i,
                        sample
                    );
                } else {
                    assert!(sample.abs() < TOLERANCE, "residual at {}: {}", i, sample);
                }
            }
            assert!(right.iter().all(|s| s.abs() < TOLERANCE));
        }
    }

    #[test]
    fn test_linearity() {
        let fft = BlockFft::new(B);
        let ir = noise(4 * B, 7);
        let filter = BinauralFilter::from_time_domain(&fft, &ir, &ir);

        let x = noise(8 * B, 11);
        let y = noise(8 * B, 13);
        let (a, b) = (0.7, -1.3);
        let combined: Vec<Sample> = x.iter().zip(&y).map(|(&xi, &yi)| a * xi + b * yi).collect();

        let mut conv_x = Convolver::new(B, 4, 0, false);
        let mut conv_y = Convolver::new(B, 4, 0, false);
        let mut conv_c = Convolver::new(B, 4, 0, false);
        conv_x.set_early_ir(&filter, false);
        conv_y.set_early_ir(&filter, false);
        conv_c.set_early_ir(&filter, false);

        let (out_x, _) = run_blocks(&mut conv_x, &x);
        let (out_y, _) = run_blocks(&mut conv_y, &y);
        let (out_c, _) = run_blocks(&mut conv_c, &combined);

        for ((&c, &xo), &yo) in out_c.iter().zip(&out_x).zip(&out_y) {
            assert!((c - (a * xo + b * yo)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_crossfade_continuity() {
        // After a crossfaded switch, the output block must equal
        // fade_in·y_new + fade_out·y_old with both filters run against the
        // same delay line.
        let fft = BlockFft::new(B);
        let ir_a = noise(4 * B, 21);
        let ir_b = noise(4 * B, 22);
        let filter_a = BinauralFilter::from_time_domain(&fft, &ir_a, &ir_a);
        let filter_b = BinauralFilter::from_time_domain(&fft, &ir_b, &ir_b);

        let input = noise(8 * B, 23);
        let switch_block = 4;

        let mut conv = Convolver::new(B, 4, 0, false);
        let mut ref_a = Convolver::new(B, 4, 0, false);
        let mut ref_b = Convolver::new(B, 4, 0, false);
        conv.set_early_ir(&filter_a, false);
        ref_a.set_early_ir(&filter_a, false);
        ref_b.set_early_ir(&filter_b, false);

        let fade_in = crossfade_in(B);
        let fade_out = crossfade_out(B);

        for (index, block) in input.chunks(B).enumerate() {
            if index == switch_block {
                conv.set_early_ir(&filter_b, true);
            }
            let (old_l, _) = ref_a.process(block);
            let old_l = old_l.to_vec();
            let (new_l, _) = ref_b.process(block);
            let new_l = new_l.to_vec();
            let (out_l, _) = conv.process(block);

            if index == switch_block {
                for n in 0..B {
                    let expected = new_l[n] * fade_in[n] + old_l[n] * fade_out[n];
                    assert!((out_l[n] - expected).abs() < 1e-3);
                }
            } else if index > switch_block {
                for n in 0..B {
                    assert!((out_l[n] - new_l[n]).abs() < 1e-3);
                }
            } else {
                for n in 0..B {
                    assert!((out_l[n] - old_l[n]).abs() < 1e-3);
                }
            }
        }
    }

    #[test]
    fn test_split_composition_equivalence() {
        // Early (E blocks) + late (L blocks) staged separately must act as
        // the sum-aligned composite: block E-1 = early[E-1] + late[0],
        // blocks E..E+L-2 = late[1..L-1].
        let fft = BlockFft::new(B);
        let early_blocks = 3;
        let late_blocks = 2;
        let total = early_blocks + late_blocks;

        let early_ir = noise(early_blocks * B, 31);
        let late_ir = noise(late_blocks * B, 32);

        let mut composite = vec![0.0; total * B];
        composite[..early_blocks * B].copy_from_slice(&early_ir);
        let seam = (early_blocks - 1) * B;
        for n in 0..late_blocks * B {
            composite[seam + n] += late_ir[n];
        }

        let early = BinauralFilter::from_time_domain(&fft, &early_ir, &early_ir);
        let late = BinauralFilter::from_time_domain(&fft, &late_ir, &late_ir);
        let reference = BinauralFilter::from_time_domain(&fft, &composite, &composite);

        let mut split = Convolver::new(B, early_blocks, late_blocks, false);
        split.set_early_ir(&early, false);
        split.set_late_ir(&late);

        let mut monolithic = Convolver::new(B, total, 0, false);
        monolithic.set_early_ir(&reference, false);

        let input = noise(10 * B, 33);
        let (split_l, split_r) = run_blocks(&mut split, &input);
        let (mono_l, mono_r) = run_blocks(&mut monolithic, &input);

        for (s, m) in split_l.iter().zip(&mono_l).chain(split_r.iter().zip(&mono_r)) {
            assert!((s - m).abs() < 1e-3, "split {} vs composite {}", s, m);
        }
    }

    #[test]
    fn test_late_update_leaves_early_intact() {
        let fft = BlockFft::new(B);
        let early = dirac_filter(&fft, 2, Some(0), Some(0));
        let late_a = dirac_filter(&fft, 2, Some(0), Some(0));
        let late_b = dirac_filter(&fft, 2, Some(B), Some(B));

        let mut conv = Convolver::new(B, 2, 2, false);
        conv.set_early_ir(&early, false);
        conv.set_late_ir(&late_a);
        let _ = conv.process(&vec![0.0; B]);

        // Swapping only the late part must keep the direct path: a dirac
        // input still produces a unit impulse through the early dirac.
        conv.set_late_ir(&late_b);
        let mut input = vec![0.0; B];
        input[0] = 1.0;
        let (left, _) = conv.process(&input);
        assert!((left[0] - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_short_terminal_block_is_padded() {
        let fft = BlockFft::new(B);
        let mut conv = Convolver::new(B, 2, 0, false);
        conv.set_early_ir(&dirac_filter(&fft, 2, Some(0), Some(0)), false);

        let short = vec![1.0; B / 2];
        let (left, _) = conv.process(&short);
        assert_eq!(left.len(), B);
        for (i, &sample) in left.iter().enumerate() {
            let expected = if i < B / 2 { 1.0 } else { 0.0 };
            assert!((sample - expected).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_stereo_mode_independent_ears() {
        let fft = BlockFft::new(B);
        let mut conv = Convolver::new(B, 2, 0, true);
        conv.set_early_ir(&dirac_filter(&fft, 2, Some(0), Some(0)), false);

        let left_in = vec![0.5; B];
        let right_in = vec![-0.25; B];
        let (left, right) = conv.process_stereo(&left_in, &right_in);

        for (&l, &r) in left.iter().zip(right) {
            assert!((l - 0.5).abs() < TOLERANCE);
            assert!((r + 0.25).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_reset_clears_signal_state() {
        let fft = BlockFft::new(B);
        let mut conv = Convolver::new(B, 2, 0, false);
        conv.set_early_ir(&dirac_filter(&fft, 2, Some(B + 3), None), false);

        let _ = conv.process(&vec![1.0; B]);
        conv.reset();
        assert_eq!(conv.process_count(), 0);

        let (left, right) = conv.process(&vec![0.0; B]);
        assert!(left.iter().chain(right).all(|&s| s == 0.0));
    }
}
