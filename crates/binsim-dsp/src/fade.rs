//! Cosine-squared crossfade windows
//!
//! The same windows serve two purposes: crossfading convolver output blocks
//! on a filter change, and shaping the seam between early and late reverb
//! filters at load time (fade-out on the last early block, complementary
//! fade-in on the first late block).

use binsim_core::Sample;

/// Fade-out window: `cos²(n / (B−1) · π/2)`, decreasing 1 → 0
pub fn crossfade_out(block_size: usize) -> Vec<Sample> {
    let last = (block_size - 1) as Sample;
    (0..block_size)
        .map(|n| {
            let phase = n as Sample / last * std::f32::consts::FRAC_PI_2;
            phase.cos() * phase.cos()
        })
        .collect()
}

/// Fade-in window: the reversed fade-out, increasing 0 → 1
pub fn crossfade_in(block_size: usize) -> Vec<Sample> {
    let mut window = crossfade_out(block_size);
    window.reverse();
    window
}
