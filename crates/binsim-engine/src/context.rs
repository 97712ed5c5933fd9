//! Per-block render context
//!
//! Everything the audio callback touches lives in this record: convolvers,
//! the preloaded filter store, the sound source, and a handle to the shared
//! command state. `render_block` runs once per device block and performs no
//! allocation, no file I/O, and no blocking lock acquisition.

use std::sync::Arc;

use binsim_audio::SoundSource;
use binsim_control::CommandState;
use binsim_core::{Config, Sample};
use binsim_dsp::Convolver;
use binsim_filter::FilterStorage;

/// Block-synchronous renderer combining all audio-thread state
pub struct RenderContext {
    block_size: usize,
    enable_crossfading: bool,
    use_splitted_filters: bool,
    loudness_factor: Sample,

    convolvers: Vec<Convolver>,
    headphone: Option<Convolver>,
    storage: FilterStorage,
    source: SoundSource,
    commands: Arc<CommandState>,

    /// Input staging, `max_channels` rows of one block each
    block: Vec<Vec<Sample>>,
    mix_left: Vec<Sample>,
    mix_right: Vec<Sample>,

    /// Blocks to wait before the next clipping warning
    clip_holdoff: u32,
    clip_interval: u32,
}

impl RenderContext {
    pub fn new(
        config: &Config,
        storage: FilterStorage,
        source: SoundSource,
        commands: Arc<CommandState>,
    ) -> Self {
        let block_size = config.block_size;
        let early_blocks = config.early_blocks();
        let late_blocks = config.late_blocks();

        let convolvers = (0..config.max_channels)
            .map(|_| Convolver::new(block_size, early_blocks, late_blocks, false))
            .collect();

        // the headphone filter never changes; set it once, without crossfade
        let headphone = storage.headphone().map(|filter| {
            let mut convolver = Convolver::new(block_size, filter.num_blocks(), 0, true);
            convolver.set_early_ir(filter, false);
            convolver
        });

        // at most one clipping warning per second of audio
        let clip_interval = (config.sampling_rate as usize / block_size).max(1) as u32;

        Self {
            block_size,
            enable_crossfading: config.enable_crossfading,
            use_splitted_filters: config.use_splitted_filters,
            loudness_factor: config.loudness_factor,
            convolvers,
            headphone,
            storage,
            source,
            commands,
            block: vec![vec![0.0; block_size]; config.max_channels],
            mix_left: vec![0.0; block_size],
            mix_right: vec![0.0; block_size],
            clip_holdoff: 0,
            clip_interval,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Render one interleaved stereo block (`block_size * 2` samples).
    pub fn render_block(&mut self, out: &mut [Sample]) {
        debug_assert_eq!(out.len(), self.block_size * 2);

        if let Some(list) = self.commands.take_sound_file_request() {
            self.source.request_file_list(&list);
        }

        // playback pause: silence without consuming the source
        if self.commands.pause_playback() {
            out.fill(0.0);
            return;
        }

        let active = self.source.read_block(&mut self.block);

        self.mix_left.fill(0.0);
        self.mix_right.fill(0.0);

        if self.commands.pause_convolution() {
            // bypass the convolvers: plain channel sum on both ears
            for channel in 0..active {
                for (n, &sample) in self.block[channel].iter().enumerate() {
                    self.mix_left[n] += sample;
                    self.mix_right[n] += sample;
                }
            }
        } else {
            for channel in 0..active {
                if let Some(pose) = self.commands.take_early_update(channel) {
                    let filter = self.storage.get_early(&pose);
                    self.convolvers[channel].set_early_ir(filter, self.enable_crossfading);
                }
                if self.use_splitted_filters {
                    if let Some(pose) = self.commands.take_late_update(channel) {
                        let filter = self.storage.get_late(&pose);
                        self.convolvers[channel].set_late_ir(filter);
                    }
                }

                let (left, right) = self.convolvers[channel].process(&self.block[channel]);
                for (acc, &sample) in self.mix_left.iter_mut().zip(left) {
                    *acc += sample;
                }
                for (acc, &sample) in self.mix_right.iter_mut().zip(right) {
                    *acc += sample;
                }
            }
        }

        if let Some(headphone) = self.headphone.as_mut() {
            let (left, right) = headphone.process_stereo(&self.mix_left, &self.mix_right);
            self.mix_left.copy_from_slice(left);
            self.mix_right.copy_from_slice(right);
        }

        // fixed headroom policy plus user gain
        let gain = self.loudness_factor / (active.max(1) * 2) as Sample;

        let mut peak: Sample = 0.0;
        for n in 0..self.block_size {
            let left = self.mix_left[n] * gain;
            let right = self.mix_right[n] * gain;
            peak = peak.max(left.abs()).max(right.abs());
            out[n * 2] = left;
            out[n * 2 + 1] = right;
        }

        if self.clip_holdoff > 0 {
            self.clip_holdoff -= 1;
        }
        if peak > 1.0 && self.clip_holdoff == 0 {
            log::warn!("Clipping occurred (peak {:.3}): adjust loudnessFactor", peak);
            self.clip_holdoff = self.clip_interval;
        }
    }
}
