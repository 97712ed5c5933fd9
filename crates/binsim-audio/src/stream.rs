//! Audio output stream
//!
//! Stereo f32 output at a fixed block size. The device driver may hand out
//! buffers larger than one block; the callback slices them into
//! block-sized chunks and invokes the renderer once per chunk.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};

use binsim_core::Sample;

use crate::device::{check_output_support, default_output_device};
use crate::{AudioError, AudioResult};

/// Renders one interleaved stereo block (`block_size * 2` samples)
pub type RenderCallback = Box<dyn FnMut(&mut [Sample]) + Send + 'static>;

/// Output stream parameters
#[derive(Debug, Clone, Copy)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub block_size: usize,
}

/// Running stereo output stream
pub struct AudioStream {
    stream: Stream,
    params: StreamParams,
}

impl AudioStream {
    /// Open the default output device and build (but not start) the stream.
    pub fn output(params: StreamParams, mut render: RenderCallback) -> AudioResult<Self> {
        let device = default_output_device()?;
        check_output_support(&device, params.sample_rate)?;

        if let Ok(name) = device.name() {
            log::info!("Audio output: {} @ {} Hz", name, params.sample_rate);
        }

        let config = StreamConfig {
            channels: 2,
            sample_rate: params.sample_rate as SampleRate,
            buffer_size: BufferSize::Fixed(params.block_size as u32),
        };

        let frame_samples = params.block_size * 2;
        let mut scratch = vec![0.0f32; frame_samples];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(frame_samples) {
                        if chunk.len() == frame_samples {
                            render(chunk);
                        } else {
                            // partial device buffer: render a full block and
                            // keep the leading part
                            render(&mut scratch);
                            chunk.copy_from_slice(&scratch[..chunk.len()]);
                        }
                    }
                },
                move |err| {
                    log::error!("Audio output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        Ok(Self { stream, params })
    }

    pub fn start(&self) -> AudioResult<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }

    pub fn stop(&self) -> AudioResult<()> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamError(e.to_string()))
    }

    pub fn params(&self) -> StreamParams {
        self.params
    }
}
