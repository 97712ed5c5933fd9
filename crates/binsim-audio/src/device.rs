//! Audio device selection

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat};

use crate::{AudioError, AudioResult};

/// Default output device of the platform host
pub fn default_output_device() -> AudioResult<Device> {
    let host = cpal::default_host();
    host.default_output_device().ok_or(AudioError::NoDevice)
}

/// Verify the device supports stereo f32 output at the given rate.
pub fn check_output_support(device: &Device, sample_rate: u32) -> AudioResult<()> {
    let rate: cpal::SampleRate = sample_rate;
    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    for supported in configs {
        if supported.channels() >= 2
            && supported.min_sample_rate() <= rate
            && supported.max_sample_rate() >= rate
            && supported.sample_format() == SampleFormat::F32
        {
            return Ok(());
        }
    }

    Err(AudioError::ConfigError(format!(
        "No stereo f32 output config at {} Hz",
        sample_rate
    )))
}
