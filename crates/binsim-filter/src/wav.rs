//! WAV impulse response decoding
//!
//! Impulse responses are stored as stereo WAV files; integer PCM is scaled
//! to float on load.

use std::path::Path;

use hound::SampleFormat;

use binsim_core::Sample;

use crate::error::{FilterError, FilterResult};

/// Decoded stereo impulse response
pub struct IrData {
    pub left: Vec<Sample>,
    pub right: Vec<Sample>,
    pub sample_rate: u32,
}

impl IrData {
    pub fn frames(&self) -> usize {
        self.left.len()
    }
}

/// Read a stereo WAV file as float samples.
///
/// Accepts 16/24/32-bit integer PCM and 32-bit float.
pub fn read_stereo_wav(path: &Path) -> FilterResult<IrData> {
    let mut reader = hound::WavReader::open(path).map_err(|e| FilterError::Wav {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let spec = reader.spec();
    if spec.channels != 2 {
        return Err(FilterError::ChannelCount {
            path: path.to_path_buf(),
            channels: spec.channels,
        });
    }

    let interleaved = decode_samples(&mut reader, path)?;

    let frames = interleaved.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }

    Ok(IrData {
        left,
        right,
        sample_rate: spec.sample_rate,
    })
}

fn decode_samples<R: std::io::Read>(
    reader: &mut hound::WavReader<R>,
    path: &Path,
) -> FilterResult<Vec<Sample>> {
    let spec = reader.spec();
    let wav_err = |e: hound::Error| FilterError::Wav {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| wav_err(e)))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as Sample / 32768.0).map_err(|e| wav_err(e)))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as Sample / 8_388_608.0).map_err(|e| wav_err(e)))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as Sample / 2_147_483_648.0).map_err(|e| wav_err(e)))
            .collect(),
        (format, bits) => Err(FilterError::UnsupportedFormat {
            path: path.to_path_buf(),
            bits,
            format,
        }),
    }
}
