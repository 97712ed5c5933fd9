//! Background-loaded sound source
//!
//! The audio thread calls [`SoundSource::read_block`] once per callback; it
//! is wait-free. A background loader thread owns all file decoding: playlist
//! requests travel over a bounded channel, finished playlists come back
//! through a 1-producer/1-consumer ring and are swapped in at the next block
//! boundary. Playlists are decoded whole, so end-of-file advance and looping
//! are plain cursor moves in memory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use hound::SampleFormat;
use rtrb::{Consumer, Producer, RingBuffer};

use binsim_core::{split_soundfile_list, Sample};

use crate::{AudioError, AudioResult};

/// Loader poll cadence while idle
const LOADER_POLL: Duration = Duration::from_millis(50);

/// One decoded sound file, deinterleaved and padded to whole blocks
struct SoundBuffer {
    channels: Vec<Vec<Sample>>,
    frames: usize,
}

/// A decoded playlist, handed from the loader to the audio thread
struct Playlist {
    sounds: Vec<SoundBuffer>,
}

impl Playlist {
    fn empty() -> Self {
        Self { sounds: Vec::new() }
    }
}

/// Block-aligned multichannel sample provider (audio-thread side)
pub struct SoundSource {
    block_size: usize,
    max_channels: usize,
    loop_sound: bool,

    request_tx: Sender<String>,
    staged_rx: Consumer<Playlist>,

    /// `max_channels` rows of `2 * block_size` samples; the leading block is
    /// what `read_block` returns, the trailing block is prefetch
    ring: Vec<Vec<Sample>>,
    playlist: Playlist,
    sound_index: usize,
    frame_cursor: usize,
    active_channels: usize,
    /// Playlist ran out and looping is off
    exhausted: bool,

    stop: Arc<AtomicBool>,
    loader: Option<JoinHandle<()>>,
}

impl SoundSource {
    /// Create the source and spawn its loader thread.
    pub fn spawn(
        block_size: usize,
        max_channels: usize,
        sample_rate: u32,
        loop_sound: bool,
    ) -> Self {
        let (request_tx, request_rx) = bounded::<String>(4);
        let (staged_tx, staged_rx) = RingBuffer::<Playlist>::new(2);
        let stop = Arc::new(AtomicBool::new(false));

        let loader_stop = Arc::clone(&stop);
        let loader = std::thread::Builder::new()
            .name("binsim-loader".into())
            .spawn(move || {
                loader_loop(
                    request_rx,
                    staged_tx,
                    block_size,
                    max_channels,
                    sample_rate,
                    loader_stop,
                )
            })
            .expect("failed to spawn loader thread");

        Self {
            block_size,
            max_channels,
            loop_sound,
            request_tx,
            staged_rx,
            ring: vec![vec![0.0; block_size * 2]; max_channels],
            playlist: Playlist::empty(),
            sound_index: 0,
            frame_cursor: 0,
            active_channels: 0,
            exhausted: true,
            stop,
            loader: Some(loader),
        }
    }

    /// Hand a `#`-separated path list to the loader. Non-blocking; a flood
    /// of requests beyond the queue depth is dropped with a warning.
    pub fn request_file_list(&self, list: &str) {
        if list.trim().is_empty() {
            return;
        }
        if self.request_tx.try_send(list.to_string()).is_err() {
            log::warn!("Sound file request queue full, dropping {:?}", list);
        }
    }

    /// Channel count of the currently playing file (0 while silent)
    pub fn active_channels(&self) -> usize {
        self.active_channels
    }

    /// Copy one block per active channel into `dst` and advance. Wait-free.
    ///
    /// Returns the number of active channels; rows beyond it are untouched.
    pub fn read_block(&mut self, dst: &mut [Vec<Sample>]) -> usize {
        if let Ok(playlist) = self.staged_rx.pop() {
            self.install_playlist(playlist);
        }

        let active = self.active_channels.min(dst.len());
        for (row, out) in self.ring.iter().zip(dst.iter_mut()).take(active) {
            out[..self.block_size].copy_from_slice(&row[..self.block_size]);
        }

        for row in &mut self.ring {
            row.copy_within(self.block_size.., 0);
        }
        self.append_next_block();

        active
    }

    fn install_playlist(&mut self, playlist: Playlist) {
        for row in &mut self.ring {
            row.fill(0.0);
        }
        self.playlist = playlist;
        self.sound_index = 0;
        self.frame_cursor = 0;
        self.exhausted = self.playlist.sounds.is_empty();
        self.active_channels = self
            .playlist
            .sounds
            .first()
            .map(|s| s.channels.len())
            .unwrap_or(0);
        log::info!(
            "Sound source: playlist with {} file(s), {} channel(s)",
            self.playlist.sounds.len(),
            self.active_channels
        );
    }

    /// Fill the prefetch half of the ring with the next block of sound,
    /// advancing through the playlist (and looping) as files run out.
    fn append_next_block(&mut self) {
        let block = self.block_size;

        if self.exhausted || self.playlist.sounds.is_empty() {
            for row in &mut self.ring {
                row[block..].fill(0.0);
            }
            return;
        }

        let sound = &self.playlist.sounds[self.sound_index];
        let start = self.frame_cursor;
        for (ch, row) in self.ring.iter_mut().enumerate() {
            if let Some(channel) = sound.channels.get(ch) {
                row[block..].copy_from_slice(&channel[start..start + block]);
            } else {
                row[block..].fill(0.0);
            }
        }

        self.frame_cursor += block;
        if self.frame_cursor >= sound.frames {
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.frame_cursor = 0;
        self.sound_index += 1;
        if self.sound_index >= self.playlist.sounds.len() {
            if self.loop_sound {
                self.sound_index = 0;
            } else {
                // keep the channel count so the buffered tail drains;
                // the ring runs dry to silence from here on
                self.exhausted = true;
                return;
            }
        }
        self.active_channels = self.playlist.sounds[self.sound_index].channels.len();
    }
}

impl Drop for SoundSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.loader.take() {
            let _ = handle.join();
        }
    }
}

fn loader_loop(
    requests: Receiver<String>,
    mut staged_tx: Producer<Playlist>,
    block_size: usize,
    max_channels: usize,
    sample_rate: u32,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        match requests.recv_timeout(LOADER_POLL) {
            Ok(list) => {
                let playlist = load_playlist(&list, block_size, max_channels, sample_rate);
                if staged_tx.push(playlist).is_err() {
                    log::warn!("Staged playlist slot full, dropping request {:?}", list);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn load_playlist(
    list: &str,
    block_size: usize,
    max_channels: usize,
    sample_rate: u32,
) -> Playlist {
    let mut sounds = Vec::new();
    for path in split_soundfile_list(list) {
        match load_sound(&path, block_size, max_channels, sample_rate) {
            Ok(sound) => sounds.push(sound),
            Err(e) => log::error!("Skipping sound file: {}", e),
        }
    }
    Playlist { sounds }
}

/// Decode one WAV file, cap its channel count, and pad to whole blocks.
fn load_sound(
    path: &str,
    block_size: usize,
    max_channels: usize,
    sample_rate: u32,
) -> AudioResult<SoundBuffer> {
    log::info!("Loading sound file {}", path);

    let mut reader = hound::WavReader::open(path).map_err(|e| AudioError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let spec = reader.spec();

    if spec.sample_rate != sample_rate {
        return Err(AudioError::SampleRateMismatch {
            path: path.to_string(),
            expected: sample_rate,
            actual: spec.sample_rate,
        });
    }

    let interleaved = decode_interleaved(&mut reader, path)?;
    let file_channels = spec.channels as usize;
    if file_channels > max_channels {
        log::warn!(
            "{}: {} channels exceed maxChannels {}, dropping the extra ones",
            path,
            file_channels,
            max_channels
        );
    }
    let channels = file_channels.min(max_channels);

    let frames = interleaved.len() / file_channels;
    if frames == 0 {
        return Err(AudioError::Decode {
            path: path.to_string(),
            message: "file contains no frames".to_string(),
        });
    }
    let padded_frames = frames.div_ceil(block_size) * block_size;

    let mut deinterleaved = vec![vec![0.0; padded_frames]; channels];
    for (frame, samples) in interleaved.chunks_exact(file_channels).enumerate() {
        for (ch, row) in deinterleaved.iter_mut().enumerate() {
            row[frame] = samples[ch];
        }
    }

    Ok(SoundBuffer {
        channels: deinterleaved,
        frames: padded_frames,
    })
}

fn decode_interleaved<R: std::io::Read>(
    reader: &mut hound::WavReader<R>,
    path: &str,
) -> AudioResult<Vec<Sample>> {
    let spec = reader.spec();
    let decode_err = |e: hound::Error| AudioError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    };

    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| decode_err(e)))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as Sample / 32768.0).map_err(|e| decode_err(e)))
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as Sample / 8_388_608.0).map_err(|e| decode_err(e)))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| {
                s.map(|v| v as Sample / 2_147_483_648.0)
                    .map_err(|e| decode_err(e))
            })
            .collect(),
        (format, bits) => Err(AudioError::Decode {
            path: path.to_string(),
            message: format!("unsupported sample format ({}-bit {:?})", bits, format),
        }),
    }
}
