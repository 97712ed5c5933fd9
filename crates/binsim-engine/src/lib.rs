//! binsim-engine: application assembly
//!
//! Wires the filter store, OSC receiver, sound source, and convolvers into
//! an audio stream. Initialization order is storage → control → source →
//! stream; teardown runs in reverse.

mod context;
mod error;

pub use context::RenderContext;
pub use error::{EngineError, EngineResult};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use binsim_audio::{AudioStream, SoundSource, StreamParams};
use binsim_control::{CommandState, OscReceiver, DEFAULT_OSC_PORT};
use binsim_core::Config;
use binsim_filter::FilterStorage;

/// The assembled binaural renderer
pub struct BinSim {
    stream: AudioStream,
    _receiver: OscReceiver,
}

impl BinSim {
    /// Load all filters, start the control and loader threads, and build
    /// the output stream. Any failure here aborts startup.
    pub fn new(config: Config) -> EngineResult<Self> {
        config.validate()?;

        let storage = FilterStorage::load(&config)?;

        let commands = Arc::new(CommandState::new(config.max_channels));
        let bind: SocketAddr = (Ipv4Addr::LOCALHOST, DEFAULT_OSC_PORT).into();
        let receiver = OscReceiver::spawn(bind, Arc::clone(&commands))?;

        let source = SoundSource::spawn(
            config.block_size,
            config.max_channels,
            config.sampling_rate,
            config.loop_sound,
        );
        if !config.soundfile.is_empty() {
            source.request_file_list(&config.soundfile);
        }

        let mut context = RenderContext::new(&config, storage, source, Arc::clone(&commands));
        let params = StreamParams {
            sample_rate: config.sampling_rate,
            block_size: config.block_size,
        };
        let stream = AudioStream::output(params, Box::new(move |out| context.render_block(out)))?;

        Ok(Self {
            stream,
            _receiver: receiver,
        })
    }

    /// Start playback and block for the life of the process.
    pub fn run(&self) -> EngineResult<()> {
        self.stream.start()?;
        log::info!("binsim running, listening for OSC control messages");

        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    pub fn start(&self) -> EngineResult<()> {
        self.stream.start()?;
        Ok(())
    }

    pub fn stop(&self) -> EngineResult<()> {
        self.stream.stop()?;
        Ok(())
    }
}
