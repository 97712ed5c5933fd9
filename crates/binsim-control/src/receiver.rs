//! OSC/UDP command receiver
//!
//! Listens for `/pyBinSim*` messages and writes them into the shared
//! [`CommandState`]. Runs on its own thread; the socket read timeout keeps
//! shutdown responsive.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rosc::{OscMessage, OscPacket, OscType};

use binsim_core::parse_boolean;

use crate::error::ControlResult;
use crate::state::{CommandState, KeySlice};

/// Default control port of the wire protocol
pub const DEFAULT_OSC_PORT: u16 = 10000;

const FILTER_PREFIX: &str = "/pyBinSimFilter";
const LATE_PREFIX: &str = "/pyBinSimLateReverbFilter";

/// Background OSC receiver bound to a UDP socket
pub struct OscReceiver {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl OscReceiver {
    /// Bind the socket and start the receiver thread.
    pub fn spawn(bind: SocketAddr, state: Arc<CommandState>) -> ControlResult<Self> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;
        let local_addr = socket.local_addr()?;

        log::info!("OSC receiver listening on {}", local_addr);

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("binsim-osc".into())
            .spawn(move || receive_loop(socket, state, thread_stop))?;

        Ok(Self {
            stop,
            thread: Some(thread),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for OscReceiver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn receive_loop(socket: UdpSocket, state: Arc<CommandState>, stop: Arc<AtomicBool>) {
    let mut buf = [0u8; rosc::decoder::MTU];

    while !stop.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((size, _peer)) => match rosc::decoder::decode_udp(&buf[..size]) {
                Ok((_, packet)) => handle_packet(&state, packet),
                Err(e) => log::warn!("Undecodable OSC datagram: {}", e),
            },
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::error!("OSC socket error: {}", e);
                break;
            }
        }
    }

    log::info!("OSC receiver stopped");
}

fn handle_packet(state: &CommandState, packet: OscPacket) {
    match packet {
        OscPacket::Message(message) => handle_message(state, &message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                handle_packet(state, inner);
            }
        }
    }
}

/// Dispatch a single decoded message. Separated from the socket loop so the
/// protocol logic is testable without networking.
fn handle_message(state: &CommandState, message: &OscMessage) {
    let addr = message.addr.as_str();

    if let Some(suffix) = addr.strip_prefix(LATE_PREFIX) {
        handle_filter_message(state, message, suffix, true);
    } else if let Some(suffix) = addr.strip_prefix(FILTER_PREFIX) {
        handle_filter_message(state, message, suffix, false);
    } else {
        match addr {
            "/pyBinSimFile" => handle_file_message(state, message),
            "/pyBinSimPauseAudioPlayback" => {
                if let Some(paused) = boolean_arg(message) {
                    log::info!("Pause playback: {}", paused);
                    state.set_pause_playback(paused);
                } else {
                    log::warn!("Bad argument for {}", addr);
                }
            }
            "/pyBinSimPauseConvolution" => {
                if let Some(paused) = boolean_arg(message) {
                    log::info!("Pause convolution: {}", paused);
                    state.set_pause_convolution(paused);
                } else {
                    log::warn!("Bad argument for {}", addr);
                }
            }
            other => log::warn!("Unhandled OSC address {:?}", other),
        }
    }
}

fn handle_filter_message(state: &CommandState, message: &OscMessage, suffix: &str, late: bool) {
    let Some(slice) = key_slice_for(suffix) else {
        log::warn!("Unhandled OSC address {:?}", message.addr);
        return;
    };

    let Some(values) = integer_args(message) else {
        log::warn!("{}: non-integer arguments dropped", message.addr);
        return;
    };

    // channel index plus the sliced key values
    if values.len() != slice.width() + 1 {
        log::warn!(
            "{}: expected {} values, got {}",
            message.addr,
            slice.width() + 1,
            values.len()
        );
        return;
    }

    let channel = values[0];
    if channel < 0 {
        log::warn!("{}: negative channel {} dropped", message.addr, channel);
        return;
    }

    if late {
        state.update_late_key(channel as usize, slice, &values[1..]);
    } else {
        state.update_filter_key(channel as usize, slice, &values[1..]);
    }
}

fn handle_file_message(state: &CommandState, message: &OscMessage) {
    match message.args.first() {
        Some(OscType::String(list)) => {
            log::info!("Sound file request: {}", list);
            state.request_sound_file(list.clone());
        }
        _ => log::warn!("/pyBinSimFile expects a string argument"),
    }
}

fn key_slice_for(suffix: &str) -> Option<KeySlice> {
    match suffix {
        "" => Some(KeySlice::Full),
        "Short" => Some(KeySlice::Short),
        "Orientation" => Some(KeySlice::Orientation),
        "Position" => Some(KeySlice::Position),
        "Custom" => Some(KeySlice::Custom),
        _ => None,
    }
}

fn integer_args(message: &OscMessage) -> Option<Vec<i32>> {
    message
        .args
        .iter()
        .map(|arg| match arg {
            OscType::Int(i) => Some(*i),
            OscType::Long(l) => Some(*l as i32),
            _ => None,
        })
        .collect()
}

/// Pause flags arrive as OSC bools, ints, or the strings `True`/`False`.
fn boolean_arg(message: &OscMessage) -> Option<bool> {
    match message.args.first()? {
        OscType::Bool(b) => Some(*b),
        OscType::Int(i) => Some(*i != 0),
        OscType::Long(l) => Some(*l != 0),
        OscType::String(s) => parse_boolean(s),
        _ => None,
    }
}
