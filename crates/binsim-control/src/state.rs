//! Shared command state
//!
//! Single writer (the receiver thread), single reader (the audio thread).
//! Dirty flags are atomic booleans with release/acquire pairing; pose slots
//! sit behind mutexes that are only ever held for a few loads and stores.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use binsim_core::Pose;

/// Which indices of the 9-integer key a message updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlice {
    /// Indices 0..9
    Full,
    /// Indices 0..6 (orientation + position)
    Short,
    /// Indices 0..3
    Orientation,
    /// Indices 3..6
    Position,
    /// Indices 6..9
    Custom,
}

impl KeySlice {
    pub fn offset(self) -> usize {
        match self {
            KeySlice::Full | KeySlice::Short | KeySlice::Orientation => 0,
            KeySlice::Position => 3,
            KeySlice::Custom => 6,
        }
    }

    /// Number of key values the slice covers
    pub fn width(self) -> usize {
        match self {
            KeySlice::Full => 9,
            KeySlice::Short => 6,
            KeySlice::Orientation | KeySlice::Position | KeySlice::Custom => 3,
        }
    }
}

struct ChannelCommand {
    early_pose: Mutex<Pose>,
    early_dirty: AtomicBool,
    late_pose: Mutex<Pose>,
    late_dirty: AtomicBool,
}

impl ChannelCommand {
    fn new() -> Self {
        // dirty from the start: each channel performs an initial lookup with
        // the all-zero key on its first block
        Self {
            early_pose: Mutex::new(Pose::default()),
            early_dirty: AtomicBool::new(true),
            late_pose: Mutex::new(Pose::default()),
            late_dirty: AtomicBool::new(true),
        }
    }
}

/// Control values shared between the receiver and the audio thread
pub struct CommandState {
    channels: Vec<ChannelCommand>,
    sound_file: Mutex<Option<String>>,
    pause_playback: AtomicBool,
    pause_convolution: AtomicBool,
}

impl CommandState {
    pub fn new(max_channels: usize) -> Self {
        Self {
            channels: (0..max_channels).map(|_| ChannelCommand::new()).collect(),
            sound_file: Mutex::new(None),
            pause_playback: AtomicBool::new(false),
            pause_convolution: AtomicBool::new(false),
        }
    }

    pub fn max_channels(&self) -> usize {
        self.channels.len()
    }

    // ---- receiver side ----

    /// Update (part of) a channel's early filter key. The dirty flag is only
    /// raised when the resulting key differs from the stored one.
    pub fn update_filter_key(&self, channel: usize, slice: KeySlice, values: &[i32]) {
        let Some(command) = self.channels.get(channel) else {
            log::warn!("Filter key for out-of-range channel {} dropped", channel);
            return;
        };
        debug_assert_eq!(values.len(), slice.width());

        let mut pose = command.early_pose.lock();
        let mut updated = *pose;
        updated.apply_slice(slice.offset(), values);
        if updated != *pose {
            *pose = updated;
            command.early_dirty.store(true, Ordering::Release);
        } else {
            log::debug!("Channel {}: same filter key as before", channel);
        }
    }

    /// Update (part of) a channel's late reverb key; analogous to
    /// [`CommandState::update_filter_key`].
    pub fn update_late_key(&self, channel: usize, slice: KeySlice, values: &[i32]) {
        let Some(command) = self.channels.get(channel) else {
            log::warn!("Late reverb key for out-of-range channel {} dropped", channel);
            return;
        };
        debug_assert_eq!(values.len(), slice.width());

        let mut pose = command.late_pose.lock();
        let mut updated = *pose;
        updated.apply_slice(slice.offset(), values);
        if updated != *pose {
            *pose = updated;
            command.late_dirty.store(true, Ordering::Release);
        } else {
            log::debug!("Channel {}: same late reverb key as before", channel);
        }
    }

    /// Overwrite the requested playlist string.
    pub fn request_sound_file(&self, list: String) {
        *self.sound_file.lock() = Some(list);
    }

    pub fn set_pause_playback(&self, paused: bool) {
        self.pause_playback.store(paused, Ordering::Release);
    }

    pub fn set_pause_convolution(&self, paused: bool) {
        self.pause_convolution.store(paused, Ordering::Release);
    }

    // ---- audio side ----

    /// Fetch-and-clear a channel's early dirty flag; the current key when it
    /// was set.
    pub fn take_early_update(&self, channel: usize) -> Option<Pose> {
        let command = self.channels.get(channel)?;
        if command.early_dirty.swap(false, Ordering::AcqRel) {
            Some(*command.early_pose.lock())
        } else {
            None
        }
    }

    /// Fetch-and-clear a channel's late dirty flag.
    pub fn take_late_update(&self, channel: usize) -> Option<Pose> {
        let command = self.channels.get(channel)?;
        if command.late_dirty.swap(false, Ordering::AcqRel) {
            Some(*command.late_pose.lock())
        } else {
            None
        }
    }

    /// Fetch-and-clear the pending playlist request.
    pub fn take_sound_file_request(&self) -> Option<String> {
        self.sound_file.lock().take()
    }

    pub fn pause_playback(&self) -> bool {
        self.pause_playback.load(Ordering::Acquire)
    }

    pub fn pause_convolution(&self) -> bool {
        self.pause_convolution.load(Ordering::Acquire)
    }
}
