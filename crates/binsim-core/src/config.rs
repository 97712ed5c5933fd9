//! Startup configuration
//!
//! Plain-text `key value` format, one option per line. Parsed once into an
//! explicit record; the engine never consults string keys at runtime.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Parse the two accepted boolean spellings.
///
/// Only the exact strings `True` and `False` are valid.
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value {
        "True" => Some(true),
        "False" => Some(false),
        _ => None,
    }
}

/// Engine configuration, one field per recognized option
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial playlist, paths joined by `#` (empty: start silent)
    pub soundfile: String,
    /// Samples per audio block
    pub block_size: usize,
    /// Samples per early filter; must be a multiple of `block_size`
    pub filter_size: usize,
    /// Samples in the late-reverb part when split filters are on
    pub late_reverb_size: usize,
    /// Samples in the headphone compensation filter
    pub headphone_filter_size: usize,
    /// Path to the filter list file
    pub filter_list: PathBuf,
    /// Crossfade convolver output on early filter change
    pub enable_crossfading: bool,
    /// Apply the headphone compensation convolver
    pub use_headphone_filter: bool,
    /// Enable the split early/late filter composition
    pub use_splitted_filters: bool,
    /// Post-mix gain
    pub loudness_factor: f32,
    /// Upper bound on source channels
    pub max_channels: usize,
    /// Required sample rate for the device and all assets
    pub sampling_rate: u32,
    /// Restart the playlist when it runs out
    pub loop_sound: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            soundfile: String::new(),
            block_size: 256,
            filter_size: 16384,
            late_reverb_size: 0,
            headphone_filter_size: 0,
            filter_list: PathBuf::new(),
            enable_crossfading: false,
            use_headphone_filter: false,
            use_splitted_filters: false,
            loudness_factor: 1.0,
            max_channels: 8,
            sampling_rate: 44100,
            loop_sound: true,
        }
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without validating cross-field constraints.
    pub fn parse_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default();
            let value = match parts.next() {
                Some(v) => v.trim(),
                None => {
                    return Err(ConfigError::MalformedLine {
                        line: index + 1,
                        content: line.to_string(),
                    })
                }
            };

            config.apply(key, value)?;
        }

        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "soundfile" => self.soundfile = value.to_string(),
            "blockSize" => self.block_size = parse_int(key, value)?,
            "filterSize" => self.filter_size = parse_int(key, value)?,
            "lateReverbSize" => self.late_reverb_size = parse_int(key, value)?,
            "headphoneFilterSize" => self.headphone_filter_size = parse_int(key, value)?,
            "filterList" => self.filter_list = PathBuf::from(value),
            "enableCrossfading" => self.enable_crossfading = parse_bool(key, value)?,
            "useHeadphoneFilter" => self.use_headphone_filter = parse_bool(key, value)?,
            "useSplittedFilters" => self.use_splitted_filters = parse_bool(key, value)?,
            "loudnessFactor" => {
                self.loudness_factor =
                    value.parse::<f32>().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
            }
            "maxChannels" => self.max_channels = parse_int(key, value)?,
            "samplingRate" => self.sampling_rate = parse_int(key, value)? as u32,
            "loopSound" => self.loop_sound = parse_bool(key, value)?,
            _ => log::warn!("Unknown config option {:?} ignored", key),
        }
        Ok(())
    }

    /// Check cross-field constraints that parsing alone cannot see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_list.as_os_str().is_empty() {
            return Err(ConfigError::MissingOption("filterList"));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("blockSize must be positive".into()));
        }
        if self.max_channels == 0 {
            return Err(ConfigError::Invalid("maxChannels must be at least 1".into()));
        }
        if self.sampling_rate == 0 {
            return Err(ConfigError::Invalid("samplingRate must be positive".into()));
        }
        if self.filter_size == 0 || self.filter_size % self.block_size != 0 {
            return Err(ConfigError::Invalid(format!(
                "filterSize {} must be a positive multiple of blockSize {}",
                self.filter_size, self.block_size
            )));
        }
        if self.use_splitted_filters {
            if self.late_reverb_size == 0 || self.late_reverb_size % self.block_size != 0 {
                return Err(ConfigError::Invalid(format!(
                    "lateReverbSize {} must be a positive multiple of blockSize {} \
                     when useSplittedFilters is True",
                    self.late_reverb_size, self.block_size
                )));
            }
        }
        if self.use_headphone_filter
            && (self.headphone_filter_size == 0
                || self.headphone_filter_size % self.block_size != 0)
        {
            return Err(ConfigError::Invalid(format!(
                "headphoneFilterSize {} must be a positive multiple of blockSize {} \
                 when useHeadphoneFilter is True",
                self.headphone_filter_size, self.block_size
            )));
        }
        Ok(())
    }

    /// Early filter length in blocks
    pub fn early_blocks(&self) -> usize {
        self.filter_size / self.block_size
    }

    /// Late-reverb length in blocks (0 when split filters are off)
    pub fn late_blocks(&self) -> usize {
        if self.use_splitted_filters {
            self.late_reverb_size / self.block_size
        } else {
            0
        }
    }

    /// Headphone filter length in blocks
    pub fn headphone_blocks(&self) -> usize {
        self.headphone_filter_size / self.block_size
    }

    /// Playlist paths from the `soundfile` option
    pub fn soundfile_paths(&self) -> Vec<String> {
        split_soundfile_list(&self.soundfile)
    }
}

/// Split a `#`-separated playlist string into paths, dropping empty entries.
pub fn split_soundfile_list(list: &str) -> Vec<String> {
    list.split('#')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_int(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_boolean(value).ok_or_else(|| ConfigError::InvalidBoolean {
        key: key.to_string(),
        value: value.to_string(),
    })
}
