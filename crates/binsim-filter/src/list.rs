//! Filter list parsing
//!
//! One record per line, whitespace-separated tokens, the last token being a
//! WAV path. Recognized shapes:
//!
//! ```text
//! HPFILTER                          headphone.wav
//! FILTER      y p r x y z [a b c]   brir.wav
//! LATEREVERB  y p r x y z [a b c]   tail.wav
//! y p r x y z [a b c]               brir.wav     (legacy, same as FILTER)
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::path::PathBuf;

use binsim_core::Pose;

use crate::error::{FilterError, FilterResult};

/// One parsed filter list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Early (full or short) filter at a pose key
    Filter { pose: Pose, path: PathBuf },
    /// Late reverb filter at a pose key
    LateReverb { pose: Pose, path: PathBuf },
    /// Global headphone compensation filter
    Headphone { path: PathBuf },
}

impl Record {
    pub fn path(&self) -> &PathBuf {
        match self {
            Record::Filter { path, .. }
            | Record::LateReverb { path, .. }
            | Record::Headphone { path } => path,
        }
    }
}

/// Parse a whole filter list file.
pub fn parse_filter_list(contents: &str) -> FilterResult<Vec<Record>> {
    let mut records = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        if let Some(record) = parse_line(line, index + 1)? {
            records.push(record);
        }
    }

    Ok(records)
}

fn parse_line(line: &str, line_no: usize) -> FilterResult<Option<Record>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let malformed = || FilterError::MalformedLine {
        line: line_no,
        content: line.to_string(),
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(malformed());
    }

    let path = PathBuf::from(tokens[tokens.len() - 1]);

    match tokens[0] {
        "HPFILTER" => {
            if tokens.len() != 2 {
                return Err(malformed());
            }
            Ok(Some(Record::Headphone { path }))
        }
        "FILTER" => {
            let pose = parse_pose(&tokens[1..tokens.len() - 1]).ok_or_else(malformed)?;
            Ok(Some(Record::Filter { pose, path }))
        }
        "LATEREVERB" => {
            let pose = parse_pose(&tokens[1..tokens.len() - 1]).ok_or_else(malformed)?;
            Ok(Some(Record::LateReverb { pose, path }))
        }
        _ => {
            // legacy shape: bare key values followed by the path
            let pose = parse_pose(&tokens[..tokens.len() - 1]).ok_or_else(malformed)?;
            Ok(Some(Record::Filter { pose, path }))
        }
    }
}

fn parse_pose(tokens: &[&str]) -> Option<Pose> {
    let values: Option<Vec<i32>> = tokens.iter().map(|t| t.parse::<i32>().ok()).collect();
    Pose::from_values(&values?).ok()
}
