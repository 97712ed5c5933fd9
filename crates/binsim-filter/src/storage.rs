//! Pose-indexed filter storage
//!
//! All filters named in the filter list are loaded and transformed to the
//! frequency domain at startup. The audio thread only ever performs map
//! lookups; a missing key substitutes the silent default filter of the
//! matching class and is warned about once.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use binsim_core::{Config, Pose, Sample};
use binsim_dsp::{crossfade_in, crossfade_out, BinauralFilter, BlockFft};

use crate::error::{FilterError, FilterResult};
use crate::list::{parse_filter_list, Record};
use crate::wav::{read_stereo_wav, IrData};

/// Which load-time shaping a record's class gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterClass {
    /// Fade-out on the last block
    Early,
    /// Fade-in on the first block
    LateReverb,
    /// No fade
    Headphone,
}

/// Preloaded frequency-domain filter dictionary
pub struct FilterStorage {
    early: HashMap<Pose, BinauralFilter>,
    late: HashMap<Pose, BinauralFilter>,
    headphone: Option<BinauralFilter>,
    default_early: BinauralFilter,
    default_late: BinauralFilter,
    missed_early: HashSet<Pose>,
    missed_late: HashSet<Pose>,
}

impl FilterStorage {
    /// Parse the filter list, verify every referenced file exists, then load
    /// and preprocess all filters. Any failure aborts initialization.
    pub fn load(config: &Config) -> FilterResult<Self> {
        log::info!("FilterStorage: loading {}", config.filter_list.display());

        let contents = std::fs::read_to_string(&config.filter_list)?;
        let records = parse_filter_list(&contents)?;

        // Fail fast before decoding anything
        for record in &records {
            if !record.path().exists() {
                return Err(FilterError::MissingFile(record.path().clone()));
            }
        }

        let block_size = config.block_size;
        let fft = BlockFft::new(block_size);
        let fade_out = crossfade_out(block_size);
        let fade_in = crossfade_in(block_size);

        let mut early = HashMap::new();
        let mut late = HashMap::new();
        let mut headphone = None;

        for record in records {
            match record {
                Record::Filter { pose, path } => {
                    log::info!("Loading filter {} ({})", pose, path.display());
                    let filter = load_filter(
                        &path,
                        config,
                        config.filter_size,
                        FilterClass::Early,
                        &fft,
                        &fade_in,
                        &fade_out,
                    )?;
                    if early.insert(pose, filter).is_some() {
                        log::warn!("Duplicate filter entry for pose {}; keeping the last", pose);
                    }
                }
                Record::LateReverb { pose, path } => {
                    if !config.use_splitted_filters {
                        log::warn!(
                            "Ignoring LATEREVERB entry {} (useSplittedFilters is off)",
                            path.display()
                        );
                        continue;
                    }
                    log::info!("Loading late reverb {} ({})", pose, path.display());
                    let filter = load_filter(
                        &path,
                        config,
                        config.late_reverb_size,
                        FilterClass::LateReverb,
                        &fft,
                        &fade_in,
                        &fade_out,
                    )?;
                    if late.insert(pose, filter).is_some() {
                        log::warn!(
                            "Duplicate late reverb entry for pose {}; keeping the last",
                            pose
                        );
                    }
                }
                Record::Headphone { path } => {
                    if !config.use_headphone_filter {
                        log::debug!(
                            "Ignoring HPFILTER entry {} (useHeadphoneFilter is off)",
                            path.display()
                        );
                        continue;
                    }
                    log::info!("Loading headphone filter {}", path.display());
                    headphone = Some(load_filter(
                        &path,
                        config,
                        config.headphone_filter_size,
                        FilterClass::Headphone,
                        &fft,
                        &fade_in,
                        &fade_out,
                    )?);
                }
            }
        }

        if config.use_headphone_filter && headphone.is_none() {
            return Err(FilterError::MissingHeadphoneFilter);
        }

        let early_blocks = config.early_blocks();
        let late_blocks = config.late_blocks().max(1);

        log::info!(
            "FilterStorage: {} early, {} late reverb filter(s) loaded",
            early.len(),
            late.len()
        );

        Ok(Self {
            early,
            late,
            headphone,
            default_early: BinauralFilter::zeroed(early_blocks, block_size),
            default_late: BinauralFilter::zeroed(late_blocks, block_size),
            missed_early: HashSet::new(),
            missed_late: HashSet::new(),
        })
    }

    /// Early filter for a pose; the silent default when the key is unmapped.
    pub fn get_early(&mut self, pose: &Pose) -> &BinauralFilter {
        if self.early.contains_key(pose) {
            &self.early[pose]
        } else {
            if self.missed_early.insert(*pose) {
                log::warn!("No filter for pose {}; substituting silence", pose);
            }
            &self.default_early
        }
    }

    /// Late reverb filter for a pose; the silent default when unmapped.
    pub fn get_late(&mut self, pose: &Pose) -> &BinauralFilter {
        if self.late.contains_key(pose) {
            &self.late[pose]
        } else {
            if self.missed_late.insert(*pose) {
                log::warn!("No late reverb filter for pose {}; substituting silence", pose);
            }
            &self.default_late
        }
    }

    /// Headphone compensation filter, present iff enabled in the config.
    pub fn headphone(&self) -> Option<&BinauralFilter> {
        self.headphone.as_ref()
    }

    pub fn early_count(&self) -> usize {
        self.early.len()
    }

    pub fn late_count(&self) -> usize {
        self.late.len()
    }
}

fn load_filter(
    path: &Path,
    config: &Config,
    target_len: usize,
    class: FilterClass,
    fft: &BlockFft,
    fade_in: &[Sample],
    fade_out: &[Sample],
) -> FilterResult<BinauralFilter> {
    let mut ir = read_stereo_wav(path)?;

    if ir.sample_rate != config.sampling_rate {
        return Err(FilterError::SampleRateMismatch {
            path: path.to_path_buf(),
            expected: config.sampling_rate,
            actual: ir.sample_rate,
        });
    }

    fit_length(&mut ir, target_len, path);
    apply_fade(&mut ir, class, fade_in, fade_out);

    Ok(BinauralFilter::from_time_domain(fft, &ir.left, &ir.right))
}

/// Zero-pad short impulse responses; truncate long ones with a warning.
fn fit_length(ir: &mut IrData, target_len: usize, path: &Path) {
    let frames = ir.frames();
    if frames < target_len {
        log::debug!(
            "{}: {} frames, padding to {}",
            path.display(),
            frames,
            target_len
        );
        ir.left.resize(target_len, 0.0);
        ir.right.resize(target_len, 0.0);
    } else if frames > target_len {
        log::warn!(
            "{}: {} frames exceed the configured {}, truncating",
            path.display(),
            frames,
            target_len
        );
        ir.left.truncate(target_len);
        ir.right.truncate(target_len);
    }
}

fn apply_fade(ir: &mut IrData, class: FilterClass, fade_in: &[Sample], fade_out: &[Sample]) {
    let block_size = fade_in.len();
    match class {
        FilterClass::Early => {
            let start = ir.frames() - block_size;
            for (n, w) in fade_out.iter().enumerate() {
                ir.left[start + n] *= w;
                ir.right[start + n] *= w;
            }
        }
        FilterClass::LateReverb => {
            for (n, w) in fade_in.iter().enumerate() {
                ir.left[n] *= w;
                ir.right[n] *= w;
            }
        }
        FilterClass::Headphone => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_wav(path: &Path, left: &[f32], right: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for (l, r) in left.iter().zip(right) {
            writer.write_sample(*l).unwrap();
            writer.write_sample(*r).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn test_config(dir: &Path, list: &str) -> Config {
        let list_path = dir.join("filter_list.txt");
        std::fs::write(&list_path, list).unwrap();
        Config {
            filter_list: list_path,
            block_size: 64,
            filter_size: 256,
            late_reverb_size: 128,
            headphone_filter_size: 0,
            ..Config::default()
        }
    }

    fn spectrum_energy(filter: &BinauralFilter) -> f32 {
        (0..filter.num_blocks())
            .flat_map(|b| filter.left_block(b).iter())
            .map(|c| c.norm())
            .sum()
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut ir = vec![0.0f32; 256];
        ir[0] = 1.0;
        let wav = dir.path().join("front.wav");
        write_wav(&wav, &ir, &ir, 44100);

        let config = test_config(
            dir.path(),
            &format!("FILTER 0 0 0 0 0 0 {}\n", wav.display()),
        );
        let mut storage = FilterStorage::load(&config).unwrap();
        assert_eq!(storage.early_count(), 1);

        let pose = Pose::default();
        let filter = storage.get_early(&pose);
        assert_eq!(filter.num_blocks(), 4);
        assert!(spectrum_energy(filter) > 0.0);
    }

    #[test]
    fn test_missing_key_returns_silence() {
        let dir = tempfile::tempdir().unwrap();
        let ir = vec![0.25f32; 256];
        let wav = dir.path().join("a.wav");
        write_wav(&wav, &ir, &ir, 44100);

        let config = test_config(
            dir.path(),
            &format!("FILTER 0 0 0 0 0 0 {}\n", wav.display()),
        );
        let mut storage = FilterStorage::load(&config).unwrap();

        let missing = Pose::from_values(&[9, 9, 9, 9, 9, 9]).unwrap();
        let filter = storage.get_early(&missing);
        assert_eq!(filter.num_blocks(), 4);
        assert_eq!(spectrum_energy(filter), 0.0);

        // repeated misses reuse the warned set
        let _ = storage.get_early(&missing);
        assert_eq!(storage.missed_early.len(), 1);
    }

    #[test]
    fn test_short_ir_padded_long_ir_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let short = vec![0.5f32; 100];
        let long = vec![0.5f32; 1000];
        let short_wav = dir.path().join("short.wav");
        let long_wav = dir.path().join("long.wav");
        write_wav(&short_wav, &short, &short, 44100);
        write_wav(&long_wav, &long, &long, 44100);

        let config = test_config(
            dir.path(),
            &format!(
                "FILTER 0 0 0 0 0 0 {}\nFILTER 1 0 0 0 0 0 {}\n",
                short_wav.display(),
                long_wav.display()
            ),
        );
        let mut storage = FilterStorage::load(&config).unwrap();

        let padded = storage.get_early(&Pose::default());
        assert_eq!(padded.num_blocks(), 4);
        let truncated = storage.get_early(&Pose::from_values(&[1, 0, 0, 0, 0, 0]).unwrap());
        assert_eq!(truncated.num_blocks(), 4);
    }

    #[test]
    fn test_early_fade_out_applied() {
        // An all-ones IR keeps full energy in every block except the last,
        // whose DC bin must equal the fade-out window sum.
        let dir = tempfile::tempdir().unwrap();
        let ones = vec![1.0f32; 256];
        let wav = dir.path().join("ones.wav");
        write_wav(&wav, &ones, &ones, 44100);

        let config = test_config(
            dir.path(),
            &format!("FILTER 0 0 0 0 0 0 {}\n", wav.display()),
        );
        let mut storage = FilterStorage::load(&config).unwrap();
        let filter = storage.get_early(&Pose::default());

        let window_sum: f32 = crossfade_out(64).iter().sum();
        assert!((filter.left_block(0)[0].re - 64.0).abs() < 1e-3);
        assert!((filter.left_block(3)[0].re - window_sum).abs() < 1e-3);
    }

    #[test]
    fn test_late_reverb_fade_in_applied() {
        let dir = tempfile::tempdir().unwrap();
        let ones = vec![1.0f32; 128];
        let wav = dir.path().join("tail.wav");
        write_wav(&wav, &ones, &ones, 44100);

        let mut config = test_config(
            dir.path(),
            &format!("LATEREVERB 0 0 0 0 0 0 {}\n", wav.display()),
        );
        config.use_splitted_filters = true;

        let mut storage = FilterStorage::load(&config).unwrap();
        assert_eq!(storage.late_count(), 1);

        let filter = storage.get_late(&Pose::default());
        let window_sum: f32 = crossfade_in(64).iter().sum();
        assert!((filter.left_block(0)[0].re - window_sum).abs() < 1e-3);
        assert!((filter.left_block(1)[0].re - 64.0).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), "FILTER 0 0 0 0 0 0 /nonexistent/brir.wav\n");
        assert!(matches!(
            FilterStorage::load(&config),
            Err(FilterError::MissingFile(_))
        ));
    }

    #[test]
    fn test_sample_rate_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ir = vec![0.5f32; 256];
        let wav = dir.path().join("wrong_rate.wav");
        write_wav(&wav, &ir, &ir, 48000);

        let config = test_config(
            dir.path(),
            &format!("FILTER 0 0 0 0 0 0 {}\n", wav.display()),
        );
        assert!(matches!(
            FilterStorage::load(&config),
            Err(FilterError::SampleRateMismatch { actual: 48000, .. })
        ));
    }

    #[test]
    fn test_headphone_filter_required_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let ir = vec![0.5f32; 256];
        let wav = dir.path().join("a.wav");
        write_wav(&wav, &ir, &ir, 44100);

        let mut config = test_config(
            dir.path(),
            &format!("FILTER 0 0 0 0 0 0 {}\n", wav.display()),
        );
        config.use_headphone_filter = true;
        config.headphone_filter_size = 128;

        assert!(matches!(
            FilterStorage::load(&config),
            Err(FilterError::MissingHeadphoneFilter)
        ));

        // with an HPFILTER line it loads
        let hp = dir.path().join("hp.wav");
        let hp_ir = vec![1.0f32; 128];
        write_wav(&hp, &hp_ir, &hp_ir, 44100);
        let mut config = test_config(
            dir.path(),
            &format!(
                "FILTER 0 0 0 0 0 0 {}\nHPFILTER {}\n",
                wav.display(),
                hp.display()
            ),
        );
        config.use_headphone_filter = true;
        config.headphone_filter_size = 128;

        let storage = FilterStorage::load(&config).unwrap();
        let hp_filter = storage.headphone().unwrap();
        assert_eq!(hp_filter.num_blocks(), 2);
    }

    #[test]
    fn test_late_reverb_ignored_when_split_off() {
        let dir = tempfile::tempdir().unwrap();
        let ir = vec![0.5f32; 128];
        let wav = dir.path().join("tail.wav");
        write_wav(&wav, &ir, &ir, 44100);

        let config = test_config(
            dir.path(),
            &format!("LATEREVERB 0 0 0 0 0 0 {}\n", wav.display()),
        );
        let storage = FilterStorage::load(&config).unwrap();
        assert_eq!(storage.late_count(), 0);
    }

    #[test]
    fn test_records_with_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let ir = vec![0.1f32; 256];
        let wav: PathBuf = dir.path().join("abs.wav");
        write_wav(&wav, &ir, &ir, 44100);

        let config = test_config(dir.path(), &format!("0 0 40 1 1 0 {}\n", wav.display()));
        let mut storage = FilterStorage::load(&config).unwrap();
        let pose = Pose::from_values(&[0, 0, 40, 1, 1, 0]).unwrap();
        assert!(spectrum_energy(storage.get_early(&pose)) > 0.0);
    }
}
