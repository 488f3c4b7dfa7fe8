use std::path::PathBuf;
use tracing::debug;
use crate::{
    audio::{read_audio, trim::trim_silence},
    config::AcousticConfig,
    error::Result,
    feature::Wave,
    transform::Transform,
};
/// Decodes a waveform file at a fixed rate, optionally trimming silence and
/// zero-padding both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveFileLoad {
    sample_rate: u32,
    top_db: Option<f64>,
    pad_second: f64,
}
impl WaveFileLoad {
    pub fn new(sample_rate: u32, top_db: Option<f64>, pad_second: f64) -> Self {
        Self { sample_rate, top_db, pad_second }
    }
    pub fn from_config(config: &AcousticConfig) -> Self {
        Self::new(config.sample_rate, config.top_db, config.pad_second)
    }
}
impl Transform<PathBuf, Wave> for WaveFileLoad {
    fn apply(&self, path: PathBuf, _is_test: bool) -> Result<Wave> {
        let mut wave = read_audio(&path, self.sample_rate)?;
        if let Some(top_db) = self.top_db {
            let before = wave.len();
            wave = trim_silence(&wave, top_db);
            debug!("Trimmed {}: {} -> {} samples", path.display(), before, wave.len());
        }
        if self.pad_second > 0.0 {
            let pad = (self.sample_rate as f64 * self.pad_second) as usize;
            let mut padded = vec![0.0; pad];
            padded.extend_from_slice(&wave);
            padded.resize(padded.len() + pad, 0.0);
            wave = padded;
        }
        Ok(Wave { wave, sampling_rate: self.sample_rate })
    }
}
