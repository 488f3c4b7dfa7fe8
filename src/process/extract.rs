use std::sync::Arc;
use ndarray::Array2;
use tracing::debug;
use crate::{
    config::AcousticConfig,
    error::{DatasetError, Result},
    feature::{AcousticFeature, Wave},
    transform::Transform,
};
/// Pitch, spectral envelope and aperiodicity estimation (WORLD) plus the
/// mel-cepstral transform. Row `t` of every output is analysis frame `t`.
pub trait SpeechAnalyzer: Send + Sync {
    /// Raw f0 contour and frame times in seconds, one frame per `frame_period` ms.
    fn dio(&self, x: &[f64], fs: u32, frame_period: f64) -> anyhow::Result<(Vec<f64>, Vec<f64>)>;
    /// Refined f0, same length as `f0`.
    fn stonemask(&self, x: &[f64], f0: &[f64], t: &[f64], fs: u32) -> anyhow::Result<Vec<f64>>;
    /// Spectral envelope, `(frames, fft_size / 2 + 1)`.
    fn cheaptrick(&self, x: &[f64], f0: &[f64], t: &[f64], fs: u32) -> anyhow::Result<Array2<f64>>;
    /// Aperiodicity, same shape as the envelope.
    fn d4c(&self, x: &[f64], f0: &[f64], t: &[f64], fs: u32) -> anyhow::Result<Array2<f64>>;
    /// Mel-cepstrum, `(frames, order + 1)`.
    fn sp2mc(&self, spectrogram: &Array2<f64>, order: usize, alpha: f64) -> anyhow::Result<Array2<f64>>;
}
fn analysis_failed(stage: &str, e: anyhow::Error) -> DatasetError {
    DatasetError::Extraction(format!("{}: {:#}", stage, e))
}
pub struct AcousticFeatureExtract {
    analyzer: Arc<dyn SpeechAnalyzer>,
    frame_period: f64,
    order: usize,
    alpha: f64,
}
impl AcousticFeatureExtract {
    pub fn new(analyzer: Arc<dyn SpeechAnalyzer>, frame_period: f64, order: usize, alpha: f64) -> Self {
        Self { analyzer, frame_period, order, alpha }
    }
    pub fn from_config(analyzer: Arc<dyn SpeechAnalyzer>, config: &AcousticConfig) -> Self {
        Self::new(analyzer, config.frame_period, config.order, config.alpha)
    }
}
impl Transform<Wave, AcousticFeature> for AcousticFeatureExtract {
    fn apply(&self, data: Wave, _is_test: bool) -> Result<AcousticFeature> {
        let (x, fs) = (&data.wave, data.sampling_rate);
        if x.is_empty() || x.iter().all(|&s| s == 0.0) {
            return Err(DatasetError::Extraction("wave is empty or silent".into()));
        }
        let (raw_f0, t) = self
            .analyzer
            .dio(x, fs, self.frame_period)
            .map_err(|e| analysis_failed("dio", e))?;
        let f0 = self
            .analyzer
            .stonemask(x, &raw_f0, &t, fs)
            .map_err(|e| analysis_failed("stonemask", e))?;
        let spectrogram = self
            .analyzer
            .cheaptrick(x, &f0, &t, fs)
            .map_err(|e| analysis_failed("cheaptrick", e))?;
        let aperiodicity = self
            .analyzer
            .d4c(x, &f0, &t, fs)
            .map_err(|e| analysis_failed("d4c", e))?;
        let mfcc = self
            .analyzer
            .sp2mc(&spectrogram, self.order, self.alpha)
            .map_err(|e| analysis_failed("sp2mc", e))?;
        let f0 = Array2::from_shape_vec((f0.len(), 1), f0)?;
        let voiced = f0.mapv(|v| v != 0.0);
        let feature = AcousticFeature::new(
            f0.mapv(|v| v as f32),
            spectrogram.mapv(|v| v as f32),
            aperiodicity.mapv(|v| v as f32),
            mfcc.mapv(|v| v as f32),
            voiced,
        );
        feature.validate()?;
        debug!(
            "Extracted {} frames ({} voiced)",
            feature.time_len().unwrap_or_default(),
            feature.voiced.as_ref().map(|v| v.iter().filter(|&&b| b).count()).unwrap_or_default()
        );
        Ok(feature)
    }
}
/// Analyzer for tests: 200 Hz wherever a frame carries signal.
#[cfg(test)]
pub(crate) struct FakeAnalyzer {
    pub bins: usize,
}
#[cfg(test)]
impl SpeechAnalyzer for FakeAnalyzer {
    fn dio(&self, x: &[f64], fs: u32, frame_period: f64) -> anyhow::Result<(Vec<f64>, Vec<f64>)> {
        let hop = (fs as f64 * frame_period / 1000.0) as usize;
        let frames = x.len() / hop + 1;
        let f0 = (0..frames)
            .map(|i| {
                let end = ((i + 1) * hop).min(x.len());
                let frame = &x[(i * hop).min(end)..end];
                if frame.iter().any(|&s| s.abs() > 1e-3) { 200.0 } else { 0.0 }
            })
            .collect();
        let t = (0..frames).map(|i| i as f64 * frame_period / 1000.0).collect();
        Ok((f0, t))
    }
    fn stonemask(&self, _x: &[f64], f0: &[f64], _t: &[f64], _fs: u32) -> anyhow::Result<Vec<f64>> {
        Ok(f0.to_vec())
    }
    fn cheaptrick(&self, _x: &[f64], f0: &[f64], _t: &[f64], _fs: u32) -> anyhow::Result<Array2<f64>> {
        Ok(Array2::from_shape_fn((f0.len(), self.bins), |(i, j)| 1.0 + (i + j) as f64))
    }
    fn d4c(&self, _x: &[f64], f0: &[f64], _t: &[f64], _fs: u32) -> anyhow::Result<Array2<f64>> {
        Ok(Array2::from_elem((f0.len(), self.bins), 0.5))
    }
    fn sp2mc(&self, spectrogram: &Array2<f64>, order: usize, _alpha: f64) -> anyhow::Result<Array2<f64>> {
        let mean = spectrogram.mean_axis(ndarray::Axis(1)).ok_or_else(|| anyhow::anyhow!("empty envelope"))?;
        Ok(Array2::from_shape_fn((spectrogram.nrows(), order + 1), |(i, j)| mean[i].ln() / (j + 1) as f64))
    }
}
