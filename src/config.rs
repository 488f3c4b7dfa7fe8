pub const TRIM_FRAME_LENGTH: usize = 2048;
pub const TRIM_HOP_LENGTH: usize = 512;
pub const FEATURE_EXT: &str = "npz";
use ini::Ini;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;
use crate::{
    error::{DatasetError, Result},
    feature::{parse_feature_list, FeatureName},
};
/// Waveform loading and analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticConfig {
    pub sample_rate: u32,
    pub top_db: Option<f64>,
    pub pad_second: f64,
    pub frame_period: f64,
    pub order: usize,
    pub alpha: f64,
}
impl Default for AcousticConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            top_db: None,
            pad_second: 0.0,
            frame_period: 5.0,
            order: 8,
            alpha: 0.466,
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    pub input_glob: String,
    pub target_glob: String,
    pub features: Vec<FeatureName>,
    pub input_mean_path: PathBuf,
    pub input_var_path: PathBuf,
    pub target_mean_path: PathBuf,
    pub target_var_path: PathBuf,
    pub train_crop_size: usize,
    pub input_global_noise: f32,
    pub input_local_noise: f32,
    pub target_global_noise: f32,
    pub target_local_noise: f32,
    pub seed: u64,
    pub num_test: usize,
}
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub acoustic: AcousticConfig,
}
fn section_map(ini: &Ini, name: &str) -> HashMap<String, String> {
    ini.section(Some(name))
        .map(|props| props.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        .unwrap_or_default()
}
fn required(section: &HashMap<String, String>, key: &str) -> Result<String> {
    section
        .get(key)
        .cloned()
        .ok_or_else(|| DatasetError::Config(format!("missing required key `{}`", key)))
}
fn parsed_opt<T: FromStr>(section: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = section.get(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable value for `{}`: {:?}", key, raw);
            None
        }
    }
}
fn parsed_or<T: FromStr>(section: &HashMap<String, String>, key: &str, default: T) -> T {
    parsed_opt(section, key).unwrap_or(default)
}
impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path)
            .map_err(|e| DatasetError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_ini(&ini)
    }
    pub fn from_ini(ini: &Ini) -> Result<Self> {
        let dataset = section_map(ini, "dataset");
        let acoustic = section_map(ini, "acoustic");
        let defaults = AcousticConfig::default();
        let features = match dataset.get("features") {
            Some(list) => parse_feature_list(list)?,
            None => vec![FeatureName::F0, FeatureName::Mfcc],
        };
        if features.is_empty() {
            return Err(DatasetError::Config("`features` is empty".into()));
        }
        Ok(Self {
            dataset: DatasetConfig {
                input_glob: required(&dataset, "input_glob")?,
                target_glob: required(&dataset, "target_glob")?,
                features,
                input_mean_path: required(&dataset, "input_mean_path")?.into(),
                input_var_path: required(&dataset, "input_var_path")?.into(),
                target_mean_path: required(&dataset, "target_mean_path")?.into(),
                target_var_path: required(&dataset, "target_var_path")?.into(),
                train_crop_size: parsed_or(&dataset, "train_crop_size", 512),
                input_global_noise: parsed_or(&dataset, "input_global_noise", 0.0),
                input_local_noise: parsed_or(&dataset, "input_local_noise", 0.0),
                target_global_noise: parsed_or(&dataset, "target_global_noise", 0.0),
                target_local_noise: parsed_or(&dataset, "target_local_noise", 0.0),
                seed: parsed_or(&dataset, "seed", 0),
                num_test: parsed_or(&dataset, "num_test", 10),
            },
            acoustic: AcousticConfig {
                sample_rate: parsed_or(&acoustic, "sample_rate", defaults.sample_rate),
                top_db: parsed_opt(&acoustic, "top_db"),
                pad_second: parsed_or(&acoustic, "pad_second", defaults.pad_second),
                frame_period: parsed_or(&acoustic, "frame_period", defaults.frame_period),
                order: parsed_or(&acoustic, "order", defaults.order),
                alpha: parsed_or(&acoustic, "alpha", defaults.alpha),
            },
        })
    }
}
