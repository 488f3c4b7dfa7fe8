use std::{fmt, str::FromStr};
use ndarray::{Array2, Zip};
use crate::error::{DatasetError, Result};
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureName {
    F0,
    Spectrogram,
    Aperiodicity,
    Mfcc,
    Voiced,
}
impl FeatureName {
    /// Persisted field order.
    pub const ALL: [FeatureName; 5] = [
        FeatureName::F0,
        FeatureName::Spectrogram,
        FeatureName::Aperiodicity,
        FeatureName::Mfcc,
        FeatureName::Voiced,
    ];
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::F0 => "f0",
            FeatureName::Spectrogram => "spectrogram",
            FeatureName::Aperiodicity => "aperiodicity",
            FeatureName::Mfcc => "mfcc",
            FeatureName::Voiced => "voiced",
        }
    }
}
impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for FeatureName {
    type Err = DatasetError;
    fn from_str(s: &str) -> Result<Self> {
        FeatureName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| DatasetError::UnknownFeature(s.to_string()))
    }
}
/// Parses a comma separated list such as `"f0, mfcc"`.
pub fn parse_feature_list(s: &str) -> Result<Vec<FeatureName>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(FeatureName::from_str)
        .collect()
}
/// Decoded mono waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct Wave {
    pub wave: Vec<f64>,
    pub sampling_rate: u32,
}
/// Time-major acoustic features. Every field is `(time, width)`; a slot is
/// `None` when the field was not selected or was dropped when persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcousticFeature {
    pub f0: Option<Array2<f32>>,
    pub spectrogram: Option<Array2<f32>>,
    pub aperiodicity: Option<Array2<f32>>,
    pub mfcc: Option<Array2<f32>>,
    pub voiced: Option<Array2<bool>>,
}
impl AcousticFeature {
    pub fn new(
        f0: Array2<f32>,
        spectrogram: Array2<f32>,
        aperiodicity: Array2<f32>,
        mfcc: Array2<f32>,
        voiced: Array2<bool>,
    ) -> Self {
        Self {
            f0: Some(f0),
            spectrogram: Some(spectrogram),
            aperiodicity: Some(aperiodicity),
            mfcc: Some(mfcc),
            voiced: Some(voiced),
        }
    }
    /// Float field by name. Always `None` for `voiced`, use [`Self::as_float`].
    pub fn values(&self, name: FeatureName) -> Option<&Array2<f32>> {
        match name {
            FeatureName::F0 => self.f0.as_ref(),
            FeatureName::Spectrogram => self.spectrogram.as_ref(),
            FeatureName::Aperiodicity => self.aperiodicity.as_ref(),
            FeatureName::Mfcc => self.mfcc.as_ref(),
            FeatureName::Voiced => None,
        }
    }
    fn values_mut(&mut self, name: FeatureName) -> Option<&mut Option<Array2<f32>>> {
        match name {
            FeatureName::F0 => Some(&mut self.f0),
            FeatureName::Spectrogram => Some(&mut self.spectrogram),
            FeatureName::Aperiodicity => Some(&mut self.aperiodicity),
            FeatureName::Mfcc => Some(&mut self.mfcc),
            FeatureName::Voiced => None,
        }
    }
    pub fn has(&self, name: FeatureName) -> bool {
        match name {
            FeatureName::Voiced => self.voiced.is_some(),
            _ => self.values(name).is_some(),
        }
    }
    pub fn dim(&self, name: FeatureName) -> Option<(usize, usize)> {
        match name {
            FeatureName::Voiced => self.voiced.as_ref().map(|v| v.dim()),
            _ => self.values(name).map(|v| v.dim()),
        }
    }
    pub fn width(&self, name: FeatureName) -> Option<usize> {
        self.dim(name).map(|(_, width)| width)
    }
    /// Time length of the first present field.
    pub fn time_len(&self) -> Option<usize> {
        FeatureName::ALL.iter().find_map(|&name| self.dim(name)).map(|(t, _)| t)
    }
    /// Field as float; `voiced` becomes 1.0 / 0.0.
    pub fn as_float(&self, name: FeatureName) -> Option<Array2<f32>> {
        match name {
            FeatureName::Voiced => self
                .voiced
                .as_ref()
                .map(|v| v.mapv(|x| if x { 1.0 } else { 0.0 })),
            _ => self.values(name).cloned(),
        }
    }
    /// Inverse of [`Self::as_float`]; `voiced` is recovered as `x > 0.5`.
    pub fn set_float(&mut self, name: FeatureName, values: Array2<f32>) {
        match self.values_mut(name) {
            Some(slot) => *slot = Some(values),
            None => self.voiced = Some(values.mapv(|x| x > 0.5)),
        }
    }
    /// Keeps `targets`, every other slot becomes absent.
    pub fn distillate(&self, targets: &[FeatureName]) -> Self {
        let keep = |name: FeatureName| targets.contains(&name);
        Self {
            f0: self.f0.clone().filter(|_| keep(FeatureName::F0)),
            spectrogram: self.spectrogram.clone().filter(|_| keep(FeatureName::Spectrogram)),
            aperiodicity: self.aperiodicity.clone().filter(|_| keep(FeatureName::Aperiodicity)),
            mfcc: self.mfcc.clone().filter(|_| keep(FeatureName::Mfcc)),
            voiced: self.voiced.clone().filter(|_| keep(FeatureName::Voiced)),
        }
    }
    pub fn validate(&self) -> Result<()> {
        let Some(len) = self.time_len() else {
            return Err(DatasetError::ShapeMismatch("feature has no fields".into()));
        };
        for name in FeatureName::ALL {
            let Some((t, width)) = self.dim(name) else { continue };
            if t != len {
                return Err(DatasetError::ShapeMismatch(format!(
                    "`{}` has {} frames, expected {}",
                    name, t, len
                )));
            }
            if matches!(name, FeatureName::F0 | FeatureName::Voiced) && width != 1 {
                return Err(DatasetError::ShapeMismatch(format!(
                    "`{}` must have width 1, got {}",
                    name, width
                )));
            }
        }
        if let (Some(f0), Some(voiced)) = (&self.f0, &self.voiced) {
            let consistent = Zip::from(f0)
                .and(voiced)
                .all(|&f, &v| v == (f != 0.0));
            if !consistent {
                return Err(DatasetError::ShapeMismatch(
                    "`voiced` disagrees with `f0 != 0`".into(),
                ));
            }
        }
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    fn feature(f0: &[f32]) -> AcousticFeature {
        let t = f0.len();
        let f0 = Array2::from_shape_vec((t, 1), f0.to_vec()).unwrap();
        let voiced = f0.mapv(|x| x != 0.0);
        AcousticFeature::new(
            f0,
            Array2::ones((t, 5)),
            Array2::zeros((t, 5)),
            Array2::from_elem((t, 3), 0.5),
            voiced,
        )
    }
    #[test]
    fn test_parse_names() {
        assert_eq!("mfcc".parse::<FeatureName>().unwrap(), FeatureName::Mfcc);
        assert!(matches!(
            "mcep".parse::<FeatureName>(),
            Err(DatasetError::UnknownFeature(s)) if s == "mcep"
        ));
        let list = parse_feature_list("f0, mfcc,").unwrap();
        assert_eq!(list, vec![FeatureName::F0, FeatureName::Mfcc]);
    }
    #[test]
    fn test_voiced_invariant() {
        let feat = feature(&[120., 0., 0., 130.]);
        assert!(feat.validate().is_ok());
        let voiced = feat.voiced.as_ref().unwrap();
        let f0 = feat.f0.as_ref().unwrap();
        for (v, f) in voiced.iter().zip(f0.iter()) {
            assert_eq!(*v, *f != 0.0);
        }
        let mut broken = feat.clone();
        broken.voiced = Some(array![[true], [true], [false], [true]]);
        assert!(broken.validate().is_err());
    }
    #[test]
    fn test_validate_time_len() {
        let mut feat = feature(&[1., 2., 3.]);
        feat.mfcc = Some(Array2::zeros((2, 3)));
        assert!(matches!(feat.validate(), Err(DatasetError::ShapeMismatch(_))));
        assert!(AcousticFeature::default().validate().is_err());
    }
    #[test]
    fn test_distillate() {
        let feat = feature(&[1., 0., 3.]);
        let kept = feat.distillate(&[FeatureName::Mfcc, FeatureName::Voiced]);
        assert!(kept.has(FeatureName::Mfcc));
        assert!(kept.has(FeatureName::Voiced));
        assert!(!kept.has(FeatureName::F0));
        assert!(!kept.has(FeatureName::Spectrogram));
        assert_eq!(kept.time_len(), Some(3));
        assert_eq!(kept.width(FeatureName::Mfcc), Some(3));
    }
    #[test]
    fn test_voiced_as_float() {
        let mut feat = feature(&[1., 0., 3.]);
        let v = feat.as_float(FeatureName::Voiced).unwrap();
        assert_eq!(v, array![[1.0], [0.0], [1.0]]);
        feat.set_float(FeatureName::Voiced, array![[0.0], [1.0], [0.2]]);
        assert_eq!(feat.voiced.unwrap(), array![[false], [true], [false]]);
    }
}
