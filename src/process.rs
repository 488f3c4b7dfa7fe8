//! Primitive transforms over waves, features and encoded tensors.
pub mod augment;
pub mod extract;
pub mod store;
pub mod wave;
use std::{collections::BTreeMap, path::Path, sync::Arc};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis, Zip};
use crate::{
    error::{DatasetError, Result},
    feature::{AcousticFeature, FeatureName},
    process::store::AcousticFeatureLoad,
    transform::Transform,
};
/// Keeps only the listed fields.
#[derive(Debug, Clone)]
pub struct Distillate {
    targets: Vec<FeatureName>,
}
impl Distillate {
    pub fn new(targets: Vec<FeatureName>) -> Self {
        Self { targets }
    }
}
impl Transform<AcousticFeature, AcousticFeature> for Distillate {
    fn apply(&self, feature: AcousticFeature, _is_test: bool) -> Result<AcousticFeature> {
        Ok(feature.distillate(&self.targets))
    }
}
/// Per-element validity mask laid out like the feature: f0 follows `voiced`,
/// every other present field is all ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeMask;
impl Transform<AcousticFeature, AcousticFeature> for MakeMask {
    fn apply(&self, feature: AcousticFeature, _is_test: bool) -> Result<AcousticFeature> {
        let voiced = feature
            .voiced
            .as_ref()
            .ok_or(DatasetError::MissingFeature(FeatureName::Voiced))?;
        let ones = |field: &Option<Array2<f32>>| field.as_ref().map(|a| Array2::ones(a.raw_dim()));
        Ok(AcousticFeature {
            f0: Some(voiced.mapv(|v| if v { 1.0 } else { 0.0 })),
            spectrogram: ones(&feature.spectrogram),
            aperiodicity: ones(&feature.aperiodicity),
            mfcc: ones(&feature.mfcc),
            voiced: Some(Array2::from_elem(voiced.raw_dim(), true)),
        })
    }
}
/// Per-field mean and variance, each field `(1, width)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    pub mean: AcousticFeature,
    pub var: AcousticFeature,
}
impl Moments {
    pub fn load(mean_path: &Path, var_path: &Path) -> Result<Self> {
        let loader = AcousticFeatureLoad::new(false);
        Ok(Self {
            mean: loader.load(mean_path)?,
            var: loader.load(var_path)?,
        })
    }
}
fn broadcast_moment<'a>(
    name: FeatureName,
    moment: &'a Array2<f32>,
    dim: (usize, usize),
) -> Result<ArrayView2<'a, f32>> {
    moment.broadcast(dim).ok_or_else(|| {
        DatasetError::ShapeMismatch(format!(
            "moments for `{}` have shape {:?}, feature has {:?}",
            name,
            moment.dim(),
            dim
        ))
    })
}
fn standardize(
    name: FeatureName,
    values: &Array2<f32>,
    moments: &Moments,
    inverse: bool,
) -> Result<Array2<f32>> {
    let (Some(mean), Some(var)) = (moments.mean.values(name), moments.var.values(name)) else {
        return Err(DatasetError::ShapeMismatch(format!("no moments for `{}`", name)));
    };
    let mean = broadcast_moment(name, mean, values.dim())?;
    let var = broadcast_moment(name, var, values.dim())?;
    let zip = Zip::from(values).and(mean).and(var);
    Ok(if inverse {
        zip.map_collect(|&x, &m, &v| x * v.sqrt() + m)
    } else {
        zip.map_collect(|&x, &m, &v| (x - m) / v.sqrt())
    })
}
fn rescale(feature: AcousticFeature, moments: &Moments, inverse: bool) -> Result<AcousticFeature> {
    let mut out = AcousticFeature { voiced: feature.voiced.clone(), ..Default::default() };
    for name in [FeatureName::F0, FeatureName::Spectrogram, FeatureName::Aperiodicity, FeatureName::Mfcc] {
        if let Some(values) = feature.values(name) {
            out.set_float(name, standardize(name, values, moments, inverse)?);
        }
    }
    if let Some(f0) = out.f0.as_mut() {
        let voiced = feature
            .voiced
            .as_ref()
            .ok_or(DatasetError::MissingFeature(FeatureName::Voiced))?;
        if voiced.dim() != f0.dim() {
            return Err(DatasetError::ShapeMismatch(format!(
                "voiced {:?} does not match f0 {:?}",
                voiced.dim(),
                f0.dim()
            )));
        }
        Zip::from(f0).and(voiced).for_each(|f, &v| {
            if !v {
                *f = 0.0;
            }
        });
    }
    Ok(out)
}
/// `(x - mean) / sqrt(var)`; unvoiced f0 is zero afterwards.
#[derive(Debug, Clone)]
pub struct Normalize {
    moments: Arc<Moments>,
}
impl Normalize {
    pub fn new(moments: Arc<Moments>) -> Self {
        Self { moments }
    }
}
impl Transform<AcousticFeature, AcousticFeature> for Normalize {
    fn apply(&self, feature: AcousticFeature, _is_test: bool) -> Result<AcousticFeature> {
        rescale(feature, &self.moments, false)
    }
}
/// `x * sqrt(var) + mean`; unvoiced f0 is zero afterwards.
#[derive(Debug, Clone)]
pub struct Denormalize {
    moments: Arc<Moments>,
}
impl Denormalize {
    pub fn new(moments: Arc<Moments>) -> Self {
        Self { moments }
    }
}
impl Transform<AcousticFeature, AcousticFeature> for Denormalize {
    fn apply(&self, feature: AcousticFeature, _is_test: bool) -> Result<AcousticFeature> {
        rescale(feature, &self.moments, true)
    }
}
/// Concatenates `targets` along the feature axis, output `(features, time)`.
#[derive(Debug, Clone)]
pub struct EncodeFeature {
    targets: Vec<FeatureName>,
}
impl EncodeFeature {
    pub fn new(targets: Vec<FeatureName>) -> Self {
        Self { targets }
    }
}
impl Transform<AcousticFeature, Array2<f32>> for EncodeFeature {
    fn apply(&self, feature: AcousticFeature, _is_test: bool) -> Result<Array2<f32>> {
        let parts = self
            .targets
            .iter()
            .map(|&name| feature.as_float(name).ok_or(DatasetError::MissingFeature(name)))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let encoded = concatenate(Axis(1), &views)?;
        Ok(encoded.t().as_standard_layout().into_owned())
    }
}
/// Splits an encoded tensor back into fields. Fields outside `targets` are absent.
#[derive(Debug, Clone)]
pub struct DecodeFeature {
    targets: Vec<FeatureName>,
    widths: BTreeMap<FeatureName, usize>,
}
impl DecodeFeature {
    pub fn new(targets: Vec<FeatureName>, widths: BTreeMap<FeatureName, usize>) -> Result<Self> {
        if let Some(&name) = targets.iter().find(|name| !widths.contains_key(name)) {
            return Err(DatasetError::ShapeMismatch(format!("no width given for `{}`", name)));
        }
        Ok(Self { targets, widths })
    }
}
impl Transform<Array2<f32>, AcousticFeature> for DecodeFeature {
    fn apply(&self, data: Array2<f32>, _is_test: bool) -> Result<AcousticFeature> {
        let total: usize = self.targets.iter().map(|name| self.widths[name]).sum();
        if total != data.nrows() {
            return Err(DatasetError::ShapeMismatch(format!(
                "encoded tensor has {} rows, targets need {}",
                data.nrows(),
                total
            )));
        }
        let time_major = data.t();
        let mut feature = AcousticFeature::default();
        let mut offset = 0;
        for &name in &self.targets {
            let width = self.widths[&name];
            feature.set_float(name, time_major.slice(s![.., offset..offset + width]).to_owned());
            offset += width;
        }
        Ok(feature)
    }
}
