use std::{fs::{self, File}, path::{Path, PathBuf}};
use ndarray::{arr0, Array2, ArrayD, Axis, Ix0, Ix1, Ix2};
use ndarray_npy::{NpzReader, NpzWriter};
use tracing::debug;
use crate::{
    error::{DatasetError, Result},
    feature::{AcousticFeature, FeatureName},
    transform::Transform,
};
type Reader = NpzReader<File>;
fn read_float(reader: &mut Reader, name: &str) -> Result<ArrayD<f32>> {
    let narrow: std::result::Result<ArrayD<f32>, _> = reader.by_name(name);
    match narrow {
        Ok(arr) => Ok(arr),
        Err(_) => {
            let wide: ArrayD<f64> = reader.by_name(name)?;
            Ok(wide.mapv(|x| x as f32))
        }
    }
}
/// Lifts a stored array into a `(time, width)` slot. A 0-d NaN is the
/// "field dropped" sentinel; any other scalar becomes `(1, 1)`.
fn into_slot<A: Clone>(
    arr: ArrayD<A>,
    name: FeatureName,
    is_sentinel: impl Fn(&A) -> bool,
) -> Result<Option<Array2<A>>> {
    match arr.ndim() {
        0 if arr.iter().all(&is_sentinel) => Ok(None),
        0 => Ok(Some(arr.into_dimensionality::<Ix0>()?.insert_axis(Axis(0)).insert_axis(Axis(0)))),
        1 => Ok(Some(arr.into_dimensionality::<Ix1>()?.insert_axis(Axis(0)))),
        2 => Ok(Some(arr.into_dimensionality::<Ix2>()?)),
        n => Err(DatasetError::ShapeMismatch(format!(
            "stored `{}` has {} dimensions",
            name, n
        ))),
    }
}
fn read_voiced(reader: &mut Reader) -> Result<Option<Array2<bool>>> {
    let name = FeatureName::Voiced;
    let flags: std::result::Result<ArrayD<bool>, _> = reader.by_name(name.as_str());
    if let Ok(flags) = flags {
        return into_slot(flags, name, |_| false);
    }
    let numeric = read_float(reader, name.as_str())?;
    Ok(into_slot(numeric, name, |x: &f32| x.is_nan())?.map(|v| v.mapv(|x| x != 0.0)))
}
/// Reads the five-field `.npz` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcousticFeatureLoad {
    validate: bool,
}
impl AcousticFeatureLoad {
    pub fn new(validate: bool) -> Self {
        Self { validate }
    }
    pub fn load(&self, path: &Path) -> Result<AcousticFeature> {
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = NpzReader::new(file)?;
        let names = reader.names()?;
        if let Some(missing) = FeatureName::ALL
            .iter()
            .find(|field| !names.iter().any(|n| n == field.as_str()))
        {
            return Err(DatasetError::PersistenceMismatch {
                path: path.to_path_buf(),
                field: missing.to_string(),
            });
        }
        let mut float_slot = |name: FeatureName| -> Result<Option<Array2<f32>>> {
            into_slot(read_float(&mut reader, name.as_str())?, name, |x: &f32| x.is_nan())
        };
        let mut feature = AcousticFeature {
            f0: float_slot(FeatureName::F0)?,
            spectrogram: float_slot(FeatureName::Spectrogram)?,
            aperiodicity: float_slot(FeatureName::Aperiodicity)?,
            mfcc: float_slot(FeatureName::Mfcc)?,
            voiced: None,
        };
        feature.voiced = read_voiced(&mut reader)?;
        if self.validate {
            feature.validate()?;
        }
        debug!("Feature loaded: {}", path.display());
        Ok(feature)
    }
}
impl Transform<PathBuf, AcousticFeature> for AcousticFeatureLoad {
    fn apply(&self, path: PathBuf, _is_test: bool) -> Result<AcousticFeature> {
        self.load(&path)
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFile {
    pub path: PathBuf,
    pub feature: AcousticFeature,
}
/// Writes the five-field `.npz` layout; `ignore`d and absent fields are
/// stored as a 0-d NaN.
#[derive(Debug, Clone, Default)]
pub struct AcousticFeatureSave {
    validate: bool,
    ignore: Vec<FeatureName>,
}
impl AcousticFeatureSave {
    pub fn new(validate: bool, ignore: Vec<FeatureName>) -> Self {
        Self { validate, ignore }
    }
    pub fn save(&self, path: &Path, feature: &AcousticFeature) -> Result<()> {
        if self.validate {
            feature.validate()?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let written = self
            .write_fields(&temp_path, feature)
            .and_then(|()| fs::rename(&temp_path, path).map_err(DatasetError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        debug!("Feature saved: {}", path.display());
        Ok(())
    }
    fn write_fields(&self, temp_path: &Path, feature: &AcousticFeature) -> Result<()> {
        let file = File::create(temp_path).map_err(|source| DatasetError::Open {
            path: temp_path.to_path_buf(),
            source,
        })?;
        let mut writer = NpzWriter::new(file);
        let sentinel = arr0(f32::NAN);
        for name in FeatureName::ALL {
            let key = name.as_str();
            if self.ignore.contains(&name) {
                writer.add_array(key, &sentinel)?;
                continue;
            }
            match (name, feature.values(name), &feature.voiced) {
                (FeatureName::Voiced, _, Some(voiced)) => writer.add_array(key, voiced)?,
                (_, Some(values), _) => writer.add_array(key, values)?,
                _ => writer.add_array(key, &sentinel)?,
            }
        }
        writer.finish()?;
        Ok(())
    }
}
impl Transform<FeatureFile, PathBuf> for AcousticFeatureSave {
    fn apply(&self, data: FeatureFile, _is_test: bool) -> Result<PathBuf> {
        self.save(&data.path, &data.feature)?;
        Ok(data.path)
    }
}
