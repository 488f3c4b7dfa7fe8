use std::{collections::BTreeMap, fs::{self, File}, path::{Path, PathBuf}};
use ndarray::Array2;
use ndarray_npy::NpzWriter;
use crate::error::{DatasetError, Result};
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub input: PathBuf,
    pub target: PathBuf,
}
/// Value paired with the seed its stochastic stage must use.
#[derive(Debug, Clone, PartialEq)]
pub struct Seeded<T> {
    pub data: T,
    pub seed: u64,
}
impl<T> Seeded<T> {
    pub fn new(data: T, seed: u64) -> Self {
        Self { data, seed }
    }
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Seeded<U> {
        Seeded { data: f(self.data), seed: self.seed }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Input,
    Target,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetPart {
    Feature,
    Mask,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Branch {
    Input,
    Target,
    Mask,
}
impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Input, Branch::Target, Branch::Mask];
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Input => "input",
            Branch::Target => "target",
            Branch::Mask => "mask",
        }
    }
}
/// Per-side output of the encode stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    Input(Array2<f32>),
    Target { feature: Array2<f32>, mask: Array2<f32> },
}
/// One training pair, every tensor `(features, time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input: Array2<f32>,
    pub target: Array2<f32>,
    pub mask: Array2<f32>,
}
impl Example {
    pub fn from_sides(mut sides: BTreeMap<Side, Encoded>) -> Result<Self> {
        let input = match sides.remove(&Side::Input) {
            Some(Encoded::Input(input)) => input,
            _ => return Err(DatasetError::ShapeMismatch("missing encoded input".into())),
        };
        match sides.remove(&Side::Target) {
            Some(Encoded::Target { feature, mask }) => Ok(Self { input, target: feature, mask }),
            _ => Err(DatasetError::ShapeMismatch("missing encoded target".into())),
        }
    }
    pub fn from_branches(mut branches: BTreeMap<Branch, Array2<f32>>) -> Result<Self> {
        let mut take = |branch: Branch| {
            branches.remove(&branch).ok_or_else(|| {
                DatasetError::ShapeMismatch(format!("missing branch `{}`", branch.as_str()))
            })
        };
        Ok(Self {
            input: take(Branch::Input)?,
            target: take(Branch::Target)?,
            mask: take(Branch::Mask)?,
        })
    }
    pub fn branch(&self, branch: Branch) -> &Array2<f32> {
        match branch {
            Branch::Input => &self.input,
            Branch::Target => &self.target,
            Branch::Mask => &self.mask,
        }
    }
    pub fn into_branch(self, branch: Branch) -> Array2<f32> {
        match branch {
            Branch::Input => self.input,
            Branch::Target => self.target,
            Branch::Mask => self.mask,
        }
    }
    /// Time lengths of input, target and mask.
    pub fn time_lens(&self) -> [usize; 3] {
        [self.input.ncols(), self.target.ncols(), self.mask.ncols()]
    }
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = NpzWriter::new(file);
        for branch in Branch::ALL {
            writer.add_array(branch.as_str(), self.branch(branch))?;
        }
        writer.finish()?;
        Ok(())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use ndarray_npy::NpzReader;
    #[test]
    fn test_from_sides() {
        let sides = BTreeMap::from([
            (Side::Input, Encoded::Input(array![[1.0, 2.0]])),
            (Side::Target, Encoded::Target { feature: array![[3.0]], mask: array![[1.0]] }),
        ]);
        let example = Example::from_sides(sides).unwrap();
        assert_eq!(example.time_lens(), [2, 1, 1]);
        let swapped = BTreeMap::from([(Side::Input, Encoded::Input(array![[1.0]]))]);
        assert!(Example::from_sides(swapped).is_err());
    }
    #[test]
    fn test_from_branches_requires_all() {
        let partial = BTreeMap::from([(Branch::Input, Array2::zeros((1, 1)))]);
        assert!(matches!(
            Example::from_branches(partial),
            Err(DatasetError::ShapeMismatch(m)) if m.contains("target")
        ));
    }
    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/00000.npz");
        let example = Example {
            input: array![[1.0, 2.0]],
            target: array![[3.0, 4.0]],
            mask: array![[1.0, 0.0]],
        };
        example.save(&path).unwrap();
        let mut reader = NpzReader::new(File::open(&path).unwrap()).unwrap();
        let mask: Array2<f32> = reader.by_name("mask").unwrap();
        assert_eq!(mask, example.mask);
    }
}
