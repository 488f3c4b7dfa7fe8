//! Time-axis alignment, padding, cropping and noise on `(features, time)` tensors.
use ndarray::{s, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use crate::{
    error::{DatasetError, Result},
    example::{Example, Seeded},
    transform::Transform,
    utils::pad_time,
};
/// Deterministic child seed; distinct `(seed, salt)` pairs give independent streams.
pub fn derive_seed(seed: u64, salt: u64) -> u64 {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&seed.to_le_bytes());
    key[8..16].copy_from_slice(&salt.to_le_bytes());
    StdRng::from_seed(key).random()
}
fn ensure_train(name: &'static str, is_test: bool) -> Result<()> {
    if is_test {
        return Err(DatasetError::InvalidMode(name));
    }
    Ok(())
}
/// Replaces the carried seed with a fresh one for the next augmentation stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddSeed;
impl<T> Transform<Seeded<T>, Seeded<T>> for AddSeed {
    fn apply(&self, data: Seeded<T>, _is_test: bool) -> Result<Seeded<T>> {
        let seed = derive_seed(data.seed, 0);
        Ok(Seeded { data: data.data, seed })
    }
}
/// Right-pads input, target and mask with zeros to a common time length.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeAlign;
impl Transform<Example, Example> for ShapeAlign {
    fn apply(&self, data: Example, _is_test: bool) -> Result<Example> {
        let len = data.time_lens().into_iter().max().unwrap_or_default();
        let align = |arr: Array2<f32>| {
            let missing = len - arr.ncols();
            if missing == 0 { arr } else { pad_time(arr.view(), 0, missing) }
        };
        Ok(Example {
            input: align(data.input),
            target: align(data.target),
            mask: align(data.mask),
        })
    }
}
/// Zero-pads to `min_size`, the leading amount drawn uniformly from the seed.
#[derive(Debug, Clone, Copy)]
pub struct RandomPadding {
    min_size: usize,
}
impl RandomPadding {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }
}
impl Transform<Seeded<Array2<f32>>, Array2<f32>> for RandomPadding {
    fn apply(&self, data: Seeded<Array2<f32>>, is_test: bool) -> Result<Array2<f32>> {
        ensure_train("RandomPadding", is_test)?;
        let Seeded { data, seed } = data;
        let len = data.ncols();
        if len >= self.min_size {
            return Ok(data);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let pre = rng.random_range(0..=self.min_size - len);
        Ok(pad_time(data.view(), pre, self.min_size - len - pre))
    }
}
/// Leading-side zero padding up to `min_size`.
#[derive(Debug, Clone, Copy)]
pub struct LastPadding {
    min_size: usize,
}
impl LastPadding {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }
}
impl Transform<Array2<f32>, Array2<f32>> for LastPadding {
    fn apply(&self, data: Array2<f32>, _is_test: bool) -> Result<Array2<f32>> {
        let len = data.ncols();
        if len >= self.min_size {
            return Ok(data);
        }
        Ok(pad_time(data.view(), self.min_size - len, 0))
    }
}
/// Contiguous `crop_size` frames from a seeded uniform offset.
#[derive(Debug, Clone, Copy)]
pub struct RandomCrop {
    crop_size: usize,
}
impl RandomCrop {
    pub fn new(crop_size: usize) -> Self {
        Self { crop_size }
    }
}
impl Transform<Seeded<Array2<f32>>, Array2<f32>> for RandomCrop {
    fn apply(&self, data: Seeded<Array2<f32>>, is_test: bool) -> Result<Array2<f32>> {
        ensure_train("RandomCrop", is_test)?;
        let Seeded { data, seed } = data;
        let len = data.ncols();
        if len < self.crop_size {
            return Err(DatasetError::CropTooLarge { crop_size: self.crop_size, len });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let start = rng.random_range(0..=len - self.crop_size);
        Ok(data.slice(s![.., start..start + self.crop_size]).to_owned())
    }
}
/// The first `crop_size` frames (fewer when the tensor is shorter).
#[derive(Debug, Clone, Copy)]
pub struct FirstCrop {
    crop_size: usize,
}
impl FirstCrop {
    pub fn new(crop_size: usize) -> Self {
        Self { crop_size }
    }
}
impl Transform<Array2<f32>, Array2<f32>> for FirstCrop {
    fn apply(&self, data: Array2<f32>, _is_test: bool) -> Result<Array2<f32>> {
        let end = self.crop_size.min(data.ncols());
        Ok(data.slice(s![.., ..end]).to_owned())
    }
}
/// `x + p_global * g + p_local * l`, `g` one standard normal draw for the
/// whole tensor and `l` one per element.
#[derive(Debug, Clone, Copy)]
pub struct AddNoise {
    p_global: f32,
    p_local: f32,
}
impl AddNoise {
    pub fn new(p_global: f32, p_local: f32) -> Result<Self> {
        if !(p_global >= 0.0 && p_local >= 0.0) {
            return Err(DatasetError::Config(format!(
                "noise scales must be non-negative (global={}, local={})",
                p_global, p_local
            )));
        }
        Ok(Self { p_global, p_local })
    }
}
impl Transform<Seeded<Array2<f32>>, Array2<f32>> for AddNoise {
    fn apply(&self, data: Seeded<Array2<f32>>, is_test: bool) -> Result<Array2<f32>> {
        ensure_train("AddNoise", is_test)?;
        let Seeded { data, seed } = data;
        let mut rng = StdRng::seed_from_u64(seed);
        let global = rng.sample::<f32, _>(StandardNormal) * self.p_global;
        let local = self.p_local;
        Ok(data.mapv_into(|x| x + global + rng.sample::<f32, _>(StandardNormal) * local))
    }
}
