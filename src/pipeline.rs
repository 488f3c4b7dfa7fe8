//! Builds the train and test pipelines and the three datasets from configuration.
use std::{collections::BTreeMap, path::{Path, PathBuf}, sync::Arc};
use ndarray::Array2;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};
use crate::{
    config::{AcousticConfig, DatasetConfig, FEATURE_EXT},
    dataset::PairDataset,
    error::{DatasetError, Result},
    example::{Branch, Encoded, Example, PathPair, Seeded, Side, TargetPart},
    feature::{AcousticFeature, FeatureName},
    process::{
        augment::{derive_seed, AddNoise, AddSeed, FirstCrop, LastPadding, RandomCrop, RandomPadding, ShapeAlign},
        extract::{AcousticFeatureExtract, SpeechAnalyzer},
        store::{AcousticFeatureLoad, AcousticFeatureSave, FeatureFile},
        wave::WaveFileLoad,
        Distillate, EncodeFeature, MakeMask, Moments, Normalize,
    },
    transform::{lambda, project, Chain, Split, Transform},
    utils::find_files,
};
/// Seeded path pair in, finished example out.
pub type PairPipeline = Arc<dyn Transform<Seeded<PathPair>, Example>>;
type BranchStage = Box<dyn Transform<Seeded<Array2<f32>>, Array2<f32>>>;
const INPUT_NOISE_SALT: u64 = 1;
const TARGET_NOISE_SALT: u64 = 2;
fn with_voiced(features: &[FeatureName]) -> Vec<FeatureName> {
    let mut names = features.to_vec();
    if !names.contains(&FeatureName::Voiced) {
        names.push(FeatureName::Voiced);
    }
    names
}
fn normalized_side<P>(pick: P, features: &[FeatureName], moments: Arc<Moments>) -> impl Transform<PathPair, AcousticFeature> + use<P>
where
    P: Fn(PathPair) -> PathBuf + Send + Sync + 'static,
{
    project(pick)
        .then(AcousticFeatureLoad::new(false))
        .then(Distillate::new(with_voiced(features)))
        .then(Normalize::new(moments))
}
/// `PathPair -> Example`: both sides loaded, normalized and encoded, the
/// target with its mask, then aligned to a common time length.
pub fn base_pipeline(
    features: &[FeatureName],
    input_moments: Arc<Moments>,
    target_moments: Arc<Moments>,
) -> Arc<dyn Transform<PathPair, Example>> {
    let input = normalized_side(|p: PathPair| p.input, features, input_moments)
        .then(EncodeFeature::new(features.to_vec()))
        .then(project(Encoded::Input));
    let target_parts = Split::new()
        .branch(TargetPart::Feature, EncodeFeature::new(features.to_vec()))
        .branch(TargetPart::Mask, MakeMask.then(EncodeFeature::new(features.to_vec())));
    let target = normalized_side(|p: PathPair| p.target, features, target_moments)
        .then(target_parts)
        .then(lambda(|mut parts: BTreeMap<TargetPart, Array2<f32>>, _| {
            match (parts.remove(&TargetPart::Feature), parts.remove(&TargetPart::Mask)) {
                (Some(feature), Some(mask)) => Ok(Encoded::Target { feature, mask }),
                _ => Err(DatasetError::ShapeMismatch("target split lost a part".into())),
            }
        }));
    let sides = Split::new().branch(Side::Input, input).branch(Side::Target, target);
    Arc::new(
        sides
            .then(lambda(|sides: BTreeMap<Side, Encoded>, _| Example::from_sides(sides)))
            .then(ShapeAlign),
    )
}
/// Runs `stages[branch]` on each branch with the example's seed. Branches
/// without a stage pass through.
fn each_branch(mut stages: BTreeMap<Branch, BranchStage>) -> impl Transform<Seeded<Example>, Seeded<Example>> + 'static {
    let mut split = Split::new();
    for branch in Branch::ALL {
        let pick = project(move |s: Seeded<Example>| s.map(|e| e.into_branch(branch)));
        split = match stages.remove(&branch) {
            Some(stage) => split.branch(branch, pick.then(stage)),
            None => split.branch(branch, pick.then(project(|s: Seeded<Array2<f32>>| s.data))),
        };
    }
    lambda(move |data: Seeded<Example>, is_test| {
        let seed = data.seed;
        let branches = split.apply(data, is_test)?;
        Ok(Seeded::new(Example::from_branches(branches)?, seed))
    })
}
fn every_branch<S>(stage: S) -> BTreeMap<Branch, BranchStage>
where
    S: Transform<Seeded<Array2<f32>>, Array2<f32>> + Clone + 'static,
{
    Branch::ALL
        .into_iter()
        .map(|branch| (branch, Box::new(stage.clone()) as BranchStage))
        .collect()
}
fn salted_noise(salt: u64, p_global: f32, p_local: f32) -> Result<BranchStage> {
    let noise = AddNoise::new(p_global, p_local)?;
    let reseed = project(move |s: Seeded<Array2<f32>>| Seeded::new(s.data, derive_seed(s.seed, salt)));
    Ok(Box::new(reseed.then(noise)))
}
/// Random padding and cropping to `train_crop_size`, then additive noise on
/// input and target.
pub fn train_pipeline(base: Arc<dyn Transform<PathPair, Example>>, config: &DatasetConfig) -> Result<PairPipeline> {
    let crop_size = config.train_crop_size;
    let noise = BTreeMap::from([
        (Branch::Input, salted_noise(INPUT_NOISE_SALT, config.input_global_noise, config.input_local_noise)?),
        (Branch::Target, salted_noise(TARGET_NOISE_SALT, config.target_global_noise, config.target_local_noise)?),
    ]);
    let augment = Chain::<Seeded<Example>>::new()
        .with(AddSeed)
        .with(each_branch(every_branch(RandomPadding::new(crop_size))))
        .with(AddSeed)
        .with(each_branch(every_branch(RandomCrop::new(crop_size))))
        .with(AddSeed)
        .with(each_branch(noise));
    Ok(Arc::new(lambda(move |pair: Seeded<PathPair>, is_test| {
        let Seeded { data, seed } = pair;
        let example = base.apply(data, is_test)?;
        Ok(augment.apply(Seeded::new(example, seed), is_test)?.data)
    })))
}
/// Leading zero padding to `crop_size` followed by the first `crop_size` frames.
pub fn test_pipeline(base: Arc<dyn Transform<PathPair, Example>>, crop_size: usize) -> PairPipeline {
    let mut split = Split::new();
    for branch in Branch::ALL {
        split = split.branch(
            branch,
            project(move |e: Example| e.into_branch(branch))
                .then(LastPadding::new(crop_size))
                .then(FirstCrop::new(crop_size)),
        );
    }
    Arc::new(
        project(|pair: Seeded<PathPair>| pair.data)
            .then(base)
            .then(split)
            .then(lambda(|branches: BTreeMap<Branch, Array2<f32>>, _| Example::from_branches(branches))),
    )
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSplit {
    pub train: Vec<PathPair>,
    pub test: Vec<PathPair>,
    pub train_eval: Vec<PathPair>,
}
/// Seeded shuffle, then `test` is the head, `train` the rest and
/// `train_eval` the head of `train`.
pub fn split_pairs(mut pairs: Vec<PathPair>, num_test: usize, seed: u64) -> PairSplit {
    pairs.shuffle(&mut StdRng::seed_from_u64(seed));
    let num_test = num_test.min(pairs.len());
    let train = pairs.split_off(num_test);
    let train_eval = train[..num_test.min(train.len())].to_vec();
    PairSplit { train, test: pairs, train_eval }
}
/// Input and target files matched by position after sorting.
pub fn find_pairs(input_glob: &str, target_glob: &str) -> Result<Vec<PathPair>> {
    let inputs = find_files(input_glob)?;
    let targets = find_files(target_glob)?;
    if inputs.len() != targets.len() {
        return Err(DatasetError::ShapeMismatch(format!(
            "{} input files but {} target files",
            inputs.len(),
            targets.len()
        )));
    }
    Ok(inputs
        .into_iter()
        .zip(targets)
        .map(|(input, target)| PathPair { input, target })
        .collect())
}
pub struct Datasets {
    pub train: PairDataset,
    pub test: PairDataset,
    pub train_eval: PairDataset,
}
impl Datasets {
    pub fn named(&self) -> [(&'static str, &PairDataset); 3] {
        [("train", &self.train), ("test", &self.test), ("train_eval", &self.train_eval)]
    }
}
pub fn create(config: &DatasetConfig) -> Result<Datasets> {
    let pairs = find_pairs(&config.input_glob, &config.target_glob)?;
    info!("Found {} feature pairs", pairs.len());
    let input_moments = Arc::new(Moments::load(&config.input_mean_path, &config.input_var_path)?);
    let target_moments = Arc::new(Moments::load(&config.target_mean_path, &config.target_var_path)?);
    let base = base_pipeline(&config.features, input_moments, target_moments);
    let train_pipeline = train_pipeline(base.clone(), config)?;
    let test_pipeline = test_pipeline(base, config.train_crop_size);
    let split = split_pairs(pairs, config.num_test, config.seed);
    info!(
        "Split: {} train, {} test, {} train_eval",
        split.train.len(),
        split.test.len(),
        split.train_eval.len()
    );
    Ok(Datasets {
        train: PairDataset::new(split.train, train_pipeline, false),
        test: PairDataset::new(split.test, test_pipeline.clone(), true),
        train_eval: PairDataset::new(split.train_eval, test_pipeline, true),
    })
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractJob {
    pub wave: PathBuf,
    pub feature: PathBuf,
}
/// Waveform files to cached feature files: load, analyze, save.
pub struct FeatureCache {
    pipeline: Box<dyn Transform<ExtractJob, PathBuf>>,
}
impl FeatureCache {
    pub fn new(analyzer: Arc<dyn SpeechAnalyzer>, config: &AcousticConfig, ignore: Vec<FeatureName>) -> Self {
        let analyze = WaveFileLoad::from_config(config).then(AcousticFeatureExtract::from_config(analyzer, config));
        let save = AcousticFeatureSave::new(true, ignore);
        let pipeline = lambda(move |job: ExtractJob, is_test| {
            let feature = analyze.apply(job.wave, is_test)?;
            save.apply(FeatureFile { path: job.feature, feature }, is_test)
        });
        Self { pipeline: Box::new(pipeline) }
    }
    /// One job per waveform matching `wave_glob`, written to `out_dir/<stem>.npz`.
    pub fn jobs(wave_glob: &str, out_dir: &Path) -> Result<Vec<ExtractJob>> {
        find_files(wave_glob)?
            .into_iter()
            .map(|wave| {
                let stem = wave
                    .file_stem()
                    .ok_or_else(|| DatasetError::Config(format!("no file stem in {}", wave.display())))?;
                let feature = out_dir.join(format!("{}.{}", stem.to_string_lossy(), FEATURE_EXT));
                Ok(ExtractJob { wave, feature })
            })
            .collect()
    }
    /// Existing feature files are kept.
    pub fn build(&self, job: ExtractJob) -> Result<PathBuf> {
        if job.feature.is_file() {
            debug!("Feature cache hit: {}", job.feature.display());
            return Ok(job.feature);
        }
        self.pipeline.apply(job, true)
    }
    pub fn build_all(&self, jobs: Vec<ExtractJob>) -> Result<Vec<PathBuf>> {
        let total = jobs.len();
        let written = jobs
            .into_par_iter()
            .map(|job| self.build(job))
            .collect::<Result<Vec<_>>>()?;
        info!("Feature cache ready: {} files", total);
        Ok(written)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::write_audio, process::extract::FakeAnalyzer};
    use std::collections::HashSet;
    const FEATURES: [FeatureName; 2] = [FeatureName::F0, FeatureName::Mfcc];
    fn feature(len: usize, offset: f32) -> AcousticFeature {
        let f0 = Array2::from_shape_fn((len, 1), |(t, _)| if t % 4 == 0 { 0.0 } else { 100.0 + offset });
        let voiced = f0.mapv(|x| x != 0.0);
        AcousticFeature::new(
            f0,
            Array2::from_elem((len, 4), 1.0),
            Array2::from_elem((len, 4), 0.5),
            Array2::from_shape_fn((len, 3), |(t, j)| offset + (t + j) as f32),
            voiced,
        )
    }
    fn moment(value: f32) -> AcousticFeature {
        let row = |w: usize| Array2::from_elem((1, w), value);
        AcousticFeature::new(row(1), row(4), row(4), row(3), Array2::from_elem((1, 1), true))
    }
    fn write_fixture(root: &Path, pairs: usize) -> DatasetConfig {
        let lens: Vec<_> = (0..pairs).map(|i| (20 + i, 24 + i)).collect();
        write_fixture_with(root, &lens)
    }
    /// Pair `i` has input offset `i` and target offset `10 + i`.
    fn write_fixture_with(root: &Path, lens: &[(usize, usize)]) -> DatasetConfig {
        let save = AcousticFeatureSave::new(false, vec![]);
        for (i, &(input_len, target_len)) in lens.iter().enumerate() {
            save.save(&root.join(format!("in/{:03}.npz", i)), &feature(input_len, i as f32)).unwrap();
            save.save(&root.join(format!("out/{:03}.npz", i)), &feature(target_len, 10.0 + i as f32)).unwrap();
        }
        let stats = root.join("stats");
        save.save(&stats.join("mean.npz"), &moment(0.0)).unwrap();
        save.save(&stats.join("var.npz"), &moment(1.0)).unwrap();
        DatasetConfig {
            input_glob: format!("{}/in/*.npz", root.display()),
            target_glob: format!("{}/out/*.npz", root.display()),
            features: FEATURES.to_vec(),
            input_mean_path: stats.join("mean.npz"),
            input_var_path: stats.join("var.npz"),
            target_mean_path: stats.join("mean.npz"),
            target_var_path: stats.join("var.npz"),
            train_crop_size: 16,
            input_global_noise: 0.0,
            input_local_noise: 0.0,
            target_global_noise: 0.0,
            target_local_noise: 0.0,
            seed: 3,
            num_test: 2,
        }
    }
    fn pairs(n: usize) -> Vec<PathPair> {
        (0..n)
            .map(|i| PathPair { input: format!("in/{}", i).into(), target: format!("out/{}", i).into() })
            .collect()
    }
    #[test]
    fn test_split_pairs() {
        let split = split_pairs(pairs(10), 3, 42);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 7);
        assert_eq!(split.train_eval, split.train[..3].to_vec());
        let test: HashSet<_> = split.test.iter().map(|p| p.input.clone()).collect();
        assert!(split.train.iter().all(|p| !test.contains(&p.input)));
        assert_eq!(split, split_pairs(pairs(10), 3, 42));
        assert_ne!(split.test, split_pairs(pairs(10), 3, 43).test);
    }
    #[test]
    fn test_split_pairs_clamps() {
        let split = split_pairs(pairs(2), 5, 0);
        assert_eq!(split.test.len(), 2);
        assert!(split.train.is_empty());
        assert!(split.train_eval.is_empty());
    }
    #[test]
    fn test_base_pipeline_aligns_and_masks() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path(), 1);
        let moments = Arc::new(Moments::load(&config.input_mean_path, &config.input_var_path).unwrap());
        let base = base_pipeline(&FEATURES, moments.clone(), moments);
        let pair = find_pairs(&config.input_glob, &config.target_glob).unwrap().remove(0);
        let example = base.apply(pair, true).unwrap();
        assert_eq!(example.input.dim(), (4, 24));
        assert_eq!(example.target.dim(), (4, 24));
        assert_eq!(example.mask.dim(), (4, 24));
        assert!(example.input.slice(ndarray::s![.., 20..]).iter().all(|&x| x == 0.0));
        assert_eq!(example.input[[0, 1]], 100.0);
        assert_eq!(example.mask.row(0).to_vec()[..4], [0.0, 1.0, 1.0, 1.0]);
        assert!(example.mask.slice(ndarray::s![1.., ..]).iter().all(|&x| x == 1.0));
    }
    #[test]
    fn test_create_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path(), 5);
        let datasets = create(&config).unwrap();
        assert_eq!(datasets.train.len(), 3);
        assert_eq!(datasets.test.len(), 2);
        assert_eq!(datasets.train_eval.len(), 2);
        let train = datasets.train.get_seeded(0, 11).unwrap();
        assert_eq!(train.time_lens(), [16, 16, 16]);
        assert_eq!(train.input.nrows(), 4);
        assert_eq!(train, datasets.train.get_seeded(0, 11).unwrap());
        let test = datasets.test.get(1).unwrap();
        assert_eq!(test.time_lens(), [16, 16, 16]);
        assert_eq!(test, datasets.test.get(1).unwrap());
        let eval = datasets.train_eval.get(0).unwrap();
        assert_eq!(eval.target.dim(), (4, 16));
    }
    #[test]
    fn test_train_noise_changes_input_only_where_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixture(dir.path(), 3);
        config.num_test = 0;
        let quiet = create(&config).unwrap().train.get_seeded(0, 5).unwrap();
        config.input_local_noise = 0.5;
        let noisy = create(&config).unwrap().train.get_seeded(0, 5).unwrap();
        assert_ne!(quiet.input, noisy.input);
        assert_eq!(quiet.target, noisy.target);
        assert_eq!(quiet.mask, noisy.mask);
    }
    fn zero_columns(arr: &Array2<f32>) -> Vec<usize> {
        (0..arr.ncols()).filter(|&c| arr.column(c).iter().all(|&x| x == 0.0)).collect()
    }
    #[test]
    fn test_train_padding_shares_offsets_across_branches() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixture_with(dir.path(), &[(20, 30)]);
        config.train_crop_size = 64;
        config.num_test = 0;
        let train = create(&config).unwrap().train;
        for seed in 0..8 {
            let example = train.get_seeded(0, seed).unwrap();
            assert_eq!(example.time_lens(), [64, 64, 64]);
            let target_zeros = zero_columns(&example.target);
            assert_eq!(target_zeros.len(), 64 - 30);
            assert_eq!(target_zeros, zero_columns(&example.mask));
            let input_zeros = zero_columns(&example.input);
            assert_eq!(input_zeros.len(), 64 - 20);
            assert!(target_zeros.iter().all(|c| input_zeros.contains(c)));
        }
    }
    #[test]
    fn test_train_crop_shares_offsets_across_branches() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixture_with(dir.path(), &[(44, 40)]);
        config.num_test = 0;
        let train = create(&config).unwrap().train;
        for seed in 0..8 {
            let example = train.get_seeded(0, seed).unwrap();
            assert_eq!(example.time_lens(), [16, 16, 16]);
            let target_zeros = zero_columns(&example.target);
            assert_eq!(target_zeros, zero_columns(&example.mask));
            for c in (0..16).filter(|c| !target_zeros.contains(c)) {
                assert_eq!(example.target[[1, c]] - example.input[[1, c]], 10.0);
                assert_eq!(example.mask[[0, c]], if example.target[[0, c]] != 0.0 { 1.0 } else { 0.0 });
            }
        }
    }
    #[test]
    fn test_mismatched_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path(), 2);
        std::fs::remove_file(dir.path().join("out/001.npz")).unwrap();
        assert!(matches!(create(&config), Err(DatasetError::ShapeMismatch(_))));
    }
    #[test]
    fn test_feature_cache() {
        let dir = tempfile::tempdir().unwrap();
        let waves = dir.path().join("wave");
        std::fs::create_dir_all(&waves).unwrap();
        for name in ["a", "b"] {
            let wave: Vec<f64> = (0..3200).map(|i| 0.3 * (i as f64 * 0.07).sin()).collect();
            write_audio(waves.join(format!("{}.wav", name)), &wave, 16000).unwrap();
        }
        let config = AcousticConfig { sample_rate: 16000, order: 4, ..Default::default() };
        let cache = FeatureCache::new(Arc::new(FakeAnalyzer { bins: 6 }), &config, vec![FeatureName::Spectrogram]);
        let out = dir.path().join("feature");
        let jobs = FeatureCache::jobs(&format!("{}/*.wav", waves.display()), &out).unwrap();
        assert_eq!(jobs.len(), 2);
        let written = cache.build_all(jobs).unwrap();
        assert_eq!(written, vec![out.join("a.npz"), out.join("b.npz")]);
        let feature = AcousticFeatureLoad::new(true).load(&written[0]).unwrap();
        assert!(feature.spectrogram.is_none());
        assert_eq!(feature.width(FeatureName::Mfcc), Some(5));
        assert_eq!(feature.time_len(), Some(3200 / 80 + 1));
    }
}
