use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*};
use yukarin_data::{config::Config, pipeline::{self, FeatureCache}};
use mimalloc::MiMalloc;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
/// Paired acoustic feature datasets for voice conversion training
#[derive(Parser, Debug)]
#[command(name = "yukarin-data", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}
#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialize the train, test and train_eval datasets as npz examples
    Export {
        /// INI file with [dataset] and [acoustic] sections
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
        /// Output root; one subdirectory per dataset
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
    },
    /// List the feature cache jobs for a waveform pattern and whether each is already built
    Jobs {
        /// Waveform file pattern, wildcards allowed in any component
        #[arg(value_name = "WAVE_GLOB")]
        wave_glob: String,
        /// Directory the feature files are written to
        #[arg(value_name = "OUT_DIR")]
        out_dir: PathBuf,
    },
}
fn init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing::level_filters::LevelFilter::INFO)
        .with(fmt::layer()
            .without_time()
            .with_target(false)
            .with_thread_names(false))
        .init();
    Ok(())
}
fn export(config_path: PathBuf, out_dir: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    info!("Loaded config {}", config_path.display());
    let datasets = pipeline::create(&config.dataset)?;
    for (name, dataset) in datasets.named() {
        dataset.export(&out_dir.join(name), config.dataset.seed)?;
    }
    info!("Done: {}", out_dir.display());
    Ok(())
}
fn jobs(wave_glob: &str, out_dir: PathBuf) -> Result<()> {
    let jobs = FeatureCache::jobs(wave_glob, &out_dir)?;
    let pending = jobs.iter().filter(|job| !job.feature.is_file()).count();
    for job in &jobs {
        let state = if job.feature.is_file() { "cached" } else { "pending" };
        info!("{} {} -> {}", state, job.wave.display(), job.feature.display());
    }
    info!("{} jobs, {} pending", jobs.len(), pending);
    Ok(())
}
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    match cli.command {
        Commands::Export { config, out_dir } => export(config, out_dir),
        Commands::Jobs { wave_glob, out_dir } => jobs(&wave_glob, out_dir),
    }
}
