use anyhow::Context;
use clap::Parser;
use mhp_engine::{
    artifacts::{ArtifactFormat, ArtifactStore},
    config::Config,
    registry::ModelId,
    training::{Dataset, Trainer},
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fit the seven model pairs from the survey CSV and write their artifacts.
#[derive(Debug, Parser)]
#[command(name = "mhp-train", version)]
struct Args {
    /// Survey CSV; falls back to `training.dataset_path`.
    #[arg(long, env = "MHP_DATASET")]
    dataset: Option<PathBuf>,

    /// Artifact directory; falls back to `models.artifact_dir`.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Artifact encoding; falls back to `models.format`.
    #[arg(long, value_enum)]
    format: Option<ArtifactFormat>,

    /// Train only these models (display name or key). Repeatable.
    #[arg(long = "model")]
    models: Vec<String>,

    #[arg(long)]
    test_ratio: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mhp_engine=info,mhp_train=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    let dataset_path = args
        .dataset
        .or(config.training.dataset_path)
        .context("no dataset given: pass --dataset or set training.dataset_path")?;
    let out = args.out.unwrap_or(config.models.artifact_dir);
    let format = args.format.unwrap_or(config.models.format);
    let test_ratio = args.test_ratio.unwrap_or(config.training.test_ratio);
    let seed = args.seed.unwrap_or(config.training.split_seed);

    let models = if args.models.is_empty() {
        ModelId::ALL.to_vec()
    } else {
        args.models
            .iter()
            .map(|name| ModelId::resolve(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let dataset = Dataset::from_path(&dataset_path)
        .with_context(|| format!("loading {}", dataset_path.display()))?;
    let trainer = Trainer::new(ArtifactStore::new(&out, format), test_ratio, seed);
    let manifest = trainer.train(&dataset, &models)?;

    for entry in &manifest.models {
        info!(
            "{:<26} test F1 y1={:.4} y2={:.4} (reported {:.4}/{:.4})",
            entry.name, entry.test_f1.y1, entry.test_f1.y2, entry.reported_f1.y1, entry.reported_f1.y2
        );
    }
    info!("Wrote {} model pairs to {}", manifest.models.len(), out.display());
    Ok(())
}
