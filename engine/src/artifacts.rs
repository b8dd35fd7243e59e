//! Persisted estimators: one artifact per (model, target), named
//! `{key}_model_{y1|y2}.{ext}` inside the artifact directory.

use crate::{
    error::{artifact_error, AppError},
    estimators::{Classifier, Estimator},
    features::{FEATURE_COUNT, FEATURE_NAMES},
    registry::{ModelId, Target},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Bincode => "bin",
        }
    }
}

/// A fitted estimator together with what it was fitted for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub model: ModelId,
    pub target: Target,
    /// Training column order as resolved from the dataset header; must
    /// equal `FEATURE_NAMES`.
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub estimator: Estimator,
}

impl Artifact {
    pub fn new(model: ModelId, target: Target, feature_names: Vec<String>, estimator: Estimator) -> Self {
        Self {
            model,
            target,
            feature_names,
            trained_at: Utc::now(),
            estimator,
        }
    }

    fn check_columns(&self) -> Result<(), AppError> {
        if self.feature_names.len() != FEATURE_COUNT
            || self.feature_names.iter().zip(FEATURE_NAMES).any(|(a, b)| a.as_str() != *b)
        {
            return Err(AppError::ShapeMismatch(format!(
                "{} {} artifact was trained on {} columns that differ from the {} survey features",
                self.model.key(),
                self.target.suffix(),
                self.feature_names.len(),
                FEATURE_COUNT
            )));
        }
        if self.estimator.n_features() != FEATURE_COUNT {
            return Err(AppError::ShapeMismatch(format!(
                "{} {} estimator expects {} features, survey vector has {}",
                self.model.key(),
                self.target.suffix(),
                self.estimator.n_features(),
                FEATURE_COUNT
            )));
        }
        Ok(())
    }
}

/// The two estimators behind one registry entry.
#[derive(Debug, Clone)]
pub struct ModelPair {
    pub y1: Artifact,
    pub y2: Artifact,
}

impl ModelPair {
    pub fn get(&self, target: Target) -> &Artifact {
        match target {
            Target::Y1 => &self.y1,
            Target::Y2 => &self.y2,
        }
    }
}

/// Where the dispatcher obtains a model pair from.
pub trait EstimatorSource: Send + Sync {
    fn load_pair(&self, model: ModelId) -> Result<Arc<ModelPair>, AppError>;
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    format: ArtifactFormat,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    pub fn path(&self, model: ModelId, target: Target) -> PathBuf {
        self.dir.join(format!(
            "{}_model_{}.{}",
            model.key(),
            target.suffix(),
            self.format.extension()
        ))
    }

    pub fn save(&self, artifact: &Artifact) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(artifact.model, artifact.target);
        let bytes = match self.format {
            ArtifactFormat::Json => serde_json::to_vec(artifact)?,
            ArtifactFormat::Bincode => bincode::serialize(artifact)?,
        };
        fs::write(&path, bytes)?;
        debug!("Saved {} artifact to {}", artifact.estimator.kind(), path.display());
        Ok(path)
    }

    pub fn load(&self, model: ModelId, target: Target) -> Result<Artifact, AppError> {
        let path = self.path(model, target);
        let bytes = fs::read(&path).map_err(|e| artifact_error(&path, e))?;
        let artifact: Artifact = match self.format {
            ArtifactFormat::Json => serde_json::from_slice(&bytes).map_err(|e| artifact_error(&path, e))?,
            ArtifactFormat::Bincode => bincode::deserialize(&bytes).map_err(|e| artifact_error(&path, e))?,
        };

        if artifact.model != model || artifact.target != target {
            return Err(artifact_error(
                &path,
                format!(
                    "file holds the {} {} estimator",
                    artifact.model.key(),
                    artifact.target.suffix()
                ),
            ));
        }
        artifact.check_columns()?;
        artifact.estimator.validate().map_err(|reason| artifact_error(&path, reason))?;

        debug!("Loaded {} from {}", artifact.estimator.kind(), path.display());
        Ok(artifact)
    }
}

impl EstimatorSource for ArtifactStore {
    fn load_pair(&self, model: ModelId) -> Result<Arc<ModelPair>, AppError> {
        Ok(Arc::new(ModelPair {
            y1: self.load(model, Target::Y1)?,
            y2: self.load(model, Target::Y2)?,
        }))
    }
}

/// Every model pair loaded once, shared read-only afterwards.
#[derive(Debug)]
pub struct PreloadedModels {
    pairs: HashMap<ModelId, Arc<ModelPair>>,
    store: ArtifactStore,
}

impl PreloadedModels {
    /// Load all registry models. Models whose artifacts fail to load are
    /// skipped and report `ArtifactLoad` when requested.
    pub fn load(store: ArtifactStore) -> Self {
        let mut pairs = HashMap::new();
        for model in ModelId::ALL {
            match store.load_pair(model) {
                Ok(pair) => {
                    pairs.insert(model, pair);
                }
                Err(e) => warn!("Skipping {} during preload: {}", model, e),
            }
        }
        info!(
            "Preloaded {}/{} model pairs from {}",
            pairs.len(),
            ModelId::ALL.len(),
            store.dir().display()
        );
        Self { pairs, store }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl EstimatorSource for PreloadedModels {
    fn load_pair(&self, model: ModelId) -> Result<Arc<ModelPair>, AppError> {
        self.pairs.get(&model).cloned().ok_or_else(|| {
            artifact_error(
                self.store.path(model, Target::Y1),
                "model was not available at start-up",
            )
        })
    }
}
