use crate::{artifacts::ArtifactFormat, error::AppError};
use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
};

const DEFAULT_CONFIG_FILE: &str = "mhp.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub artifact_dir: PathBuf,
    pub format: ArtifactFormat,
    /// Load every artifact once at start-up instead of per prediction.
    pub preload: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub dataset_path: Option<PathBuf>,
    pub test_ratio: f64,
    pub split_seed: u64,
}

impl Config {
    /// Defaults, then `mhp.toml` (or the file named by `MHP_CONFIG`), then
    /// `MHP__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self, AppError> {
        let path = env::var("MHP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let settings = config::Config::builder()
            .set_default("server.bind_addr", "0.0.0.0:8000")?
            .set_default("models.artifact_dir", "models")?
            .set_default("models.format", "bincode")?
            .set_default("models.preload", false)?
            .set_default("training.test_ratio", 0.2)?
            .set_default("training.split_seed", 25)?
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("MHP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(0.0..1.0).contains(&self.training.test_ratio) || self.training.test_ratio == 0.0 {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "training.test_ratio must be in (0, 1), got {}",
                self.training.test_ratio
            ))));
        }
        Ok(())
    }
}
