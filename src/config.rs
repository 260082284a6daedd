//! Configuration for training, artifacts, inference and logging.
//!
//! Every section has defaults. A JSON file and `KREDAI_*` environment
//! variables are layered over them, environment last. Nested keys use a
//! double underscore: `KREDAI_TRAINING__GBDT__MAX_DEPTH=6`.

use crate::core::{Error, Result};
use crate::model::GbdtConfig;
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "KREDAI";

/// Separator between nested keys in environment overrides.
pub const ENV_SEPARATOR: &str = "__";

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KredaiConfig {
    pub training: TrainingConfig,
    pub artifacts: ArtifactConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

/// Offline training run settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Simulated clients
    pub n_clients: usize,
    /// Seed for partitioning, splits and sampling
    pub seed: u64,
    /// Held-out share of the pooled dataset
    pub test_ratio: f64,
    /// Held-out share of each shard
    pub local_validation_ratio: f64,
    /// Explainer background sample size cap
    pub background_sample_cap: usize,
    /// Train shards on worker threads
    pub parallel_shards: bool,
    /// Target column of the training corpus
    pub target_column: String,
    /// Booster hyperparameters
    pub gbdt: GbdtConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_clients: 5,
            seed: 42,
            test_ratio: 0.2,
            local_validation_ratio: 0.2,
            background_sample_cap: 100,
            parallel_shards: true,
            target_column: "target".to_string(),
            gbdt: GbdtConfig::default(),
        }
    }
}

/// Where artifacts are persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub dir: PathBuf,
    pub model_file: String,
    pub explainer_file: String,
    /// Names the committed pair
    pub manifest_file: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("trained_models"),
            model_file: "global_credit_model.bin".to_string(),
            explainer_file: "attribution_explainer.bin".to_string(),
            manifest_file: "artifacts.json".to_string(),
        }
    }
}

/// Request-time settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Reported contributions when the caller gives no `top_n`
    pub default_top_n: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { default_top_n: 10 }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for the crate's targets
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl KredaiConfig {
    /// Defaults, then the JSON file at `path` if given, then `KREDAI_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::layered(path, Some(Self::environment()))
    }

    /// Load from a JSON file; absent keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::layered(Some(path.as_ref()), None)
    }

    /// Defaults overridden by `KREDAI_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::layered(None, Some(Self::environment()))
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    fn layered(path: Option<&Path>, env: Option<Environment>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Json));
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if t.n_clients == 0 {
            return Err(Error::InvalidConfig("n_clients must be at least 1".into()));
        }
        for (name, ratio) in [
            ("test_ratio", t.test_ratio),
            ("local_validation_ratio", t.local_validation_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(Error::InvalidConfig(format!("{} must be in (0, 1), got {}", name, ratio)));
            }
        }
        if t.background_sample_cap == 0 {
            return Err(Error::InvalidConfig("background_sample_cap must be at least 1".into()));
        }
        let a = &self.artifacts;
        if a.model_file == a.explainer_file
            || a.manifest_file == a.model_file
            || a.manifest_file == a.explainer_file
        {
            return Err(Error::InvalidConfig(
                "model, explainer and manifest need distinct file names".into(),
            ));
        }
        t.gbdt.validate()
    }
}
