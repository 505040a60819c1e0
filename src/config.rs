//! Configuration file
//!
//! `config.yaml` under the platform config directory. Every field has a
//! default, so an absent file or a partial one is fine; command-line flags
//! override what the file says.

use crate::scheme::ColorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub min_alpha: f32,
    pub max_alpha: f32,
}

impl Default for ColorConfig {
    fn default() -> Self {
        let settings = ColorSettings::default();
        Self {
            min_alpha: settings.min_alpha,
            max_alpha: settings.max_alpha,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Retry period for unanchored highlights
    pub reconcile_ms: u64,
    /// Period of the full codebook refresh
    pub refresh_ms: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            reconcile_ms: 2_000,
            refresh_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account name recorded on new annotations
    pub user: String,
    /// Annotation group holding the codebook
    pub group: String,
    /// Local annotation database; defaults under the data directory
    pub db: Option<PathBuf>,
    pub colors: ColorConfig,
    pub intervals: IntervalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: String::new(),
            group: "__world__".to_string(),
            db: None,
            colors: ColorConfig::default(),
            intervals: IntervalConfig::default(),
        }
    }
}

impl Config {
    /// `~/.config/codebook/config.yaml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("codebook").join("config.yaml"))
    }

    /// `~/.local/share/codebook/codebook.db` or the platform equivalent
    pub fn default_db_path() -> PathBuf {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        data_dir.join("codebook").join("codebook.db")
    }

    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> ConfigResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_yaml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let ColorConfig { min_alpha, max_alpha } = self.colors;
        if !(0.0..=1.0).contains(&min_alpha) || !(0.0..=1.0).contains(&max_alpha) {
            return Err(ConfigError::Invalid("alpha values must lie in [0, 1]".into()));
        }
        if min_alpha > max_alpha {
            return Err(ConfigError::Invalid(format!(
                "min_alpha {} exceeds max_alpha {}",
                min_alpha, max_alpha
            )));
        }
        if self.intervals.reconcile_ms == 0 || self.intervals.refresh_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(Self::default_db_path)
    }

    pub fn color_settings(&self) -> ColorSettings {
        ColorSettings::new(self.colors.min_alpha, self.colors.max_alpha)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.intervals.reconcile_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.intervals.refresh_ms)
    }
}
