//! Configuration for the gs binary

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::coordinator::CoordinatorConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error); `--log-level` wins over it
    #[serde(default)]
    pub log_level: Option<String>,

    /// Coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Append every logged event and exception to this JSONL file
    #[serde(default)]
    pub event_log: Option<PathBuf>,
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        debug!(?path, "Config::load: called");
        match Self::locate(path) {
            Some(config_path) => Self::load_from(&config_path),
            None => Ok(Config::default()),
        }
    }

    /// Read only the log level, ignoring any error, so logging can be set up first
    pub fn load_log_level(path: Option<&PathBuf>) -> Option<String> {
        Self::load(path).ok().and_then(|c| c.log_level)
    }

    fn locate(path: Option<&PathBuf>) -> Option<PathBuf> {
        if let Some(config_path) = path {
            return Some(config_path.clone());
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("globalstore").join("config.yml")),
            Some(PathBuf::from("globalstore.yml")),
        ];
        default_paths.into_iter().flatten().find(|p| p.exists())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).context(format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
