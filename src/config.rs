// Configuration loaded from YAML

use crate::announce::DEFAULT_ANNOUNCEMENT_DELAY;
use crate::guard::DEFAULT_ID_CEILING;
use crate::pregen::PregenPolicy;
use crate::source::DEFAULT_API_URL;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Runtime settings; every key is optional in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collection endpoint; single posts live at `{api_url}/{id}`
    pub api_url: String,
    pub pregenerate: PregenPolicy,
    /// Highest id the detail view will display
    pub client_id_ceiling: u64,
    /// How long a favorites announcement stays up
    pub announcement_ms: u64,
    /// Read posts from the local snapshot instead of the API
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            pregenerate: PregenPolicy::default(),
            client_id_ceiling: DEFAULT_ID_CEILING,
            announcement_ms: DEFAULT_ANNOUNCEMENT_DELAY.as_millis() as u64,
            offline: false,
        }
    }
}

impl Config {
    /// Default config file location: `<config_dir>/postshelf/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("postshelf").join("config.yaml"))
    }

    /// Load configuration
    ///
    /// An explicit path must exist and parse. Without one, the default
    /// location is used when present, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = ?path, "Loaded config");
        Ok(config)
    }

    pub fn announcement_delay(&self) -> Duration {
        Duration::from_millis(self.announcement_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pregen::{Fallback, PregenSource};
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.client_id_ceiling, 1000);
        assert_eq!(config.announcement_delay(), Duration::from_secs(2));
        assert!(!config.offline);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "api_url: http://localhost:8080/posts\npregenerate:\n  count: 25\n  source: collection\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.api_url, "http://localhost:8080/posts");
        assert_eq!(config.pregenerate.count, 25);
        assert_eq!(config.pregenerate.source, PregenSource::Collection);
        assert_eq!(config.pregenerate.fallback, Fallback::OnDemand);
        assert_eq!(config.client_id_ceiling, 1000);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(temp.path().join("absent.yaml").as_path())).is_err());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "client_id_ceiling: [not a number]\n").unwrap();

        assert!(Config::from_file(&path).is_err());
    }
}
