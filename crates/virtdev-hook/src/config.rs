//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use virtdev_core::hooking::{DOMXML_ENV, JSON_ENV};
use virtdev_core::{DomXmlChannel, JsonChannel};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Variable naming the domain XML hand-off file
    #[serde(default = "default_domxml_env")]
    pub domxml_env: String,
    /// Variable naming the JSON hand-off file
    #[serde(default = "default_json_env")]
    pub json_env: String,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            domxml_env: default_domxml_env(),
            json_env: default_json_env(),
        }
    }
}

fn default_domxml_env() -> String {
    DOMXML_ENV.to_string()
}

fn default_json_env() -> String {
    JSON_ENV.to_string()
}

impl Config {
    pub fn domxml_channel(&self) -> Result<DomXmlChannel> {
        Ok(DomXmlChannel::from_var(&self.channels.domxml_env)?)
    }

    pub fn json_channel(&self) -> Result<JsonChannel> {
        Ok(JsonChannel::from_var(&self.channels.json_env)?)
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.channels.domxml_env, "_hook_domxml");
        assert_eq!(config.channels.json_env, "_hook_json");
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("virtdev-hook.toml");
        std::fs::write(&path, "[channels]\ndomxml_env = \"MY_DOMXML\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.channels.domxml_env, "MY_DOMXML");
        assert_eq!(config.channels.json_env, "_hook_json");
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("virtdev-hook.toml");
        std::fs::write(&path, "[channels\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_channel_variable_unset() {
        let config = Config {
            channels: ChannelsConfig {
                domxml_env: "_virtdev_hook_test_unset".to_string(),
                json_env: "_virtdev_hook_test_unset_json".to_string(),
            },
        };
        assert!(config.domxml_channel().is_err());
        assert!(config.json_channel().is_err());
    }
}
