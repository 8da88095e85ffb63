// Configuration management for the PixelWorld CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/pixelworld/config.json
// - Linux: ~/.config/pixelworld/config.json
// - Windows: %APPDATA%\pixelworld\config.json

use anyhow::{Context, Result};
use pixelworld_core::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Room, channel, and identity settings handed to the session
    pub session: SessionConfig,

    /// Local demo settings
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of simulated peers
    pub bots: usize,

    /// Delay for in-process delivery to settle, in milliseconds
    pub settle_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            bots: 2,
            settle_ms: 50,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("pixelworld");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value; the result is validated before it is accepted
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        match key {
            "app_id" => next.session.app_id = value.to_string(),
            "room" => next.session.room = value.to_string(),
            "channel" => next.session.channel = value.to_string(),
            "display_name" => {
                next.session.display_name = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "unknown_peer_name" => next.session.unknown_peer_name = value.to_string(),
            "relay_urls" => {
                next.session.relay_urls = value
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "demo_bots" => {
                next.demo.bots = value.parse().context("Invalid number")?;
            }
            "demo_settle_ms" => {
                next.demo.settle_ms = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        next.session.validate().context("Rejected config value")?;
        *self = next;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "app_id" => Some(self.session.app_id.clone()),
            "room" => Some(self.session.room.clone()),
            "channel" => Some(self.session.channel.clone()),
            "display_name" => self.session.display_name.clone(),
            "unknown_peer_name" => Some(self.session.unknown_peer_name.clone()),
            "relay_urls" => Some(self.session.relay_urls.join(",")),
            "demo_bots" => Some(self.demo.bots.to_string()),
            "demo_settle_ms" => Some(self.demo.settle_ms.to_string()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("app_id".to_string(), self.session.app_id.clone()),
            ("room".to_string(), self.session.room.clone()),
            ("channel".to_string(), self.session.channel.clone()),
            (
                "display_name".to_string(),
                self.session
                    .display_name
                    .clone()
                    .unwrap_or_else(|| "(generated)".to_string()),
            ),
            ("unknown_peer_name".to_string(), self.session.unknown_peer_name.clone()),
            ("relay_urls".to_string(), self.session.relay_urls.len().to_string()),
            ("ice_servers".to_string(), self.session.ice_servers.len().to_string()),
            ("demo_bots".to_string(), self.demo.bots.to_string()),
            ("demo_settle_ms".to_string(), format!("{}ms", self.demo.settle_ms)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.session.room, "main-room");
        assert_eq!(config.demo.bots, 2);
        assert!(config.get("display_name").is_none());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("room", "lobby").unwrap();
        config.set("relay_urls", "wss://a, wss://b,").unwrap();
        config.set("demo_bots", "4").unwrap();

        assert_eq!(config.get("room").as_deref(), Some("lobby"));
        assert_eq!(config.session.relay_urls, vec!["wss://a", "wss://b"]);
        assert_eq!(config.demo.bots, 4);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        assert!(config.set("room", "  ").is_err());
        assert!(config.set("demo_bots", "many").is_err());
        assert!(config.set("nope", "x").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_creates_default_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        config.set("display_name", "Alice").unwrap();
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.session.display_name.as_deref(), Some("Alice"));
    }
}
