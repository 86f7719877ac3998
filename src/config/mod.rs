use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub gateway: GatewayConfig,
    pub ocr: OcrConfig,
    pub report: ReportConfig,
    pub rotation: RotationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 3838 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Members endpoint of the tracked voice channel. When unset, presence
    /// only arrives via the HTTP ingest route.
    pub members_url: Option<String>,
    pub poll_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            members_url: None,
            poll_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub provider: String,
    pub command_path: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub languages: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: "tesseract-cli".to_string(),
            command_path: None,
            api_endpoint: None,
            api_key: None,
            languages: "eng+chi_sim".to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub tick_interval_secs: u64,
    /// Fallback spawn offset for event-list lines with no time token.
    pub default_spawn_offset_minutes: i64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 1,
            default_spawn_offset_minutes: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = Config::default();
        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.http.port, 3838);
        assert_eq!(parsed.ocr.provider, "tesseract-cli");
        assert_eq!(parsed.rotation.default_spawn_offset_minutes, 60);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = toml::from_str("[http]\nport = 9000\n").unwrap();
        assert_eq!(parsed.http.port, 9000);
        assert_eq!(parsed.gateway.poll_interval_secs, 15);
        assert_eq!(parsed.ocr.languages, "eng+chi_sim");
    }
}
