//! Host build configuration
//!
//! Loaded from YAML. Every section and field has a default, so an empty file
//! (or no file at all) is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub storage: StorageConfig,
    pub midi: MidiConfig,
    pub host: HostConfig,
    pub input: InputConfig,
}

/// Emulated board
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hardware revision reported to the host
    pub hw_version: String,
    /// Pixels on the LED strip
    pub led_count: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hw_version: "1.0".to_string(),
            led_count: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sled database directory; defaults to the application data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// MIDI ports, matched by case-insensitive substring
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MidiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// TCP address the host protocol listens on
    pub listen: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7878".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Bound of the input event queue
    pub queue_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

impl AppConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it does not exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            warn!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document
        let config: AppConfig = if yaml.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(yaml).context("Failed to parse YAML config")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.hw_version.trim().is_empty() {
            anyhow::bail!("device.hw_version cannot be empty");
        }
        if self.device.led_count > usize::from(u16::MAX) {
            anyhow::bail!(
                "device.led_count {} exceeds the addressable {} pixels",
                self.device.led_count,
                u16::MAX
            );
        }
        if self.input.queue_capacity == 0 {
            anyhow::bail!("input.queue_capacity must be at least 1");
        }
        self.host
            .listen
            .parse::<SocketAddr>()
            .with_context(|| format!("host.listen '{}' is not a socket address", self.host.listen))?;
        for (name, port) in [
            ("midi.input_port", &self.midi.input_port),
            ("midi.output_port", &self.midi.output_port),
        ] {
            if port.as_deref().is_some_and(|p| p.trim().is_empty()) {
                anyhow::bail!("{} cannot be empty (omit it instead)", name);
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.host
            .listen
            .parse()
            .with_context(|| format!("host.listen '{}' is not a socket address", self.host.listen))
    }
}
