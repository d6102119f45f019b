//! Configuration for terrane-ctl.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TERRANE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/terrane/config.toml
//!   3. ~/.config/terrane/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    pub seedlink: SeedLinkConfig,
    pub datalink: DataLinkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedLinkConfig {
    /// Server address; a bare host gets the default port 18000.
    pub server: String,
    /// Stream list for capture, e.g. "NZ_AUCT:40BTT,NZ_WEL".
    pub streams: String,
    /// Default selectors for streams without their own.
    pub selectors: String,
    /// Resumption state file. Empty disables persistence.
    pub state_file: String,
    /// Directory captured records are appended under.
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLinkConfig {
    pub server: String,
    /// Program name reported in the ID handshake.
    pub program: String,
    pub username: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SeedLinkConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            streams: "*_*".to_owned(),
            selectors: "???".to_owned(),
            state_file: String::new(),
            output_dir: data_dir().join("records"),
        }
    }
}

impl Default for DataLinkConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            program: "terrane-ctl".to_owned(),
            username: whoami(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"))
        .join("terrane")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local").join("share"))
        .join("terrane")
}

fn home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "terrane".to_owned())
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CtlConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            CtlConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TERRANE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply TERRANE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TERRANE_SEEDLINK__SERVER") {
            self.seedlink.server = v;
        }
        if let Ok(v) = std::env::var("TERRANE_SEEDLINK__STREAMS") {
            self.seedlink.streams = v;
        }
        if let Ok(v) = std::env::var("TERRANE_SEEDLINK__SELECTORS") {
            self.seedlink.selectors = v;
        }
        if let Ok(v) = std::env::var("TERRANE_SEEDLINK__STATE_FILE") {
            self.seedlink.state_file = v;
        }
        if let Ok(v) = std::env::var("TERRANE_DATALINK__SERVER") {
            self.datalink.server = v;
        }
        if let Ok(v) = std::env::var("TERRANE_DATALINK__PROGRAM") {
            self.datalink.program = v;
        }
    }
}
