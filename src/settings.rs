//! Persistent server settings
//!
//! Stores the listen address, store selection, RNG seed, and the startup
//! instrument profile in a JSON file at
//! `<data_dir>/telemsim/settings.json`. Every field has a default, so a
//! partial or missing file still yields a usable configuration.

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use telemsim_core::Configuration;
use telemsim_server::ServerConfig;

/// Backing store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Volatile, lost on restart
    #[default]
    Memory,
    /// JSON-lines journal on disk
    Json,
}

fn default_port() -> u16 {
    5000
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_readiness_interval() -> u32 {
    telemsim_core::DEFAULT_READINESS_INTERVAL
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("telemsim")
}

/// Server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub store: StoreKind,
    /// JSON store location (None = `<data_dir>/telemsim/measurements.jsonl`)
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    /// RNG seed (None = OS entropy)
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_readiness_interval")]
    pub readiness_interval: u32,
    /// Startup instrument profile
    #[serde(default)]
    pub instrument: Configuration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
            store: StoreKind::default(),
            data_file: None,
            seed: None,
            readiness_interval: default_readiness_interval(),
            instrument: Configuration::default(),
        }
    }
}

impl Settings {
    /// Default settings file path: `<data_dir>/telemsim/settings.json`
    pub fn path() -> PathBuf {
        data_dir().join("settings.json")
    }

    /// Load settings from `path`, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    tracing::info!(path = %path.display(), "Loaded settings from disk");
                    settings
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse settings, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No settings file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save settings to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Settings saved to disk");
        Ok(())
    }

    /// Apply command line overrides
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(ref bind) = cli.bind {
            self.bind_addr = bind.clone();
        }
        if let Some(store) = cli.store {
            self.store = store;
        }
        if let Some(ref data_file) = cli.data_file {
            self.data_file = Some(data_file.clone());
        }
        if let Some(seed) = cli.seed {
            self.seed = Some(seed);
        }
        if let Some(interval) = cli.readiness_interval {
            self.readiness_interval = interval;
        }
        if let Some(buffer_size) = cli.buffer_size {
            self.instrument.buffer_size = buffer_size as usize;
        }
    }

    /// JSON store location
    pub fn data_file(&self) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(|| data_dir().join("measurements.jsonl"))
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            bind_addr: self.bind_addr.clone(),
        }
    }
}
