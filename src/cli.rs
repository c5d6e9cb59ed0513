//! Command line interface

use crate::settings::StoreKind;
use clap::Parser;
use std::path::PathBuf;

/// Voltage/current telemetry simulator
#[derive(Debug, Parser)]
#[command(name = "telemsim", version, about)]
pub struct Cli {
    /// Settings file (default: <data_dir>/telemsim/settings.json)
    #[arg(long, short = 's')]
    pub settings: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Measurement store
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// JSON store location
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Status polls per generated sample
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub readiness_interval: Option<u32>,

    /// Number of measurements kept in the buffer
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub buffer_size: Option<u64>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    pub save_settings: bool,
}

impl Cli {
    /// Settings file to load
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(crate::settings::Settings::path)
    }
}
