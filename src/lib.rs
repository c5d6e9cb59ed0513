//! Telemsim - voltage/current telemetry simulator
//!
//! Wires settings, the backing store, and the simulation engine into the
//! HTTP server. Engine and server live in the `telemsim-core` and
//! `telemsim-server` crates, re-exported here.

pub mod cli;
pub mod settings;

pub use telemsim_core as engine;
pub use telemsim_server as server;

use anyhow::Context;
use settings::{Settings, StoreKind};
use telemsim_core::{JsonFileStore, MeasurementStore, MemoryStore, Simulator, SimulatorOptions};

pub use telemsim_core::{BUILD_DATE, VERSION};

/// Open the store selected by `settings`
pub fn open_store(settings: &Settings) -> anyhow::Result<Box<dyn MeasurementStore>> {
    match settings.store {
        StoreKind::Memory => Ok(Box::new(MemoryStore::with_retention(
            settings.instrument.buffer_size,
        ))),
        StoreKind::Json => {
            let path = settings.data_file();
            let store = JsonFileStore::open(&path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Box::new(store))
        }
    }
}

/// Build the simulation engine described by `settings`
pub fn build_simulator(settings: &Settings) -> anyhow::Result<Simulator> {
    let store = open_store(settings)?;
    let options = SimulatorOptions {
        seed: settings.seed,
        readiness_interval: settings.readiness_interval,
    };
    Simulator::new(settings.instrument.clone(), store, options)
        .context("Failed to initialize simulator")
}
