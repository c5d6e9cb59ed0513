//! Telemsim Core - Measurement generation, buffering, and persistence
//!
//! This library simulates a voltage/current instrument. A bounded random walk
//! produces synthetic samples according to an instrument profile (polarity,
//! measurement mode, ranges, buffer size). Samples are admitted by a
//! poll-driven readiness gate, kept in a bounded FIFO buffer, and optionally
//! persisted to a backing store.

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod measurement;
pub mod persistence;

pub use config::{ConfigPatch, ConfigStore, Configuration, MeasurementValues, Polarity};
pub use engine::{Simulator, SimulatorOptions, Status};
pub use error::{Result, SimError};
pub use gate::ReadinessGate;
pub use measurement::buffer::{IdAllocator, MeasurementBuffer};
pub use measurement::generator::MeasurementGenerator;
pub use measurement::signal::SignalState;
pub use measurement::{MeasuredValue, Measurement};
pub use persistence::{JsonFileStore, MeasurementStore, MemoryStore};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (YYYY-MM-DD), set by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Number of status polls per admitted sample
pub const DEFAULT_READINESS_INTERVAL: u32 = 3;

/// Maximum voltage step per sample, as a fraction of the voltage range
pub const VOLTAGE_STEP_FRACTION: f64 = 0.05;

/// Maximum current step per sample, as a fraction of the current range
pub const CURRENT_STEP_FRACTION: f64 = 0.10;

/// Upper bound (inclusive) on measured value entries per measurement
pub const MAX_VALUES_PER_MEASUREMENT: usize = 2;
