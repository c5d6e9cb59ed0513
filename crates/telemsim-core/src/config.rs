//! Instrument profile configuration
//!
//! Ranges and buffer size are fixed at startup. Only the polarity and the
//! measurement mode can change afterwards, through a permissive merge that
//! drops unrecognized values instead of failing.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Output polarity of the simulated instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Single-ended output, negative trackers disabled
    Unipolar,
    /// Symmetric dual-ended output
    #[default]
    Bipolar,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Unipolar => "unipolar",
            Polarity::Bipolar => "bipolar",
        }
    }
}

impl FromStr for Polarity {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unipolar" => Ok(Polarity::Unipolar),
            "bipolar" => Ok(Polarity::Bipolar),
            other => Err(SimError::InvalidConfiguration(format!(
                "unknown polarity: {other}"
            ))),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which physical quantities are simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementValues {
    #[default]
    Both,
    Voltage,
    Current,
}

impl MeasurementValues {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementValues::Both => "both",
            MeasurementValues::Voltage => "voltage",
            MeasurementValues::Current => "current",
        }
    }

    /// Whether voltage trackers are advanced in this mode
    pub fn includes_voltage(&self) -> bool {
        matches!(self, MeasurementValues::Both | MeasurementValues::Voltage)
    }

    /// Whether current trackers are advanced in this mode
    pub fn includes_current(&self) -> bool {
        matches!(self, MeasurementValues::Both | MeasurementValues::Current)
    }
}

impl FromStr for MeasurementValues {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "both" => Ok(MeasurementValues::Both),
            "voltage" => Ok(MeasurementValues::Voltage),
            "current" => Ok(MeasurementValues::Current),
            other => Err(SimError::InvalidConfiguration(format!(
                "unknown measurement values: {other}"
            ))),
        }
    }
}

impl fmt::Display for MeasurementValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_min_voltage() -> f64 {
    100.0
}

fn default_max_voltage() -> f64 {
    1000.0
}

fn default_min_current() -> f64 {
    5.0
}

fn default_max_current() -> f64 {
    20.0
}

fn default_buffer_size() -> usize {
    25
}

/// Active instrument profile
///
/// Serialized with PascalCase keys, which is the HTTP wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    #[serde(default = "default_min_voltage")]
    pub min_voltage: f64,
    #[serde(default = "default_max_voltage")]
    pub max_voltage: f64,
    #[serde(default = "default_min_current")]
    pub min_current: f64,
    #[serde(default = "default_max_current")]
    pub max_current: f64,
    #[serde(default)]
    pub polarity: Polarity,
    #[serde(default)]
    pub measurement_values: MeasurementValues,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            min_voltage: default_min_voltage(),
            max_voltage: default_max_voltage(),
            min_current: default_min_current(),
            max_current: default_max_current(),
            polarity: Polarity::default(),
            measurement_values: MeasurementValues::default(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Configuration {
    /// Check range ordering and buffer size
    pub fn validate(&self) -> Result<()> {
        check_range("voltage", self.min_voltage, self.max_voltage)?;
        check_range("current", self.min_current, self.max_current)?;
        if self.buffer_size == 0 {
            return Err(SimError::InvalidConfiguration(
                "buffer size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest voltage perturbation per sample
    pub fn max_voltage_step(&self) -> f64 {
        (self.max_voltage - self.min_voltage) * crate::VOLTAGE_STEP_FRACTION
    }

    /// Largest current perturbation per sample
    pub fn max_current_step(&self) -> f64 {
        (self.max_current - self.min_current) * crate::CURRENT_STEP_FRACTION
    }

    pub fn is_bipolar(&self) -> bool {
        self.polarity == Polarity::Bipolar
    }
}

fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(SimError::InvalidConfiguration(format!(
            "{name} range bounds must be finite"
        )));
    }
    if min >= max {
        return Err(SimError::InvalidConfiguration(format!(
            "{name} range is empty: min {min} must be below max {max}"
        )));
    }
    // The walk step is derived from the span, so the span itself must be finite
    if !(max - min).is_finite() {
        return Err(SimError::InvalidConfiguration(format!(
            "{name} range span overflows: {min} to {max}"
        )));
    }
    Ok(())
}

/// Partial configuration update
///
/// Fields hold raw JSON so that values of the wrong type are dropped by
/// [`ConfigStore::update`] rather than rejected by the deserializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_values: Option<Value>,
}

impl ConfigPatch {
    /// Polarity carried by the patch, if present and recognized
    pub fn polarity(&self) -> Option<Polarity> {
        self.polarity.as_ref()?.as_str()?.parse().ok()
    }

    /// Measurement mode carried by the patch, if present and recognized
    pub fn measurement_values(&self) -> Option<MeasurementValues> {
        self.measurement_values.as_ref()?.as_str()?.parse().ok()
    }
}

/// Holder of the active configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    config: Configuration,
}

impl ConfigStore {
    /// Create a store from a validated configuration
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Current configuration
    pub fn get(&self) -> &Configuration {
        &self.config
    }

    /// Merge the recognized fields of `patch` and return the result
    pub fn update(&mut self, patch: &ConfigPatch) -> Configuration {
        if let Some(polarity) = patch.polarity() {
            self.config.polarity = polarity;
        }
        if let Some(values) = patch.measurement_values() {
            self.config.measurement_values = values;
        }
        self.config.clone()
    }
}
