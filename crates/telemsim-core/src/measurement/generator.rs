//! Measurement assembly
//!
//! Each measurement carries one or two readings, chosen at random. Every
//! reading is a separate random walk step, so a two-reading measurement
//! advances the trackers twice.

use super::signal::SignalState;
use super::Measurement;
use crate::config::Configuration;
use chrono::{SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds measurements from the random walk trackers
#[derive(Debug, Clone)]
pub struct MeasurementGenerator<R = StdRng> {
    rng: R,
}

impl MeasurementGenerator<StdRng> {
    /// Create a generator seeded from `seed`, or from OS entropy when `None`
    ///
    /// # Example
    /// ```
    /// use telemsim_core::{Configuration, MeasurementGenerator, SignalState};
    ///
    /// let config = Configuration::default();
    /// let mut state = SignalState::new(&config);
    /// let mut gen = MeasurementGenerator::seeded(Some(42));
    /// let measurement = gen.generate(0, &config, &mut state);
    /// assert!(!measurement.measured_values.is_empty());
    /// ```
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl<R: Rng> MeasurementGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Produce a measurement with `id`, advancing `state`
    pub fn generate(
        &mut self,
        id: u64,
        config: &Configuration,
        state: &mut SignalState,
    ) -> Measurement {
        let count = self.rng.gen_range(1..=crate::MAX_VALUES_PER_MEASUREMENT);
        let measured_values = (0..count)
            .map(|_| state.step(config, &mut self.rng))
            .collect();

        // Millisecond precision, matching the wire and store format
        Measurement {
            id,
            timestamp: Utc::now().trunc_subsecs(3),
            measured_values,
        }
    }
}

impl Default for MeasurementGenerator<StdRng> {
    fn default() -> Self {
        Self::seeded(None)
    }
}
