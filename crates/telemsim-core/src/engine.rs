//! Simulation engine
//!
//! [`Simulator`] owns every piece of mutable state: configuration, random
//! walk trackers, readiness gate, buffer, identifier allocator, and the
//! backing store. Callers that share it across threads must serialize
//! access to it as a whole (the server runs it on a dedicated thread).

use crate::config::{ConfigPatch, ConfigStore, Configuration, Polarity};
use crate::error::Result;
use crate::gate::ReadinessGate;
use crate::measurement::buffer::{IdAllocator, MeasurementBuffer};
use crate::measurement::generator::MeasurementGenerator;
use crate::measurement::signal::SignalState;
use crate::measurement::Measurement;
use crate::persistence::MeasurementStore;
use serde::Serialize;

/// Status poll result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    pub used_polarity: Polarity,
    pub new_data_ready: bool,
}

/// Startup options for a [`Simulator`]
#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
    /// Status polls per admitted sample
    pub readiness_interval: u32,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            seed: None,
            readiness_interval: crate::DEFAULT_READINESS_INTERVAL,
        }
    }
}

/// Measurement generation and buffering engine
pub struct Simulator {
    config: ConfigStore,
    signal: SignalState,
    gate: ReadinessGate,
    buffer: MeasurementBuffer,
    ids: IdAllocator,
    generator: MeasurementGenerator,
    store: Box<dyn MeasurementStore>,
}

impl Simulator {
    /// Build an engine from a startup configuration and a store
    ///
    /// The persisted polarity and measurement mode, buffer contents, and
    /// identifier sequence are restored from `store`. Ranges and buffer
    /// size always come from `config`.
    pub fn new(
        config: Configuration,
        store: Box<dyn MeasurementStore>,
        options: SimulatorOptions,
    ) -> Result<Self> {
        let mut config = ConfigStore::new(config)?;
        if let Some(persisted) = store.load_configuration()? {
            config.update(&ConfigPatch {
                polarity: Some(persisted.polarity.as_str().into()),
                measurement_values: Some(persisted.measurement_values.as_str().into()),
            });
        }

        let capacity = config.get().buffer_size;
        let mut buffer = MeasurementBuffer::with_capacity(capacity);
        for measurement in store.recent(capacity)? {
            buffer.append(measurement);
        }

        let mut ids = IdAllocator::new();
        ids.resume_from(store.next_id()?);

        tracing::info!(
            store = store.kind(),
            restored = buffer.len(),
            next_id = ids.peek(),
            polarity = %config.get().polarity,
            measurement_values = %config.get().measurement_values,
            "Simulator initialized"
        );

        Ok(Self {
            signal: SignalState::new(config.get()),
            config,
            gate: ReadinessGate::new(options.readiness_interval),
            buffer,
            ids,
            generator: MeasurementGenerator::seeded(options.seed),
            store,
        })
    }

    /// Current configuration
    pub fn configuration(&self) -> &Configuration {
        self.config.get()
    }

    /// Merge `patch` and persist the result if anything changed
    pub fn update_configuration(&mut self, patch: &ConfigPatch) -> Result<Configuration> {
        let before = self.config.get().clone();
        let updated = self.config.update(patch);
        if updated != before {
            if let Err(e) = self.store.save_configuration(&updated) {
                self.config = ConfigStore::new(before)?;
                tracing::error!(error = %e, "Failed to persist configuration");
                return Err(e);
            }
            tracing::info!(
                polarity = %updated.polarity,
                measurement_values = %updated.measurement_values,
                "Configuration updated"
            );
        }
        Ok(updated)
    }

    /// Advance the readiness gate (one status poll)
    pub fn tick(&mut self) -> Status {
        let new_data_ready = self.gate.tick();
        Status {
            used_polarity: self.config.get().polarity,
            new_data_ready,
        }
    }

    /// Generate, persist, and buffer one measurement if the gate is open
    ///
    /// If the store rejects the measurement the buffer is untouched, the
    /// identifier is not consumed, the trackers are restored, and the gate
    /// stays open.
    pub fn maybe_generate_and_store(&mut self) -> Result<Option<Measurement>> {
        if !self.gate.is_ready() {
            return Ok(None);
        }

        let id = self.ids.peek();
        let signal_before = self.signal.clone();
        let measurement = self
            .generator
            .generate(id, self.config.get(), &mut self.signal);

        if let Err(e) = self.store.insert(&measurement) {
            self.signal = signal_before;
            tracing::error!(id, error = %e, "Failed to persist measurement");
            return Err(e);
        }

        self.ids.next();
        self.gate.consume();
        self.buffer.append(measurement.clone());
        tracing::debug!(
            id,
            values = measurement.measured_values.len(),
            buffered = self.buffer.len(),
            "Generated measurement"
        );
        Ok(Some(measurement))
    }

    /// Buffered measurements, oldest first
    pub fn measurements(&self) -> Vec<Measurement> {
        self.buffer.snapshot()
    }

    /// Empty the buffer and the store, and restart identifiers at 0
    ///
    /// Random walk trackers keep their values.
    pub fn clear_measurements(&mut self) -> Result<()> {
        self.store.clear()?;
        self.buffer.clear();
        self.ids.reset();
        tracing::info!("Measurements cleared");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn signal(&self) -> &SignalState {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeasurementValues;
    use crate::error::SimError;
    use crate::persistence::MemoryStore;
    use serde_json::json;

    fn simulator(config: Configuration) -> Simulator {
        Simulator::new(
            config,
            Box::new(MemoryStore::new()),
            SimulatorOptions {
                seed: Some(17),
                ..Default::default()
            },
        )
        .unwrap()
    }

    /// Poll status until the gate opens, then request measurements
    fn poll_cycle(sim: &mut Simulator) -> Option<Measurement> {
        while !sim.tick().new_data_ready {}
        sim.maybe_generate_and_store().unwrap()
    }

    /// Store that fails every write
    struct BrokenStore;

    impl MeasurementStore for BrokenStore {
        fn insert(&mut self, _: &Measurement) -> Result<()> {
            Err(SimError::Storage("disk full".to_string()))
        }
        fn recent(&self, _: usize) -> Result<Vec<Measurement>> {
            Ok(Vec::new())
        }
        fn clear(&mut self) -> Result<()> {
            Err(SimError::Storage("disk full".to_string()))
        }
        fn save_configuration(&mut self, _: &Configuration) -> Result<()> {
            Err(SimError::Storage("disk full".to_string()))
        }
        fn load_configuration(&self) -> Result<Option<Configuration>> {
            Ok(None)
        }
        fn next_id(&self) -> Result<u64> {
            Ok(0)
        }
        fn kind(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let config = Configuration {
            buffer_size: 0,
            ..Default::default()
        };
        let result = Simulator::new(config, Box::new(MemoryStore::new()), Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_no_generation_until_ready() {
        let mut sim = simulator(Configuration::default());
        assert!(sim.maybe_generate_and_store().unwrap().is_none());
        sim.tick();
        sim.tick();
        assert!(sim.maybe_generate_and_store().unwrap().is_none());
        assert!(sim.measurements().is_empty());
    }

    #[test]
    fn test_one_measurement_per_pulse() {
        let mut sim = simulator(Configuration::default());
        sim.tick();
        sim.tick();
        assert!(sim.tick().new_data_ready);

        assert!(sim.maybe_generate_and_store().unwrap().is_some());
        assert!(sim.maybe_generate_and_store().unwrap().is_none());
        assert_eq!(sim.measurements().len(), 1);
    }

    #[test]
    fn test_status_reports_polarity() {
        let mut sim = simulator(Configuration::default());
        assert_eq!(sim.tick().used_polarity, Polarity::Bipolar);
        sim.update_configuration(&serde_json::from_value(json!({"Polarity": "unipolar"})).unwrap())
            .unwrap();
        assert_eq!(sim.tick().used_polarity, Polarity::Unipolar);
    }

    #[test]
    fn test_status_wire_format() {
        let status = Status {
            used_polarity: Polarity::Bipolar,
            new_data_ready: true,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json, json!({"UsedPolarity": "bipolar", "NewDataReady": true}));
    }

    #[test]
    fn test_buffer_keeps_latest() {
        let mut sim = simulator(Configuration {
            buffer_size: 3,
            ..Default::default()
        });
        for _ in 0..4 {
            poll_cycle(&mut sim);
        }
        let ids: Vec<u64> = sim.measurements().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut sim = simulator(Configuration::default());
        poll_cycle(&mut sim);
        poll_cycle(&mut sim);
        sim.clear_measurements().unwrap();
        assert!(sim.measurements().is_empty());

        let next = poll_cycle(&mut sim).unwrap();
        assert_eq!(next.id, 0);
    }

    #[test]
    fn test_clear_keeps_signal_state() {
        let mut sim = simulator(Configuration::default());
        for _ in 0..5 {
            poll_cycle(&mut sim);
        }
        let before = sim.signal().clone();
        sim.clear_measurements().unwrap();
        assert_eq!(sim.signal(), &before);
    }

    #[test]
    fn test_mode_change_applies_to_next_measurement() {
        let mut sim = simulator(Configuration::default());
        sim.update_configuration(
            &serde_json::from_value(json!({"MeasurementValues": "voltage"})).unwrap(),
        )
        .unwrap();
        assert_eq!(
            sim.configuration().measurement_values,
            MeasurementValues::Voltage
        );

        let m = poll_cycle(&mut sim).unwrap();
        for value in m.measured_values {
            assert!(value.pos_current.is_none());
            assert!(value.neg_current.is_none());
        }
    }

    #[test]
    fn test_store_failure_leaves_state() {
        let mut sim = Simulator::new(
            Configuration::default(),
            Box::new(BrokenStore),
            Default::default(),
        )
        .unwrap();
        sim.tick();
        sim.tick();
        sim.tick();
        let signal = sim.signal().clone();

        assert!(sim.maybe_generate_and_store().is_err());
        assert!(sim.measurements().is_empty());
        assert!(sim.is_ready(), "gate stays open after a failed write");
        assert_eq!(sim.signal(), &signal);

        // Retrying fails the same way without drifting the walk
        assert!(sim.maybe_generate_and_store().is_err());
        assert_eq!(sim.signal(), &signal);
    }

    #[test]
    fn test_config_persist_failure_rolls_back() {
        let mut sim = Simulator::new(
            Configuration::default(),
            Box::new(BrokenStore),
            Default::default(),
        )
        .unwrap();
        let patch = serde_json::from_value(json!({"Polarity": "unipolar"})).unwrap();
        assert!(sim.update_configuration(&patch).is_err());
        assert_eq!(sim.configuration().polarity, Polarity::Bipolar);

        // Nothing to persist, so no error
        assert!(sim.update_configuration(&ConfigPatch::default()).is_ok());
    }

    #[test]
    fn test_restores_from_store() {
        let mut store = MemoryStore::new();
        let mut source = simulator(Configuration::default());
        for _ in 0..3 {
            let m = poll_cycle(&mut source).unwrap();
            store.insert(&m).unwrap();
        }
        store
            .save_configuration(&Configuration {
                polarity: Polarity::Unipolar,
                buffer_size: 99,
                ..Default::default()
            })
            .unwrap();

        let mut sim = Simulator::new(
            Configuration {
                buffer_size: 2,
                ..Default::default()
            },
            Box::new(store),
            Default::default(),
        )
        .unwrap();

        assert_eq!(sim.configuration().polarity, Polarity::Unipolar);
        assert_eq!(sim.configuration().buffer_size, 2);
        let ids: Vec<u64> = sim.measurements().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(poll_cycle(&mut sim).unwrap().id, 3);
    }
}
