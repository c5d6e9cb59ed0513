//! Bounded random walk trackers
//!
//! Four running values (positive/negative voltage and current) move by a
//! uniform perturbation on every step and are clamped to their legal range.
//! Negative trackers live in the mirrored range `[-max, -min]`.

use super::MeasuredValue;
use crate::config::Configuration;
use rand::Rng;

/// Last value of each simulated signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalState {
    pos_voltage: f64,
    pos_current: f64,
    neg_voltage: f64,
    neg_current: f64,
}

impl SignalState {
    /// Start every tracker at the midpoint of its range
    pub fn new(config: &Configuration) -> Self {
        let mid_voltage = (config.min_voltage + config.max_voltage) / 2.0;
        let mid_current = (config.min_current + config.max_current) / 2.0;
        Self {
            pos_voltage: mid_voltage,
            pos_current: mid_current,
            neg_voltage: -mid_voltage,
            neg_current: -mid_current,
        }
    }

    /// Advance the trackers included by `config` and read them out
    ///
    /// Excluded trackers keep their last value and report `None`.
    /// Trackers are clamped before rounding, so with fractional bounds a
    /// reported integer can fall just outside `[min, max]`: a tracker pinned
    /// at 0.5 in `[0, 0.5]` reports 1.
    pub fn step<R: Rng>(&mut self, config: &Configuration, rng: &mut R) -> MeasuredValue {
        let mut value = MeasuredValue::default();
        let mode = config.measurement_values;
        let bipolar = config.is_bipolar();
        let voltage_step = config.max_voltage_step();
        let current_step = config.max_current_step();

        if mode.includes_voltage() {
            self.pos_voltage = walk(
                self.pos_voltage,
                voltage_step,
                config.min_voltage,
                config.max_voltage,
                rng,
            );
            value.pos_voltage = Some(round_half_up(self.pos_voltage));
        }

        if mode.includes_current() {
            self.pos_current = walk(
                self.pos_current,
                current_step,
                config.min_current,
                config.max_current,
                rng,
            );
            value.pos_current = Some(round_half_up(self.pos_current));
        }

        if bipolar && mode.includes_voltage() {
            self.neg_voltage = walk(
                self.neg_voltage,
                voltage_step,
                -config.max_voltage,
                -config.min_voltage,
                rng,
            );
            value.neg_voltage = Some(round_half_up(self.neg_voltage));
        }

        if bipolar && mode.includes_current() {
            self.neg_current = walk(
                self.neg_current,
                current_step,
                -config.max_current,
                -config.min_current,
                rng,
            );
            value.neg_current = Some(round_half_up(self.neg_current));
        }

        value
    }

    pub fn pos_voltage(&self) -> f64 {
        self.pos_voltage
    }

    pub fn pos_current(&self) -> f64 {
        self.pos_current
    }

    pub fn neg_voltage(&self) -> f64 {
        self.neg_voltage
    }

    pub fn neg_current(&self) -> f64 {
        self.neg_current
    }
}

/// One random walk step: `last + U[-step, step]`, clamped to `[lo, hi]`
fn walk<R: Rng>(last: f64, step: f64, lo: f64, hi: f64, rng: &mut R) -> f64 {
    let delta = rng.gen_range(-step..=step);
    (last + delta).clamp(lo, hi)
}

/// Round to the nearest integer, ties toward positive infinity
///
/// Applied after clamping, so the result may exceed a fractional bound by
/// up to one half.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MeasurementValues, Polarity};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_initial_midpoints() {
        let state = SignalState::new(&Configuration::default());
        assert_relative_eq!(state.pos_voltage(), 550.0);
        assert_relative_eq!(state.pos_current(), 12.5);
        assert_relative_eq!(state.neg_voltage(), -550.0);
        assert_relative_eq!(state.neg_current(), -12.5);
    }

    #[test]
    fn test_step_stays_in_range() {
        // Narrow range so the walk hits both bounds often
        let config = Configuration {
            min_voltage: 10.0,
            max_voltage: 12.0,
            min_current: 1.0,
            max_current: 2.0,
            ..Default::default()
        };
        let mut state = SignalState::new(&config);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..5000 {
            let value = state.step(&config, &mut rng);
            assert!((10.0..=12.0).contains(&state.pos_voltage()));
            assert!((1.0..=2.0).contains(&state.pos_current()));
            assert!((-12.0..=-10.0).contains(&state.neg_voltage()));
            assert!((-2.0..=-1.0).contains(&state.neg_current()));

            let pv = value.pos_voltage.unwrap();
            let nv = value.neg_voltage.unwrap();
            assert!((10..=12).contains(&pv));
            assert!((-12..=-10).contains(&nv));
        }
    }

    #[test]
    fn test_step_is_bounded_by_max_step() {
        let config = Configuration::default();
        let mut state = SignalState::new(&config);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..1000 {
            let before = state.clone();
            state.step(&config, &mut rng);
            assert!((state.pos_voltage() - before.pos_voltage()).abs() <= 45.0 + 1e-9);
            assert!((state.pos_current() - before.pos_current()).abs() <= 1.5 + 1e-9);
            assert!((state.neg_voltage() - before.neg_voltage()).abs() <= 45.0 + 1e-9);
            assert!((state.neg_current() - before.neg_current()).abs() <= 1.5 + 1e-9);
        }
    }

    #[test]
    fn test_unipolar_leaves_negative_trackers() {
        let config = Configuration {
            polarity: Polarity::Unipolar,
            ..Default::default()
        };
        let mut state = SignalState::new(&config);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let value = state.step(&config, &mut rng);
            assert!(value.neg_voltage.is_none());
            assert!(value.neg_current.is_none());
            assert!(value.pos_voltage.is_some());
            assert!(value.pos_current.is_some());
        }
        assert_relative_eq!(state.neg_voltage(), -550.0);
        assert_relative_eq!(state.neg_current(), -12.5);
    }

    #[test]
    fn test_voltage_mode_skips_current() {
        let config = Configuration {
            measurement_values: MeasurementValues::Voltage,
            ..Default::default()
        };
        let mut state = SignalState::new(&config);
        let mut rng = StdRng::seed_from_u64(5);

        let value = state.step(&config, &mut rng);
        assert!(value.pos_current.is_none());
        assert!(value.neg_current.is_none());
        assert!(value.pos_voltage.is_some());
        assert!(value.neg_voltage.is_some());
        assert_relative_eq!(state.pos_current(), 12.5);
    }

    #[test]
    fn test_fractional_bound_rounds_past_max() {
        let config = Configuration {
            min_current: 0.0,
            max_current: 0.5,
            measurement_values: MeasurementValues::Current,
            polarity: Polarity::Unipolar,
            ..Default::default()
        };
        let mut state = SignalState::new(&config);
        let mut rng = StdRng::seed_from_u64(19);

        let mut saw_one = false;
        for _ in 0..2000 {
            let reported = state.step(&config, &mut rng).pos_current.unwrap();
            assert!((0.0..=0.5).contains(&state.pos_current()));
            assert!((0..=1).contains(&reported));
            saw_one |= reported == 1;
        }
        assert!(saw_one, "tracker near 0.5 should report 1");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.51), -3);
        assert_eq!(round_half_up(-100.0), -100);
    }
}
