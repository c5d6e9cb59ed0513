//! Poll-driven readiness gate
//!
//! The gate advances once per status poll, not on a clock. With
//! `interval = 3` every third poll marks new data as ready, so the sample
//! rate follows the client's polling rate.

/// Counter-based rate gate
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    timer: u32,
    interval: u32,
    ready: bool,
}

impl ReadinessGate {
    /// Create a gate that opens every `interval` ticks (at least 1)
    pub fn new(interval: u32) -> Self {
        Self {
            timer: 0,
            interval: interval.max(1),
            ready: false,
        }
    }

    /// Advance the counter and return the new readiness
    pub fn tick(&mut self) -> bool {
        self.timer += 1;
        if self.timer >= self.interval {
            self.ready = true;
            self.timer = 0;
        } else {
            self.ready = false;
        }
        self.ready
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Take the ready flag, leaving the gate closed
    pub fn consume(&mut self) -> bool {
        std::mem::take(&mut self.ready)
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new(crate::DEFAULT_READINESS_INTERVAL)
    }
}
