//! Consecutive-exceedance alerting.
//!
//! Each city carries a counter of back-to-back readings strictly above the
//! threshold. The alert fires once, on the reading that brings the counter to
//! `trigger_length`. Further hot readings keep the city escalated without
//! firing again; any reading at or below the threshold resets the counter and
//! re-arms the alert.
//!
//! State lives only in this struct. It is not persisted and starts empty on
//! every process start.

use std::collections::HashMap;

// ---

/// Outcome of feeding one reading to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// At or below threshold; the counter is 0.
    Normal,
    /// Above threshold, but either short of the trigger length or already
    /// alerted for this run.
    Escalating { count: u32 },
    /// This reading completed the run. The caller should notify.
    Triggered { count: u32 },
}

impl AlertDecision {
    pub fn is_triggered(&self) -> bool {
        matches!(self, AlertDecision::Triggered { .. })
    }
}

/// Per-city consecutive-exceedance counters.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    // ---
    threshold_k: f64,
    trigger_length: u32,
    counts: HashMap<String, u32>,
}

impl AlertEngine {
    // ---
    /// `threshold_k` is in Kelvin. A `trigger_length` of 0 is treated as 1.
    pub fn new(threshold_k: f64, trigger_length: u32) -> Self {
        // ---
        Self {
            threshold_k,
            trigger_length: trigger_length.max(1),
            counts: HashMap::new(),
        }
    }

    pub fn threshold_k(&self) -> f64 {
        self.threshold_k
    }

    pub fn trigger_length(&self) -> u32 {
        self.trigger_length
    }

    /// Current consecutive count for `city` (0 if never seen).
    pub fn count(&self, city: &str) -> u32 {
        self.counts.get(city).copied().unwrap_or(0)
    }

    /// Record one Kelvin reading for `city` and report the transition.
    pub fn observe(&mut self, city: &str, temp_k: f64) -> AlertDecision {
        // ---
        if temp_k <= self.threshold_k {
            self.counts.insert(city.to_string(), 0);
            return AlertDecision::Normal;
        }

        let count = self.counts.entry(city.to_string()).or_insert(0);
        *count = count.saturating_add(1);

        if *count == self.trigger_length {
            AlertDecision::Triggered { count: *count }
        } else {
            AlertDecision::Escalating { count: *count }
        }
    }
}
