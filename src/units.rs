//! Temperature display scales.
//!
//! Readings are stored and compared in Kelvin; conversion only happens at the
//! edges (console output, alert email, and the configured alert threshold).

use std::fmt;

const KELVIN_OFFSET: f64 = 273.15;

// ---

/// Temperature unit used for human-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempScale {
    Celsius,
    Fahrenheit,
    #[default]
    Kelvin,
}

impl TempScale {
    // ---
    /// Resolve a configured scale name. Anything other than `Celsius` or
    /// `Fahrenheit` falls back to Kelvin passthrough.
    pub fn from_name(name: &str) -> Self {
        // ---
        match name {
            "Celsius" => TempScale::Celsius,
            "Fahrenheit" => TempScale::Fahrenheit,
            _ => TempScale::Kelvin,
        }
    }

    /// Convert a Kelvin value to this scale.
    pub fn convert(self, kelvin: f64) -> f64 {
        // ---
        match self {
            TempScale::Celsius => kelvin_to_celsius(kelvin),
            TempScale::Fahrenheit => kelvin_to_fahrenheit(kelvin),
            TempScale::Kelvin => kelvin,
        }
    }

    /// Inverse of [`TempScale::convert`].
    pub fn to_kelvin(self, value: f64) -> f64 {
        // ---
        match self {
            TempScale::Celsius => value + KELVIN_OFFSET,
            TempScale::Fahrenheit => (value - 32.0) * 5.0 / 9.0 + KELVIN_OFFSET,
            TempScale::Kelvin => value,
        }
    }

    pub fn name(self) -> &'static str {
        // ---
        match self {
            TempScale::Celsius => "Celsius",
            TempScale::Fahrenheit => "Fahrenheit",
            TempScale::Kelvin => "Kelvin",
        }
    }
}

impl fmt::Display for TempScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0
}
