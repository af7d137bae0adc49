//! Type definitions shared by the propagation engines.
//!
//! Contains:
//! - Materials (reflection and absorption per frequency)
//! - Transmitter and receiver descriptors
//! - The link budget that turns a minimum useful power into a coefficient floor
//! - Configuration errors raised when a value is physically invalid

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::signal_calculations::{AbsorptionCoefficient, AntennaGain, Frequency, Power, PowerCoefficient};

/// Physically invalid construction parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("precision must be a positive distance, got {0}")]
    InvalidPrecision(f64),
    #[error("surface {width} x {height} must have a positive area")]
    EmptySurface { width: f64, height: f64 },
    #[error("surface {width} x {height} at precision {precision} exceeds the grid index range")]
    GridTooLarge { width: f64, height: f64, precision: f64 },
    #[error("wavelength must be positive, got {0}")]
    InvalidFrequency(f64),
    #[error("reflection coefficient must be within [0, 1], got {0}")]
    InvalidReflection(f64),
    #[error("absorption alpha must be non-negative, got {0}")]
    InvalidAbsorption(f64),
    #[error("{name} must be a positive power, got {milliwatts} mW")]
    InvalidPower { name: &'static str, milliwatts: f64 },
    #[error("rays count must be at least 1")]
    NoRays,
    #[error("turn penalty must be within (0, 1] linear (<= 0 dB), got {0}")]
    InvalidTurnPenalty(f64),
}

/// Material with frequency-independent reflection and absorption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    reflection: PowerCoefficient,
    absorption: AbsorptionCoefficient,
}

impl Material {
    /// # Parameters
    ///
    /// * `reflection` - Linear coefficient applied to reflected power, within `[0, 1]`
    /// * `absorption` - Absorption per meter of material, `alpha >= 0`
    pub fn new(reflection: PowerCoefficient, absorption: AbsorptionCoefficient) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&reflection.linear()) {
            return Err(ConfigError::InvalidReflection(reflection.linear()));
        }
        if !(absorption.alpha() >= 0.0) || !absorption.alpha().is_finite() {
            return Err(ConfigError::InvalidAbsorption(absorption.alpha()));
        }
        Ok(Self { reflection, absorption })
    }

    pub fn reflection(&self, _frequency: Frequency) -> PowerCoefficient {
        self.reflection
    }

    pub fn absorption(&self, _frequency: Frequency) -> AbsorptionCoefficient {
        self.absorption
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    pub power: Power,
    pub antenna_gain: AntennaGain,
}

impl Transmitter {
    pub fn new(power: Power, antenna_gain: AntennaGain) -> Self {
        Self { power, antenna_gain }
    }

    /// Effective isotropic radiated power.
    pub fn eirp(&self) -> Power {
        self.power * self.antenna_gain
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Receiver {
    pub antenna_gain: AntennaGain,
}

impl Receiver {
    pub fn new(antenna_gain: AntennaGain) -> Self {
        Self { antenna_gain }
    }
}

/// Strongest expected hardware plus the weakest power worth mapping.
///
/// Engines stop following energy once it drops below what even the best transmitter/receiver pair
/// would turn into `minimum_power`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkBudget {
    pub best_transmitter: Transmitter,
    pub best_receiver: Receiver,
    pub minimum_power: Power,
}

impl LinkBudget {
    pub fn new(best_transmitter: Transmitter, best_receiver: Receiver, minimum_power: Power) -> Result<Self, ConfigError> {
        let tx = best_transmitter.power.milliwatts();
        if !(tx > 0.0) || !tx.is_finite() {
            return Err(ConfigError::InvalidPower {
                name: "best transmitter power",
                milliwatts: tx,
            });
        }
        let min = minimum_power.milliwatts();
        if !(min >= 0.0) || !min.is_finite() {
            return Err(ConfigError::InvalidPower {
                name: "minimum power",
                milliwatts: min,
            });
        }
        Ok(Self {
            best_transmitter,
            best_receiver,
            minimum_power,
        })
    }

    /// Coefficient floor: `P_min / (P_tx * G_tx * G_rx)`.
    pub fn minimum_coefficient(&self) -> PowerCoefficient {
        self.minimum_power / (self.best_transmitter.eirp() * self.best_receiver.antenna_gain)
    }
}
