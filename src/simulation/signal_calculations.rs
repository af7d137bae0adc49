//! Radio signal unit algebra and free-space calculations.
//!
//! Contains helpers for:
//! - Power in mW / dBm / W / dBW and linear power coefficients in dB
//! - Material absorption expressed as an exponential `alpha` per meter
//! - Antenna gain in dBi / dBd
//! - Friis free-space loss used by every propagation engine
//!
//! Units:
//! - Distance: meters (`f64`) everywhere in the simulation
//! - Frequency: stored as a wavelength in meters

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Sub};

/// Speed of light expressed in meters times GHz (λ[m] = C / f[GHz]).
const SPEED_OF_LIGHT_M_GHZ: f64 = 0.299792458;

/// Linear gain of a half-wave dipole relative to an isotropic radiator (2.15 dB).
const DIPOLE_GAIN: f64 = 1.64;

/// Carrier frequency, stored as its wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    wavelength: f64,
}

impl Frequency {
    pub fn from_ghz(ghz: f64) -> Self {
        Self {
            wavelength: SPEED_OF_LIGHT_M_GHZ / ghz,
        }
    }

    pub fn from_wavelength(meters: f64) -> Self {
        Self { wavelength: meters }
    }

    /// Wavelength in meters.
    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn ghz(&self) -> f64 {
        SPEED_OF_LIGHT_M_GHZ / self.wavelength
    }
}

/// Dimensionless linear power multiplier (1.0 = no change).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct PowerCoefficient(pub f64);

impl PowerCoefficient {
    pub const ZERO: PowerCoefficient = PowerCoefficient(0.0);
    pub const ONE: PowerCoefficient = PowerCoefficient(1.0);

    pub fn from_db(db: f64) -> Self {
        Self(10f64.powf(db / 10.0))
    }

    pub fn linear(&self) -> f64 {
        self.0
    }

    /// Coefficient in dB. A zero coefficient yields `-inf`.
    pub fn db(&self) -> f64 {
        10.0 * self.0.log10()
    }
}

impl Mul for PowerCoefficient {
    type Output = PowerCoefficient;

    fn mul(self, rhs: PowerCoefficient) -> PowerCoefficient {
        PowerCoefficient(self.0 * rhs.0)
    }
}

/// Absolute power, stored in milliwatts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Power {
    milliwatts: f64,
}

impl Power {
    pub const ZERO: Power = Power { milliwatts: 0.0 };

    pub fn from_milliwatts(milliwatts: f64) -> Self {
        Self { milliwatts }
    }

    pub fn from_watts(watts: f64) -> Self {
        Self { milliwatts: watts * 1000.0 }
    }

    pub fn from_dbm(dbm: f64) -> Self {
        Self {
            milliwatts: dbm_to_mw(dbm),
        }
    }

    pub fn from_dbw(dbw: f64) -> Self {
        Self::from_dbm(dbw + 30.0)
    }

    pub fn milliwatts(&self) -> f64 {
        self.milliwatts
    }

    pub fn watts(&self) -> f64 {
        self.milliwatts / 1000.0
    }

    pub fn dbm(&self) -> f64 {
        mw_to_dbm(self.milliwatts)
    }

    pub fn dbw(&self) -> f64 {
        self.dbm() - 30.0
    }
}

impl Mul<PowerCoefficient> for Power {
    type Output = Power;

    fn mul(self, rhs: PowerCoefficient) -> Power {
        Power {
            milliwatts: self.milliwatts * rhs.0,
        }
    }
}

impl Mul<AntennaGain> for Power {
    type Output = Power;

    fn mul(self, rhs: AntennaGain) -> Power {
        Power {
            milliwatts: self.milliwatts * rhs.linear(),
        }
    }
}

impl Div for Power {
    type Output = PowerCoefficient;

    fn div(self, rhs: Power) -> PowerCoefficient {
        PowerCoefficient(self.milliwatts / rhs.milliwatts)
    }
}

/// Material absorption in the exponential form `coefficient = exp(-alpha * thickness)`.
///
/// `alpha` is expressed per meter. Values from several obstacles along the same path add up, which
/// is the same as multiplying their linear coefficients.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct AbsorptionCoefficient {
    alpha: f64,
}

impl AbsorptionCoefficient {
    pub const NONE: AbsorptionCoefficient = AbsorptionCoefficient { alpha: 0.0 };

    pub fn from_alpha(alpha: f64) -> Self {
        Self { alpha }
    }

    /// Build from a loss in dB measured over `thickness` meters of material.
    ///
    /// # Examples
    ///
    /// ```text
    /// from_db(-3.0, 0.1)   → half of the power survives 10 cm of material
    /// from_db(-10.0, 0.2)  → a tenth survives 20 cm
    /// ```
    pub fn from_db(db: f64, thickness: f64) -> Self {
        Self::from_coefficient(10f64.powf(db / 10.0), thickness)
    }

    /// Build from the linear coefficient measured over `thickness` meters of material.
    pub fn from_coefficient(coefficient: f64, thickness: f64) -> Self {
        Self {
            alpha: -coefficient.ln() / thickness,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Linear coefficient after travelling `distance` meters.
    pub fn coefficient(&self, distance: f64) -> PowerCoefficient {
        PowerCoefficient((-self.alpha * distance).exp())
    }

    pub fn db(&self, distance: f64) -> f64 {
        self.coefficient(distance).db()
    }

    /// Whether this absorption changes the power at all.
    pub fn affects(&self) -> bool {
        self.alpha != 0.0
    }

    /// Negative alpha (a net "exit" without matching entry) carries no physical meaning.
    pub fn clamped(self) -> Self {
        Self { alpha: self.alpha.max(0.0) }
    }
}

impl Add for AbsorptionCoefficient {
    type Output = AbsorptionCoefficient;

    fn add(self, rhs: AbsorptionCoefficient) -> AbsorptionCoefficient {
        AbsorptionCoefficient { alpha: self.alpha + rhs.alpha }
    }
}

impl Sub for AbsorptionCoefficient {
    type Output = AbsorptionCoefficient;

    fn sub(self, rhs: AbsorptionCoefficient) -> AbsorptionCoefficient {
        AbsorptionCoefficient { alpha: self.alpha - rhs.alpha }
    }
}

impl Mul<f64> for AbsorptionCoefficient {
    type Output = AbsorptionCoefficient;

    fn mul(self, by: f64) -> AbsorptionCoefficient {
        AbsorptionCoefficient { alpha: self.alpha * by }
    }
}

/// Linear antenna gain relative to an isotropic radiator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntennaGain(f64);

impl Default for AntennaGain {
    fn default() -> Self {
        AntennaGain(1.0)
    }
}

impl AntennaGain {
    pub fn from_dbi(dbi: f64) -> Self {
        Self(10f64.powf(dbi / 10.0))
    }

    /// Gain relative to a half-wave dipole.
    pub fn from_dbd(dbd: f64) -> Self {
        Self(10f64.powf(dbd / 10.0) * DIPOLE_GAIN)
    }

    pub fn linear(&self) -> f64 {
        self.0
    }

    pub fn dbi(&self) -> f64 {
        10.0 * self.0.log10()
    }

    pub fn dbd(&self) -> f64 {
        10.0 * (self.0 / DIPOLE_GAIN).log10()
    }
}

/// Friis free-space power coefficient between isotropic antennas.
///
/// # Formula
///
/// ```text
/// FSPL(d) = (λ / (4π d))²
/// ```
///
/// # Returns
///
/// The linear coefficient, capped at 1.0. The far-field formula diverges next to the antenna, so
/// distances below `λ / 4π` (and `d <= 0`) report no loss at all.
pub fn free_space_coefficient(frequency: Frequency, distance: f64) -> PowerCoefficient {
    if distance <= 0.0 {
        return PowerCoefficient::ONE;
    }
    let ratio = frequency.wavelength() / (4.0 * PI * distance);
    PowerCoefficient((ratio * ratio).min(1.0))
}

/// Convert power from dBm (decibels relative to 1 milliwatt) to milliwatts.
///
/// # Formula
///
/// ```text
/// P(mW) = 10^(P(dBm) / 10)
/// ```
///
/// # Examples
///
/// ```text
/// 0 dBm   → 1 mW
/// 20 dBm  → 100 mW
/// -10 dBm → 0.1 mW
/// ```
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Convert power from milliwatts to dBm.
///
/// For `mw <= 0` this returns `-inf` or NaN; callers only pass positive powers.
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}
