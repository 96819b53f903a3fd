#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Collider luminosity with crossing-angle and hourglass corrections.
//!
//! The luminosity is the integral over the longitudinal position `s` of the
//! overlap density of two Gaussian bunches whose transverse sizes grow away
//! from the focus. Scans sweep one collision parameter across its range while
//! holding the others fixed.

use std::{f64::consts::PI, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower bound of the longitudinal integration window in metres.
pub const INTEGRATION_START: f64 = -10.0;

/// Upper bound of the longitudinal integration window in metres.
pub const INTEGRATION_END: f64 = 10.0;

/// Number of Simpson intervals used for the luminosity integral.
pub const INTEGRATION_INTERVALS: usize = 400;

/// Number of intervals a scan divides its parameter range into.
pub const SCAN_INTERVALS: usize = 100;

/// Converts m⁻² s⁻¹ to cm⁻² s⁻¹.
const SQUARE_METRES_TO_SQUARE_CENTIMETRES: f64 = 1.0 / (100.0 * 100.0);

/// Errors raised when collision parameters cannot describe a beam.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LuminosityError {
    /// Beta at the focus must be strictly positive.
    #[error("beta* must be positive (received {value})")]
    NonPositiveBetaStar {
        /// Rejected beta* value.
        value: f64,
    },
    /// Bunch length must be strictly positive.
    #[error("bunch length must be positive (received {value})")]
    NonPositiveBunchLength {
        /// Rejected bunch length.
        value: f64,
    },
    /// Transverse emittance must be strictly positive.
    #[error("emittance must be positive (received {value})")]
    NonPositiveEmittance {
        /// Rejected emittance.
        value: f64,
    },
    /// Simpson's rule needs at least one interval.
    #[error("numerical integration needs at least one interval")]
    NoIntervals,
    /// The scan parameter name is not recognised.
    #[error("unknown scan parameter `{name}`")]
    UnknownScanParameter {
        /// Name that failed to parse.
        name: String,
    },
}

/// Beam and interaction-region parameters of a two-beam collision.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionParams {
    /// Revolution frequency in hertz.
    pub frequency: f64,
    /// Particles per bunch in the first beam.
    pub bunch_population_1: f64,
    /// Particles per bunch in the second beam.
    pub bunch_population_2: f64,
    /// Horizontal geometric emittance in metres.
    pub emittance_x: f64,
    /// Vertical geometric emittance in metres.
    pub emittance_y: f64,
    /// Horizontal beta at the focus in metres.
    pub beta_star_x: f64,
    /// Vertical beta at the focus in metres.
    pub beta_star_y: f64,
    /// Longitudinal offset of the horizontal waist in metres.
    pub waist_x: f64,
    /// Longitudinal offset of the vertical waist in metres.
    pub waist_y: f64,
    /// RMS bunch length in metres.
    pub bunch_length: f64,
    /// Full crossing angle in radians.
    pub crossing_angle: f64,
}

impl CollisionParams {
    /// Rejects parameters that describe no physical beam.
    pub fn validate(&self) -> Result<(), LuminosityError> {
        for value in [self.beta_star_x, self.beta_star_y] {
            if !(value.is_finite() && value > 0.0) {
                return Err(LuminosityError::NonPositiveBetaStar { value });
            }
        }
        if !(self.bunch_length.is_finite() && self.bunch_length > 0.0) {
            return Err(LuminosityError::NonPositiveBunchLength {
                value: self.bunch_length,
            });
        }
        for value in [self.emittance_x, self.emittance_y] {
            if !(value.is_finite() && value > 0.0) {
                return Err(LuminosityError::NonPositiveEmittance { value });
            }
        }
        Ok(())
    }
}

impl Default for CollisionParams {
    fn default() -> Self {
        Self {
            frequency: 78_000.0,
            bunch_population_1: 2e11,
            bunch_population_2: 2e11,
            emittance_x: 1e-7,
            emittance_y: 1e-7,
            beta_star_x: 0.70,
            beta_star_y: 0.70,
            waist_x: 0.0,
            waist_y: 0.0,
            bunch_length: 0.20,
            crossing_angle: 0.002,
        }
    }
}

/// Integrates `f` over `[a, b]` with the composite Simpson rule.
///
/// Odd interval counts are rounded up to the next even count.
pub fn simpson<F>(f: F, a: f64, b: f64, intervals: usize) -> Result<f64, LuminosityError>
where
    F: Fn(f64) -> f64,
{
    if intervals == 0 {
        return Err(LuminosityError::NoIntervals);
    }
    let intervals = intervals + intervals % 2;
    let h = (b - a) / intervals as f64;

    let mut sum = f(a) + f(b);
    for index in 1..intervals {
        let weight = if index % 2 == 0 { 2.0 } else { 4.0 };
        sum += weight * f(a + index as f64 * h);
    }
    Ok(sum * h / 3.0)
}

/// Luminosity density per unit length at longitudinal position `s`, in m⁻³ s⁻¹.
///
/// Callers are expected to pass validated parameters.
#[must_use]
pub fn luminosity_density(params: &CollisionParams, s: f64) -> f64 {
    let beta_x = hourglass_beta(params.beta_star_x, params.waist_x, s);
    let beta_y = hourglass_beta(params.beta_star_y, params.waist_y, s);
    let sigma_x = (params.emittance_x * beta_x).sqrt();
    let sigma_y = (params.emittance_y * beta_y).sqrt();
    let sigma_z = params.bunch_length;

    let (sin_half, cos_half) = (params.crossing_angle / 2.0).sin_cos();
    let transverse = sin_half * sin_half / (sigma_x * sigma_x);
    let longitudinal = cos_half * cos_half / (sigma_z * sigma_z);
    let overlap = (-s * s * (transverse + longitudinal)).exp();
    let denominator = 4.0 * PI.powf(1.5) * sigma_x * sigma_y * sigma_z;

    let rate = params.frequency * params.bunch_population_1 * params.bunch_population_2;
    rate * cos_half * overlap / denominator
}

/// Integrated luminosity in cm⁻² s⁻¹.
pub fn luminosity(params: &CollisionParams) -> Result<f64, LuminosityError> {
    params.validate()?;
    let integral = simpson(
        |s| luminosity_density(params, s),
        INTEGRATION_START,
        INTEGRATION_END,
        INTEGRATION_INTERVALS,
    )?;
    Ok(integral * SQUARE_METRES_TO_SQUARE_CENTIMETRES)
}

fn hourglass_beta(beta_star: f64, waist: f64, s: f64) -> f64 {
    let offset = (s - waist) / beta_star;
    beta_star * (1.0 + offset * offset)
}

/// Collision parameter a scan sweeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanParameter {
    /// Full crossing angle.
    #[default]
    CrossingAngle,
    /// Horizontal beta*.
    BetaStarX,
    /// Vertical beta*.
    BetaStarY,
    /// Horizontal waist offset.
    WaistX,
    /// Vertical waist offset.
    WaistY,
    /// RMS bunch length.
    BunchLength,
}

impl ScanParameter {
    /// Every scannable parameter in display order.
    pub const ALL: [Self; 6] = [
        Self::CrossingAngle,
        Self::BetaStarX,
        Self::BetaStarY,
        Self::WaistX,
        Self::WaistY,
        Self::BunchLength,
    ];

    /// Short name accepted on the command line.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::CrossingAngle => "phi",
            Self::BetaStarX => "bsx",
            Self::BetaStarY => "bsy",
            Self::WaistX => "ssx",
            Self::WaistY => "ssy",
            Self::BunchLength => "sig",
        }
    }

    /// Axis label including units.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CrossingAngle => "crossing angle phi_c (rad)",
            Self::BetaStarX => "beta*_x (m)",
            Self::BetaStarY => "beta*_y (m)",
            Self::WaistX => "s*_x (m)",
            Self::WaistY => "s*_y (m)",
            Self::BunchLength => "sigma_z (m)",
        }
    }

    /// Inclusive range the scan sweeps.
    #[must_use]
    pub const fn range(self) -> (f64, f64) {
        match self {
            Self::CrossingAngle => (0.0, 0.005),
            Self::BetaStarX | Self::BetaStarY => (0.1, 5.0),
            Self::WaistX | Self::WaistY => (-1.0, 1.0),
            Self::BunchLength => (0.05, 1.0),
        }
    }

    /// Current value of this parameter.
    #[must_use]
    pub const fn value(self, params: &CollisionParams) -> f64 {
        match self {
            Self::CrossingAngle => params.crossing_angle,
            Self::BetaStarX => params.beta_star_x,
            Self::BetaStarY => params.beta_star_y,
            Self::WaistX => params.waist_x,
            Self::WaistY => params.waist_y,
            Self::BunchLength => params.bunch_length,
        }
    }

    /// Returns a copy of `params` with this parameter replaced by `value`.
    #[must_use]
    pub fn with_value(self, mut params: CollisionParams, value: f64) -> CollisionParams {
        match self {
            Self::CrossingAngle => params.crossing_angle = value,
            Self::BetaStarX => params.beta_star_x = value,
            Self::BetaStarY => params.beta_star_y = value,
            Self::WaistX => params.waist_x = value,
            Self::WaistY => params.waist_y = value,
            Self::BunchLength => params.bunch_length = value,
        }
        params
    }
}

impl fmt::Display for ScanParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ScanParameter {
    type Err = LuminosityError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|parameter| parameter.key().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| LuminosityError::UnknownScanParameter {
                name: name.to_owned(),
            })
    }
}

/// One evaluated point of a scan.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Value of the scanned parameter.
    pub value: f64,
    /// Luminosity in cm⁻² s⁻¹.
    pub luminosity: f64,
}

/// Luminosity evaluated across the range of one parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LuminosityScan {
    /// Parameter the scan sweeps.
    pub parameter: ScanParameter,
    /// Evaluated points in ascending parameter order.
    pub points: Vec<ScanPoint>,
    /// Current setting of the scanned parameter and its luminosity.
    pub marker: ScanPoint,
}

/// Sweeps `parameter` across its range, holding every other parameter fixed.
pub fn scan(
    params: &CollisionParams,
    parameter: ScanParameter,
) -> Result<LuminosityScan, LuminosityError> {
    let (min, max) = parameter.range();
    let mut points = Vec::with_capacity(SCAN_INTERVALS + 1);
    for index in 0..=SCAN_INTERVALS {
        let value = min + (max - min) * index as f64 / SCAN_INTERVALS as f64;
        points.push(ScanPoint {
            value,
            luminosity: luminosity(&parameter.with_value(*params, value))?,
        });
    }

    let marker = ScanPoint {
        value: parameter.value(params),
        luminosity: luminosity(params)?,
    };

    Ok(LuminosityScan {
        parameter,
        points,
        marker,
    })
}

/// Scans one collision parameter and keeps an optional saved scan for comparison.
///
/// The scan parameter is fixed for the life of a session, so a saved scan
/// always shares its abscissa with the live one. Scanning another parameter
/// takes a new session, which starts with nothing saved.
#[derive(Clone, Debug, Default)]
pub struct ScanSession {
    parameter: ScanParameter,
    saved: Option<LuminosityScan>,
}

impl ScanSession {
    /// Creates a session scanning `parameter` with nothing saved.
    #[must_use]
    pub const fn new(parameter: ScanParameter) -> Self {
        Self {
            parameter,
            saved: None,
        }
    }

    /// Parameter the session currently scans.
    #[must_use]
    pub const fn parameter(&self) -> ScanParameter {
        self.parameter
    }

    /// Evaluates the live scan for the active parameter.
    pub fn evaluate(&self, params: &CollisionParams) -> Result<LuminosityScan, LuminosityError> {
        scan(params, self.parameter)
    }

    /// Evaluates and keeps the scan so later scans can be compared against it.
    pub fn save(&mut self, params: &CollisionParams) -> Result<&LuminosityScan, LuminosityError> {
        let scan = self.evaluate(params)?;
        let saved: &LuminosityScan = self.saved.insert(scan);
        Ok(saved)
    }

    /// Previously saved scan, if any.
    #[must_use]
    pub fn saved(&self) -> Option<&LuminosityScan> {
        self.saved.as_ref()
    }
}
