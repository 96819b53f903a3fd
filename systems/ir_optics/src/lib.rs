#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Beta function through a drift around an interaction point.
//!
//! In a field-free region the beta function is a parabola with its minimum
//! `β*` at the waist `s*`. Two beam position monitors placed symmetrically
//! around the interaction point measure beta at either end of the drift,
//! which is enough to reconstruct the waist and propagate the measurement
//! errors onto it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longitudinal position of the upstream monitor in metres.
pub const BPM_UPSTREAM: f64 = -8.3;

/// Longitudinal position of the downstream monitor in metres.
pub const BPM_DOWNSTREAM: f64 = 8.3;

/// Number of samples drawn for a beta profile when none is configured.
pub const DEFAULT_PROFILE_SAMPLES: usize = 100;

const MONITOR_SEPARATION: f64 = BPM_DOWNSTREAM - BPM_UPSTREAM;

/// Errors raised by waist construction and reconstruction.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum IrOpticsError {
    /// Beta at the waist must be strictly positive.
    #[error("beta* must be positive (received {value})")]
    NonPositiveBetaStar {
        /// Rejected beta* value.
        value: f64,
    },
    /// Measured monitor betas must be strictly positive.
    #[error("monitor beta must be positive (received {value})")]
    NonPositiveMonitorBeta {
        /// Rejected monitor beta.
        value: f64,
    },
    /// The monitor betas cannot belong to a drift of the monitor separation.
    #[error("monitor betas {beta_1} and {beta_2} do not describe a drift")]
    NotADrift {
        /// Upstream monitor beta.
        beta_1: f64,
        /// Downstream monitor beta.
        beta_2: f64,
    },
    /// A profile needs both of its end points.
    #[error("a beta profile needs at least two samples (received {samples})")]
    TooFewSamples {
        /// Requested sample count.
        samples: usize,
    },
    /// Measurement errors are standard deviations and cannot be negative.
    #[error("monitor beta errors must not be negative (received {value})")]
    NegativeMonitorError {
        /// Rejected error value.
        value: f64,
    },
    /// Correlation coefficients live in `[-1, 1]`.
    #[error("correlation must lie within [-1, 1] (received {value})")]
    CorrelationOutOfRange {
        /// Rejected correlation.
        value: f64,
    },
}

/// Location and size of the beta function minimum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waist {
    beta_star: f64,
    s_star: f64,
}

impl Waist {
    /// Creates a waist, rejecting non-positive `beta_star`.
    pub fn new(beta_star: f64, s_star: f64) -> Result<Self, IrOpticsError> {
        if !beta_star.is_finite() || beta_star <= 0.0 {
            return Err(IrOpticsError::NonPositiveBetaStar { value: beta_star });
        }
        Ok(Self { beta_star, s_star })
    }

    /// Minimum of the beta function.
    #[must_use]
    pub const fn beta_star(&self) -> f64 {
        self.beta_star
    }

    /// Longitudinal position of the minimum.
    #[must_use]
    pub const fn s_star(&self) -> f64 {
        self.s_star
    }

    /// Beta function at longitudinal position `s`.
    #[must_use]
    pub fn beta_at(&self, s: f64) -> f64 {
        let offset = s - self.s_star;
        self.beta_star * (1.0 + offset * offset / (self.beta_star * self.beta_star))
    }

    /// Beta at the upstream and downstream monitors.
    #[must_use]
    pub fn monitor_betas(&self) -> (f64, f64) {
        (self.beta_at(BPM_UPSTREAM), self.beta_at(BPM_DOWNSTREAM))
    }

    /// Samples the beta function at evenly spaced points between the monitors.
    pub fn profile(&self, samples: usize) -> Result<Vec<BetaSample>, IrOpticsError> {
        if samples < 2 {
            return Err(IrOpticsError::TooFewSamples { samples });
        }

        let spacing = MONITOR_SEPARATION / (samples - 1) as f64;
        Ok((0..samples)
            .map(|index| {
                let s = BPM_UPSTREAM + index as f64 * spacing;
                BetaSample {
                    s,
                    beta: self.beta_at(s),
                }
            })
            .collect())
    }
}

impl Default for Waist {
    fn default() -> Self {
        Self {
            beta_star: 0.9,
            s_star: 0.0,
        }
    }
}

/// Beta function value at one longitudinal position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BetaSample {
    /// Longitudinal position in metres.
    pub s: f64,
    /// Beta function in metres.
    pub beta: f64,
}

/// Measurement uncertainty of the two monitor betas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorErrors {
    /// Standard deviation of the upstream beta.
    pub sigma_1: f64,
    /// Standard deviation of the downstream beta.
    pub sigma_2: f64,
    /// Correlation coefficient between the two measurements.
    pub correlation: f64,
}

impl MonitorErrors {
    fn validate(&self) -> Result<(), IrOpticsError> {
        for value in [self.sigma_1, self.sigma_2] {
            if value.is_nan() || value < 0.0 {
                return Err(IrOpticsError::NegativeMonitorError { value });
            }
        }
        if !(-1.0..=1.0).contains(&self.correlation) {
            return Err(IrOpticsError::CorrelationOutOfRange {
                value: self.correlation,
            });
        }
        Ok(())
    }
}

/// Waist recovered from monitor betas together with its propagated errors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaistReconstruction {
    /// Reconstructed waist.
    pub waist: Waist,
    /// Standard deviation of the reconstructed beta*.
    pub beta_star_error: f64,
    /// Standard deviation of the reconstructed waist position.
    pub s_star_error: f64,
}

/// Reconstructs the waist from the betas measured at both monitors.
pub fn reconstruct_waist(
    beta_1: f64,
    beta_2: f64,
    errors: MonitorErrors,
) -> Result<WaistReconstruction, IrOpticsError> {
    for value in [beta_1, beta_2] {
        if !value.is_finite() || value <= 0.0 {
            return Err(IrOpticsError::NonPositiveMonitorBeta { value });
        }
    }
    errors.validate()?;

    let separation = MONITOR_SEPARATION;
    let separation_sq = separation * separation;
    let radicand = beta_1 * beta_2 - separation_sq;
    // b1·b2 = Δs² would put an infinitely sharp waist between the monitors.
    if radicand <= 0.0 {
        return Err(IrOpticsError::NotADrift { beta_1, beta_2 });
    }

    let root = radicand.sqrt();
    let difference = beta_1 - beta_2;
    let numerator = separation_sq * (beta_1 + beta_2 - 2.0 * root);
    let denominator = difference * difference + 4.0 * separation_sq;
    let beta_star = numerator / denominator;
    let s_star = beta_star * difference / (2.0 * separation);

    let waist = Waist::new(beta_star, s_star)?;

    let numerator_d1 = separation_sq * (1.0 - beta_2 / root);
    let numerator_d2 = separation_sq * (1.0 - beta_1 / root);
    let denominator_sq = denominator * denominator;
    let beta_star_d1 =
        (numerator_d1 * denominator - 2.0 * numerator * difference) / denominator_sq;
    let beta_star_d2 =
        (numerator_d2 * denominator + 2.0 * numerator * difference) / denominator_sq;
    let s_star_d1 = (beta_star + difference * beta_star_d1) / (2.0 * separation);
    let s_star_d2 = (difference * beta_star_d2 - beta_star) / (2.0 * separation);

    Ok(WaistReconstruction {
        waist,
        beta_star_error: propagate(beta_star_d1, beta_star_d2, &errors),
        s_star_error: propagate(s_star_d1, s_star_d2, &errors),
    })
}

/// First-order error propagation for a function of two correlated inputs.
fn propagate(gradient_1: f64, gradient_2: f64, errors: &MonitorErrors) -> f64 {
    let term_1 = gradient_1 * errors.sigma_1;
    let term_2 = gradient_2 * errors.sigma_2;
    let covariance = 2.0 * term_1 * term_2 * errors.correlation;
    (term_1 * term_1 + term_2 * term_2 + covariance)
        .max(0.0)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beta_is_minimal_at_waist() {
        let waist = Waist::new(0.9, 0.4).expect("positive beta*");
        assert_eq!(waist.beta_at(0.4), 0.9);
        assert!(waist.beta_at(0.3) > 0.9);
        assert!(waist.beta_at(0.5) > 0.9);
        assert!((waist.beta_at(1.3) - waist.beta_at(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn profile_spans_both_monitors() {
        let profile = Waist::default()
            .profile(DEFAULT_PROFILE_SAMPLES)
            .expect("enough samples");
        assert_eq!(profile.len(), DEFAULT_PROFILE_SAMPLES);
        assert_eq!(profile[0].s, BPM_UPSTREAM);
        assert!((profile[DEFAULT_PROFILE_SAMPLES - 1].s - BPM_DOWNSTREAM).abs() < 1e-12);
    }

    #[test]
    fn profile_needs_two_samples() {
        assert_eq!(
            Waist::default().profile(1),
            Err(IrOpticsError::TooFewSamples { samples: 1 })
        );
    }

    #[test]
    fn non_positive_beta_star_is_rejected() {
        assert_eq!(
            Waist::new(0.0, 0.0),
            Err(IrOpticsError::NonPositiveBetaStar { value: 0.0 })
        );
    }

    #[test]
    fn monitor_errors_are_validated() {
        let negative = MonitorErrors {
            sigma_1: -0.1,
            ..MonitorErrors::default()
        };
        assert_eq!(
            reconstruct_waist(100.0, 100.0, negative),
            Err(IrOpticsError::NegativeMonitorError { value: -0.1 })
        );

        let correlated = MonitorErrors {
            correlation: 1.5,
            ..MonitorErrors::default()
        };
        assert_eq!(
            reconstruct_waist(100.0, 100.0, correlated),
            Err(IrOpticsError::CorrelationOutOfRange { value: 1.5 })
        );
    }
}
