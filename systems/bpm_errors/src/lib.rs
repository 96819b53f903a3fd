#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Beam position monitor errors applied to a turn-by-turn betatron signal.
//!
//! A real monitor does not report the beam position it sees. Its electrodes
//! may be rolled by a tilt angle, cross-talk couples the two planes, each
//! plane has its own gain, and every reading carries electronic noise. The
//! readout is modelled as
//!
//! ```text
//! (x_bpm, y_bpm) = M·(x, y) / √(1 − C²) + (σ_x·z_x, σ_y·z_y),   M = R(θ)·C·G
//! ```
//!
//! where `z` is a standard normal draw per turn. The noise realization is kept
//! between readouts so that editing an error term only changes that term's
//! contribution; it changes only when explicitly resampled.

use std::f64::consts::TAU;

use glam::{DMat2, DVec2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of turns recorded when none is configured.
pub const DEFAULT_TURNS: usize = 200;

/// Errors raised while configuring or applying monitor errors.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum BpmError {
    /// Every error term must be a finite number.
    #[error("{name} must be finite (received {value})")]
    NonFinite {
        /// Name of the offending term.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// Full coupling makes the two planes indistinguishable.
    #[error("coupling must lie strictly within (-1, 1) (received {value})")]
    CouplingOutOfRange {
        /// Rejected coupling.
        value: f64,
    },
    /// Noise amplitudes are standard deviations and cannot be negative.
    #[error("noise amplitude must not be negative (received {value})")]
    NegativeNoise {
        /// Rejected noise amplitude.
        value: f64,
    },
    /// The horizontal and vertical signals must cover the same turns.
    #[error("horizontal signal has {horizontal} turns but vertical has {vertical}")]
    SignalLengthMismatch {
        /// Turns in the horizontal signal.
        horizontal: usize,
        /// Turns in the vertical signal.
        vertical: usize,
    },
    /// The noise realization must hold one draw per turn.
    #[error("noise realization covers {noise} turns but the signal has {signal}")]
    NoiseLengthMismatch {
        /// Turns in the signal.
        signal: usize,
        /// Turns covered by the noise realization.
        noise: usize,
    },
}

/// Damped betatron oscillation `a·e^{−b·n²}·sin(2π·Q·n + φ)` seen turn by turn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BetatronSignal {
    /// Oscillation amplitude in millimetres.
    pub amplitude: f64,
    /// Gaussian decoherence rate per squared turn.
    pub damping: f64,
    /// Fractional tune of the oscillation.
    pub tune: f64,
    /// Phase at turn zero in radians.
    pub phase: f64,
}

impl BetatronSignal {
    /// Horizontal signal fitted to a measured kick response.
    pub const HORIZONTAL: Self = Self {
        amplitude: -0.3,
        damping: 1.232_876_8e-4,
        tune: 0.31,
        phase: 6.38e-3,
    };

    /// Vertical signal fitted to a measured kick response.
    pub const VERTICAL: Self = Self {
        amplitude: -0.3,
        damping: 1.232_876_8e-4,
        tune: 0.31,
        phase: -2.7e-3,
    };

    /// Position at `turn`.
    #[must_use]
    pub fn at(&self, turn: usize) -> f64 {
        let n = turn as f64;
        self.amplitude * (-self.damping * n * n).exp() * (TAU * self.tune * n + self.phase).sin()
    }

    /// Positions for turns `0..turns`.
    #[must_use]
    pub fn samples(&self, turns: usize) -> Vec<f64> {
        (0..turns).map(|turn| self.at(turn)).collect()
    }
}

/// Deviations of a monitor from an ideal one.
///
/// All terms are zero for an ideal monitor. Gains are relative, so the plane's
/// total gain is `1 + gain`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BpmErrors {
    /// Roll of the monitor around the beam axis in radians.
    pub tilt: f64,
    /// Cross-talk between the two planes.
    pub coupling: f64,
    /// Relative horizontal gain error.
    pub gain_x: f64,
    /// Relative vertical gain error.
    pub gain_y: f64,
    /// Standard deviation of the horizontal reading noise.
    pub noise_x: f64,
    /// Standard deviation of the vertical reading noise.
    pub noise_y: f64,
}

impl BpmErrors {
    /// Checks that the terms describe a monitor with a well-defined response.
    pub fn validate(&self) -> Result<(), BpmError> {
        for (name, value) in [
            ("tilt", self.tilt),
            ("coupling", self.coupling),
            ("gain_x", self.gain_x),
            ("gain_y", self.gain_y),
            ("noise_x", self.noise_x),
            ("noise_y", self.noise_y),
        ] {
            if !value.is_finite() {
                return Err(BpmError::NonFinite { name, value });
            }
        }
        if self.coupling.abs() >= 1.0 {
            return Err(BpmError::CouplingOutOfRange {
                value: self.coupling,
            });
        }
        for value in [self.noise_x, self.noise_y] {
            if value < 0.0 {
                return Err(BpmError::NegativeNoise { value });
            }
        }
        Ok(())
    }

    /// Linear response `R(θ)·C·G / √(1 − C²)` mapping beam positions to readings.
    pub fn response(&self) -> Result<DMat2, BpmError> {
        self.validate()?;

        let (sin, cos) = self.tilt.sin_cos();
        let rotation = DMat2::from_cols(DVec2::new(cos, -sin), DVec2::new(sin, cos));
        let coupling = DMat2::from_cols(
            DVec2::new(1.0, self.coupling),
            DVec2::new(self.coupling, 1.0),
        );
        let gain = DMat2::from_diagonal(DVec2::new(1.0 + self.gain_x, 1.0 + self.gain_y));
        let scale = 1.0 / (1.0 - self.coupling * self.coupling).sqrt();

        Ok(rotation * coupling * gain * scale)
    }
}

/// One standard normal draw per turn and plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseRealization {
    horizontal: Vec<f64>,
    vertical: Vec<f64>,
}

impl NoiseRealization {
    /// Draws a realization for `turns` turns.
    ///
    /// The horizontal draws come first, then the vertical ones.
    pub fn draw<R: Rng>(turns: usize, rng: &mut R) -> Self {
        let mut sample = |_: usize| rng.sample::<f64, _>(StandardNormal);
        let horizontal = (0..turns).map(&mut sample).collect();
        let vertical = (0..turns).map(&mut sample).collect();
        Self {
            horizontal,
            vertical,
        }
    }

    /// Number of turns covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.horizontal.len()
    }

    /// Returns `true` when the realization covers no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.horizontal.is_empty()
    }
}

/// True and measured positions for one turn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnReading {
    /// Turn index.
    pub turn: usize,
    /// Beam position the monitor should report.
    pub truth: DVec2,
    /// Position the monitor reports.
    pub measured: DVec2,
}

impl TurnReading {
    /// Difference between the true and the reported position.
    #[must_use]
    pub fn difference(&self) -> DVec2 {
        self.truth - self.measured
    }
}

/// Applies monitor errors and the given noise realization to both planes.
pub fn apply_errors(
    horizontal: &[f64],
    vertical: &[f64],
    errors: &BpmErrors,
    noise: &NoiseRealization,
) -> Result<Vec<TurnReading>, BpmError> {
    if horizontal.len() != vertical.len() {
        return Err(BpmError::SignalLengthMismatch {
            horizontal: horizontal.len(),
            vertical: vertical.len(),
        });
    }
    if noise.len() != horizontal.len() {
        return Err(BpmError::NoiseLengthMismatch {
            signal: horizontal.len(),
            noise: noise.len(),
        });
    }

    let response = errors.response()?;
    let sigma = DVec2::new(errors.noise_x, errors.noise_y);
    Ok(horizontal
        .iter()
        .zip(vertical)
        .zip(noise.horizontal.iter().zip(&noise.vertical))
        .enumerate()
        .map(|(turn, ((&x, &y), (&z_x, &z_y)))| {
            let truth = DVec2::new(x, y);
            TurnReading {
                turn,
                truth,
                measured: response * truth + sigma * DVec2::new(z_x, z_y),
            }
        })
        .collect())
}

/// Monitor test bench holding both betatron signals and a persistent noise realization.
#[derive(Clone, Debug)]
pub struct BpmBench {
    horizontal: Vec<f64>,
    vertical: Vec<f64>,
    noise: NoiseRealization,
    rng: ChaCha8Rng,
}

impl BpmBench {
    /// Samples both signals for `turns` turns and draws the first noise realization from `seed`.
    #[must_use]
    pub fn new(
        horizontal: BetatronSignal,
        vertical: BetatronSignal,
        turns: usize,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = NoiseRealization::draw(turns, &mut rng);
        Self {
            horizontal: horizontal.samples(turns),
            vertical: vertical.samples(turns),
            noise,
            rng,
        }
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn turns(&self) -> usize {
        self.horizontal.len()
    }

    /// Current noise realization.
    #[must_use]
    pub fn noise(&self) -> &NoiseRealization {
        &self.noise
    }

    /// Replaces the noise realization with the next draw of the bench's generator.
    pub fn resample(&mut self) {
        self.noise = NoiseRealization::draw(self.turns(), &mut self.rng);
    }

    /// Reads both signals through a monitor with the given errors.
    pub fn read(&self, errors: &BpmErrors) -> Result<Vec<TurnReading>, BpmError> {
        apply_errors(&self.horizontal, &self.vertical, errors, &self.noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn ideal_monitor_has_identity_response() {
        let response = BpmErrors::default().response().expect("valid errors");
        assert_eq!(response, DMat2::IDENTITY);
    }

    #[test]
    fn gains_scale_their_plane() {
        let errors = BpmErrors {
            gain_x: 0.1,
            gain_y: -0.2,
            ..BpmErrors::default()
        };
        let reading = errors.response().expect("valid errors") * DVec2::new(1.0, 1.0);
        assert!((reading.x - 1.1).abs() < TOLERANCE);
        assert!((reading.y - 0.8).abs() < TOLERANCE);
    }

    #[test]
    fn coupling_mixes_planes_and_rescales() {
        let errors = BpmErrors {
            coupling: 0.6,
            ..BpmErrors::default()
        };
        let reading = errors.response().expect("valid errors") * DVec2::new(1.0, 0.0);
        assert!((reading.x - 1.25).abs() < TOLERANCE);
        assert!((reading.y - 0.75).abs() < TOLERANCE);
    }

    #[test]
    fn positive_tilt_rolls_horizontal_into_negative_vertical() {
        let errors = BpmErrors {
            tilt: std::f64::consts::FRAC_PI_2,
            ..BpmErrors::default()
        };
        let reading = errors.response().expect("valid errors") * DVec2::new(1.0, 0.0);
        assert!(reading.x.abs() < TOLERANCE);
        assert!((reading.y + 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn invalid_terms_are_rejected() {
        let full_coupling = BpmErrors {
            coupling: -1.0,
            ..BpmErrors::default()
        };
        assert_eq!(
            full_coupling.validate(),
            Err(BpmError::CouplingOutOfRange { value: -1.0 })
        );

        let negative_noise = BpmErrors {
            noise_y: -0.01,
            ..BpmErrors::default()
        };
        assert_eq!(
            negative_noise.validate(),
            Err(BpmError::NegativeNoise { value: -0.01 })
        );

        let nan_tilt = BpmErrors {
            tilt: f64::NAN,
            ..BpmErrors::default()
        };
        assert!(matches!(
            nan_tilt.validate(),
            Err(BpmError::NonFinite { name: "tilt", .. })
        ));
    }

    #[test]
    fn signal_starts_near_phase_and_decays() {
        let signal = BetatronSignal::HORIZONTAL;
        assert!((signal.at(0) - signal.amplitude * signal.phase.sin()).abs() < TOLERANCE);

        let early = signal.samples(20).iter().fold(0.0_f64, |peak, x| peak.max(x.abs()));
        let late = (180..200).map(|turn| signal.at(turn).abs()).fold(0.0, f64::max);
        assert!(late < 0.05 * early);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let errors = BpmErrors::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let three = NoiseRealization::draw(3, &mut rng);
        let four = NoiseRealization::draw(4, &mut rng);
        assert_eq!(
            apply_errors(&[0.0; 3], &[0.0; 2], &errors, &three),
            Err(BpmError::SignalLengthMismatch {
                horizontal: 3,
                vertical: 2,
            })
        );
        assert_eq!(
            apply_errors(&[0.0; 3], &[0.0; 3], &errors, &four),
            Err(BpmError::NoiseLengthMismatch {
                signal: 3,
                noise: 4,
            })
        );
    }
}
