#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Optics Lab engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative run state, and pure systems. Systems submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Adapters never mutate the run directly; they
//! read [`Frame`] snapshots and forward user intent to the systems.
//!
//! Phase-space coordinates come in two flavours. [`PhysicalPoint`] holds the
//! measurable `(q, p)` pair while [`NormalizedPoint`] holds the `(u, up)` pair
//! in which linear single-particle motion is a pure rotation. [`Twiss`] maps
//! between them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of particles tracked when no explicit ensemble size is configured.
pub const DEFAULT_PARTICLE_COUNT: usize = 5_000;

/// Number of turns (including turn zero) a run spans by default.
pub const DEFAULT_MAX_TURNS: u32 = 200;

/// Geometric emittance of the matched beam drawn at initialization.
pub const DEFAULT_EMITTANCE: f64 = 0.005;

/// Minimum simulated time between two automatic steps while playing.
pub const STEP_INTERVAL: Duration = Duration::from_millis(60);

/// Number of trailing centroid samples drawn on top of the phase-space cloud.
pub const CENTROID_TRAIL_LENGTH: usize = 15;

/// Describes whether the playback controller is advancing the run on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// The run only advances through manual single steps.
    Idle,
    /// The run advances once per elapsed step interval.
    Running,
}

/// Commands that express all permissible run mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Discards the active run and draws a fresh ensemble.
    InitializeRun {
        /// Parameters describing the new ensemble and its optics.
        params: SimulationParams,
        /// Seed the ensemble is drawn from.
        seed: u64,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Advances every particle by exactly one turn.
    StepTurn,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a fresh run replaced the previous one.
    RunInitialized {
        /// Progress of the new run, always positioned at turn zero.
        progress: RunProgress,
        /// Seed the ensemble was drawn from.
        seed: u64,
        /// Centroid of the freshly drawn ensemble.
        centroid: CentroidSample,
    },
    /// Reports that an initialization request carried an invalid configuration.
    RunRejected {
        /// Specific reason the configuration failed validation.
        error: ConfigurationError,
    },
    /// Confirms that every particle advanced by one turn.
    TurnAdvanced {
        /// Centroid recorded for the new turn.
        centroid: CentroidSample,
    },
    /// Announces that the run reached its last turn and will not advance further.
    FinalTurnReached {
        /// Index of the final turn.
        turn: u32,
    },
}

/// Validation failures raised when a run is configured.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    /// The beta function must be strictly positive for the coordinate map to exist.
    #[error("beta must be positive (received {beta})")]
    NonPositiveBeta {
        /// Provided beta value that failed validation.
        beta: f64,
    },
    /// Emittance is a phase-space area and cannot be negative.
    #[error("emittance must not be negative (received {emittance})")]
    NegativeEmittance {
        /// Provided emittance value that failed validation.
        emittance: f64,
    },
    /// Every floating-point parameter must be a finite number.
    #[error("{name} must be finite (received {value})")]
    NonFiniteParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Provided value that failed validation.
        value: f64,
    },
    /// Centroids are undefined for an empty ensemble.
    #[error("ensemble must contain at least one particle")]
    EmptyEnsemble,
    /// A run must include at least its initial turn.
    #[error("run must span at least one turn")]
    NoTurns,
    /// A pre-built ensemble does not match the configured particle count.
    #[error("ensemble holds {actual} particles but {expected} were configured")]
    EnsembleSizeMismatch {
        /// Particle count requested by the parameters.
        expected: usize,
        /// Particle count supplied by the ensemble.
        actual: usize,
    },
}

/// Physical transverse phase-space coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPoint {
    /// Transverse position.
    pub q: f64,
    /// Transverse momentum (angle).
    pub p: f64,
}

impl PhysicalPoint {
    /// Creates a new physical coordinate.
    #[must_use]
    pub const fn new(q: f64, p: f64) -> Self {
        Self { q, p }
    }
}

/// Normalized phase-space coordinate in which linear motion is a rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    /// Normalized position.
    pub u: f64,
    /// Normalized momentum.
    pub up: f64,
}

impl NormalizedPoint {
    /// Creates a new normalized coordinate.
    #[must_use]
    pub const fn new(u: f64, up: f64) -> Self {
        Self { u, up }
    }
}

/// Linear optics parameters defining the normalized-to-physical map.
///
/// Construction validates `beta`, so every `Twiss` value describes a map with
/// a well-defined inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Twiss {
    alpha: f64,
    beta: f64,
    sqrt_beta: f64,
}

impl Twiss {
    /// Twiss parameters of an upright ellipse with unit beta.
    pub const UPRIGHT: Self = Self {
        alpha: 0.0,
        beta: 1.0,
        sqrt_beta: 1.0,
    };

    /// Creates a new set of Twiss parameters.
    ///
    /// Returns an error when `beta` is not strictly positive.
    pub fn new(alpha: f64, beta: f64) -> Result<Self, ConfigurationError> {
        if !beta.is_finite() || beta <= 0.0 {
            return Err(ConfigurationError::NonPositiveBeta { beta });
        }

        Ok(Self {
            alpha,
            beta,
            sqrt_beta: beta.sqrt(),
        })
    }

    /// Correlation (tilt) parameter of the phase-space ellipse.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Envelope scale of the phase-space ellipse.
    #[must_use]
    pub const fn beta(&self) -> f64 {
        self.beta
    }

    /// Derived gamma parameter, `(1 + alpha²) / beta`.
    #[must_use]
    pub fn gamma(&self) -> f64 {
        (1.0 + self.alpha * self.alpha) / self.beta
    }

    /// Maps a physical coordinate into normalized phase space.
    #[must_use]
    pub fn to_normalized(&self, point: PhysicalPoint) -> NormalizedPoint {
        let u = point.q / self.sqrt_beta;
        let up = self.alpha * point.q / self.sqrt_beta + point.p * self.sqrt_beta;
        NormalizedPoint::new(u, up)
    }

    /// Maps a normalized coordinate back into physical phase space.
    #[must_use]
    pub fn to_physical(&self, point: NormalizedPoint) -> PhysicalPoint {
        let q = self.sqrt_beta * point.u;
        let p = -self.alpha / self.sqrt_beta * point.u + point.up / self.sqrt_beta;
        PhysicalPoint::new(q, p)
    }
}

impl Default for Twiss {
    fn default() -> Self {
        Self::UPRIGHT
    }
}

/// Every knob that shapes a decoherence run.
///
/// Missing fields take their defaults when deserialized, which lets presets
/// override only what they care about. Unknown fields are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParams {
    /// Central fractional tune `Q0`.
    pub tune: f64,
    /// Standard deviation of the per-particle tune.
    pub tune_spread: f64,
    /// Momentum offset applied to every particle before tracking.
    pub kick: f64,
    /// Emittance of the matched Gaussian beam.
    pub emittance: f64,
    /// Twiss alpha at the observation point.
    pub alpha: f64,
    /// Twiss beta at the observation point.
    pub beta: f64,
    /// Number of particles in the ensemble.
    pub particle_count: usize,
    /// Number of turns a run spans, counting turn zero.
    pub max_turns: u32,
}

impl SimulationParams {
    /// Validates the parameters and returns the Twiss map they describe.
    pub fn validate(&self) -> Result<Twiss, ConfigurationError> {
        let twiss = Twiss::new(self.alpha, self.beta)?;
        for (name, value) in [
            ("tune", self.tune),
            ("tune_spread", self.tune_spread),
            ("kick", self.kick),
            ("emittance", self.emittance),
            ("alpha", self.alpha),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFiniteParameter { name, value });
            }
        }
        if self.emittance < 0.0 {
            return Err(ConfigurationError::NegativeEmittance {
                emittance: self.emittance,
            });
        }
        if self.particle_count == 0 {
            return Err(ConfigurationError::EmptyEnsemble);
        }
        if self.max_turns == 0 {
            return Err(ConfigurationError::NoTurns);
        }
        Ok(twiss)
    }

    /// Returns a copy of the parameters with the provided edit applied.
    #[must_use]
    pub fn with_edit(mut self, edit: ParameterEdit) -> Self {
        match edit {
            ParameterEdit::Tune(value) => self.tune = value,
            ParameterEdit::TuneSpread(value) => self.tune_spread = value,
            ParameterEdit::Kick(value) => self.kick = value,
        }
        self
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            tune: 0.31,
            tune_spread: 0.002,
            kick: 0.1,
            emittance: DEFAULT_EMITTANCE,
            alpha: 0.0,
            beta: 1.0,
            particle_count: DEFAULT_PARTICLE_COUNT,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// Interactive parameter change requested by an adapter slider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParameterEdit {
    /// Replaces the central tune `Q0`.
    Tune(f64),
    /// Replaces the tune spread `sigmaQ`.
    TuneSpread(f64),
    /// Replaces the initial momentum kick.
    Kick(f64),
}

/// Progress of a run expressed as its current turn and turn budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunProgress {
    turn: u32,
    max_turns: u32,
}

impl RunProgress {
    /// Creates a progress descriptor.
    #[must_use]
    pub const fn new(turn: u32, max_turns: u32) -> Self {
        Self { turn, max_turns }
    }

    /// Current turn index.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Number of turns the run spans, counting turn zero.
    #[must_use]
    pub const fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Index of the last turn the run may reach.
    #[must_use]
    pub const fn final_turn(&self) -> u32 {
        self.max_turns.saturating_sub(1)
    }

    /// Returns `true` once the run can no longer advance.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.turn >= self.final_turn()
    }
}

/// Mean physical position and momentum of the ensemble at a given turn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CentroidSample {
    /// Turn the sample was recorded at.
    pub turn: u32,
    /// Mean transverse position.
    pub mean_q: f64,
    /// Mean transverse momentum.
    pub mean_p: f64,
}

impl CentroidSample {
    /// Creates a new centroid sample.
    #[must_use]
    pub const fn new(turn: u32, mean_q: f64, mean_p: f64) -> Self {
        Self {
            turn,
            mean_q,
            mean_p,
        }
    }
}

/// Snapshot handed to renderers whenever the run changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Turn the snapshot was taken at.
    pub turn: u32,
    /// Physical coordinates of every particle.
    pub particles: Vec<PhysicalPoint>,
    /// Every centroid sample recorded since initialization.
    pub centroid_history: Vec<CentroidSample>,
}
