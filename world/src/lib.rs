#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative run state management for decoherence simulations.

use num_complex::Complex64;
use optics_lab_core::{
    CentroidSample, Command, ConfigurationError, Event, NormalizedPoint, PhysicalPoint,
    RunProgress, SimulationParams, Twiss,
};
use optics_lab_system_ensemble::{Ensemble, EnsembleSampler};

/// Represents one decoherence run from its initial draw to its final turn.
#[derive(Clone, Debug)]
pub struct RunState {
    params: SimulationParams,
    twiss: Twiss,
    seed: u64,
    positions: Vec<Complex64>,
    rotations: Vec<Complex64>,
    particles: Vec<PhysicalPoint>,
    turn: u32,
    centroid_history: Vec<CentroidSample>,
}

impl RunState {
    /// Validates the parameters and draws a fresh ensemble from `seed`.
    ///
    /// The returned run sits at turn zero with the initial centroid recorded.
    pub fn initialize(params: SimulationParams, seed: u64) -> Result<Self, ConfigurationError> {
        let twiss = params.validate()?;
        let ensemble = EnsembleSampler::from_seed(seed).sample(&params, &twiss);
        Ok(Self::assemble(params, twiss, seed, ensemble))
    }

    /// Builds a run around an ensemble that was drawn elsewhere.
    ///
    /// `seed` is recorded as provenance only.
    pub fn from_ensemble(
        params: SimulationParams,
        seed: u64,
        ensemble: Ensemble,
    ) -> Result<Self, ConfigurationError> {
        let twiss = params.validate()?;
        if ensemble.len() != params.particle_count {
            return Err(ConfigurationError::EnsembleSizeMismatch {
                expected: params.particle_count,
                actual: ensemble.len(),
            });
        }
        Ok(Self::assemble(params, twiss, seed, ensemble))
    }

    fn assemble(params: SimulationParams, twiss: Twiss, seed: u64, ensemble: Ensemble) -> Self {
        let (positions, rotations) = ensemble.into_parts();
        let mut run = Self {
            params,
            twiss,
            seed,
            particles: Vec::with_capacity(positions.len()),
            positions,
            rotations,
            turn: 0,
            centroid_history: Vec::new(),
        };
        let centroid = run.refresh_particles();
        run.centroid_history.push(centroid);
        run
    }

    fn progress(&self) -> RunProgress {
        RunProgress::new(self.turn, self.params.max_turns)
    }

    /// Recomputes physical coordinates from the normalized state and returns
    /// the centroid for the current turn.
    fn refresh_particles(&mut self) -> CentroidSample {
        self.particles.clear();
        let mut sum_q = 0.0;
        let mut sum_p = 0.0;
        for position in &self.positions {
            let point = self
                .twiss
                .to_physical(NormalizedPoint::new(position.re, position.im));
            sum_q += point.q;
            sum_p += point.p;
            self.particles.push(point);
        }

        let count = self.particles.len().max(1) as f64;
        CentroidSample::new(self.turn, sum_q / count, sum_p / count)
    }
}

/// Advances every particle by one turn and records the new centroid.
///
/// Returns `None` without touching the run once the final turn is reached.
pub fn step(run: &mut RunState) -> Option<CentroidSample> {
    if run.progress().is_complete() {
        return None;
    }

    for (position, rotation) in run.positions.iter_mut().zip(&run.rotations) {
        *position *= *rotation;
    }
    run.turn += 1;

    let centroid = run.refresh_particles();
    run.centroid_history.push(centroid);
    Some(centroid)
}

/// Applies the provided command to the run, emitting resulting events.
pub fn apply(run: &mut RunState, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::InitializeRun { params, seed } => match RunState::initialize(params, seed) {
            Ok(fresh) => {
                *run = fresh;
                out_events.push(Event::RunInitialized {
                    progress: run.progress(),
                    seed,
                    centroid: run.centroid_history[0],
                });
            }
            Err(error) => out_events.push(Event::RunRejected { error }),
        },
        Command::Tick { dt } => out_events.push(Event::TimeAdvanced { dt }),
        Command::StepTurn => {
            if let Some(centroid) = step(run) {
                out_events.push(Event::TurnAdvanced { centroid });
                if run.progress().is_complete() {
                    out_events.push(Event::FinalTurnReached { turn: run.turn });
                }
            }
        }
    }
}

/// Query functions that provide read-only access to the run state.
pub mod query {
    use num_complex::Complex64;
    use optics_lab_core::{
        CentroidSample, Frame, PhysicalPoint, RunProgress, SimulationParams,
    };

    use super::RunState;

    /// Current turn index of the run.
    #[must_use]
    pub fn turn(run: &RunState) -> u32 {
        run.turn
    }

    /// Current turn together with the run's turn budget.
    #[must_use]
    pub fn progress(run: &RunState) -> RunProgress {
        run.progress()
    }

    /// Parameters the run was initialized with.
    #[must_use]
    pub fn params(run: &RunState) -> &SimulationParams {
        &run.params
    }

    /// Seed the ensemble was drawn from.
    #[must_use]
    pub fn seed(run: &RunState) -> u64 {
        run.seed
    }

    /// Physical coordinates of every particle at the current turn.
    #[must_use]
    pub fn particles(run: &RunState) -> &[PhysicalPoint] {
        &run.particles
    }

    /// Complex normalized state `u + i·up` of every particle.
    #[must_use]
    pub fn normalized_state(run: &RunState) -> &[Complex64] {
        &run.positions
    }

    /// Per-particle one-turn rotation operators.
    #[must_use]
    pub fn rotations(run: &RunState) -> &[Complex64] {
        &run.rotations
    }

    /// Every centroid sample recorded since initialization, oldest first.
    #[must_use]
    pub fn centroid_history(run: &RunState) -> &[CentroidSample] {
        &run.centroid_history
    }

    /// Trailing window of at most `len` centroid samples ending at the current turn.
    #[must_use]
    pub fn centroid_trail(run: &RunState, len: usize) -> &[CentroidSample] {
        let start = run.centroid_history.len().saturating_sub(len);
        &run.centroid_history[start..]
    }

    /// Captures a serializable snapshot of the run for renderers and exports.
    #[must_use]
    pub fn frame(run: &RunState) -> Frame {
        Frame {
            turn: run.turn,
            particles: run.particles.clone(),
            centroid_history: run.centroid_history.clone(),
        }
    }
}
