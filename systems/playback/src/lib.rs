#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Playback controller that turns user intent and elapsed time into run commands.
//!
//! The controller owns the play/pause state and the step cadence. It never
//! touches the run directly: it observes [`Event`] values, reads the run's
//! [`RunProgress`], and emits [`Command`] values for the world to execute.

use std::time::Duration;

use optics_lab_core::{
    Command, Event, ParameterEdit, PlaybackState, RunProgress, SimulationParams, STEP_INTERVAL,
};
use sha2::{Digest, Sha256};

const RESET_SEED_LABEL: &str = "optics-lab/reset";

/// Configuration parameters required to construct the playback controller.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    params: SimulationParams,
    base_seed: u64,
    step_interval: Duration,
}

impl Config {
    /// Creates a configuration that steps at the default cadence.
    #[must_use]
    pub const fn new(params: SimulationParams, base_seed: u64) -> Self {
        Self {
            params,
            base_seed,
            step_interval: STEP_INTERVAL,
        }
    }

    /// Overrides the minimum simulated time between automatic steps.
    #[must_use]
    pub const fn with_step_interval(mut self, step_interval: Duration) -> Self {
        self.step_interval = step_interval;
        self
    }
}

/// User intent forwarded by adapters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackRequest {
    /// Starts automatic stepping unless the run already reached its final turn.
    Play,
    /// Stops automatic stepping.
    Pause,
    /// Plays when idle and pauses when running.
    TogglePlay,
    /// Pauses and advances exactly one turn.
    Step,
    /// Pauses and redraws the ensemble with the current parameters.
    Reset,
    /// Changes one interactive parameter, which forces a reset.
    Edit(ParameterEdit),
    /// Replaces every parameter, which forces a reset.
    Configure(SimulationParams),
}

/// Accumulates elapsed time and fires at most once per interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepCadence {
    interval: Duration,
    elapsed: Duration,
}

impl StepCadence {
    /// Creates a cadence with no accumulated time.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Time accumulated since the cadence last fired.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Accumulates `dt` and reports whether a step is due.
    ///
    /// Firing clears the accumulator, so a long delta yields a single step
    /// rather than a burst of catch-up steps.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed >= self.interval {
            self.elapsed = Duration::ZERO;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Idle,
    Running(StepCadence),
}

/// Pure system that drives a run through its turns.
#[derive(Debug)]
pub struct Playback {
    mode: Mode,
    step_interval: Duration,
    params: SimulationParams,
    pending_params: Option<SimulationParams>,
    base_seed: u64,
    generation: u64,
}

impl Playback {
    /// Creates an idle controller for the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            mode: Mode::Idle,
            step_interval: config.step_interval,
            params: config.params,
            pending_params: None,
            base_seed: config.base_seed,
            generation: 0,
        }
    }

    /// Command that draws the first run of the session.
    #[must_use]
    pub fn initial_command(&self) -> Command {
        Command::InitializeRun {
            params: self.params,
            seed: self.current_seed(),
        }
    }

    /// Reports whether the controller is stepping automatically.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        match self.mode {
            Mode::Idle => PlaybackState::Idle,
            Mode::Running(_) => PlaybackState::Running,
        }
    }

    /// Parameters of the most recently accepted run.
    #[must_use]
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Seed used by the most recent initialization request.
    #[must_use]
    pub fn current_seed(&self) -> u64 {
        derive_run_seed(self.base_seed, self.generation)
    }

    /// Starts automatic stepping if the run can still advance.
    ///
    /// Returns `true` when the controller is running afterwards.
    pub fn play(&mut self, progress: RunProgress) -> bool {
        if progress.is_complete() {
            self.mode = Mode::Idle;
            return false;
        }
        if self.mode == Mode::Idle {
            self.mode = Mode::Running(StepCadence::new(self.step_interval));
        }
        true
    }

    /// Stops automatic stepping and discards the pending schedule.
    pub fn pause(&mut self) {
        self.mode = Mode::Idle;
    }

    /// Plays when idle and pauses when running.
    pub fn toggle(&mut self, progress: RunProgress) {
        match self.mode {
            Mode::Idle => {
                let _ = self.play(progress);
            }
            Mode::Running(_) => self.pause(),
        }
    }

    /// Consumes events, user requests, and the run's progress to emit commands.
    pub fn handle(
        &mut self,
        events: &[Event],
        requests: &[PlaybackRequest],
        progress: RunProgress,
        out: &mut Vec<Command>,
    ) {
        let mut elapsed = Duration::ZERO;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => elapsed = elapsed.saturating_add(*dt),
                Event::RunInitialized { .. } => {
                    if let Some(params) = self.pending_params.take() {
                        self.params = params;
                    }
                }
                Event::RunRejected { .. } => self.pending_params = None,
                Event::FinalTurnReached { .. } => self.pause(),
                Event::TurnAdvanced { .. } => {}
            }
        }

        let mut progress = progress;
        if !elapsed.is_zero() {
            self.advance_cadence(elapsed, &mut progress, out);
        }

        for request in requests {
            match *request {
                PlaybackRequest::Play => {
                    let _ = self.play(progress);
                }
                PlaybackRequest::Pause => self.pause(),
                PlaybackRequest::TogglePlay => self.toggle(progress),
                PlaybackRequest::Step => {
                    self.pause();
                    if !progress.is_complete() {
                        out.push(Command::StepTurn);
                        progress = RunProgress::new(progress.turn() + 1, progress.max_turns());
                    }
                }
                PlaybackRequest::Reset => {
                    let params = self.requested_params();
                    progress = self.reset(params, out);
                }
                PlaybackRequest::Edit(edit) => {
                    let params = self.requested_params().with_edit(edit);
                    progress = self.reset(params, out);
                }
                PlaybackRequest::Configure(params) => {
                    progress = self.reset(params, out);
                }
            }
        }
    }

    fn advance_cadence(
        &mut self,
        elapsed: Duration,
        progress: &mut RunProgress,
        out: &mut Vec<Command>,
    ) {
        let Mode::Running(cadence) = &mut self.mode else {
            return;
        };

        if progress.is_complete() {
            self.mode = Mode::Idle;
            return;
        }

        if cadence.advance(elapsed) {
            out.push(Command::StepTurn);
            *progress = RunProgress::new(progress.turn() + 1, progress.max_turns());
            if progress.is_complete() {
                self.mode = Mode::Idle;
            }
        }
    }

    fn requested_params(&self) -> SimulationParams {
        self.pending_params.unwrap_or(self.params)
    }

    fn reset(&mut self, params: SimulationParams, out: &mut Vec<Command>) -> RunProgress {
        self.pause();
        self.generation = self.generation.wrapping_add(1);
        self.pending_params = Some(params);
        out.push(Command::InitializeRun {
            params,
            seed: self.current_seed(),
        });
        RunProgress::new(0, params.max_turns)
    }
}

/// Derives the seed of the `generation`-th run of a session.
///
/// Generation zero uses the base seed directly so a run started from an
/// explicit seed reproduces exactly.
#[must_use]
pub fn derive_run_seed(base_seed: u64, generation: u64) -> u64 {
    if generation == 0 {
        return base_seed;
    }

    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(RESET_SEED_LABEL.as_bytes());
    hasher.update(generation.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
