use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec2;
use optics_lab_core::{
    Command, Event, PlaybackState, SimulationParams, CENTROID_TRAIL_LENGTH, STEP_INTERVAL,
};
use optics_lab_rendering::{CentroidTracePlot, FrameInput, RenderingError, Scene};
use optics_lab_system_playback::{Config, Playback, PlaybackRequest};
use optics_lab_world::{self as world, query, RunState};

/// Couples the authoritative run with the playback controller that drives it.
#[derive(Debug)]
pub(crate) struct Simulation {
    run: RunState,
    playback: Playback,
    events: Vec<Event>,
    commands: Vec<Command>,
}

impl Simulation {
    /// Draws the first run of a session from `params` and `seed`.
    pub(crate) fn new(params: SimulationParams, seed: u64) -> Result<Self> {
        let playback = Playback::new(Config::new(params, seed));
        let run = RunState::initialize(params, playback.current_seed())
            .context("invalid simulation parameters")?;
        log::info!(
            "initialized {} particles for {} turns (seed {seed})",
            params.particle_count,
            params.max_turns
        );

        Ok(Self {
            run,
            playback,
            events: Vec::new(),
            commands: Vec::new(),
        })
    }

    /// Read-only access to the run.
    pub(crate) fn run(&self) -> &RunState {
        &self.run
    }

    /// Advances the simulated clock by `dt` and applies `requests`, running
    /// commands and events back and forth until the controller settles.
    pub(crate) fn frame(&mut self, dt: Duration, requests: &[PlaybackRequest]) {
        self.commands.push(Command::Tick { dt });
        let mut requests = requests;
        while !self.commands.is_empty() {
            self.events.clear();
            for command in self.commands.drain(..) {
                world::apply(&mut self.run, command, &mut self.events);
            }
            for event in &self.events {
                log_event(event);
            }
            self.playback.handle(
                &self.events,
                requests,
                query::progress(&self.run),
                &mut self.commands,
            );
            requests = &[];
        }
    }

    /// Plays the run until the controller idles at the final turn.
    pub(crate) fn run_to_completion(&mut self) {
        self.frame(Duration::ZERO, &[PlaybackRequest::Play]);
        while self.playback.state() == PlaybackState::Running {
            self.frame(STEP_INTERVAL, &[]);
        }
    }

    /// Copies the current run into the scene handed to the renderer.
    pub(crate) fn populate_scene(&self, scene: &mut Scene) -> Result<(), RenderingError> {
        let run = &self.run;
        let progress = query::progress(run);
        let params = query::params(run);

        let phase_space = &mut scene.phase_space;
        phase_space.turn = progress.turn();
        phase_space.particles.clear();
        phase_space.particles.extend(
            query::particles(run)
                .iter()
                .map(|point| Vec2::new(point.q as f32, point.p as f32)),
        );
        phase_space.trail.clear();
        phase_space.trail.extend(
            query::centroid_trail(run, CENTROID_TRAIL_LENGTH)
                .iter()
                .map(|sample| Vec2::new(sample.mean_q as f32, sample.mean_p as f32)),
        );

        if scene.control_panel.max_turns != progress.max_turns() {
            scene.centroid_trace = CentroidTracePlot::new(progress.max_turns())?;
        }
        let trace = &mut scene.centroid_trace;
        trace.samples.clear();
        trace.samples.extend(
            query::centroid_history(run)
                .iter()
                .map(|sample| Vec2::new(sample.turn as f32, sample.mean_q as f32)),
        );

        let panel = &mut scene.control_panel;
        panel.playback = self.playback.state();
        panel.tune = params.tune as f32;
        panel.tune_spread = params.tune_spread as f32;
        panel.kick = params.kick as f32;
        panel.turn = progress.turn();
        panel.max_turns = progress.max_turns();

        Ok(())
    }
}

/// Translates one frame of adapter input into controller requests.
pub(crate) fn requests_from_input(input: FrameInput) -> Vec<PlaybackRequest> {
    let mut requests = Vec::new();
    if let Some(edit) = input.parameter_edit {
        requests.push(PlaybackRequest::Edit(edit));
    }
    if input.reset {
        requests.push(PlaybackRequest::Reset);
    }
    if input.step {
        requests.push(PlaybackRequest::Step);
    }
    if input.toggle_play {
        requests.push(PlaybackRequest::TogglePlay);
    }
    requests
}

fn log_event(event: &Event) {
    match event {
        Event::RunInitialized { progress, seed, .. } => log::debug!(
            "run initialized for {} turns with seed {seed}",
            progress.max_turns()
        ),
        Event::RunRejected { error } => log::warn!("run configuration rejected: {error}"),
        Event::FinalTurnReached { turn } => log::info!("final turn {turn} reached"),
        Event::TimeAdvanced { .. } | Event::TurnAdvanced { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optics_lab_core::ParameterEdit;

    fn short_run() -> SimulationParams {
        SimulationParams {
            particle_count: 50,
            max_turns: 8,
            ..SimulationParams::default()
        }
    }

    #[test]
    fn run_to_completion_reaches_final_turn() {
        let mut simulation = Simulation::new(short_run(), 3).expect("valid params");

        simulation.run_to_completion();

        assert_eq!(query::turn(simulation.run()), 7);
        assert_eq!(query::centroid_history(simulation.run()).len(), 8);
        assert_eq!(simulation.playback.state(), PlaybackState::Idle);
    }

    #[test]
    fn invalid_params_fail_before_the_window_opens() {
        let params = SimulationParams {
            beta: 0.0,
            ..short_run()
        };

        assert!(Simulation::new(params, 0).is_err());
    }

    #[test]
    fn scene_mirrors_the_run() {
        let mut simulation = Simulation::new(short_run(), 11).expect("valid params");
        let mut scene = Scene::new(short_run().max_turns).expect("valid scene");
        simulation.frame(Duration::ZERO, &[PlaybackRequest::Step, PlaybackRequest::Step]);

        simulation.populate_scene(&mut scene).expect("valid axes");

        assert_eq!(scene.phase_space.turn, 2);
        assert_eq!(scene.phase_space.particles.len(), 50);
        assert_eq!(scene.phase_space.trail.len(), 3);
        assert_eq!(scene.centroid_trace.samples.len(), 3);
        assert_eq!(scene.centroid_trace.samples[2].x, 2.0);
        assert_eq!(scene.control_panel.turn, 2);
        assert_eq!(scene.control_panel.playback, PlaybackState::Idle);
        assert_eq!(scene.control_panel.tune, 0.31_f64 as f32);
    }

    #[test]
    fn trail_is_limited_to_trailing_window() {
        let params = SimulationParams {
            max_turns: 40,
            ..short_run()
        };
        let mut simulation = Simulation::new(params, 5).expect("valid params");
        let mut scene = Scene::new(params.max_turns).expect("valid scene");
        simulation.run_to_completion();

        simulation.populate_scene(&mut scene).expect("valid axes");

        assert_eq!(scene.phase_space.trail.len(), CENTROID_TRAIL_LENGTH);
        assert_eq!(scene.centroid_trace.samples.len(), 40);
    }

    #[test]
    fn slider_edit_resets_with_new_value() {
        let mut simulation = Simulation::new(short_run(), 1).expect("valid params");
        simulation.frame(Duration::ZERO, &[PlaybackRequest::Step]);

        let requests = requests_from_input(FrameInput {
            parameter_edit: Some(ParameterEdit::Kick(0.2)),
            ..FrameInput::default()
        });
        simulation.frame(Duration::ZERO, &requests);

        assert_eq!(query::turn(simulation.run()), 0);
        assert_eq!(query::params(simulation.run()).kick, 0.2);
    }

    #[test]
    fn input_maps_to_requests_in_order() {
        let requests = requests_from_input(FrameInput {
            toggle_play: true,
            step: true,
            reset: true,
            parameter_edit: Some(ParameterEdit::Tune(0.3)),
        });

        assert_eq!(
            requests,
            vec![
                PlaybackRequest::Edit(ParameterEdit::Tune(0.3)),
                PlaybackRequest::Reset,
                PlaybackRequest::Step,
                PlaybackRequest::TogglePlay,
            ]
        );
    }
}
