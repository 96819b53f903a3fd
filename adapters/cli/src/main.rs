#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that boots the Optics Lab models.

mod preset;
mod report;
mod run_transfer;
mod simulation;

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use optics_lab_core::{SimulationParams, Twiss};
use optics_lab_rendering::{Color, Presentation, RenderingBackend, Scene};
use optics_lab_rendering_macroquad::MacroquadBackend;
use optics_lab_system_bpm_errors::{BetatronSignal, BpmBench, BpmErrors, DEFAULT_TURNS};
use optics_lab_system_ensemble::EnsembleSampler;
use optics_lab_system_ir_optics::{reconstruct_waist, MonitorErrors, Waist, DEFAULT_PROFILE_SAMPLES};
use optics_lab_system_line_fit::{ordinary_least_squares, total_least_squares, NoisyLine};
use optics_lab_system_luminosity::{CollisionParams, ScanParameter, ScanSession};
use optics_lab_system_mcmillan::{
    AxisRange, InvariantGrid, McMillanParams, DEFAULT_CONTOURS, DEFAULT_GRID_POINTS,
    DEFAULT_HALF_WIDTH,
};
use optics_lab_world::query;

use crate::{
    preset::load_preset,
    run_transfer::RunSnapshot,
    simulation::{requests_from_input, Simulation},
};

/// Interactive and headless accelerator physics teaching models.
#[derive(Debug, Parser)]
#[command(name = "optics-lab", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Opens the interactive decoherence window.
    Decoherence {
        #[command(flatten)]
        run: RunArgs,
        /// Synchronise presentation with the display refresh rate.
        #[arg(long)]
        vsync: bool,
        /// Log frame rate metrics once per second.
        #[arg(long)]
        show_fps: bool,
    },
    /// Tracks a run to its final turn without opening a window.
    Track {
        #[command(flatten)]
        run: RunArgs,
        /// Output format of the tracked run.
        #[arg(long, value_enum, default_value_t = TrackFormat::Csv)]
        format: TrackFormat,
    },
    /// Prints a single-line snapshot that reproduces a run.
    Snapshot {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Scans luminosity over one collision parameter.
    Luminosity(LuminosityArgs),
    /// Prints the beta function around the interaction point and the reconstructed waist.
    IrBeta(IrBetaArgs),
    /// Reads a turn-by-turn betatron signal through a monitor with errors.
    BpmErrors(BpmErrorsArgs),
    /// Compares ordinary and total least-squares fits on noisy data.
    LeastSquares(LeastSquaresArgs),
    /// Fills the phase-space ellipse of a set of Twiss parameters.
    Twiss(TwissArgs),
    /// Evaluates the invariant of the sextupole McMillan map.
    Mcmillan(McMillanArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TrackFormat {
    /// `turn,mean_q,mean_p` rows of the centroid history.
    Csv,
    /// Final frame with every particle and the centroid history.
    Json,
}

/// Parameters describing a decoherence run.
#[derive(Debug, Args)]
struct RunArgs {
    /// Central fractional tune Q0.
    #[arg(long)]
    tune: Option<f64>,
    /// Standard deviation of the per-particle tune.
    #[arg(long)]
    tune_spread: Option<f64>,
    /// Momentum kick applied before tracking.
    #[arg(long)]
    kick: Option<f64>,
    /// Emittance of the matched beam.
    #[arg(long)]
    emittance: Option<f64>,
    /// Twiss alpha at the observation point.
    #[arg(long)]
    alpha: Option<f64>,
    /// Twiss beta at the observation point.
    #[arg(long)]
    beta: Option<f64>,
    /// Number of particles in the ensemble.
    #[arg(long)]
    particles: Option<usize>,
    /// Number of turns, counting turn zero.
    #[arg(long)]
    turns: Option<u32>,
    /// Seed of the first run. A random seed is drawn and logged when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// TOML preset providing the base parameters.
    #[arg(long, value_name = "FILE", conflicts_with = "snapshot")]
    preset: Option<PathBuf>,
    /// Snapshot string produced by the `snapshot` subcommand.
    #[arg(long, value_name = "STRING")]
    snapshot: Option<String>,
}

impl RunArgs {
    /// Resolves the run from the snapshot or preset, then applies explicit overrides.
    fn resolve(&self) -> Result<RunSnapshot> {
        let base = match (&self.snapshot, &self.preset) {
            (Some(snapshot), _) => {
                Some(RunSnapshot::decode(snapshot).context("failed to decode run snapshot")?)
            }
            (None, Some(path)) => Some(RunSnapshot {
                params: load_preset(path)?,
                seed: rand::random(),
            }),
            (None, None) => None,
        };
        let snapshot = base.unwrap_or_else(|| RunSnapshot {
            params: SimulationParams::default(),
            seed: rand::random(),
        });

        let mut params = snapshot.params;
        if let Some(tune) = self.tune {
            params.tune = tune;
        }
        if let Some(tune_spread) = self.tune_spread {
            params.tune_spread = tune_spread;
        }
        if let Some(kick) = self.kick {
            params.kick = kick;
        }
        if let Some(emittance) = self.emittance {
            params.emittance = emittance;
        }
        if let Some(alpha) = self.alpha {
            params.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            params.beta = beta;
        }
        if let Some(particles) = self.particles {
            params.particle_count = particles;
        }
        if let Some(turns) = self.turns {
            params.max_turns = turns;
        }
        let _ = params
            .validate()
            .context("invalid simulation parameters")?;

        Ok(RunSnapshot {
            params,
            seed: self.seed.unwrap_or(snapshot.seed),
        })
    }
}

/// Collision parameters of the luminosity model.
#[derive(Debug, Args)]
struct LuminosityArgs {
    /// Parameter to scan: phi, bsx, bsy, ssx, ssy or sig.
    #[arg(long, default_value_t = ScanParameter::CrossingAngle)]
    scan: ScanParameter,
    /// Scan again with `KEY=VALUE` applied and print it next to the base scan.
    #[arg(long, value_name = "KEY=VALUE")]
    compare: Option<String>,
    /// Revolution frequency in Hz.
    #[arg(long)]
    frequency: Option<f64>,
    /// Particles per bunch in the first beam.
    #[arg(long)]
    bunch_population_1: Option<f64>,
    /// Particles per bunch in the second beam.
    #[arg(long)]
    bunch_population_2: Option<f64>,
    /// Horizontal emittance in metres.
    #[arg(long)]
    emittance_x: Option<f64>,
    /// Vertical emittance in metres.
    #[arg(long)]
    emittance_y: Option<f64>,
    /// Horizontal beta at the waist in metres.
    #[arg(long)]
    beta_star_x: Option<f64>,
    /// Vertical beta at the waist in metres.
    #[arg(long)]
    beta_star_y: Option<f64>,
    /// Horizontal waist position in metres.
    #[arg(long)]
    waist_x: Option<f64>,
    /// Vertical waist position in metres.
    #[arg(long)]
    waist_y: Option<f64>,
    /// RMS bunch length in metres.
    #[arg(long)]
    bunch_length: Option<f64>,
    /// Full crossing angle in radians.
    #[arg(long)]
    crossing_angle: Option<f64>,
}

impl LuminosityArgs {
    fn collision_params(&self) -> CollisionParams {
        let defaults = CollisionParams::default();
        CollisionParams {
            frequency: self.frequency.unwrap_or(defaults.frequency),
            bunch_population_1: self
                .bunch_population_1
                .unwrap_or(defaults.bunch_population_1),
            bunch_population_2: self
                .bunch_population_2
                .unwrap_or(defaults.bunch_population_2),
            emittance_x: self.emittance_x.unwrap_or(defaults.emittance_x),
            emittance_y: self.emittance_y.unwrap_or(defaults.emittance_y),
            beta_star_x: self.beta_star_x.unwrap_or(defaults.beta_star_x),
            beta_star_y: self.beta_star_y.unwrap_or(defaults.beta_star_y),
            waist_x: self.waist_x.unwrap_or(defaults.waist_x),
            waist_y: self.waist_y.unwrap_or(defaults.waist_y),
            bunch_length: self.bunch_length.unwrap_or(defaults.bunch_length),
            crossing_angle: self.crossing_angle.unwrap_or(defaults.crossing_angle),
        }
    }
}

/// Waist and monitor errors of the interaction-region model.
#[derive(Debug, Args)]
struct IrBetaArgs {
    /// Beta at the waist in metres.
    #[arg(long, default_value_t = 0.9)]
    beta_star: f64,
    /// Longitudinal waist position in metres.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    waist: f64,
    /// Standard deviation of the upstream monitor beta.
    #[arg(long, default_value_t = 0.0)]
    sigma_bpm1: f64,
    /// Standard deviation of the downstream monitor beta.
    #[arg(long, default_value_t = 0.0)]
    sigma_bpm2: f64,
    /// Correlation of the two monitor measurements.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    rho: f64,
    /// Number of profile samples between the monitors.
    #[arg(long, default_value_t = DEFAULT_PROFILE_SAMPLES)]
    samples: usize,
}

/// Betatron signals and monitor errors.
#[derive(Debug, Args)]
struct BpmErrorsArgs {
    /// Horizontal oscillation amplitude in millimetres.
    #[arg(
        long,
        default_value_t = BetatronSignal::HORIZONTAL.amplitude,
        allow_hyphen_values = true
    )]
    amplitude_x: f64,
    /// Vertical oscillation amplitude in millimetres.
    #[arg(
        long,
        default_value_t = BetatronSignal::VERTICAL.amplitude,
        allow_hyphen_values = true
    )]
    amplitude_y: f64,
    /// Horizontal tune shift from the nominal tune.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    tune_shift_x: f64,
    /// Vertical tune shift from the nominal tune.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    tune_shift_y: f64,
    /// Monitor roll in radians.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    tilt: f64,
    /// Cross-talk between the planes.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    coupling: f64,
    /// Relative horizontal gain error.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    gain_x: f64,
    /// Relative vertical gain error.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    gain_y: f64,
    /// Standard deviation of the horizontal reading noise.
    #[arg(long, default_value_t = 0.0)]
    noise_x: f64,
    /// Standard deviation of the vertical reading noise.
    #[arg(long, default_value_t = 0.0)]
    noise_y: f64,
    /// Number of recorded turns.
    #[arg(long, default_value_t = DEFAULT_TURNS)]
    turns: usize,
    /// Seed of the noise generator. A random seed is drawn and logged when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Index of the noise realization drawn from the seed.
    #[arg(long, default_value_t = 0)]
    realization: usize,
}

impl BpmErrorsArgs {
    fn signals(&self) -> (BetatronSignal, BetatronSignal) {
        let horizontal = BetatronSignal {
            amplitude: self.amplitude_x,
            tune: BetatronSignal::HORIZONTAL.tune + self.tune_shift_x,
            ..BetatronSignal::HORIZONTAL
        };
        let vertical = BetatronSignal {
            amplitude: self.amplitude_y,
            tune: BetatronSignal::VERTICAL.tune + self.tune_shift_y,
            ..BetatronSignal::VERTICAL
        };
        (horizontal, vertical)
    }

    fn errors(&self) -> BpmErrors {
        BpmErrors {
            tilt: self.tilt,
            coupling: self.coupling,
            gain_x: self.gain_x,
            gain_y: self.gain_y,
            noise_x: self.noise_x,
            noise_y: self.noise_y,
        }
    }
}

/// True line and noise of the least-squares comparison.
#[derive(Debug, Args)]
struct LeastSquaresArgs {
    /// Slope of the true line.
    #[arg(
        long,
        default_value_t = NoisyLine::default().slope,
        allow_hyphen_values = true
    )]
    slope: f64,
    /// Standard deviation of the abscissa noise.
    #[arg(long, default_value_t = NoisyLine::default().noise_x)]
    noise_x: f64,
    /// Standard deviation of the ordinate noise.
    #[arg(long, default_value_t = NoisyLine::default().noise_y)]
    noise_y: f64,
    /// Number of observations.
    #[arg(long, default_value_t = NoisyLine::default().points)]
    points: usize,
    /// Seed of the noise generator. A random seed is drawn and logged when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

/// Optics and beam of the sampled Twiss ellipse.
#[derive(Debug, Args)]
struct TwissArgs {
    /// Twiss alpha.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    alpha: f64,
    /// Twiss beta.
    #[arg(long, default_value_t = 0.5)]
    beta: f64,
    /// Emittance bounding the ellipse.
    #[arg(long, default_value_t = 0.005)]
    emittance: f64,
    /// Number of points drawn inside the ellipse.
    #[arg(long, default_value_t = 2_500)]
    particles: usize,
    /// Seed of the point generator. A random seed is drawn and logged when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

/// Map parameters and contour sampling of the McMillan invariant.
#[derive(Debug, Args)]
struct McMillanArgs {
    /// Nonlinearity strength.
    #[arg(
        long,
        default_value_t = McMillanParams::default().gamma,
        allow_hyphen_values = true
    )]
    gamma: f64,
    /// Linear coupling term.
    #[arg(
        long,
        default_value_t = McMillanParams::default().epsilon,
        allow_hyphen_values = true
    )]
    epsilon: f64,
    /// Number of contour levels.
    #[arg(long, default_value_t = DEFAULT_CONTOURS)]
    contours: usize,
    /// Grid points per axis.
    #[arg(long, default_value_t = DEFAULT_GRID_POINTS)]
    points: usize,
    /// Half-width of the square phase-space window.
    #[arg(long, default_value_t = DEFAULT_HALF_WIDTH)]
    half_width: f64,
    /// Also print every grid value as `p,q,k` rows.
    #[arg(long)]
    grid: bool,
}

/// Entry point for the Optics Lab command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Decoherence {
            run,
            vsync,
            show_fps,
        } => run_decoherence(&run, vsync, show_fps),
        CliCommand::Track { run, format } => run_track(&run, format),
        CliCommand::Snapshot { run } => run_snapshot(&run),
        CliCommand::Luminosity(args) => run_luminosity(&args),
        CliCommand::IrBeta(args) => run_ir_beta(&args),
        CliCommand::BpmErrors(args) => run_bpm_errors(&args),
        CliCommand::LeastSquares(args) => run_least_squares(&args),
        CliCommand::Twiss(args) => run_twiss(&args),
        CliCommand::Mcmillan(args) => run_mcmillan(&args),
    }
}

fn run_decoherence(args: &RunArgs, vsync: bool, show_fps: bool) -> Result<()> {
    let RunSnapshot { params, seed } = args.resolve()?;
    let mut simulation = Simulation::new(params, seed)?;

    let mut scene = Scene::new(params.max_turns).context("failed to build scene")?;
    simulation
        .populate_scene(&mut scene)
        .context("failed to populate scene")?;

    let presentation = Presentation::new(
        "Optics Lab: decoherence",
        Color::from_rgb_u8(18, 18, 24),
        scene,
    );
    let backend = MacroquadBackend::new()
        .with_vsync(vsync)
        .with_show_fps(show_fps);

    backend.run(presentation, move |dt, input, scene| {
        let requests = requests_from_input(input);
        simulation.frame(dt, &requests);
        if let Err(error) = simulation.populate_scene(scene) {
            log::error!("failed to populate scene: {error}");
        }
    })
}

fn run_track(args: &RunArgs, format: TrackFormat) -> Result<()> {
    let RunSnapshot { params, seed } = args.resolve()?;
    let mut simulation = Simulation::new(params, seed)?;
    simulation.run_to_completion();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        TrackFormat::Csv => {
            report::write_centroid_csv(&mut out, query::centroid_history(simulation.run()))
                .context("failed to write centroid history")?;
        }
        TrackFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &query::frame(simulation.run()))
                .context("failed to write frame")?;
            writeln!(out).context("failed to write frame")?;
        }
    }
    Ok(())
}

fn run_snapshot(args: &RunArgs) -> Result<()> {
    let snapshot = args.resolve()?;
    let encoded = snapshot.encode().context("failed to encode run snapshot")?;
    println!("{encoded}");
    Ok(())
}

fn run_luminosity(args: &LuminosityArgs) -> Result<()> {
    let params = args.collision_params();
    let mut session = ScanSession::new(args.scan);
    log::info!("scanning {}", session.parameter().label());

    let live_params = match &args.compare {
        Some(assignment) => {
            let _ = session
                .save(&params)
                .context("failed to evaluate base scan")?;
            let (parameter, value) = parse_assignment(assignment)?;
            log::info!("comparing against {parameter} = {value}");
            parameter.with_value(params, value)
        }
        None => params,
    };
    let live = session
        .evaluate(&live_params)
        .context("failed to evaluate luminosity scan")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_scan_table(&mut out, &live, session.saved())
        .context("failed to write luminosity scan")?;
    Ok(())
}

fn parse_assignment(assignment: &str) -> Result<(ScanParameter, f64)> {
    let (key, value) = assignment
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, received '{assignment}'"))?;
    let parameter = key
        .parse::<ScanParameter>()
        .with_context(|| format!("unknown scan parameter in '{assignment}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid value in '{assignment}'"))?;
    Ok((parameter, value))
}

fn run_ir_beta(args: &IrBetaArgs) -> Result<()> {
    let waist = Waist::new(args.beta_star, args.waist).context("invalid waist")?;
    let profile = waist
        .profile(args.samples)
        .context("invalid profile sampling")?;
    let (beta_1, beta_2) = waist.monitor_betas();
    let errors = MonitorErrors {
        sigma_1: args.sigma_bpm1,
        sigma_2: args.sigma_bpm2,
        correlation: args.rho,
    };
    let reconstruction =
        reconstruct_waist(beta_1, beta_2, errors).context("failed to reconstruct waist")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_ir_report(&mut out, &profile, (beta_1, beta_2), &reconstruction)
        .context("failed to write beta profile")?;
    Ok(())
}

fn seed_or_random(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let seed = rand::random();
        log::info!("drew seed {seed}");
        seed
    })
}

fn run_bpm_errors(args: &BpmErrorsArgs) -> Result<()> {
    let (horizontal, vertical) = args.signals();
    let mut bench = BpmBench::new(horizontal, vertical, args.turns, seed_or_random(args.seed));
    for _ in 0..args.realization {
        bench.resample();
    }
    let readings = bench
        .read(&args.errors())
        .context("invalid monitor errors")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_bpm_readings(&mut out, &readings)
        .context("failed to write monitor readings")?;
    Ok(())
}

fn run_least_squares(args: &LeastSquaresArgs) -> Result<()> {
    let line = NoisyLine {
        slope: args.slope,
        noise_x: args.noise_x,
        noise_y: args.noise_y,
        points: args.points,
    };
    let observations = line
        .sample(seed_or_random(args.seed))
        .context("invalid noisy line")?;
    let ordinary = ordinary_least_squares(&observations.x, &observations.y)
        .context("ordinary least squares failed")?;
    let total = total_least_squares(&observations.x, &observations.y)
        .context("total least squares failed")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_line_fits(&mut out, line.slope, &ordinary, &total)
        .context("failed to write line fits")?;
    Ok(())
}

fn run_twiss(args: &TwissArgs) -> Result<()> {
    let twiss = Twiss::new(args.alpha, args.beta).context("invalid Twiss parameters")?;
    if !args.emittance.is_finite() || args.emittance < 0.0 {
        anyhow::bail!(
            "emittance must be finite and not negative (received {})",
            args.emittance
        );
    }
    let points = EnsembleSampler::from_seed(seed_or_random(args.seed)).sample_ellipse(
        &twiss,
        args.emittance,
        args.particles,
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_twiss_ellipse(&mut out, &twiss, &points)
        .context("failed to write Twiss ellipse")?;
    Ok(())
}

fn run_mcmillan(args: &McMillanArgs) -> Result<()> {
    let params = McMillanParams {
        gamma: args.gamma,
        epsilon: args.epsilon,
    };
    let window = AxisRange::symmetric(args.half_width);
    let grid = InvariantGrid::evaluate(&params, window, window, args.points)
        .context("failed to evaluate McMillan invariant")?;
    let levels = grid
        .contour_levels(args.contours)
        .context("invalid contour count")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::write_invariant_grid(&mut out, &grid, &levels, args.grid)
        .context("failed to write McMillan invariant")?;
    Ok(())
}
