#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Optics Lab adapters.

use anyhow::Result as AnyResult;
use glam::Vec2;
use optics_lab_core::{ParameterEdit, PlaybackState};
use std::{error::Error, fmt, time::Duration};

/// Limit of both phase-space axes.
pub const PHASE_SPACE_LIMIT: f32 = 0.5;

/// Limit of the centroid axis of the beam position monitor trace.
pub const CENTROID_LIMIT: f32 = 0.3;

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns the same color with its alpha channel replaced.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self {
            red: self.red,
            green: self.green,
            blue: self.blue,
            alpha,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Whether play/pause was requested during the frame.
    pub toggle_play: bool,
    /// Whether a single step was requested during the frame.
    pub step: bool,
    /// Whether the run should be redrawn with the current parameters.
    pub reset: bool,
    /// Slider edit committed during the frame, if any.
    pub parameter_edit: Option<ParameterEdit>,
}

/// Linear plot axis with grid and tick spacing.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotAxis {
    /// Text drawn next to the axis.
    pub label: String,
    /// Value mapped to the start of the axis.
    pub min: f32,
    /// Value mapped to the end of the axis.
    pub max: f32,
    /// Spacing between grid lines.
    pub grid_step: f32,
    /// Spacing between labelled ticks.
    pub tick_step: f32,
}

impl PlotAxis {
    /// Creates an axis, rejecting empty ranges and non-positive spacings.
    pub fn new<T>(
        label: T,
        min: f32,
        max: f32,
        grid_step: f32,
        tick_step: f32,
    ) -> Result<Self, RenderingError>
    where
        T: Into<String>,
    {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(RenderingError::InvalidAxisRange { min, max });
        }
        for step in [grid_step, tick_step] {
            if !(step.is_finite() && step > 0.0) {
                return Err(RenderingError::InvalidAxisStep { step });
            }
        }

        Ok(Self {
            label: label.into(),
            min,
            max,
            grid_step,
            tick_step,
        })
    }

    /// Length of the axis range.
    #[must_use]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    /// Maps `value` onto `0.0..=1.0`, where values outside the range fall outside it too.
    #[must_use]
    pub fn normalize(&self, value: f32) -> f32 {
        (value - self.min) / self.span()
    }

    /// Returns `true` when `value` lies within the axis range.
    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Values at which grid lines are drawn.
    #[must_use]
    pub fn grid_values(&self) -> Vec<f32> {
        multiples_within(self.min, self.max, self.grid_step)
    }

    /// Values at which labelled ticks are drawn.
    #[must_use]
    pub fn tick_values(&self) -> Vec<f32> {
        multiples_within(self.min, self.max, self.tick_step)
    }
}

fn multiples_within(min: f32, max: f32, step: f32) -> Vec<f32> {
    let slack = step * 1e-3;
    let first = ((min - slack) / step).ceil() as i64;
    let last = ((max + slack) / step).floor() as i64;
    (first..=last).map(|index| index as f32 * step).collect()
}

/// Pair of axes spanning a rectangular plot.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotArea {
    /// Horizontal axis.
    pub x: PlotAxis,
    /// Vertical axis.
    pub y: PlotAxis,
}

impl PlotArea {
    /// Creates a plot area from its axes.
    #[must_use]
    pub fn new(x: PlotAxis, y: PlotAxis) -> Self {
        Self { x, y }
    }

    /// Maps a data point to unit coordinates with the origin at the top-left corner.
    #[must_use]
    pub fn to_unit(&self, point: Vec2) -> Vec2 {
        Vec2::new(self.x.normalize(point.x), 1.0 - self.y.normalize(point.y))
    }

    /// Returns `true` when the point lies inside both axis ranges.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        self.x.contains(point.x) && self.y.contains(point.y)
    }
}

/// Scatter plot of the ensemble in physical phase space.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseSpacePlot {
    /// Axes spanning the `(q, p)` view.
    pub area: PlotArea,
    /// Physical coordinates of every particle.
    pub particles: Vec<Vec2>,
    /// Trailing centroid samples, oldest first.
    pub trail: Vec<Vec2>,
    /// Color used for particles.
    pub particle_color: Color,
    /// Color used for the centroid trail.
    pub trail_color: Color,
    /// Turn the particles were captured at.
    pub turn: u32,
}

impl PhaseSpacePlot {
    /// Creates an empty phase-space plot with the standard view range.
    pub fn new() -> Result<Self, RenderingError> {
        let limit = PHASE_SPACE_LIMIT;
        Ok(Self {
            area: PlotArea::new(
                PlotAxis::new("q", -limit, limit, 0.1, 0.2)?,
                PlotAxis::new("p", -limit, limit, 0.1, 0.2)?,
            ),
            particles: Vec::new(),
            trail: Vec::new(),
            particle_color: Color::from_rgb_u8(0x00, 0x00, 0x80).with_alpha(0.6),
            trail_color: Color::from_rgb_u8(0xff, 0x00, 0x00).with_alpha(0.9),
            turn: 0,
        })
    }

    /// Caption drawn in the corner of the plot.
    #[must_use]
    pub fn caption(&self) -> String {
        format!("Turn {}", self.turn)
    }
}

/// Line plot of the centroid position recorded at the monitor each turn.
#[derive(Clone, Debug, PartialEq)]
pub struct CentroidTracePlot {
    /// Axes spanning turn against mean position.
    pub area: PlotArea,
    /// `(turn, mean q)` samples in turn order.
    pub samples: Vec<Vec2>,
    /// Color of the trace line.
    pub line_color: Color,
    /// Color of the current-turn marker.
    pub marker_color: Color,
}

impl CentroidTracePlot {
    /// Title drawn above the trace.
    pub const TITLE: &'static str = "Centroid q vs turn";

    /// Creates an empty trace whose turn axis covers a run of `max_turns`.
    pub fn new(max_turns: u32) -> Result<Self, RenderingError> {
        let final_turn = max_turns.saturating_sub(1).max(1) as f32;
        Ok(Self {
            area: PlotArea::new(
                PlotAxis::new("Turn", 0.0, final_turn, 20.0, 50.0)?,
                PlotAxis::new("<q>", -CENTROID_LIMIT, CENTROID_LIMIT, 0.05, 0.05)?,
            ),
            samples: Vec::new(),
            line_color: Color::from_rgb_u8(0x1a, 0x1a, 0x1a).with_alpha(0.85),
            marker_color: Color::from_rgb_u8(0xff, 0x00, 0x00).with_alpha(0.9),
        })
    }

    /// Most recent sample, highlighted by renderers.
    #[must_use]
    pub fn current(&self) -> Option<Vec2> {
        self.samples.last().copied()
    }

    /// Mean position of the current sample printed with four decimals.
    #[must_use]
    pub fn current_label(&self) -> Option<String> {
        self.current().map(|sample| format!("q̄ = {:.4}", sample.y))
    }
}

/// Slider bounds and display precision exposed by the control panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliderRange {
    /// Smallest selectable value.
    pub min: f32,
    /// Largest selectable value.
    pub max: f32,
    /// Number of decimals the slider value is displayed and committed with.
    pub decimals: u8,
}

impl SliderRange {
    /// Creates a slider range.
    #[must_use]
    pub const fn new(min: f32, max: f32, decimals: u8) -> Self {
        Self { min, max, decimals }
    }

    /// Rounds a slider position to the displayed precision.
    ///
    /// The result is the `f64` closest to the decimal shown next to the
    /// slider, so `0.31` stays `0.31` instead of widening the `f32` error.
    #[must_use]
    pub fn snap(&self, value: f32) -> f64 {
        let scale = 10_f64.powi(i32::from(self.decimals));
        (f64::from(value) * scale).round() / scale
    }

    /// Formats a slider value with the displayed precision.
    #[must_use]
    pub fn format(&self, value: f32) -> String {
        format!("{:.*}", usize::from(self.decimals), value)
    }
}

/// State mirrored by the interactive control panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPanelView {
    /// Whether the run is advancing on its own.
    pub playback: PlaybackState,
    /// Central tune `Q0`.
    pub tune: f32,
    /// Tune spread `sigmaQ`.
    pub tune_spread: f32,
    /// Initial momentum kick.
    pub kick: f32,
    /// Current turn.
    pub turn: u32,
    /// Turn budget of the run.
    pub max_turns: u32,
}

impl ControlPanelView {
    /// Selectable range of the central tune.
    pub const TUNE_RANGE: SliderRange = SliderRange::new(0.0, 0.5, 3);
    /// Selectable range of the tune spread.
    pub const TUNE_SPREAD_RANGE: SliderRange = SliderRange::new(0.0, 0.01, 4);
    /// Selectable range of the kick.
    pub const KICK_RANGE: SliderRange = SliderRange::new(0.0, 0.3, 3);

    /// Label of the play/pause button for the current state.
    #[must_use]
    pub const fn play_button_label(&self) -> &'static str {
        match self.playback {
            PlaybackState::Idle => "Play",
            PlaybackState::Running => "Pause",
        }
    }

    /// Text describing how far the run has progressed.
    #[must_use]
    pub fn progress_label(&self) -> String {
        format!("Turn {} / {}", self.turn, self.max_turns.saturating_sub(1))
    }
}

impl Default for ControlPanelView {
    fn default() -> Self {
        Self {
            playback: PlaybackState::Idle,
            tune: 0.0,
            tune_spread: 0.0,
            kick: 0.0,
            turn: 0,
            max_turns: 1,
        }
    }
}

/// Describes everything a backend draws in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Ensemble scatter with centroid trail.
    pub phase_space: PhaseSpacePlot,
    /// Centroid history at the monitor.
    pub centroid_trace: CentroidTracePlot,
    /// Controls and their current values.
    pub control_panel: ControlPanelView,
}

impl Scene {
    /// Creates an empty scene sized for a run of `max_turns`.
    pub fn new(max_turns: u32) -> Result<Self, RenderingError> {
        Ok(Self {
            phase_space: PhaseSpacePlot::new()?,
            centroid_trace: CentroidTracePlot::new(max_turns)?,
            control_panel: ControlPanelView {
                max_turns,
                ..ControlPanelView::default()
            },
        })
    }
}

/// Describes how the scene should be presented.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting Optics Lab scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the simulated frame delta,
    /// per-frame input captured by the adapter, and may mutate the scene before
    /// it is rendered.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq)]
pub enum RenderingError {
    /// Axis bounds must be finite and strictly increasing.
    InvalidAxisRange {
        /// Provided lower bound.
        min: f32,
        /// Provided upper bound.
        max: f32,
    },
    /// Grid and tick spacing must be positive.
    InvalidAxisStep {
        /// Provided spacing that failed validation.
        step: f32,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAxisRange { min, max } => {
                write!(f, "axis range must be increasing (received {min}..{max})")
            }
            Self::InvalidAxisStep { step } => {
                write!(f, "axis spacing must be positive (received {step})")
            }
        }
    }
}

impl Error for RenderingError {}
