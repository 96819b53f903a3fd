#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for Optics Lab.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! The adapter uses Macroquad's immediate-mode UI module so the control panel
//! can host buttons and sliders. All UI-specific calls live inside the local
//! `ui` module to avoid leaking Macroquad UI types throughout the renderer.

mod ui;

use self::ui::{draw_control_panel_ui, ControlPanelUiContext, ControlPanelUiResult};
use anyhow::Result;
use glam::Vec2;
use macroquad::math::Vec2 as MacroquadVec2;
use macroquad::{
    color::WHITE,
    input::{is_key_pressed, is_mouse_button_down, KeyCode, MouseButton},
    shapes::{draw_circle, draw_line, draw_rectangle, draw_rectangle_lines},
    text::{draw_text, measure_text},
};
use optics_lab_core::ParameterEdit;
use optics_lab_rendering::{
    CentroidTracePlot, Color, ControlPanelView, FrameInput, PhaseSpacePlot, PlotArea, PlotAxis,
    Presentation, RenderingBackend, Scene,
};
use std::time::Duration;

const PANEL_WIDTH: f32 = 280.0;
const PLOT_MARGIN: f32 = 48.0;
const PARTICLE_SIZE: f32 = 2.0;
const TRAIL_RADIUS: f32 = 3.0;
const MARKER_RADIUS: f32 = 4.0;
const LABEL_FONT_SIZE: f32 = 16.0;
const TITLE_FONT_SIZE: f32 = 20.0;

/// Tracks UI-sourced interactions so they can be merged with physical input on the next frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlPanelInputState {
    toggle_play_latched: bool,
    step_latched: bool,
    reset_latched: bool,
    edit_latched: Option<ParameterEdit>,
}

impl ControlPanelInputState {
    /// Returns whether the UI requested play/pause and clears the latch so the
    /// action fires only once.
    pub fn take_toggle_play(&mut self) -> bool {
        let latched = self.toggle_play_latched;
        self.toggle_play_latched = false;
        latched
    }

    /// Records that the play/pause button was pressed this frame.
    pub fn register_toggle_play(&mut self) {
        self.toggle_play_latched = true;
    }

    /// Returns whether the UI requested a single step, clearing the latch.
    pub fn take_step(&mut self) -> bool {
        let latched = self.step_latched;
        self.step_latched = false;
        latched
    }

    /// Records that the step button was pressed this frame.
    pub fn register_step(&mut self) {
        self.step_latched = true;
    }

    /// Returns whether the UI requested a reset, clearing the latch.
    pub fn take_reset(&mut self) -> bool {
        let latched = self.reset_latched;
        self.reset_latched = false;
        latched
    }

    /// Records that the reset button was pressed this frame.
    pub fn register_reset(&mut self) {
        self.reset_latched = true;
    }

    /// Returns the latched slider edit, clearing it so the edit applies once.
    pub fn take_parameter_edit(&mut self) -> Option<ParameterEdit> {
        self.edit_latched.take()
    }

    /// Records a slider edit committed this frame. A later edit replaces an
    /// earlier one that was not yet taken.
    pub fn register_parameter_edit(&mut self, edit: ParameterEdit) {
        self.edit_latched = Some(edit);
    }
}

/// Slider values being dragged alongside the values last sent to the run.
///
/// Slider movement only updates the draft. The change is committed once the
/// pointer is released so a drag produces a single reset instead of one per frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SliderDraft {
    /// Central tune shown by the slider.
    pub tune: f32,
    /// Tune spread shown by the slider.
    pub tune_spread: f32,
    /// Kick shown by the slider.
    pub kick: f32,
    committed: [f32; 3],
}

impl SliderDraft {
    /// Creates a draft mirroring the values displayed by the control panel.
    #[must_use]
    pub fn from_view(view: &ControlPanelView) -> Self {
        let values = [view.tune, view.tune_spread, view.kick];
        Self {
            tune: values[0],
            tune_spread: values[1],
            kick: values[2],
            committed: values,
        }
    }

    /// Returns `true` while the draft differs from the last committed values.
    #[must_use]
    pub fn has_pending_change(&self) -> bool {
        self.values() != self.committed
    }

    /// Adopts the values displayed by the control panel unless a change is pending.
    pub fn sync(&mut self, view: &ControlPanelView) {
        if !self.has_pending_change() {
            *self = Self::from_view(view);
        }
    }

    /// Returns the edit for the first slider that moved, once the pointer is released.
    ///
    /// The edit carries the value rounded to the slider's displayed precision.
    /// Only one edit is produced per call; further pending changes surface on
    /// later calls.
    pub fn commit(&mut self, pointer_down: bool) -> Option<ParameterEdit> {
        if pointer_down {
            return None;
        }

        let values = self.values();
        let index = (0..values.len()).find(|&index| values[index] != self.committed[index])?;
        self.committed[index] = values[index];
        let value = values[index];
        Some(match index {
            0 => ParameterEdit::Tune(ControlPanelView::TUNE_RANGE.snap(value)),
            1 => ParameterEdit::TuneSpread(ControlPanelView::TUNE_SPREAD_RANGE.snap(value)),
            _ => ParameterEdit::Kick(ControlPanelView::KICK_RANGE.snap(value)),
        })
    }

    fn values(&self) -> [f32; 3] {
        [self.tune, self.tune_spread, self.kick]
    }
}

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
    /// `Space` toggles playback.
    toggle_play: bool,
    /// `S` advances a single turn.
    step: bool,
    /// `R` redraws the ensemble.
    reset: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            toggle_play: is_key_pressed(KeyCode::Space),
            step: is_key_pressed(KeyCode::S),
            reset: is_key_pressed(KeyCode::R),
        }
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs frame rate metrics once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }
}

/// Tracks the average frames-per-second produced by the render loop.
#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
    render_accum: Duration,
}

#[derive(Clone, Copy, Debug)]
struct FpsMetrics {
    per_second: f32,
    avg_render: Duration,
}

impl FpsCounter {
    /// Records a rendered frame and returns the averages once one second has elapsed.
    fn record_frame(&mut self, frame: Duration, render: Duration) -> Option<FpsMetrics> {
        self.elapsed += frame;
        self.frames = self.frames.saturating_add(1);
        self.render_accum += render;

        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let seconds = self.elapsed.as_secs_f32();
        let metrics = FpsMetrics {
            per_second: self.frames as f32 / seconds,
            avg_render: self.render_accum / self.frames,
        };
        *self = Self::default();
        Some(metrics)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: 1280,
            window_height: 720,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let panel_background = to_macroquad_color(Color::from_rgb_u8(36, 36, 40));
            let mut fps_counter = FpsCounter::default();
            let mut control_panel_input = ControlPanelInputState::default();
            let mut slider_draft = SliderDraft::from_view(&scene.control_panel);

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    log::info!("quit requested");
                    break;
                }

                macroquad::window::clear_background(background);

                let screen_width = macroquad::window::screen_width();
                let screen_height = macroquad::window::screen_height();

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));
                let frame_input = FrameInput {
                    toggle_play: keyboard.toggle_play | control_panel_input.take_toggle_play(),
                    step: keyboard.step | control_panel_input.take_step(),
                    reset: keyboard.reset | control_panel_input.take_reset(),
                    parameter_edit: control_panel_input.take_parameter_edit(),
                };

                update_scene(frame_dt, frame_input, &mut scene);
                slider_draft.sync(&scene.control_panel);

                let render_start = std::time::Instant::now();
                let layout = SceneLayout::from_screen(screen_width, screen_height);
                draw_phase_space(&scene.phase_space, &layout.phase_space);
                draw_centroid_trace(&scene.centroid_trace, &layout.centroid_trace);

                let panel = layout.control_panel;
                draw_rectangle(panel.x, panel.y, panel.width, panel.height, panel_background);
                let mut control_panel_ui = macroquad::ui::root_ui();
                let ControlPanelUiResult {
                    toggle_play,
                    step,
                    reset,
                } = draw_control_panel_ui(
                    &mut control_panel_ui,
                    ControlPanelUiContext {
                        origin: MacroquadVec2::new(panel.x, panel.y),
                        size: MacroquadVec2::new(panel.width, panel.height),
                        background: panel_background,
                        view: scene.control_panel,
                    },
                    &mut slider_draft,
                );
                if toggle_play {
                    control_panel_input.register_toggle_play();
                }
                if step {
                    control_panel_input.register_step();
                }
                if reset {
                    control_panel_input.register_reset();
                }
                if let Some(edit) =
                    slider_draft.commit(is_mouse_button_down(MouseButton::Left))
                {
                    log::debug!("slider committed {edit:?}");
                    control_panel_input.register_parameter_edit(edit);
                }

                let render_duration = render_start.elapsed();
                if let Some(FpsMetrics {
                    per_second,
                    avg_render,
                }) = fps_counter.record_frame(frame_dt, render_duration)
                {
                    if show_fps {
                        log::info!(
                            "FPS: {:.2} | render: {:>6.2}ms",
                            per_second,
                            avg_render.as_secs_f64() * 1_000.0,
                        );
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

/// Screen-space rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ScreenRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl ScreenRect {
    /// Maps a data point of `area` into this rectangle.
    fn map(&self, area: &PlotArea, point: Vec2) -> Vec2 {
        let unit = area.to_unit(point);
        Vec2::new(self.x + unit.x * self.width, self.y + unit.y * self.height)
    }

    fn x_at(&self, axis: &PlotAxis, value: f32) -> f32 {
        self.x + axis.normalize(value) * self.width
    }

    fn y_at(&self, axis: &PlotAxis, value: f32) -> f32 {
        self.y + (1.0 - axis.normalize(value)) * self.height
    }

    fn bottom(&self) -> f32 {
        self.y + self.height
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Placement of both plots and the control panel on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SceneLayout {
    phase_space: ScreenRect,
    centroid_trace: ScreenRect,
    control_panel: ScreenRect,
}

impl SceneLayout {
    fn from_screen(screen_width: f32, screen_height: f32) -> Self {
        let panel_width = PANEL_WIDTH.min(screen_width);
        let plots_width = (screen_width - panel_width).max(0.0);
        let plot_width = ((plots_width - 3.0 * PLOT_MARGIN) / 2.0).max(0.0);
        let side = plot_width.min((screen_height - 2.0 * PLOT_MARGIN).max(0.0));
        let top = ((screen_height - side) / 2.0).max(0.0);

        Self {
            phase_space: ScreenRect {
                x: PLOT_MARGIN,
                y: top,
                width: side,
                height: side,
            },
            centroid_trace: ScreenRect {
                x: 2.0 * PLOT_MARGIN + plot_width,
                y: top,
                width: plot_width,
                height: side,
            },
            control_panel: ScreenRect {
                x: plots_width,
                y: 0.0,
                width: panel_width,
                height: screen_height,
            },
        }
    }
}

fn draw_phase_space(plot: &PhaseSpacePlot, rect: &ScreenRect) {
    draw_plot_frame(&plot.area, rect);

    let particle_color = to_macroquad_color(plot.particle_color);
    for &particle in plot.particles.iter().filter(|&&p| plot.area.contains(p)) {
        let position = rect.map(&plot.area, particle);
        draw_rectangle(
            position.x - PARTICLE_SIZE / 2.0,
            position.y - PARTICLE_SIZE / 2.0,
            PARTICLE_SIZE,
            PARTICLE_SIZE,
            particle_color,
        );
    }

    let trail_color = to_macroquad_color(plot.trail_color);
    for &sample in plot.trail.iter().filter(|&&p| plot.area.contains(p)) {
        let position = rect.map(&plot.area, sample);
        draw_circle(position.x, position.y, TRAIL_RADIUS, trail_color);
    }

    let _ = draw_text(
        &plot.caption(),
        rect.x + 8.0,
        rect.y + TITLE_FONT_SIZE,
        TITLE_FONT_SIZE,
        WHITE,
    );
}

fn draw_centroid_trace(plot: &CentroidTracePlot, rect: &ScreenRect) {
    draw_plot_frame(&plot.area, rect);

    let line_color = to_macroquad_color(plot.line_color.lighten(0.8));
    let points: Vec<Vec2> = plot
        .samples
        .iter()
        .map(|&sample| rect.map(&plot.area, clamp_to_area(&plot.area, sample)))
        .collect();
    for segment in points.windows(2) {
        draw_line(
            segment[0].x,
            segment[0].y,
            segment[1].x,
            segment[1].y,
            2.0,
            line_color,
        );
    }

    if let Some(current) = plot.current() {
        let position = rect.map(&plot.area, clamp_to_area(&plot.area, current));
        draw_circle(
            position.x,
            position.y,
            MARKER_RADIUS,
            to_macroquad_color(plot.marker_color),
        );
    }

    let _ = draw_text(
        CentroidTracePlot::TITLE,
        rect.x,
        rect.y - 12.0,
        TITLE_FONT_SIZE,
        WHITE,
    );
    if let Some(label) = plot.current_label() {
        let _ = draw_text(
            &label,
            rect.x + 8.0,
            rect.y + TITLE_FONT_SIZE,
            LABEL_FONT_SIZE,
            WHITE,
        );
    }
}

/// Draws grid lines, zero axes, tick labels and axis labels for a plot.
fn draw_plot_frame(area: &PlotArea, rect: &ScreenRect) {
    let grid_color = macroquad::color::Color::new(1.0, 1.0, 1.0, 0.08);
    let axis_color = macroquad::color::Color::new(1.0, 1.0, 1.0, 0.35);
    let label_color = macroquad::color::Color::new(1.0, 1.0, 1.0, 0.7);

    for value in area.x.grid_values() {
        let x = rect.x_at(&area.x, value);
        draw_line(x, rect.y, x, rect.bottom(), 1.0, grid_color);
    }
    for value in area.y.grid_values() {
        let y = rect.y_at(&area.y, value);
        draw_line(rect.x, y, rect.right(), y, 1.0, grid_color);
    }

    if area.x.contains(0.0) {
        let x = rect.x_at(&area.x, 0.0);
        draw_line(x, rect.y, x, rect.bottom(), 1.0, axis_color);
    }
    if area.y.contains(0.0) {
        let y = rect.y_at(&area.y, 0.0);
        draw_line(rect.x, y, rect.right(), y, 1.0, axis_color);
    }
    draw_rectangle_lines(rect.x, rect.y, rect.width, rect.height, 1.0, axis_color);

    for value in area.x.tick_values() {
        let label = tick_label(value, area.x.tick_step);
        let width = measure_text(&label, None, LABEL_FONT_SIZE as u16, 1.0).width;
        let _ = draw_text(
            &label,
            rect.x_at(&area.x, value) - width / 2.0,
            rect.bottom() + LABEL_FONT_SIZE,
            LABEL_FONT_SIZE,
            label_color,
        );
    }
    for value in area.y.tick_values() {
        let label = tick_label(value, area.y.tick_step);
        let width = measure_text(&label, None, LABEL_FONT_SIZE as u16, 1.0).width;
        let _ = draw_text(
            &label,
            rect.x - width - 6.0,
            rect.y_at(&area.y, value) + LABEL_FONT_SIZE / 4.0,
            LABEL_FONT_SIZE,
            label_color,
        );
    }

    let x_label_width = measure_text(&area.x.label, None, LABEL_FONT_SIZE as u16, 1.0).width;
    let _ = draw_text(
        &area.x.label,
        rect.x + (rect.width - x_label_width) / 2.0,
        rect.bottom() + 2.0 * LABEL_FONT_SIZE + 4.0,
        LABEL_FONT_SIZE,
        label_color,
    );
    let _ = draw_text(
        &area.y.label,
        rect.x - PLOT_MARGIN + 4.0,
        rect.y - 12.0,
        LABEL_FONT_SIZE,
        label_color,
    );
}

/// Keeps a trace sample on screen when it leaves the vertical axis range.
fn clamp_to_area(area: &PlotArea, point: Vec2) -> Vec2 {
    Vec2::new(
        point.x.clamp(area.x.min, area.x.max),
        point.y.clamp(area.y.min, area.y.max),
    )
}

/// Formats a tick value with as many decimals as its spacing needs.
fn tick_label(value: f32, step: f32) -> String {
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 4 && (scaled - scaled.round()).abs() > 1e-3 {
        scaled *= 10.0;
        decimals += 1;
    }
    let value = if value.abs() < step * 1e-3 { 0.0 } else { value };
    format!("{value:.decimals$}")
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_labels_use_step_precision() {
        assert_eq!(tick_label(0.2, 0.2), "0.2");
        assert_eq!(tick_label(-0.4, 0.2), "-0.4");
        assert_eq!(tick_label(0.15, 0.05), "0.15");
        assert_eq!(tick_label(150.0, 50.0), "150");
        assert_eq!(tick_label(-1e-9, 0.1), "0.0");
    }

    #[test]
    fn layout_keeps_panel_on_the_right() {
        let layout = SceneLayout::from_screen(1280.0, 720.0);

        assert_eq!(layout.control_panel.x, 1000.0);
        assert_eq!(layout.control_panel.width, PANEL_WIDTH);
        assert!(layout.phase_space.right() < layout.centroid_trace.x);
        assert!(layout.centroid_trace.right() <= layout.control_panel.x);
        assert_eq!(layout.phase_space.width, layout.phase_space.height);
    }

    #[test]
    fn layout_never_produces_negative_sizes() {
        let layout = SceneLayout::from_screen(100.0, 50.0);

        for rect in [layout.phase_space, layout.centroid_trace, layout.control_panel] {
            assert!(rect.width >= 0.0);
            assert!(rect.height >= 0.0);
        }
    }

    #[test]
    fn screen_rect_maps_plot_corners() {
        let plot = PhaseSpacePlot::new().expect("valid axes");
        let rect = ScreenRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 200.0,
        };

        assert_eq!(rect.map(&plot.area, Vec2::new(-0.5, 0.5)), Vec2::new(10.0, 20.0));
        assert_eq!(rect.map(&plot.area, Vec2::new(0.5, -0.5)), Vec2::new(110.0, 220.0));
        assert_eq!(rect.map(&plot.area, Vec2::ZERO), Vec2::new(60.0, 120.0));
    }

    #[test]
    fn trace_samples_are_clamped_to_the_axis() {
        let plot = CentroidTracePlot::new(10).expect("valid axes");

        let clamped = clamp_to_area(&plot.area, Vec2::new(3.0, 0.9));

        assert_eq!(clamped, Vec2::new(3.0, plot.area.y.max));
    }

    #[test]
    fn fps_counter_reports_average_frames_per_second() {
        let mut counter = FpsCounter::default();
        let frame = Duration::from_millis(250);
        let render = Duration::from_millis(2);
        assert!(counter.record_frame(frame, render).is_none());
        assert!(counter.record_frame(frame, render).is_none());
        assert!(counter.record_frame(frame, render).is_none());

        let metrics = counter
            .record_frame(frame, render)
            .expect("should report FPS after one second of samples");
        assert!((metrics.per_second - 4.0).abs() <= 1e-3);
        assert_eq!(metrics.avg_render, render);
        assert!(counter.record_frame(frame, render).is_none());
    }
}
