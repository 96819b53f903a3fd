//! Immediate-mode UI helpers for the Macroquad rendering backend.
//!
//! This module hosts all uses of `macroquad::ui` so the rest of the adapter can
//! remain agnostic of Macroquad's UI types.

use macroquad::{
    color::{Color, WHITE},
    math::{RectOffset, Vec2},
    ui::{hash, Ui},
};
use optics_lab_rendering::ControlPanelView;

use crate::SliderDraft;

/// Outcome of rendering the control panel UI during the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ControlPanelUiResult {
    /// Whether the play/pause button was pressed.
    pub toggle_play: bool,
    /// Whether the step button was pressed.
    pub step: bool,
    /// Whether the reset button was pressed.
    pub reset: bool,
}

/// Snapshot of the control panel's UI layout and data for the current frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ControlPanelUiContext {
    /// Top-left corner of the panel in screen coordinates.
    pub origin: Vec2,
    /// Panel dimensions in screen space.
    pub size: Vec2,
    /// Background colour applied to the window skin so the UI matches the
    /// adapter's solid rectangle.
    pub background: Color,
    /// Values mirrored from the scene.
    pub view: ControlPanelView,
}

/// Renders the control panel's buttons and sliders for the current frame.
///
/// Slider movements are written into `draft`; committing them is left to the
/// caller so edits only fire once the pointer is released.
pub(crate) fn draw_control_panel_ui(
    ui: &mut Ui,
    context: ControlPanelUiContext,
    draft: &mut SliderDraft,
) -> ControlPanelUiResult {
    let mut skin = ui.default_skin();
    skin.margin = 0.0;

    let window_style = ui
        .style_builder()
        .color(context.background)
        .color_hovered(context.background)
        .color_clicked(context.background)
        .color_selected(context.background)
        .color_selected_hovered(context.background)
        .color_inactive(context.background)
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(16.0, 16.0, 16.0, 16.0))
        .build();
    skin.window_style = window_style;

    let label_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(0.0, 0.0, 4.0, 4.0))
        .build();
    skin.label_style = label_style;

    let button_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .color(Color::from_rgba(70, 70, 70, 255))
        .color_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_clicked(Color::from_rgba(56, 56, 56, 255))
        .color_selected(Color::from_rgba(70, 70, 70, 255))
        .color_selected_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_inactive(Color::from_rgba(56, 56, 56, 200))
        .margin(RectOffset::new(0.0, 0.0, 8.0, 8.0))
        .build();
    skin.button_style = button_style;

    ui.push_skin(&skin);

    let view = context.view;
    let mut result = ControlPanelUiResult::default();
    let _ = ui.window(hash!("control_panel"), context.origin, context.size, |ui| {
        ui.label(None, view.progress_label().as_str());

        result.toggle_play = ui.button(None, view.play_button_label());
        result.step = ui.button(None, "Step");
        result.reset = ui.button(None, "Reset");

        ui.separator();

        let tune = ControlPanelView::TUNE_RANGE;
        ui.label(None, format!("Q0 = {}", tune.format(draft.tune)).as_str());
        ui.slider(hash!("tune"), "Q0", tune.min..tune.max, &mut draft.tune);

        let spread = ControlPanelView::TUNE_SPREAD_RANGE;
        ui.label(None, format!("sigmaQ = {}", spread.format(draft.tune_spread)).as_str());
        ui.slider(
            hash!("tune_spread"),
            "sigmaQ",
            spread.min..spread.max,
            &mut draft.tune_spread,
        );

        let kick = ControlPanelView::KICK_RANGE;
        ui.label(None, format!("kick = {}", kick.format(draft.kick)).as_str());
        ui.slider(hash!("kick"), "kick", kick.min..kick.max, &mut draft.kick);

        ui.separator();
        ui.label(None, "Space: play/pause  S: step  R: reset");
    });

    ui.pop_skin();

    result
}
