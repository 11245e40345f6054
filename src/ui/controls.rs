// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Playback transport controls.
//!
//! Every widget's enabled state comes straight from the sequencer's
//! control-state function; nothing is toggled here.

use crate::track::workflow::TrackingWorkflow;

/// Result of transport interaction.
pub enum ControlsAction {
    None,
    First,
    StepBack,
    PlayReverse,
    Stop,
    PlayForward,
    StepForward,
    Last,
    Scrub(usize),
    ToggleLoop(bool),
    ToggleBounce(bool),
}

/// Display the transport bar with playback buttons and the scrubber.
pub fn show(ui: &mut egui::Ui, workflow: &TrackingWorkflow) -> ControlsAction {
    let mut action = ControlsAction::None;
    let controls = workflow.controls();
    let frame_count = workflow.frame_count();

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 6.0;

        if ui.add_enabled(controls.first, egui::Button::new("⏮")).clicked() {
            action = ControlsAction::First;
        }
        if ui.add_enabled(controls.step_back, egui::Button::new("⏴")).clicked() {
            action = ControlsAction::StepBack;
        }
        if ui.add_enabled(controls.play_reverse, egui::Button::new("◀")).clicked() {
            action = ControlsAction::PlayReverse;
        }
        if ui.add_enabled(controls.stop, egui::Button::new("⏹")).clicked() {
            action = ControlsAction::Stop;
        }
        if ui.add_enabled(controls.play_forward, egui::Button::new("▶")).clicked() {
            action = ControlsAction::PlayForward;
        }
        if ui.add_enabled(controls.step_forward, egui::Button::new("⏵")).clicked() {
            action = ControlsAction::StepForward;
        }
        if ui.add_enabled(controls.last, egui::Button::new("⏭")).clicked() {
            action = ControlsAction::Last;
        }

        ui.separator();

        let mut frame = workflow.frame_number();
        let max = frame_count.saturating_sub(1);
        let scrubber = egui::Slider::new(&mut frame, 0..=max).show_value(false);
        if ui.add_enabled(controls.scrub, scrubber).changed() {
            action = ControlsAction::Scrub(frame);
        }
        if frame_count > 0 {
            ui.label(format!("Frame {} / {}", workflow.frame_number() + 1, frame_count));
        } else {
            ui.label("No frames");
        }

        ui.separator();

        let locked = workflow.editing_locked();
        let mut looping = workflow.looping();
        if ui
            .add_enabled(!locked, egui::Checkbox::new(&mut looping, "Loop"))
            .changed()
        {
            action = ControlsAction::ToggleLoop(looping);
        }
        let mut bounce = workflow.bounce();
        if ui
            .add_enabled(!locked, egui::Checkbox::new(&mut bounce, "Bounce"))
            .changed()
        {
            action = ControlsAction::ToggleBounce(bounce);
        }
    });

    action
}
