// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Marker table and editing panel.
//!
//! Shows the current frame's markers in display units, the new-marker
//! name entry with its live validation message, rename/delete for the
//! selected marker, and the tracking trigger with the job status line.

use crate::track::workflow::TrackingWorkflow;

/// Result of marker-panel interaction.
pub enum MarkersAction {
    None,
    Select(String),
    Delete(String),
    Rename { from: String, to: String },
    Track,
}

/// Panel-local input state.
#[derive(Default)]
pub struct MarkersPanel {
    pub name_input: String,
    pub rename_input: String,
    /// When set, the next canvas click places the named marker.
    pub placing: bool,
}

/// Display the marker panel and return the requested action.
pub fn show(
    ui: &mut egui::Ui,
    workflow: &TrackingWorkflow,
    panel: &mut MarkersPanel,
) -> MarkersAction {
    let mut action = MarkersAction::None;
    let locked = workflow.editing_locked();

    ui.heading("Markers");
    ui.separator();

    ui.label("New marker name:");
    ui.add_enabled(!locked, egui::TextEdit::singleline(&mut panel.name_input));

    let validation = workflow.validate_label(&panel.name_input);
    if let Err(message) = &validation {
        if !panel.name_input.is_empty() {
            ui.label(
                egui::RichText::new(message)
                    .small()
                    .color(egui::Color32::LIGHT_RED),
            );
        }
    }

    let can_place = validation.is_ok() && !locked;
    if !can_place {
        panel.placing = false;
    }
    let place_text = if panel.placing {
        "Click the frame to place..."
    } else {
        "Place marker"
    };
    if ui
        .add_enabled(can_place, egui::SelectableLabel::new(panel.placing, place_text))
        .clicked()
    {
        panel.placing = !panel.placing;
    }

    ui.separator();

    let selected = workflow.selected_marker();
    let units = workflow.scale().units;
    egui::Grid::new("marker_table").striped(true).show(ui, |ui| {
        ui.label(egui::RichText::new("marker").weak());
        ui.label(egui::RichText::new(format!("x ({units})")).weak());
        ui.label(egui::RichText::new(format!("y ({units})")).weak());
        ui.label("");
        ui.end_row();

        for row in workflow.markers() {
            let is_selected = selected.as_deref() == Some(row.label.as_str());
            if ui.selectable_label(is_selected, &row.label).clicked() {
                action = MarkersAction::Select(row.label.clone());
            }
            ui.label(format!("{:.1}", row.x));
            ui.label(format!("{:.1}", row.y));
            if ui.add_enabled(!locked, egui::Button::new("🗑")).clicked() {
                action = MarkersAction::Delete(row.label.clone());
            }
            ui.end_row();
        }
    });

    if let Some(selected) = &selected {
        ui.separator();
        ui.label(format!("Rename \"{selected}\":"));
        ui.add_enabled(!locked, egui::TextEdit::singleline(&mut panel.rename_input));
        let rename_ok = !locked && workflow.validate_label(&panel.rename_input).is_ok();
        if ui.add_enabled(rename_ok, egui::Button::new("Rename")).clicked() {
            action = MarkersAction::Rename {
                from: selected.clone(),
                to: panel.rename_input.trim().to_string(),
            };
            panel.rename_input.clear();
        }
    }

    ui.separator();
    if workflow.connected() {
        if ui
            .add_enabled(workflow.can_track(), egui::Button::new("▶ Track to end"))
            .clicked()
        {
            action = MarkersAction::Track;
        }
    } else {
        ui.label(
            egui::RichText::new("Local mode - tracking unavailable")
                .weak()
                .small(),
        );
    }

    ui.add_space(6.0);
    ui.label(egui::RichText::new(workflow.status()).weak());

    action
}
