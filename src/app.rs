// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! This module contains the main application structure that implements
//! the egui::App trait, pumping background events into the workflow,
//! driving the playback timer, and wiring UI actions to workflow
//! operations.

use std::time::{Duration, Instant};

use crate::cli::Args;
use crate::io::media;
use crate::scene::item::Item;
use crate::track::workflow::{TrackingWorkflow, WorkflowDelegate};
use crate::ui::canvas::{self, CanvasAction, TextureStore};
use crate::ui::controls::{self, ControlsAction};
use crate::ui::markers::{self, MarkersAction, MarkersPanel};

/// Zoom step applied by the View menu.
const ZOOM_STEP: f64 = 1.25;

/// Repaint cadence while background work is pending.
const BUSY_REPAINT: Duration = Duration::from_millis(100);

/// Logs marker-move notifications; the default injected delegate.
struct LogDelegate;

impl WorkflowDelegate for LogDelegate {
    fn on_item_move_finished(&mut self, item: &Item) {
        log::info!(
            "marker {:?} moved to ({:.1}, {:.1})",
            item.name,
            item.pos.x,
            item.pos.y
        );
    }
}

/// Main application state.
pub struct TracsApp {
    /// The annotation engine for the loaded movie, if any
    workflow: Option<TrackingWorkflow>,

    /// Marker-panel input state
    panel: MarkersPanel,

    /// Uploaded background textures
    textures: TextureStore,

    /// Decoded-frame cache capacity for newly opened movies
    cache_capacity: usize,
}

impl TracsApp {
    /// Create the application from the command-line session config.
    pub fn new(args: &Args) -> Self {
        let workflow = match (&args.server, &args.api_key, args.movie) {
            (Some(server), Some(api_key), Some(movie)) => {
                let mut workflow =
                    TrackingWorkflow::connect(server.clone(), api_key.clone(), movie, args.cache);
                workflow.set_delegate(Box::new(LogDelegate));
                workflow.set_on_load(Box::new(|| log::info!("first frame image resolved")));
                Some(workflow)
            }
            _ => match &args.file {
                Some(path) => Self::open_path(path, args.cache),
                None => None,
            },
        };

        Self {
            workflow,
            panel: MarkersPanel::default(),
            textures: TextureStore::new(),
            cache_capacity: args.cache,
        }
    }

    fn open_path(path: &std::path::Path, cache_capacity: usize) -> Option<TrackingWorkflow> {
        match media::open_local(path) {
            Ok(local) => {
                log::info!("opened {}", path.display());
                let mut workflow = TrackingWorkflow::open_local(local, cache_capacity);
                workflow.set_delegate(Box::new(LogDelegate));
                Some(workflow)
            }
            Err(err) => {
                log::error!("failed to open {}: {err}", path.display());
                None
            }
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        // Only process if no text field is focused (to avoid stepping
        // frames while typing marker names)
        if ctx.wants_keyboard_input() {
            return;
        }
        let Some(workflow) = &mut self.workflow else {
            return;
        };
        let controls = workflow.controls();

        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            if workflow.is_playing() {
                workflow.stop();
            } else if controls.play_forward {
                workflow.play(1);
            }
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowRight)) && controls.step_forward {
            workflow.step(1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft)) && controls.step_back {
            workflow.step(-1);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Home)) && controls.first {
            workflow.goto_frame(0);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::End)) && controls.last {
            workflow.goto_frame(workflow.frame_count().saturating_sub(1));
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace)) {
            if let Some(label) = workflow.selected_marker() {
                if let Err(err) = workflow.delete_marker(&label) {
                    log::warn!("delete {label:?} failed: {err}");
                }
            }
        }
    }

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Video/Image...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Media", &["mp4", "avi", "mov", "jpg", "jpeg", "png", "bmp", "tiff", "tif"])
                            .pick_file()
                        {
                            self.textures.clear();
                            self.workflow = Self::open_path(&path, self.cache_capacity);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Open Image Sequence...").clicked() {
                        if let Some(path) = rfd::FileDialog::new().pick_folder() {
                            self.textures.clear();
                            self.workflow = Self::open_path(&path, self.cache_capacity);
                        }
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Zoom In").clicked() {
                        if let Some(workflow) = &mut self.workflow {
                            let zoom = workflow.zoom() * ZOOM_STEP;
                            if let Err(err) = workflow.set_zoom(zoom) {
                                log::warn!("zoom in rejected: {err}");
                            }
                        }
                        ui.close_menu();
                    }
                    if ui.button("Zoom Out").clicked() {
                        if let Some(workflow) = &mut self.workflow {
                            let zoom = workflow.zoom() / ZOOM_STEP;
                            if let Err(err) = workflow.set_zoom(zoom) {
                                log::warn!("zoom out rejected: {err}");
                            }
                        }
                        ui.close_menu();
                    }
                    if ui.button("Reset Zoom").clicked() {
                        if let Some(workflow) = &mut self.workflow {
                            let _ = workflow.set_zoom(1.0);
                        }
                        ui.close_menu();
                    }
                });

                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn show_welcome(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(20.0);
                    ui.heading(
                        egui::RichText::new("TRACS")
                            .size(32.0)
                            .color(egui::Color32::from_gray(200)),
                    );
                    ui.label(
                        egui::RichText::new("Tracked-point Annotation and Calibration System")
                            .size(14.0)
                            .color(egui::Color32::from_gray(150)),
                    );
                    ui.add_space(20.0);
                    ui.label(
                        egui::RichText::new("Open a movie to begin placing markers")
                            .color(egui::Color32::from_gray(180)),
                    );
                    ui.add_space(10.0);
                    ui.label(
                        egui::RichText::new(
                            "File → Open Video/Image...  or start with --server/--api-key/--movie",
                        )
                        .weak()
                        .color(egui::Color32::from_gray(130)),
                    );
                });
            });
        });
    }
}

impl eframe::App for TracsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Drain background work and advance the playback timer.
        if let Some(workflow) = &mut self.workflow {
            workflow.pump();
            workflow.update(Instant::now());
            if workflow.is_playing() {
                ctx.request_repaint_after(workflow.playback_interval());
            } else if workflow.busy() {
                ctx.request_repaint_after(BUSY_REPAINT);
            }
        }

        self.show_menu_bar(ctx);
        self.handle_keyboard(ctx);

        if self.workflow.is_none() {
            self.show_welcome(ctx);
            return;
        }

        // Marker panel (right side)
        if let Some(workflow) = &mut self.workflow {
            let markers_action = egui::SidePanel::right("markers")
                .default_width(260.0)
                .show(ctx, |ui| markers::show(ui, workflow, &mut self.panel))
                .inner;
            match markers_action {
                MarkersAction::Select(label) => workflow.select_marker(&label),
                MarkersAction::Delete(label) => {
                    if let Err(err) = workflow.delete_marker(&label) {
                        log::warn!("delete {label:?} failed: {err}");
                    }
                }
                MarkersAction::Rename { from, to } => {
                    if let Err(err) = workflow.rename_marker(&from, &to) {
                        log::warn!("rename {from:?} failed: {err}");
                    }
                }
                MarkersAction::Track => workflow.track_to_end(),
                MarkersAction::None => {}
            }

            // Transport bar (bottom)
            let transport_action = egui::TopBottomPanel::bottom("transport")
                .show(ctx, |ui| controls::show(ui, workflow))
                .inner;
            match transport_action {
                ControlsAction::First => workflow.goto_frame(0),
                ControlsAction::StepBack => workflow.step(-1),
                ControlsAction::PlayReverse => workflow.play(-1),
                ControlsAction::Stop => workflow.stop(),
                ControlsAction::PlayForward => workflow.play(1),
                ControlsAction::StepForward => workflow.step(1),
                ControlsAction::Last => {
                    workflow.goto_frame(workflow.frame_count().saturating_sub(1))
                }
                ControlsAction::Scrub(frame) => workflow.goto_frame(frame),
                ControlsAction::ToggleLoop(looping) => workflow.set_loop(looping),
                ControlsAction::ToggleBounce(bounce) => workflow.set_bounce(bounce),
                ControlsAction::None => {}
            }

            // Main canvas (center)
            let canvas_action = egui::CentralPanel::default()
                .show(ctx, |ui| canvas::show(ui, workflow, &mut self.textures))
                .inner;
            match canvas_action {
                CanvasAction::DragStart(pos) => {
                    workflow.begin_drag(pos);
                }
                CanvasAction::DragMove(pos) => workflow.update_drag(pos),
                CanvasAction::DragEnd => workflow.end_drag(),
                CanvasAction::Click(pos) => {
                    if self.panel.placing {
                        let model = workflow.surface_to_model(pos);
                        let name = self.panel.name_input.clone();
                        match workflow.add_marker(model.x, model.y, &name) {
                            Ok(()) => {
                                self.panel.name_input.clear();
                                self.panel.placing = false;
                            }
                            Err(err) => log::warn!("add marker failed: {err}"),
                        }
                    }
                }
                CanvasAction::None => {}
            }

            // Remote-error alert
            if let Some(message) = workflow.alert().map(str::to_string) {
                egui::Window::new("Tracking service")
                    .collapsible(false)
                    .resizable(false)
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        ui.label(message);
                        ui.add_space(8.0);
                        if ui.button("OK").clicked() {
                            workflow.dismiss_alert();
                        }
                    });
            }
        }
    }
}
