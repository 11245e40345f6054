// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing canvas for frame display and marker interaction.
//!
//! Paints the scene's display list into the panel and normalizes pointer
//! input (mouse, touch, pen all arrive as one pointer stream) into
//! surface-space drag actions for the workflow. The canvas never mutates
//! the workflow itself; the application applies the returned action.

use std::collections::HashMap;

use crate::io::media::DecodedImage;
use crate::scene::item::{DrawCmd, ImageSlot, Point, Rgba};
use crate::track::workflow::TrackingWorkflow;

const CLEAR_COLOR: egui::Color32 = egui::Color32::from_gray(40);

/// Result of canvas interaction.
pub enum CanvasAction {
    None,
    DragStart(Point),
    DragMove(Point),
    DragEnd,
    Click(Point),
}

/// GPU textures for background images, keyed by frame index.
///
/// Decoded pixels live in the frame cache; only the frame on screen
/// keeps an uploaded texture.
pub struct TextureStore {
    textures: HashMap<usize, egui::TextureHandle>,
}

impl Default for TextureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureStore {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }

    fn get_or_upload(
        &mut self,
        ctx: &egui::Context,
        key: usize,
        image: &DecodedImage,
    ) -> egui::TextureId {
        if !self.textures.contains_key(&key) {
            let size = [image.width as usize, image.height as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &image.pixels);
            let handle = ctx.load_texture(
                format!("frame-{key}"),
                color_image,
                egui::TextureOptions::LINEAR,
            );
            self.textures.retain(|k, _| *k == key);
            self.textures.insert(key, handle);
        }
        self.textures[&key].id()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

/// Display the canvas and return the pointer interaction, if any.
pub fn show(
    ui: &mut egui::Ui,
    workflow: &mut TrackingWorkflow,
    textures: &mut TextureStore,
) -> CanvasAction {
    let mut action = CanvasAction::None;
    ui.style_mut().visuals.extreme_bg_color = CLEAR_COLOR;

    let (surface_w, surface_h) = workflow.surface_size();
    if surface_w <= 0.0 || surface_h <= 0.0 {
        ui.centered_and_justified(|ui| {
            ui.label(
                egui::RichText::new("Waiting for movie metadata...")
                    .color(egui::Color32::from_gray(180)),
            );
        });
        return action;
    }

    egui::Frame::canvas(ui.style()).show(ui, |ui| {
        egui::ScrollArea::both().show(ui, |ui| {
            let (rect, response) = ui.allocate_exact_size(
                egui::vec2(surface_w, surface_h),
                egui::Sense::click_and_drag(),
            );
            let origin = rect.min;

            if response.drag_started() {
                if let Some(pos) = response.interact_pointer_pos() {
                    action = CanvasAction::DragStart(to_surface(pos, origin));
                }
            } else if response.dragged() {
                if let Some(pos) = response.interact_pointer_pos() {
                    action = CanvasAction::DragMove(to_surface(pos, origin));
                }
            } else if response.drag_stopped() {
                action = CanvasAction::DragEnd;
            } else if response.clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    action = CanvasAction::Click(to_surface(pos, origin));
                }
            }

            // Cursor affordance: grabbing while dragging, grab over a
            // draggable item.
            if workflow.dragging() {
                ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
            } else if let Some(hover) = response.hover_pos() {
                if workflow.hit_test(to_surface(hover, origin)).is_some() {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
                }
            }

            let painter = ui.painter_at(rect);
            for cmd in workflow.display_list() {
                match cmd {
                    DrawCmd::Clear => {
                        painter.rect_filled(rect, 0.0, CLEAR_COLOR);
                    }
                    DrawCmd::Image {
                        key,
                        image,
                        pos,
                        size,
                    } => {
                        let image_rect = egui::Rect::from_min_size(
                            origin + egui::vec2(pos.x as f32, pos.y as f32),
                            egui::vec2(size.0 as f32, size.1 as f32),
                        );
                        match image {
                            ImageSlot::Ready(decoded) => {
                                let texture = textures.get_or_upload(ui.ctx(), *key, decoded);
                                painter.image(
                                    texture,
                                    image_rect,
                                    egui::Rect::from_min_max(
                                        egui::pos2(0.0, 0.0),
                                        egui::pos2(1.0, 1.0),
                                    ),
                                    egui::Color32::WHITE,
                                );
                            }
                            ImageSlot::Pending | ImageSlot::Failed => {
                                let message = if matches!(image, ImageSlot::Pending) {
                                    "Loading frame..."
                                } else {
                                    "Frame image unavailable"
                                };
                                painter.rect_filled(image_rect, 0.0, egui::Color32::from_gray(60));
                                painter.text(
                                    image_rect.center(),
                                    egui::Align2::CENTER_CENTER,
                                    message,
                                    egui::FontId::proportional(14.0),
                                    egui::Color32::from_gray(160),
                                );
                            }
                        }
                    }
                    DrawCmd::Circle {
                        center,
                        radius,
                        fill,
                        stroke,
                    } => {
                        let center = origin + egui::vec2(center.x as f32, center.y as f32);
                        painter.circle_filled(center, *radius as f32, color32(*fill));
                        painter.circle_stroke(
                            center,
                            *radius as f32,
                            egui::Stroke::new(1.5, color32(*stroke)),
                        );
                    }
                    DrawCmd::Segment {
                        from,
                        to,
                        width,
                        color,
                    } => {
                        painter.line_segment(
                            [
                                origin + egui::vec2(from.x as f32, from.y as f32),
                                origin + egui::vec2(to.x as f32, to.y as f32),
                            ],
                            egui::Stroke::new(*width, color32(*color)),
                        );
                    }
                    DrawCmd::Text { pos, text, color } => {
                        painter.text(
                            origin + egui::vec2(pos.x as f32, pos.y as f32),
                            egui::Align2::LEFT_TOP,
                            text,
                            egui::FontId::proportional(13.0),
                            color32(*color),
                        );
                    }
                }
            }
        });
    });

    action
}

fn to_surface(pos: egui::Pos2, origin: egui::Pos2) -> Point {
    Point::new((pos.x - origin.x) as f64, (pos.y - origin.y) as f64)
}

fn color32(rgba: Rgba) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(rgba[0], rgba[1], rgba[2], rgba[3])
}
