// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawable item types.
//!
//! This module defines the closed set of things that can be placed on the
//! drawing surface: point markers, line segments, text labels and the
//! frame background image. Hit-testing and draw-command emission are
//! resolved per variant by pattern matching.

use std::sync::Arc;

use crate::io::media::DecodedImage;
use crate::scene::InvalidArgument;
use crate::util::geometry;

/// RGBA color, 8 bits per channel.
pub type Rgba = [u8; 4];

/// A 2D point in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Resolution state of a background image.
///
/// Images resolve asynchronously; a frame can be shown before its
/// background has arrived, and a background that never arrives must not
/// block the rest of the scene.
#[derive(Debug, Clone)]
pub enum ImageSlot {
    /// Fetch in flight (or not yet started).
    Pending,
    /// Decoded pixels available for display.
    Ready(Arc<DecodedImage>),
    /// All load attempts exhausted.
    Failed,
}

/// Variant-specific item data.
#[derive(Debug, Clone)]
pub enum ItemKind {
    /// A named, draggable point annotation drawn as a filled circle.
    Marker {
        radius: f64,
        fill: Rgba,
        stroke: Rgba,
    },
    /// A line segment from the item position to `end` (relative to the
    /// position, so dragging moves the whole segment).
    Line { end: Point, width: f32, color: Rgba },
    /// A piece of text anchored at the item position.
    Label { text: String, color: Rgba },
    /// The frame background image. `key` identifies the frame whose pixels
    /// fill this slot; the UI uses it to address the uploaded texture.
    Background {
        key: usize,
        image: ImageSlot,
        width: u32,
        height: u32,
    },
}

/// A drawable, optionally selectable/draggable unit on the surface.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub pos: Point,
    pub draggable: bool,
    pub kind: ItemKind,
}

impl Item {
    /// Create a draggable marker item.
    pub fn marker(name: impl Into<String>, pos: Point, radius: f64, fill: Rgba, stroke: Rgba) -> Self {
        Self {
            name: name.into(),
            pos,
            draggable: true,
            kind: ItemKind::Marker { radius, fill, stroke },
        }
    }

    /// Create a non-draggable line segment item.
    pub fn line(name: impl Into<String>, from: Point, to: Point, width: f32, color: Rgba) -> Self {
        Self {
            name: name.into(),
            pos: from,
            draggable: false,
            kind: ItemKind::Line {
                end: Point::new(to.x - from.x, to.y - from.y),
                width,
                color,
            },
        }
    }

    /// Create a non-draggable text label item.
    pub fn label(name: impl Into<String>, pos: Point, text: impl Into<String>, color: Rgba) -> Self {
        Self {
            name: name.into(),
            pos,
            draggable: false,
            kind: ItemKind::Label {
                text: text.into(),
                color,
            },
        }
    }

    /// Create the background image item for frame `key`.
    pub fn background(key: usize, width: u32, height: u32) -> Self {
        Self {
            name: format!("frame {key}"),
            pos: Point::new(0.0, 0.0),
            draggable: false,
            kind: ItemKind::Background {
                key,
                image: ImageSlot::Pending,
                width,
                height,
            },
        }
    }

    /// Whether this item paints every pixel of its bounds when drawn.
    ///
    /// Only resolved background images qualify; the redraw pass uses this
    /// to skip the clear step when the background already covers the
    /// surface.
    pub fn fills_bounds(&self) -> bool {
        matches!(
            self.kind,
            ItemKind::Background {
                image: ImageSlot::Ready(_),
                ..
            }
        )
    }

    /// Validate required fields before the item enters a scene.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if self.name.is_empty() {
            return Err(InvalidArgument("item name must not be empty"));
        }
        match &self.kind {
            ItemKind::Marker { radius, .. } if *radius <= 0.0 => {
                Err(InvalidArgument("marker radius must be positive"))
            }
            ItemKind::Label { text, .. } if text.is_empty() => {
                Err(InvalidArgument("label text must not be empty"))
            }
            ItemKind::Background { width, height, .. } if *width == 0 || *height == 0 => {
                Err(InvalidArgument("background image must have a non-zero size"))
            }
            _ => Ok(()),
        }
    }

    /// Hit-test in model (unzoomed) coordinates.
    ///
    /// A point exactly on a marker's boundary counts as inside.
    pub fn contains_point(&self, p: Point) -> bool {
        match &self.kind {
            ItemKind::Marker { radius, .. } => {
                geometry::dist_sq(p, self.pos) <= radius * radius
            }
            ItemKind::Line { end, width, .. } => {
                let to = Point::new(self.pos.x + end.x, self.pos.y + end.y);
                geometry::segment_dist(p, self.pos, to) <= (*width as f64 / 2.0).max(3.0)
            }
            ItemKind::Label { .. } | ItemKind::Background { .. } => false,
        }
    }

    /// Append this item's draw commands, scaled to surface coordinates.
    pub(crate) fn emit(&self, zoom: f64, out: &mut Vec<DrawCmd>) {
        let pos = geometry::model_to_surface(self.pos, zoom);
        match &self.kind {
            ItemKind::Marker { radius, fill, stroke } => {
                let r = radius * zoom;
                out.push(DrawCmd::Circle {
                    center: pos,
                    radius: r,
                    fill: *fill,
                    stroke: *stroke,
                });
                out.push(DrawCmd::Text {
                    pos: Point::new(pos.x + r + 3.0, pos.y - r),
                    text: self.name.clone(),
                    color: *stroke,
                });
            }
            ItemKind::Line { end, width, color } => {
                out.push(DrawCmd::Segment {
                    from: pos,
                    to: Point::new(pos.x + end.x * zoom, pos.y + end.y * zoom),
                    width: *width,
                    color: *color,
                });
            }
            ItemKind::Label { text, color } => {
                out.push(DrawCmd::Text {
                    pos,
                    text: text.clone(),
                    color: *color,
                });
            }
            ItemKind::Background { key, image, width, height } => {
                out.push(DrawCmd::Image {
                    key: *key,
                    image: image.clone(),
                    pos,
                    size: (*width as f64 * zoom, *height as f64 * zoom),
                });
            }
        }
    }
}

/// One entry of the rebuilt display list, in surface coordinates.
#[derive(Debug, Clone)]
pub enum DrawCmd {
    /// Fill the whole surface with the background color.
    Clear,
    /// Blit a background image (or a placeholder while it resolves).
    Image {
        key: usize,
        image: ImageSlot,
        pos: Point,
        size: (f64, f64),
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Rgba,
        stroke: Rgba,
    },
    Segment {
        from: Point,
        to: Point,
        width: f32,
        color: Rgba,
    },
    Text {
        pos: Point,
        text: String,
        color: Rgba,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_hit_boundary_counts_as_inside() {
        let m = Item::marker("knee", Point::new(10.0, 10.0), 5.0, [255, 0, 0, 255], [0, 0, 0, 255]);
        assert!(m.contains_point(Point::new(15.0, 10.0))); // exactly on the boundary
        assert!(m.contains_point(Point::new(12.0, 12.0)));
        assert!(!m.contains_point(Point::new(15.1, 10.0)));
    }

    #[test]
    fn test_background_never_hit() {
        let bg = Item::background(0, 640, 480);
        assert!(!bg.contains_point(Point::new(100.0, 100.0)));
        assert!(!bg.draggable);
    }

    #[test]
    fn test_validate_rejects_bad_items() {
        let mut m = Item::marker("head", Point::new(0.0, 0.0), 5.0, [0; 4], [0; 4]);
        assert!(m.validate().is_ok());

        m.name.clear();
        assert!(m.validate().is_err());

        let bad_radius = Item::marker("head", Point::new(0.0, 0.0), 0.0, [0; 4], [0; 4]);
        assert!(bad_radius.validate().is_err());

        let bad_bg = Item::background(0, 0, 480);
        assert!(bad_bg.validate().is_err());
    }

    #[test]
    fn test_fills_bounds_requires_resolved_image() {
        let mut bg = Item::background(0, 640, 480);
        assert!(!bg.fills_bounds());

        if let ItemKind::Background { image, .. } = &mut bg.kind {
            *image = ImageSlot::Ready(Arc::new(DecodedImage {
                width: 640,
                height: 480,
                pixels: vec![0; 640 * 480 * 4],
            }));
        }
        assert!(bg.fills_bounds());
    }
}
