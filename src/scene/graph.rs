// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Retained scene graph with hit-testing, dragging and coalesced redraw.
//!
//! Items are kept in insertion order, which is also paint order; the
//! selected item is always painted last so drag feedback is never
//! occluded. Redraw requests only mark the scene dirty - the display
//! list is rebuilt at most once per host paint, when the UI asks for it.

use crate::scene::item::{DrawCmd, Item, ItemKind, Point};
use crate::scene::InvalidArgument;
use crate::util::geometry;

/// Notification produced by a drag mutation, consumed by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// The selected item was moved to a new position (drag in progress).
    ItemMoved(usize),
    /// A drag ended on the given item.
    ItemMoveFinished(usize),
}

/// The ordered item collection plus selection and zoom state.
pub struct SceneGraph {
    items: Vec<Item>,
    selected: Option<usize>,
    zoom: f64,
    natural_size: (u32, u32),
    dirty: bool,
    front: Vec<DrawCmd>,
}

impl SceneGraph {
    pub fn new(natural_size: (u32, u32)) -> Self {
        Self {
            items: Vec::new(),
            selected: None,
            zoom: 1.0,
            natural_size,
            dirty: true,
            front: Vec::new(),
        }
    }

    /// Validate and append an item; insertion order is paint order.
    pub fn add_item(&mut self, item: Item) -> Result<usize, InvalidArgument> {
        item.validate()?;
        self.items.push(item);
        self.dirty = true;
        Ok(self.items.len() - 1)
    }

    /// Remove every item and drop the selection.
    pub fn clear_items(&mut self) {
        self.items.clear();
        self.selected = None;
        self.dirty = true;
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Mutable access to one item; marks the scene dirty.
    pub fn item_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.dirty = true;
        self.items.get_mut(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Select an item explicitly (e.g. from the marker table).
    pub fn select(&mut self, index: usize) {
        if index < self.items.len() {
            self.selected = Some(index);
            self.dirty = true;
        }
    }

    pub fn deselect(&mut self) {
        if self.selected.take().is_some() {
            self.dirty = true;
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Set the zoom factor; the surface rescales to natural size x factor.
    pub fn set_zoom(&mut self, factor: f64) -> Result<(), InvalidArgument> {
        if factor <= 0.0 || !factor.is_finite() {
            return Err(InvalidArgument("zoom factor must be positive"));
        }
        self.zoom = factor;
        self.dirty = true;
        Ok(())
    }

    pub fn natural_size(&self) -> (u32, u32) {
        self.natural_size
    }

    pub fn set_natural_size(&mut self, size: (u32, u32)) {
        self.natural_size = size;
        self.dirty = true;
    }

    /// Current surface size: natural size scaled by the zoom factor.
    pub fn surface_size(&self) -> (f32, f32) {
        (
            self.natural_size.0 as f32 * self.zoom as f32,
            self.natural_size.1 as f32 * self.zoom as f32,
        )
    }

    /// Find the topmost draggable item under a surface position.
    ///
    /// The position is divided by the zoom factor before testing, so the
    /// same model point is hit at every zoom level. Later items win over
    /// earlier ones (they paint on top).
    pub fn hit_test(&self, surface_pos: Point) -> Option<usize> {
        let p = geometry::surface_to_model(surface_pos, self.zoom);
        self.items
            .iter()
            .enumerate()
            .rev()
            .find(|(_, item)| item.draggable && item.contains_point(p))
            .map(|(index, _)| index)
    }

    /// Start a drag interaction at a surface position.
    ///
    /// Clears any prior selection, then selects the hit item (if any).
    /// Returns the selected index so the caller can update the cursor
    /// affordance.
    pub fn begin_drag(&mut self, surface_pos: Point) -> Option<usize> {
        self.deselect();
        if let Some(index) = self.hit_test(surface_pos) {
            self.selected = Some(index);
            self.dirty = true;
            Some(index)
        } else {
            None
        }
    }

    /// Move the selected item to a new surface position.
    ///
    /// No-op when nothing is selected. Overwrites the item position and
    /// requests a redraw.
    pub fn update_drag(&mut self, surface_pos: Point) -> Option<SceneEvent> {
        let index = self.selected?;
        let pos = geometry::surface_to_model(surface_pos, self.zoom);
        self.items[index].pos = pos;
        self.dirty = true;
        Some(SceneEvent::ItemMoved(index))
    }

    /// Finish the drag interaction: clear selection and request a redraw.
    pub fn end_drag(&mut self) -> Option<SceneEvent> {
        let index = self.selected.take()?;
        self.dirty = true;
        Some(SceneEvent::ItemMoveFinished(index))
    }

    /// Whether a drag is currently holding an item.
    pub fn dragging(&self) -> bool {
        self.selected.is_some()
    }

    /// Request a repaint. Multiple requests coalesce into a single
    /// display-list rebuild at the next `display_list` call.
    pub fn redraw(&mut self) {
        self.dirty = true;
    }

    /// The display list for the current scene state.
    ///
    /// Rebuilds only when dirty; otherwise returns the previously built
    /// list unchanged.
    pub fn display_list(&mut self) -> &[DrawCmd] {
        if self.dirty {
            self.rebuild();
            self.dirty = false;
        }
        &self.front
    }

    fn rebuild(&mut self) {
        self.front.clear();

        // The clear pass is skipped only when the first item is a resolved
        // background exactly covering the surface.
        let skip_clear = self
            .items
            .first()
            .map(|item| self.covers_surface(item))
            .unwrap_or(false);
        if !skip_clear {
            self.front.push(DrawCmd::Clear);
        }

        for (index, item) in self.items.iter().enumerate() {
            if Some(index) != self.selected {
                item.emit(self.zoom, &mut self.front);
            }
        }
        // Selected item last: drag feedback paints on top of everything.
        if let Some(index) = self.selected {
            if let Some(item) = self.items.get(index) {
                item.emit(self.zoom, &mut self.front);
            }
        }
    }

    fn covers_surface(&self, item: &Item) -> bool {
        if !item.fills_bounds() {
            return false;
        }
        match item.kind {
            ItemKind::Background { width, height, .. } => {
                item.pos == Point::new(0.0, 0.0)
                    && width == self.natural_size.0
                    && height == self.natural_size.1
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::DecodedImage;
    use crate::scene::item::ImageSlot;
    use std::sync::Arc;

    fn marker(name: &str, x: f64, y: f64) -> Item {
        Item::marker(name, Point::new(x, y), 6.0, [255, 0, 0, 255], [0, 0, 0, 255])
    }

    fn resolved_background(key: usize, w: u32, h: u32) -> Item {
        let mut bg = Item::background(key, w, h);
        if let ItemKind::Background { image, .. } = &mut bg.kind {
            *image = ImageSlot::Ready(Arc::new(DecodedImage {
                width: w,
                height: h,
                pixels: vec![0; (w * h * 4) as usize],
            }));
        }
        bg
    }

    #[test]
    fn test_hit_test_zoom_invariance() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("ankle", 100.0, 100.0)).unwrap();

        // At zoom 1 the marker is hit at its model position.
        assert_eq!(graph.hit_test(Point::new(100.0, 100.0)), Some(0));

        // At zoom f the same model point is hit at f times the position.
        for zoom in [0.5, 2.0, 3.25] {
            graph.set_zoom(zoom).unwrap();
            assert_eq!(graph.hit_test(Point::new(100.0 * zoom, 100.0 * zoom)), Some(0));
            assert_eq!(graph.hit_test(Point::new(400.0 * zoom, 400.0 * zoom)), None);
        }
    }

    #[test]
    fn test_hit_test_topmost_wins() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("below", 50.0, 50.0)).unwrap();
        graph.add_item(marker("above", 52.0, 50.0)).unwrap();

        // Both markers overlap at (51, 50); the later (topmost) one wins.
        assert_eq!(graph.hit_test(Point::new(51.0, 50.0)), Some(1));
    }

    #[test]
    fn test_selected_item_paints_last() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("first", 10.0, 10.0)).unwrap();
        graph.add_item(marker("second", 50.0, 50.0)).unwrap();
        graph.add_item(marker("third", 90.0, 90.0)).unwrap();
        graph.select(0);

        let texts: Vec<String> = graph
            .display_list()
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCmd::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["second", "third", "first"]);
    }

    #[test]
    fn test_clear_skipped_for_full_surface_background() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(resolved_background(0, 640, 480)).unwrap();
        graph.add_item(marker("head", 10.0, 10.0)).unwrap();

        assert!(!matches!(graph.display_list().first(), Some(DrawCmd::Clear)));

        // An unresolved or undersized background still needs the clear pass.
        graph.clear_items();
        graph.add_item(Item::background(0, 640, 480)).unwrap();
        assert!(matches!(graph.display_list().first(), Some(DrawCmd::Clear)));

        graph.clear_items();
        graph.add_item(resolved_background(0, 320, 240)).unwrap();
        assert!(matches!(graph.display_list().first(), Some(DrawCmd::Clear)));
    }

    #[test]
    fn test_display_list_rebuild_coalesces() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("head", 10.0, 10.0)).unwrap();

        graph.redraw();
        graph.redraw();
        let len = graph.display_list().len();
        // A second call without changes returns the same list.
        assert_eq!(graph.display_list().len(), len);
    }

    #[test]
    fn test_drag_lifecycle() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("knee", 100.0, 100.0)).unwrap();

        // Nothing selected: update is a no-op.
        assert_eq!(graph.update_drag(Point::new(10.0, 10.0)), None);
        assert_eq!(graph.end_drag(), None);

        assert_eq!(graph.begin_drag(Point::new(102.0, 99.0)), Some(0));
        assert!(graph.dragging());

        assert_eq!(
            graph.update_drag(Point::new(120.0, 130.0)),
            Some(SceneEvent::ItemMoved(0))
        );
        assert_eq!(graph.items()[0].pos, Point::new(120.0, 130.0));

        assert_eq!(graph.end_drag(), Some(SceneEvent::ItemMoveFinished(0)));
        assert!(!graph.dragging());
        assert_eq!(graph.selected(), None);
    }

    #[test]
    fn test_drag_positions_respect_zoom() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("hip", 100.0, 100.0)).unwrap();
        graph.set_zoom(2.0).unwrap();

        assert_eq!(graph.begin_drag(Point::new(200.0, 200.0)), Some(0));
        graph.update_drag(Point::new(300.0, 240.0));
        // Stored position is in model units.
        assert_eq!(graph.items()[0].pos, Point::new(150.0, 120.0));
    }

    #[test]
    fn test_begin_drag_clears_prior_selection() {
        let mut graph = SceneGraph::new((640, 480));
        graph.add_item(marker("a---", 100.0, 100.0)).unwrap();
        graph.select(0);

        // Miss: the old selection must not survive.
        assert_eq!(graph.begin_drag(Point::new(500.0, 400.0)), None);
        assert_eq!(graph.selected(), None);
    }

    #[test]
    fn test_add_item_validates() {
        let mut graph = SceneGraph::new((640, 480));
        let mut bad = marker("head", 0.0, 0.0);
        bad.name.clear();
        assert!(graph.add_item(bad).is_err());
        assert!(graph.items().is_empty());
    }

    #[test]
    fn test_set_zoom_rejects_non_positive() {
        let mut graph = SceneGraph::new((640, 480));
        assert!(graph.set_zoom(0.0).is_err());
        assert!(graph.set_zoom(-1.5).is_err());
        assert!(graph.set_zoom(2.0).is_ok());
        assert_eq!(graph.surface_size(), (1280.0, 960.0));
    }
}
