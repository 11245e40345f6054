// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The marker-annotation workflow.
//!
//! Sits on top of the frame sequencer and ties everything together:
//! marker lifecycle (add/rename/delete/move) with label validation,
//! synchronization of local edits to the tracking service, the
//! tracking-job lifecycle with its polling loop, and resolution of frame
//! background images through the LRU cache.
//!
//! All state mutation happens on the UI thread. Background threads only
//! report in through the event channel drained by [`TrackingWorkflow::pump`].

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::cache::FrameCache;
use crate::io::media::{self, DecodeWorker, DecodedImage, LocalMedia};
use crate::movie::frame::{Frame, FrameImage, TrackPoint};
use crate::movie::sequencer::{ControlStates, FrameSequencer};
use crate::remote::api::{ApiClient, MovieMetadata, RemoteError};
use crate::remote::tasks::RemoteTasks;
use crate::scene::graph::{SceneEvent, SceneGraph};
use crate::scene::item::{DrawCmd, ImageSlot, Item, ItemKind, Point, Rgba};
use crate::scene::InvalidArgument;
use crate::track::job::{AckOutcome, JobState, PollOutcome, TrackingJob};
use crate::track::scale::{self, ScaleInfo};
use crate::util::geometry;

/// Minimum marker label length, in characters.
pub const MIN_LABEL_LEN: usize = 4;
/// Interval between tracking-status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Marker circle radius in model units.
pub const MARKER_RADIUS: f64 = 6.0;

const MARKER_FILL: Rgba = [225, 66, 66, 200];
const MARKER_STROKE: Rgba = [255, 244, 130, 255];
const RULER_COLOR: Rgba = [120, 200, 255, 220];

/// Optional observer of marker-move interactions.
///
/// Absence of a delegate is a valid configuration; every hook defaults
/// to a no-op.
pub trait WorkflowDelegate {
    fn on_item_moved(&mut self, _item: &Item) {}
    fn on_item_move_finished(&mut self, _item: &Item) {}
}

/// Completion message from a background task.
#[derive(Debug)]
pub enum WorkflowEvent {
    /// A frame background image resolved (or gave up).
    FrameImage {
        frame: usize,
        result: Result<Arc<DecodedImage>, String>,
    },
    /// Acknowledgement of the track-queue request.
    QueueAck {
        generation: u64,
        result: Result<Option<String>, RemoteError>,
    },
    /// One tracking-status poll resolved.
    PollTick {
        generation: u64,
        result: Result<MovieMetadata, RemoteError>,
    },
    /// One frame's track points were pushed to the service.
    PointsSaved {
        seq: u64,
        frame: usize,
        result: Result<(), RemoteError>,
    },
    /// The movie (metadata, frames, points) finished loading.
    MovieLoaded {
        generation: u64,
        result: Result<LoadedMovie, RemoteError>,
    },
}

/// A fully described movie, ready to hand to the sequencer.
#[derive(Debug)]
pub struct LoadedMovie {
    pub width: u32,
    pub height: u32,
    pub status: String,
    pub frames: Vec<Frame>,
}

/// One row of the marker table, in display units.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRow {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// Top-level annotation engine: sequencer + marker editing + remote job.
pub struct TrackingWorkflow {
    sequencer: FrameSequencer,
    cache: FrameCache,
    remote: Option<RemoteTasks>,
    decode_worker: Option<DecodeWorker>,
    events_tx: Sender<WorkflowEvent>,
    events_rx: Receiver<WorkflowEvent>,
    job: TrackingJob,
    put_seq: u64,
    status: String,
    alert: Option<String>,
    scale: ScaleInfo,
    /// Scene indices of the ruler overlay (line, label) items.
    ruler_overlay: Option<(usize, usize)>,
    pending_fetch: Option<usize>,
    movie_loading: bool,
    loaded_once: bool,
    on_load: Option<Box<dyn FnOnce()>>,
    delegate: Option<Box<dyn WorkflowDelegate>>,
}

impl TrackingWorkflow {
    fn bare(cache_capacity: usize) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            sequencer: FrameSequencer::new(),
            cache: FrameCache::new(cache_capacity),
            remote: None,
            decode_worker: None,
            events_tx,
            events_rx,
            job: TrackingJob::new(),
            put_seq: 0,
            status: String::new(),
            alert: None,
            scale: ScaleInfo::default(),
            ruler_overlay: None,
            pending_fetch: None,
            movie_loading: false,
            loaded_once: false,
            on_load: None,
            delegate: None,
        }
    }

    /// Connect to a remote movie and start loading it.
    pub fn connect(
        server: impl Into<String>,
        api_key: impl Into<String>,
        movie_id: i64,
        cache_capacity: usize,
    ) -> Self {
        let mut workflow = Self::bare(cache_capacity);
        let tasks = RemoteTasks::new(
            ApiClient::new(server, api_key),
            movie_id,
            workflow.events_tx.clone(),
        );
        tasks.spawn_load_movie(tasks.generation());
        workflow.remote = Some(tasks);
        workflow.movie_loading = true;
        workflow.status = format!("Loading movie {movie_id}...");
        workflow
    }

    /// Open a local media source; tracking stays unavailable.
    pub fn open_local(media: LocalMedia, cache_capacity: usize) -> Self {
        let mut workflow = Self::bare(cache_capacity);
        let frame_count = media.frame_count.max(1);
        let natural_size = media.natural_size;
        workflow.decode_worker = Some(media::spawn_decode_worker(
            media.source,
            cache_capacity,
            workflow.events_tx.clone(),
        ));
        let frames = (0..frame_count)
            .map(|index| Frame::new(index, FrameImage::Media, Vec::new()))
            .collect();
        workflow.load_movie(frames, natural_size);
        workflow.status = format!("Opened local media ({frame_count} frames)");
        workflow
    }

    #[cfg(test)]
    pub(crate) fn offline(frames: Vec<Frame>, natural_size: (u32, u32)) -> Self {
        let mut workflow = Self::bare(8);
        workflow.load_movie(frames, natural_size);
        workflow
    }

    // ---- host hooks -----------------------------------------------------

    pub fn set_delegate(&mut self, delegate: Box<dyn WorkflowDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Register a callback fired once, when the first background image
    /// of the session resolves.
    pub fn set_on_load(&mut self, on_load: Box<dyn FnOnce()>) {
        if !self.loaded_once {
            self.on_load = Some(on_load);
        }
    }

    // ---- event pump -----------------------------------------------------

    /// Drain completed background work. Returns true when anything was
    /// handled (the host should repaint).
    pub fn pump(&mut self) -> bool {
        let mut activity = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            activity = true;
        }
        activity
    }

    fn handle_event(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::FrameImage { frame, result } => {
                if self.pending_fetch == Some(frame) {
                    self.pending_fetch = None;
                }
                match result {
                    Ok(image) => {
                        self.cache.insert(frame, image.clone());
                        self.resolve_background(frame, image);
                    }
                    Err(err) => {
                        // Retries are exhausted; the scene keeps rendering
                        // without this background.
                        warn!("frame {frame} image unavailable: {err}");
                        if frame == self.sequencer.frame_number() {
                            self.status = format!("Frame {frame} image unavailable");
                        }
                        self.mark_background_failed(frame);
                    }
                }
            }
            WorkflowEvent::QueueAck { generation, result } => {
                let ok = result.is_ok();
                match self.job.on_queue_ack(generation, ok) {
                    AckOutcome::Stale => {
                        debug!("stale queue acknowledgement (generation {generation}) discarded");
                    }
                    AckOutcome::Started => {
                        self.status = match result.ok().flatten() {
                            Some(message) => message,
                            None => "Tracking queued".to_string(),
                        };
                    }
                    AckOutcome::Cancelled => {
                        if let Some(remote) = &self.remote {
                            remote.supersede();
                        }
                        let err = match result {
                            Err(err) => err.to_string(),
                            Ok(_) => "request rejected".to_string(),
                        };
                        self.alert = Some(format!("Tracking request failed: {err}"));
                        self.status = "Tracking request failed".to_string();
                    }
                }
            }
            WorkflowEvent::PollTick { generation, result } => match result {
                Ok(metadata) => match self.job.on_poll(generation, &metadata.status) {
                    PollOutcome::Stale => {
                        debug!("stale poll result (generation {generation}) discarded");
                    }
                    PollOutcome::Progress => {
                        self.status = format!("Tracking: {}", metadata.status);
                    }
                    PollOutcome::Completed => {
                        self.status = "Tracking completed, loading frames...".to_string();
                        if let Some(remote) = &self.remote {
                            // One atomic bump disarms the poll loop; the
                            // reload runs under the fresh generation.
                            let generation = remote.supersede();
                            remote.spawn_load_movie(generation);
                            self.movie_loading = true;
                        }
                    }
                },
                Err(err) => {
                    if self.job.in_flight() {
                        warn!("tracking status poll failed: {err}");
                        self.status = format!("Tracking status unavailable: {err}");
                    }
                }
            },
            WorkflowEvent::PointsSaved { seq, frame, result } => {
                if seq != self.put_seq {
                    debug!("stale trackpoint save (seq {seq}) discarded");
                    return;
                }
                if let Err(err) = result {
                    // The local move stands; the user just learns the
                    // server copy is behind.
                    self.alert = Some(format!("Saving markers for frame {frame} failed: {err}"));
                }
            }
            WorkflowEvent::MovieLoaded { generation, result } => {
                let current = self.remote.as_ref().map(|r| r.generation()).unwrap_or(0);
                if generation != current {
                    debug!("stale movie load (generation {generation}) discarded");
                    return;
                }
                self.movie_loading = false;
                match result {
                    Ok(movie) => {
                        self.job.on_load_finished(true);
                        self.status = format!(
                            "{} - {} frame(s)",
                            movie.status,
                            movie.frames.len()
                        );
                        self.load_movie(movie.frames, (movie.width, movie.height));
                    }
                    Err(err) => {
                        self.job.on_load_finished(false);
                        self.alert = Some(format!("Failed to load movie: {err}"));
                        self.status = "Movie load failed".to_string();
                    }
                }
            }
        }
    }

    // ---- movie / frame handling ----------------------------------------

    /// Replace the frame array and show frame 0.
    pub fn load_movie(&mut self, frames: Vec<Frame>, natural_size: (u32, u32)) {
        self.cache.clear();
        self.pending_fetch = None;
        self.sequencer.load_movie(frames, natural_size);
        self.after_frame_change();
    }

    fn after_frame_change(&mut self) {
        self.ruler_overlay = None;
        self.populate_annotations();
        self.request_background();
    }

    fn populate_annotations(&mut self) {
        let points: Vec<TrackPoint> = self
            .sequencer
            .current_frame()
            .map(|frame| frame.points.clone())
            .unwrap_or_default();
        for point in &points {
            let item = Item::marker(
                &point.label,
                Point::new(point.x, point.y),
                MARKER_RADIUS,
                MARKER_FILL,
                MARKER_STROKE,
            );
            if let Err(err) = self.sequencer.scene_mut().add_item(item) {
                warn!("marker {:?} skipped: {err}", point.label);
            }
        }
        self.refresh_scale(&points);
    }

    fn refresh_scale(&mut self, points: &[TrackPoint]) {
        self.scale = scale::calculate_scale(points);
        self.update_ruler_overlay(points);
    }

    fn update_ruler_overlay(&mut self, points: &[TrackPoint]) {
        let Some((min_index, max_index)) = self.scale.ruler else {
            // Overlay items are removed by frame rebuilds, not here; a
            // momentarily degenerate ruler pair just stops updating them.
            return;
        };
        let from = Point::new(points[min_index].x, points[min_index].y);
        let to = Point::new(points[max_index].x, points[max_index].y);
        let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0 - 12.0);
        let text = format!("{:.3} mm/px", self.scale.scale);

        let scene = self.sequencer.scene_mut();
        match self.ruler_overlay {
            Some((line_index, label_index)) => {
                if let Some(item) = scene.item_mut(line_index) {
                    item.pos = from;
                    if let ItemKind::Line { end, .. } = &mut item.kind {
                        *end = Point::new(to.x - from.x, to.y - from.y);
                    }
                }
                if let Some(item) = scene.item_mut(label_index) {
                    item.pos = mid;
                    if let ItemKind::Label { text: t, .. } = &mut item.kind {
                        *t = text;
                    }
                }
            }
            None => {
                let line = scene.add_item(Item::line("ruler span", from, to, 2.0, RULER_COLOR));
                let label = scene.add_item(Item::label("ruler scale", mid, text, RULER_COLOR));
                if let (Ok(line_index), Ok(label_index)) = (line, label) {
                    self.ruler_overlay = Some((line_index, label_index));
                }
            }
        }
    }

    fn request_background(&mut self) {
        let frame_number = self.sequencer.frame_number();
        let Some(image) = self.sequencer.current_frame().map(|f| f.image.clone()) else {
            return;
        };
        if let Some(cached) = self.cache.get(frame_number) {
            self.resolve_background(frame_number, cached);
            return;
        }
        if self.pending_fetch == Some(frame_number) {
            return;
        }
        self.pending_fetch = Some(frame_number);
        match image {
            FrameImage::Remote => match &self.remote {
                Some(remote) => remote.spawn_fetch_frame(frame_number),
                None => self.pending_fetch = None,
            },
            FrameImage::File(path) => {
                media::spawn_load_file(self.events_tx.clone(), frame_number, path);
            }
            FrameImage::Media => match &self.decode_worker {
                Some(worker) => worker.request(frame_number),
                None => self.pending_fetch = None,
            },
        }
    }

    fn resolve_background(&mut self, frame: usize, image: Arc<DecodedImage>) {
        if frame != self.sequencer.frame_number() {
            return;
        }
        let scene = self.sequencer.scene_mut();
        if let Some(item) = scene.item_mut(0) {
            if let ItemKind::Background { image: slot, .. } = &mut item.kind {
                *slot = ImageSlot::Ready(image);
            }
        }
        scene.redraw();
        if !self.loaded_once {
            self.loaded_once = true;
            if let Some(on_load) = self.on_load.take() {
                on_load();
            }
        }
    }

    fn mark_background_failed(&mut self, frame: usize) {
        if frame != self.sequencer.frame_number() {
            return;
        }
        let scene = self.sequencer.scene_mut();
        if let Some(item) = scene.item_mut(0) {
            if let ItemKind::Background { image: slot, .. } = &mut item.kind {
                *slot = ImageSlot::Failed;
            }
        }
        scene.redraw();
    }

    /// Rebuild the current frame's scene after a structural marker edit.
    fn rebuild_current_frame(&mut self) {
        self.ruler_overlay = None;
        if self.sequencer.reload_current().is_some() {
            self.populate_annotations();
            self.request_background();
        }
    }

    // ---- marker lifecycle ----------------------------------------------

    /// Check a candidate marker label against the current frame.
    ///
    /// The error text doubles as the add-marker affordance message.
    pub fn validate_label(&self, label: &str) -> Result<(), String> {
        let label = label.trim();
        if label.chars().count() < MIN_LABEL_LEN {
            return Err(format!(
                "Marker names need at least {MIN_LABEL_LEN} characters"
            ));
        }
        let duplicate = self
            .sequencer
            .current_frame()
            .map(|frame| frame.points.iter().any(|p| p.label == label))
            .unwrap_or(false);
        if duplicate {
            return Err(format!(
                "A marker named \"{label}\" already exists in this frame"
            ));
        }
        Ok(())
    }

    /// Add a marker at a model-space position.
    pub fn add_marker(&mut self, x: f64, y: f64, label: &str) -> Result<(), String> {
        if self.editing_locked() {
            return Err("Markers are locked while a tracking job runs".to_string());
        }
        self.validate_label(label)?;
        let label = label.trim().to_string();
        let Some(frame) = self.sequencer.current_frame_mut() else {
            return Err("No frame loaded".to_string());
        };
        frame.points.push(TrackPoint::new(x, y, label));
        self.rebuild_current_frame();
        self.push_trackpoints();
        Ok(())
    }

    /// Rename a marker, keeping labels unique within the frame.
    pub fn rename_marker(&mut self, from: &str, to: &str) -> Result<(), String> {
        if self.editing_locked() {
            return Err("Markers are locked while a tracking job runs".to_string());
        }
        let to = to.trim();
        if from == to {
            return Ok(());
        }
        self.validate_label(to)?;
        let Some(frame) = self.sequencer.current_frame_mut() else {
            return Err("No frame loaded".to_string());
        };
        let Some(point) = frame.points.iter_mut().find(|p| p.label == from) else {
            return Err(format!("No marker named \"{from}\" in this frame"));
        };
        point.label = to.to_string();
        self.rebuild_current_frame();
        self.push_trackpoints();
        Ok(())
    }

    /// Delete a marker from the current frame.
    pub fn delete_marker(&mut self, label: &str) -> Result<(), String> {
        if self.editing_locked() {
            return Err("Markers are locked while a tracking job runs".to_string());
        }
        let Some(frame) = self.sequencer.current_frame_mut() else {
            return Err("No frame loaded".to_string());
        };
        let before = frame.points.len();
        frame.points.retain(|p| p.label != label);
        if frame.points.len() == before {
            return Err(format!("No marker named \"{label}\" in this frame"));
        }
        self.rebuild_current_frame();
        self.push_trackpoints();
        Ok(())
    }

    /// Push the current frame's full track-point set to the service.
    fn push_trackpoints(&mut self) {
        if self.remote.is_none() {
            return;
        }
        let Some(frame) = self.sequencer.current_frame() else {
            return;
        };
        let frame_number = frame.index;
        let points = frame.points.clone();
        self.put_seq += 1;
        let seq = self.put_seq;
        if let Some(remote) = &self.remote {
            remote.spawn_put_trackpoints(seq, frame_number, points);
        }
    }

    // ---- dragging -------------------------------------------------------

    /// Start a drag at a surface position; returns the hit item.
    pub fn begin_drag(&mut self, pos: Point) -> Option<usize> {
        if self.editing_locked() {
            return None;
        }
        self.sequencer.scene_mut().begin_drag(pos)
    }

    pub fn update_drag(&mut self, pos: Point) {
        if let Some(SceneEvent::ItemMoved(index)) = self.sequencer.scene_mut().update_drag(pos) {
            self.sync_moved_item(index);
            self.notify_delegate(index, false);
        }
    }

    pub fn end_drag(&mut self) {
        if let Some(SceneEvent::ItemMoveFinished(index)) = self.sequencer.scene_mut().end_drag() {
            self.sync_moved_item(index);
            self.notify_delegate(index, true);
            self.push_trackpoints();
        }
    }

    fn sync_moved_item(&mut self, index: usize) {
        let Some(item) = self.sequencer.scene().items().get(index) else {
            return;
        };
        let name = item.name.clone();
        let pos = item.pos;
        let mut ruler_moved = false;
        if let Some(frame) = self.sequencer.current_frame_mut() {
            if let Some(point) = frame.points.iter_mut().find(|p| p.label == name) {
                point.x = pos.x;
                point.y = pos.y;
                ruler_moved = scale::parse_ruler_label(&name).is_some();
            }
        }
        if ruler_moved {
            let points = self
                .sequencer
                .current_frame()
                .map(|frame| frame.points.clone())
                .unwrap_or_default();
            self.refresh_scale(&points);
        }
    }

    fn notify_delegate(&mut self, index: usize, finished: bool) {
        let Some(delegate) = self.delegate.as_mut() else {
            return;
        };
        if let Some(item) = self.sequencer.scene().items().get(index) {
            if finished {
                delegate.on_item_move_finished(item);
            } else {
                delegate.on_item_moved(item);
            }
        }
    }

    // ---- tracking job ---------------------------------------------------

    /// Queue the server-side tracking job from the current frame and
    /// start polling for completion. At most one job is in flight.
    pub fn track_to_end(&mut self) {
        if self.remote.is_none() {
            self.status = "Not connected to a tracking service".to_string();
            return;
        }
        if self.job.in_flight() {
            self.status = "A tracking job is already running".to_string();
            return;
        }
        let has_markers = self
            .sequencer
            .current_frame()
            .map(|frame| !frame.points.is_empty())
            .unwrap_or(false);
        if !has_markers {
            self.status = "Place at least one marker before tracking".to_string();
            return;
        }

        self.sequencer.stop();
        let frame_start = self.sequencer.frame_number();
        let Some(generation) = self.remote.as_ref().map(|r| r.supersede()) else {
            return;
        };
        self.job.begin(generation);
        if let Some(remote) = &self.remote {
            // The queue request and the poll loop run concurrently; the
            // first poll does not wait for the acknowledgement.
            remote.spawn_queue_request(generation, frame_start);
            remote.spawn_poll_loop(generation, POLL_INTERVAL);
        }
        self.status = "Tracking requested...".to_string();
    }

    // ---- playback / scene passthrough ----------------------------------

    pub fn play(&mut self, direction: i32) {
        if !self.editing_locked() {
            self.sequencer.play(direction);
        }
    }

    pub fn stop(&mut self) {
        self.sequencer.stop();
    }

    pub fn goto_frame(&mut self, n: usize) {
        if self.editing_locked() {
            return;
        }
        if self.sequencer.goto_frame(n).is_some() {
            self.after_frame_change();
        }
    }

    /// Step by a signed number of frames from the current one.
    pub fn step(&mut self, delta: i64) {
        let target = self.sequencer.frame_number() as i64 + delta;
        self.goto_frame(target.max(0) as usize);
    }

    /// Advance playback from the host repaint loop.
    pub fn update(&mut self, now: Instant) -> bool {
        if self.sequencer.update(now).is_some() {
            self.after_frame_change();
            true
        } else {
            false
        }
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.sequencer.set_loop(looping);
    }

    pub fn looping(&self) -> bool {
        self.sequencer.looping()
    }

    pub fn set_bounce(&mut self, bounce: bool) {
        self.sequencer.set_bounce(bounce);
    }

    pub fn bounce(&self) -> bool {
        self.sequencer.bounce()
    }

    pub fn set_zoom(&mut self, factor: f64) -> Result<(), InvalidArgument> {
        self.sequencer.scene_mut().set_zoom(factor)
    }

    pub fn zoom(&self) -> f64 {
        self.sequencer.scene().zoom()
    }

    pub fn scene(&self) -> &SceneGraph {
        self.sequencer.scene()
    }

    pub fn display_list(&mut self) -> &[DrawCmd] {
        self.sequencer.scene_mut().display_list()
    }

    pub fn dragging(&self) -> bool {
        self.sequencer.scene().dragging()
    }

    pub fn hit_test(&self, pos: Point) -> Option<usize> {
        self.sequencer.scene().hit_test(pos)
    }

    pub fn surface_size(&self) -> (f32, f32) {
        self.sequencer.scene().surface_size()
    }

    pub fn surface_to_model(&self, pos: Point) -> Point {
        geometry::surface_to_model(pos, self.zoom())
    }

    pub fn frame_number(&self) -> usize {
        self.sequencer.frame_number()
    }

    pub fn frame_count(&self) -> usize {
        self.sequencer.frame_count()
    }

    pub fn is_playing(&self) -> bool {
        self.sequencer.is_playing()
    }

    pub fn playback_interval(&self) -> Duration {
        self.sequencer.interval()
    }

    // ---- affordances / status ------------------------------------------

    pub fn controls(&self) -> ControlStates {
        self.sequencer.controls(self.editing_locked())
    }

    /// Edit and playback controls are held while a job is in flight.
    pub fn editing_locked(&self) -> bool {
        self.job.in_flight()
    }

    pub fn can_track(&self) -> bool {
        self.remote.is_some()
            && !self.job.in_flight()
            && self
                .sequencer
                .current_frame()
                .map(|frame| !frame.points.is_empty())
                .unwrap_or(false)
    }

    pub fn connected(&self) -> bool {
        self.remote.is_some()
    }

    pub fn job_state(&self) -> JobState {
        self.job.state()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Whether background work may deliver events soon; the host keeps
    /// scheduling repaints while this holds.
    pub fn busy(&self) -> bool {
        self.pending_fetch.is_some() || self.job.in_flight() || self.movie_loading
    }

    pub fn scale(&self) -> &ScaleInfo {
        &self.scale
    }

    /// The marker table projection for the current frame, in display
    /// units (millimeters when ruler calibration applies).
    pub fn markers(&self) -> Vec<MarkerRow> {
        let scale = self.scale.scale;
        self.sequencer
            .current_frame()
            .map(|frame| {
                frame
                    .points
                    .iter()
                    .map(|point| MarkerRow {
                        label: point.label.clone(),
                        x: point.x * scale,
                        y: point.y * scale,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Label of the currently selected marker item, if any.
    pub fn selected_marker(&self) -> Option<String> {
        let scene = self.sequencer.scene();
        let index = scene.selected()?;
        let item = scene.items().get(index)?;
        match item.kind {
            ItemKind::Marker { .. } => Some(item.name.clone()),
            _ => None,
        }
    }

    /// Select the scene item for a marker label (table row click).
    pub fn select_marker(&mut self, label: &str) {
        let index = self
            .sequencer
            .scene()
            .items()
            .iter()
            .position(|item| matches!(item.kind, ItemKind::Marker { .. }) && item.name == label);
        if let Some(index) = index {
            self.sequencer.scene_mut().select(index);
        }
    }

    #[cfg(test)]
    pub(crate) fn job_mut(&mut self) -> &mut TrackingJob {
        &mut self.job
    }

    #[cfg(test)]
    pub(crate) fn events_sender(&self) -> Sender<WorkflowEvent> {
        self.events_tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(index: usize, points: Vec<TrackPoint>) -> Frame {
        Frame::new(index, FrameImage::Remote, points)
    }

    fn movie(count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| frame(i, vec![TrackPoint::new(10.0, 20.0, "left knee")]))
            .collect()
    }

    fn marker_names(workflow: &TrackingWorkflow) -> Vec<String> {
        workflow
            .scene()
            .items()
            .iter()
            .filter(|item| matches!(item.kind, ItemKind::Marker { .. }))
            .map(|item| item.name.clone())
            .collect()
    }

    #[test]
    fn test_goto_frame_populates_background_then_markers() {
        let mut workflow = TrackingWorkflow::offline(movie(10), (640, 480));
        workflow.goto_frame(5);

        assert_eq!(workflow.frame_number(), 5);
        let items = workflow.scene().items();
        assert!(matches!(items[0].kind, ItemKind::Background { key: 5, .. }));
        assert!(matches!(items[1].kind, ItemKind::Marker { .. }));

        // Visiting the same frame again leaves the scene untouched.
        let count = workflow.scene().items().len();
        workflow.goto_frame(5);
        assert_eq!(workflow.scene().items().len(), count);
    }

    #[test]
    fn test_validate_label_rules() {
        let workflow = TrackingWorkflow::offline(movie(1), (640, 480));

        let err = workflow.validate_label("hip").unwrap_err();
        assert!(err.contains("at least 4 characters"), "{err}");

        let err = workflow.validate_label("left knee").unwrap_err();
        assert!(err.contains("already exists"), "{err}");

        assert!(workflow.validate_label("right knee").is_ok());
        assert!(workflow.validate_label("  right knee  ").is_ok());
    }

    #[test]
    fn test_add_marker_appends_point_and_item() {
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));
        workflow.add_marker(50.0, 60.0, "right knee").unwrap();

        assert_eq!(
            marker_names(&workflow),
            vec!["left knee".to_string(), "right knee".to_string()]
        );
        assert!(workflow.add_marker(1.0, 1.0, "right knee").is_err());
        assert!(workflow.add_marker(1.0, 1.0, "abc").is_err());
    }

    #[test]
    fn test_rename_and_delete_marker() {
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));
        workflow.rename_marker("left knee", "left ankle").unwrap();
        assert_eq!(marker_names(&workflow), vec!["left ankle".to_string()]);
        assert!(workflow.rename_marker("missing", "whatever").is_err());

        workflow.delete_marker("left ankle").unwrap();
        assert!(marker_names(&workflow).is_empty());
        assert!(workflow.delete_marker("left ankle").is_err());
    }

    #[test]
    fn test_drag_updates_track_point() {
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));

        // The marker sits at (10, 20) with radius 6.
        assert!(workflow.begin_drag(Point::new(12.0, 18.0)).is_some());
        workflow.update_drag(Point::new(100.0, 120.0));
        workflow.end_drag();

        let row = &workflow.markers()[0];
        assert_eq!((row.x, row.y), (100.0, 120.0));
        assert!(!workflow.dragging());
    }

    #[test]
    fn test_delegate_hooks_fire() {
        struct Recorder {
            moved: Arc<AtomicUsize>,
            finished: Arc<AtomicUsize>,
        }
        impl WorkflowDelegate for Recorder {
            fn on_item_moved(&mut self, _item: &Item) {
                self.moved.fetch_add(1, Ordering::SeqCst);
            }
            fn on_item_move_finished(&mut self, _item: &Item) {
                self.finished.fetch_add(1, Ordering::SeqCst);
            }
        }

        let moved = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));
        workflow.set_delegate(Box::new(Recorder {
            moved: moved.clone(),
            finished: finished.clone(),
        }));

        workflow.begin_drag(Point::new(10.0, 20.0));
        workflow.update_drag(Point::new(30.0, 30.0));
        workflow.update_drag(Point::new(40.0, 40.0));
        workflow.end_drag();

        assert_eq!(moved.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ruler_markers_build_overlay_and_scale() {
        let frames = vec![frame(
            0,
            vec![
                TrackPoint::new(0.0, 0.0, "Ruler 0mm"),
                TrackPoint::new(100.0, 0.0, "Ruler 10mm"),
            ],
        )];
        let workflow = TrackingWorkflow::offline(frames, (640, 480));

        assert_eq!(workflow.scale().units, scale::MM_UNITS);
        assert!((workflow.scale().scale - 0.1).abs() < 1e-9);

        let kinds: Vec<bool> = workflow
            .scene()
            .items()
            .iter()
            .map(|item| matches!(item.kind, ItemKind::Line { .. } | ItemKind::Label { .. }))
            .collect();
        // Background, two markers, then the ruler line and label.
        assert_eq!(kinds, vec![false, false, false, true, true]);

        // Table positions are reported in millimeters.
        let rows = workflow.markers();
        assert!((rows[1].x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_frame_image_event_resolves_background_and_on_load() {
        let mut workflow = TrackingWorkflow::offline(movie(2), (4, 4));
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        workflow.set_on_load(Box::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let image = Arc::new(DecodedImage {
            width: 4,
            height: 4,
            pixels: vec![0; 64],
        });
        workflow
            .events_sender()
            .send(WorkflowEvent::FrameImage {
                frame: 0,
                result: Ok(image.clone()),
            })
            .unwrap();
        assert!(workflow.pump());

        assert!(workflow.scene().items()[0].fills_bounds());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // A second resolution does not fire the callback again.
        workflow
            .events_sender()
            .send(WorkflowEvent::FrameImage {
                frame: 0,
                result: Ok(image),
            })
            .unwrap();
        workflow.pump();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_image_for_other_frame_is_cached_not_shown() {
        let mut workflow = TrackingWorkflow::offline(movie(3), (4, 4));
        let image = Arc::new(DecodedImage {
            width: 4,
            height: 4,
            pixels: vec![0; 64],
        });
        workflow
            .events_sender()
            .send(WorkflowEvent::FrameImage {
                frame: 2,
                result: Ok(image),
            })
            .unwrap();
        workflow.pump();

        // Frame 0 is current: its background stays pending.
        assert!(!workflow.scene().items()[0].fills_bounds());

        // Visiting frame 2 picks the image up from the cache.
        workflow.goto_frame(2);
        assert!(workflow.scene().items()[0].fills_bounds());
    }

    #[test]
    fn test_stale_points_saved_response_discarded() {
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));
        workflow.put_seq = 3;
        workflow.handle_event(WorkflowEvent::PointsSaved {
            seq: 2,
            frame: 0,
            result: Err(RemoteError::Transport("boom".to_string())),
        });
        assert!(workflow.alert().is_none());

        workflow.handle_event(WorkflowEvent::PointsSaved {
            seq: 3,
            frame: 0,
            result: Err(RemoteError::Transport("boom".to_string())),
        });
        assert!(workflow.alert().is_some());
    }

    #[test]
    fn test_track_to_end_requires_connection() {
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));
        workflow.track_to_end();
        assert_eq!(workflow.status(), "Not connected to a tracking service");
        assert!(!workflow.editing_locked());
        assert!(!workflow.can_track());
    }

    #[test]
    fn test_in_flight_job_locks_editing() {
        let mut workflow = TrackingWorkflow::offline(movie(3), (640, 480));
        workflow.job_mut().begin(1);

        assert!(workflow.editing_locked());
        assert!(workflow.add_marker(1.0, 1.0, "new marker").is_err());
        assert!(workflow.begin_drag(Point::new(10.0, 20.0)).is_none());

        let controls = workflow.controls();
        assert!(!controls.play_forward && !controls.step_forward && !controls.scrub);

        // Frame navigation is held too.
        workflow.goto_frame(2);
        assert_eq!(workflow.frame_number(), 0);
    }

    #[test]
    fn test_poll_progress_updates_status_without_reload() {
        let mut workflow = TrackingWorkflow::offline(movie(2), (640, 480));
        workflow.job_mut().begin(0);
        let frame_count = workflow.frame_count();

        workflow.handle_event(WorkflowEvent::PollTick {
            generation: 0,
            result: Ok(MovieMetadata {
                width: 640,
                height: 480,
                status: "TRACKING 40%".to_string(),
                movie_zipfile_url: None,
            }),
        });
        assert_eq!(workflow.status(), "Tracking: TRACKING 40%");
        assert_eq!(workflow.frame_count(), frame_count);
        assert!(workflow.editing_locked());
    }

    #[test]
    fn test_queue_rejection_unlocks_controls() {
        let mut workflow = TrackingWorkflow::offline(movie(2), (640, 480));
        workflow.job_mut().begin(0);
        workflow.handle_event(WorkflowEvent::QueueAck {
            generation: 0,
            result: Err(RemoteError::Service("queue full".to_string())),
        });
        assert!(!workflow.editing_locked());
        assert!(workflow.alert().unwrap().contains("queue full"));
        assert_eq!(workflow.job_state(), JobState::Idle);
    }

    #[test]
    fn test_movie_loaded_replaces_frames() {
        let mut workflow = TrackingWorkflow::offline(movie(1), (640, 480));
        workflow.handle_event(WorkflowEvent::MovieLoaded {
            generation: 0,
            result: Ok(LoadedMovie {
                width: 320,
                height: 240,
                status: "TRACKING COMPLETED".to_string(),
                frames: (0..5)
                    .map(|i| frame(i, vec![TrackPoint::new(1.0, 2.0, "left knee")]))
                    .collect(),
            }),
        });
        assert_eq!(workflow.frame_count(), 5);
        assert_eq!(workflow.frame_number(), 0);
        assert_eq!(workflow.scene().natural_size(), (320, 240));
        assert!(workflow.status().contains("5 frame"));
    }
}
