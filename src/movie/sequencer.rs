// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Frame sequencing and the playback state machine.
//!
//! The sequencer owns the scene graph and the frame array, and moves a
//! single current-frame pointer through it: either directly (`goto_frame`)
//! or under a fixed-interval timer in forward or reverse (`play`). At a
//! sequence boundary playback loops, bounces with flipped direction, or
//! stops, in that priority order.
//!
//! Frame transitions repopulate the scene: the frame's background image is
//! added first (it must paint below everything else); annotation items are
//! added by the owning workflow after the transition returns.

use std::time::{Duration, Instant};

use log::debug;

use crate::movie::frame::Frame;
use crate::scene::graph::SceneGraph;
use crate::scene::item::Item;

/// Interval between playback frame transitions.
pub const PLAYBACK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    PlayingForward,
    PlayingReverse,
}

/// Enablement of every transport control, derived in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStates {
    pub first: bool,
    pub step_back: bool,
    pub play_reverse: bool,
    pub stop: bool,
    pub play_forward: bool,
    pub step_forward: bool,
    pub last: bool,
    pub scrub: bool,
}

/// Control enablement as a pure function of the playback state.
///
/// No control is toggled anywhere else; every UI affordance reads this.
pub fn control_states(
    frame_count: usize,
    state: PlayState,
    frame_number: usize,
    locked: bool,
) -> ControlStates {
    if locked || frame_count == 0 {
        return ControlStates {
            first: false,
            step_back: false,
            play_reverse: false,
            stop: false,
            play_forward: false,
            step_forward: false,
            last: false,
            scrub: false,
        };
    }
    let last = frame_count - 1;
    let playing = state != PlayState::Stopped;
    let multi = frame_count > 1;
    ControlStates {
        first: !playing && frame_number > 0,
        step_back: !playing && frame_number > 0,
        play_reverse: multi && state != PlayState::PlayingReverse,
        stop: playing,
        play_forward: multi && state != PlayState::PlayingForward,
        step_forward: !playing && frame_number < last,
        last: !playing && frame_number < last,
        scrub: !playing && multi,
    }
}

/// Movie playback engine over a [`SceneGraph`].
pub struct FrameSequencer {
    scene: SceneGraph,
    frames: Vec<Frame>,
    frame_number: usize,
    state: PlayState,
    looping: bool,
    bounce: bool,
    interval: Duration,
    last_tick: Option<Instant>,
    /// False until the current frame's items have been built at least
    /// once, so loading a movie repopulates frame 0 even though the frame
    /// number is unchanged.
    populated: bool,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self {
            scene: SceneGraph::new((0, 0)),
            frames: Vec::new(),
            frame_number: 0,
            state: PlayState::Stopped,
            looping: false,
            bounce: false,
            interval: PLAYBACK_INTERVAL,
            last_tick: None,
            populated: false,
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.get(self.frame_number)
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.get_mut(self.frame_number)
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlayState::Stopped
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn bounce(&self) -> bool {
        self.bounce
    }

    pub fn set_bounce(&mut self, bounce: bool) {
        self.bounce = bounce;
    }

    /// Replace the frame array and reset to frame 0.
    ///
    /// Returns `true` when a frame is available; the caller must then
    /// populate the frame's annotation items.
    pub fn load_movie(&mut self, frames: Vec<Frame>, natural_size: (u32, u32)) -> bool {
        self.stop();
        self.frames = frames;
        self.frame_number = 0;
        self.populated = false;
        self.scene.clear_items();
        self.scene.set_natural_size(natural_size);
        debug!("movie loaded: {} frames at {:?}", self.frames.len(), natural_size);
        self.goto_frame(0).is_some()
    }

    /// Start timer-driven playback in the given direction.
    pub fn play(&mut self, direction: i32) {
        if self.frames.is_empty() {
            return;
        }
        self.state = if direction >= 0 {
            PlayState::PlayingForward
        } else {
            PlayState::PlayingReverse
        };
        self.last_tick = Some(Instant::now());
    }

    /// Cancel the playback timer synchronously and return to stopped.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.last_tick = None;
    }

    /// Advance playback if the tick interval has elapsed.
    ///
    /// Returns the new frame number when a transition happened. Driven
    /// from the host's repaint loop.
    pub fn update(&mut self, now: Instant) -> Option<usize> {
        if self.state == PlayState::Stopped {
            return None;
        }
        match self.last_tick {
            Some(last) if now.duration_since(last) >= self.interval => {
                self.last_tick = Some(now);
                self.tick()
            }
            Some(_) => None,
            None => {
                self.last_tick = Some(now);
                None
            }
        }
    }

    /// Perform one playback transition.
    ///
    /// At the boundary frame: loop to the opposite end, bounce back one
    /// frame with direction flipped, or stop.
    pub fn tick(&mut self) -> Option<usize> {
        let direction: i64 = match self.state {
            PlayState::Stopped => return None,
            PlayState::PlayingForward => 1,
            PlayState::PlayingReverse => -1,
        };
        let count = self.frames.len();
        if count == 0 {
            self.stop();
            return None;
        }
        let last = count - 1;
        let at_boundary = if direction > 0 {
            self.frame_number == last
        } else {
            self.frame_number == 0
        };

        if !at_boundary {
            let next = (self.frame_number as i64 + direction) as usize;
            return self.goto_frame(next);
        }

        if self.looping {
            let target = if direction > 0 { 0 } else { last };
            return self.goto_frame(target);
        }
        if self.bounce && count > 1 {
            let (flipped, target) = if direction > 0 {
                (PlayState::PlayingReverse, last - 1)
            } else {
                (PlayState::PlayingForward, 1)
            };
            self.state = flipped;
            return self.goto_frame(target);
        }
        self.stop();
        None
    }

    /// Jump to frame `n`, clamped into the valid range.
    ///
    /// A no-op when the clamped target is already the populated current
    /// frame. Otherwise clears the scene, adds the frame's background
    /// image first, and returns the new frame number so the caller can
    /// add the frame's annotation items on top.
    pub fn goto_frame(&mut self, n: usize) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let n = n.min(self.frames.len() - 1);
        if n == self.frame_number && self.populated {
            return None;
        }
        self.frame_number = n;
        self.populated = true;
        self.scene.clear_items();
        let (width, height) = self.scene.natural_size();
        let background = Item::background(n, width, height);
        if let Err(err) = self.scene.add_item(background) {
            // A movie without known dimensions has nothing to paint yet.
            debug!("frame {n} background not added: {err}");
        }
        Some(n)
    }

    /// Rebuild the current frame's scene items from scratch.
    ///
    /// Used after structural marker edits; behaves like the first visit
    /// to the frame.
    pub fn reload_current(&mut self) -> Option<usize> {
        self.populated = false;
        self.goto_frame(self.frame_number)
    }

    /// Transport control enablement for the current state.
    pub fn controls(&self, locked: bool) -> ControlStates {
        control_states(self.frames.len(), self.state, self.frame_number, locked)
    }
}
