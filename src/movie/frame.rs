// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Movie frame data structures.
//!
//! A movie is an ordered, contiguous array of frames; the array length is
//! the total frame count, which is unknown until the tracking service
//! reports tracked metadata. Each frame resolves to a background image
//! plus an ordered list of named track points.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named point annotation, as exchanged with the tracking service.
///
/// The label is the durable identity of a physical point: it correlates
/// the same point across frames, and it is unique within a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

impl TrackPoint {
    pub fn new(x: f64, y: f64, label: impl Into<String>) -> Self {
        Self {
            x,
            y,
            label: label.into(),
        }
    }
}

/// Where a frame's background pixels come from.
#[derive(Debug, Clone)]
pub enum FrameImage {
    /// Fetched from the tracking service's single-frame endpoint.
    Remote,
    /// An image file on disk (unpacked archive entry).
    File(PathBuf),
    /// Produced by the local on-demand decode worker.
    Media,
}

/// One indexed unit of a movie.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub image: FrameImage,
    pub points: Vec<TrackPoint>,
}

impl Frame {
    pub fn new(index: usize, image: FrameImage, points: Vec<TrackPoint>) -> Self {
        Self {
            index,
            image,
            points,
        }
    }
}
