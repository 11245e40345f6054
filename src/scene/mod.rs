// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Retained drawing scene: items, selection, hit-testing and redraw.

pub mod graph;
pub mod item;

use thiserror::Error;

/// An item or argument failed validation before entering the scene.
///
/// These are caller errors and are raised synchronously; they never come
/// back from the remote service or the render path.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub &'static str);
