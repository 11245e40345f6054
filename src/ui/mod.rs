// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! UI components.

pub mod canvas;
pub mod controls;
pub mod markers;
