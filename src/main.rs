// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! TRACS - Tracked-point Annotation and Calibration System
//!
//! A cross-platform desktop application for annotating video frames with
//! named point markers, calibrating pixel units against ruler markers,
//! and propagating markers across all frames through a remote
//! point-tracking service.

mod app;
mod cache;
mod cli;
mod io;
mod movie;
mod remote;
mod scene;
mod track;
mod ui;
mod util;

use anyhow::Result;
use app::TracsApp;
use clap::Parser;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args = cli::Args::parse();

    // Configure egui options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("TRACS - Tracked-point Annotation and Calibration System"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "TRACS",
        options,
        Box::new(move |_cc| Ok(Box::new(TracsApp::new(&args)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
