// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Command-line session configuration.

use clap::Parser;
use std::path::PathBuf;

/// Tracked-point annotation and calibration tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Tracking service base URL
    #[arg(long = "server", value_name = "URL", requires = "api_key", requires = "movie")]
    pub server: Option<String>,

    /// API key for the tracking service
    #[arg(long = "api-key", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Movie id to load from the tracking service
    #[arg(long = "movie", value_name = "ID")]
    pub movie: Option<i64>,

    /// Local video file or image-sequence directory to open instead
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Decoded-frame cache capacity, in frames
    #[arg(long = "cache", value_name = "FRAMES", default_value_t = 64)]
    pub cache: usize,
}
