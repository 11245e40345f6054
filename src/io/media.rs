// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Media file loading (images and videos).
//!
//! This module handles decoding image files and video frames into plain
//! RGBA pixel buffers for display, provides the sequential media sources
//! consumed by the on-demand decoder, and runs the background loading
//! threads. Image loads retry a bounded number of times with a fixed
//! backoff and then give up quietly; a background that never arrives must
//! not take the session down.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, warn};

use crate::cache::decoder::{DecodeError, MediaSource, OnDemandDecoder};
use crate::track::workflow::WorkflowEvent;

/// Maximum attempts for one background-image load.
pub const LOAD_MAX_ATTEMPTS: u32 = 3;
/// Fixed backoff between load attempts.
pub const LOAD_RETRY_DELAY: Duration = Duration::from_millis(1500);

/// File extensions accepted as frame images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// A decoded frame: RGBA8 pixels plus dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    fn from_dynamic(image: image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }
}

/// Whether a path looks like a frame image file.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Decode an image file into RGBA pixels.
pub fn load_image(path: &Path) -> Result<DecodedImage> {
    let image = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(DecodedImage::from_dynamic(image))
}

/// Decode in-memory image bytes (a fetched frame) into RGBA pixels.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes).context("failed to decode frame bytes")?;
    Ok(DecodedImage::from_dynamic(image))
}

/// Run `fetch` with bounded retry and a fixed backoff between attempts.
///
/// Intermediate failures are only logged; the final one goes back to the
/// caller.
pub fn fetch_with_retry<F>(mut fetch: F, what: &str) -> std::result::Result<Arc<DecodedImage>, String>
where
    F: FnMut() -> std::result::Result<DecodedImage, String>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch() {
            Ok(image) => return Ok(Arc::new(image)),
            Err(err) if attempt < LOAD_MAX_ATTEMPTS => {
                warn!("{what}: attempt {attempt} failed: {err}");
                thread::sleep(LOAD_RETRY_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Load a frame image file on a background thread.
pub fn spawn_load_file(events: Sender<WorkflowEvent>, frame: usize, path: PathBuf) {
    thread::spawn(move || {
        let result = fetch_with_retry(
            || load_image(&path).map_err(|e| e.to_string()),
            &format!("frame {frame} file load"),
        );
        let _ = events.send(WorkflowEvent::FrameImage { frame, result });
    });
}

/// Sequential media source over a sorted list of image files.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, cursor: 0 }
    }
}

impl MediaSource for ImageSequenceSource {
    fn reset(&mut self) -> std::result::Result<(), DecodeError> {
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> std::result::Result<Option<DecodedImage>, DecodeError> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let image = load_image(path).map_err(|e| DecodeError::Source(e.to_string()))?;
        self.cursor += 1;
        Ok(Some(image))
    }
}

/// A locally opened movie: a sequential source plus what is known of it.
pub struct LocalMedia {
    pub source: Box<dyn MediaSource>,
    pub frame_count: usize,
    pub natural_size: (u32, u32),
}

/// Open a local video file, image file, or image-sequence directory.
pub fn open_local(path: &Path) -> Result<LocalMedia> {
    if path.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image_path(p))
            .collect();
        if paths.is_empty() {
            bail!("{} contains no frame images", path.display());
        }
        paths.sort();
        let first = load_image(&paths[0])?;
        debug!("opened image sequence: {} frames", paths.len());
        return Ok(LocalMedia {
            frame_count: paths.len(),
            natural_size: (first.width, first.height),
            source: Box::new(ImageSequenceSource::new(paths)),
        });
    }

    if is_image_path(path) {
        let image = load_image(path)?;
        return Ok(LocalMedia {
            frame_count: 1,
            natural_size: (image.width, image.height),
            source: Box::new(ImageSequenceSource::new(vec![path.to_path_buf()])),
        });
    }

    #[cfg(feature = "video-opencv")]
    {
        return video::open(path);
    }
    #[cfg(not(feature = "video-opencv"))]
    {
        bail!(
            "{} is not an image; this build has no video support (rebuild with --features video-opencv)",
            path.display()
        );
    }
}

/// Handle to the decode worker thread serving local-mode frame requests.
pub struct DecodeWorker {
    requests: Sender<usize>,
}

impl DecodeWorker {
    /// Ask the worker for a frame; the reply arrives as a
    /// [`WorkflowEvent::FrameImage`].
    pub fn request(&self, frame: usize) {
        if self.requests.send(frame).is_err() {
            warn!("decode worker is gone; frame {frame} request dropped");
        }
    }
}

/// Start the thread that owns the on-demand decoder for a local movie.
pub fn spawn_decode_worker(
    source: Box<dyn MediaSource>,
    cache_capacity: usize,
    events: Sender<WorkflowEvent>,
) -> DecodeWorker {
    let (requests, queue) = channel::<usize>();
    thread::spawn(move || {
        let mut decoder = OnDemandDecoder::new(source, cache_capacity);
        while let Ok(frame) = queue.recv() {
            let result = decoder.get_frame(frame).map_err(|e| e.to_string());
            if events
                .send(WorkflowEvent::FrameImage { frame, result })
                .is_err()
            {
                break;
            }
        }
        debug!("decode worker finished");
    });
    DecodeWorker { requests }
}

#[cfg(feature = "video-opencv")]
pub mod video {
    //! OpenCV-backed sequential video source.

    use super::{DecodedImage, LocalMedia};
    use crate::cache::decoder::{DecodeError, MediaSource};
    use anyhow::{bail, Context, Result};
    use opencv::prelude::*;
    use opencv::{imgproc, videoio};
    use std::path::Path;

    pub struct VideoFileSource {
        path: String,
        capture: videoio::VideoCapture,
    }

    /// Open a video file and probe its frame count and dimensions.
    pub fn open(path: &Path) -> Result<LocalMedia> {
        let path_str = path
            .to_str()
            .with_context(|| format!("non-UTF8 path: {}", path.display()))?
            .to_string();
        let capture = videoio::VideoCapture::from_file(&path_str, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            bail!("failed to open video {}", path.display());
        }
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        Ok(LocalMedia {
            frame_count,
            natural_size: (width, height),
            source: Box::new(VideoFileSource {
                path: path_str,
                capture,
            }),
        })
    }

    impl MediaSource for VideoFileSource {
        fn reset(&mut self) -> std::result::Result<(), DecodeError> {
            // No seek primitive assumed: reopen the file from the start.
            self.capture = videoio::VideoCapture::from_file(&self.path, videoio::CAP_ANY)
                .map_err(|e| DecodeError::Source(e.to_string()))?;
            Ok(())
        }

        fn next_frame(&mut self) -> std::result::Result<Option<DecodedImage>, DecodeError> {
            let mut bgr = Mat::default();
            let got = self
                .capture
                .read(&mut bgr)
                .map_err(|e| DecodeError::Source(e.to_string()))?;
            if !got {
                return Ok(None);
            }
            let mut rgba = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)
                .map_err(|e| DecodeError::Source(e.to_string()))?;
            let width = rgba.cols() as u32;
            let height = rgba.rows() as u32;
            let pixels = rgba
                .data_bytes()
                .map_err(|e| DecodeError::Source(e.to_string()))?
                .to_vec();
            Ok(Some(DecodedImage {
                width,
                height,
                pixels,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("frame_0001.jpg")));
        assert!(is_image_path(Path::new("frame_0001.PNG")));
        assert!(!is_image_path(Path::new("movie.mp4")));
        assert!(!is_image_path(Path::new("noextension")));
    }

    #[test]
    fn test_empty_sequence_reports_end_of_media() {
        let mut source = ImageSequenceSource::new(vec![]);
        assert!(matches!(source.next_frame(), Ok(None)));
        assert!(source.reset().is_ok());
        assert!(matches!(source.next_frame(), Ok(None)));
    }
}
