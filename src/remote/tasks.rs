// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Background execution of remote requests.
//!
//! Every service call runs on its own thread and reports back over the
//! workflow's event channel; app state is only ever touched on the UI
//! thread when those events are drained. A shared generation counter
//! makes superseding in-flight work a single atomic bump: the polling
//! loop re-checks the counter around every request, and events carry the
//! generation they were spawned under so the receiver can discard stale
//! ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::io::{archive, media};
use crate::movie::frame::{Frame, FrameImage, TrackPoint};
use crate::remote::api::{ApiClient, RemoteError, FRAME_FORMAT};
use crate::track::workflow::{LoadedMovie, WorkflowEvent};

/// Spawns service calls and owns the cancellation generation.
pub struct RemoteTasks {
    client: Arc<ApiClient>,
    movie_id: i64,
    events: Sender<WorkflowEvent>,
    generation: Arc<AtomicU64>,
}

impl RemoteTasks {
    pub fn new(client: ApiClient, movie_id: i64, events: Sender<WorkflowEvent>) -> Self {
        Self {
            client: Arc::new(client),
            movie_id,
            events,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The generation current work is tagged with.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate all in-flight work and return the fresh generation.
    ///
    /// The poll loop observes the bump and exits; late events from the
    /// old generation are discarded on receipt.
    pub fn supersede(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Queue the tracking job starting at `frame_start`.
    pub fn spawn_queue_request(&self, generation: u64, frame_start: usize) {
        let client = self.client.clone();
        let events = self.events.clone();
        let movie_id = self.movie_id;
        thread::spawn(move || {
            let result = client.track_movie_queue(movie_id, frame_start as i64);
            let _ = events.send(WorkflowEvent::QueueAck { generation, result });
        });
    }

    /// Poll movie status every `interval` until superseded.
    pub fn spawn_poll_loop(&self, generation: u64, interval: Duration) {
        let client = self.client.clone();
        let events = self.events.clone();
        let movie_id = self.movie_id;
        let counter = self.generation.clone();
        thread::spawn(move || {
            loop {
                if counter.load(Ordering::SeqCst) != generation {
                    debug!("poll loop (generation {generation}) superseded");
                    return;
                }
                let result = client
                    .get_movie_metadata(movie_id, 0, 0)
                    .map(|reply| reply.metadata);
                // Re-check after the blocking call: a supersede while the
                // request was in flight must swallow the answer here too.
                if counter.load(Ordering::SeqCst) != generation {
                    debug!("poll result for superseded generation {generation} dropped");
                    return;
                }
                if events
                    .send(WorkflowEvent::PollTick { generation, result })
                    .is_err()
                {
                    return;
                }
                thread::sleep(interval);
            }
        });
    }

    /// Push one frame's track points, tagged with its move sequence.
    pub fn spawn_put_trackpoints(&self, seq: u64, frame: usize, points: Vec<TrackPoint>) {
        let client = self.client.clone();
        let events = self.events.clone();
        let movie_id = self.movie_id;
        thread::spawn(move || {
            let result = client.put_frame_trackpoints(movie_id, frame as i64, &points);
            let _ = events.send(WorkflowEvent::PointsSaved { seq, frame, result });
        });
    }

    /// Fetch and decode one frame image, with bounded retry.
    pub fn spawn_fetch_frame(&self, frame: usize) {
        let client = self.client.clone();
        let events = self.events.clone();
        let movie_id = self.movie_id;
        thread::spawn(move || {
            let result = media::fetch_with_retry(
                || {
                    let bytes = client
                        .get_frame(movie_id, frame as i64, FRAME_FORMAT)
                        .map_err(|e| e.to_string())?;
                    media::decode_bytes(&bytes).map_err(|e| e.to_string())
                },
                &format!("frame {frame} fetch"),
            );
            let _ = events.send(WorkflowEvent::FrameImage { frame, result });
        });
    }

    /// Load (or reload) the whole movie: metadata, per-frame points, and
    /// the tracked-frame archive when one is available.
    pub fn spawn_load_movie(&self, generation: u64) {
        let client = self.client.clone();
        let events = self.events.clone();
        let movie_id = self.movie_id;
        thread::spawn(move || {
            let result = load_movie(&client, movie_id);
            if let Err(err) = &result {
                warn!("movie {movie_id} load failed: {err}");
            }
            let _ = events.send(WorkflowEvent::MovieLoaded { generation, result });
        });
    }
}

fn load_movie(client: &ApiClient, movie_id: i64) -> Result<LoadedMovie, RemoteError> {
    let reply = client.get_movie_metadata(movie_id, 0, -1)?;
    let metadata = reply.metadata;

    let frames = match &metadata.movie_zipfile_url {
        Some(url) => {
            let bytes = client.download(url)?;
            let paths = archive::unpack_frames(&bytes, movie_id)
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
            paths
                .into_iter()
                .enumerate()
                .map(|(index, path)| {
                    let points = reply.frames.get(index).cloned().unwrap_or_default();
                    Frame::new(index, FrameImage::File(path), points)
                })
                .collect()
        }
        None => {
            // Not yet tracked: a single frame, served by the frame endpoint.
            let points = reply.frames.first().cloned().unwrap_or_default();
            vec![Frame::new(0, FrameImage::Remote, points)]
        }
    };

    Ok(LoadedMovie {
        width: metadata.width,
        height: metadata.height,
        status: metadata.status,
        frames,
    })
}
