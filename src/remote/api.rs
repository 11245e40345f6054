// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Typed client for the tracking service endpoints.
//!
//! All calls block; they are only ever made from worker threads. A
//! response body with `error: true` is a service error, anything below
//! that (HTTP, connection, decode) is a transport failure. Both surface
//! to the user as status text or an alert and never crash the session.

use std::io::Read;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::movie::frame::TrackPoint;

/// Movie status value that signals tracking-job completion.
pub const TRACKING_COMPLETED: &str = "TRACKING COMPLETED";

/// Default format requested from the single-frame endpoint.
pub const FRAME_FORMAT: &str = "jpg";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service answered with an error payload.
    #[error("tracking service: {0}")]
    Service(String),
    /// The request never produced a well-formed answer.
    #[error("transport: {0}")]
    Transport(String),
}

impl From<ureq::Error> for RemoteError {
    fn from(err: ureq::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// Movie-level metadata reported by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieMetadata {
    pub width: u32,
    pub height: u32,
    pub status: String,
    /// Present once the movie has been tracked.
    pub movie_zipfile_url: Option<String>,
}

impl MovieMetadata {
    /// Whether the status carries the completion sentinel.
    pub fn tracking_completed(&self) -> bool {
        self.status == TRACKING_COMPLETED
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    error: bool,
    message: Option<String>,
    metadata: Option<MovieMetadata>,
    frames: Option<Vec<Vec<TrackPoint>>>,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    #[serde(default)]
    error: bool,
    message: Option<String>,
}

/// Metadata plus per-frame track points (empty when not requested).
#[derive(Debug, Clone)]
pub struct MetadataReply {
    pub metadata: MovieMetadata,
    pub frames: Vec<Vec<TrackPoint>>,
}

/// Blocking HTTP client bound to one service URL and API key.
pub struct ApiClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    fn service_error(message: Option<String>) -> RemoteError {
        RemoteError::Service(message.unwrap_or_else(|| "unspecified service error".to_string()))
    }

    /// Fetch movie metadata.
    ///
    /// `frame_count == 0` requests metadata only (the polling case); a
    /// negative `frame_count` requests every tracked frame's points.
    pub fn get_movie_metadata(
        &self,
        movie_id: i64,
        frame_start: i64,
        frame_count: i64,
    ) -> Result<MetadataReply, RemoteError> {
        let response: MetadataResponse = self
            .agent
            .post(&self.endpoint("get-movie-metadata"))
            .send_json(json!({
                "api_key": self.api_key,
                "movie_id": movie_id,
                "frame_start": frame_start,
                "frame_count": frame_count,
            }))?
            .into_json()?;
        if response.error {
            return Err(Self::service_error(response.message));
        }
        let metadata = response
            .metadata
            .ok_or_else(|| RemoteError::Service("response missing movie metadata".to_string()))?;
        Ok(MetadataReply {
            metadata,
            frames: response.frames.unwrap_or_default(),
        })
    }

    /// Queue the tracking job from `frame_start`; returns the service's
    /// acknowledgement message. Results arrive later via polling.
    pub fn track_movie_queue(
        &self,
        movie_id: i64,
        frame_start: i64,
    ) -> Result<Option<String>, RemoteError> {
        let response: AckResponse = self
            .agent
            .post(&self.endpoint("track-movie-queue"))
            .send_json(json!({
                "api_key": self.api_key,
                "movie_id": movie_id,
                "frame_start": frame_start,
            }))?
            .into_json()?;
        if response.error {
            return Err(Self::service_error(response.message));
        }
        Ok(response.message)
    }

    /// Replace one frame's track points on the server.
    pub fn put_frame_trackpoints(
        &self,
        movie_id: i64,
        frame_number: i64,
        trackpoints: &[TrackPoint],
    ) -> Result<(), RemoteError> {
        let encoded = serde_json::to_string(trackpoints)
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let response: AckResponse = self
            .agent
            .post(&self.endpoint("put-frame-trackpoints"))
            .send_json(json!({
                "api_key": self.api_key,
                "movie_id": movie_id,
                "frame_number": frame_number,
                "trackpoints": encoded,
            }))?
            .into_json()?;
        if response.error {
            return Err(Self::service_error(response.message));
        }
        Ok(())
    }

    /// Fetch one frame's raw image bytes (the not-yet-tracked case).
    pub fn get_frame(
        &self,
        movie_id: i64,
        frame_number: i64,
        format: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .agent
            .post(&self.endpoint("get-frame"))
            .send_json(json!({
                "api_key": self.api_key,
                "movie_id": movie_id,
                "frame_number": frame_number,
                "format": format,
            }))?;
        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Download an arbitrary URL (the tracked-frame archive).
    pub fn download(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.agent.get(url).call()?;
        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
