// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! On-demand frame extraction over a sequential-only media source.
//!
//! Media sources expose no random seek: the decoder advances one frame at
//! a time, discarding intermediate frames, and reopens the source from
//! the start for a backward seek. Cached frames are always tried first,
//! which makes forward seeks amortized O(1) and backward seeks linear in
//! the target index at worst.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::FrameCache;
use crate::io::media::DecodedImage;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The requested frame lies beyond the end of the media.
    #[error("frame {requested} is past the end of the media ({available} frames)")]
    Exhausted { requested: usize, available: usize },
    /// The underlying source failed to open or decode.
    #[error("media source: {0}")]
    Source(String),
}

/// A media source that decodes frames strictly in order.
pub trait MediaSource: Send {
    /// Reopen the source at frame 0.
    fn reset(&mut self) -> Result<(), DecodeError>;

    /// Decode the next frame, or `None` at end of media.
    fn next_frame(&mut self) -> Result<Option<DecodedImage>, DecodeError>;
}

/// Frame-addressable decoder over a [`MediaSource`], with LRU caching.
pub struct OnDemandDecoder {
    source: Box<dyn MediaSource>,
    /// Index of the next frame the source will produce.
    playhead: usize,
    cache: FrameCache,
}

impl OnDemandDecoder {
    pub fn new(source: Box<dyn MediaSource>, cache_capacity: usize) -> Self {
        Self {
            source,
            playhead: 0,
            cache: FrameCache::new(cache_capacity),
        }
    }

    /// Index of the next frame the underlying source would decode.
    pub fn playhead(&self) -> usize {
        self.playhead
    }

    /// Fetch frame `n`, decoding forward (or reloading from the start)
    /// as needed.
    pub fn get_frame(&mut self, n: usize) -> Result<Arc<DecodedImage>, DecodeError> {
        if let Some(image) = self.cache.get(n) {
            return Ok(image);
        }

        if n < self.playhead {
            self.source.reset()?;
            self.playhead = 0;
        }

        loop {
            match self.source.next_frame()? {
                Some(image) => {
                    let index = self.playhead;
                    self.playhead += 1;
                    if index == n {
                        let image = Arc::new(image);
                        self.cache.insert(index, image.clone());
                        return Ok(image);
                    }
                    // Intermediate frames are decoded and discarded.
                }
                None => {
                    return Err(DecodeError::Exhausted {
                        requested: n,
                        available: self.playhead,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    /// Source with `len` frames, counting resets and decodes.
    struct CountingSource {
        len: usize,
        cursor: usize,
        resets: StdArc<AtomicUsize>,
        decodes: StdArc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(len: usize) -> (Self, StdArc<AtomicUsize>, StdArc<AtomicUsize>) {
            let resets = StdArc::new(AtomicUsize::new(0));
            let decodes = StdArc::new(AtomicUsize::new(0));
            (
                Self {
                    len,
                    cursor: 0,
                    resets: resets.clone(),
                    decodes: decodes.clone(),
                },
                resets,
                decodes,
            )
        }
    }

    impl MediaSource for CountingSource {
        fn reset(&mut self) -> Result<(), DecodeError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.cursor = 0;
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<DecodedImage>, DecodeError> {
            if self.cursor >= self.len {
                return Ok(None);
            }
            let tag = self.cursor as u8;
            self.cursor += 1;
            self.decodes.fetch_add(1, Ordering::SeqCst);
            Ok(Some(DecodedImage {
                width: 1,
                height: 1,
                pixels: vec![tag; 4],
            }))
        }
    }

    #[test]
    fn test_forward_seek_discards_intermediates() {
        let (source, resets, decodes) = CountingSource::new(10);
        let mut decoder = OnDemandDecoder::new(Box::new(source), 4);

        let frame = decoder.get_frame(5).unwrap();
        assert_eq!(frame.pixels[0], 5);
        assert_eq!(decoder.playhead(), 6);
        assert_eq!(decodes.load(Ordering::SeqCst), 6);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cached_frame_avoids_reload() {
        let (source, resets, decodes) = CountingSource::new(10);
        let mut decoder = OnDemandDecoder::new(Box::new(source), 4);

        decoder.get_frame(5).unwrap();
        let before = decodes.load(Ordering::SeqCst);

        // Frame 5 is behind the playhead but cached: no reset, no decode.
        let frame = decoder.get_frame(5).unwrap();
        assert_eq!(frame.pixels[0], 5);
        assert_eq!(decodes.load(Ordering::SeqCst), before);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backward_seek_reloads_from_start() {
        let (source, resets, _) = CountingSource::new(10);
        // Capacity 1: seeking forward evicts earlier frames.
        let mut decoder = OnDemandDecoder::new(Box::new(source), 1);

        decoder.get_frame(7).unwrap();
        let frame = decoder.get_frame(3).unwrap();
        assert_eq!(frame.pixels[0], 3);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.playhead(), 4);
    }

    #[test]
    fn test_exhausted_seek_reports_available_count() {
        let (source, _, _) = CountingSource::new(4);
        let mut decoder = OnDemandDecoder::new(Box::new(source), 4);

        match decoder.get_frame(9) {
            Err(DecodeError::Exhausted { requested, available }) => {
                assert_eq!(requested, 9);
                assert_eq!(available, 4);
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        // The playhead stays at the last successfully decoded frame.
        assert_eq!(decoder.playhead(), 4);

        // Earlier frames are still reachable afterwards.
        let frame = decoder.get_frame(2).unwrap();
        assert_eq!(frame.pixels[0], 2);
    }
}
