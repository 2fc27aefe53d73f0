//! Two-block sliding read window over a track.
//!
//! Reads are served from up to two adjacent storage blocks held in memory.
//! Sequential access slides the window forward one block at a time and
//! scrubbing backwards slides it back. A new window is planned and fetched
//! into staging buffers first, so a failed fetch leaves the previous window
//! in place.

use std::mem;
use std::sync::Arc;

use crate::error::{EditError, Result, StorageError};
use crate::format::SampleFormat;
use crate::time::SampleCount;
use crate::track::{FillMode, Track};

/// Samples handed out by [`TrackCache::get`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedSamples<'a> {
    Float(&'a [f32]),
    /// Little-endian samples in the requested integer format.
    Encoded(&'a [u8]),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Span {
    start: SampleCount,
    len: usize,
}

impl Span {
    fn end(self) -> SampleCount {
        self.start + self.len as SampleCount
    }
}

#[derive(Debug, Default)]
struct CacheBuffer {
    data: Vec<f32>,
    span: Span,
}

#[derive(Debug, Default)]
pub struct TrackCache {
    track: Option<Arc<Track>>,
    buffers: [CacheBuffer; 2],
    valid: usize,
    staging: [Vec<f32>; 2],
    overlap: Vec<f32>,
    overlap_bytes: Vec<u8>,
}

impl TrackCache {
    pub fn new(track: Arc<Track>) -> Self {
        let mut cache = Self::default();
        cache.set_track(Some(track));
        cache
    }

    /// Points the cache at another track, dropping cached samples when it
    /// differs from the current one.
    pub fn set_track(&mut self, track: Option<Arc<Track>>) {
        let same = match (&self.track, &track) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        if let Some(track) = &track {
            let size = track.max_block_size();
            for buffer in &mut self.buffers {
                buffer.data.clear();
                buffer.data.reserve(size);
            }
        }
        self.track = track;
        self.valid = 0;
    }

    pub fn track(&self) -> Option<&Arc<Track>> {
        self.track.as_ref()
    }

    /// Track samples currently held, as `(start, end)`.
    pub fn cached_span(&self) -> Option<(SampleCount, SampleCount)> {
        if self.valid == 0 {
            return None;
        }
        Some((
            self.buffers[0].span.start,
            self.buffers[self.valid - 1].span.end(),
        ))
    }

    /// Reads `len` samples from track sample `start`.
    ///
    /// Only float requests go through the window; other formats are fetched
    /// and encoded directly. Gaps between clips read as zero. Any failed
    /// fetch fails the whole call, including tolerant reads that could only
    /// fill part of the request.
    pub fn get(
        &mut self,
        format: SampleFormat,
        start: SampleCount,
        len: usize,
        may_throw: bool,
    ) -> Result<CachedSamples<'_>> {
        let track = self
            .track
            .clone()
            .ok_or(EditError::InvalidInput("cache has no track"))?;

        if format != SampleFormat::Float32 {
            let complete =
                track.get_encoded(&mut self.overlap_bytes, format, start, len, may_throw)?;
            if !complete {
                return Err(incomplete(start));
            }
            return Ok(CachedSamples::Encoded(&self.overlap_bytes));
        }
        if len == 0 {
            return Ok(CachedSamples::Float(&[]));
        }

        self.refill(&track, start, len, may_throw)?;

        let mut remaining = len;
        let mut cursor = start;
        let mut written = 0usize;
        let mut use_overlap = false;
        let init_len = if self.valid < 1 {
            len as SampleCount
        } else {
            (len as SampleCount).min(self.buffers[0].span.start - start)
        };
        if init_len > 0 {
            let count = init_len as usize;
            self.overlap.resize(len, 0.0);
            fetch(&track, &mut self.overlap[..count], start, may_throw)?;
            remaining -= count;
            cursor += init_len;
            written = count;
            use_overlap = true;
        }

        let mut direct = None;
        for index in 0..self.valid {
            if remaining == 0 {
                break;
            }
            let span = self.buffers[index].span;
            let offset = cursor - span.start;
            let take = (remaining as SampleCount).min(span.len as SampleCount - offset);
            if init_len <= 0 && take == len as SampleCount {
                direct = Some((index, offset as usize));
                break;
            }
            if take > 0 {
                if !use_overlap {
                    self.overlap.resize(len, 0.0);
                    use_overlap = true;
                }
                let (offset, take) = (offset as usize, take as usize);
                self.overlap[written..written + take]
                    .copy_from_slice(&self.buffers[index].data[offset..offset + take]);
                remaining -= take;
                cursor += take as SampleCount;
                written += take;
            }
        }
        if let Some((index, offset)) = direct {
            return Ok(CachedSamples::Float(
                &self.buffers[index].data[offset..offset + len],
            ));
        }

        if remaining > 0 {
            if !use_overlap {
                self.overlap.resize(len, 0.0);
            }
            fetch(
                &track,
                &mut self.overlap[written..written + remaining],
                cursor,
                may_throw,
            )?;
        }
        Ok(CachedSamples::Float(&self.overlap[..len]))
    }

    /// Drops cached samples and releases the buffers.
    pub fn free(&mut self) {
        for buffer in &mut self.buffers {
            buffer.data = Vec::new();
        }
        self.staging = [Vec::new(), Vec::new()];
        self.overlap = Vec::new();
        self.overlap_bytes = Vec::new();
        self.valid = 0;
    }

    /// Moves the window so it covers the start of `[start, start + len)`.
    fn refill(
        &mut self,
        track: &Track,
        start: SampleCount,
        len: usize,
        may_throw: bool,
    ) -> Result<()> {
        let end = start + len as SampleCount;
        let mut spans = [self.buffers[0].span, self.buffers[1].span];
        let mut valid = self.valid;
        let mut swapped = false;
        let mut fresh = [false; 2];
        let mut fill_first = valid < 1;
        let mut fill_second = valid < 2;

        if valid > 0 && (end <= spans[0].start || start >= spans[valid - 1].end()) {
            fill_first = true;
            fill_second = true;
        } else if valid == 2 && start >= spans[1].start && end > spans[1].end() {
            spans.swap(0, 1);
            swapped = true;
            fill_second = true;
            valid = 1;
        } else if valid > 0 && start < spans[0].start && track.block_start(start).is_some() {
            spans.swap(0, 1);
            swapped = true;
            fill_first = true;
            fill_second = false;
            valid = 0;
        }

        if fill_first {
            match track.block_start(start) {
                Some(start0) => {
                    let len0 = track.best_block_size(start0);
                    self.staging[0].resize(len0, 0.0);
                    fetch(track, &mut self.staging[0], start0, may_throw)?;
                    spans[0] = Span { start: start0, len: len0 };
                    fresh[0] = true;
                    if !fill_second && spans[0].end() != spans[1].start {
                        fill_second = true;
                    }
                    valid = if fill_second { 1 } else { 2 };
                }
                None => {
                    valid = 0;
                    fill_second = false;
                }
            }
        }

        if fill_second {
            valid = 1;
            let end0 = spans[0].end();
            if end > end0 && track.block_start(end0) == Some(end0) {
                let len1 = track.best_block_size(end0);
                self.staging[1].resize(len1, 0.0);
                fetch(track, &mut self.staging[1], end0, may_throw)?;
                spans[1] = Span { start: end0, len: len1 };
                fresh[1] = true;
                valid = 2;
            }
        }

        if swapped {
            self.buffers.swap(0, 1);
        }
        for (index, buffer) in self.buffers.iter_mut().enumerate() {
            if fresh[index] {
                mem::swap(&mut buffer.data, &mut self.staging[index]);
            }
            buffer.span = spans[index];
        }
        if fresh.iter().any(|&filled| filled) {
            tracing::trace!(
                start,
                len,
                window_start = spans[0].start,
                window_end = spans[valid.max(1) - 1].end(),
                valid,
                "refilled track cache"
            );
        }
        self.valid = valid;
        Ok(())
    }
}

fn fetch(track: &Track, buffer: &mut [f32], start: SampleCount, may_throw: bool) -> Result<()> {
    if track.get(buffer, start, FillMode::Zero, may_throw)? {
        Ok(())
    } else {
        Err(incomplete(start))
    }
}

fn incomplete(start: SampleCount) -> EditError {
    EditError::Storage(StorageError::Unavailable {
        start: start.max(0) as u64,
    })
}
