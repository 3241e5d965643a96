//! Frame chunking
//!
//! Splits an inclusive `[start, end]` frame range into contiguous chunks.
//! When the requested chunk size would produce more than `max_chunks`
//! chunks, the size is widened to `ceil(total / max_chunks)`.

use crate::error::ChunkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// A contiguous inclusive sub-range of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameChunk {
    /// First frame of the chunk
    pub first: i64,
    /// Last frame of the chunk (never below `first`)
    pub last: i64,
    /// Effective chunk size used to produce this chunk
    pub by: i64,
}

impl FrameChunk {
    /// Number of frames in the chunk, saturating at `u64::MAX`
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.last.abs_diff(self.first).saturating_add(1)
    }

    /// Chunks always hold at least one frame
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over the frames in the chunk
    #[inline]
    #[must_use]
    pub fn frames(&self) -> RangeInclusive<i64> {
        self.first..=self.last
    }
}

impl fmt::Display for FrameChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

/// Partition `[start, end]` into chunks of `by` frames, at most `max_chunks` of them
///
/// # Errors
/// - [`ChunkError::NonPositiveStep`] when `by <= 0`
/// - [`ChunkError::InvertedRange`] when `start > end`
/// - [`ChunkError::ZeroMaxChunks`] when `max_chunks == 0`
pub fn chunk(start: i64, end: i64, by: i64, max_chunks: usize) -> Result<Vec<FrameChunk>, ChunkError> {
    if by <= 0 {
        return Err(ChunkError::NonPositiveStep(by));
    }
    if start > end {
        return Err(ChunkError::InvertedRange { start, end });
    }
    if max_chunks == 0 {
        return Err(ChunkError::ZeroMaxChunks);
    }

    let total = i128::from(end) - i128::from(start) + 1;
    let limit = i128::try_from(max_chunks).unwrap_or(i128::MAX);

    let mut size = i128::from(by);
    if ceil_div(total, size) > limit {
        size = ceil_div(total, limit);
        tracing::debug!(start, end, requested = by, effective = %size, "widened chunk size");
    }
    // Bounds stay in i128 so ranges wider than i64::MAX frames keep the cap.
    let count = ceil_div(total, size);
    let end = i128::from(end);
    let mut chunks = Vec::with_capacity(usize::try_from(count).unwrap_or(max_chunks).min(max_chunks));
    let mut first = i128::from(start);
    loop {
        let last = (first + size - 1).min(end);
        chunks.push(FrameChunk {
            first: narrow(first),
            last: narrow(last),
            by: narrow(size),
        });
        if last == end {
            break;
        }
        first = last + 1;
    }

    Ok(chunks)
}

/// Saturating i128 to i64; only a chunk size wider than i64 saturates
fn narrow(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn ceil_div(numerator: i128, denominator: i128) -> i128 {
    (numerator + denominator - 1) / denominator
}
