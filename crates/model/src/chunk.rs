//! Bounded segments of an oversized input.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Segments shorter than this are rounding noise, not content.
const MIN_SPAN_SECS: f64 = 1e-3;

/// A planned `[start, start + duration)` window of the source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpan {
    pub index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl ChunkSpan {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// A segment file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub path: PathBuf,

    /// `false` when the chunk is the original input itself, which must never
    /// be deleted.
    pub owned: bool,
}

impl Chunk {
    /// The whole input as its single chunk.
    pub fn identity(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            index: 0,
            start_secs: 0.0,
            duration_secs,
            path: path.into(),
            owned: false,
        }
    }

    /// An extracted segment file.
    pub fn extracted(span: ChunkSpan, path: impl Into<PathBuf>) -> Self {
        Self {
            index: span.index,
            start_secs: span.start_secs,
            duration_secs: span.duration_secs,
            path: path.into(),
            owned: true,
        }
    }

    /// Same segment, different file (after processing).
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: true,
            ..self.clone()
        }
    }
}

/// Plan the windows for splitting `duration_secs` into pieces of at most
/// `max_chunk_secs`.
///
/// Durations at or below the limit (or a non-positive limit) yield one span
/// covering everything. Otherwise there are `ceil(duration / max)` spans,
/// the last one possibly shorter.
pub fn plan_chunks(duration_secs: f64, max_chunk_secs: f64) -> Vec<ChunkSpan> {
    let duration = duration_secs.max(0.0);
    if max_chunk_secs <= 0.0 || duration <= max_chunk_secs {
        return vec![ChunkSpan {
            index: 0,
            start_secs: 0.0,
            duration_secs: duration,
        }];
    }

    let count = (duration / max_chunk_secs).ceil() as usize;
    (0..count)
        .map(|index| {
            let start = index as f64 * max_chunk_secs;
            let end = ((index + 1) as f64 * max_chunk_secs).min(duration);
            ChunkSpan {
                index,
                start_secs: start,
                duration_secs: end - start,
            }
        })
        .filter(|span| span.duration_secs >= MIN_SPAN_SECS)
        .collect()
}

/// Whether chunk indices are exactly `0..len` in order.
pub fn is_contiguous(chunks: &[Chunk]) -> bool {
    chunks
        .iter()
        .enumerate()
        .all(|(position, chunk)| chunk.index == position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_input_is_one_span() {
        let spans = plan_chunks(10.0, 30.0);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].duration_secs, 10.0);
    }

    #[test]
    fn test_exact_multiple() {
        let spans = plan_chunks(90.0, 30.0);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[2].start_secs, 60.0);
        assert_eq!(spans[2].duration_secs, 30.0);
    }

    #[test]
    fn test_remainder_goes_to_last_span() {
        let spans = plan_chunks(75.0, 30.0);
        assert_eq!(spans.len(), 3);
        assert!((spans[2].duration_secs - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_contiguity_check() {
        let a = Chunk::identity("/a.mp4", 1.0);
        let mut b = Chunk::identity("/b.mp4", 1.0);
        b.index = 1;
        assert!(is_contiguous(&[a.clone(), b.clone()]));
        assert!(!is_contiguous(&[b, a]));
    }

    proptest! {
        #[test]
        fn prop_spans_tile_the_timeline(duration in 0.1f64..3600.0, max in 1.0f64..120.0) {
            let spans = plan_chunks(duration, max);
            prop_assert!(!spans.is_empty());

            let mut cursor = 0.0;
            for (i, span) in spans.iter().enumerate() {
                prop_assert_eq!(span.index, i);
                prop_assert!((span.start_secs - cursor).abs() < 1e-6);
                prop_assert!(span.duration_secs <= max + 1e-9);
                cursor = span.end_secs();
            }
            prop_assert!((cursor - duration).abs() < 1e-3);
        }
    }
}
