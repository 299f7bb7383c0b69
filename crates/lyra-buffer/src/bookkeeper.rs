use std::sync::Arc;

use lyra_core::{BufferType, TimeRange, TimeRanges};
use parking_lot::Mutex;

/// Ranges shorter than this are treated as gone.
const FLOAT_TOLERANCE: f64 = 0.01;

pub type SharedBookkeeper = Arc<Mutex<SegmentBookkeeper>>;

/// What a pushed segment is made of.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentInfo {
    pub period_id: String,
    pub adaptation_id: String,
    pub representation_id: String,
    pub bitrate: u64,
    /// Announced start of the segment, in seconds.
    pub start: f64,
    /// Announced end of the segment, in seconds.
    pub end: f64,
}

/// A segment as last seen in the source buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferedSegment {
    pub info: SegmentInfo,
    /// Part of `[info.start, info.end)` still present, as of the last
    /// [`synchronize`](SegmentBookkeeper::synchronize).
    pub buffered: TimeRange,
}

impl BufferedSegment {
    /// Whether part of the segment was removed after it was pushed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.buffered.start - self.info.start > FLOAT_TOLERANCE
            || self.info.end - self.buffered.end > FLOAT_TOLERANCE
    }
}

/// Keeps track of which segment fills which part of a source buffer.
///
/// Entries are kept in chronological order and never overlap: a pushed
/// segment replaces whatever it covers.
#[derive(Debug)]
pub struct SegmentBookkeeper {
    buffer_type: BufferType,
    segments: Vec<BufferedSegment>,
}

impl SegmentBookkeeper {
    #[must_use]
    pub fn new(buffer_type: BufferType) -> Self {
        Self {
            buffer_type,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn into_shared(self) -> SharedBookkeeper {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn segments(&self) -> &[BufferedSegment] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn reset(&mut self) {
        self.segments.clear();
    }

    /// Record a segment that is being pushed to the source buffer.
    pub fn insert(&mut self, info: SegmentInfo) {
        let range = TimeRange::new(info.start, info.end);
        if range.is_empty() {
            tracing::warn!(
                buffer_type = %self.buffer_type,
                start = info.start,
                end = info.end,
                "ignoring empty segment"
            );
            return;
        }
        self.carve(range);
        let at = self
            .segments
            .iter()
            .position(|s| s.buffered.start >= range.start)
            .unwrap_or(self.segments.len());
        tracing::trace!(
            buffer_type = %self.buffer_type,
            representation = %info.representation_id,
            start = info.start,
            end = info.end,
            "segment recorded"
        );
        self.segments.insert(
            at,
            BufferedSegment {
                info,
                buffered: range,
            },
        );
    }

    /// Forget everything recorded in `[start, end)`, clamping the segments
    /// crossing its bounds.
    pub fn remove_range(&mut self, start: f64, end: f64) {
        self.carve(TimeRange::new(start, end));
    }

    /// Re-align entries with what the source buffer actually holds.
    ///
    /// Segments no longer buffered at all are dropped, partially removed ones
    /// are clamped to what is left.
    pub fn synchronize(&mut self, buffered: &TimeRanges) {
        let before = self.segments.len();
        self.segments.retain_mut(|segment| {
            let remaining = buffered.intersect(&segment.buffered);
            match (remaining.first(), remaining.last()) {
                (Some(first), Some(last)) if last.end - first.start > FLOAT_TOLERANCE => {
                    segment.buffered = TimeRange::new(first.start, last.end);
                    true
                }
                _ => false,
            }
        });
        let dropped = before - self.segments.len();
        if dropped > 0 {
            tracing::debug!(
                buffer_type = %self.buffer_type,
                dropped,
                "garbage collected segments forgotten"
            );
        }
    }

    /// Whether a recorded segment still covers part of `[start, end)`.
    #[must_use]
    pub fn has_playable_segment(&self, start: f64, end: f64) -> bool {
        let wanted = TimeRange::new(start, end);
        self.segments
            .iter()
            .any(|s| s.buffered.intersection(&wanted).is_some())
    }

    /// Segment recorded at `time`, if any.
    #[must_use]
    pub fn segment_at(&self, time: f64) -> Option<&BufferedSegment> {
        self.segments.iter().find(|s| s.buffered.contains(time))
    }

    fn carve(&mut self, hole: TimeRange) {
        if hole.is_empty() {
            return;
        }
        let mut kept = Vec::with_capacity(self.segments.len() + 1);
        for segment in self.segments.drain(..) {
            if segment.buffered.intersection(&hole).is_none() {
                kept.push(segment);
                continue;
            }
            let before = TimeRange::new(segment.buffered.start, hole.start);
            let after = TimeRange::new(hole.end, segment.buffered.end);
            for part in [before, after] {
                if part.duration() > FLOAT_TOLERANCE {
                    kept.push(BufferedSegment {
                        info: segment.info.clone(),
                        buffered: part,
                    });
                }
            }
        }
        self.segments = kept;
    }
}
