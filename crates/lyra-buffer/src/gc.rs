use std::sync::Arc;

use futures::StreamExt;
use lyra_core::{BufferType, ClockTick, TimeRange, TimeRanges};
use tokio::{sync::watch, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::{SharedBookkeeper, SourceBuffer};

/// Parts of `buffered` lying before `current_time - max_behind` or after
/// `current_time + max_ahead`, in buffer order. Infinite limits keep
/// everything on their side.
#[must_use]
pub fn collectable_ranges(
    buffered: &TimeRanges,
    current_time: f64,
    max_behind: f64,
    max_ahead: f64,
) -> Vec<TimeRange> {
    let low = current_time - max_behind;
    let high = current_time + max_ahead;
    let mut out = Vec::new();
    for range in buffered.iter() {
        if low.is_finite() {
            let behind = TimeRange::new(range.start, range.end.min(low));
            if !behind.is_empty() {
                out.push(behind);
            }
        }
        if high.is_finite() {
            let ahead = TimeRange::new(range.start.max(high), range.end);
            if !ahead.is_empty() {
                out.push(ahead);
            }
        }
    }
    out
}

/// Removes buffered data too far from the playback position.
pub struct GarbageCollector {
    buffer_type: BufferType,
    source_buffer: Arc<dyn SourceBuffer>,
    bookkeeper: SharedBookkeeper,
    max_buffer_behind: watch::Receiver<f64>,
    max_buffer_ahead: watch::Receiver<f64>,
}

impl GarbageCollector {
    pub fn new(
        buffer_type: BufferType,
        source_buffer: Arc<dyn SourceBuffer>,
        bookkeeper: SharedBookkeeper,
        max_buffer_behind: watch::Receiver<f64>,
        max_buffer_ahead: watch::Receiver<f64>,
    ) -> Self {
        Self {
            buffer_type,
            source_buffer,
            bookkeeper,
            max_buffer_behind,
            max_buffer_ahead,
        }
    }

    /// One collection pass. Returns the number of ranges removed.
    pub fn collect(&self, tick: &ClockTick) -> usize {
        let buffered = self.source_buffer.buffered();
        let behind = *self.max_buffer_behind.borrow();
        let ahead = *self.max_buffer_ahead.borrow();
        let mut removed = 0;
        for range in collectable_ranges(&buffered, tick.current_time, behind, ahead) {
            match self.source_buffer.remove_buffer(range.start, range.end) {
                Ok(()) => {
                    tracing::trace!(
                        buffer_type = %self.buffer_type,
                        start = range.start,
                        end = range.end,
                        "garbage collected"
                    );
                    self.bookkeeper.lock().remove_range(range.start, range.end);
                    removed += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        buffer_type = %self.buffer_type,
                        start = range.start,
                        end = range.end,
                        %error,
                        "garbage collection failed"
                    );
                }
            }
        }
        removed
    }

    /// Collect on every tick until `cancel` fires or the clock goes away.
    pub fn spawn(
        self,
        clock: watch::Receiver<ClockTick>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = WatchStream::new(clock);
            loop {
                let tick = tokio::select! {
                    () = cancel.cancelled() => break,
                    tick = ticks.next() => match tick {
                        Some(tick) => tick,
                        None => break,
                    },
                };
                self.collect(&tick);
            }
            tracing::debug!(buffer_type = %self.buffer_type, "garbage collector stopped");
        })
    }
}
