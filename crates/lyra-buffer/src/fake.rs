use std::sync::Arc;

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use lyra_core::{BufferType, ClockTick, Period};
use lyra_events::BufferEvent;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::BufferResult;

fn is_full(tick: &ClockTick, wanted_buffer_ahead: f64, period: &Period) -> bool {
    tick.current_time + wanted_buffer_ahead >= period.end_or_infinity()
}

/// Stand-in for a Period whose track is disabled or broken.
///
/// Loads nothing and only reports being full once the wanted buffer reaches
/// the end of the Period, so that the next Period can start.
pub fn fake_buffer(
    buffer_type: BufferType,
    period: Arc<Period>,
    clock: watch::Receiver<ClockTick>,
    wanted_buffer_ahead: watch::Receiver<f64>,
) -> BoxStream<'static, BufferResult<BufferEvent>> {
    Box::pin(stream! {
        let mut ticks = WatchStream::new(clock);
        let mut full = false;
        while let Some(tick) = ticks.next().await {
            let now_full = is_full(&tick, *wanted_buffer_ahead.borrow(), &period);
            if now_full == full {
                continue;
            }
            full = now_full;
            tracing::trace!(%buffer_type, period = %period.id, full, "fake buffer");
            yield Ok(if full {
                BufferEvent::FullBuffer { buffer_type }
            } else {
                BufferEvent::ActiveBuffer { buffer_type }
            });
        }
    })
}
