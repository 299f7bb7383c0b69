// Common helpers for integration tests

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream::BoxStream};
use lyra_abr::{AbrManager, AbrOptions};
use lyra_buffer::{
    BufferContent, BufferOptions, BufferResult, PeriodBufferManager, RepresentationBufferFactory,
    SourceBufferFactory,
};
use lyra_core::{BufferType, ClockTick, Manifest};
use lyra_events::BufferEvent;
use tokio::sync::watch;

pub type Events = BoxStream<'static, BufferResult<BufferEvent>>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub manager: PeriodBufferManager,
    pub abr: Arc<AbrManager>,
    pub events: Events,
}

/// A manager buffering `manifest` from its first Period.
pub fn start(
    manifest: &Arc<Manifest>,
    clock: watch::Receiver<ClockTick>,
    source_buffers: Arc<dyn SourceBufferFactory>,
    representation_buffers: Arc<dyn RepresentationBufferFactory>,
    options: BufferOptions,
) -> Harness {
    lyra_test_utils::init_tracing();
    let abr = Arc::new(AbrManager::new(AbrOptions::default()));
    let manager = PeriodBufferManager::new(
        BufferContent {
            manifest: Arc::clone(manifest),
            initial_period: Arc::clone(&manifest.periods()[0]),
        },
        clock,
        Arc::clone(&abr),
        source_buffers,
        representation_buffers,
        options,
    );
    let events = manager.run();
    Harness {
        manager,
        abr,
        events,
    }
}

pub async fn next_item(events: &mut Events) -> Option<BufferResult<BufferEvent>> {
    tokio::time::timeout(EVENT_TIMEOUT, events.next())
        .await
        .expect("no buffer event in time")
}

/// Choose the first adaptation of the announced Period.
pub fn select_first(event: &BufferEvent) {
    if let BufferEvent::PeriodBufferReady {
        buffer_type,
        period,
        selector,
    } = event
        && let Some(adaptation) = period.adaptations(*buffer_type).first()
    {
        selector.select(Arc::clone(adaptation));
    }
}

/// Pull events until `stop` matches one, choosing the first adaptation of
/// every announced Period. The matching event is included.
pub async fn drive_until(
    events: &mut Events,
    stop: impl Fn(&BufferEvent) -> bool,
) -> Vec<BufferEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_item(events)
            .await
            .expect("buffer events ended")
            .unwrap_or_else(|e| panic!("buffering failed: {e}"));
        select_first(&event);
        let done = stop(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub fn is_end_of_stream(event: &BufferEvent) -> bool {
    matches!(event, BufferEvent::EndOfStream)
}

/// Ids of the Periods announced for `buffer_type`, in order.
pub fn ready_periods(events: &[BufferEvent], buffer_type: BufferType) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BufferEvent::PeriodBufferReady {
                buffer_type: t,
                period,
                ..
            } if *t == buffer_type => Some(period.id.clone()),
            _ => None,
        })
        .collect()
}

pub fn cleared_periods(events: &[BufferEvent], buffer_type: BufferType) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BufferEvent::PeriodBufferCleared {
                buffer_type: t,
                period,
            } if *t == buffer_type => Some(period.id.clone()),
            _ => None,
        })
        .collect()
}

pub fn representation_changes(events: &[BufferEvent], buffer_type: BufferType) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BufferEvent::RepresentationChange {
                buffer_type: t,
                representation,
                ..
            } if *t == buffer_type => Some(representation.id.clone()),
            _ => None,
        })
        .collect()
}
