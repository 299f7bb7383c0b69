use std::{sync::Arc, time::Duration};

use lyra_buffer::BufferOptions;
use lyra_core::BufferType;
use lyra_events::{BufferEvent, EventBus};
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, clock_at,
    manifest_with_periods,
};
use rstest::rstest;

use crate::common::{drive_until, is_end_of_stream, ready_periods, start};

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn periods_are_buffered_in_order_until_end_of_stream() {
    let manifest = manifest_with_periods(&[(0.0, 10.0), (10.0, 20.0), (20.0, 30.0)]);
    let (_tx, clock) = clock_at(0.0);
    let source_buffers = Arc::new(MemorySourceBufferFactory::new());
    let scripted = Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Full));
    let mut harness = start(
        &manifest,
        clock,
        source_buffers.clone(),
        scripted.clone(),
        BufferOptions::default(),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;

    for buffer_type in [BufferType::Audio, BufferType::Video] {
        assert_eq!(ready_periods(&events, buffer_type), ["p0", "p1", "p2"]);
        let completes = events
            .iter()
            .filter(|e| matches!(e, BufferEvent::CompleteBuffer { buffer_type: t } if *t == buffer_type))
            .count();
        assert_eq!(completes, 1);
    }
    assert_eq!(events.iter().filter(|e| is_end_of_stream(e)).count(), 1);

    let created: Vec<_> = source_buffers.created().into_iter().map(|(t, _)| t).collect();
    assert_eq!(created.len(), 2, "one source buffer per type: {created:?}");
    assert!(created.contains(&BufferType::Audio));
    assert!(created.contains(&BufferType::Video));

    let video_periods: Vec<_> = scripted
        .created()
        .into_iter()
        .filter(|c| c.buffer_type == BufferType::Video)
        .map(|c| c.period_id)
        .collect();
    assert_eq!(video_periods, ["p0", "p1", "p2"]);

    harness.manager.dispose();
    let mut disposed = source_buffers.disposed();
    disposed.sort();
    assert_eq!(disposed, [BufferType::Audio, BufferType::Video]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn events_are_published_on_the_bus() {
    let manifest = manifest_with_periods(&[(0.0, 10.0)]);
    let (_tx, clock) = clock_at(0.0);
    let bus = EventBus::new(64);
    let mut subscriber = bus.subscribe();
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Full)),
        BufferOptions::default()
            .with_buffer_types([BufferType::Video])
            .with_event_bus(bus),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;

    let mut published = Vec::new();
    while let Ok(event) = subscriber.try_recv() {
        published.push(event.to_string());
    }
    let streamed: Vec<_> = events.iter().map(ToString::to_string).collect();
    assert_eq!(published, streamed);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn older_period_is_cleared_once_playback_passes_it() {
    let manifest = manifest_with_periods(&[(0.0, 10.0), (10.0, 20.0)]);
    let (tx, clock) = clock_at(0.0);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(
            ScriptedRepresentationBuffers::new(Behaviour::Pending).for_period("p0", Behaviour::Full),
        ),
        BufferOptions::default().with_buffer_types([BufferType::Video]),
    );

    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::PeriodBufferReady { period, .. } if period.id == "p1")
    })
    .await;
    assert_eq!(ready_periods(&events, BufferType::Video), ["p0", "p1"]);

    tx.send_replace(lyra_test_utils::tick(12.0));
    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::PeriodBufferCleared { .. })
    })
    .await;
    let Some(BufferEvent::PeriodBufferCleared { period, .. }) = events.last() else {
        unreachable!()
    };
    assert_eq!(period.id, "p0");
}
