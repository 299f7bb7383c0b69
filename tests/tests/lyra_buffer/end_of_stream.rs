use std::{sync::Arc, time::Duration};

use lyra_buffer::BufferOptions;
use lyra_core::BufferType;
use lyra_events::BufferEvent;
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, clock_at,
    manifest_with_periods, tick,
};
use rstest::rstest;
use tokio::sync::watch;

use crate::common::{cleared_periods, drive_until, is_end_of_stream, start};

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn stream_resumes_when_a_buffer_becomes_active_again() {
    let manifest = manifest_with_periods(&[(0.0, 10.0), (10.0, 20.0)]);
    let (tx, clock) = clock_at(0.0);
    let (wanted_tx, wanted) = watch::channel(30.0);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Clocked)),
        BufferOptions::default().with_wanted_buffer_ahead(wanted),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;
    for buffer_type in [BufferType::Audio, BufferType::Video] {
        assert!(has_complete(&events, buffer_type));
    }

    // Less wanted ahead: the last Period is not full anymore.
    wanted_tx.send_replace(0.0);
    tx.send_replace(tick(12.0));
    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::ResumeStream)
    })
    .await;
    assert!(
        events
            .iter()
            .any(|e| matches!(e, BufferEvent::ActiveBuffer { .. }))
    );
    assert!(!events.iter().any(is_end_of_stream));

    wanted_tx.send_replace(30.0);
    tx.send_replace(tick(13.0));
    let events = drive_until(&mut harness.events, is_end_of_stream).await;
    assert_eq!(events.iter().filter(|e| is_end_of_stream(e)).count(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn active_older_period_clears_the_newer_ones() {
    let manifest = manifest_with_periods(&[(0.0, 10.0), (10.0, 20.0), (20.0, 30.0)]);
    let (tx, clock) = clock_at(0.0);
    let (wanted_tx, wanted) = watch::channel(12.0);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Clocked)),
        BufferOptions::default()
            .with_buffer_types([BufferType::Video])
            .with_wanted_buffer_ahead(wanted),
    );

    // p0 is full at once, p1 is announced but not full.
    drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { period, .. } if period.id == "p1")
    })
    .await;

    wanted_tx.send_replace(2.0);
    tx.send_replace(tick(1.0));
    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::ActiveBuffer { .. })
    })
    .await;
    assert_eq!(cleared_periods(&events, BufferType::Video), ["p1"]);
}

fn has_complete(events: &[BufferEvent], buffer_type: BufferType) -> bool {
    events
        .iter()
        .any(|e| matches!(e, BufferEvent::CompleteBuffer { buffer_type: t } if *t == buffer_type))
}
