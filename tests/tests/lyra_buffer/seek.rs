use std::{sync::Arc, time::Duration};

use lyra_buffer::BufferOptions;
use lyra_core::BufferType;
use lyra_events::BufferEvent;
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, clock_at,
    manifest_with_periods, tick,
};
use rstest::rstest;

use crate::common::{cleared_periods, drive_until, ready_periods, representation_changes, start};

fn announced(period_id: &'static str) -> impl Fn(&BufferEvent) -> bool {
    move |e| matches!(e, BufferEvent::PeriodBufferReady { period, .. } if period.id == period_id)
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn seek_outside_managed_periods_rebuilds_the_chain() {
    let manifest = manifest_with_periods(&[(0.0, 10.0), (10.0, 20.0), (20.0, 30.0)]);
    let (tx, clock) = clock_at(0.0);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Pending)),
        BufferOptions::default().with_buffer_types([BufferType::Video]),
    );

    drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { .. })
    })
    .await;

    tx.send_replace(tick(25.0).seeking());
    let events = drive_until(&mut harness.events, announced("p2")).await;

    assert_eq!(cleared_periods(&events, BufferType::Video), ["p0"]);
    assert_eq!(ready_periods(&events, BufferType::Video), ["p2"]);
    let cleared_at = events
        .iter()
        .position(|e| matches!(e, BufferEvent::PeriodBufferCleared { .. }));
    assert!(cleared_at < Some(events.len() - 1));

    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { .. })
    })
    .await;
    assert_eq!(representation_changes(&events, BufferType::Video), ["p2-v-400000"]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn seek_back_tears_down_newest_first() {
    let manifest = manifest_with_periods(&[(0.0, 10.0), (10.0, 20.0), (20.0, 30.0), (30.0, 40.0)]);
    let (tx, clock) = clock_at(20.0);
    let scripted = ScriptedRepresentationBuffers::new(Behaviour::Pending)
        .for_period("p2", Behaviour::Full);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(scripted),
        BufferOptions::default().with_buffer_types([BufferType::Audio]),
    );

    // The chain starts on p0, moves to p2 on the first tick, then p2 fills
    // and p3 is announced.
    let events = drive_until(&mut harness.events, announced("p3")).await;
    assert_eq!(ready_periods(&events, BufferType::Audio), ["p0", "p2", "p3"]);
    assert_eq!(cleared_periods(&events, BufferType::Audio), ["p0"]);

    tx.send_replace(tick(5.0).seeking());
    let events = drive_until(&mut harness.events, announced("p0")).await;
    assert_eq!(cleared_periods(&events, BufferType::Audio), ["p3", "p2"]);
    assert_eq!(ready_periods(&events, BufferType::Audio), ["p0"]);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn seek_inside_the_period_restarts_the_representation_buffer() {
    let manifest = manifest_with_periods(&[(0.0, 10.0)]);
    let (tx, clock) = clock_at(0.0);
    let scripted = Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Pending));
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        scripted.clone(),
        BufferOptions::default().with_buffer_types([BufferType::Video]),
    );

    drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { .. })
    })
    .await;
    tx.send_replace(tick(6.0).seeking());
    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { .. })
    })
    .await;

    assert!(cleared_periods(&events, BufferType::Video).is_empty());
    assert_eq!(scripted.created().len(), 2);
}
