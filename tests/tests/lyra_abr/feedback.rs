use std::{sync::Arc, time::Duration};

use lyra_abr::Metric;
use lyra_buffer::BufferOptions;
use lyra_core::BufferType;
use lyra_events::BufferEvent;
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, clock_at,
    manifest_with_periods, tick,
};
use rstest::rstest;
use tokio::sync::mpsc;

use crate::common::{Harness, drive_until, representation_changes, start};

fn is_representation_change(event: &BufferEvent) -> bool {
    matches!(event, BufferEvent::RepresentationChange { .. })
}

/// 4 MB in one second: 32 Mbit/s.
fn fast_sample() -> Metric {
    Metric {
        buffer_type: BufferType::Video,
        duration: Duration::from_secs(1),
        size: 4_000_000,
    }
}

fn harness() -> (tokio::sync::watch::Sender<lyra_core::ClockTick>, Harness) {
    let manifest = manifest_with_periods(&[(0.0, 60.0)]);
    let (tx, clock) = clock_at(0.0);
    let harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Pending)),
        BufferOptions::default().with_buffer_types([BufferType::Video]),
    );
    (tx, harness)
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn bandwidth_samples_raise_the_quality() {
    let (tx, mut harness) = harness();

    let events = drive_until(&mut harness.events, is_representation_change).await;
    assert_eq!(representation_changes(&events, BufferType::Video), ["p0-v-400000"]);

    harness.abr.record_metric(fast_sample());
    tx.send_replace(tick(1.0));
    let events = drive_until(&mut harness.events, is_representation_change).await;

    assert_eq!(representation_changes(&events, BufferType::Video), ["p0-v-2500000"]);
    let estimate = events.iter().find_map(|e| match e {
        BufferEvent::BitrateEstimationChange { bitrate, .. } => *bitrate,
        _ => None,
    });
    assert!(estimate.is_some_and(|bitrate| bitrate > 2_500_000.0));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn routed_samples_reach_the_chooser() {
    let (tx, mut harness) = harness();
    let (metrics_tx, metrics) = mpsc::channel(8);
    let (_requests_tx, requests) = mpsc::channel(8);
    let router = harness.abr.route(metrics, requests);

    drive_until(&mut harness.events, is_representation_change).await;
    metrics_tx.send(fast_sample()).await.unwrap();

    // The router applies samples asynchronously: tick until the switch.
    let mut time = 1.0;
    let events = loop {
        tx.send_replace(tick(time));
        let pulled = tokio::time::timeout(
            Duration::from_millis(100),
            drive_until(&mut harness.events, is_representation_change),
        )
        .await;
        if let Ok(events) = pulled {
            break events;
        }
        time += 1.0;
    };
    assert_eq!(representation_changes(&events, BufferType::Video), ["p0-v-2500000"]);

    harness.abr.dispose();
    router.await.unwrap();
}
