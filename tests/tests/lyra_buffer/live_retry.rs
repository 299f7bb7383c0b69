use std::{sync::Arc, time::Duration};

use lyra_buffer::{BufferError, BufferOptions};
use lyra_core::BufferType;
use lyra_events::BufferEvent;
use lyra_net::NetError;
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, clock_at, live_manifest,
    manifest_with_periods,
};
use rstest::{fixture, rstest};

use crate::common::{drive_until, is_end_of_stream, next_item, representation_changes, start};

#[fixture]
fn not_yet_available() -> BufferError {
    NetError::RetryExhausted {
        max_retries: 4,
        source: Box::new(NetError::http_status(412, "http://cdn.example.com/v/seg-9.m4s")),
    }
    .into()
}

fn options() -> BufferOptions {
    BufferOptions::default()
        .with_buffer_types([BufferType::Video])
        .with_precondition_retry_delay(Duration::from_millis(50))
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn live_segment_not_yet_available_is_retried(not_yet_available: BufferError) {
    let manifest = live_manifest();
    let (_tx, clock) = clock_at(0.0);
    let scripted = Arc::new(ScriptedRepresentationBuffers::new(Behaviour::FailOnce(
        not_yet_available,
    )));
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        scripted.clone(),
        options(),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;

    let warnings = events
        .iter()
        .filter(|e| matches!(e, BufferEvent::Warning { buffer_type: BufferType::Video, .. }))
        .count();
    assert_eq!(warnings, 1);
    assert_eq!(
        representation_changes(&events, BufferType::Video),
        ["live-v-400000", "live-v-400000"]
    );
    assert_eq!(scripted.created().len(), 2);
    assert!((manifest.periods()[0].live_edge_offset() - 1.0).abs() < f64::EPSILON);
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn precondition_failure_on_static_content_is_fatal(not_yet_available: BufferError) {
    let manifest = manifest_with_periods(&[(0.0, 10.0)]);
    let (_tx, clock) = clock_at(0.0);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::FailOnce(
            not_yet_available,
        ))),
        options(),
    );

    let error = loop {
        match next_item(&mut harness.events).await.unwrap() {
            Ok(event) => {
                assert!(!matches!(event, BufferEvent::Warning { .. }));
                crate::common::select_first(&event);
            }
            Err(error) => break error,
        }
    };
    assert!(error.is_precondition_failed());
    assert!(next_item(&mut harness.events).await.is_none());
    assert!(manifest.periods()[0].live_edge_offset().abs() < f64::EPSILON);
}
