use std::{sync::Arc, time::Duration};

use futures::StreamExt;

use lyra_buffer::{BufferError, BufferOptions};
use lyra_core::{BufferType, Manifest};
use lyra_events::BufferEvent;
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, av_period, clock_at,
    with_text,
};
use rstest::rstest;

use crate::common::{Events, drive_until, is_end_of_stream, next_item, select_first, start};

fn text_manifest() -> Arc<Manifest> {
    Arc::new(Manifest::new("subtitled", vec![with_text(av_period("p0", 0.0, Some(10.0)))], false).unwrap())
}

fn options() -> BufferOptions {
    BufferOptions::default().with_buffer_types([BufferType::Video, BufferType::Text])
}

fn text_warnings(events: &[BufferEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, BufferEvent::Warning { buffer_type: BufferType::Text, .. }))
        .count()
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn failing_text_buffer_does_not_stop_playback() {
    let manifest = text_manifest();
    let (_tx, clock) = clock_at(0.0);
    let source_buffers = Arc::new(MemorySourceBufferFactory::new());
    let scripted = ScriptedRepresentationBuffers::new(Behaviour::Full).with(
        "p0-t-1000",
        Behaviour::Fail(BufferError::source_buffer("malformed cue")),
    );
    let mut harness = start(
        &manifest,
        clock,
        source_buffers.clone(),
        Arc::new(scripted),
        options(),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;

    assert_eq!(text_warnings(&events), 1);
    assert!(source_buffers.disposed().contains(&BufferType::Text));
    assert!(!source_buffers.disposed().contains(&BufferType::Video));
    assert!(events.iter().any(
        |e| matches!(e, BufferEvent::CompleteBuffer { buffer_type: BufferType::Text })
    ));
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn unsupported_text_buffer_is_replaced() {
    let manifest = text_manifest();
    let (_tx, clock) = clock_at(0.0);
    let source_buffers = Arc::new(MemorySourceBufferFactory::new().failing(BufferType::Text));
    let mut harness = start(
        &manifest,
        clock,
        source_buffers.clone(),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Full)),
        options(),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;

    assert_eq!(text_warnings(&events), 1);
    assert!(source_buffers.buffer(BufferType::Text).is_none());
    assert!(source_buffers.buffer(BufferType::Video).is_some());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn text_failure_in_later_period_stops_every_text_buffer() {
    let manifest = Arc::new(
        Manifest::new(
            "two-parts",
            vec![
                with_text(av_period("p0", 0.0, Some(10.0))),
                with_text(av_period("p1", 10.0, Some(20.0))),
            ],
            false,
        )
        .unwrap(),
    );
    let (_tx, clock) = clock_at(0.0);
    let source_buffers = Arc::new(MemorySourceBufferFactory::new());
    let scripted = ScriptedRepresentationBuffers::new(Behaviour::Full).with(
        "p1-t-1000",
        Behaviour::Fail(BufferError::source_buffer("malformed cue")),
    );
    let mut harness = start(
        &manifest,
        clock,
        source_buffers.clone(),
        Arc::new(scripted),
        options(),
    );

    let events = drive_until(&mut harness.events, is_end_of_stream).await;
    assert_eq!(text_warnings(&events), 1);

    // Re-choosing the track of the earlier Period must not revive the
    // disposed text buffer.
    let first_text = events.iter().find_map(|e| match e {
        BufferEvent::PeriodBufferReady {
            buffer_type: BufferType::Text,
            period,
            selector,
        } if period.id == "p0" => Some((Arc::clone(period), selector.clone())),
        _ => None,
    });
    let (period, selector) = first_text.unwrap();
    selector.select(Arc::clone(&period.adaptations(BufferType::Text)[0]));
    let _ = tokio::time::timeout(Duration::from_millis(200), harness.events.next()).await;

    let text_buffers = source_buffers
        .created()
        .into_iter()
        .filter(|(t, _)| *t == BufferType::Text)
        .count();
    assert_eq!(text_buffers, 1);
}

async fn first_error(events: &mut Events) -> BufferError {
    loop {
        match next_item(events).await.unwrap() {
            Ok(event) => select_first(&event),
            Err(error) => return error,
        }
    }
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn failing_video_buffer_ends_the_stream() {
    let manifest = text_manifest();
    let (_tx, clock) = clock_at(0.0);
    let scripted = ScriptedRepresentationBuffers::new(Behaviour::Pending).with(
        "p0-v-400000",
        Behaviour::Fail(BufferError::source_buffer("append rejected")),
    );
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(scripted),
        options(),
    );

    let error = first_error(&mut harness.events).await;

    assert_eq!(error, BufferError::source_buffer("append rejected"));
    assert!(next_item(&mut harness.events).await.is_none());
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn adaptation_without_representation_is_a_scheduler_error() {
    let manifest = Arc::new(
        Manifest::new(
            "empty",
            vec![lyra_core::Period::new("p0", 0.0, Some(10.0)).with_adaptation(
                lyra_core::Adaptation::new("bare", BufferType::Video, []),
            )],
            false,
        )
        .unwrap(),
    );
    let (_tx, clock) = clock_at(0.0);
    let mut harness = start(
        &manifest,
        clock,
        Arc::new(MemorySourceBufferFactory::new()),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Full)),
        BufferOptions::default().with_buffer_types([BufferType::Video]),
    );

    let error = first_error(&mut harness.events).await;

    assert!(matches!(
        error,
        BufferError::Scheduler { buffer_type: BufferType::Video, .. }
    ));
}
