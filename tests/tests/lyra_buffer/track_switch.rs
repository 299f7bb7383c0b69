use std::{sync::Arc, time::Duration};

use lyra_buffer::{BufferOptions, SourceBuffer};
use lyra_core::{Adaptation, BufferType, Manifest, Period};
use lyra_events::{BufferEvent, TrackSelector};
use lyra_test_utils::{
    Behaviour, MemorySourceBufferFactory, ScriptedRepresentationBuffers, clock_at, ladder,
};
use rstest::rstest;

use crate::common::{drive_until, is_end_of_stream, representation_changes, start};

fn two_tracks() -> Arc<Manifest> {
    let period = Period::new("p0", 0.0, Some(10.0))
        .with_adaptation(Adaptation::new(
            "main",
            BufferType::Video,
            ladder("main", "video/mp4", &[400_000]),
        ))
        .with_adaptation(Adaptation::new(
            "angle",
            BufferType::Video,
            ladder("angle", "video/mp4", &[400_000]),
        ));
    Arc::new(Manifest::new("tracks", vec![period], false).unwrap())
}

#[rstest]
#[timeout(Duration::from_secs(10))]
#[tokio::test]
async fn switching_track_keeps_media_around_the_position() {
    let manifest = two_tracks();
    let (_tx, clock) = clock_at(5.0);
    let source_buffers = Arc::new(MemorySourceBufferFactory::new());
    let mut harness = start(
        &manifest,
        clock,
        source_buffers.clone(),
        Arc::new(ScriptedRepresentationBuffers::new(Behaviour::Pending)),
        BufferOptions::default().with_buffer_types([BufferType::Video]),
    );

    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { .. })
    })
    .await;
    let selector: TrackSelector = events
        .iter()
        .find_map(|e| match e {
            BufferEvent::PeriodBufferReady { selector, .. } => Some(selector.clone()),
            _ => None,
        })
        .unwrap();
    let source_buffer = source_buffers.buffer(BufferType::Video).unwrap();
    source_buffer.fill(0.0, 10.0);

    let period = Arc::clone(&manifest.periods()[0]);
    selector.select(Arc::clone(&period.adaptations(BufferType::Video)[1]));
    let events = drive_until(&mut harness.events, |e| {
        matches!(e, BufferEvent::RepresentationChange { .. })
    })
    .await;
    assert_eq!(representation_changes(&events, BufferType::Video), ["angle-400000"]);

    let removed: Vec<_> = source_buffer
        .removed()
        .into_iter()
        .map(|r| (r.start, r.end))
        .collect();
    assert_eq!(removed, [(0.0, 3.0), (7.5, 10.0)]);

    selector.disable();
    drive_until(&mut harness.events, is_end_of_stream).await;

    let last = source_buffer.removed().last().copied().unwrap();
    assert_eq!((last.start, last.end), (3.0, 7.5));
    assert!(source_buffer.buffered().is_empty());
}
