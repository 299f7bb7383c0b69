//! Manifests, clocks and tracing for tests.

use std::{sync::Arc, time::Duration};

use lyra_core::{
    Adaptation, BufferType, ClockTick, Manifest, ManifestRefresh, Period, Representation,
};
use rstest::fixture;
use tokio::sync::watch;

/// Install a test-friendly tracing subscriber, once. `RUST_LOG` applies.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[fixture]
pub fn tracing_setup() {
    init_tracing();
}

/// Representations `<prefix>-<bitrate>` for each bitrate.
pub fn ladder(prefix: &str, mime_type: &str, bitrates: &[u64]) -> Vec<Representation> {
    bitrates
        .iter()
        .map(|&bitrate| {
            Representation::new(format!("{prefix}-{bitrate}"), bitrate)
                .with_mime_type(mime_type, None)
        })
        .collect()
}

/// A Period with one audio and one video adaptation, ids derived from
/// `id`.
pub fn av_period(id: &str, start: f64, end: Option<f64>) -> Period {
    Period::new(id, start, end)
        .with_adaptation(Adaptation::new(
            format!("{id}-audio"),
            BufferType::Audio,
            ladder(&format!("{id}-a"), "audio/mp4", &[64_000, 128_000]),
        ))
        .with_adaptation(Adaptation::new(
            format!("{id}-video"),
            BufferType::Video,
            ladder(&format!("{id}-v"), "video/mp4", &[400_000, 1_000_000, 2_500_000]),
        ))
}

/// Adds a text adaptation to `period`.
pub fn with_text(period: Period) -> Period {
    let id = period.id.clone();
    period.with_adaptation(Adaptation::new(
        format!("{id}-text"),
        BufferType::Text,
        ladder(&format!("{id}-t"), "text/vtt", &[1_000]),
    ))
}

/// Static manifest of back to back audio/video Periods, one per pair of
/// bounds.
pub fn manifest_with_periods(bounds: &[(f64, f64)]) -> Arc<Manifest> {
    let periods = bounds
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| av_period(&format!("p{i}"), start, Some(end)))
        .collect();
    Arc::new(Manifest::new("static", periods, false).unwrap_or_else(|e| panic!("{e}")))
}

/// Live manifest with a single open-ended Period.
pub fn live_manifest() -> Arc<Manifest> {
    Arc::new(
        Manifest::new("live", vec![av_period("live", 0.0, None)], true)
            .unwrap_or_else(|e| panic!("{e}"))
            .with_refresh(ManifestRefresh::new(Duration::from_secs(2))),
    )
}

/// A playback clock the test drives.
pub fn clock_at(time: f64) -> (watch::Sender<ClockTick>, watch::Receiver<ClockTick>) {
    watch::channel(tick(time))
}

/// A tick at `time` with a comfortable buffer ahead.
pub fn tick(time: f64) -> ClockTick {
    ClockTick::at(time).with_buffer_gap(10.0)
}
