use std::{future::ready, sync::Arc, time::Duration};

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use lyra_abr::{AbrEstimate, AbrManager};
use lyra_core::{Adaptation, BufferType, ClockTick, Manifest, Period, Representation};
use lyra_events::BufferEvent;
use lyra_net::RetryPolicy;
use parking_lot::Mutex;
use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};
use tokio_stream::wrappers::WatchStream;

use crate::{
    BufferOptions, BufferResult, BufferSlot, RepresentationBufferArgs,
    RepresentationBufferFactory, RepresentationContent,
};

/// Seconds the live edge moves back after each `412`.
const LIVE_EDGE_STEP: f64 = 1.0;

#[derive(Clone, Debug)]
pub struct AdaptationContent {
    pub manifest: Arc<Manifest>,
    pub period: Arc<Period>,
    pub adaptation: Arc<Adaptation>,
}

type ActiveRepresentation = Arc<Mutex<Option<Arc<Representation>>>>;

/// Ticks for the ABR logic, carrying what is being downloaded right now.
fn abr_clock(
    clock: watch::Receiver<ClockTick>,
    active: ActiveRepresentation,
) -> BoxStream<'static, ClockTick> {
    WatchStream::new(clock)
        .map(move |tick| {
            let active = active.lock().clone();
            tick.with_download_bitrate(active.as_ref().map(|r| r.bitrate))
                .with_last_index_position(active.as_ref().and_then(|r| r.index.last_position()))
        })
        .boxed()
}

/// Starts representation buffers for one adaptation.
struct Launcher {
    buffer_type: BufferType,
    clock: watch::Receiver<ClockTick>,
    content: AdaptationContent,
    slot: BufferSlot,
    factory: Arc<dyn RepresentationBufferFactory>,
    wanted_buffer_ahead: watch::Receiver<f64>,
    retry: RetryPolicy,
}

impl Launcher {
    fn launch(
        &self,
        representation: &Arc<Representation>,
    ) -> (BufferEvent, BoxStream<'static, BufferResult<BufferEvent>>) {
        tracing::debug!(
            buffer_type = %self.buffer_type,
            period = %self.content.period.id,
            representation = %representation.id,
            bitrate = representation.bitrate,
            "starting representation buffer"
        );
        let change = BufferEvent::RepresentationChange {
            buffer_type: self.buffer_type,
            period: Arc::clone(&self.content.period),
            representation: Arc::clone(representation),
        };
        let events = self.factory.create(RepresentationBufferArgs {
            clock: self.clock.clone(),
            content: RepresentationContent {
                manifest: Arc::clone(&self.content.manifest),
                period: Arc::clone(&self.content.period),
                adaptation: Arc::clone(&self.content.adaptation),
                representation: Arc::clone(representation),
            },
            slot: self.slot.clone(),
            wanted_buffer_ahead: self.wanted_buffer_ahead.clone(),
            retry: self.retry.clone(),
        });
        (change, events)
    }
}

enum Input {
    Estimate(Option<AbrEstimate>),
    Seek,
    Buffer(Option<BufferResult<BufferEvent>>),
    Retry,
}

/// Downloads one adaptation of one Period, following the ABR decisions.
///
/// A representation buffer runs for the representation currently chosen. It
/// is replaced on every change of representation and on every seek.
pub struct AdaptationBuffer {
    launcher: Launcher,
    abr: Arc<AbrManager>,
    precondition_retry_delay: Duration,
}

impl AdaptationBuffer {
    pub fn new(
        buffer_type: BufferType,
        clock: watch::Receiver<ClockTick>,
        content: AdaptationContent,
        abr: Arc<AbrManager>,
        slot: BufferSlot,
        factory: Arc<dyn RepresentationBufferFactory>,
        options: &BufferOptions,
    ) -> Self {
        Self {
            launcher: Launcher {
                buffer_type,
                clock,
                content,
                slot,
                factory,
                wanted_buffer_ahead: options.wanted_buffer_ahead.clone(),
                retry: options.retry_policy(),
            },
            abr,
            precondition_retry_delay: options.precondition_retry_delay,
        }
    }

    pub fn run(self) -> BoxStream<'static, BufferResult<BufferEvent>> {
        let Self {
            launcher,
            abr,
            precondition_retry_delay,
        } = self;

        Box::pin(stream! {
            let buffer_type = launcher.buffer_type;
            let active = ActiveRepresentation::default();
            let mut estimates = abr.estimates(
                buffer_type,
                abr_clock(launcher.clock.clone(), Arc::clone(&active)),
                launcher.content.adaptation.representations().to_vec(),
            );
            let mut seeks = WatchStream::from_changes(launcher.clock.clone())
                .filter(|tick| ready(tick.seeking))
                .boxed();

            let mut estimates_open = true;
            let mut last_bitrate: Option<Option<f64>> = None;
            let mut current: Option<Arc<Representation>> = None;
            let mut buffer: Option<BoxStream<'static, BufferResult<BufferEvent>>> = None;
            let mut retry_at: Option<Instant> = None;

            loop {
                let input = tokio::select! {
                    estimate = estimates.next(), if estimates_open => Input::Estimate(estimate),
                    Some(_) = seeks.next() => Input::Seek,
                    event = async {
                        match buffer.as_mut() {
                            Some(events) => events.next().await,
                            None => None,
                        }
                    }, if buffer.is_some() => Input::Buffer(event),
                    () = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                        Input::Retry
                    }
                    else => break,
                };

                let mut restart: Option<Arc<Representation>> = None;
                match input {
                    Input::Estimate(None) => estimates_open = false,
                    Input::Estimate(Some(estimate)) => {
                        if last_bitrate != Some(estimate.bitrate) {
                            last_bitrate = Some(estimate.bitrate);
                            yield Ok(BufferEvent::BitrateEstimationChange {
                                buffer_type,
                                bitrate: estimate.bitrate,
                            });
                        }
                        let switch = current
                            .as_ref()
                            .is_none_or(|r| !r.is_same(&estimate.representation));
                        if switch {
                            restart = Some(estimate.representation);
                        }
                    }
                    Input::Seek => {
                        tracing::trace!(%buffer_type, "seek, restarting representation buffer");
                        restart.clone_from(&current);
                    }
                    Input::Retry => restart.clone_from(&current),
                    Input::Buffer(None) => buffer = None,
                    Input::Buffer(Some(Ok(event))) => yield Ok(event),
                    Input::Buffer(Some(Err(error))) => {
                        let content = &launcher.content;
                        if !(error.is_precondition_failed() && content.manifest.is_live) {
                            yield Err(error);
                            break;
                        }
                        buffer = None;
                        let offset = content.period.push_back_live_edge(LIVE_EDGE_STEP);
                        tracing::warn!(
                            %buffer_type,
                            period = %content.period.id,
                            live_edge_offset = offset,
                            %error,
                            "segment not available yet, retrying"
                        );
                        yield Ok(BufferEvent::Warning {
                            buffer_type,
                            error: error.to_string(),
                        });
                        retry_at = Some(Instant::now() + precondition_retry_delay);
                    }
                }

                if let Some(representation) = restart {
                    buffer = None;
                    retry_at = None;
                    *active.lock() = Some(Arc::clone(&representation));
                    let (change, events) = launcher.launch(&representation);
                    current = Some(representation);
                    yield Ok(change);
                    buffer = Some(events);
                }
            }
        })
    }
}
