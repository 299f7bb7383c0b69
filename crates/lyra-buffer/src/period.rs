use std::sync::Arc;

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use lyra_abr::AbrManager;
use lyra_core::{Adaptation, BufferType, ClockTick, Manifest, Period, TimeRange, TimeRanges};
use lyra_events::{BufferEvent, TrackChoice, TrackSelector};
use tokio::sync::watch;
use tokio_stream::{StreamMap, wrappers::WatchStream};
use tokio_util::sync::CancellationToken;

use crate::{
    AdaptationBuffer, AdaptationContent, BufferError, BufferOptions, BufferResult, BufferSlot,
    EndOfStreamTracker, RepresentationBufferFactory, SourceBufferFactory, SourceBufferRegistry,
    fake_buffer,
};

type EventStream = BoxStream<'static, BufferResult<BufferEvent>>;

/// Where buffering starts.
#[derive(Clone, Debug)]
pub struct BufferContent {
    pub manifest: Arc<Manifest>,
    pub initial_period: Arc<Period>,
}

/// Media kept around the playback position when switching adaptation:
/// seconds before, seconds after.
fn switch_padding(buffer_type: BufferType) -> (f64, f64) {
    if buffer_type.is_native() {
        (2.0, 2.5)
    } else {
        (0.0, 0.0)
    }
}

/// Buffered parts of `period_range` to remove when another adaptation
/// replaces the current one. Nothing is removed when the padded window
/// around `current_time` covers the whole range.
#[must_use]
pub fn ranges_to_clean(
    buffered: &TimeRanges,
    period_range: TimeRange,
    current_time: f64,
    (before, after): (f64, f64),
) -> Vec<TimeRange> {
    let window = TimeRange::new(current_time - before, current_time + after);
    if window.start <= period_range.start && window.end >= period_range.end {
        return Vec::new();
    }
    buffered
        .intersect(&period_range)
        .exclude(&window)
        .iter()
        .copied()
        .collect()
}

fn period_range(period: &Period) -> TimeRange {
    TimeRange::new(period.start, period.end_or_infinity())
}

fn remove_ranges(buffer_type: BufferType, slot: &BufferSlot, ranges: &[TimeRange]) {
    for range in ranges {
        match slot.source_buffer.remove_buffer(range.start, range.end) {
            Ok(()) => slot.bookkeeper.lock().remove_range(range.start, range.end),
            Err(error) => tracing::warn!(
                %buffer_type,
                start = range.start,
                end = range.end,
                %error,
                "could not clean source buffer"
            ),
        }
    }
}

/// State shared by every chain of a manager.
struct Shared {
    manifest: Arc<Manifest>,
    initial_period: Arc<Period>,
    clock: watch::Receiver<ClockTick>,
    abr: Arc<AbrManager>,
    registry: SourceBufferRegistry,
    representation_factory: Arc<dyn RepresentationBufferFactory>,
    options: BufferOptions,
    cancel: CancellationToken,
}

impl Shared {
    fn fake(&self, buffer_type: BufferType, period: &Arc<Period>) -> EventStream {
        fake_buffer(
            buffer_type,
            Arc::clone(period),
            self.clock.clone(),
            self.options.wanted_buffer_ahead.clone(),
        )
    }

    /// Start buffering `period` the way `choice` says.
    fn start_choice(
        &self,
        buffer_type: BufferType,
        period: &Arc<Period>,
        choice: TrackChoice,
        previous: &mut Option<Arc<Adaptation>>,
    ) -> BufferResult<EventStream> {
        let adaptation = match choice {
            TrackChoice::Disabled => {
                tracing::debug!(%buffer_type, period = %period.id, "track disabled");
                *previous = None;
                if let Some(slot) = self.registry.get(buffer_type) {
                    let ranges: Vec<_> = slot
                        .source_buffer
                        .buffered()
                        .intersect(&period_range(period))
                        .iter()
                        .copied()
                        .collect();
                    remove_ranges(buffer_type, &slot, &ranges);
                }
                return Ok(self.fake(buffer_type, period));
            }
            TrackChoice::Adaptation(adaptation) => adaptation,
        };

        let first = adaptation.representations().first().ok_or_else(|| {
            BufferError::scheduler(
                buffer_type,
                format!("adaptation {} has no representation", adaptation.id),
            )
        })?;
        let slot =
            self.registry
                .get_or_create(buffer_type, &first.mime_type, first.codecs.as_deref())?;

        if let Some(old) = previous.as_ref()
            && old.id != adaptation.id
        {
            let current_time = self.clock.borrow().current_time;
            let ranges = ranges_to_clean(
                &slot.source_buffer.buffered(),
                period_range(period),
                current_time,
                switch_padding(buffer_type),
            );
            tracing::debug!(
                %buffer_type,
                period = %period.id,
                from = %old.id,
                to = %adaptation.id,
                cleaned = ranges.len(),
                "switching adaptation"
            );
            remove_ranges(buffer_type, &slot, &ranges);
        }
        *previous = Some(Arc::clone(&adaptation));

        self.registry.start_gc(
            buffer_type,
            self.clock.clone(),
            self.options.max_buffer_behind.clone(),
            self.options.max_buffer_ahead.clone(),
        );

        Ok(AdaptationBuffer::new(
            buffer_type,
            self.clock.clone(),
            AdaptationContent {
                manifest: Arc::clone(&self.manifest),
                period: Arc::clone(period),
                adaptation,
            },
            Arc::clone(&self.abr),
            slot,
            Arc::clone(&self.representation_factory),
            &self.options,
        )
        .run())
    }
}

enum PeriodInput {
    Choice(Option<TrackChoice>),
    SelectorGone,
    Event(Option<BufferResult<BufferEvent>>),
}

/// Buffer of one Period: waits for a track choice, then follows it.
fn period_buffer(
    shared: Arc<Shared>,
    buffer_type: BufferType,
    period: Arc<Period>,
    selector: &TrackSelector,
) -> EventStream {
    let mut choices = selector.subscribe();
    Box::pin(stream! {
        let mut pending = choices.borrow_and_update().clone();
        let mut selector_open = true;
        let mut previous: Option<Arc<Adaptation>> = None;
        let mut current: Option<EventStream> = None;

        loop {
            if let Some(choice) = pending.take() {
                current = None;
                match shared.start_choice(buffer_type, &period, choice, &mut previous) {
                    Ok(events) => current = Some(events),
                    Err(error) => {
                        yield Err(error);
                        return;
                    }
                }
            }

            let input = tokio::select! {
                changed = choices.changed(), if selector_open => match changed {
                    Ok(()) => PeriodInput::Choice(choices.borrow_and_update().clone()),
                    Err(_) => PeriodInput::SelectorGone,
                },
                event = async {
                    match current.as_mut() {
                        Some(events) => events.next().await,
                        None => None,
                    }
                }, if current.is_some() => PeriodInput::Event(event),
                else => break,
            };

            match input {
                PeriodInput::Choice(choice) => pending = choice,
                PeriodInput::SelectorGone => selector_open = false,
                PeriodInput::Event(None) => current = None,
                PeriodInput::Event(Some(Ok(event))) => yield Ok(event),
                PeriodInput::Event(Some(Err(error))) => {
                    yield Err(error);
                    return;
                }
            }
        }
    })
}

struct ManagedPeriod {
    period: Arc<Period>,
    /// Keeps the track choice channel open while the Period is managed.
    _selector: TrackSelector,
}

enum ChainInput {
    Tick(ClockTick),
    Period(String, BufferResult<BufferEvent>),
}

/// Consecutive Periods buffered for one type, oldest first.
struct Chain {
    shared: Arc<Shared>,
    buffer_type: BufferType,
    periods: Vec<ManagedPeriod>,
    buffers: StreamMap<String, EventStream>,
}

impl Chain {
    fn new(shared: Arc<Shared>, buffer_type: BufferType) -> Self {
        Self {
            shared,
            buffer_type,
            periods: Vec::new(),
            buffers: StreamMap::new(),
        }
    }

    fn position(&self, period_id: &str) -> Option<usize> {
        self.periods.iter().position(|m| m.period.id == period_id)
    }

    fn manage(&mut self, period: Arc<Period>) -> BufferEvent {
        tracing::debug!(buffer_type = %self.buffer_type, period = %period.id, "managing period");
        let selector = TrackSelector::new();
        let events = period_buffer(
            Arc::clone(&self.shared),
            self.buffer_type,
            Arc::clone(&period),
            &selector,
        );
        self.buffers.insert(period.id.clone(), events);
        self.periods.push(ManagedPeriod {
            period: Arc::clone(&period),
            _selector: selector.clone(),
        });
        BufferEvent::PeriodBufferReady {
            buffer_type: self.buffer_type,
            period,
            selector,
        }
    }

    /// Stop managing every Period from `index` on, newest first.
    fn clear_from(&mut self, index: usize) -> Vec<BufferEvent> {
        let mut out = Vec::new();
        while self.periods.len() > index {
            let Some(managed) = self.periods.pop() else {
                break;
            };
            out.push(self.clear(managed));
        }
        out
    }

    fn clear(&mut self, managed: ManagedPeriod) -> BufferEvent {
        tracing::debug!(
            buffer_type = %self.buffer_type,
            period = %managed.period.id,
            "period cleared"
        );
        self.buffers.remove(&managed.period.id);
        BufferEvent::PeriodBufferCleared {
            buffer_type: self.buffer_type,
            period: managed.period,
        }
    }

    fn on_tick(&mut self, tick: &ClockTick) -> Vec<BufferEvent> {
        let time = tick.current_time;
        let covered = match (self.periods.first(), self.periods.last()) {
            (Some(first), Some(last)) => {
                time >= first.period.start && time < last.period.end_or_infinity()
            }
            _ => false,
        };

        if !covered {
            let Some(target) = self.shared.manifest.period_for_time(time) else {
                return Vec::new();
            };
            tracing::debug!(
                buffer_type = %self.buffer_type,
                time,
                period = %target.id,
                "position outside managed periods, restarting"
            );
            let mut out = self.clear_from(0);
            out.push(self.manage(target));
            return out;
        }

        // Periods playback went past, always keeping the newest one.
        let mut out = Vec::new();
        while self.periods.len() > 1
            && self.periods[0]
                .period
                .end
                .is_some_and(|end| time >= end)
        {
            let managed = self.periods.remove(0);
            out.push(self.clear(managed));
        }
        out
    }

    fn on_period_event(&mut self, period_id: &str, event: BufferEvent) -> Vec<BufferEvent> {
        let Some(index) = self.position(period_id) else {
            return Vec::new();
        };
        let newest = index + 1 == self.periods.len();
        match event {
            BufferEvent::FullBuffer { .. } if !newest => {
                tracing::trace!(
                    buffer_type = %self.buffer_type,
                    period = period_id,
                    "older period full, ignored"
                );
                Vec::new()
            }
            BufferEvent::FullBuffer { .. } => {
                let period = Arc::clone(&self.periods[index].period);
                match self.shared.manifest.period_after(&period) {
                    Some(next) => vec![event, self.manage(next)],
                    None => vec![
                        event,
                        BufferEvent::CompleteBuffer {
                            buffer_type: self.buffer_type,
                        },
                    ],
                }
            }
            BufferEvent::ActiveBuffer { .. } => {
                let mut out = self.clear_from(index + 1);
                out.push(event);
                out
            }
            other => vec![other],
        }
    }

    fn on_period_error(
        &mut self,
        period_id: &str,
        error: BufferError,
    ) -> BufferResult<Vec<BufferEvent>> {
        if self.buffer_type.is_native() {
            return Err(error);
        }
        if self.position(period_id).is_none() {
            return Ok(Vec::new());
        }
        tracing::warn!(
            buffer_type = %self.buffer_type,
            period = period_id,
            %error,
            "buffer failed, continuing without it"
        );
        // Every Period shares the disposed source buffer; none may touch it again.
        for managed in &self.periods {
            let fake = self.shared.fake(self.buffer_type, &managed.period);
            self.buffers.insert(managed.period.id.clone(), fake);
        }
        self.shared.registry.dispose(self.buffer_type);
        Ok(vec![BufferEvent::Warning {
            buffer_type: self.buffer_type,
            error: error.to_string(),
        }])
    }

    fn run(mut self) -> EventStream {
        Box::pin(stream! {
            let initial = Arc::clone(&self.shared.initial_period);
            yield Ok(self.manage(initial));

            let cancel = self.shared.cancel.clone();
            let mut ticks = WatchStream::new(self.shared.clock.clone());
            loop {
                let input = tokio::select! {
                    () = cancel.cancelled() => break,
                    Some(tick) = ticks.next() => ChainInput::Tick(tick),
                    Some((id, item)) = self.buffers.next() => ChainInput::Period(id, item),
                    else => break,
                };

                let events = match input {
                    ChainInput::Tick(tick) => self.on_tick(&tick),
                    ChainInput::Period(id, Ok(event)) => self.on_period_event(&id, event),
                    ChainInput::Period(id, Err(error)) => match self.on_period_error(&id, error) {
                        Ok(events) => events,
                        Err(error) => {
                            yield Err(error);
                            break;
                        }
                    },
                };
                for event in events {
                    yield Ok(event);
                }
            }
            tracing::debug!(buffer_type = %self.buffer_type, "chain stopped");
        })
    }
}

/// Decides which Periods are buffered for each buffer type and drives their
/// adaptation buffers.
///
/// Every event of every type comes out of [`run`](Self::run), followed by
/// `EndOfStream`/`ResumeStream` transitions. An error on a native type ends
/// the stream; other types fall back to an empty buffer with a warning.
pub struct PeriodBufferManager {
    shared: Arc<Shared>,
}

impl PeriodBufferManager {
    pub fn new(
        content: BufferContent,
        clock: watch::Receiver<ClockTick>,
        abr: Arc<AbrManager>,
        source_buffer_factory: Arc<dyn SourceBufferFactory>,
        representation_factory: Arc<dyn RepresentationBufferFactory>,
        options: BufferOptions,
    ) -> Self {
        let cancel = CancellationToken::new();
        Self {
            shared: Arc::new(Shared {
                manifest: content.manifest,
                initial_period: content.initial_period,
                clock,
                abr,
                registry: SourceBufferRegistry::new(source_buffer_factory, cancel.child_token()),
                representation_factory,
                options,
                cancel,
            }),
        }
    }

    /// Events of every buffer type. The stream stops once the manager is
    /// disposed or dropped.
    pub fn run(&self) -> BoxStream<'static, BufferResult<BufferEvent>> {
        let shared = Arc::clone(&self.shared);
        let buffer_types = shared.options.buffer_types.clone();
        let chains: Vec<_> = buffer_types
            .iter()
            .map(|&buffer_type| Chain::new(Arc::clone(&shared), buffer_type).run())
            .collect();

        Box::pin(stream! {
            let mut merged = futures::stream::select_all(chains);
            let mut end_of_stream = EndOfStreamTracker::new(&buffer_types);
            let cancel = shared.cancel.clone();
            loop {
                let item = tokio::select! {
                    () = cancel.cancelled() => break,
                    item = merged.next() => item,
                };
                match item {
                    None => break,
                    Some(Err(error)) => {
                        tracing::error!(%error, "buffering failed");
                        yield Err(error);
                        break;
                    }
                    Some(Ok(event)) => {
                        let aggregate = end_of_stream.on_event(&event);
                        for event in std::iter::once(event).chain(aggregate) {
                            tracing::trace!(%event, "buffer event");
                            if let Some(bus) = &shared.options.event_bus {
                                bus.publish(event.clone());
                            }
                            yield Ok(event);
                        }
                    }
                }
            }
        })
    }

    /// Slot of `buffer_type`, when its source buffer exists.
    #[must_use]
    pub fn source_buffer(&self, buffer_type: BufferType) -> Option<BufferSlot> {
        self.shared.registry.get(buffer_type)
    }

    /// Stop every chain and garbage collector and release every source
    /// buffer.
    pub fn dispose(&self) {
        self.shared.cancel.cancel();
        self.shared.registry.dispose_all();
    }
}

impl Drop for PeriodBufferManager {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
