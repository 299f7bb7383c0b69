use std::{collections::HashMap, sync::Arc, time::Duration};

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use lyra_core::{BufferType, ClockTick, Representation};
use parking_lot::Mutex;
use tokio::{sync::watch, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    AbrError, AbrEstimate, AbrOptions, AbrResult, BandwidthEstimator, ChooserSettings, Estimator,
    Ewma, ProgressSample, RequestBegin, RequestId, RequestInfo,
    filters::{bps, filter_by_bitrate, filter_by_width, from_bitrate_ceil},
};

/// Margin applied to the projected remaining time of a request.
const REMAINING_TIME_MARGIN: f64 = 1.2;
/// Share of the current bitrate used when a request takes far too long.
const LATE_REQUEST_FACTOR: f64 = 0.7;
/// How early a request must finish, before the buffer runs dry, for a
/// down-switch to wait for it.
const DOWN_SWITCH_SAFETY_SECS: f64 = 1.5;

/// Picks a representation of one buffer type.
///
/// Every estimate stream of that type shares one chooser, so starvation
/// state and the last bandwidth estimate outlive a single stream.
pub struct RepresentationChooser<E: Estimator = BandwidthEstimator> {
    buffer_type: BufferType,
    estimator: E,
    pending: HashMap<RequestId, RequestInfo>,
    settings: watch::Sender<ChooserSettings>,
    initial_bitrate: u64,
    options: AbrOptions,
    cancel: CancellationToken,
    in_starvation: bool,
    last_estimated_bitrate: Option<f64>,
}

pub type SharedChooser<E = BandwidthEstimator> = Arc<Mutex<RepresentationChooser<E>>>;

impl RepresentationChooser<BandwidthEstimator> {
    #[must_use]
    pub fn new(options: &AbrOptions, buffer_type: BufferType) -> Self {
        Self::with_estimator(options, buffer_type, BandwidthEstimator::new(options))
    }
}

impl<E: Estimator> RepresentationChooser<E> {
    pub fn with_estimator(options: &AbrOptions, buffer_type: BufferType, estimator: E) -> Self {
        let (settings, _) = watch::channel(options.settings(buffer_type));
        Self {
            buffer_type,
            estimator,
            pending: HashMap::new(),
            settings,
            initial_bitrate: options.initial_bitrates[buffer_type],
            options: options.clone(),
            cancel: CancellationToken::new(),
            in_starvation: false,
            last_estimated_bitrate: None,
        }
    }

    #[must_use]
    pub fn into_shared(self) -> SharedChooser<E> {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn settings(&self) -> ChooserSettings {
        self.settings.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChooserSettings> {
        self.settings.subscribe()
    }

    /// Apply `update` to the settings. Live streams re-emit only when
    /// something actually changed.
    pub fn update_settings(&self, update: impl FnOnce(&mut ChooserSettings)) {
        self.settings.send_if_modified(|settings| {
            let before = settings.clone();
            update(settings);
            *settings != before
        });
    }

    pub fn set_manual_bitrate(&self, bitrate: Option<u64>) {
        self.update_settings(|s| s.manual_bitrate = bitrate);
    }

    pub fn set_max_auto_bitrate(&self, bitrate: Option<u64>) {
        self.update_settings(|s| s.max_auto_bitrate = bitrate);
    }

    pub fn set_throttle_bitrate(&self, bitrate: Option<u64>) {
        self.update_settings(|s| s.throttle_bitrate = bitrate);
    }

    pub fn set_width_limit(&self, width: Option<u32>) {
        self.update_settings(|s| s.width_limit = width);
    }

    /// Feed a completed download to the bandwidth estimator.
    pub fn add_estimate(&mut self, duration: Duration, size: u64) {
        self.estimator.add_sample(duration, size);
    }

    /// Start tracking a request. An already tracked id is left untouched.
    pub fn add_pending_request(&mut self, id: RequestId, begin: RequestBegin) -> AbrResult<()> {
        if self.pending.contains_key(&id) {
            return Err(AbrError::DuplicateRequest(id));
        }
        self.pending.insert(id, RequestInfo::new(begin));
        Ok(())
    }

    pub fn add_request_progress(&mut self, id: RequestId, progress: ProgressSample) -> AbrResult<()> {
        let request = self
            .pending
            .get_mut(&id)
            .ok_or(AbrError::UnknownRequest(id))?;
        request.progress.push(progress);
        Ok(())
    }

    pub fn remove_pending_request(&mut self, id: RequestId) -> AbrResult<()> {
        self.pending
            .remove(&id)
            .map(|_| ())
            .ok_or(AbrError::UnknownRequest(id))
    }

    #[must_use]
    pub fn pending_request(&self, id: RequestId) -> Option<&RequestInfo> {
        self.pending.get(&id)
    }

    /// Drop every pending request and sample, and end live estimate streams.
    pub fn dispose(&mut self) {
        self.pending.clear();
        self.estimator.reset();
        self.in_starvation = false;
        self.last_estimated_bitrate = None;
        self.cancel.cancel();
    }

    #[must_use]
    pub fn in_starvation(&self) -> bool {
        self.in_starvation
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// One decision for `tick`. `representations` must be sorted by bitrate
    /// and must not be empty.
    pub fn choose(
        &mut self,
        tick: &ClockTick,
        representations: &[Arc<Representation>],
        now: Instant,
    ) -> Option<AbrEstimate> {
        let lowest = representations.first()?.clone();
        let settings = self.settings();

        if let Some(manual) = settings.manual_bitrate {
            let representation = from_bitrate_ceil(representations, bps(manual)).unwrap_or(lowest);
            return Some(AbrEstimate {
                bitrate: None,
                representation,
                manual: true,
                urgent: true,
            });
        }

        self.update_starvation(tick);

        let max_auto = settings.max_auto_bitrate.map_or(f64::INFINITY, bps);
        let mut bandwidth = None;
        let mut ceiling = None;

        if self.in_starvation
            && let Some(emergency) = self.emergency_estimate(tick, now)
        {
            tracing::debug!(
                buffer_type = %self.buffer_type,
                emergency,
                "starvation: trusting in-flight request estimate"
            );
            self.estimator.reset();
            let capped = tick
                .download_bitrate
                .map_or(emergency, |current| emergency.min(bps(current)));
            bandwidth = Some(emergency);
            ceiling = Some(capped.min(max_auto));
        }

        let mut ceiling = ceiling.unwrap_or_else(|| {
            let factor = if self.in_starvation {
                self.options.starvation_factor
            } else {
                self.options.regular_factor
            };
            let estimate = self.estimator.estimate();
            bandwidth = estimate;
            let base = estimate
                .or(self.last_estimated_bitrate)
                .map_or(bps(self.initial_bitrate), |b| b * factor);
            base.min(max_auto)
        });

        if tick.speed > 1.0 {
            ceiling /= tick.speed;
        }
        if bandwidth.is_some() {
            self.last_estimated_bitrate = bandwidth;
        }

        let mut filtered = representations.to_vec();
        if let Some(throttle) = settings.throttle_bitrate {
            filtered = filter_by_bitrate(&filtered, bps(throttle));
        }
        if let Some(width) = settings.width_limit {
            filtered = filter_by_width(&filtered, width);
        }
        let representation = from_bitrate_ceil(&filtered, ceiling).unwrap_or(lowest);

        let urgent = self.is_urgent(tick, &representation, now);

        tracing::trace!(
            buffer_type = %self.buffer_type,
            ceiling,
            chosen = representation.bitrate,
            urgent,
            starvation = self.in_starvation,
            "representation chosen"
        );

        Some(AbrEstimate {
            bitrate: bandwidth,
            representation,
            manual: false,
            urgent,
        })
    }

    fn update_starvation(&mut self, tick: &ClockTick) {
        let end = tick.content_end() - self.options.starvation_duration_delta;
        let next = tick.next_needed_position();
        if !self.in_starvation && tick.buffer_gap <= self.options.starvation_gap && next < end {
            tracing::debug!(buffer_type = %self.buffer_type, gap = tick.buffer_gap, "entering starvation mode");
            self.in_starvation = true;
        } else if self.in_starvation
            && (tick.buffer_gap >= self.options.out_of_starvation_gap || next >= end)
        {
            tracing::debug!(buffer_type = %self.buffer_type, gap = tick.buffer_gap, "leaving starvation mode");
            self.in_starvation = false;
        }
    }

    /// Bandwidth estimate taken from the request blocking playback, if it
    /// can be trusted more than the rolling estimate.
    fn emergency_estimate(
        &self,
        tick: &ClockTick,
        now: Instant,
    ) -> Option<f64> {
        let next = tick.next_needed_position();
        let request = self
            .pending
            .values()
            .filter(|r| r.covers(next))
            .min_by(|a, b| a.time.total_cmp(&b.time))?;

        if let Some((bandwidth, remaining)) = request_projection(request, now)
            && remaining > tick.buffer_gap / tick.speed
        {
            return Some(bandwidth);
        }

        let elapsed = now.saturating_duration_since(request.requested_at).as_secs_f64();
        if elapsed <= request.duration * 1.5 + 1.0 {
            return None;
        }
        let reduced = bps(tick.download_bitrate?) * LATE_REQUEST_FACTOR;
        self.last_estimated_bitrate
            .is_none_or(|last| reduced < last)
            .then_some(reduced)
    }

    fn is_urgent(
        &self,
        tick: &ClockTick,
        chosen: &Representation,
        now: Instant,
    ) -> bool {
        let Some(current) = tick.download_bitrate else {
            return true;
        };
        if chosen.bitrate == current {
            return false;
        }
        if chosen.bitrate > current {
            return !self.in_starvation;
        }
        !self.next_request_finishes_in_time(tick, now)
    }

    /// Whether the request for the next needed segment will land well before
    /// the buffer runs out, making an immediate down-switch unnecessary.
    fn next_request_finishes_in_time(&self, tick: &ClockTick, now: Instant) -> bool {
        let next = tick.next_needed_position();
        let Some(request) = self
            .pending
            .values()
            .filter(|r| r.time + r.duration > next)
            .min_by(|a, b| a.time.total_cmp(&b.time))
        else {
            return false;
        };
        request_projection(request, now)
            .is_some_and(|(_, remaining)| remaining - tick.buffer_gap / tick.speed < -DOWN_SWITCH_SAFETY_SECS)
    }
}

/// Request-local bandwidth and trusted remaining time, in seconds.
///
/// `None` when the progress reports do not allow a projection or when the
/// last one is too old to be believed.
fn request_projection(request: &RequestInfo, now: Instant) -> Option<(f64, f64)> {
    let bandwidth = request_bandwidth(&request.progress)?;
    let last = request.progress.last()?;
    let total = last.total_size?;
    #[expect(clippy::cast_precision_loss)] // byte counts stay far below 2^53
    let remaining_bits = total.saturating_sub(last.size) as f64 * 8.0;
    let remaining = (remaining_bits / bandwidth).max(0.0) * REMAINING_TIME_MARGIN;
    let since_last = now.saturating_duration_since(last.timestamp).as_secs_f64();
    (since_last <= remaining).then_some((bandwidth, remaining))
}

/// Bandwidth observed between consecutive progress reports.
fn request_bandwidth(progress: &[ProgressSample]) -> Option<f64> {
    let mut ewma = Ewma::new(2.0);
    let mut sampled = false;
    for pair in progress.windows(2) {
        let elapsed = pair[1]
            .timestamp
            .saturating_duration_since(pair[0].timestamp)
            .as_secs_f64();
        if elapsed <= 0.0 {
            continue;
        }
        #[expect(clippy::cast_precision_loss)] // byte counts stay far below 2^53
        let bits = pair[1].size.saturating_sub(pair[0].size) as f64 * 8.0;
        ewma.add_sample(elapsed, bits / elapsed);
        sampled = true;
    }
    let estimate = ewma.estimate();
    (sampled && estimate > 0.0).then_some(estimate)
}

enum Input {
    Tick(ClockTick),
    SettingsChanged,
    SettingsClosed,
    Done,
}

/// Stream of decisions for `representations`, one per clock tick and one
/// more each time the chooser settings change.
///
/// A single representation is emitted once and the stream ends.
pub fn estimate_stream<E: Estimator>(
    chooser: SharedChooser<E>,
    mut clock: BoxStream<'static, ClockTick>,
    representations: Vec<Arc<Representation>>,
) -> BoxStream<'static, AbrEstimate> {
    let (mut settings, cancel) = {
        let guard = chooser.lock();
        (guard.subscribe(), guard.cancel.clone())
    };

    Box::pin(stream! {
        let Some(first) = representations.first().cloned() else {
            return;
        };
        if representations.len() == 1 {
            yield AbrEstimate {
                bitrate: None,
                representation: first,
                manual: false,
                urgent: true,
            };
            return;
        }

        let mut last_tick: Option<ClockTick> = None;
        let mut settings_open = true;

        loop {
            let input = tokio::select! {
                () = cancel.cancelled() => Input::Done,
                tick = clock.next() => tick.map_or(Input::Done, Input::Tick),
                changed = settings.changed(), if settings_open => match changed {
                    Ok(()) => Input::SettingsChanged,
                    Err(_) => Input::SettingsClosed,
                },
            };

            let tick = match input {
                Input::Tick(tick) => tick,
                Input::SettingsChanged => match last_tick.clone() {
                    Some(tick) => tick,
                    None => continue,
                },
                Input::SettingsClosed => {
                    settings_open = false;
                    continue;
                }
                Input::Done => break,
            };

            let estimate = chooser.lock().choose(&tick, &representations, Instant::now());
            last_tick = Some(tick);
            if let Some(estimate) = estimate {
                yield estimate;
            }
        }
    })
}
