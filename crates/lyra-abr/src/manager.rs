use std::sync::Arc;

use futures::stream::BoxStream;
use lyra_core::{BufferType, ClockTick, PerType, Representation};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    AbrEstimate, AbrOptions, AbrResult, ChooserSettings, Metric, RepresentationChooser,
    RequestEvent, RequestId, SharedChooser, estimate_stream,
};

/// One [`RepresentationChooser`] per buffer type, created on first use.
///
/// Settings written before a chooser exists are kept as pending options and
/// applied when it is created.
pub struct AbrManager {
    options: Mutex<AbrOptions>,
    choosers: Mutex<PerType<Option<SharedChooser>>>,
    cancel: CancellationToken,
}

impl AbrManager {
    #[must_use]
    pub fn new(options: AbrOptions) -> Self {
        Self {
            options: Mutex::new(options),
            choosers: Mutex::new(PerType::default()),
            cancel: CancellationToken::new(),
        }
    }

    fn chooser(&self, buffer_type: BufferType) -> SharedChooser {
        let mut choosers = self.choosers.lock();
        choosers[buffer_type]
            .get_or_insert_with(|| {
                tracing::debug!(%buffer_type, "creating representation chooser");
                RepresentationChooser::new(&self.options.lock(), buffer_type).into_shared()
            })
            .clone()
    }

    fn existing(&self, buffer_type: BufferType) -> Option<SharedChooser> {
        self.choosers.lock()[buffer_type].clone()
    }

    /// Decisions for `representations`, driven by `clock`.
    pub fn estimates(
        &self,
        buffer_type: BufferType,
        clock: BoxStream<'static, ClockTick>,
        representations: Vec<Arc<Representation>>,
    ) -> BoxStream<'static, AbrEstimate> {
        estimate_stream(self.chooser(buffer_type), clock, representations)
    }

    pub fn record_metric(&self, metric: Metric) {
        tracing::trace!(
            buffer_type = %metric.buffer_type,
            size = metric.size,
            duration_secs = metric.duration.as_secs_f64(),
            "bandwidth sample"
        );
        self.chooser(metric.buffer_type)
            .lock()
            .add_estimate(metric.duration, metric.size);
    }

    /// Forward a request lifecycle event. Inconsistent sequences are logged
    /// and otherwise ignored.
    pub fn record_request(&self, event: RequestEvent) {
        let chooser = self.chooser(event.buffer_type());
        let mut chooser = chooser.lock();
        let result: AbrResult<()> = match event {
            RequestEvent::Begin { id, begin, .. } => chooser.add_pending_request(id, begin),
            RequestEvent::Progress { id, progress, .. } => {
                chooser.add_request_progress(id, progress)
            }
            RequestEvent::End { id, .. } => chooser.remove_pending_request(id),
        };
        if let Err(error) = result {
            tracing::warn!(buffer_type = %event.buffer_type(), %error, "inconsistent request event");
        }
    }

    /// Spawn a task feeding both channels into the choosers until
    /// [`dispose`](Self::dispose) or until both senders are gone.
    pub fn route(
        self: &Arc<Self>,
        mut metrics: mpsc::Receiver<Metric>,
        mut requests: mpsc::Receiver<RequestEvent>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            let (mut metrics_open, mut requests_open) = (true, true);
            while metrics_open || requests_open {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    metric = metrics.recv(), if metrics_open => match metric {
                        Some(metric) => manager.record_metric(metric),
                        None => metrics_open = false,
                    },
                    event = requests.recv(), if requests_open => match event {
                        Some(event) => manager.record_request(event),
                        None => requests_open = false,
                    },
                }
            }
            tracing::debug!("abr router stopped");
        })
    }

    /// Apply a setting to the live chooser, or keep it for the one to come.
    ///
    /// The chooser table stays locked throughout so that a chooser created
    /// concurrently cannot miss the write.
    fn write_setting(
        &self,
        buffer_type: BufferType,
        live: impl FnOnce(&RepresentationChooser),
        pending: impl FnOnce(&mut AbrOptions),
    ) {
        let choosers = self.choosers.lock();
        match &choosers[buffer_type] {
            Some(chooser) => live(&chooser.lock()),
            None => pending(&mut self.options.lock()),
        }
    }

    fn read_setting<T>(
        &self,
        buffer_type: BufferType,
        live: impl FnOnce(&ChooserSettings) -> T,
        pending: impl FnOnce(&AbrOptions) -> T,
    ) -> T {
        let choosers = self.choosers.lock();
        match &choosers[buffer_type] {
            Some(chooser) => live(&chooser.lock().settings()),
            None => pending(&self.options.lock()),
        }
    }

    pub fn set_manual_bitrate(&self, buffer_type: BufferType, bitrate: Option<u64>) {
        self.write_setting(
            buffer_type,
            |c| c.set_manual_bitrate(bitrate),
            |o| o.manual_bitrates[buffer_type] = bitrate,
        );
    }

    #[must_use]
    pub fn manual_bitrate(&self, buffer_type: BufferType) -> Option<u64> {
        self.read_setting(buffer_type, |s| s.manual_bitrate, |o| o.manual_bitrates[buffer_type])
    }

    pub fn set_max_auto_bitrate(&self, buffer_type: BufferType, bitrate: Option<u64>) {
        self.write_setting(
            buffer_type,
            |c| c.set_max_auto_bitrate(bitrate),
            |o| o.max_auto_bitrates[buffer_type] = bitrate,
        );
    }

    #[must_use]
    pub fn max_auto_bitrate(&self, buffer_type: BufferType) -> Option<u64> {
        self.read_setting(
            buffer_type,
            |s| s.max_auto_bitrate,
            |o| o.max_auto_bitrates[buffer_type],
        )
    }

    pub fn set_throttle_bitrate(&self, buffer_type: BufferType, bitrate: Option<u64>) {
        self.write_setting(
            buffer_type,
            |c| c.set_throttle_bitrate(bitrate),
            |o| o.throttle_bitrates[buffer_type] = bitrate,
        );
    }

    pub fn set_width_limit(&self, buffer_type: BufferType, width: Option<u32>) {
        self.write_setting(
            buffer_type,
            |c| c.set_width_limit(width),
            |o| o.width_limits[buffer_type] = width,
        );
    }

    /// Whether request `id` of `buffer_type` is still tracked as in flight.
    #[must_use]
    pub fn has_pending_request(&self, buffer_type: BufferType, id: RequestId) -> bool {
        self.existing(buffer_type)
            .is_some_and(|chooser| chooser.lock().pending_request(id).is_some())
    }

    /// Stop the router, dispose every chooser and forget pending options.
    pub fn dispose(&self) {
        self.cancel.cancel();
        let mut choosers = self.choosers.lock();
        for (_, slot) in choosers.iter_mut() {
            if let Some(chooser) = slot.take() {
                chooser.lock().dispose();
            }
        }
        let mut options = self.options.lock();
        options.manual_bitrates = PerType::default();
        options.max_auto_bitrates = PerType::default();
        options.throttle_bitrates = PerType::default();
        options.width_limits = PerType::default();
    }
}
