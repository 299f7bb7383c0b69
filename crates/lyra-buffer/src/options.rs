use std::time::Duration;

use derivative::Derivative;
use lyra_core::BufferType;
use lyra_events::EventBus;
use lyra_net::RetryPolicy;
use tokio::sync::watch;

/// A size that never changes.
#[must_use]
pub fn fixed(value: f64) -> watch::Receiver<f64> {
    watch::channel(value).1
}

/// Configuration of a [`PeriodBufferManager`](crate::PeriodBufferManager).
///
/// Buffer sizes are in seconds and can be changed while running through the
/// sender side of their channel.
#[derive(Clone, Derivative)]
#[derivative(Debug, Default)]
pub struct BufferOptions {
    /// One chain is run per listed type.
    #[derivative(Default(value = "vec![BufferType::Audio, BufferType::Video]"))]
    pub buffer_types: Vec<BufferType>,
    /// How far ahead of the playback position buffers try to fill.
    #[derivative(Default(value = "fixed(30.0)"))]
    pub wanted_buffer_ahead: watch::Receiver<f64>,
    /// Data further ahead than this is garbage collected.
    #[derivative(Default(value = "fixed(f64::INFINITY)"))]
    pub max_buffer_ahead: watch::Receiver<f64>,
    /// Data further behind than this is garbage collected.
    #[derivative(Default(value = "fixed(f64::INFINITY)"))]
    pub max_buffer_behind: watch::Receiver<f64>,
    /// Retries of a failed segment request.
    #[derivative(Default(value = "4"))]
    pub segment_retry: u32,
    /// Retries of a segment request failing because the device is offline.
    #[derivative(Default(value = "u32::MAX"))]
    pub offline_retry: u32,
    /// Wait before retrying after a `412` on live content.
    #[derivative(Default(value = "Duration::from_secs(2)"))]
    pub precondition_retry_delay: Duration,
    #[derivative(Debug = "ignore")]
    pub event_bus: Option<EventBus>,
}

impl BufferOptions {
    #[must_use]
    pub fn with_buffer_types(mut self, buffer_types: impl IntoIterator<Item = BufferType>) -> Self {
        self.buffer_types = buffer_types.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_wanted_buffer_ahead(mut self, value: watch::Receiver<f64>) -> Self {
        self.wanted_buffer_ahead = value;
        self
    }

    #[must_use]
    pub fn with_max_buffer_ahead(mut self, value: watch::Receiver<f64>) -> Self {
        self.max_buffer_ahead = value;
        self
    }

    #[must_use]
    pub fn with_max_buffer_behind(mut self, value: watch::Receiver<f64>) -> Self {
        self.max_buffer_behind = value;
        self
    }

    #[must_use]
    pub fn with_segment_retry(mut self, segment_retry: u32, offline_retry: u32) -> Self {
        self.segment_retry = segment_retry;
        self.offline_retry = offline_retry;
        self
    }

    #[must_use]
    pub fn with_precondition_retry_delay(mut self, delay: Duration) -> Self {
        self.precondition_retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Retry policy handed to representation buffers for their segment
    /// requests.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.segment_retry,
            ..RetryPolicy::default()
        }
        .with_max_retries_offline(self.offline_retry)
    }
}
