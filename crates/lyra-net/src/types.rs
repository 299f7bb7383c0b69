use std::{cmp::min, fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use derivative::Derivative;
use lyra_abr::{AbrManager, Metric, ProgressSample, RequestBegin, RequestEvent, RequestId};
use lyra_core::BufferType;
use url::Url;

use crate::{NetError, cache::SegmentCache};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangeSpec {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeSpec {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    pub fn to_header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{end}", self.start),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// A media segment to fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentRequest {
    pub url: Url,
    pub range: Option<RangeSpec>,
    /// Media time of the segment, in seconds.
    pub time: f64,
    /// Media duration of the segment, in seconds.
    pub duration: f64,
}

impl SegmentRequest {
    pub fn new(url: Url, time: f64, duration: f64) -> Self {
        Self {
            url,
            range: None,
            time,
            duration,
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: RangeSpec) -> Self {
        self.range = Some(range);
        self
    }

    /// Identity of the fetched bytes, for caching.
    pub fn cache_key(&self) -> String {
        match &self.range {
            Some(range) => format!("{}#{}", self.url, range.to_header_value()),
            None => self.url.to_string(),
        }
    }
}

/// Bounded exponential backoff, with a separate budget for offline errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub max_retries_offline: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            max_retries_offline: u32::MAX,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_retries_offline(mut self, max_retries_offline: u32) -> Self {
        self.max_retries_offline = max_retries_offline;
        self
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

#[derive(Clone, Derivative)]
#[derivative(Debug, Default)]
pub struct PipelineOptions {
    pub retry: RetryPolicy,
    /// Applied to each attempt as a whole, body included.
    #[derivative(Default(value = "Duration::from_secs(30)"))]
    pub timeout: Duration,
    #[derivative(Debug = "ignore")]
    pub cache: Option<Arc<dyn SegmentCache>>,
}

impl PipelineOptions {
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn SegmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Events of one segment fetch.
///
/// Each attempt emits `RequestBegin`, any number of `Progress` and exactly
/// one `RequestEnd`. A successful fetch ends with `Metrics` then `Data`; a
/// cached one emits a single `Cache`.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    Data(Bytes),
    Cache(Bytes),
    /// A failed attempt that is going to be retried.
    Warning(NetError),
    Metrics {
        size: u64,
        duration: Duration,
    },
    RequestBegin {
        id: RequestId,
        begin: RequestBegin,
    },
    Progress {
        id: RequestId,
        progress: ProgressSample,
    },
    RequestEnd {
        id: RequestId,
    },
}

impl PipelineEvent {
    /// The bandwidth sample carried by this event.
    pub fn metric(&self, buffer_type: BufferType) -> Option<Metric> {
        match self {
            Self::Metrics { size, duration } => Some(Metric {
                buffer_type,
                duration: *duration,
                size: *size,
            }),
            _ => None,
        }
    }

    /// The request lifecycle step carried by this event.
    pub fn request_event(&self, buffer_type: BufferType) -> Option<RequestEvent> {
        match *self {
            Self::RequestBegin { id, begin } => Some(RequestEvent::Begin {
                buffer_type,
                id,
                begin,
            }),
            Self::Progress { id, progress } => Some(RequestEvent::Progress {
                buffer_type,
                id,
                progress,
            }),
            Self::RequestEnd { id } => Some(RequestEvent::End { buffer_type, id }),
            _ => None,
        }
    }

    /// Report this event to `abr`, if it is something the choosers track.
    pub fn forward_to(&self, abr: &AbrManager, buffer_type: BufferType) {
        if let Some(metric) = self.metric(buffer_type) {
            abr.record_metric(metric);
        } else if let Some(event) = self.request_event(buffer_type) {
            abr.record_request(event);
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(data) => write!(f, "data ({} bytes)", data.len()),
            Self::Cache(data) => write!(f, "cache ({} bytes)", data.len()),
            Self::Warning(error) => write!(f, "warning: {error}"),
            Self::Metrics { size, duration } => write!(f, "metrics ({size} bytes in {duration:?})"),
            Self::RequestBegin { id, .. } => write!(f, "request {id} begin"),
            Self::Progress { id, progress } => write!(f, "request {id} at {} bytes", progress.size),
            Self::RequestEnd { id } => write!(f, "request {id} end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, Duration::ZERO)]
    #[case(1, Duration::from_millis(200))]
    #[case(2, Duration::from_millis(400))]
    #[case(4, Duration::from_millis(1_600))]
    #[case(5, Duration::from_secs(3))]
    #[case(60, Duration::from_secs(3))]
    fn delay_is_bounded_exponential(#[case] attempt: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().delay_for_attempt(attempt), expected);
    }

    #[rstest]
    #[case(None, "http://cdn/seg-1.m4s")]
    #[case(Some(RangeSpec::new(0, Some(99))), "http://cdn/seg-1.m4s#bytes=0-99")]
    #[case(Some(RangeSpec::new(100, None)), "http://cdn/seg-1.m4s#bytes=100-")]
    fn cache_key_includes_range(#[case] range: Option<RangeSpec>, #[case] expected: &str) {
        let mut request = SegmentRequest::new(Url::parse("http://cdn/seg-1.m4s").unwrap(), 0.0, 2.0);
        request.range = range;
        assert_eq!(request.cache_key(), expected);
    }

    #[test]
    fn only_abr_relevant_events_are_mapped() {
        let id = RequestId(3);
        assert!(PipelineEvent::Data(Bytes::new()).request_event(BufferType::Audio).is_none());
        assert!(PipelineEvent::RequestEnd { id }.metric(BufferType::Audio).is_none());
        assert_eq!(
            PipelineEvent::RequestEnd { id }.request_event(BufferType::Audio),
            Some(RequestEvent::End {
                buffer_type: BufferType::Audio,
                id
            })
        );
        let metric = PipelineEvent::Metrics {
            size: 10,
            duration: Duration::from_millis(5),
        }
        .metric(BufferType::Video)
        .unwrap();
        assert_eq!(metric.size, 10);
        assert_eq!(metric.buffer_type, BufferType::Video);
    }
}
