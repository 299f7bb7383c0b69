use std::{fmt, sync::Arc, time::Duration};

use derivative::Derivative;
use lyra_core::{BufferType, PerType, Representation};
use tokio::time::Instant;

/// ABR configuration.
///
/// Per-type values are the settings a chooser starts with; the
/// [`AbrManager`](crate::AbrManager) also keeps them as pending values until
/// the chooser of that type is created.
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct AbrOptions {
    /// Bitrate assumed before any bandwidth sample is available.
    pub initial_bitrates: PerType<u64>,
    /// Forced ceiling, disabling automatic adaptation.
    pub manual_bitrates: PerType<Option<u64>>,
    /// Ceiling applied to automatic choices.
    pub max_auto_bitrates: PerType<Option<u64>>,
    /// Device-imposed bitrate limit.
    pub throttle_bitrates: PerType<Option<u64>>,
    /// Width of the rendering surface, in pixels.
    pub width_limits: PerType<Option<u32>>,
    /// Buffer gap under which the chooser enters starvation mode.
    #[derivative(Default(value = "5.0"))]
    pub starvation_gap: f64,
    /// Buffer gap above which the chooser leaves starvation mode.
    #[derivative(Default(value = "7.0"))]
    pub out_of_starvation_gap: f64,
    /// Distance to the content end under which starvation is not entered.
    #[derivative(Default(value = "0.1"))]
    pub starvation_duration_delta: f64,
    /// Share of the estimated bandwidth used in regular mode.
    #[derivative(Default(value = "0.8"))]
    pub regular_factor: f64,
    /// Share of the estimated bandwidth used in starvation mode.
    #[derivative(Default(value = "0.72"))]
    pub starvation_factor: f64,
    #[derivative(Default(value = "2.0"))]
    pub fast_half_life_secs: f64,
    #[derivative(Default(value = "10.0"))]
    pub slow_half_life_secs: f64,
    /// Samples smaller than this are ignored by the estimator.
    #[derivative(Default(value = "16_000"))]
    pub min_chunk_bytes: u64,
    /// No estimate is produced before this many bytes were sampled.
    #[derivative(Default(value = "150_000"))]
    pub min_total_bytes: u64,
}

impl AbrOptions {
    #[must_use]
    pub fn with_initial_bitrate(mut self, buffer_type: BufferType, bitrate: u64) -> Self {
        self.initial_bitrates[buffer_type] = bitrate;
        self
    }

    #[must_use]
    pub fn with_manual_bitrate(mut self, buffer_type: BufferType, bitrate: Option<u64>) -> Self {
        self.manual_bitrates[buffer_type] = bitrate;
        self
    }

    #[must_use]
    pub fn with_max_auto_bitrate(mut self, buffer_type: BufferType, bitrate: Option<u64>) -> Self {
        self.max_auto_bitrates[buffer_type] = bitrate;
        self
    }

    /// Settings a chooser of `buffer_type` starts with.
    #[must_use]
    pub fn settings(&self, buffer_type: BufferType) -> ChooserSettings {
        ChooserSettings {
            manual_bitrate: self.manual_bitrates[buffer_type],
            max_auto_bitrate: self.max_auto_bitrates[buffer_type],
            throttle_bitrate: self.throttle_bitrates[buffer_type],
            width_limit: self.width_limits[buffer_type],
        }
    }
}

/// Mutable knobs of a chooser, published to its live estimate streams.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChooserSettings {
    pub manual_bitrate: Option<u64>,
    pub max_auto_bitrate: Option<u64>,
    pub throttle_bitrate: Option<u64>,
    pub width_limit: Option<u32>,
}

/// Identifier of an in-flight segment request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What is known about a request when it starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RequestBegin {
    /// Media time of the requested segment, in seconds.
    pub time: f64,
    /// Media duration of the requested segment, in seconds.
    pub duration: f64,
    pub requested_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSample {
    /// Bytes received so far.
    pub size: u64,
    /// Expected body size, when announced by the server.
    pub total_size: Option<u64>,
    pub timestamp: Instant,
}

/// Book-keeping for one pending request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestInfo {
    pub time: f64,
    pub duration: f64,
    pub requested_at: Instant,
    /// Append-only, time-ordered.
    pub progress: Vec<ProgressSample>,
}

impl RequestInfo {
    #[must_use]
    pub fn new(begin: RequestBegin) -> Self {
        Self {
            time: begin.time,
            duration: begin.duration,
            requested_at: begin.requested_at,
            progress: Vec::new(),
        }
    }

    /// Whether the segment covers `position`.
    #[must_use]
    pub fn covers(&self, position: f64) -> bool {
        self.time <= position && position < self.time + self.duration
    }
}

/// Completed download measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metric {
    pub buffer_type: BufferType,
    pub duration: Duration,
    pub size: u64,
}

/// Lifecycle of a segment request, as reported by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RequestEvent {
    Begin {
        buffer_type: BufferType,
        id: RequestId,
        begin: RequestBegin,
    },
    Progress {
        buffer_type: BufferType,
        id: RequestId,
        progress: ProgressSample,
    },
    End {
        buffer_type: BufferType,
        id: RequestId,
    },
}

impl RequestEvent {
    #[must_use]
    pub fn buffer_type(&self) -> BufferType {
        match self {
            Self::Begin { buffer_type, .. }
            | Self::Progress { buffer_type, .. }
            | Self::End { buffer_type, .. } => *buffer_type,
        }
    }
}

/// One decision of a chooser.
#[derive(Clone, Debug)]
pub struct AbrEstimate {
    /// Bandwidth estimate the decision was based on, in bits per second.
    pub bitrate: Option<f64>,
    pub representation: Arc<Representation>,
    /// Whether the choice comes from a forced bitrate.
    pub manual: bool,
    /// Whether in-flight downloads should be abandoned for this choice.
    pub urgent: bool,
}
