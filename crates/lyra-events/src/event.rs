use std::{fmt, sync::Arc};

use lyra_core::{Adaptation, BufferType, Period, Representation};
use tokio::sync::watch;

/// What the caller decided to play for one buffer type of a Period.
#[derive(Clone, Debug)]
pub enum TrackChoice {
    /// Nothing is buffered for this type in this Period.
    Disabled,
    Adaptation(Arc<Adaptation>),
}

impl TrackChoice {
    #[must_use]
    pub fn adaptation(&self) -> Option<&Arc<Adaptation>> {
        match self {
            Self::Disabled => None,
            Self::Adaptation(adaptation) => Some(adaptation),
        }
    }
}

/// Handle handed out with [`BufferEvent::PeriodBufferReady`].
///
/// Starts empty. The scheduler waits until a choice is made and follows every
/// later change. Clones share the same choice.
#[derive(Clone, Debug)]
pub struct TrackSelector {
    tx: Arc<watch::Sender<Option<TrackChoice>>>,
}

impl Default for TrackSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSelector {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn select(&self, adaptation: Arc<Adaptation>) {
        self.tx.send_replace(Some(TrackChoice::Adaptation(adaptation)));
    }

    pub fn disable(&self) {
        self.tx.send_replace(Some(TrackChoice::Disabled));
    }

    #[must_use]
    pub fn choice(&self) -> Option<TrackChoice> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<TrackChoice>> {
        self.tx.subscribe()
    }
}

/// Everything the buffer scheduler reports.
#[derive(Clone, Debug)]
pub enum BufferEvent {
    /// A new representation starts being downloaded.
    RepresentationChange {
        buffer_type: BufferType,
        period: Arc<Period>,
        representation: Arc<Representation>,
    },
    /// The bandwidth estimate, in bits per second, changed.
    BitrateEstimationChange {
        buffer_type: BufferType,
        bitrate: Option<f64>,
    },
    /// The buffer needs more data.
    ActiveBuffer { buffer_type: BufferType },
    /// The buffer holds everything it wants for now.
    FullBuffer { buffer_type: BufferType },
    /// A Period starts being managed; pick its track through `selector`.
    PeriodBufferReady {
        buffer_type: BufferType,
        period: Arc<Period>,
        selector: TrackSelector,
    },
    /// Management of a Period ended. Emitted once per `PeriodBufferReady`.
    PeriodBufferCleared {
        buffer_type: BufferType,
        period: Arc<Period>,
    },
    /// The last Period of this buffer type is fully buffered.
    CompleteBuffer { buffer_type: BufferType },
    /// Every buffer type is complete.
    EndOfStream,
    /// A buffer type left the complete state after `EndOfStream`.
    ResumeStream,
    /// A recovered failure.
    Warning {
        buffer_type: BufferType,
        error: String,
    },
}

impl BufferEvent {
    /// Buffer type the event relates to; `None` for stream-wide events.
    #[must_use]
    pub fn buffer_type(&self) -> Option<BufferType> {
        match self {
            Self::RepresentationChange { buffer_type, .. }
            | Self::BitrateEstimationChange { buffer_type, .. }
            | Self::ActiveBuffer { buffer_type }
            | Self::FullBuffer { buffer_type }
            | Self::PeriodBufferReady { buffer_type, .. }
            | Self::PeriodBufferCleared { buffer_type, .. }
            | Self::CompleteBuffer { buffer_type }
            | Self::Warning { buffer_type, .. } => Some(*buffer_type),
            Self::EndOfStream | Self::ResumeStream => None,
        }
    }

    /// Period the event relates to, when it carries one.
    #[must_use]
    pub fn period(&self) -> Option<&Arc<Period>> {
        match self {
            Self::RepresentationChange { period, .. }
            | Self::PeriodBufferReady { period, .. }
            | Self::PeriodBufferCleared { period, .. } => Some(period),
            _ => None,
        }
    }
}

impl fmt::Display for BufferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepresentationChange {
                buffer_type,
                period,
                representation,
            } => write!(
                f,
                "{buffer_type}: representation {} ({} bps) in period {}",
                representation.id, representation.bitrate, period.id
            ),
            Self::BitrateEstimationChange {
                buffer_type,
                bitrate: Some(bitrate),
            } => write!(f, "{buffer_type}: estimate {bitrate:.0} bps"),
            Self::BitrateEstimationChange { buffer_type, .. } => {
                write!(f, "{buffer_type}: no estimate")
            }
            Self::ActiveBuffer { buffer_type } => write!(f, "{buffer_type}: active"),
            Self::FullBuffer { buffer_type } => write!(f, "{buffer_type}: full"),
            Self::PeriodBufferReady {
                buffer_type,
                period,
                ..
            } => write!(f, "{buffer_type}: period {} ready", period.id),
            Self::PeriodBufferCleared {
                buffer_type,
                period,
            } => write!(f, "{buffer_type}: period {} cleared", period.id),
            Self::CompleteBuffer { buffer_type } => write!(f, "{buffer_type}: complete"),
            Self::EndOfStream => f.write_str("end of stream"),
            Self::ResumeStream => f.write_str("resume stream"),
            Self::Warning { buffer_type, error } => write!(f, "{buffer_type}: warning: {error}"),
        }
    }
}
