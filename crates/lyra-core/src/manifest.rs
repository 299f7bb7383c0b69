use std::{
    fmt,
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use portable_atomic::AtomicF64;
use url::Url;

use crate::{BufferType, CoreError, CoreResult, PerType};

/// Read-only view over a representation's segment index.
pub trait RepresentationIndex: Send + Sync + fmt::Debug {
    /// Position, in seconds, of the end of the last known segment.
    fn last_position(&self) -> Option<f64>;
}

/// Index whose last position never changes (static content, tests).
#[derive(Clone, Debug, Default)]
pub struct StaticIndex {
    last_position: Option<f64>,
}

impl StaticIndex {
    #[must_use]
    pub fn new(last_position: Option<f64>) -> Self {
        Self { last_position }
    }
}

impl RepresentationIndex for StaticIndex {
    fn last_position(&self) -> Option<f64> {
        self.last_position
    }
}

/// One quality of a track.
#[derive(Clone, Debug)]
pub struct Representation {
    pub id: String,
    /// Bits per second.
    pub bitrate: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: String,
    pub codecs: Option<String>,
    pub index: Arc<dyn RepresentationIndex>,
}

impl Representation {
    pub fn new(id: impl Into<String>, bitrate: u64) -> Self {
        Self {
            id: id.into(),
            bitrate,
            width: None,
            height: None,
            mime_type: "application/octet-stream".to_string(),
            codecs: None,
            index: Arc::new(StaticIndex::default()),
        }
    }

    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    #[must_use]
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>, codecs: Option<&str>) -> Self {
        self.mime_type = mime_type.into();
        self.codecs = codecs.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn RepresentationIndex>) -> Self {
        self.index = index;
        self
    }

    /// Two representations are interchangeable when both id and bitrate match.
    #[must_use]
    pub fn is_same(&self, other: &Representation) -> bool {
        self.id == other.id && self.bitrate == other.bitrate
    }
}

/// A track: one media type, several qualities.
#[derive(Clone, Debug)]
pub struct Adaptation {
    pub id: String,
    pub buffer_type: BufferType,
    representations: Vec<Arc<Representation>>,
}

impl Adaptation {
    /// Representations are stored sorted by ascending bitrate.
    pub fn new(
        id: impl Into<String>,
        buffer_type: BufferType,
        representations: impl IntoIterator<Item = Representation>,
    ) -> Self {
        let mut representations: Vec<_> = representations.into_iter().map(Arc::new).collect();
        representations.sort_by_key(|r| r.bitrate);
        Self {
            id: id.into(),
            buffer_type,
            representations,
        }
    }

    #[must_use]
    pub fn representations(&self) -> &[Arc<Representation>] {
        &self.representations
    }
}

/// A contiguous part of the content timeline.
#[derive(Debug)]
pub struct Period {
    pub id: String,
    /// Start, in seconds.
    pub start: f64,
    /// End, in seconds. `None` for the last period of a live stream.
    pub end: Option<f64>,
    adaptations: PerType<Vec<Arc<Adaptation>>>,
    live_edge_offset: AtomicF64,
}

impl Period {
    pub fn new(id: impl Into<String>, start: f64, end: Option<f64>) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            adaptations: PerType::default(),
            live_edge_offset: AtomicF64::new(0.0),
        }
    }

    #[must_use]
    pub fn with_adaptation(mut self, adaptation: Adaptation) -> Self {
        self.adaptations[adaptation.buffer_type].push(Arc::new(adaptation));
        self
    }

    #[must_use]
    pub fn adaptations(&self, buffer_type: BufferType) -> &[Arc<Adaptation>] {
        &self.adaptations[buffer_type]
    }

    #[must_use]
    pub fn end_or_infinity(&self) -> f64 {
        self.end.unwrap_or(f64::INFINITY)
    }

    /// Whether `time` falls in `[start, end)`.
    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && self.end.is_none_or(|end| time < end)
    }

    /// Seconds the live edge is held back from its announced position.
    #[must_use]
    pub fn live_edge_offset(&self) -> f64 {
        self.live_edge_offset.load(Ordering::Acquire)
    }

    /// Move the live edge further back, used when the server answers that a
    /// segment does not exist yet.
    pub fn push_back_live_edge(&self, seconds: f64) -> f64 {
        self.live_edge_offset.fetch_add(seconds, Ordering::AcqRel) + seconds
    }
}

/// When and where a live manifest is fetched again.
#[derive(Clone, Debug)]
pub struct ManifestRefresh {
    pub lifetime: Duration,
    /// Where to reload from when it differs from the original URL.
    pub location: Option<Url>,
}

impl ManifestRefresh {
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Url) -> Self {
        self.location = Some(location);
        self
    }

    /// Whether a manifest fetched `age` ago must be reloaded.
    #[must_use]
    pub fn is_expired(&self, age: Duration) -> bool {
        age >= self.lifetime
    }
}

/// Root of the content description.
#[derive(Debug)]
pub struct Manifest {
    pub id: String,
    pub is_live: bool,
    pub refresh: Option<ManifestRefresh>,
    periods: Vec<Arc<Period>>,
}

impl Manifest {
    /// Build a manifest, checking that periods are ordered and do not overlap.
    pub fn new(id: impl Into<String>, periods: Vec<Period>, is_live: bool) -> CoreResult<Self> {
        if periods.is_empty() {
            return Err(CoreError::InvalidManifest("no period".to_string()));
        }
        for pair in periods.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            let Some(previous_end) = previous.end else {
                return Err(CoreError::InvalidManifest(format!(
                    "period {} has no end but is followed by {}",
                    previous.id, next.id
                )));
            };
            if next.start < previous_end || next.start < previous.start {
                return Err(CoreError::PeriodOverlap {
                    period: next.id.clone(),
                    start: next.start,
                    previous_end,
                });
            }
        }
        Ok(Self {
            id: id.into(),
            is_live,
            refresh: None,
            periods: periods.into_iter().map(Arc::new).collect(),
        })
    }

    #[must_use]
    pub fn with_refresh(mut self, refresh: ManifestRefresh) -> Self {
        self.refresh = Some(refresh);
        self
    }

    #[must_use]
    pub fn periods(&self) -> &[Arc<Period>] {
        &self.periods
    }

    #[must_use]
    pub fn period_for_time(&self, time: f64) -> Option<Arc<Period>> {
        self.periods.iter().find(|p| p.contains(time)).cloned()
    }

    #[must_use]
    pub fn period_by_id(&self, id: &str) -> Option<Arc<Period>> {
        self.periods.iter().find(|p| p.id == id).cloned()
    }

    /// Period immediately following `period`.
    #[must_use]
    pub fn period_after(&self, period: &Period) -> Option<Arc<Period>> {
        let at = self.periods.iter().position(|p| p.id == period.id)?;
        self.periods.get(at + 1).cloned()
    }

    /// End of the last period, when known.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.periods.last().and_then(|p| p.end)
    }
}
