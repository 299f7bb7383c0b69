/// Half-open time interval `[start, end)`, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    #[must_use]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    #[must_use]
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let range = TimeRange::new(self.start.max(other.start), self.end.min(other.end));
        (!range.is_empty()).then_some(range)
    }
}

/// Ordered set of non-overlapping, non-adjacent [`TimeRange`]s.
///
/// Mirrors what a media buffer reports as buffered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeRanges {
    ranges: Vec<TimeRange>,
}

impl TimeRanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = TimeRange>) -> Self {
        let mut out = Self::new();
        for range in ranges {
            out.insert(range);
        }
        out
    }

    /// Add `range`, merging it with every range it touches.
    pub fn insert(&mut self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut merged = range;
        self.ranges.retain(|r| {
            if r.end < merged.start || r.start > merged.end {
                return true;
            }
            merged.start = merged.start.min(r.start);
            merged.end = merged.end.max(r.end);
            false
        });
        let at = self
            .ranges
            .iter()
            .position(|r| r.start > merged.start)
            .unwrap_or(self.ranges.len());
        self.ranges.insert(at, merged);
    }

    /// Remove `range` from the set, splitting ranges when needed.
    pub fn remove(&mut self, range: TimeRange) {
        if range.is_empty() {
            return;
        }
        self.ranges = self
            .ranges
            .iter()
            .flat_map(|r| subtract(*r, range))
            .collect();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.ranges.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<TimeRange> {
        self.ranges.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<TimeRange> {
        self.ranges.last().copied()
    }

    /// Range containing `time`, if any.
    #[must_use]
    pub fn range_containing(&self, time: f64) -> Option<TimeRange> {
        self.ranges.iter().copied().find(|r| r.contains(time))
    }

    /// Parts of the set lying inside `bounds`.
    #[must_use]
    pub fn intersect(&self, bounds: &TimeRange) -> TimeRanges {
        TimeRanges {
            ranges: self
                .ranges
                .iter()
                .filter_map(|r| r.intersection(bounds))
                .collect(),
        }
    }

    /// Parts of the set lying outside `hole`.
    #[must_use]
    pub fn exclude(&self, hole: &TimeRange) -> TimeRanges {
        let mut out = self.clone();
        out.remove(*hole);
        out
    }
}

impl FromIterator<TimeRange> for TimeRanges {
    fn from_iter<I: IntoIterator<Item = TimeRange>>(iter: I) -> Self {
        Self::from_ranges(iter)
    }
}

impl<'a> IntoIterator for &'a TimeRanges {
    type Item = &'a TimeRange;
    type IntoIter = std::slice::Iter<'a, TimeRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

fn subtract(range: TimeRange, hole: TimeRange) -> Vec<TimeRange> {
    if hole.end <= range.start || hole.start >= range.end {
        return vec![range];
    }
    [
        TimeRange::new(range.start, hole.start),
        TimeRange::new(hole.end, range.end),
    ]
    .into_iter()
    .filter(|r| !r.is_empty())
    .collect()
}
