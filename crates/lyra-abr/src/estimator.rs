use std::time::Duration;

use crate::AbrOptions;

/// Bandwidth estimation strategy.
///
/// Allows testing the chooser against a mock estimator.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = EstimatorMock)
)]
pub trait Estimator: Send + 'static {
    /// Record a completed download of `size` bytes that took `duration`.
    fn add_sample(&mut self, duration: Duration, size: u64);

    /// Estimated bandwidth in bits per second.
    fn estimate(&self) -> Option<f64>;

    /// Forget every sample.
    fn reset(&mut self);
}

/// Two EWMAs with different half-lives; the lower one wins so that drops are
/// picked up quickly while increases need to be sustained.
#[derive(Clone, Debug)]
pub struct BandwidthEstimator {
    fast: Ewma,
    slow: Ewma,
    bytes_sampled: u64,
    min_chunk_bytes: u64,
    min_total_bytes: u64,
}

impl BandwidthEstimator {
    const MIN_DURATION_SECS: f64 = 0.000_5;

    #[must_use]
    pub fn new(options: &AbrOptions) -> Self {
        Self {
            fast: Ewma::new(options.fast_half_life_secs),
            slow: Ewma::new(options.slow_half_life_secs),
            bytes_sampled: 0,
            min_chunk_bytes: options.min_chunk_bytes,
            min_total_bytes: options.min_total_bytes,
        }
    }
}

impl Estimator for BandwidthEstimator {
    #[expect(clippy::cast_precision_loss)] // byte counts stay far below 2^53
    fn add_sample(&mut self, duration: Duration, size: u64) {
        if size < self.min_chunk_bytes {
            tracing::trace!(size, "bandwidth sample too small, ignored");
            return;
        }
        let secs = duration.as_secs_f64().max(Self::MIN_DURATION_SECS);
        let bps = size as f64 * 8.0 / secs;
        self.fast.add_sample(secs, bps);
        self.slow.add_sample(secs, bps);
        self.bytes_sampled = self.bytes_sampled.saturating_add(size);
    }

    fn estimate(&self) -> Option<f64> {
        if self.bytes_sampled < self.min_total_bytes {
            return None;
        }
        Some(self.fast.estimate().min(self.slow.estimate()))
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.bytes_sampled = 0;
    }
}

/// Half-life weighted average of bandwidth samples.
///
/// A sample of weight `w` keeps `0.5^(w / half_life)` of the history. Early
/// on the average is biased toward zero, so [`Ewma::estimate`] rescales it by
/// the share of the window covered by samples so far.
#[derive(Clone, Debug)]
pub struct Ewma {
    half_life: f64,
    average: f64,
    seen_weight: f64,
}

impl Ewma {
    const MIN_HALF_LIFE: f64 = 0.001;
    const MIN_COVERAGE: f64 = 1e-6;

    #[must_use]
    pub fn new(half_life: f64) -> Self {
        Self {
            half_life: half_life.max(Self::MIN_HALF_LIFE),
            average: 0.0,
            seen_weight: 0.0,
        }
    }

    fn retained(&self, weight: f64) -> f64 {
        0.5_f64.powf(weight / self.half_life)
    }

    pub fn add_sample(&mut self, weight: f64, value: f64) {
        let weight = weight.max(0.0);
        let keep = self.retained(weight);
        self.average = keep.mul_add(self.average, (1.0 - keep) * value);
        self.seen_weight += weight;
    }

    #[must_use]
    pub fn estimate(&self) -> f64 {
        if self.seen_weight <= 0.0 {
            return 0.0;
        }
        let coverage = 1.0 - self.retained(self.seen_weight);
        self.average / coverage.max(Self::MIN_COVERAGE)
    }

    pub fn reset(&mut self) {
        self.average = 0.0;
        self.seen_weight = 0.0;
    }
}
