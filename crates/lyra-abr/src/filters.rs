//! Pure helpers narrowing a bitrate-sorted representation list.

use std::sync::Arc;

use lyra_core::Representation;

type Reps = [Arc<Representation>];

#[expect(clippy::cast_precision_loss)] // bitrates stay far below 2^53
pub(crate) fn bps(bitrate: u64) -> f64 {
    bitrate as f64
}

/// Ascending prefix of `representations` whose bitrate does not exceed `ceil`.
#[must_use]
pub fn filter_by_bitrate(representations: &Reps, ceil: f64) -> Vec<Arc<Representation>> {
    let end = representations
        .iter()
        .position(|r| bps(r.bitrate) > ceil)
        .unwrap_or(representations.len());
    representations[..end].to_vec()
}

/// Representations no wider than the smallest width reaching `width`.
///
/// Everything is kept when no representation is wide enough. Representations
/// without a width are always kept.
#[must_use]
pub fn filter_by_width(representations: &Reps, width: u32) -> Vec<Arc<Representation>> {
    let Some(max_width) = representations
        .iter()
        .filter_map(|r| r.width)
        .filter(|w| *w >= width)
        .min()
    else {
        return representations.to_vec();
    };
    representations
        .iter()
        .filter(|r| r.width.is_none_or(|w| w <= max_width))
        .cloned()
        .collect()
}

/// Best representation whose bitrate fits under `ceil`.
///
/// `None` when even the lowest one is above it.
#[must_use]
pub fn from_bitrate_ceil(representations: &Reps, ceil: f64) -> Option<Arc<Representation>> {
    filter_by_bitrate(representations, ceil).pop()
}
