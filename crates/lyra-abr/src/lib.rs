//! Adaptive bitrate decisions.
//!
//! A [`RepresentationChooser`] turns clock ticks, bandwidth samples and the
//! state of in-flight requests into an [`AbrEstimate`]: which representation
//! to download next and whether switching to it is urgent. The
//! [`AbrManager`] owns one chooser per buffer type and routes network
//! measurements to them.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use lyra_abr::{AbrManager, AbrOptions};
//! use lyra_core::{BufferType, ClockTick, Representation};
//!
//! # async fn run() {
//! let manager = AbrManager::new(AbrOptions::default().with_initial_bitrate(BufferType::Video, 800_000));
//! let ladder = vec![
//!     Arc::new(Representation::new("low", 400_000)),
//!     Arc::new(Representation::new("high", 2_000_000)),
//! ];
//! let clock = futures::stream::iter([ClockTick::at(0.0).with_buffer_gap(10.0)]).boxed();
//! let mut estimates = manager.estimates(BufferType::Video, clock, ladder);
//! let estimate = estimates.next().await.unwrap();
//! assert_eq!(estimate.representation.id, "low");
//! # }
//! ```

#![forbid(unsafe_code)]

mod chooser;
mod error;
mod estimator;
pub mod filters;
mod manager;
mod types;

pub use chooser::{RepresentationChooser, SharedChooser, estimate_stream};
pub use error::{AbrError, AbrResult};
#[cfg(any(test, feature = "test-utils"))]
pub use estimator::EstimatorMock;
pub use estimator::{BandwidthEstimator, Estimator, Ewma};
pub use filters::{filter_by_bitrate, filter_by_width, from_bitrate_ceil};
pub use manager::AbrManager;
pub use types::{
    AbrEstimate, AbrOptions, ChooserSettings, Metric, ProgressSample, RequestBegin, RequestEvent,
    RequestId, RequestInfo,
};
