#![forbid(unsafe_code)]

//! Shared data model for the lyra streaming engine.
//!
//! Content is described as a [`Manifest`] made of chronologically ordered
//! [`Period`]s, each exposing [`Adaptation`]s (tracks) per [`BufferType`],
//! each made of [`Representation`]s (qualities) sorted by ascending bitrate.
//!
//! Playback state is observed through [`ClockTick`] snapshots and buffered
//! content through [`TimeRanges`].

mod buffer_type;
mod clock;
mod errors;
mod manifest;
mod ranges;

pub use buffer_type::{BufferType, PerType};
pub use clock::ClockTick;
pub use errors::{CoreError, CoreResult};
pub use manifest::{
    Adaptation, Manifest, ManifestRefresh, Period, Representation, RepresentationIndex,
    StaticIndex,
};
pub use ranges::{TimeRange, TimeRanges};
