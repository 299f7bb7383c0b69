//! Buffer scheduling.
//!
//! The [`PeriodBufferManager`] keeps, for every buffer type, a chain of
//! consecutive Periods being downloaded. Each Period runs an
//! [`AdaptationBuffer`] for the track chosen through its
//! [`TrackSelector`](lyra_events::TrackSelector), which in turn runs one
//! representation buffer at a time as the ABR logic decides. Source buffers
//! are created lazily per type and garbage collected around the playback
//! position.

#![forbid(unsafe_code)]

mod adaptation;
mod bookkeeper;
mod error;
mod eos;
mod fake;
mod gc;
mod options;
mod period;
mod registry;
mod representation;
mod source_buffer;

pub use crate::{
    adaptation::{AdaptationBuffer, AdaptationContent},
    bookkeeper::{BufferedSegment, SegmentBookkeeper, SegmentInfo, SharedBookkeeper},
    eos::EndOfStreamTracker,
    error::{BufferError, BufferResult},
    fake::fake_buffer,
    gc::{GarbageCollector, collectable_ranges},
    options::{BufferOptions, fixed},
    period::{BufferContent, PeriodBufferManager, ranges_to_clean},
    registry::{BufferSlot, SourceBufferRegistry},
    representation::{RepresentationBufferArgs, RepresentationBufferFactory, RepresentationContent},
    source_buffer::{SourceBuffer, SourceBufferFactory},
};
#[cfg(any(test, feature = "test-utils"))]
pub use crate::source_buffer::{SourceBufferFactoryMock, SourceBufferMock};
