#![forbid(unsafe_code)]

//! # Lyra
//!
//! Facade crate for the adaptive bitrate engine and the buffer scheduler.
//!
//! ## Quick start
//!
//! ```ignore
//! use lyra::prelude::*;
//!
//! let abr = Arc::new(AbrManager::new(AbrOptions::default()));
//! let manager = PeriodBufferManager::new(
//!     BufferContent { manifest, initial_period },
//!     clock,
//!     abr,
//!     source_buffers,
//!     representation_buffers,
//!     BufferOptions::default(),
//! );
//! let mut events = manager.run();
//! while let Some(event) = events.next().await {
//!     println!("{}", event?);
//! }
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod core {
    pub use lyra_core::*;
}

pub mod abr {
    pub use lyra_abr::*;
}

pub mod buffer {
    pub use lyra_buffer::*;
}

pub mod events {
    pub use lyra_events::*;
}

#[cfg(feature = "net")]
pub mod net {
    pub use lyra_net::*;
}

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use lyra_abr::{AbrEstimate, AbrManager, AbrOptions, Metric, RequestEvent};
    pub use lyra_buffer::{
        BufferContent, BufferError, BufferOptions, BufferResult, PeriodBufferManager,
        RepresentationBufferArgs, RepresentationBufferFactory, SourceBuffer, SourceBufferFactory,
    };
    pub use lyra_core::{
        Adaptation, BufferType, ClockTick, Manifest, Period, Representation, TimeRange,
        TimeRanges,
    };
    pub use lyra_events::{BufferEvent, EventBus, TrackChoice, TrackSelector};
    #[cfg(feature = "net")]
    pub use lyra_net::{NetError, Pipeline, PipelineOptions, RetryPolicy, SegmentLoader};
}
