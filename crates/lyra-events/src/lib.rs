#![forbid(unsafe_code)]

//! Events emitted by the buffer scheduler, and the bus they can be observed on.

mod bus;
mod event;

pub use bus::EventBus;
pub use event::{BufferEvent, TrackChoice, TrackSelector};
