use std::sync::Arc;

use futures::stream::BoxStream;
use lyra_core::{Adaptation, ClockTick, Manifest, Period, Representation};
use lyra_events::BufferEvent;
use lyra_net::RetryPolicy;
use tokio::sync::watch;

use crate::{BufferResult, BufferSlot};

/// What a representation buffer downloads.
#[derive(Clone, Debug)]
pub struct RepresentationContent {
    pub manifest: Arc<Manifest>,
    pub period: Arc<Period>,
    pub adaptation: Arc<Adaptation>,
    pub representation: Arc<Representation>,
}

/// Everything handed to a representation buffer when it starts.
#[derive(Clone)]
pub struct RepresentationBufferArgs {
    pub clock: watch::Receiver<ClockTick>,
    pub content: RepresentationContent,
    /// Where segments are pushed, and where they are recorded.
    pub slot: BufferSlot,
    pub wanted_buffer_ahead: watch::Receiver<f64>,
    /// Policy for the segment requests of this buffer.
    pub retry: RetryPolicy,
}

/// Downloads and pushes the segments of one representation.
///
/// The returned stream reports `ActiveBuffer`/`FullBuffer` as the buffer
/// fills and empties. Dropping it cancels every request in flight.
pub trait RepresentationBufferFactory: Send + Sync + 'static {
    fn create(&self, args: RepresentationBufferArgs) -> BoxStream<'static, BufferResult<BufferEvent>>;
}
