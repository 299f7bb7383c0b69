use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::{NetResult, SegmentRequest, timeout::TimeoutLoader};

pub type ByteStream = Pin<Box<dyn Stream<Item = NetResult<Bytes>> + Send>>;

/// Response head and streamed body of a segment fetch.
pub struct LoadResponse {
    /// Announced body size, if any.
    pub total_size: Option<u64>,
    pub body: ByteStream,
}

impl LoadResponse {
    /// Response whose body is already fully available.
    pub fn from_bytes(data: Bytes) -> Self {
        Self {
            total_size: Some(data.len() as u64),
            body: Box::pin(futures::stream::once(async move { Ok(data) })),
        }
    }
}

/// Transport used by the [`Pipeline`](crate::Pipeline) to fetch segments.
#[async_trait]
pub trait SegmentLoader: Send + Sync + 'static {
    async fn load(&self, request: &SegmentRequest) -> NetResult<LoadResponse>;
}

pub trait LoaderExt: SegmentLoader + Sized {
    /// Bound the request/response phase of every load.
    fn with_timeout(self, timeout: Duration) -> TimeoutLoader<Self> {
        TimeoutLoader::new(self, timeout)
    }
}

impl<T: SegmentLoader> LoaderExt for T {}
