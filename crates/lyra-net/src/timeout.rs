use std::time::Duration;

use async_trait::async_trait;

use crate::{LoadResponse, NetError, NetResult, SegmentLoader, SegmentRequest};

/// Timeout decorator for loaders.
///
/// Only the request/response phase is bounded; the pipeline bounds the body.
pub struct TimeoutLoader<L> {
    inner: L,
    timeout: Duration,
}

impl<L: SegmentLoader> TimeoutLoader<L> {
    pub fn new(inner: L, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<L: SegmentLoader> SegmentLoader for TimeoutLoader<L> {
    async fn load(&self, request: &SegmentRequest) -> NetResult<LoadResponse> {
        tokio::time::timeout(self.timeout, self.inner.load(request))
            .await
            .map_err(|_| NetError::Timeout)?
    }
}
