use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_stream::stream;
use bytes::BytesMut;
use futures::{StreamExt, stream::BoxStream};
use lyra_abr::{ProgressSample, RequestBegin, RequestId};
use tokio::time::{Instant, timeout_at};

use crate::{
    Backoff, LoadResponse, NetError, NetResult, PipelineEvent, PipelineOptions, SegmentLoader,
    SegmentRequest,
};

/// Fetches segments through a [`SegmentLoader`], adding a timeout, retries
/// with backoff, an optional cache and the request lifecycle events the ABR
/// logic feeds on.
pub struct Pipeline<L> {
    loader: Arc<L>,
    options: PipelineOptions,
    next_id: Arc<AtomicU64>,
}

impl<L> Clone for Pipeline<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            options: self.options.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<L: SegmentLoader> Pipeline<L> {
    pub fn new(loader: L, options: PipelineOptions) -> Self {
        Self {
            loader: Arc::new(loader),
            options,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Events of a single segment fetch. The stream ends after `Data` or
    /// `Cache`, or after an error once the retry budget is spent.
    pub fn create_request(
        &self,
        request: SegmentRequest,
    ) -> BoxStream<'static, NetResult<PipelineEvent>> {
        let loader = Arc::clone(&self.loader);
        let options = self.options.clone();
        let next_id = Arc::clone(&self.next_id);

        Box::pin(stream! {
            if let Some(cache) = &options.cache
                && let Some(data) = cache.get(&request)
            {
                tracing::trace!(url = %request.url, "segment served from cache");
                yield Ok(PipelineEvent::Cache(data));
                return;
            }

            let mut backoff = Backoff::new(options.retry.clone());
            loop {
                let id = RequestId(next_id.fetch_add(1, Ordering::Relaxed));
                let requested_at = Instant::now();
                let deadline = requested_at + options.timeout;
                yield Ok(PipelineEvent::RequestBegin {
                    id,
                    begin: RequestBegin {
                        time: request.time,
                        duration: request.duration,
                        requested_at,
                    },
                });

                let result: NetResult<bytes::Bytes> = 'attempt: {
                    let LoadResponse { total_size, mut body } =
                        match timeout_at(deadline, loader.load(&request)).await {
                            Ok(Ok(response)) => response,
                            Ok(Err(error)) => break 'attempt Err(error),
                            Err(_) => break 'attempt Err(NetError::Timeout),
                        };
                    let mut data = BytesMut::new();
                    loop {
                        match timeout_at(deadline, body.next()).await {
                            Err(_) => break 'attempt Err(NetError::Timeout),
                            Ok(None) => break 'attempt Ok(data.freeze()),
                            Ok(Some(Err(error))) => break 'attempt Err(error),
                            Ok(Some(Ok(chunk))) => {
                                data.extend_from_slice(&chunk);
                                yield Ok(PipelineEvent::Progress {
                                    id,
                                    progress: ProgressSample {
                                        size: data.len() as u64,
                                        total_size,
                                        timestamp: Instant::now(),
                                    },
                                });
                            }
                        }
                    }
                };

                yield Ok(PipelineEvent::RequestEnd { id });

                match result {
                    Ok(data) => {
                        yield Ok(PipelineEvent::Metrics {
                            size: data.len() as u64,
                            duration: requested_at.elapsed(),
                        });
                        if let Some(cache) = &options.cache {
                            cache.insert(&request, data.clone());
                        }
                        yield Ok(PipelineEvent::Data(data));
                        return;
                    }
                    Err(error) => match backoff.next_delay(&error) {
                        Some(delay) => {
                            tracing::warn!(
                                url = %request.url,
                                %error,
                                delay_ms = delay.as_millis() as u64,
                                "segment request failed, retrying"
                            );
                            yield Ok(PipelineEvent::Warning(error));
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            yield Err(backoff.give_up(error));
                            return;
                        }
                    },
                }
            }
        })
    }
}
