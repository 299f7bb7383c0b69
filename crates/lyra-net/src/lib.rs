#![forbid(unsafe_code)]

mod cache;
mod error;
mod pipeline;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    cache::{MemoryCache, SegmentCache},
    error::{NetError, NetResult},
    pipeline::Pipeline,
    retry::{Backoff, DefaultRetryClassifier, RetryClassifier},
    timeout::TimeoutLoader,
    traits::{ByteStream, LoadResponse, LoaderExt, SegmentLoader},
    types::{PipelineEvent, PipelineOptions, RangeSpec, RetryPolicy, SegmentRequest},
};
