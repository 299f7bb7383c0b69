use std::sync::Arc;

use bytes::Bytes;
use lyra_core::{BufferType, TimeRanges};

use crate::BufferResult;

/// Append/remove target for one buffer type.
///
/// Operations are expected to be applied in call order.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = SourceBufferMock)
)]
pub trait SourceBuffer: Send + Sync + 'static {
    fn append_buffer(&self, data: Bytes) -> BufferResult<()>;

    /// Remove media in `[start, end)`, in seconds.
    fn remove_buffer(&self, start: f64, end: f64) -> BufferResult<()>;

    fn buffered(&self) -> TimeRanges;
}

/// Creates the source buffer of a type. At most one exists per type at a
/// time.
#[cfg_attr(
    any(test, feature = "test-utils"),
    unimock::unimock(api = SourceBufferFactoryMock)
)]
pub trait SourceBufferFactory: Send + Sync + 'static {
    fn create(
        &self,
        buffer_type: BufferType,
        mime_type: &str,
        codecs: Option<&str>,
    ) -> BufferResult<Arc<dyn SourceBuffer>>;

    fn dispose(&self, buffer_type: BufferType);
}
