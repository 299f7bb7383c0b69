//! In-memory source buffers.

use std::sync::Arc;

use bytes::Bytes;
use lyra_buffer::{BufferError, BufferResult, SourceBuffer, SourceBufferFactory};
use lyra_core::{BufferType, PerType, TimeRange, TimeRanges};
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    buffered: TimeRanges,
    appended: Vec<Bytes>,
    removed: Vec<TimeRange>,
}

/// Source buffer keeping its buffered ranges in memory.
///
/// Appended bytes are not parsed: tests declare what is buffered with
/// [`fill`](Self::fill).
#[derive(Default)]
pub struct MemorySourceBuffer {
    state: Mutex<State>,
}

impl MemorySourceBuffer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fill(&self, start: f64, end: f64) {
        self.state.lock().buffered.insert(TimeRange::new(start, end));
    }

    /// Every range removed so far, in call order.
    #[must_use]
    pub fn removed(&self) -> Vec<TimeRange> {
        self.state.lock().removed.clone()
    }

    #[must_use]
    pub fn appended(&self) -> usize {
        self.state.lock().appended.len()
    }
}

impl SourceBuffer for MemorySourceBuffer {
    fn append_buffer(&self, data: Bytes) -> BufferResult<()> {
        self.state.lock().appended.push(data);
        Ok(())
    }

    fn remove_buffer(&self, start: f64, end: f64) -> BufferResult<()> {
        let range = TimeRange::new(start, end);
        let mut state = self.state.lock();
        state.removed.push(range);
        state.buffered.remove(range);
        Ok(())
    }

    fn buffered(&self) -> TimeRanges {
        self.state.lock().buffered.clone()
    }
}

#[derive(Default)]
struct Log {
    created: Vec<(BufferType, String)>,
    disposed: Vec<BufferType>,
}

/// Factory of [`MemorySourceBuffer`]s recording what it is asked.
pub struct MemorySourceBufferFactory {
    buffers: Mutex<PerType<Option<Arc<MemorySourceBuffer>>>>,
    failing: Vec<BufferType>,
    log: Mutex<Log>,
}

impl Default for MemorySourceBufferFactory {
    fn default() -> Self {
        Self {
            buffers: Mutex::new(PerType::from_fn(|_| None)),
            failing: Vec::new(),
            log: Mutex::default(),
        }
    }
}

impl MemorySourceBufferFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make creation of `buffer_type` fail.
    #[must_use]
    pub fn failing(mut self, buffer_type: BufferType) -> Self {
        self.failing.push(buffer_type);
        self
    }

    /// The last buffer created for `buffer_type`.
    #[must_use]
    pub fn buffer(&self, buffer_type: BufferType) -> Option<Arc<MemorySourceBuffer>> {
        self.buffers.lock()[buffer_type].clone()
    }

    /// Types created so far with their MIME type, in call order.
    #[must_use]
    pub fn created(&self) -> Vec<(BufferType, String)> {
        self.log.lock().created.clone()
    }

    #[must_use]
    pub fn disposed(&self) -> Vec<BufferType> {
        self.log.lock().disposed.clone()
    }
}

impl SourceBufferFactory for MemorySourceBufferFactory {
    fn create(
        &self,
        buffer_type: BufferType,
        mime_type: &str,
        _codecs: Option<&str>,
    ) -> BufferResult<Arc<dyn SourceBuffer>> {
        self.log
            .lock()
            .created
            .push((buffer_type, mime_type.to_string()));
        if self.failing.contains(&buffer_type) {
            return Err(BufferError::source_buffer(format!(
                "{mime_type} is not supported"
            )));
        }
        let buffer = MemorySourceBuffer::new();
        self.buffers.lock()[buffer_type] = Some(Arc::clone(&buffer));
        Ok(buffer)
    }

    fn dispose(&self, buffer_type: BufferType) {
        self.log.lock().disposed.push(buffer_type);
    }
}
