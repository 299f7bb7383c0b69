use std::sync::Arc;

use lyra_core::{BufferType, ClockTick, PerType};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    BufferResult, GarbageCollector, SegmentBookkeeper, SharedBookkeeper, SourceBuffer,
    SourceBufferFactory,
};

/// The source buffer of a type together with its bookkeeper.
#[derive(Clone)]
pub struct BufferSlot {
    pub source_buffer: Arc<dyn SourceBuffer>,
    pub bookkeeper: SharedBookkeeper,
}

struct Entry {
    slot: BufferSlot,
    gc: Option<CancellationToken>,
}

/// One source buffer, bookkeeper and garbage collector per buffer type,
/// created on first use and kept until disposed.
pub struct SourceBufferRegistry {
    factory: Arc<dyn SourceBufferFactory>,
    entries: Mutex<PerType<Option<Entry>>>,
    cancel: CancellationToken,
}

impl SourceBufferRegistry {
    pub fn new(factory: Arc<dyn SourceBufferFactory>, cancel: CancellationToken) -> Self {
        Self {
            factory,
            entries: Mutex::new(PerType::default()),
            cancel,
        }
    }

    #[must_use]
    pub fn get(&self, buffer_type: BufferType) -> Option<BufferSlot> {
        self.entries.lock()[buffer_type]
            .as_ref()
            .map(|entry| entry.slot.clone())
    }

    /// The existing slot of `buffer_type`, or a new one created with the
    /// given MIME type and codecs.
    pub fn get_or_create(
        &self,
        buffer_type: BufferType,
        mime_type: &str,
        codecs: Option<&str>,
    ) -> BufferResult<BufferSlot> {
        let mut entries = self.entries.lock();
        if let Some(entry) = &entries[buffer_type] {
            return Ok(entry.slot.clone());
        }
        tracing::debug!(%buffer_type, mime_type, ?codecs, "creating source buffer");
        let source_buffer = self.factory.create(buffer_type, mime_type, codecs)?;
        let slot = BufferSlot {
            source_buffer,
            bookkeeper: SegmentBookkeeper::new(buffer_type).into_shared(),
        };
        entries[buffer_type] = Some(Entry {
            slot: slot.clone(),
            gc: None,
        });
        Ok(slot)
    }

    /// Start the garbage collector of `buffer_type`, unless it runs already
    /// or there is no source buffer. Returns whether one was started.
    pub fn start_gc(
        &self,
        buffer_type: BufferType,
        clock: watch::Receiver<ClockTick>,
        max_buffer_behind: watch::Receiver<f64>,
        max_buffer_ahead: watch::Receiver<f64>,
    ) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries[buffer_type].as_mut() else {
            return false;
        };
        if entry.gc.is_some() {
            return false;
        }
        let token = self.cancel.child_token();
        GarbageCollector::new(
            buffer_type,
            Arc::clone(&entry.slot.source_buffer),
            Arc::clone(&entry.slot.bookkeeper),
            max_buffer_behind,
            max_buffer_ahead,
        )
        .spawn(clock, token.clone());
        entry.gc = Some(token);
        true
    }

    /// Stop the garbage collector and release the source buffer of
    /// `buffer_type`.
    pub fn dispose(&self, buffer_type: BufferType) {
        let entry = self.entries.lock().replace(buffer_type, None);
        if let Some(entry) = entry {
            tracing::debug!(%buffer_type, "disposing source buffer");
            if let Some(gc) = entry.gc {
                gc.cancel();
            }
            entry.slot.bookkeeper.lock().reset();
            self.factory.dispose(buffer_type);
        }
    }

    pub fn dispose_all(&self) {
        for buffer_type in BufferType::ALL {
            self.dispose(buffer_type);
        }
    }
}
