use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::SegmentRequest;

/// Store of already fetched segments.
pub trait SegmentCache: Send + Sync {
    fn get(&self, request: &SegmentRequest) -> Option<Bytes>;

    fn insert(&self, request: &SegmentRequest, data: Bytes);
}

/// In-memory cache keeping at most `capacity` segments, oldest evicted first.
pub struct MemoryCache {
    capacity: usize,
    inner: Mutex<MemoryCacheInner>,
}

#[derive(Default)]
struct MemoryCacheInner {
    entries: HashMap<String, Bytes>,
    order: VecDeque<String>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(MemoryCacheInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SegmentCache for MemoryCache {
    fn get(&self, request: &SegmentRequest) -> Option<Bytes> {
        self.inner.lock().entries.get(&request.cache_key()).cloned()
    }

    fn insert(&self, request: &SegmentRequest, data: Bytes) {
        if self.capacity == 0 {
            return;
        }
        let key = request.cache_key();
        let mut inner = self.inner.lock();
        if inner.entries.insert(key.clone(), data).is_none() {
            inner.order.push_back(key);
        }
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            tracing::trace!(key = %oldest, "segment evicted from cache");
        }
    }
}
