//! Broadcast of committed frames to registered consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, trace};

use super::double_buffer::FrameDoubleBuffer;
use crate::core::{EmulatorCore, FrameMeta};

/// Stable handle for a registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

/// One registered presentation surface: a double buffer plus an optional
/// wake-up callback invoked after each commit into it.
pub struct FrameSink {
    buffer: Arc<FrameDoubleBuffer>,
    notify: Option<Box<dyn Fn(FrameMeta) + Send + Sync>>,
}

impl FrameSink {
    pub fn new(buffer: Arc<FrameDoubleBuffer>) -> Arc<Self> {
        Arc::new(Self {
            buffer,
            notify: None,
        })
    }

    /// Sink whose `notify` runs on the publishing thread after each commit.
    /// Keep it cheap; it shares time with the emulation loop.
    pub fn with_notify(
        buffer: Arc<FrameDoubleBuffer>,
        notify: impl Fn(FrameMeta) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            buffer,
            notify: Some(Box::new(notify)),
        })
    }

    pub fn buffer(&self) -> &Arc<FrameDoubleBuffer> {
        &self.buffer
    }
}

impl Drop for FrameSink {
    fn drop(&mut self) {
        // Late publishes against a vanished consumer become no-ops.
        self.buffer.retire();
    }
}

/// Registry of frame sinks, weakly held so a consumer that simply drops its
/// sink stops receiving frames without any unregister ceremony.
pub struct FrameFanout {
    consumers: Mutex<Vec<(ConsumerId, Weak<FrameSink>)>>,
    next_id: AtomicU64,
}

impl FrameFanout {
    pub fn new() -> Self {
        Self {
            consumers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, sink: &Arc<FrameSink>) -> ConsumerId {
        let id = ConsumerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::downgrade(sink)));
        debug!(id = id.0, "video consumer registered");
        id
    }

    /// Remove a consumer eagerly. Dropping the sink has the same effect at
    /// the next publish; this just makes the teardown point explicit.
    pub fn unregister(&self, id: ConsumerId) {
        let mut consumers = self.lock();
        let before = consumers.len();
        consumers.retain(|(cid, _)| *cid != id);
        if consumers.len() < before {
            debug!(id = id.0, "video consumer unregistered");
        }
    }

    /// Live consumers still registered.
    pub fn consumer_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Copy the producer's finished frame into every live consumer's
    /// writable slot, commit, and notify. Returns how many consumers
    /// received the frame.
    ///
    /// The registry is snapshotted first so sinks can be registered or
    /// dropped from other threads while the copies run.
    pub fn publish<C: EmulatorCore + ?Sized>(&self, core: &C) -> usize {
        let snapshot: Vec<(ConsumerId, Weak<FrameSink>)> = self.lock().clone();

        let mut published = 0;
        let mut dead: Vec<ConsumerId> = Vec::new();
        for (id, weak) in snapshot {
            let Some(sink) = weak.upgrade() else {
                dead.push(id);
                continue;
            };
            // Retired buffer: consumer is tearing down, skip it.
            let Some(mut guard) = sink.buffer.acquire_writable() else {
                continue;
            };
            {
                let frame = guard.frame_mut();
                let stride = frame.format().stride;
                core.copy_frame(frame.pixels_mut(), stride);
            }
            if let Some(meta) = guard.commit() {
                if let Some(notify) = &sink.notify {
                    notify(meta);
                }
                published += 1;
            }
        }

        if !dead.is_empty() {
            let mut consumers = self.lock();
            consumers.retain(|(id, _)| !dead.contains(id));
            trace!(pruned = dead.len(), "dropped video consumers pruned");
        }
        published
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ConsumerId, Weak<FrameSink>)>> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameFanout {
    fn default() -> Self {
        Self::new()
    }
}
