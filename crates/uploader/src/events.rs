//! Multi-subscriber event delivery.
//!
//! Events are enqueued while the session lock is held, so the queue order is
//! the commit order of state transitions. They are delivered after the lock
//! is released by whichever thread flushes first; a handler that calls back
//! into the uploader only enqueues, and its events are delivered by the
//! flush already in progress.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use crate::lock;
use crate::types::UploadEvent;

/// Callback invoked for every published event.
pub type EventHandler = Arc<dyn Fn(&UploadEvent) + Send + Sync>;

/// Token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered publish/subscribe for [`UploadEvent`]s.
pub struct EventBus {
    handlers: RwLock<Vec<(SubscriptionId, EventHandler)>>,
    next_id: AtomicU64,
    queue: Mutex<VecDeque<UploadEvent>>,
    dispatching: AtomicBool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue: Mutex::new(VecDeque::new()),
            dispatching: AtomicBool::new(false),
        }
    }

    /// Registers a handler. Handlers run in registration order.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&UploadEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    /// Returns a channel receiving every event published from now on.
    pub fn channel(&self) -> mpsc::UnboundedReceiver<UploadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Enqueues and delivers an event.
    pub fn publish(&self, event: UploadEvent) {
        self.enqueue(event);
        self.flush();
    }

    pub(crate) fn enqueue(&self, event: UploadEvent) {
        lock(&self.queue).push_back(event);
    }

    /// Delivers queued events unless another flush is already running.
    pub(crate) fn flush(&self) {
        loop {
            if self.dispatching.swap(true, Ordering::AcqRel) {
                return;
            }
            {
                let _guard = DispatchGuard(&self.dispatching);
                while let Some(event) = self.pop() {
                    for handler in self.snapshot() {
                        handler(&event);
                    }
                }
            }
            // Catch events enqueued between the last pop and the guard drop.
            if lock(&self.queue).is_empty() {
                return;
            }
        }
    }

    fn pop(&self) -> Option<UploadEvent> {
        lock(&self.queue).pop_front()
    }

    fn snapshot(&self) -> Vec<EventHandler> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }
}

struct DispatchGuard<'a>(&'a AtomicBool);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
