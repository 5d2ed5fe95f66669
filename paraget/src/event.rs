//! Lifecycle event publication.
//!
//! The engine is decoupled from any rendering layer: it publishes typed
//! lifecycle events to an [`EventBus`] and front-ends subscribe with plain
//! handler closures. There is no listener inheritance hierarchy; a
//! subscription is just a kind filter plus a boxed function.

use parking_lot::Mutex;

/// The kinds of lifecycle events a batch emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A batch (or single transfer) is about to start.
    Started,
    /// Cumulative progress across all transfers in the batch.
    Progress,
    /// Every transfer in the batch has finished or failed.
    Completed,
}

/// A lifecycle event published by the engine.
///
/// Byte totals of 0 mean no `Content-Length` was declared for any transfer
/// in the batch; consumers should fall back to transfer counts in that case.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// The batch is starting.
    Started {
        total_transfers: usize,
        total_bytes: u64,
    },
    /// Combined progress after a worker wrote a chunk.
    Progress {
        downloaded: u64,
        total_bytes: u64,
        percent: u8,
        finished_transfers: usize,
        total_transfers: usize,
    },
    /// The batch finished. Published exactly once per engine call.
    Completed {
        succeeded: usize,
        failed: usize,
        downloaded: u64,
    },
}

impl DownloadEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            DownloadEvent::Started { .. } => EventKind::Started,
            DownloadEvent::Progress { .. } => EventKind::Progress,
            DownloadEvent::Completed { .. } => EventKind::Completed,
        }
    }
}

/// Handler invoked for each published event.
pub type EventHandler = Box<dyn Fn(&DownloadEvent) + Send + Sync>;

struct Subscription {
    kind: Option<EventKind>,
    handler: EventHandler,
}

/// Fan-out of lifecycle events to registered listeners.
///
/// Each listener receives every event it subscribed to exactly once, in
/// emission order. Delivery order across listeners is unspecified.
///
/// # Thread Safety
///
/// `publish` may be called from any worker thread. Handlers run on the
/// publishing thread inside the engine's progress critical section, so they
/// must be quick and must not call back into the engine.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Subscription>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&DownloadEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Subscription {
            kind: Some(kind),
            handler: Box::new(handler),
        });
    }

    /// Register a handler for every event kind.
    pub fn subscribe_all<F>(&self, handler: F)
    where
        F: Fn(&DownloadEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Subscription {
            kind: None,
            handler: Box::new(handler),
        });
    }

    /// Deliver an event to every matching listener.
    pub fn publish(&self, event: &DownloadEvent) {
        let listeners = self.listeners.lock();
        for subscription in listeners.iter() {
            match subscription.kind {
                Some(kind) if kind != event.kind() => {}
                _ => (subscription.handler)(event),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn progress_event(downloaded: u64) -> DownloadEvent {
        DownloadEvent::Progress {
            downloaded,
            total_bytes: 100,
            percent: downloaded as u8,
            finished_transfers: 0,
            total_transfers: 1,
        }
    }

    #[test]
    fn test_event_kind_mapping() {
        let started = DownloadEvent::Started {
            total_transfers: 1,
            total_bytes: 10,
        };
        let completed = DownloadEvent::Completed {
            succeeded: 1,
            failed: 0,
            downloaded: 10,
        };

        assert_eq!(started.kind(), EventKind::Started);
        assert_eq!(progress_event(5).kind(), EventKind::Progress);
        assert_eq!(completed.kind(), EventKind::Completed);
    }

    #[test]
    fn test_subscribe_filters_by_kind() {
        let bus = EventBus::new();
        let progress_seen = Arc::new(AtomicUsize::new(0));
        let completed_seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&progress_seen);
        bus.subscribe(EventKind::Progress, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&completed_seen);
        bus.subscribe(EventKind::Completed, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&progress_event(1));
        bus.publish(&progress_event(2));
        bus.publish(&DownloadEvent::Completed {
            succeeded: 1,
            failed: 0,
            downloaded: 2,
        });

        assert_eq!(progress_seen.load(Ordering::SeqCst), 2);
        assert_eq!(completed_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_all_receives_everything() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        bus.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&DownloadEvent::Started {
            total_transfers: 1,
            total_bytes: 0,
        });
        bus.publish(&progress_event(1));
        bus.publish(&DownloadEvent::Completed {
            succeeded: 1,
            failed: 0,
            downloaded: 1,
        });

        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_multiple_listeners_each_receive_once() {
        let bus = EventBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        bus.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        bus.subscribe_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&progress_event(1));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_arrive_in_emission_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = Arc::clone(&order);
        bus.subscribe(EventKind::Progress, move |event| {
            if let DownloadEvent::Progress { downloaded, .. } = event {
                order_clone.lock().push(*downloaded);
            }
        });

        for i in 1..=5 {
            bus.publish(&progress_event(i));
        }

        assert_eq!(*order.lock(), vec![1, 2, 3, 4, 5]);
    }
}
