//! Batch progress aggregation.
//!
//! Workers report per-transfer byte counts through [`BatchProgress`]; the
//! aggregator owns the only shared mutable state in the engine (a
//! mutex-guarded table of per-transfer counters), recomputes the combined
//! totals on every tick and publishes a single PROGRESS event stream. The
//! COMPLETED event fires exactly once, when every transfer in the batch has
//! either delivered its final tick or been recorded as failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::{DownloadEvent, EventBus};
use crate::metadata::TransferId;
use crate::transfer::ProgressSample;

#[derive(Debug, Clone, Copy)]
struct TransferEntry {
    downloaded: u64,
    finished: bool,
}

#[derive(Debug, Default)]
struct AggregateState {
    transfers: HashMap<TransferId, TransferEntry>,
    finished: usize,
    failed: usize,
    total: usize,
    total_known_bytes: u64,
    completed_emitted: bool,
}

impl AggregateState {
    fn downloaded_bytes(&self) -> u64 {
        self.transfers.values().map(|t| t.downloaded).sum()
    }

    /// Combined percentage across the batch.
    ///
    /// Byte-based when any size is known, otherwise falls back to the
    /// finished-transfer count.
    fn percent(&self) -> u8 {
        if self.total_known_bytes > 0 {
            let downloaded = self.downloaded_bytes();
            ((downloaded.saturating_mul(100)) / self.total_known_bytes).min(100) as u8
        } else if self.total > 0 {
            (((self.finished + self.failed) * 100) / self.total).min(100) as u8
        } else {
            100
        }
    }

    fn settled(&self) -> bool {
        self.finished + self.failed == self.total
    }
}

/// Shared progress aggregate for one batch.
///
/// Every mutation runs under one mutex; workers never touch the table
/// directly. Events are published from inside the critical section, which
/// is what guarantees listeners observe them in emission order and see
/// COMPLETED exactly once.
pub struct BatchProgress {
    events: Arc<EventBus>,
    settle_delay: Duration,
    state: Mutex<AggregateState>,
}

impl BatchProgress {
    /// Create an aggregator publishing to `events`.
    ///
    /// `settle_delay` is the pause [`wait_settle`](Self::wait_settle)
    /// performs after completion; pass [`Duration::ZERO`] to disable it.
    pub fn new(events: Arc<EventBus>, settle_delay: Duration) -> Self {
        Self {
            events,
            settle_delay,
            state: Mutex::new(AggregateState::default()),
        }
    }

    /// Initialize the batch totals and publish STARTED.
    ///
    /// Must be called once, before any worker starts.
    pub fn init(&self, total_transfers: usize, total_known_bytes: u64) {
        let mut state = self.state.lock();
        state.total = total_transfers;
        state.total_known_bytes = total_known_bytes;

        self.events.publish(&DownloadEvent::Started {
            total_transfers,
            total_bytes: total_known_bytes,
        });

        // An empty batch is complete as soon as it starts.
        self.maybe_complete(&mut state);
    }

    /// Record one progress tick from a transfer worker.
    pub fn record(&self, sample: ProgressSample) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let entry = state.transfers.entry(sample.id).or_insert(TransferEntry {
            downloaded: 0,
            finished: false,
        });

        // Per-transfer byte counts never move backwards.
        entry.downloaded = entry.downloaded.max(sample.downloaded);

        let newly_finished = sample.finished && !entry.finished;
        if newly_finished {
            entry.finished = true;
            state.finished += 1;
        }

        self.publish_progress(state);
        self.maybe_complete(state);
    }

    /// Record a transfer that died without delivering a final tick.
    ///
    /// Counts toward the completion barrier without touching byte sums, so
    /// COMPLETED still fires exactly once for a partially failed batch.
    pub fn record_failure(&self, id: Option<TransferId>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(id) = id {
            let entry = state.transfers.entry(id).or_insert(TransferEntry {
                downloaded: 0,
                finished: false,
            });
            if entry.finished {
                return;
            }
            entry.finished = true;
        }

        state.failed += 1;
        self.maybe_complete(state);
    }

    /// Total bytes recorded so far.
    pub fn downloaded_bytes(&self) -> u64 {
        self.state.lock().downloaded_bytes()
    }

    /// Pause for the configured settle delay if the batch completed.
    ///
    /// Gives an attached renderer time to paint the final frame before the
    /// engine returns; a zero delay is a no-op.
    pub fn wait_settle(&self) {
        let completed = self.state.lock().completed_emitted;
        if completed && !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
    }

    fn publish_progress(&self, state: &AggregateState) {
        self.events.publish(&DownloadEvent::Progress {
            downloaded: state.downloaded_bytes(),
            total_bytes: state.total_known_bytes,
            percent: state.percent(),
            finished_transfers: state.finished + state.failed,
            total_transfers: state.total,
        });
    }

    fn maybe_complete(&self, state: &mut AggregateState) {
        if state.settled() && !state.completed_emitted {
            state.completed_emitted = true;
            self.events.publish(&DownloadEvent::Completed {
                succeeded: state.finished,
                failed: state.failed,
                downloaded: state.downloaded_bytes(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DeclaredSize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(id: TransferId, downloaded: u64, declared: DeclaredSize, finished: bool) -> ProgressSample {
        ProgressSample {
            id,
            downloaded,
            declared,
            finished,
        }
    }

    fn completed_counter(bus: &EventBus) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        bus.subscribe(crate::event::EventKind::Completed, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }

    #[test]
    fn test_progress_percent_from_known_bytes() {
        let events = Arc::new(EventBus::new());
        let last_percent = Arc::new(AtomicUsize::new(0));
        let percent_clone = Arc::clone(&last_percent);
        events.subscribe(crate::event::EventKind::Progress, move |event| {
            if let DownloadEvent::Progress { percent, .. } = event {
                percent_clone.store(*percent as usize, Ordering::SeqCst);
            }
        });

        let progress = BatchProgress::new(events, Duration::ZERO);
        progress.init(2, 200);

        let a = TransferId::new();
        let b = TransferId::new();
        progress.record(sample(a, 50, DeclaredSize::Known(100), false));
        assert_eq!(last_percent.load(Ordering::SeqCst), 25);

        progress.record(sample(b, 100, DeclaredSize::Known(100), true));
        assert_eq!(last_percent.load(Ordering::SeqCst), 75);
        assert_eq!(progress.downloaded_bytes(), 150);
    }

    #[test]
    fn test_progress_falls_back_to_parts_when_sizes_unknown() {
        let events = Arc::new(EventBus::new());
        let last_percent = Arc::new(AtomicUsize::new(0));
        let percent_clone = Arc::clone(&last_percent);
        events.subscribe(crate::event::EventKind::Progress, move |event| {
            if let DownloadEvent::Progress { percent, .. } = event {
                percent_clone.store(*percent as usize, Ordering::SeqCst);
            }
        });

        let progress = BatchProgress::new(events, Duration::ZERO);
        progress.init(2, 0);

        let a = TransferId::new();
        progress.record(sample(a, 500, DeclaredSize::Unknown, false));
        assert_eq!(last_percent.load(Ordering::SeqCst), 0);

        progress.record(sample(a, 1000, DeclaredSize::Unknown, true));
        assert_eq!(last_percent.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_completed_fires_exactly_once() {
        let events = Arc::new(EventBus::new());
        let completions = completed_counter(&events);

        let progress = BatchProgress::new(Arc::clone(&events), Duration::ZERO);
        progress.init(2, 20);

        let a = TransferId::new();
        let b = TransferId::new();
        progress.record(sample(a, 10, DeclaredSize::Known(10), true));
        assert_eq!(completions.load(Ordering::SeqCst), 0);

        progress.record(sample(b, 10, DeclaredSize::Known(10), true));
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        // A duplicate final tick must not re-fire COMPLETED.
        progress.record(sample(b, 10, DeclaredSize::Known(10), true));
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_close_the_completion_barrier() {
        let events = Arc::new(EventBus::new());
        let completions = completed_counter(&events);
        let outcome = Arc::new(Mutex::new((0usize, 0usize)));
        let outcome_clone = Arc::clone(&outcome);
        events.subscribe(crate::event::EventKind::Completed, move |event| {
            if let DownloadEvent::Completed {
                succeeded, failed, ..
            } = event
            {
                *outcome_clone.lock() = (*succeeded, *failed);
            }
        });

        let progress = BatchProgress::new(Arc::clone(&events), Duration::ZERO);
        progress.init(3, 30);

        let a = TransferId::new();
        let b = TransferId::new();
        progress.record(sample(a, 10, DeclaredSize::Known(10), true));
        progress.record_failure(None);
        progress.record(sample(b, 10, DeclaredSize::Known(10), true));

        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(*outcome.lock(), (2, 1));
    }

    #[test]
    fn test_downloaded_bytes_never_decrease() {
        let events = Arc::new(EventBus::new());
        let progress = BatchProgress::new(events, Duration::ZERO);
        progress.init(1, 100);

        let id = TransferId::new();
        progress.record(sample(id, 60, DeclaredSize::Known(100), false));
        // A stale lower sample must not move the sum backwards.
        progress.record(sample(id, 40, DeclaredSize::Known(100), false));

        assert_eq!(progress.downloaded_bytes(), 60);
    }

    #[test]
    fn test_concurrent_ticks_lose_no_updates() {
        use std::thread;

        let events = Arc::new(EventBus::new());
        let completions = completed_counter(&events);
        let progress = Arc::new(BatchProgress::new(Arc::clone(&events), Duration::ZERO));
        progress.init(8, 8 * 1000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let progress = Arc::clone(&progress);
                thread::spawn(move || {
                    let id = TransferId::new();
                    for step in 1..=10u64 {
                        progress.record(sample(
                            id,
                            step * 100,
                            DeclaredSize::Known(1000),
                            step == 10,
                        ));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(progress.downloaded_bytes(), 8 * 1000);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }
}
