//! Bounded-concurrency worker pool.
//!
//! Runs a homogeneous set of operations over OS threads in batches of the
//! pool width. Used for all three batch phases (fetch, metadata resolution,
//! transfer); metadata resolution always runs to completion before the
//! first transfer starts, so the two phases are two separate `run` calls.

use std::sync::Arc;
use std::thread;

/// Fixed-width pool of worker threads.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    /// Create a pool executing at most `width` operations at once
    /// (minimum 1).
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// The maximum number of concurrent operations.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `f` over every item, at most `width` at a time.
    ///
    /// Results come back in input order. A slot is `None` only if its
    /// worker thread panicked; a panicking worker never blocks or cancels
    /// its siblings. When the call degenerates to inline execution (one
    /// item, or a width of 1) a panic propagates to the caller instead.
    pub fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(usize, T) -> R + Send + Sync + 'static,
    {
        // One item (or a width-1 pool with one batch entry at a time)
        // degenerates to plain in-place calls.
        if self.width == 1 || items.len() <= 1 {
            return items
                .into_iter()
                .enumerate()
                .map(|(index, item)| Some(f(index, item)))
                .collect();
        }

        let f = Arc::new(f);
        let total = items.len();
        let mut results: Vec<Option<R>> = Vec::with_capacity(total);
        results.resize_with(total, || None);

        let mut items = items.into_iter().enumerate();
        let mut batch_start = 0;

        while batch_start < total {
            let batch_end = (batch_start + self.width).min(total);
            let mut handles = Vec::with_capacity(batch_end - batch_start);

            for (index, item) in items.by_ref().take(batch_end - batch_start) {
                let f = Arc::clone(&f);
                handles.push(thread::spawn(move || (index, f(index, item))));
            }

            for handle in handles {
                if let Ok((index, result)) = handle.join() {
                    results[index] = Some(result);
                }
            }

            batch_start = batch_end;
        }

        results
    }
}
