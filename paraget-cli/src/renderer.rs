//! Terminal progress rendering.
//!
//! The renderer is an ordinary event-bus subscriber; the engine knows
//! nothing about it. STARTED creates the bar (sized by the batch byte total
//! when one is known, a spinner otherwise), PROGRESS moves it, COMPLETED
//! finishes it.

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

use paraget::{format_bytes, DownloadEvent, EventBus};

/// Progress-bar subscriber for one engine call.
pub struct ProgressRenderer {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl ProgressRenderer {
    /// Subscribe a renderer to the given bus.
    pub fn attach(events: &Arc<EventBus>) -> Self {
        let bar = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&bar);

        events.subscribe_all(move |event| match event {
            DownloadEvent::Started { total_bytes, .. } => {
                *slot.lock().unwrap() = Some(make_bar(*total_bytes));
            }
            DownloadEvent::Progress {
                downloaded,
                total_bytes,
                finished_transfers,
                total_transfers,
                ..
            } => {
                if let Some(bar) = slot.lock().unwrap().as_ref() {
                    bar.set_position(*downloaded);
                    bar.set_message(progress_message(
                        *downloaded,
                        *total_bytes,
                        *finished_transfers,
                        *total_transfers,
                    ));
                }
            }
            DownloadEvent::Completed { downloaded, .. } => {
                if let Some(bar) = slot.lock().unwrap().take() {
                    bar.finish_with_message(format!("[{}]", format_bytes(*downloaded)));
                }
            }
        });

        Self { bar }
    }
}

impl Drop for ProgressRenderer {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

fn make_bar(total_bytes: u64) -> ProgressBar {
    if total_bytes > 0 {
        let bar = ProgressBar::new(total_bytes);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .expect("progress template is valid")
            .progress_chars("=>-"),
        );
        bar
    } else {
        // No Content-Length anywhere in the batch.
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("spinner template is valid"),
        );
        bar
    }
}

fn progress_message(
    downloaded: u64,
    total_bytes: u64,
    finished_transfers: usize,
    total_transfers: usize,
) -> String {
    let bytes = if total_bytes > 0 {
        format!("[{}/{}]", format_bytes(downloaded), format_bytes(total_bytes))
    } else {
        format!("[{}]", format_bytes(downloaded))
    };

    if total_transfers > 1 {
        format!("{} ({}/{})", bytes, finished_transfers, total_transfers)
    } else {
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_message_with_totals() {
        assert_eq!(
            progress_message(1024, 4096, 1, 3),
            "[1.00 KB/4.00 KB] (1/3)"
        );
    }

    #[test]
    fn test_progress_message_unknown_total() {
        assert_eq!(progress_message(2048, 0, 0, 1), "[2.00 KB]");
    }
}
