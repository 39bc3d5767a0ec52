//! Optional progress reporting for the concurrent fetch and extraction loops.
//!
//! The scraper and the batch runner call into a [`Progress`] observer as each
//! task completes. Nothing in the pipelines depends on what the observer does,
//! so `--quiet` simply swaps in [`Silent`].

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Observer notified as concurrent tasks complete.
pub trait Progress: Sync {
    /// A stage with `total` tasks is about to run.
    fn start(&self, _stage: &str, _total: usize) {}

    /// One task in `stage` finished; `label` identifies the item.
    fn item(&self, _stage: &str, _label: &str, _ok: bool) {}

    /// All tasks in `stage` have finished.
    fn finish(&self, _stage: &str) {}
}

/// Drops every notification.
#[derive(Debug, Default)]
pub struct Silent;

impl Progress for Silent {}

/// Reports progress as `tracing` events with a `done/total` counter.
#[derive(Debug, Default)]
pub struct LogProgress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl Progress for LogProgress {
    fn start(&self, stage: &str, total: usize) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        info!(stage, total, "Started");
    }

    fn item(&self, stage: &str, label: &str, ok: bool) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        if ok {
            debug!(stage, done, total, item = %label, "Item done");
        } else {
            warn!(stage, done, total, item = %label, "Item failed");
        }
    }

    fn finish(&self, stage: &str) {
        info!(
            stage,
            done = self.done.load(Ordering::Relaxed),
            total = self.total.load(Ordering::Relaxed),
            "Finished"
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Progress;
    use std::sync::Mutex;

    /// Records every `item` call for assertions.
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub items: Mutex<Vec<(String, bool)>>,
    }

    impl Progress for Recorder {
        fn item(&self, _stage: &str, label: &str, ok: bool) {
            self.items.lock().unwrap().push((label.to_string(), ok));
        }
    }

    impl Recorder {
        pub fn failures(&self) -> Vec<String> {
            self.items
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, ok)| !ok)
                .map(|(label, _)| label.clone())
                .collect()
        }
    }
}
