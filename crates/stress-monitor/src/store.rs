//! Latest result store
//!
//! A single slot holding the most recent stress result. There is exactly one
//! [`ResultWriter`]; any number of [`ResultReader`]s. Values are replaced
//! wholesale, so a reader sees either the previous or the new result in full.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::StressResult;

/// Result stored by a completed capture cycle
#[derive(Debug, Clone, PartialEq)]
pub struct LatestResult {
    pub result: StressResult,
    pub produced_at: DateTime<Utc>,
}

type Slot = Option<Arc<LatestResult>>;

/// Factory for the writer/reader pair
pub struct ResultStore;

impl ResultStore {
    /// Create an empty store
    pub fn channel() -> (ResultWriter, ResultReader) {
        let (tx, rx) = watch::channel(None);
        (ResultWriter { tx }, ResultReader { rx })
    }
}

/// Exclusive write handle. Not `Clone`.
#[derive(Debug)]
pub struct ResultWriter {
    tx: watch::Sender<Slot>,
}

impl ResultWriter {
    /// Replace the stored result
    pub fn publish(&self, result: StressResult) {
        self.tx.send_replace(Some(Arc::new(LatestResult {
            result,
            produced_at: Utc::now(),
        })));
    }

    /// Create another reader of this store
    pub fn reader(&self) -> ResultReader {
        ResultReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Shared read handle. Reads never block the writer.
#[derive(Debug, Clone)]
pub struct ResultReader {
    rx: watch::Receiver<Slot>,
}

impl ResultReader {
    /// Most recent result, or `None` before the first capture cycle completes.
    /// Keeps returning the last value after the writer is gone.
    pub fn latest(&self) -> Option<Arc<LatestResult>> {
        self.rx.borrow().clone()
    }
}
