//! Input buffering for date-range edits
//!
//! Raw edits go in; a committed range comes out only after no further edit
//! arrived for the debounce delay. Re-committing the range that was committed
//! last is suppressed.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::DateRange;

const COMMITTED_BUFFER: usize = 16;

pub struct RangeDebouncer {
    edits: mpsc::UnboundedSender<DateRange>,
    task: JoinHandle<()>,
}

impl RangeDebouncer {
    /// Start the buffering task; committed ranges arrive on the returned receiver
    pub fn spawn(delay: Duration) -> (Self, mpsc::Receiver<DateRange>) {
        let (edits, edit_rx) = mpsc::unbounded_channel();
        let (committed_tx, committed_rx) = mpsc::channel(COMMITTED_BUFFER);
        let task = tokio::spawn(debounce(delay, edit_rx, committed_tx));
        (Self { edits, task }, committed_rx)
    }

    /// Record an edit; returns false once the buffering task has stopped
    pub fn edit(&self, range: DateRange) -> bool {
        self.edits.send(range).is_ok()
    }

    /// Stop accepting edits, flush the pending one, and wait for the task
    ///
    /// Returns false when the buffering task did not run to completion.
    pub async fn finish(self) -> bool {
        drop(self.edits);
        match self.task.await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "range debouncer task ended abnormally");
                false
            }
        }
    }
}

async fn debounce(
    delay: Duration,
    mut edits: mpsc::UnboundedReceiver<DateRange>,
    committed: mpsc::Sender<DateRange>,
) {
    let mut last_committed: Option<DateRange> = None;

    while let Some(mut pending) = edits.recv().await {
        let mut closed = false;
        loop {
            tokio::select! {
                next = edits.recv() => match next {
                    Some(range) => pending = range,
                    None => {
                        closed = true;
                        break;
                    }
                },
                _ = tokio::time::sleep(delay) => break,
            }
        }

        if last_committed != Some(pending) {
            debug!(range = %pending, "date range committed");
            if committed.send(pending).await.is_err() {
                return;
            }
            last_committed = Some(pending);
        }
        if closed {
            return;
        }
    }
}
