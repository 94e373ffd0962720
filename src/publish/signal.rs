//! Validation completion board.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use super::{DocumentId, ValidationOutcome};

/// Per-document completion flags.
///
/// Each document gets a `watch` channel the first time it is either
/// completed or waited on, so a completion that arrives before anyone
/// waits is still observed by the later wait.
#[derive(Debug, Default)]
pub struct ValidationSignals {
    channels: Mutex<HashMap<DocumentId, watch::Sender<bool>>>,
}

impl ValidationSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark validation of `id` as finished and wake its waiter.
    pub fn complete(&self, id: DocumentId) {
        let mut channels = self.channels.lock();
        channels
            .entry(id)
            .or_insert_with(|| watch::channel(false).0)
            .send_replace(true);
        debug!(document = %id, "validation signalled");
    }

    pub fn is_complete(&self, id: DocumentId) -> bool {
        self.channels
            .lock()
            .get(&id)
            .is_some_and(|tx| *tx.borrow())
    }

    /// Wait until `id` is completed or `timeout` elapses.
    ///
    /// The channel is dropped once the wait resolves either way; a later
    /// `complete` starts a fresh one for the next wait.
    pub async fn wait(&self, id: DocumentId, timeout: Duration) -> ValidationOutcome {
        // Lock is released before awaiting.
        let mut rx = {
            let mut channels = self.channels.lock();
            channels
                .entry(id)
                .or_insert_with(|| watch::channel(false).0)
                .subscribe()
        };
        let outcome = match tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await {
            Ok(Ok(_)) => ValidationOutcome::Completed,
            Ok(Err(_)) => {
                debug!(document = %id, "validation channel closed");
                ValidationOutcome::TimedOut
            }
            Err(_) => ValidationOutcome::TimedOut,
        };
        drop(rx);
        self.forget(id);
        outcome
    }

    /// Drop the channel of a document nobody will wait on again.
    pub fn forget(&self, id: DocumentId) {
        self.channels.lock().remove(&id);
    }

    /// Number of documents with a live channel.
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_completion_before_wait_is_kept() {
        let signals = ValidationSignals::new();
        let id = DocumentId::new();
        signals.complete(id);
        assert!(signals.is_complete(id));
        assert_eq!(
            signals.wait(id, Duration::from_secs(1)).await,
            ValidationOutcome::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let signals = ValidationSignals::new();
        let id = DocumentId::new();
        let started = tokio::time::Instant::now();
        assert_eq!(
            signals.wait(id, Duration::from_secs(600)).await,
            ValidationOutcome::TimedOut
        );
        assert!(started.elapsed() >= Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_wakes_waiter() {
        let signals = Arc::new(ValidationSignals::new());
        let id = DocumentId::new();
        let waiter = {
            let signals = Arc::clone(&signals);
            tokio::spawn(async move { signals.wait(id, Duration::from_secs(60)).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        signals.complete(id);
        assert_eq!(waiter.await.unwrap(), ValidationOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_documents_do_not_wake() {
        let signals = ValidationSignals::new();
        let (a, b) = (DocumentId::new(), DocumentId::new());
        signals.complete(a);
        assert!(!signals.is_complete(b));
        assert_eq!(
            signals.wait(b, Duration::from_millis(10)).await,
            ValidationOutcome::TimedOut
        );
        signals.forget(a);
        assert!(!signals.is_complete(a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_waits_release_channels() {
        let signals = ValidationSignals::new();
        let (done, late) = (DocumentId::new(), DocumentId::new());
        signals.complete(done);
        signals.wait(done, Duration::from_secs(1)).await;
        signals.wait(late, Duration::from_secs(1)).await;
        assert!(signals.is_empty());

        // A resubmitted document signals again on a fresh channel.
        signals.complete(late);
        assert_eq!(
            signals.wait(late, Duration::from_secs(1)).await,
            ValidationOutcome::Completed
        );
        assert!(signals.is_empty());
    }
}
