//! Persisting, publishing and verifying documents.
//!
//! A converted story goes through
//!
//! ```text
//! Draft -> Persisted -> Published -> Verifying -> Verified
//!                                              \-> Failed(cause)
//! ```
//!
//! Verification is a human-in-the-loop step on the hosting side: after
//! publishing, the [`PublishDriver`] waits for a validation signal with a
//! timeout and then re-reads the item status. A timeout is a terminal
//! failure, never a retry; [`PublishDriver::resubmit`] restarts a failed
//! record explicitly.

pub mod fs;
pub mod memory;
mod signal;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compose::AggregateDocument;
use crate::error::{Error, Result};
use crate::model::{TargetDocument, ThumbnailRef};

pub use fs::DirectoryPlatform;
pub use memory::MemoryPlatform;
pub use signal::ValidationSignals;

/// Identifier a platform assigns to a persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::Platform(format!("invalid document id {s:?}: {e}")))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Item status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Verified,
    Failed,
}

/// Result of waiting for a validation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Completed,
    TimedOut,
}

/// Hosting platform operations.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Store a draft and assign it an id.
    async fn persist(&self, document: &TargetDocument) -> Result<DocumentId>;

    async fn publish(&self, id: &DocumentId) -> Result<()>;

    async fn fetch_item_status(&self, id: &DocumentId) -> Result<ItemStatus>;

    /// Suspend until validation of `id` completes or `timeout` elapses.
    async fn await_validation_signal(
        &self,
        id: &DocumentId,
        timeout: Duration,
    ) -> Result<ValidationOutcome>;

    async fn persist_aggregate(&self, aggregate: &AggregateDocument) -> Result<DocumentId>;

    async fn publish_aggregate(&self, id: &DocumentId) -> Result<()>;

    /// Thumbnail of an existing platform item.
    async fn fetch_thumbnail(&self, item_id: &str) -> Result<ThumbnailRef>;
}

// ============================================================================
// Records
// ============================================================================

/// Why a publication ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", content = "message", rename_all = "lowercase")]
pub enum FailureCause {
    /// No validation signal arrived in time.
    Timeout,
    /// The platform reported the item as failed.
    Rejected,
    /// Validation completed but the item is still pending.
    Unconfirmed,
    /// A platform call failed.
    Platform(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Timeout => f.write_str("validation timed out"),
            FailureCause::Rejected => f.write_str("rejected by the platform"),
            FailureCause::Unconfirmed => f.write_str("validation unconfirmed"),
            FailureCause::Platform(msg) => write!(f, "platform error: {msg}"),
        }
    }
}

impl From<Error> for FailureCause {
    fn from(e: Error) -> Self {
        match e {
            Error::PublicationTimeout { .. } => FailureCause::Timeout,
            other => FailureCause::Platform(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Persisted,
    Published,
    Verifying,
    Verified,
    Failed { cause: FailureCause },
}

impl PublicationStatus {
    pub fn name(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Persisted => "persisted",
            PublicationStatus::Published => "published",
            PublicationStatus::Verifying => "verifying",
            PublicationStatus::Verified => "verified",
            PublicationStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublicationStatus::Verified | PublicationStatus::Failed { .. }
        )
    }

    fn allows(&self, next: &PublicationStatus) -> bool {
        use PublicationStatus::*;
        matches!(
            (self, next),
            (Draft, Persisted)
                | (Persisted, Published)
                | (Published, Verifying)
                | (Verifying, Verified)
                | (Draft | Persisted | Published | Verifying, Failed { .. })
        )
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationStatus::Failed { cause } => write!(f, "failed ({cause})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Publication state of one converted entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    pub index: usize,
    pub title: String,
    pub thumbnail: ThumbnailRef,
    pub document_id: Option<DocumentId>,
    pub status: PublicationStatus,
    pub retries: u32,
    pub updated_at: DateTime<Utc>,
}

impl PublicationRecord {
    pub fn new(index: usize, document: &TargetDocument) -> Self {
        Self {
            index,
            title: document.title.clone(),
            thumbnail: document.thumbnail.clone(),
            document_id: None,
            status: PublicationStatus::Draft,
            retries: 0,
            updated_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: PublicationStatus) -> Result<()> {
        if !self.status.allows(&next) {
            return Err(Error::InvalidTransition {
                from: self.status.name(),
                to: next.name(),
            });
        }
        debug!(index = self.index, from = self.status.name(), to = next.name(), "publication transition");
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Restart a failed record from `Draft`.
    pub fn resubmit(&mut self) -> Result<()> {
        if !matches!(self.status, PublicationStatus::Failed { .. }) {
            return Err(Error::InvalidTransition {
                from: self.status.name(),
                to: PublicationStatus::Draft.name(),
            });
        }
        self.status = PublicationStatus::Draft;
        self.document_id = None;
        self.retries += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_verified(&self) -> bool {
        self.status == PublicationStatus::Verified
    }

    pub fn failure(&self) -> Option<&FailureCause> {
        match &self.status {
            PublicationStatus::Failed { cause } => Some(cause),
            _ => None,
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Runs documents through persist, publish and verification.
pub struct PublishDriver<P: ?Sized> {
    platform: Arc<P>,
    timeout: Duration,
}

impl<P: Platform + ?Sized> PublishDriver<P> {
    pub fn new(platform: Arc<P>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Publish a new document. Never fails: problems end as `Failed`.
    pub async fn submit(&self, index: usize, document: &TargetDocument) -> PublicationRecord {
        let mut record = PublicationRecord::new(index, document);
        self.drive(&mut record, document).await;
        record
    }

    /// Publish a failed record again.
    pub async fn resubmit(
        &self,
        mut record: PublicationRecord,
        document: &TargetDocument,
    ) -> Result<PublicationRecord> {
        record.resubmit()?;
        info!(index = record.index, retries = record.retries, "resubmitting");
        self.drive(&mut record, document).await;
        Ok(record)
    }

    async fn drive(&self, record: &mut PublicationRecord, document: &TargetDocument) {
        match self.run(record, document).await {
            Ok(()) => info!(index = record.index, title = %record.title, "verified"),
            Err(cause) => {
                warn!(index = record.index, title = %record.title, %cause, "publication failed");
                if let Err(e) = record.advance(PublicationStatus::Failed { cause }) {
                    warn!(index = record.index, error = %e, "could not record failure");
                }
            }
        }
    }

    async fn run(
        &self,
        record: &mut PublicationRecord,
        document: &TargetDocument,
    ) -> std::result::Result<(), FailureCause> {
        let id = self.platform.persist(document).await?;
        record.document_id = Some(id);
        record.advance(PublicationStatus::Persisted)?;

        self.platform.publish(&id).await?;
        record.advance(PublicationStatus::Published)?;

        record.advance(PublicationStatus::Verifying)?;
        match self.platform.await_validation_signal(&id, self.timeout).await? {
            ValidationOutcome::Completed => {}
            ValidationOutcome::TimedOut => {
                return Err(Error::PublicationTimeout {
                    document: id.to_string(),
                    after: self.timeout,
                }
                .into());
            }
        }

        match self.platform.fetch_item_status(&id).await? {
            ItemStatus::Verified => Ok(record.advance(PublicationStatus::Verified)?),
            ItemStatus::Failed => Err(FailureCause::Rejected),
            ItemStatus::Pending => Err(FailureCause::Unconfirmed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertOptions;
    use crate::entry::build_entry;
    use crate::legacy::{LegacyEntry, RawMedia};
    use crate::theme::Theme;
    use serde_json::json;

    fn document(title: &str) -> TargetDocument {
        let entry = LegacyEntry {
            title: title.into(),
            media: RawMedia::new("image", json!({"url": "https://x/a.png"})),
            description: "<p>text</p>".into(),
            hidden: false,
        };
        build_entry(0, &entry, Theme::Summit, &ConvertOptions::default())
            .unwrap()
            .document
    }

    #[test]
    fn test_lifecycle_transitions() {
        let doc = document("a");
        let mut record = PublicationRecord::new(0, &doc);
        assert!(record.advance(PublicationStatus::Published).is_err());
        record.advance(PublicationStatus::Persisted).unwrap();
        record.advance(PublicationStatus::Published).unwrap();
        record.advance(PublicationStatus::Verifying).unwrap();
        record.advance(PublicationStatus::Verified).unwrap();
        let err = record
            .advance(PublicationStatus::Failed {
                cause: FailureCause::Timeout,
            })
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid publication transition: verified -> failed"
        );
        assert!(record.resubmit().is_err());
    }

    #[test]
    fn test_resubmit_resets_failed() {
        let doc = document("a");
        let mut record = PublicationRecord::new(0, &doc);
        record.document_id = Some(DocumentId::new());
        record
            .advance(PublicationStatus::Failed {
                cause: FailureCause::Rejected,
            })
            .unwrap();
        assert_eq!(record.failure(), Some(&FailureCause::Rejected));
        record.resubmit().unwrap();
        assert_eq!(record.status, PublicationStatus::Draft);
        assert_eq!(record.retries, 1);
        assert!(record.document_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_verifies() {
        let platform = Arc::new(MemoryPlatform::new());
        let driver = PublishDriver::new(Arc::clone(&platform), Duration::from_secs(600));
        let record = driver.submit(0, &document("a")).await;
        assert!(record.is_verified());
        let id = record.document_id.unwrap();
        assert!(platform.is_published(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_withheld_times_out() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.withhold("slow");
        let driver = PublishDriver::new(Arc::clone(&platform), Duration::from_secs(30));
        let record = driver.submit(0, &document("slow")).await;
        assert_eq!(record.failure(), Some(&FailureCause::Timeout));
        // The draft stays behind.
        assert!(platform.document(record.document_id.unwrap()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_and_unconfirmed() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.reject("bad");
        let driver = PublishDriver::new(Arc::clone(&platform), Duration::from_secs(30));
        let record = driver.submit(0, &document("bad")).await;
        assert_eq!(record.failure(), Some(&FailureCause::Rejected));

        let manual = Arc::new(MemoryPlatform::manual());
        let driver = PublishDriver::new(Arc::clone(&manual), Duration::from_secs(30));
        let doc = document("pending");
        let submit = driver.submit(0, &doc);
        let signal = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let id = manual.document_ids()[0];
            manual.validate(id, ItemStatus::Pending).unwrap();
        };
        let (record, ()) = tokio::join!(submit, signal);
        assert_eq!(record.failure(), Some(&FailureCause::Unconfirmed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_after_timeout() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.withhold("slow");
        let driver = PublishDriver::new(Arc::clone(&platform), Duration::from_secs(30));
        let doc = document("slow");
        let failed = driver.submit(0, &doc).await;
        let first_id = failed.document_id.unwrap();

        platform.release("slow");
        let record = driver.resubmit(failed, &doc).await.unwrap();
        assert!(record.is_verified());
        assert_eq!(record.retries, 1);
        assert_ne!(record.document_id, Some(first_id));
    }
}
