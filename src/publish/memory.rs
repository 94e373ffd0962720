//! In-process platform.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{DocumentId, ItemStatus, Platform, ValidationOutcome, ValidationSignals};
use crate::compose::AggregateDocument;
use crate::error::{Error, Result};
use crate::model::{TargetDocument, ThumbnailRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validation {
    /// Publishing validates immediately.
    Automatic,
    /// Validation happens only through [`MemoryPlatform::validate`].
    Manual,
}

#[derive(Debug)]
struct Stored {
    document: TargetDocument,
    status: ItemStatus,
    published: bool,
}

#[derive(Debug, Default)]
struct State {
    order: Vec<DocumentId>,
    documents: HashMap<DocumentId, Stored>,
    aggregates: Vec<(DocumentId, AggregateDocument, bool)>,
    withheld: HashSet<String>,
    rejected: HashSet<String>,
    thumbnails: HashMap<String, ThumbnailRef>,
}

/// A platform that keeps everything in memory.
///
/// Validation can be automatic (publishing verifies at once) or manual.
/// Documents can be singled out by title: withheld documents never get a
/// validation signal, rejected ones are reported as failed.
#[derive(Debug)]
pub struct MemoryPlatform {
    validation: Validation,
    state: Mutex<State>,
    signals: ValidationSignals,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::with_validation(Validation::Automatic)
    }

    /// A platform that validates only when told to.
    pub fn manual() -> Self {
        Self::with_validation(Validation::Manual)
    }

    fn with_validation(validation: Validation) -> Self {
        Self {
            validation,
            state: Mutex::new(State::default()),
            signals: ValidationSignals::new(),
        }
    }

    /// Never signal validation for documents with this title.
    pub fn withhold(&self, title: impl Into<String>) {
        self.state.lock().withheld.insert(title.into());
    }

    pub fn release(&self, title: &str) {
        self.state.lock().withheld.remove(title);
    }

    /// Report documents with this title as failed.
    pub fn reject(&self, title: impl Into<String>) {
        self.state.lock().rejected.insert(title.into());
    }

    pub fn set_thumbnail(&self, item_id: impl Into<String>, thumbnail: ThumbnailRef) {
        self.state.lock().thumbnails.insert(item_id.into(), thumbnail);
    }

    /// Finish validation of `id` with `status`.
    pub fn validate(&self, id: DocumentId, status: ItemStatus) -> Result<()> {
        {
            let mut state = self.state.lock();
            let stored = state
                .documents
                .get_mut(&id)
                .ok_or_else(|| unknown(id))?;
            stored.status = status;
        }
        self.signals.complete(id);
        Ok(())
    }

    /// Ids of persisted documents, oldest first.
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.state.lock().order.clone()
    }

    pub fn document(&self, id: DocumentId) -> Option<TargetDocument> {
        self.state.lock().documents.get(&id).map(|s| s.document.clone())
    }

    pub fn is_published(&self, id: DocumentId) -> bool {
        self.state
            .lock()
            .documents
            .get(&id)
            .is_some_and(|s| s.published)
    }

    /// The most recently persisted aggregate and whether it was published.
    pub fn aggregate(&self) -> Option<(DocumentId, AggregateDocument, bool)> {
        self.state.lock().aggregates.last().cloned()
    }
}

fn unknown(id: DocumentId) -> Error {
    Error::Platform(format!("unknown document {id}"))
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn persist(&self, document: &TargetDocument) -> Result<DocumentId> {
        let id = DocumentId::new();
        let mut state = self.state.lock();
        state.order.push(id);
        state.documents.insert(
            id,
            Stored {
                document: document.clone(),
                status: ItemStatus::Pending,
                published: false,
            },
        );
        debug!(document = %id, title = %document.title, "persisted");
        Ok(id)
    }

    async fn publish(&self, id: &DocumentId) -> Result<()> {
        let signal = {
            let mut state = self.state.lock();
            let withheld = &state.withheld;
            let rejected = &state.rejected;
            let stored = state.documents.get(id).ok_or_else(|| unknown(*id))?;
            let title = stored.document.title.clone();
            let signal = self.validation == Validation::Automatic && !withheld.contains(&title);
            let status = if rejected.contains(&title) {
                ItemStatus::Failed
            } else {
                ItemStatus::Verified
            };
            if let Some(stored) = state.documents.get_mut(id) {
                stored.published = true;
                if signal {
                    stored.status = status;
                }
            }
            signal
        };
        if signal {
            self.signals.complete(*id);
        }
        Ok(())
    }

    async fn fetch_item_status(&self, id: &DocumentId) -> Result<ItemStatus> {
        self.state
            .lock()
            .documents
            .get(id)
            .map(|s| s.status)
            .ok_or_else(|| unknown(*id))
    }

    async fn await_validation_signal(
        &self,
        id: &DocumentId,
        timeout: Duration,
    ) -> Result<ValidationOutcome> {
        Ok(self.signals.wait(*id, timeout).await)
    }

    async fn persist_aggregate(&self, aggregate: &AggregateDocument) -> Result<DocumentId> {
        let id = DocumentId::new();
        self.state
            .lock()
            .aggregates
            .push((id, aggregate.clone(), false));
        Ok(id)
    }

    async fn publish_aggregate(&self, id: &DocumentId) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state
            .aggregates
            .iter_mut()
            .find(|(aid, _, _)| aid == id)
            .ok_or_else(|| unknown(*id))?;
        entry.2 = true;
        Ok(())
    }

    async fn fetch_thumbnail(&self, item_id: &str) -> Result<ThumbnailRef> {
        self.state
            .lock()
            .thumbnails
            .get(item_id)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("no thumbnail for item {item_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeMap;
    use crate::theme::Theme;

    fn doc(title: &str) -> TargetDocument {
        TargetDocument {
            title: title.into(),
            theme: Theme::Summit,
            thumbnail: ThumbnailRef::Default,
            tags: Vec::new(),
            root: "n-0".into(),
            nodes: NodeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_automatic_validation() {
        let platform = MemoryPlatform::new();
        let id = platform.persist(&doc("a")).await.unwrap();
        assert_eq!(platform.fetch_item_status(&id).await.unwrap(), ItemStatus::Pending);
        platform.publish(&id).await.unwrap();
        assert_eq!(platform.fetch_item_status(&id).await.unwrap(), ItemStatus::Verified);
        assert_eq!(
            platform
                .await_validation_signal(&id, Duration::ZERO)
                .await
                .unwrap(),
            ValidationOutcome::Completed
        );
        assert!(platform.signals.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_validation() {
        let platform = MemoryPlatform::manual();
        let id = platform.persist(&doc("a")).await.unwrap();
        platform.publish(&id).await.unwrap();
        assert_eq!(
            platform
                .await_validation_signal(&id, Duration::from_secs(1))
                .await
                .unwrap(),
            ValidationOutcome::TimedOut
        );
        platform.validate(id, ItemStatus::Failed).unwrap();
        assert_eq!(platform.fetch_item_status(&id).await.unwrap(), ItemStatus::Failed);
        assert!(platform.validate(DocumentId::new(), ItemStatus::Verified).is_err());
    }

    #[tokio::test]
    async fn test_unknown_document_and_thumbnail() {
        let platform = MemoryPlatform::new();
        assert!(platform.publish(&DocumentId::new()).await.is_err());
        assert!(platform.fetch_thumbnail("abc").await.is_err());
        platform.set_thumbnail("abc", ThumbnailRef::Item { item_id: "abc".into() });
        assert_eq!(
            platform.fetch_thumbnail("abc").await.unwrap(),
            ThumbnailRef::Item { item_id: "abc".into() }
        );
    }
}
