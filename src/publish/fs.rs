//! Platform backed by a local directory.
//!
//! Each story is written to `<root>/stories/<id>.json` and the collection to
//! `<root>/collection-<id>.json`. Publishing runs a scripted validation
//! pass over the written file in place of a human reviewer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use super::{DocumentId, ItemStatus, Platform, ValidationOutcome, ValidationSignals};
use crate::compose::AggregateDocument;
use crate::error::{Error, Result};
use crate::model::{TargetDocument, ThumbnailRef, is_cover_hidden};

#[derive(Debug)]
pub struct DirectoryPlatform {
    root: PathBuf,
    statuses: Mutex<HashMap<DocumentId, ItemStatus>>,
    signals: ValidationSignals,
}

impl DirectoryPlatform {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            statuses: Mutex::new(HashMap::new()),
            signals: ValidationSignals::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn story_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join("stories").join(format!("{id}.json"))
    }

    pub fn collection_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!("collection-{id}.json"))
    }

    async fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

/// Check a written story the way a reviewer would: it must re-read as a
/// node map whose root exists and whose cover is hidden.
fn review(bytes: &[u8]) -> Result<ItemStatus> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Some(nodes) = value.get("nodes").and_then(Value::as_object) else {
        return Ok(ItemStatus::Failed);
    };
    let root_present = value
        .get("root")
        .and_then(Value::as_str)
        .is_some_and(|root| nodes.contains_key(root));
    Ok(if root_present && is_cover_hidden(nodes) {
        ItemStatus::Verified
    } else {
        ItemStatus::Failed
    })
}

#[async_trait]
impl Platform for DirectoryPlatform {
    async fn persist(&self, document: &TargetDocument) -> Result<DocumentId> {
        let id = DocumentId::new();
        let path = self.story_path(&id);
        Self::write_json(&path, document).await?;
        self.statuses.lock().insert(id, ItemStatus::Pending);
        debug!(document = %id, path = %path.display(), "story written");
        Ok(id)
    }

    async fn publish(&self, id: &DocumentId) -> Result<()> {
        let bytes = tokio::fs::read(self.story_path(id)).await?;
        let status = review(&bytes)?;
        self.statuses.lock().insert(*id, status);
        self.signals.complete(*id);
        Ok(())
    }

    async fn fetch_item_status(&self, id: &DocumentId) -> Result<ItemStatus> {
        self.statuses
            .lock()
            .get(id)
            .copied()
            .ok_or_else(|| Error::Platform(format!("unknown document {id}")))
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
        let path = self.collection_path(&id);
        Self::write_json(&path, aggregate).await?;
        info!(path = %path.display(), "collection written");
        Ok(id)
    }

    async fn publish_aggregate(&self, id: &DocumentId) -> Result<()> {
        let path = self.collection_path(id);
        if tokio::fs::try_exists(&path).await? {
            Ok(())
        } else {
            Err(Error::Platform(format!("collection {id} was never persisted")))
        }
    }

    /// Items live on the hosting side; the thumbnail is passed by reference.
    async fn fetch_thumbnail(&self, item_id: &str) -> Result<ThumbnailRef> {
        if item_id.trim().is_empty() {
            return Err(Error::Platform("empty item id".to_string()));
        }
        Ok(ThumbnailRef::Item {
            item_id: item_id.to_string(),
        })
    }
}
