//! End-to-end conversion of a map series.
//!
//! [`Converter::run`] validates the series-level settings, builds and
//! publishes every entry concurrently, waits for all of them to reach a
//! terminal state, then composes and publishes the collection.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::compose::{self, AggregateDocument, LayoutStyle};
use crate::config::ConvertOptions;
use crate::entry::{BuildStage, build_entry};
use crate::error::Result;
use crate::legacy::{LegacyDocument, LegacyEntry};
use crate::markup::RecoveryWarning;
use crate::model::ThumbnailRef;
use crate::publish::{DocumentId, Platform, PublicationRecord, PublishDriver};
use crate::theme::{self, Theme};

/// What happened to one entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum EntryOutcome {
    /// The story could not be built; nothing was persisted.
    BuildFailed { stage: BuildStage, error: String },
    /// The story was built and went through publication.
    Published { record: PublicationRecord },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub index: usize,
    pub title: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
    pub warnings: Vec<RecoveryWarning>,
}

impl EntryReport {
    pub fn record(&self) -> Option<&PublicationRecord> {
        match &self.outcome {
            EntryOutcome::Published { record } => Some(record),
            EntryOutcome::BuildFailed { .. } => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.record().is_some_and(PublicationRecord::is_verified)
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReport {
    pub title: String,
    pub theme: Theme,
    pub layout: LayoutStyle,
    pub entries: Vec<EntryReport>,
    pub aggregate: AggregateDocument,
    pub aggregate_id: DocumentId,
}

impl ConversionReport {
    pub fn verified_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_verified()).count()
    }

    /// Entries that were not verified.
    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| !e.is_verified())
    }

    pub fn warning_count(&self) -> usize {
        self.entries.iter().map(|e| e.warnings.len()).sum()
    }
}

/// Converts map series against one platform.
pub struct Converter<P: ?Sized> {
    platform: Arc<P>,
    options: ConvertOptions,
}

impl<P: Platform + ?Sized> Converter<P> {
    pub fn new(platform: Arc<P>, options: ConvertOptions) -> Self {
        Self { platform, options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert `legacy` into stories and a collection.
    ///
    /// Fails before anything is persisted when the theme or layout style is
    /// unsupported. Individual entry failures are reported, not returned.
    pub async fn run(&self, legacy: &LegacyDocument) -> Result<ConversionReport> {
        self.options.validate()?;
        let theme = theme::resolve(&legacy.theme.group)?;
        let layout = LayoutStyle::from_legacy(&legacy.layout)?;
        info!(
            title = %legacy.title,
            entries = legacy.entries.len(),
            %theme,
            %layout,
            "converting series"
        );

        let driver = PublishDriver::new(Arc::clone(&self.platform), self.options.verify_timeout());
        let entries: Vec<EntryReport> = stream::iter(legacy.entries.iter().enumerate())
            .map(|(index, entry)| self.convert_entry(&driver, index, entry, theme))
            .buffered(self.options.max_concurrent_entries)
            .collect()
            .await;

        let records: Vec<PublicationRecord> =
            entries.iter().filter_map(EntryReport::record).cloned().collect();
        let thumbnail = self.classic_thumbnail(legacy).await;
        let aggregate = compose::compose(legacy, theme, &records, thumbnail, &self.options)?;

        let aggregate_id = self.platform.persist_aggregate(&aggregate).await?;
        self.platform.publish_aggregate(&aggregate_id).await?;
        info!(
            collection = %aggregate_id,
            stories = aggregate.items.len(),
            of = entries.len(),
            "collection published"
        );

        Ok(ConversionReport {
            title: legacy.title.clone(),
            theme,
            layout,
            entries,
            aggregate,
            aggregate_id,
        })
    }

    async fn convert_entry(
        &self,
        driver: &PublishDriver<P>,
        index: usize,
        entry: &LegacyEntry,
        theme: Theme,
    ) -> EntryReport {
        let built = match build_entry(index, entry, theme, &self.options) {
            Ok(built) => built,
            Err(failure) => {
                warn!(
                    index,
                    title = %failure.title,
                    stage = %failure.stage,
                    error = %failure.source,
                    "entry skipped"
                );
                return EntryReport {
                    index,
                    title: failure.title,
                    outcome: EntryOutcome::BuildFailed {
                        stage: failure.stage,
                        error: failure.source.to_string(),
                    },
                    warnings: Vec::new(),
                };
            }
        };

        let record = driver.submit(index, &built.document).await;
        EntryReport {
            index,
            title: built.document.title,
            outcome: EntryOutcome::Published { record },
            warnings: built.warnings,
        }
    }

    /// The classic item's thumbnail, if it can be had.
    async fn classic_thumbnail(&self, legacy: &LegacyDocument) -> Option<ThumbnailRef> {
        let item_id = legacy.item_id.as_deref()?;
        match self.platform.fetch_thumbnail(item_id).await {
            Ok(thumbnail) => Some(thumbnail),
            Err(e) => {
                warn!(item = item_id, error = %e, "collection thumbnail left unset");
                None
            }
        }
    }
}
