//! Grouping verified stories into a collection.

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ConvertOptions;
use crate::error::{Error, Result};
use crate::legacy::LegacyDocument;
use crate::model::ThumbnailRef;
use crate::publish::{DocumentId, PublicationRecord};
use crate::theme::Theme;

/// How the collection presents its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStyle {
    Tabbed,
    Bulleted,
}

impl LayoutStyle {
    /// Map a classic layout id. Accordions have no collection equivalent
    /// and become tabs.
    pub fn from_legacy(layout: &str) -> Result<Self> {
        match layout.trim().to_ascii_lowercase().as_str() {
            "tab" | "accordion" => Ok(LayoutStyle::Tabbed),
            "bullet" => Ok(LayoutStyle::Bulleted),
            _ => Err(Error::UnsupportedLayoutStyle(layout.to_string())),
        }
    }

    /// Platform layout identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutStyle::Tabbed => "tab",
            LayoutStyle::Bulleted => "bullet",
        }
    }
}

impl fmt::Display for LayoutStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one verified story.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateItem {
    pub document_id: DocumentId,
    pub title: String,
    pub thumbnail: ThumbnailRef,
}

/// The collection document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDocument {
    pub title: String,
    pub subtitle: Option<String>,
    pub byline: String,
    pub theme: Theme,
    pub date: NaiveDate,
    pub layout: LayoutStyle,
    /// Left unset when the classic item's thumbnail could not be fetched.
    pub thumbnail: Option<ThumbnailRef>,
    pub tags: Vec<String>,
    pub items: Vec<AggregateItem>,
}

impl AggregateDocument {
    pub fn document_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.items.iter().map(|item| item.document_id)
    }
}

/// Build the collection from finished publication records.
///
/// Every record must be terminal. Verified records are included in entry
/// order, failed ones are left out.
pub fn compose(
    legacy: &LegacyDocument,
    theme: Theme,
    records: &[PublicationRecord],
    thumbnail: Option<ThumbnailRef>,
    options: &ConvertOptions,
) -> Result<AggregateDocument> {
    let pending = records.iter().filter(|r| !r.status.is_terminal()).count();
    if pending > 0 {
        return Err(Error::CompositionBarrier { pending });
    }
    let layout = LayoutStyle::from_legacy(&legacy.layout)?;

    let mut ordered: Vec<&PublicationRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.index);

    let items: Vec<AggregateItem> = ordered
        .into_iter()
        .filter(|r| r.is_verified())
        .filter_map(|r| {
            let Some(document_id) = r.document_id else {
                debug!(index = r.index, "verified record without a document id");
                return None;
            };
            Some(AggregateItem {
                document_id,
                title: r.title.clone(),
                thumbnail: r.thumbnail.clone(),
            })
        })
        .collect();

    info!(
        included = items.len(),
        skipped = records.len() - items.len(),
        %layout,
        "collection composed"
    );

    Ok(AggregateDocument {
        title: legacy.title.clone(),
        subtitle: legacy.subtitle.clone(),
        byline: options.collection_byline.clone(),
        theme,
        date: Utc::now().date_naive(),
        layout,
        thumbnail,
        tags: options.tags.clone(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::LegacyTheme;
    use crate::publish::{FailureCause, PublicationStatus};
    use proptest::prelude::*;

    fn legacy(layout: &str) -> LegacyDocument {
        LegacyDocument {
            item_id: Some("classic".into()),
            title: "Series".into(),
            subtitle: None,
            layout: layout.into(),
            panel_position: None,
            theme: LegacyTheme::default(),
            maps_sync: false,
            entries: Vec::new(),
        }
    }

    fn record(index: usize, status: PublicationStatus) -> PublicationRecord {
        PublicationRecord {
            index,
            title: format!("Entry {index}"),
            thumbnail: ThumbnailRef::Default,
            document_id: Some(DocumentId::new()),
            status,
            retries: 0,
            updated_at: Utc::now(),
        }
    }

    fn failed() -> PublicationStatus {
        PublicationStatus::Failed {
            cause: FailureCause::Timeout,
        }
    }

    #[test]
    fn test_layout_mapping() {
        assert_eq!(LayoutStyle::from_legacy("accordion").unwrap(), LayoutStyle::Tabbed);
        assert_eq!(LayoutStyle::from_legacy("tab").unwrap(), LayoutStyle::Tabbed);
        assert_eq!(LayoutStyle::from_legacy("bullet").unwrap(), LayoutStyle::Bulleted);
        assert!(matches!(
            LayoutStyle::from_legacy("carousel"),
            Err(Error::UnsupportedLayoutStyle(_))
        ));
    }

    #[test]
    fn test_barrier() {
        let records = vec![
            record(0, PublicationStatus::Verified),
            record(1, PublicationStatus::Verifying),
        ];
        let err = compose(
            &legacy("tab"),
            Theme::Summit,
            &records,
            None,
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::CompositionBarrier { pending: 1 }));
    }

    #[test]
    fn test_items_in_entry_order() {
        let records = vec![
            record(2, PublicationStatus::Verified),
            record(0, PublicationStatus::Verified),
            record(1, failed()),
        ];
        let aggregate = compose(
            &legacy("accordion"),
            Theme::Obsidian,
            &records,
            Some(ThumbnailRef::Item {
                item_id: "classic".into(),
            }),
            &ConvertOptions::default(),
        )
        .unwrap();
        let titles: Vec<_> = aggregate.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Entry 0", "Entry 2"]);
        assert_eq!(aggregate.layout, LayoutStyle::Tabbed);
        assert_eq!(aggregate.title, "Series");
        assert_eq!(aggregate.tags.len(), 2);
        assert!(aggregate.thumbnail.is_some());
    }

    #[test]
    fn test_unsupported_layout_fails() {
        let err = compose(
            &legacy("shortlist"),
            Theme::Summit,
            &[],
            None,
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedLayoutStyle(_)));
    }

    proptest! {
        #[test]
        fn prop_includes_exactly_verified(verified in proptest::collection::vec(any::<bool>(), 0..12)) {
            let records: Vec<_> = verified
                .iter()
                .enumerate()
                .map(|(i, &ok)| record(i, if ok { PublicationStatus::Verified } else { failed() }))
                .collect();
            let aggregate = compose(
                &legacy("bullet"),
                Theme::Summit,
                &records,
                None,
                &ConvertOptions::default(),
            )
            .unwrap();
            let expected: Vec<_> = records
                .iter()
                .filter(|r| r.is_verified())
                .filter_map(|r| r.document_id)
                .collect();
            let included: Vec<_> = aggregate.document_ids().collect();
            prop_assert_eq!(included, expected);
        }
    }
}
