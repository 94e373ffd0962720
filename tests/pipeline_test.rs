//! End-to-end conversion tests against in-memory and directory platforms.
//!
//! The fixture is a three-entry accordion series: a web map with a saved
//! extent and a hidden layer, an image whose side panel contains a table,
//! and a hidden video entry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tabula::compose::LayoutStyle;
use tabula::pipeline::EntryOutcome;
use tabula::publish::{DirectoryPlatform, FailureCause, MemoryPlatform, PublicationStatus};
use tabula::{ConvertOptions, Converter, LegacyDocument, Theme};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn load_series() -> LegacyDocument {
    let bytes = std::fs::read(format!("{FIXTURES_DIR}/series.json")).expect("Failed to read fixture");
    LegacyDocument::from_slice(&bytes).expect("Failed to parse fixture")
}

fn options() -> ConvertOptions {
    ConvertOptions {
        verify_timeout_secs: 600,
        max_concurrent_entries: 2,
        ..Default::default()
    }
}

// ============================================================================
// Mixed outcome run
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_and_degraded_entry() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.withhold("Yangtze");
    let converter = Converter::new(Arc::clone(&platform), options());

    let started = tokio::time::Instant::now();
    let report = converter.run(&load_series()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(600));

    assert_eq!(report.theme, Theme::Obsidian);
    assert_eq!(report.layout, LayoutStyle::Tabbed);
    assert_eq!(report.entries.len(), 3);

    assert!(report.entries[0].is_verified());
    assert!(report.entries[0].warnings.is_empty());

    // Degraded: the table is dropped, the rest of the panel survives.
    assert!(report.entries[1].is_verified());
    assert_eq!(report.entries[1].warnings.len(), 1);
    assert_eq!(
        report.entries[1].warnings[0].to_string(),
        "dropped unsupported <table> element"
    );

    let third = report.entries[2].record().unwrap();
    assert_eq!(
        third.status,
        PublicationStatus::Failed {
            cause: FailureCause::Timeout
        }
    );

    let titles: Vec<_> = report
        .aggregate
        .items
        .iter()
        .map(|i| i.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Nile", "Amazon"]);
    assert_eq!(report.verified_count(), 2);
    assert_eq!(report.failures().count(), 1);

    // The timed-out draft was persisted but is not in the collection.
    assert_eq!(platform.document_ids().len(), 3);
    let aggregate_ids: Vec<_> = report.aggregate.document_ids().collect();
    assert!(!aggregate_ids.contains(&third.document_id.unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_hidden_entries_are_included() {
    let platform = Arc::new(MemoryPlatform::new());
    let converter = Converter::new(Arc::clone(&platform), options());
    let legacy = load_series();
    assert!(legacy.entries[2].hidden);

    let report = converter.run(&legacy).await.unwrap();
    assert_eq!(report.aggregate.items.len(), 3);
    assert_eq!(report.aggregate.items[2].title, "Yangtze");
    assert_eq!(
        report.aggregate.subtitle.as_deref(),
        Some("Five great rivers and the lands they shape")
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_entry_is_left_out() {
    let platform = Arc::new(MemoryPlatform::new());
    platform.reject("Amazon");
    let converter = Converter::new(Arc::clone(&platform), options());

    let report = converter.run(&load_series()).await.unwrap();
    match &report.entries[1].outcome {
        EntryOutcome::Published { record } => {
            assert_eq!(record.failure(), Some(&FailureCause::Rejected));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.aggregate.items.len(), 2);
}

// ============================================================================
// Story content
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_webmap_story_content() {
    let platform = Arc::new(MemoryPlatform::new());
    let converter = Converter::new(Arc::clone(&platform), options());
    let report = converter.run(&load_series()).await.unwrap();

    let id = report.entries[0].record().unwrap().document_id.unwrap();
    let doc = platform.document(id).unwrap();
    assert!(doc.is_cover_hidden());
    assert_eq!(doc.tags, ConvertOptions::default().tags);

    let map = doc.nodes_of_type("webmap").next().unwrap();
    let viewpoint = &map["data"]["viewpoint"];
    assert_eq!(viewpoint["xmin"].as_f64(), Some(0.0));
    assert_eq!(viewpoint["ymin"].as_f64(), Some(0.0));
    assert_eq!(viewpoint["xmax"].as_f64(), Some(10.0));
    assert_eq!(viewpoint["ymax"].as_f64(), Some(10.0));
    let layers = map["data"]["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0]["id"], "irrigation");
    assert_eq!(layers[0]["visible"], false);

    // Bold and linked italic text stay in one paragraph.
    let paragraph = doc
        .nodes_of_type("text")
        .find(|n| n["data"]["type"] == "paragraph")
        .unwrap();
    let spans = paragraph["data"]["spans"].as_array().unwrap();
    let text: String = spans.iter().filter_map(|s| s["text"].as_str()).collect();
    assert_eq!(text, "The Nile flows north through eleven countries.");
    assert!(spans.iter().any(|s| s["link"] == "https://en.wikipedia.org/wiki/Nile"));

    let bullets = doc
        .nodes_of_type("text")
        .filter(|n| n["data"]["type"] == "bullet-list")
        .count();
    assert_eq!(bullets, 2);
}

#[tokio::test(start_paused = true)]
async fn test_image_and_figure_content() {
    let platform = Arc::new(MemoryPlatform::new());
    let converter = Converter::new(Arc::clone(&platform), options());
    let report = converter.run(&load_series()).await.unwrap();

    let amazon = platform
        .document(report.entries[1].record().unwrap().document_id.unwrap())
        .unwrap();
    let image = amazon.nodes_of_type("image").next().unwrap();
    assert_eq!(image["data"]["src"], "https://static.example.org/amazon.jpg");
    assert_eq!(image["data"]["alt"], "Amazon basin from above");
    assert_eq!(amazon.cover_node().unwrap()["data"]["media"]["kind"], "url");

    let yangtze = platform
        .document(report.entries[2].record().unwrap().document_id.unwrap())
        .unwrap();
    assert_eq!(yangtze.nodes_of_type("video").count(), 1);
    let figure = yangtze.nodes_of_type("image").next().unwrap();
    assert_eq!(figure["data"]["caption"], "Spillway at full flow");
    assert_eq!(figure["data"]["alt"], "Dam spillway");
}

// ============================================================================
// Directory platform
// ============================================================================

#[tokio::test]
async fn test_directory_platform_run() {
    let dir = tempfile::tempdir().unwrap();
    let platform = Arc::new(DirectoryPlatform::new(dir.path()));
    let converter = Converter::new(Arc::clone(&platform), options());
    let report = converter.run(&load_series()).await.unwrap();

    assert_eq!(report.verified_count(), 3);
    assert_eq!(
        report.aggregate.thumbnail,
        Some(tabula::model::ThumbnailRef::Item {
            item_id: "9f3c1a2b4d5e6f708192a3b4c5d6e7f8".into()
        })
    );

    let stories = std::fs::read_dir(dir.path().join("stories")).unwrap().count();
    assert_eq!(stories, 3);

    let collection = platform.collection_path(&report.aggregate_id);
    let written: Value = serde_json::from_slice(&std::fs::read(collection).unwrap()).unwrap();
    assert_eq!(written["layout"], "tabbed");
    assert_eq!(written["items"].as_array().unwrap().len(), 3);
    assert_eq!(written["theme"], "obsidian");
}
