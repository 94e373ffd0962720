//! # tabula
//!
//! Converts classic tabbed, bulleted and accordion map series into one
//! story per entry plus a collection that groups them.
//!
//! ## Features
//!
//! - Reads classic series item data (any common text encoding)
//! - Maps main-stage media (web maps, images, web pages, video) to story
//!   nodes and thumbnails
//! - Turns free-form side panel HTML into styled text and media nodes,
//!   dropping what has no equivalent with a warning
//! - Applies map viewpoints and layer visibility only after the map is
//!   placed on a slide
//! - Publishes every story, waits for validation with a timeout, and builds
//!   the collection from the verified ones
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula::{ConvertOptions, Converter, LegacyDocument};
//! use tabula::publish::DirectoryPlatform;
//!
//! # async fn run() -> tabula::Result<()> {
//! let legacy = LegacyDocument::from_slice(&std::fs::read("series.json")?)?;
//! let platform = Arc::new(DirectoryPlatform::new("out"));
//! let report = Converter::new(platform, ConvertOptions::default())
//!     .run(&legacy)
//!     .await?;
//! println!("{} of {} stories verified", report.verified_count(), report.entries.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Building a single story
//!
//! ```
//! use serde_json::json;
//! use tabula::{ConvertOptions, Theme, build_entry};
//! use tabula::legacy::{LegacyEntry, RawMedia};
//!
//! let entry = LegacyEntry {
//!     title: "Delta".into(),
//!     media: RawMedia::new("webmap", json!({"id": "abc123"})),
//!     description: "<p>Where the river meets the sea.</p>".into(),
//!     hidden: false,
//! };
//! let built = build_entry(0, &entry, Theme::Summit, &ConvertOptions::default()).unwrap();
//! assert_eq!(built.document.nodes_of_type("webmap").count(), 1);
//! ```

pub mod compose;
pub mod config;
pub mod entry;
pub mod error;
pub mod geo;
pub mod legacy;
pub mod markup;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod theme;
pub(crate) mod util;

pub use compose::{AggregateDocument, LayoutStyle};
pub use config::ConvertOptions;
pub use entry::{BuiltEntry, build_entry};
pub use error::{EntryBuildFailure, Error, Result};
pub use legacy::LegacyDocument;
pub use model::TargetDocument;
pub use pipeline::{ConversionReport, Converter};
pub use theme::Theme;
