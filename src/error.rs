//! Error types for tabula operations.

use std::time::Duration;

use thiserror::Error;

use crate::entry::BuildStage;

/// Errors that can occur while converting or publishing a map series.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid legacy document: {0}")]
    InvalidLegacy(String),

    #[error("Unsupported theme: {0:?} (known: light, dark)")]
    UnsupportedTheme(String),

    #[error("Unsupported media kind: {0:?}")]
    UnsupportedMediaKind(String),

    #[error("Invalid {kind} media: {reason}")]
    InvalidMedia { kind: &'static str, reason: String },

    #[error("Unsupported layout style: {0:?} (known: tab, accordion, bullet)")]
    UnsupportedLayoutStyle(String),

    #[error("Validation of {document} timed out after {after:?}")]
    PublicationTimeout { document: String, after: Duration },

    #[error("Unknown story node {0}")]
    UnknownNode(u32),

    #[error("Node {0} is already attached")]
    AlreadyAttached(u32),

    #[error("Node {0} is not attached to a slide")]
    DetachedNode(u32),

    #[error("Node {0} is not a map")]
    NotAMap(u32),

    #[error("Invalid publication transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Cannot compose collection: {pending} publication(s) still in flight")]
    CompositionBarrier { pending: usize },

    #[error("Platform error: {0}")]
    Platform(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A fatal failure while building one entry.
///
/// Carries the entry's identity so the run can report it and move on to
/// sibling entries.
#[derive(Error, Debug)]
#[error("entry {index} ({title:?}) failed while {stage}: {source}")]
pub struct EntryBuildFailure {
    pub index: usize,
    pub title: String,
    pub stage: BuildStage,
    #[source]
    pub source: Error,
}
