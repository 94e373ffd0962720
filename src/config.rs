//! Conversion options.
//!
//! Options come from built-in defaults, optionally overridden by a TOML
//! file, optionally overridden again by command-line flags. Every field has
//! a default, so an empty file is a valid configuration.
//!
//! ```toml
//! verify_timeout_secs = 900
//! max_concurrent_entries = 2
//! tags = ["Field Guide"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tags applied to every converted story and the collection.
pub const DEFAULT_TAGS: [&str; 2] = ["Classic Story Map to AGSM Conversion", "Story Map Series"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertOptions {
    /// How long to wait for each story's validation signal.
    pub verify_timeout_secs: u64,

    /// Upper bound on entries converted and published at once.
    pub max_concurrent_entries: usize,

    /// Sidecar subtype of every story.
    pub panel_style: String,

    pub tags: Vec<String>,

    pub cover_byline: String,

    /// Cover date; `none` hides it.
    pub cover_date: String,

    pub collection_byline: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            verify_timeout_secs: 600,
            max_concurrent_entries: 4,
            panel_style: "docked-panel".to_string(),
            tags: DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
            cover_byline: String::new(),
            cover_date: "none".to_string(),
            collection_byline: String::new(),
        }
    }
}

impl ConvertOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let options: ConvertOptions =
            toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_entries == 0 {
            return Err(Error::Config(
                "max_concurrent_entries must be at least 1".to_string(),
            ));
        }
        if self.panel_style.trim().is_empty() {
            return Err(Error::Config("panel_style must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}
