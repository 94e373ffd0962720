//! Mapping from classic colour groups to story themes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Presentation theme of a generated story or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    Summit,
    /// Dark theme.
    Obsidian,
}

impl Theme {
    /// Every theme the resolver can produce.
    pub const ALL: [Theme; 2] = [Theme::Summit, Theme::Obsidian];

    /// Platform identifier of the theme.
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Summit => "summit",
            Theme::Obsidian => "obsidian",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a classic theme colour group to a story theme.
///
/// There is no fallback: a group missing from the table is an error so the
/// table gets extended rather than silently guessed.
pub fn resolve(identifier: &str) -> Result<Theme> {
    let id = identifier.trim();
    if id.eq_ignore_ascii_case("light") {
        Ok(Theme::Summit)
    } else if id.eq_ignore_ascii_case("dark") {
        Ok(Theme::Obsidian)
    } else {
        Err(Error::UnsupportedTheme(identifier.to_string()))
    }
}
