//! Classic map series documents.
//!
//! The classic item data is loosely typed JSON. This module reads the parts
//! the converter needs into [`LegacyDocument`] and leaves each entry's
//! main-stage payload as raw JSON for the media dispatcher to interpret.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Title used when the classic series has none.
pub const UNTITLED_SERIES: &str = "Untitled Classic StoryMap Series";

/// A classic map series, read once and not modified afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyDocument {
    /// Item id of the classic series, when known.
    pub item_id: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    /// Raw layout id (`tab`, `accordion`, `bullet`).
    pub layout: String,
    pub panel_position: Option<String>,
    pub theme: LegacyTheme,
    /// Whether all maps in the series share one extent.
    pub maps_sync: bool,
    pub entries: Vec<LegacyEntry>,
}

/// Classic theme descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyTheme {
    /// Display name of the classic colour scheme.
    pub name: Option<String>,
    /// Colour group (`light` or `dark`).
    pub group: String,
}

/// One tab, bullet or accordion item.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyEntry {
    pub title: String,
    pub media: RawMedia,
    /// Side panel HTML.
    pub description: String,
    pub hidden: bool,
}

/// A main-stage descriptor: kind tag plus that kind's payload.
///
/// Classic entries look like `{"type": "webmap", "webmap": {...}}`; the
/// payload is the object stored under the tag's own key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawMedia {
    pub kind: Option<String>,
    pub payload: Value,
}

impl RawMedia {
    /// Build a descriptor from a kind tag and its payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: Some(kind.into()),
            payload,
        }
    }

    fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(obj)) = value else {
            return Self::default();
        };
        let kind = obj.get("type").and_then(Value::as_str).map(str::to_string);
        let payload = kind
            .as_deref()
            .and_then(|k| obj.get(k))
            .cloned()
            .unwrap_or(Value::Null);
        Self { kind, payload }
    }

    /// Kind tag, or an empty string when the descriptor has none.
    pub fn tag(&self) -> &str {
        self.kind.as_deref().unwrap_or("")
    }

    fn webmap_extent(&self) -> Option<&Value> {
        if self.tag() != "webmap" {
            return None;
        }
        self.payload.get("extent").filter(|v| !v.is_null())
    }
}

/// Short description of a series used by `tabula inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub title: String,
    pub subtitle: Option<String>,
    pub layout: String,
    pub panel_position: Option<String>,
    pub theme_name: Option<String>,
    pub theme_group: String,
    pub entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub title: String,
    pub media_kind: String,
    pub hidden: bool,
}

impl LegacyDocument {
    /// Parse classic item data from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse classic item data from raw bytes of any common encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_json(&crate::util::decode_text(bytes, None))
    }

    /// Parse classic item data.
    pub fn from_value(data: &Value) -> Result<Self> {
        let values = data
            .get("values")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::InvalidLegacy("missing \"values\" object".to_string()))?;

        let title = str_at(values, &["title"])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED_SERIES)
            .to_string();
        let subtitle = crate::util::non_empty(str_at(values, &["subtitle"]));

        let layout = str_at(values, &["settings", "layout", "id"])
            .unwrap_or_default()
            .to_string();
        let panel_position =
            str_at(values, &["settings", "layoutOptions", "panel", "position"]).map(String::from);
        let theme = LegacyTheme {
            name: str_at(values, &["settings", "theme", "colors", "name"]).map(String::from),
            group: str_at(values, &["settings", "theme", "colors", "group"])
                .unwrap_or_default()
                .to_string(),
        };
        let maps_sync = value_at(values, &["settings", "mapOptions", "mapsSync"])
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut entries: Vec<LegacyEntry> = value_at(values, &["story", "entries"])
            .and_then(Value::as_array)
            .map(|list| list.iter().map(parse_entry).collect())
            .unwrap_or_default();

        if maps_sync {
            fill_missing_extents(&mut entries);
        }

        Ok(Self {
            item_id: data
                .get("itemId")
                .or_else(|| data.get("id"))
                .and_then(Value::as_str)
                .map(String::from),
            title,
            subtitle,
            layout,
            panel_position,
            theme,
            maps_sync,
            entries,
        })
    }

    /// Attach the classic item id (known to the caller, not the item data).
    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn summary(&self) -> Summary {
        Summary {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            layout: self.layout.clone(),
            panel_position: self.panel_position.clone(),
            theme_name: self.theme.name.clone(),
            theme_group: self.theme.group.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| EntrySummary {
                    title: e.title.clone(),
                    media_kind: e.media.tag().to_string(),
                    hidden: e.hidden,
                })
                .collect(),
        }
    }
}

fn parse_entry(value: &Value) -> LegacyEntry {
    LegacyEntry {
        title: value
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        media: RawMedia::from_value(value.get("media")),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        hidden: value
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("hidden")),
    }
}

/// With synced maps, a webmap entry without an extent inherits its
/// neighbour's: the previous entry first, then the next one.
fn fill_missing_extents(entries: &mut [LegacyEntry]) {
    for i in 0..entries.len() {
        let media = &entries[i].media;
        if media.tag() != "webmap" || media.webmap_extent().is_some() {
            continue;
        }
        let inherited = i
            .checked_sub(1)
            .and_then(|prev| entries[prev].media.webmap_extent())
            .or_else(|| entries.get(i + 1).and_then(|e| e.media.webmap_extent()))
            .cloned();
        if let Some(extent) = inherited
            && let Value::Object(payload) = &mut entries[i].media.payload
        {
            payload.insert("extent".to_string(), extent);
        }
    }
}

fn value_at<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(root.get(*first)?, |v, key| v.get(key))
}

fn str_at<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a str> {
    value_at(root, path).and_then(Value::as_str)
}
