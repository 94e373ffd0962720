//! Story covers, thumbnails, and the cover-hiding patch.

use serde::Serialize;
use serde_json::Value;

use super::NodeMap;
use crate::geo::Extent;

/// Node type of the cover in a serialized story.
pub const COVER_NODE_TYPE: &str = "storycover";

/// Where a document's thumbnail comes from.
///
/// Thumbnails are references, not images: fetching or rendering them is the
/// hosting platform's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ThumbnailRef {
    /// An image at a URL.
    Url { url: String },
    /// The stored thumbnail of a platform item.
    Item { item_id: String },
    /// A rendered export of a web map.
    MapExport(MapExport),
    /// The converter's default thumbnail.
    Default,
}

/// Parameters of a map export used as a thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExport {
    pub webmap_id: String,
    pub extent: Extent,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

/// Header of a story.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cover {
    pub title: String,
    pub byline: String,
    pub date: String,
    #[serde(rename = "media", skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailRef>,
}

/// Hide the cover of a serialized story.
///
/// The story construction API has no hide operation for covers, so the flag
/// is injected directly into the `storycover` node's config. Applying the
/// patch again leaves the node unchanged. Returns whether a cover was found.
pub fn hide_cover(nodes: &mut NodeMap) -> bool {
    let mut found = false;
    for node in nodes.values_mut() {
        if node.get("type").and_then(Value::as_str) != Some(COVER_NODE_TYPE) {
            continue;
        }
        let Some(obj) = node.as_object_mut() else {
            continue;
        };
        let config = obj
            .entry("config")
            .or_insert_with(|| Value::Object(Default::default()));
        if !config.is_object() {
            *config = Value::Object(Default::default());
        }
        if let Some(config) = config.as_object_mut() {
            config.insert("isHidden".to_string(), Value::Bool(true));
        }
        found = true;
    }
    found
}

/// Whether the serialized cover carries the hidden flag.
pub fn is_cover_hidden(nodes: &NodeMap) -> bool {
    nodes.values().any(|node| {
        node.get("type").and_then(Value::as_str) == Some(COVER_NODE_TYPE)
            && node.pointer("/config/isHidden") == Some(&Value::Bool(true))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn node_map(value: Value) -> NodeMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_hide_cover_sets_flag() {
        let mut nodes = node_map(json!({
            "n-0": {"type": "story", "children": ["n-1"]},
            "n-1": {"type": "storycover", "data": {"title": "T"}}
        }));
        assert!(!is_cover_hidden(&nodes));
        assert!(hide_cover(&mut nodes));
        assert!(is_cover_hidden(&nodes));
        assert_eq!(nodes["n-1"]["data"]["title"], "T");
        assert_eq!(nodes["n-0"], json!({"type": "story", "children": ["n-1"]}));
    }

    #[test]
    fn test_hide_cover_keeps_other_config() {
        let mut nodes = node_map(json!({
            "c": {"type": "storycover", "config": {"size": "full"}}
        }));
        hide_cover(&mut nodes);
        assert_eq!(nodes["c"]["config"], json!({"size": "full", "isHidden": true}));
    }

    #[test]
    fn test_hide_cover_without_cover() {
        let mut nodes = node_map(json!({"a": {"type": "text"}}));
        let before = nodes.clone();
        assert!(!hide_cover(&mut nodes));
        assert_eq!(nodes, before);
    }

    proptest! {
        #[test]
        fn prop_hide_cover_is_idempotent(
            title in "\\PC{0,16}",
            config in prop_oneof![
                Just(Value::Null),
                Just(json!("bogus")),
                Just(json!({})),
                Just(json!({"isHidden": false})),
                Just(json!({"size": "small"})),
            ],
        ) {
            let mut once = node_map(json!({
                "n-1": {"type": "storycover", "data": {"title": title}, "config": config},
                "n-2": {"type": "text"}
            }));
            hide_cover(&mut once);
            let mut twice = once.clone();
            hide_cover(&mut twice);
            prop_assert_eq!(&once, &twice);
            prop_assert!(is_cover_hidden(&twice));
        }
    }
}
