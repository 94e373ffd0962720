//! Target data model.
//!
//! This module contains:
//! - Content node types produced by the media dispatcher and markup transformer
//! - The [`Story`] arena used while an entry is being built
//! - Covers, thumbnails and the cover-hiding patch
//! - [`TargetDocument`], the serialized story handed to a platform

mod cover;
mod node;
mod story;

use serde::Serialize;
use serde_json::Value;

use crate::theme::Theme;

pub use cover::{COVER_NODE_TYPE, Cover, MapExport, ThumbnailRef, hide_cover, is_cover_hidden};
pub use node::{
    AudioNode, Color, ContentNode, EmbedNode, ImageNode, LayerVisibility, MapConfig, MapNode,
    Span, SpanStyle, TextBlock, TextKind, VideoNode,
};
pub use story::{Mutation, NodeId, SlideRef, Story, StoryNodeKind};

/// Serialized story: node key to JSON node.
pub type NodeMap = serde_json::Map<String, Value>;

/// A finished story, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDocument {
    pub title: String,
    pub theme: Theme,
    pub thumbnail: ThumbnailRef,
    pub tags: Vec<String>,
    /// Key of the root node in `nodes`.
    pub root: String,
    pub nodes: NodeMap,
}

impl TargetDocument {
    /// The serialized cover node.
    pub fn cover_node(&self) -> Option<&Value> {
        self.nodes
            .values()
            .find(|n| n.get("type").and_then(Value::as_str) == Some(COVER_NODE_TYPE))
    }

    pub fn is_cover_hidden(&self) -> bool {
        is_cover_hidden(&self.nodes)
    }

    /// Nodes of the given type, in key order.
    pub fn nodes_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = &'a Value> {
        self.nodes
            .values()
            .filter(move |n| n.get("type").and_then(Value::as_str) == Some(node_type))
    }

    /// Child keys of a node.
    pub fn children_of(&self, key: &str) -> Vec<&str> {
        self.nodes
            .get(key)
            .and_then(|n| n.get("children"))
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}
