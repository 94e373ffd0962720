//! Story arena.
//!
//! A [`Story`] is the mutable working form of a target document: a flat
//! arena of nodes linked by parent pointers and child lists (index 0 is
//! always the root). Content nodes are allocated detached and only become
//! part of the document once a slide adopts them. Serialization walks from the root, so detached nodes never
//! reach the node map.

use std::collections::HashSet;

use serde_json::{Map, Value, json};

use super::cover::{COVER_NODE_TYPE, Cover};
use super::node::ContentNode;
use super::NodeMap;
use crate::error::{Error, Result};
use crate::theme::Theme;

/// Index of a node in a [`Story`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The story root.
    pub const ROOT: NodeId = NodeId(0);
    /// The cover, created with the story.
    pub const COVER: NodeId = NodeId(1);
    /// The sidecar holding the slides.
    pub const SIDECAR: NodeId = NodeId(2);

    /// Key of this node in the serialized node map.
    pub fn key(self) -> String {
        format!("n-{}", self.0)
    }
}

/// Structural role of a story node.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryNodeKind {
    Root,
    Cover(Cover),
    Sidecar { style: String },
    Slide,
    NarrativePanel,
    Content(ContentNode),
}

#[derive(Debug, Clone)]
struct StoryNode {
    kind: StoryNodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl StoryNode {
    fn new(kind: StoryNodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A recorded structural mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// A node joined the document tree.
    Attached(NodeId),
    /// A map's deferred configuration was applied.
    Configured(NodeId),
    /// Cover fields were replaced.
    CoverSet,
}

/// The slide created by [`Story::add_slide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideRef {
    pub slide: NodeId,
    pub media: NodeId,
    pub panel: NodeId,
}

/// A story under construction.
#[derive(Debug, Clone)]
pub struct Story {
    theme: Theme,
    nodes: Vec<StoryNode>,
    journal: Vec<Mutation>,
}

impl Story {
    /// Create a story with a root, an empty cover and an empty sidecar.
    pub fn new(theme: Theme, panel_style: impl Into<String>) -> Self {
        let mut nodes = vec![
            StoryNode::new(StoryNodeKind::Root),
            StoryNode::new(StoryNodeKind::Cover(Cover::default())),
            StoryNode::new(StoryNodeKind::Sidecar {
                style: panel_style.into(),
            }),
        ];
        nodes[0].children = vec![NodeId::COVER, NodeId::SIDECAR];
        nodes[1].parent = Some(NodeId::ROOT);
        nodes[2].parent = Some(NodeId::ROOT);
        Self {
            theme,
            nodes,
            journal: Vec::new(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get a node's role.
    pub fn kind(&self, id: NodeId) -> Option<&StoryNodeKind> {
        self.nodes.get(id.0 as usize).map(|n| &n.kind)
    }

    /// Get a content node.
    pub fn content(&self, id: NodeId) -> Option<&ContentNode> {
        match self.kind(id)? {
            StoryNodeKind::Content(node) => Some(node),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0 as usize)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0 as usize)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Allocate a detached content node.
    pub fn alloc(&mut self, node: ContentNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(StoryNode::new(StoryNodeKind::Content(node)));
        id
    }

    /// Whether a node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        // Bounded walk: parent chains are a few levels deep.
        for _ in 0..self.nodes.len() {
            if current == NodeId::ROOT {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// Add a slide to the sidecar holding `media` on the main stage and
    /// `contents` in its narrative panel.
    ///
    /// All nodes must be distinct, detached content nodes.
    pub fn add_slide(&mut self, media: NodeId, contents: &[NodeId]) -> Result<SlideRef> {
        let mut seen = HashSet::with_capacity(contents.len() + 1);
        for &id in std::iter::once(&media).chain(contents) {
            if self.content(id).is_none() {
                return Err(Error::UnknownNode(id.0));
            }
            if self.parent(id).is_some() || !seen.insert(id) {
                return Err(Error::AlreadyAttached(id.0));
            }
        }

        let slide = self.push_structural(StoryNodeKind::Slide);
        let panel = self.push_structural(StoryNodeKind::NarrativePanel);

        self.link(NodeId::SIDECAR, slide);
        self.link(slide, panel);
        for &content in contents {
            self.link(panel, content);
        }
        self.link(slide, media);

        Ok(SlideRef {
            slide,
            media,
            panel,
        })
    }

    /// Apply a map's deferred configuration.
    ///
    /// Fails with [`Error::DetachedNode`] unless the map is part of the
    /// document tree. Returns whether any configuration was applied.
    pub fn configure_map(&mut self, id: NodeId) -> Result<bool> {
        match self.content(id) {
            None => return Err(Error::UnknownNode(id.0)),
            Some(node) if !node.is_map() => return Err(Error::NotAMap(id.0)),
            Some(_) => {}
        }
        if !self.is_attached(id) {
            return Err(Error::DetachedNode(id.0));
        }

        let applied = match &mut self.nodes[id.0 as usize].kind {
            StoryNodeKind::Content(ContentNode::Map(map)) => map.apply_deferred(),
            _ => false,
        };
        if applied {
            self.journal.push(Mutation::Configured(id));
        }
        Ok(applied)
    }

    /// Attached map nodes that still hold deferred configuration.
    pub fn pending_maps(&self) -> Vec<NodeId> {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(|&id| {
                self.content(id)
                    .and_then(ContentNode::as_map)
                    .is_some_and(|m| !m.is_configured())
                    && self.is_attached(id)
            })
            .collect()
    }

    pub fn cover(&self) -> &Cover {
        match &self.nodes[NodeId::COVER.0 as usize].kind {
            StoryNodeKind::Cover(cover) => cover,
            _ => unreachable!("cover slot always holds the cover"),
        }
    }

    /// Replace the cover fields.
    pub fn set_cover(&mut self, cover: Cover) {
        self.nodes[NodeId::COVER.0 as usize].kind = StoryNodeKind::Cover(cover);
        self.journal.push(Mutation::CoverSet);
    }

    /// Structural mutations in the order they happened.
    pub fn mutations(&self) -> &[Mutation] {
        &self.journal
    }

    /// Serialize the document tree into a node map.
    pub fn to_node_map(&self) -> Result<NodeMap> {
        let mut out = Map::new();
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0 as usize];
            let mut value = self.node_json(&node.kind)?;
            if !node.children.is_empty()
                && let Value::Object(obj) = &mut value
            {
                let keys = node.children.iter().map(|c| Value::String(c.key())).collect();
                obj.insert("children".to_string(), Value::Array(keys));
            }
            out.insert(id.key(), value);
            stack.extend(node.children.iter().rev());
        }
        Ok(out)
    }

    fn node_json(&self, kind: &StoryNodeKind) -> Result<Value> {
        Ok(match kind {
            StoryNodeKind::Root => json!({
                "type": "story",
                "data": {"theme": self.theme.as_str()}
            }),
            StoryNodeKind::Cover(cover) => json!({
                "type": COVER_NODE_TYPE,
                "data": serde_json::to_value(cover)?
            }),
            StoryNodeKind::Sidecar { style } => json!({
                "type": "immersive",
                "data": {"type": "sidecar", "subtype": style}
            }),
            StoryNodeKind::Slide => json!({"type": "immersive-slide"}),
            StoryNodeKind::NarrativePanel => json!({"type": "immersive-narrative-panel"}),
            StoryNodeKind::Content(ContentNode::Text(block)) => json!({
                "type": "text",
                "data": {
                    "type": block.kind.style_name(),
                    "text": block.to_html(),
                    "spans": serde_json::to_value(&block.spans)?
                }
            }),
            StoryNodeKind::Content(node) => {
                let mut data = serde_json::to_value(node)?;
                if let Value::Object(obj) = &mut data {
                    obj.remove("type");
                }
                json!({"type": node.type_name(), "data": data})
            }
        })
    }

    fn push_structural(&mut self, kind: StoryNodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(StoryNode::new(kind));
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
        self.journal.push(Mutation::Attached(child));
    }
}
