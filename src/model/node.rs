//! Content node types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::Extent;

/// A piece of story content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentNode {
    Text(TextBlock),
    Image(ImageNode),
    Map(MapNode),
    Embed(EmbedNode),
    Video(VideoNode),
    Audio(AudioNode),
}

impl ContentNode {
    /// Platform node type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ContentNode::Text(_) => "text",
            ContentNode::Image(_) => "image",
            ContentNode::Map(_) => "webmap",
            ContentNode::Embed(_) => "embed",
            ContentNode::Video(_) => "video",
            ContentNode::Audio(_) => "audio",
        }
    }

    pub fn as_text(&self) -> Option<&TextBlock> {
        match self {
            ContentNode::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageNode> {
        match self {
            ContentNode::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            ContentNode::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapNode> {
        match self {
            ContentNode::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ContentNode::Map(_))
    }
}

// ============================================================================
// Text
// ============================================================================

/// Block-level role of a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextKind {
    #[default]
    Paragraph,
    Heading(u8),
    Quote,
    BulletItem,
    NumberedItem,
}

impl TextKind {
    /// Platform text style name.
    pub fn style_name(self) -> &'static str {
        match self {
            TextKind::Paragraph => "paragraph",
            TextKind::Heading(1) => "h2",
            TextKind::Heading(2) => "h3",
            TextKind::Heading(_) => "h4",
            TextKind::Quote => "quote",
            TextKind::BulletItem => "bullet-list",
            TextKind::NumberedItem => "numbered-list",
        }
    }
}

/// RGB colour of a text span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Upper-case `RRGGBB` without a leading `#`.
    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Text colour class understood by the story renderer.
    pub fn class_name(self) -> String {
        format!("sm-text-color-{}", self.hex())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

/// Inline style shared by every character of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SpanStyle {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// A run of text with uniform style and link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(flatten)]
    pub style: SpanStyle,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
            style: SpanStyle::default(),
        }
    }
}

/// A block of styled text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TextBlock {
    pub kind: TextKind,
    pub spans: Vec<Span>,
}

impl TextBlock {
    /// Concatenated text of all spans.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    /// Render the spans as the HTML subset the story renderer accepts.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            let mut inner = crate::util::escape_html(&span.text).replace('\n', "<br>");
            if span.style.italic {
                inner = format!("<em>{inner}</em>");
            }
            if span.style.bold {
                inner = format!("<strong>{inner}</strong>");
            }
            if let Some(color) = span.style.color {
                inner = format!("<span class=\"{}\">{inner}</span>", color.class_name());
            }
            if let Some(link) = &span.link {
                inner = format!(
                    "<a href=\"{}\" rel=\"noopener noreferrer\" target=\"_blank\">{inner}</a>",
                    crate::util::escape_html(link)
                );
            }
            out.push_str(&inner);
        }
        out
    }
}

// ============================================================================
// Media
// ============================================================================

/// An image with optional accessibility and caption data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageNode {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl ImageNode {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: None,
            caption: None,
            link: None,
        }
    }
}

/// Visibility override for one operational layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerVisibility {
    pub id: String,
    pub visible: bool,
}

/// Map configuration that may only be applied once the map is attached.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MapConfig {
    pub viewpoint: Option<Extent>,
    pub layers: Vec<LayerVisibility>,
}

impl MapConfig {
    pub fn is_empty(&self) -> bool {
        self.viewpoint.is_none() && self.layers.is_empty()
    }
}

/// A web map.
///
/// Viewpoint and layer overrides are held back in `deferred` until the story
/// attaches the node; see [`crate::model::Story::configure_map`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapNode {
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewpoint: Option<Extent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerVisibility>,
    #[serde(skip)]
    pub(crate) deferred: Option<MapConfig>,
}

impl MapNode {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            alt: None,
            caption: None,
            viewpoint: None,
            layers: Vec::new(),
            deferred: None,
        }
    }

    /// Hold `config` until the node is attached.
    pub fn with_deferred(mut self, config: MapConfig) -> Self {
        self.deferred = (!config.is_empty()).then_some(config);
        self
    }

    /// Configuration still waiting for attachment.
    pub fn deferred(&self) -> Option<&MapConfig> {
        self.deferred.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.deferred.is_none()
    }

    /// Move deferred configuration onto the node. Returns whether anything
    /// was applied.
    pub(crate) fn apply_deferred(&mut self) -> bool {
        let Some(config) = self.deferred.take() else {
            return false;
        };
        if let Some(extent) = config.viewpoint {
            self.viewpoint = Some(extent);
        }
        for layer in config.layers {
            match self.layers.iter_mut().find(|l| l.id == layer.id) {
                Some(existing) => existing.visible = layer.visible,
                None => self.layers.push(layer),
            }
        }
        true
    }

    /// Layers marked hidden.
    pub fn hidden_layers(&self) -> impl Iterator<Item = &LayerVisibility> {
        self.layers.iter().filter(|l| !l.visible)
    }
}

/// An embedded web page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedNode {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// A video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoNode {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// An audio clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioNode {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}
