//! Side panel HTML to content nodes.
//!
//! Classic side panels are free-form HTML written in a rich text editor.
//! [`transform`] parses a panel with html5ever into an arena DOM and walks
//! it in document order, producing one content node per text block or
//! media element:
//!
//! - `p`, `h1`-`h6`, `li`, `blockquote`, `pre` and loose inline runs become
//!   text nodes whose spans carry bold, italic, colour and link
//! - `img`/`figure` become images, `iframe`/`embed` become maps (viewer
//!   URLs with a `webmap` parameter) or embeds, `video`/`audio` become
//!   video and audio nodes
//! - media inside a paragraph splits it around the media node
//! - anything else is dropped with a [`RecoveryWarning`]
//!
//! # Example
//!
//! ```
//! use tabula::markup;
//! use tabula::model::ContentNode;
//!
//! let out = markup::transform("<p>Hello <b>world</b></p><table></table>");
//! assert_eq!(out.nodes.len(), 1);
//! assert_eq!(out.warnings.len(), 1);
//! let ContentNode::Text(block) = &out.nodes[0] else { unreachable!() };
//! assert_eq!(block.plain_text(), "Hello world");
//! ```

pub mod arena;
pub mod inline;
mod tree_sink;
mod walk;

use std::fmt;

use serde::Serialize;

pub use inline::{InlineContext, InlineStyle, SpanBuffer, named_color, parse_color_value};
pub use tree_sink::parse;

use crate::model::ContentNode;

/// A non-fatal problem found while transforming a side panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecoveryWarning {
    /// An element with no story equivalent was dropped.
    UnsupportedElement { tag: String },
    /// A media element without a usable source was dropped.
    MissingSource { tag: String },
}

impl fmt::Display for RecoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryWarning::UnsupportedElement { tag } => {
                write!(f, "dropped unsupported <{tag}> element")
            }
            RecoveryWarning::MissingSource { tag } => {
                write!(f, "dropped <{tag}> without a source")
            }
        }
    }
}

/// Content nodes of a side panel, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupOutput {
    pub nodes: Vec<ContentNode>,
    pub warnings: Vec<RecoveryWarning>,
}

/// Transform a side panel HTML fragment into content nodes.
///
/// Never fails: malformed markup is repaired by the parser and unsupported
/// elements are reported as warnings.
pub fn transform(html: &str) -> MarkupOutput {
    let (dom, parse_errors) = parse(html);
    if parse_errors > 0 {
        tracing::debug!(parse_errors, "repaired malformed side panel markup");
    }

    let mut walker = walk::Walker::new(&dom);
    let html_el = dom.find_tag(dom.document(), "html");
    if let Some(head) = html_el.and_then(|h| dom.children(h).find(|&c| dom.is_tag(c, "head"))) {
        walker.scan_head(head);
    }
    if let Some(body) = dom.find_tag(dom.document(), "body") {
        walker.walk_children(body, &InlineContext::default());
    }

    let (nodes, warnings) = walker.finish();
    MarkupOutput { nodes, warnings }
}
