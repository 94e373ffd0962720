//! Recursive walk from the fragment DOM to content nodes.

use std::collections::HashSet;

use percent_encoding::percent_decode_str;

use super::RecoveryWarning;
use super::arena::{DomId, FragmentDom};
use super::inline::{InlineContext, SpanBuffer};
use crate::geo::Extent;
use crate::model::{
    AudioNode, ContentNode, EmbedNode, ImageNode, MapConfig, MapNode, TextBlock, TextKind,
    VideoNode,
};
use crate::util::{non_empty, upgrade_https};

/// How the walk treats an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    /// Formatting that only changes the inline context.
    Inline,
    /// `<br>`
    Break,
    /// A block whose content becomes one text node.
    TextBlock,
    /// A structural wrapper whose children are walked in place.
    Container,
    /// Ends the current block without producing anything.
    Separator,
    Media,
    /// Dropped with a warning; the current block ends.
    UnsupportedBlock,
    /// Dropped with a warning; the current block continues.
    UnsupportedInline,
}

fn classify(tag: &str) -> Class {
    match tag {
        "a" | "abbr" | "b" | "bdi" | "bdo" | "big" | "cite" | "code" | "data" | "del" | "dfn"
        | "em" | "font" | "i" | "ins" | "kbd" | "label" | "mark" | "q" | "s" | "samp"
        | "small" | "span" | "strike" | "strong" | "sub" | "sup" | "time" | "tt" | "u"
        | "var" => Class::Inline,
        "br" => Class::Break,
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "blockquote" | "pre" | "dt"
        | "dd" | "address" | "figcaption" => Class::TextBlock,
        "html" | "body" | "div" | "section" | "article" | "header" | "footer" | "main"
        | "aside" | "nav" | "center" | "ul" | "ol" | "dl" | "figure" | "details" | "summary"
        | "hgroup" => Class::Container,
        "hr" | "wbr" => Class::Separator,
        "img" | "iframe" | "embed" | "video" | "audio" => Class::Media,
        "script" | "style" | "noscript" | "template" | "link" | "meta" => {
            Class::UnsupportedInline
        }
        _ => Class::UnsupportedBlock,
    }
}

const MEDIA_TAGS: &[&str] = &["img", "iframe", "embed", "video", "audio"];

/// Walks one fragment, accumulating nodes and warnings.
pub(super) struct Walker<'a> {
    dom: &'a FragmentDom,
    nodes: Vec<ContentNode>,
    warnings: Vec<RecoveryWarning>,
    buffer: SpanBuffer,
    kind: TextKind,
    /// Figcaptions already used as a media caption.
    consumed: HashSet<DomId>,
}

impl<'a> Walker<'a> {
    pub(super) fn new(dom: &'a FragmentDom) -> Self {
        Self {
            dom,
            nodes: Vec::new(),
            warnings: Vec::new(),
            buffer: SpanBuffer::new(),
            kind: TextKind::Paragraph,
            consumed: HashSet::new(),
        }
    }

    pub(super) fn finish(mut self) -> (Vec<ContentNode>, Vec<RecoveryWarning>) {
        self.flush();
        (self.nodes, self.warnings)
    }

    /// Report elements html5ever hoisted into `<head>`.
    pub(super) fn scan_head(&mut self, head: DomId) {
        for child in self.dom.children(head) {
            if let Some(tag) = self.dom.tag(child) {
                self.warnings.push(RecoveryWarning::UnsupportedElement {
                    tag: tag.to_string(),
                });
            }
        }
    }

    pub(super) fn walk_children(&mut self, parent: DomId, ctx: &InlineContext) {
        for child in self.dom.children(parent) {
            self.visit(child, ctx);
        }
    }

    fn visit(&mut self, id: DomId, ctx: &InlineContext) {
        let dom = self.dom;
        if let Some(text) = dom.text(id) {
            self.buffer.push_text(text, ctx);
            return;
        }
        let Some(tag) = dom.tag(id) else {
            return;
        };
        if self.consumed.contains(&id) {
            return;
        }

        match classify(tag) {
            Class::Inline => {
                let inner = ctx.enter(dom, id);
                self.walk_children(id, &inner);
            }
            Class::Break => self.buffer.push_break(ctx),
            Class::TextBlock => self.text_block(id, tag, ctx),
            Class::Container => {
                if tag == "figure" {
                    self.claim_figcaption(id);
                }
                self.flush();
                let inner = ctx.enter(dom, id);
                self.walk_children(id, &inner);
                self.flush();
            }
            Class::Separator => self.flush(),
            Class::Media => {
                self.flush();
                if let Some(node) = self.media(id, tag, ctx) {
                    self.nodes.push(node);
                }
            }
            Class::UnsupportedBlock => {
                self.flush();
                self.unsupported(tag);
            }
            Class::UnsupportedInline => self.unsupported(tag),
        }
    }

    fn text_block(&mut self, id: DomId, tag: &str, ctx: &InlineContext) {
        let kind = match tag {
            "h1" => TextKind::Heading(1),
            "h2" => TextKind::Heading(2),
            "h3" => TextKind::Heading(3),
            "h4" => TextKind::Heading(4),
            "h5" => TextKind::Heading(5),
            "h6" => TextKind::Heading(6),
            "blockquote" => TextKind::Quote,
            "li" => match self.dom.parent(id).and_then(|p| self.dom.tag(p)) {
                Some("ol") => TextKind::NumberedItem,
                _ => TextKind::BulletItem,
            },
            // Paragraphs inside a quote or list item keep the outer role.
            _ => self.kind,
        };

        self.flush();
        let outer = std::mem::replace(&mut self.kind, kind);
        let inner = ctx.enter(self.dom, id);
        self.walk_children(id, &inner);
        self.flush();
        self.kind = outer;
    }

    /// End the current text block.
    fn flush(&mut self) {
        let spans = self.buffer.take();
        if !spans.is_empty() {
            self.nodes.push(ContentNode::Text(TextBlock {
                kind: self.kind,
                spans,
            }));
        }
    }

    fn unsupported(&mut self, tag: &str) {
        self.warnings.push(RecoveryWarning::UnsupportedElement {
            tag: tag.to_string(),
        });
    }

    fn missing_source(&mut self, tag: &str) -> Option<ContentNode> {
        self.warnings.push(RecoveryWarning::MissingSource {
            tag: tag.to_string(),
        });
        None
    }

    fn media(&mut self, id: DomId, tag: &str, ctx: &InlineContext) -> Option<ContentNode> {
        let alt = non_empty(self.dom.attr(id, "alt"))
            .or_else(|| non_empty(self.dom.attr(id, "title")));
        match tag {
            "img" => {
                let Some(src) = self.dom.attr_trimmed(id, "src") else {
                    return self.missing_source(tag);
                };
                Some(ContentNode::Image(ImageNode {
                    src: upgrade_https(src),
                    alt,
                    caption: self.caption_for(id),
                    link: ctx.link.clone(),
                }))
            }
            "iframe" | "embed" => {
                let Some(src) = self
                    .dom
                    .attr_trimmed(id, "src")
                    .or_else(|| self.dom.attr_trimmed(id, "data-src"))
                else {
                    return self.missing_source(tag);
                };
                let caption = self.caption_for(id);
                Some(match embedded_map(src) {
                    Some(mut map) => {
                        map.alt = alt;
                        map.caption = caption;
                        ContentNode::Map(map)
                    }
                    None => ContentNode::Embed(EmbedNode {
                        url: upgrade_https(src),
                        alt,
                        caption,
                    }),
                })
            }
            "video" | "audio" => {
                let src = self.dom.attr_trimmed(id, "src").or_else(|| {
                    self.dom
                        .children(id)
                        .filter(|&c| self.dom.is_tag(c, "source"))
                        .find_map(|c| self.dom.attr_trimmed(c, "src"))
                });
                let Some(src) = src.map(upgrade_https) else {
                    return self.missing_source(tag);
                };
                let caption = self.caption_for(id);
                Some(if tag == "video" {
                    ContentNode::Video(VideoNode { src, alt, caption })
                } else {
                    ContentNode::Audio(AudioNode { src, alt, caption })
                })
            }
            _ => None,
        }
    }

    /// Caption of a media element: the enclosing figure's figcaption, or a
    /// figcaption that follows the element inside the same container.
    fn caption_for(&mut self, id: DomId) -> Option<String> {
        let caption = match self.dom.ancestor(id, "figure") {
            Some(figure) => self
                .dom
                .children(figure)
                .find(|&c| self.dom.is_tag(c, "figcaption")),
            None => {
                let parent = self.dom.parent(id).filter(|&p| !self.dom.is_tag(p, "body"))?;
                let mut after = false;
                self.dom.children(parent).find(|&c| {
                    if c == id || self.dom.descendants(c).contains(&id) {
                        after = true;
                        return false;
                    }
                    after && self.dom.is_tag(c, "figcaption")
                })
            }
        }?;
        self.consumed.insert(caption);
        collapse(&self.dom.text_content(caption))
    }

    /// A figure holding media uses its figcaption as the caption, even when
    /// the caption is written first.
    fn claim_figcaption(&mut self, figure: DomId) {
        if !self.dom.contains_any(figure, MEDIA_TAGS) {
            return;
        }
        for child in self.dom.children(figure) {
            if self.dom.is_tag(child, "figcaption") {
                self.consumed.insert(child);
            }
        }
    }
}

fn collapse(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// A map viewer URL: its `webmap` query parameter names the map, and an
/// optional `extent=xmin,ymin,xmax,ymax` (WGS84) becomes the deferred
/// viewpoint.
fn embedded_map(src: &str) -> Option<MapNode> {
    let query = src.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);

    let mut webmap = None;
    let mut extent = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = percent_decode_str(&value.replace('+', " "))
            .decode_utf8_lossy()
            .trim()
            .to_string();
        match key.to_ascii_lowercase().as_str() {
            "webmap" if !value.is_empty() => webmap = Some(value),
            "extent" => extent = Extent::parse_bbox(&value),
            _ => {}
        }
    }

    Some(MapNode::new(webmap?).with_deferred(MapConfig {
        viewpoint: extent,
        layers: Vec::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("strong"), Class::Inline);
        assert_eq!(classify("h3"), Class::TextBlock);
        assert_eq!(classify("center"), Class::Container);
        assert_eq!(classify("iframe"), Class::Media);
        assert_eq!(classify("table"), Class::UnsupportedBlock);
        assert_eq!(classify("o:p"), Class::UnsupportedBlock);
        assert_eq!(classify("script"), Class::UnsupportedInline);
    }

    #[test]
    fn test_embedded_map() {
        let map = embedded_map(
            "https://www.arcgis.com/apps/Embed/index.html?webmap=abc123&extent=-10.5%2C20%2C30%2C40.25&zoom=true",
        )
        .unwrap();
        assert_eq!(map.item_id, "abc123");
        let deferred = map.deferred().unwrap();
        assert_eq!(
            deferred.viewpoint,
            Some(Extent::wgs84(-10.5, 20.0, 30.0, 40.25))
        );
    }

    #[test]
    fn test_embedded_map_without_extent() {
        let map = embedded_map("https://x/viewer?WebMap=m1#top").unwrap();
        assert_eq!(map.item_id, "m1");
        assert!(map.is_configured());
    }

    #[test]
    fn test_not_a_map() {
        assert!(embedded_map("https://youtube.com/embed/x").is_none());
        assert!(embedded_map("https://x/?webmap=").is_none());
        assert!(embedded_map("https://x/?appid=1").is_none());
    }

    #[test]
    fn test_bad_extent_is_ignored() {
        let map = embedded_map("https://x/?webmap=m1&extent=1,2,3").unwrap();
        assert!(map.is_configured());
    }
}
