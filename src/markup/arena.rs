//! Arena DOM for side panel fragments.
//!
//! html5ever parses into this arena through [`super::tree_sink::FragmentSink`].
//! Nodes live in one vector and link to each other by index, which keeps the
//! recursive walk in [`super::walk`] free of reference counting.

use html5ever::QualName;

/// Index of a node in a [`FragmentDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomId(pub u32);

impl DomId {
    /// Sentinel for a missing link.
    pub const NONE: DomId = DomId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Payload of a DOM node.
#[derive(Debug, Clone)]
pub enum DomData {
    Document,
    Element { name: QualName, attrs: Vec<Attr> },
    Text(String),
    /// Comments and processing instructions; never walked.
    Comment,
}

/// An element attribute.
#[derive(Debug, Clone)]
pub struct Attr {
    pub name: QualName,
    pub value: String,
}

#[derive(Debug)]
pub struct DomNode {
    pub data: DomData,
    pub parent: DomId,
    pub first_child: DomId,
    pub last_child: DomId,
    pub prev_sibling: DomId,
    pub next_sibling: DomId,
}

impl DomNode {
    fn new(data: DomData) -> Self {
        Self {
            data,
            parent: DomId::NONE,
            first_child: DomId::NONE,
            last_child: DomId::NONE,
            prev_sibling: DomId::NONE,
            next_sibling: DomId::NONE,
        }
    }
}

/// A parsed HTML fragment.
#[derive(Debug)]
pub struct FragmentDom {
    nodes: Vec<DomNode>,
}

impl Default for FragmentDom {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentDom {
    /// Create a DOM holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![DomNode::new(DomData::Document)],
        }
    }

    pub fn document(&self) -> DomId {
        DomId(0)
    }

    pub fn get(&self, id: DomId) -> Option<&DomNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: DomId) -> Option<&mut DomNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn alloc(&mut self, data: DomData) -> DomId {
        let id = DomId(self.nodes.len() as u32);
        self.nodes.push(DomNode::new(data));
        id
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attr>) -> DomId {
        self.alloc(DomData::Element { name, attrs })
    }

    pub fn create_text(&mut self, text: String) -> DomId {
        self.alloc(DomData::Text(text))
    }

    pub fn create_comment(&mut self) -> DomId {
        self.alloc(DomData::Comment)
    }

    /// Append `child` as the last child of `parent`.
    pub fn append(&mut self, parent: DomId, child: DomId) {
        let last = self.get(parent).map_or(DomId::NONE, |n| n.last_child);

        if let Some(node) = self.get_mut(child) {
            node.parent = parent;
            node.prev_sibling = last;
            node.next_sibling = DomId::NONE;
        }
        if let Some(node) = self.get_mut(last) {
            node.next_sibling = child;
        }
        if let Some(node) = self.get_mut(parent) {
            if node.first_child.is_none() {
                node.first_child = child;
            }
            node.last_child = child;
        }
    }

    /// Insert `new_node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: DomId, new_node: DomId) {
        let (parent, prev) = self
            .get(sibling)
            .map_or((DomId::NONE, DomId::NONE), |n| (n.parent, n.prev_sibling));

        if let Some(node) = self.get_mut(new_node) {
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = sibling;
        }
        if let Some(node) = self.get_mut(sibling) {
            node.prev_sibling = new_node;
        }
        if prev.is_some() {
            if let Some(node) = self.get_mut(prev) {
                node.next_sibling = new_node;
            }
        } else if let Some(node) = self.get_mut(parent) {
            node.first_child = new_node;
        }
    }

    /// Append text, merging into a trailing text node when there is one.
    pub fn append_text(&mut self, parent: DomId, text: &str) {
        let last = self.get(parent).map_or(DomId::NONE, |n| n.last_child);
        if let Some(DomNode {
            data: DomData::Text(existing),
            ..
        }) = self.get_mut(last)
        {
            existing.push_str(text);
            return;
        }
        let node = self.create_text(text.to_string());
        self.append(parent, node);
    }

    /// Unlink a node from its parent and siblings.
    pub fn detach(&mut self, id: DomId) {
        let Some((parent, prev, next)) = self
            .get(id)
            .map(|n| (n.parent, n.prev_sibling, n.next_sibling))
        else {
            return;
        };

        if prev.is_some() {
            if let Some(node) = self.get_mut(prev) {
                node.next_sibling = next;
            }
        } else if let Some(node) = self.get_mut(parent) {
            node.first_child = next;
        }
        if next.is_some() {
            if let Some(node) = self.get_mut(next) {
                node.prev_sibling = prev;
            }
        } else if let Some(node) = self.get_mut(parent) {
            node.last_child = prev;
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = DomId::NONE;
            node.prev_sibling = DomId::NONE;
            node.next_sibling = DomId::NONE;
        }
    }

    pub fn children(&self, parent: DomId) -> Children<'_> {
        Children {
            dom: self,
            current: self.get(parent).map_or(DomId::NONE, |n| n.first_child),
        }
    }

    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.get(id).map(|n| n.parent).filter(DomId::is_some)
    }

    /// Lower-case local name of an element.
    pub fn tag(&self, id: DomId) -> Option<&str> {
        match &self.get(id)?.data {
            DomData::Element { name, .. } => Some(name.local.as_ref()),
            _ => None,
        }
    }

    pub fn is_tag(&self, id: DomId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    /// Attribute value, if present.
    pub fn attr(&self, id: DomId, name: &str) -> Option<&str> {
        match &self.get(id)?.data {
            DomData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    /// Attribute value with surrounding whitespace removed; empty counts as absent.
    pub fn attr_trimmed(&self, id: DomId, name: &str) -> Option<&str> {
        self.attr(id, name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn text(&self, id: DomId) -> Option<&str> {
        match &self.get(id)?.data {
            DomData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Pre-order descendants of `root`, excluding `root` itself.
    pub fn descendants(&self, root: DomId) -> Vec<DomId> {
        let mut out = Vec::new();
        let mut stack: Vec<DomId> = self.children(root).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let start = stack.len();
            stack.extend(self.children(id));
            stack[start..].reverse();
        }
        out
    }

    /// First descendant element with the given tag.
    pub fn find_tag(&self, root: DomId, tag: &str) -> Option<DomId> {
        self.descendants(root)
            .into_iter()
            .find(|&id| self.is_tag(id, tag))
    }

    /// Whether any descendant element has one of the given tags.
    pub fn contains_any(&self, root: DomId, tags: &[&str]) -> bool {
        self.descendants(root)
            .into_iter()
            .any(|id| self.tag(id).is_some_and(|t| tags.contains(&t)))
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, root: DomId) -> String {
        self.descendants(root)
            .into_iter()
            .filter_map(|id| self.text(id))
            .collect()
    }

    /// Nearest ancestor element with the given tag.
    pub fn ancestor(&self, id: DomId, tag: &str) -> Option<DomId> {
        let mut current = self.parent(id)?;
        loop {
            if self.is_tag(current, tag) {
                return Some(current);
            }
            current = self.parent(current)?;
        }
    }
}

/// Iterator over the children of a node.
pub struct Children<'a> {
    dom: &'a FragmentDom,
    current: DomId,
}

impl Iterator for Children<'_> {
    type Item = DomId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self.dom.get(id).map_or(DomId::NONE, |n| n.next_sibling);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use html5ever::{LocalName, ns};

    use super::*;

    fn qname(local: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(local))
    }

    #[test]
    fn test_append_and_iterate() {
        let mut dom = FragmentDom::new();
        let div = dom.create_element(qname("div"), vec![]);
        let a = dom.create_element(qname("p"), vec![]);
        let b = dom.create_element(qname("p"), vec![]);
        dom.append(dom.document(), div);
        dom.append(div, a);
        dom.append(div, b);

        assert_eq!(dom.children(div).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(dom.parent(a), Some(div));
        assert_eq!(dom.tag(div), Some("div"));
    }

    #[test]
    fn test_insert_before_and_detach() {
        let mut dom = FragmentDom::new();
        let root = dom.document();
        let a = dom.create_text("a".into());
        let c = dom.create_text("c".into());
        dom.append(root, a);
        dom.append(root, c);
        let b = dom.create_text("b".into());
        dom.insert_before(c, b);
        assert_eq!(dom.text_content(root), "abc");

        dom.detach(a);
        assert_eq!(dom.children(root).collect::<Vec<_>>(), vec![b, c]);
        dom.detach(c);
        assert_eq!(dom.children(root).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = FragmentDom::new();
        let p = dom.create_element(qname("p"), vec![]);
        dom.append(dom.document(), p);
        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");
        assert_eq!(dom.children(p).count(), 1);
        assert_eq!(dom.text_content(p), "Hello, World!");
    }

    #[test]
    fn test_attrs_and_ancestors() {
        let mut dom = FragmentDom::new();
        let a = dom.create_element(
            qname("a"),
            vec![Attr {
                name: qname("href"),
                value: "  https://x  ".into(),
            }],
        );
        let img = dom.create_element(qname("img"), vec![]);
        dom.append(dom.document(), a);
        dom.append(a, img);
        assert_eq!(dom.attr_trimmed(a, "href"), Some("https://x"));
        assert_eq!(dom.attr(a, "title"), None);
        assert_eq!(dom.ancestor(img, "a"), Some(a));
        assert_eq!(dom.find_tag(dom.document(), "img"), Some(img));
        assert!(dom.contains_any(a, &["video", "img"]));
    }
}
