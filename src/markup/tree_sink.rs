//! html5ever TreeSink for [`FragmentDom`].

use std::borrow::Cow;
use std::cell::{Cell, RefCell};

use html5ever::driver::ParseOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName, parse_document};

use super::arena::{Attr, DomData, DomId, FragmentDom};

/// Parse a side panel fragment into an arena DOM.
///
/// Parsing never fails: malformed markup is repaired the way browsers
/// repair it. The number of parse errors html5ever reported is returned
/// alongside the DOM.
pub fn parse(html: &str) -> (FragmentDom, usize) {
    let sink = parse_document(FragmentSink::new(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes());
    let errors = sink.errors.get();
    (sink.dom.into_inner(), errors)
}

/// Handle html5ever uses to refer to arena nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(pub DomId);

impl Default for Handle {
    fn default() -> Self {
        Handle(DomId::NONE)
    }
}

/// TreeSink that builds a [`FragmentDom`].
///
/// TreeSink methods take `&self`, so the DOM sits behind a RefCell.
pub struct FragmentSink {
    dom: RefCell<FragmentDom>,
    errors: Cell<usize>,
}

impl Default for FragmentSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentSink {
    pub fn new() -> Self {
        Self {
            dom: RefCell::new(FragmentDom::new()),
            errors: Cell::new(0),
        }
    }

    fn insert(&self, parent: DomId, child: NodeOrText<Handle>) {
        let mut dom = self.dom.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => dom.append(parent, node.0),
            NodeOrText::AppendText(text) => dom.append_text(parent, &text),
        }
    }
}

fn convert_attrs(attrs: Vec<Html5Attribute>) -> Vec<Attr> {
    attrs
        .into_iter()
        .map(|a| Attr {
            name: a.name,
            value: a.value.to_string(),
        })
        .collect()
}

impl TreeSink for FragmentSink {
    type Handle = Handle;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        self.errors.set(self.errors.get() + 1);
    }

    fn get_document(&self) -> Self::Handle {
        Handle(self.dom.borrow().document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        let dom = self.dom.borrow();
        match dom.get(target.0).map(|n| &n.data) {
            Some(DomData::Element { name, .. }) => {
                // SAFETY: nodes are never removed from the arena vector and an
                // element's name is never replaced, so the QualName lives as
                // long as the sink even though the RefCell guard does not.
                unsafe { std::mem::transmute::<&QualName, &'a QualName>(name) }
            }
            _ => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        Handle(
            self.dom
                .borrow_mut()
                .create_element(name, convert_attrs(attrs)),
        )
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        Handle(self.dom.borrow_mut().create_comment())
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        Handle(self.dom.borrow_mut().create_comment())
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        self.insert(parent.0, child);
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let parent = self.dom.borrow().parent(element.0);
        match parent {
            Some(parent) => self.insert(parent, child),
            None => self.insert(prev_element.0, child),
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.0 == y.0
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut dom = self.dom.borrow_mut();
        let node = match new_node {
            NodeOrText::AppendNode(node) => node.0,
            NodeOrText::AppendText(text) => dom.create_text(text.to_string()),
        };
        dom.insert_before(sibling.0, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        let mut dom = self.dom.borrow_mut();
        if let Some(node) = dom.get_mut(target.0)
            && let DomData::Element {
                attrs: existing, ..
            } = &mut node.data
        {
            for attr in convert_attrs(attrs) {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.dom.borrow_mut().detach(target.0);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut dom = self.dom.borrow_mut();
        let children: Vec<_> = dom.children(node.0).collect();
        for child in children {
            dom.detach(child);
            dom.append(new_parent.0, child);
        }
    }
}
