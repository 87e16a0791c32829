//! Deterministic ordering of top-level definitions.

use std::cmp::Ordering;
use std::mem;

use log::debug;

use crate::schema::{definition_kind, SchemaDocument};
use crate::tree::{Element, XmlNode};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SortMode {
    /// By kind tag name, then by name.
    #[default]
    KindFirst,
    /// By name, then by kind tag name.
    NameFirst,
}

/// A definition together with the comments and annotations written directly before it.
#[derive(Debug)]
struct Unit {
    leading: Vec<XmlNode>,
    definition: Element,
}

impl Unit {
    fn key(&self, mode: SortMode) -> (&str, &str) {
        let kind = self.definition.local_name();
        let name = self.definition.attribute("name").unwrap_or_default();
        match mode {
            SortMode::KindFirst => (kind, name),
            SortMode::NameFirst => (name, kind),
        }
    }

    fn compare(&self, other: &Self, mode: SortMode) -> Ordering {
        self.key(mode)
            .cmp(&other.key(mode))
            .then_with(|| self.definition.cmp(&other.definition))
            .then_with(|| self.leading.cmp(&other.leading))
    }
}

/// Reorders the definitions of `document`. Everything before the first definition stays in
/// front and everything after the last one stays at the end.
pub fn sort(document: &mut SchemaDocument, mode: SortMode) {
    let children = mem::take(&mut document.root_mut().children);

    let mut header = Vec::new();
    let mut units = Vec::new();
    let mut pending = Vec::new();
    for node in children {
        let is_definition = node.as_element().and_then(definition_kind).is_some();
        match node {
            XmlNode::Element(definition) if is_definition => units.push(Unit {
                leading: mem::take(&mut pending),
                definition,
            }),
            node if units.is_empty() => header.push(node),
            node => pending.push(node),
        }
    }

    debug!("sorting {} definitions ({mode:?})", units.len());
    units.sort_by(|a, b| a.compare(b, mode));

    let root = document.root_mut();
    root.children = header;
    for unit in units {
        root.children.extend(unit.leading);
        root.children.push(XmlNode::Element(unit.definition));
    }
    root.children.extend(pending);
}
