//! Reports over a single schema document.

use std::collections::{HashMap, HashSet};

use roxmltree::Node;

use crate::error::{Result, XsdError};
use crate::reference::is_examined;
use crate::schema::{definition_kind, DefinitionKind, SchemaDocument, XS_NAMESPACE};
use crate::tree::{Element, ParseOptions};

/// A top-level definition nothing in the document refers to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Orphan {
    pub kind: DefinitionKind,
    pub name: String,
}

const ORPHAN_KINDS: [DefinitionKind; 6] = [
    DefinitionKind::Element,
    DefinitionKind::Attribute,
    DefinitionKind::ComplexType,
    DefinitionKind::SimpleType,
    DefinitionKind::Group,
    DefinitionKind::AttributeGroup,
];

/// Definitions that no reference in the same document resolves to, ordered by (kind, name).
pub fn find_orphans(document: &SchemaDocument) -> Vec<Orphan> {
    let referenced: HashSet<(DefinitionKind, &str)> = document
        .references()
        .iter()
        .filter_map(|reference| document.resolve(reference))
        .filter_map(|definition| Some((definition.kind, definition.name?)))
        .collect();

    let mut orphans: Vec<Orphan> = document
        .definitions()
        .filter(|d| ORPHAN_KINDS.contains(&d.kind))
        .filter_map(|d| {
            let name = d.name?;
            (!referenced.contains(&(d.kind, name))).then(|| Orphan {
                kind: d.kind,
                name: name.to_string(),
            })
        })
        .collect();
    orphans.sort();
    orphans.dedup();
    orphans
}

/// A named declaration or type without an `xs:annotation` child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingAnnotation {
    pub kind: DefinitionKind,
    pub name: String,
    /// The top-level definition a local declaration sits in; `None` for top-level ones.
    pub ancestor: Option<(DefinitionKind, Option<String>)>,
}

const ANNOTATED_KINDS: [DefinitionKind; 4] = [
    DefinitionKind::Element,
    DefinitionKind::Attribute,
    DefinitionKind::SimpleType,
    DefinitionKind::ComplexType,
];

/// Global and local elements, attributes and types lacking documentation, in document order.
/// Anonymous components and references are skipped.
pub fn find_missing_annotations(document: &SchemaDocument) -> Vec<MissingAnnotation> {
    let mut missing = Vec::new();
    for top_level in document.root().child_elements() {
        let ancestor = definition_kind(top_level).map(|kind| {
            (
                kind,
                top_level.attribute("name").map(str::to_string),
            )
        });
        check_annotation(top_level, None, &mut missing);
        for child in top_level.child_elements() {
            walk(child, &ancestor, &mut missing);
        }
    }
    missing
}

fn walk(
    element: &Element,
    ancestor: &Option<(DefinitionKind, Option<String>)>,
    missing: &mut Vec<MissingAnnotation>,
) {
    if !is_examined(element) {
        return;
    }
    check_annotation(element, ancestor.clone(), missing);
    for child in element.child_elements() {
        walk(child, ancestor, missing);
    }
}

fn check_annotation(
    element: &Element,
    ancestor: Option<(DefinitionKind, Option<String>)>,
    missing: &mut Vec<MissingAnnotation>,
) {
    let Some(kind) = definition_kind(element).filter(|kind| ANNOTATED_KINDS.contains(kind)) else {
        return;
    };
    let Some(name) = element.attribute("name") else {
        return;
    };
    let annotated = element
        .child_elements()
        .any(|child| child.is(XS_NAMESPACE, "annotation"));
    if !annotated {
        missing.push(MissingAnnotation {
            kind,
            name: name.to_string(),
            ancestor,
        });
    }
}

/// A local `ref` whose own documentation differs from the one of the global declaration it
/// points to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationDiscrepancy {
    /// `Element` or `Attribute`.
    pub kind: DefinitionKind,
    pub name: String,
    /// Documentation of the global declaration, empty if it has none.
    pub definition_text: String,
    pub reference_text: String,
    /// Line of the referencing element, starting at 1.
    pub line: u32,
    pub ancestor: Option<(DefinitionKind, Option<String>)>,
}

/// Compares the documentation of every annotated `xs:element ref` and `xs:attribute ref` with the
/// documentation of the global declaration it names. References without documentation of their
/// own and references to declarations not in `text` are skipped.
///
/// Works on the source text so that lines can be reported.
pub fn find_annotation_discrepancies(
    text: &str,
    origin: &str,
    options: &ParseOptions,
) -> Result<Vec<AnnotationDiscrepancy>> {
    let parsing_options = roxmltree::ParsingOptions {
        allow_dtd: options.allow_dtd,
        ..Default::default()
    };
    let document = roxmltree::Document::parse_with_options(text, parsing_options).map_err(|source| {
        XsdError::Malformed {
            origin: origin.to_string(),
            source,
        }
    })?;
    let root = document.root_element();
    if !is_xs(root, "schema") {
        return Err(XsdError::NotASchema {
            origin: origin.to_string(),
            found: root.tag_name().name().to_string(),
        });
    }

    let mut globals = HashMap::new();
    for child in root.children().filter(Node::is_element) {
        let Some(kind) = declaration_kind(child) else {
            continue;
        };
        if let Some(name) = child.attribute("name") {
            globals
                .entry((kind, name))
                .or_insert_with(|| documentation_text(child));
        }
    }

    let mut discrepancies = Vec::new();
    for top_level in root.children().filter(Node::is_element) {
        let ancestor = xs_kind(top_level).map(|kind| (kind, top_level.attribute("name").map(str::to_string)));
        let mut pending = vec![top_level];
        while let Some(node) = pending.pop() {
            if is_xs(node, "annotation") {
                continue;
            }
            pending.extend(node.children().filter(Node::is_element));
            let (Some(kind), Some(reference)) = (declaration_kind(node), node.attribute("ref")) else {
                continue;
            };
            let reference_text = documentation_text(node);
            if reference_text.is_empty() {
                continue;
            }
            let name = local_part(reference);
            let Some(definition_text) = globals.get(&(kind, name)) else {
                continue;
            };
            if *definition_text != reference_text {
                discrepancies.push(AnnotationDiscrepancy {
                    kind,
                    name: name.to_string(),
                    definition_text: definition_text.clone(),
                    reference_text,
                    line: document.text_pos_at(node.range().start).row,
                    ancestor: (node.parent() != Some(root)).then(|| ancestor.clone()).flatten(),
                });
            }
        }
    }
    discrepancies.sort_by_key(|d| d.line);
    Ok(discrepancies)
}

fn is_xs(node: Node, local_name: &str) -> bool {
    node.tag_name().namespace() == Some(XS_NAMESPACE) && node.tag_name().name() == local_name
}

fn xs_kind(node: Node) -> Option<DefinitionKind> {
    if node.tag_name().namespace() != Some(XS_NAMESPACE) {
        return None;
    }
    DefinitionKind::from_tag_name(node.tag_name().name())
}

fn declaration_kind(node: Node) -> Option<DefinitionKind> {
    xs_kind(node).filter(|kind| matches!(kind, DefinitionKind::Element | DefinitionKind::Attribute))
}

/// The trimmed, non-empty `xs:documentation` texts of the direct `xs:annotation`, one per line.
fn documentation_text(node: Node) -> String {
    let texts: Vec<String> = node
        .children()
        .filter(|child| is_xs(*child, "annotation"))
        .flat_map(|annotation| annotation.children())
        .filter(|child| is_xs(*child, "documentation"))
        .map(|documentation| {
            documentation
                .descendants()
                .filter(Node::is_text)
                .filter_map(|text| text.text())
                .collect::<String>()
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    texts.join("\n")
}

fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}
