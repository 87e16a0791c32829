//! Checking a generated copy against the schema it was made from.
//!
//! Definitions are compared in a canonical text form that ignores the definition's own name,
//! namespace prefixes and the rename prefix in reference values, so a faithful copy compares
//! identical to its original.

use lazy_static::lazy_static;
use regex::Regex;

use crate::schema::{DefinitionKind, SchemaDocument};
use crate::tree::{Element, XmlNode};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex must compile");
    static ref QNAME_PREFIX: Regex =
        Regex::new(r"^[\p{L}_][\p{L}\p{N}_.\-]*:").expect("static regex must compile");
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Identical,
    /// Canonical forms of both sides.
    Differs { original: String, copy: String },
    /// No definition of that kind and name in the original.
    Missing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyComparison {
    pub kind: DefinitionKind,
    pub copy_name: String,
    pub original_name: String,
    pub outcome: Comparison,
}

/// Compares every definition of `copy` named `{prefix}_...` with the definition of the same kind
/// in `original` named without it.
pub fn compare_copy(prefix: &str, original: &SchemaDocument, copy: &SchemaDocument) -> Vec<CopyComparison> {
    let name_prefix = format!("{prefix}_");
    copy.definitions()
        .filter_map(|definition| {
            let copy_name = definition.name?;
            let original_name = copy_name.strip_prefix(&name_prefix)?;
            let outcome = match original.definition(definition.kind, original_name) {
                None => Comparison::Missing,
                Some(source) => {
                    let original_form = canonical_form(source.element, &name_prefix);
                    let copy_form = canonical_form(definition.element, &name_prefix);
                    if original_form == copy_form {
                        Comparison::Identical
                    } else {
                        Comparison::Differs {
                            original: original_form,
                            copy: copy_form,
                        }
                    }
                }
            };
            Some(CopyComparison {
                kind: definition.kind,
                copy_name: copy_name.to_string(),
                original_name: original_name.to_string(),
                outcome,
            })
        })
        .collect()
}

/// One-line rendering of `definition` without its `name` attribute, with local element names,
/// attributes in name order and normalized values.
pub fn canonical_form(definition: &Element, name_prefix: &str) -> String {
    let mut out = String::new();
    write_canonical(definition, name_prefix, true, &mut out);
    out
}

fn write_canonical(element: &Element, name_prefix: &str, is_definition: bool, out: &mut String) {
    out.push_str(&format!("<{}", element.local_name()));
    let mut attributes: Vec<_> = element
        .attributes
        .iter()
        .filter(|a| !(is_definition && a.namespace.is_none() && a.name == "name"))
        .map(|a| (a.local_name(), normalize_value(&a.value, name_prefix)))
        .collect();
    attributes.sort();
    for (name, value) in attributes {
        out.push_str(&format!(" {name}=\"{value}\""));
    }
    out.push('>');
    for child in &element.children {
        match child {
            XmlNode::Element(child) => write_canonical(child, name_prefix, false, out),
            XmlNode::Text(text) => out.push_str(WHITESPACE.replace_all(text.trim(), " ").as_ref()),
            XmlNode::Comment(_) | XmlNode::ProcessingInstruction { .. } => {}
        }
    }
    out.push_str(&format!("</{}>", element.local_name()));
}

fn normalize_value(value: &str, name_prefix: &str) -> String {
    value
        .split_whitespace()
        .map(|token| {
            let local = QNAME_PREFIX.replace(token, "");
            let local = local.as_ref();
            local.strip_prefix(name_prefix).unwrap_or(local).to_string()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
