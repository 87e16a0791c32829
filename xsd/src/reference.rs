//! Discovery and rewriting of QName references between definitions.
//!
//! Which attributes are references is decided by a single table keyed by (schema element,
//! attribute). Supporting a new reference-bearing construct means adding a row, not a branch.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::diagnostics::Warning;
use crate::namespaces::NamespaceScope;
use crate::schema::{DefinitionKind, XS_NAMESPACE};
use crate::tree::{Attribute, Element, XmlNode};
use crate::xstypes::QName;

/// The symbol space a reference points into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefTarget {
    Type,
    Element,
    Attribute,
    Group,
    AttributeGroup,
}

impl RefTarget {
    /// Definition kinds this reference can designate, in lookup order.
    pub fn kinds(self) -> &'static [DefinitionKind] {
        match self {
            Self::Type => &[DefinitionKind::ComplexType, DefinitionKind::SimpleType],
            Self::Element => &[DefinitionKind::Element],
            Self::Attribute => &[DefinitionKind::Attribute],
            Self::Group => &[DefinitionKind::Group],
            Self::AttributeGroup => &[DefinitionKind::AttributeGroup],
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct ReferenceAttribute {
    pub target: RefTarget,
    /// Whitespace-separated list of QNames rather than a single one.
    pub is_list: bool,
}

/// Attribute names that carry references on at least one schema element.
pub const REFERENCE_ATTRIBUTES: [&str; 6] = [
    "type",
    "ref",
    "base",
    "itemType",
    "memberTypes",
    "substitutionGroup",
];

lazy_static! {
    static ref REFERENCE_TABLE: HashMap<(&'static str, &'static str), ReferenceAttribute> = {
        use RefTarget::*;
        let rows = [
            ("element", "type", Type, false),
            ("element", "ref", Element, false),
            // A list in XSD 1.1, a single QName in 1.0; both split the same way.
            ("element", "substitutionGroup", Element, true),
            ("attribute", "type", Type, false),
            ("attribute", "ref", Attribute, false),
            ("alternative", "type", Type, false),
            ("extension", "base", Type, false),
            ("restriction", "base", Type, false),
            ("list", "itemType", Type, false),
            ("union", "memberTypes", Type, true),
            ("group", "ref", Group, false),
            ("attributeGroup", "ref", AttributeGroup, false),
        ];
        rows.into_iter()
            .map(|(element, attribute, target, is_list)| {
                ((element, attribute), ReferenceAttribute { target, is_list })
            })
            .collect()
    };
}

/// Whether references inside `element` are looked at. Content of other namespaces and of
/// `appinfo`/`documentation` is opaque.
pub(crate) fn is_examined(element: &Element) -> bool {
    element.namespace.as_deref() == Some(XS_NAMESPACE)
        && !matches!(element.local_name(), "appinfo" | "documentation")
}

pub(crate) fn reference_attribute(
    element_local_name: &str,
    attribute: &Attribute,
) -> Option<ReferenceAttribute> {
    if attribute.namespace.is_some() {
        return None;
    }
    REFERENCE_TABLE
        .get(&(element_local_name, attribute.name.as_str()))
        .copied()
}

pub(crate) fn tokens(value: &str, is_list: bool) -> Vec<&str> {
    if is_list {
        value.split_ascii_whitespace().collect()
    } else {
        let value = value.trim();
        if value.is_empty() {
            Vec::new()
        } else {
            vec![value]
        }
    }
}

/// One QName reference found in a schema document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Local name of the element carrying the attribute.
    pub element: String,
    pub attribute: String,
    pub target: RefTarget,
    /// The token as written, e.g. `lib:Book`.
    pub value: String,
    /// The expanded name, or `None` if the prefix is not bound.
    pub name: Option<QName>,
}

pub(crate) fn collect_references(
    element: &Element,
    scope: &mut NamespaceScope,
    references: &mut Vec<Reference>,
) {
    if !is_examined(element) {
        return;
    }
    scope.push(element);
    for attribute in &element.attributes {
        let Some(entry) = reference_attribute(element.local_name(), attribute) else {
            continue;
        };
        for token in tokens(&attribute.value, entry.is_list) {
            references.push(Reference {
                element: element.local_name().to_string(),
                attribute: attribute.name.clone(),
                target: entry.target,
                value: token.to_string(),
                name: scope.resolve(token),
            });
        }
    }
    for child in element.child_elements() {
        collect_references(child, scope, references);
    }
    scope.pop();
}

/// Calls `rewrite` for every reference token below `element`; a returned string replaces the
/// token. `scope` must already contain the ancestors of `element`.
pub(crate) fn rewrite_references(
    element: &mut Element,
    scope: &mut NamespaceScope,
    rewrite: &mut dyn FnMut(&Reference) -> Option<String>,
) {
    if !is_examined(element) {
        return;
    }
    scope.push(element);
    let element_name = element.local_name().to_string();
    for attribute in element.attributes.iter_mut() {
        let Some(entry) = reference_attribute(&element_name, attribute) else {
            continue;
        };
        let mut changed = false;
        let mut rewritten = Vec::new();
        for token in tokens(&attribute.value, entry.is_list) {
            let reference = Reference {
                element: element_name.clone(),
                attribute: attribute.name.clone(),
                target: entry.target,
                value: token.to_string(),
                name: scope.resolve(token),
            };
            match rewrite(&reference) {
                Some(new_value) => {
                    changed |= new_value != token;
                    rewritten.push(new_value);
                }
                None => rewritten.push(token.to_string()),
            }
        }
        if changed {
            attribute.value = rewritten.join(" ");
        }
    }
    for child in element
        .children
        .iter_mut()
        .filter_map(XmlNode::as_element_mut)
    {
        rewrite_references(child, scope, rewrite);
    }
    scope.pop();
}

/// Reference-like attributes on schema elements the table does not know.
pub fn unknown_reference_attributes(element: &Element) -> Vec<Warning> {
    let mut warnings = Vec::new();
    collect_unknown(element, &mut warnings);
    warnings
}

fn collect_unknown(element: &Element, warnings: &mut Vec<Warning>) {
    if !is_examined(element) {
        return;
    }
    for attribute in &element.attributes {
        if attribute.namespace.is_none()
            && REFERENCE_ATTRIBUTES.contains(&attribute.name.as_str())
            && reference_attribute(element.local_name(), attribute).is_none()
        {
            warnings.push(Warning::UnknownReferenceAttribute {
                element: element.name.clone(),
                attribute: attribute.name.clone(),
                value: attribute.value.clone(),
            });
        }
    }
    for child in element.child_elements() {
        collect_unknown(child, warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ParseOptions, XmlDocument};

    fn parse(source: &str) -> Element {
        XmlDocument::parse(source, &ParseOptions::default())
            .unwrap()
            .root
    }

    fn references(root: &Element) -> Vec<Reference> {
        let mut scope = NamespaceScope::new();
        let mut references = Vec::new();
        collect_references(root, &mut scope, &mut references);
        references
    }

    #[test]
    fn finds_references_by_table() {
        let root = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:lib="urn:lib">
                <xs:element name="a" type="lib:Book"/>
                <xs:complexType name="B">
                  <xs:complexContent><xs:extension base="lib:Base"/></xs:complexContent>
                </xs:complexType>
                <xs:simpleType name="U"><xs:union memberTypes="lib:X xs:string"/></xs:simpleType>
                <xs:element name="n" fixed="lib:NotAReference"/>
              </xs:schema>"#,
        );
        let found = references(&root);
        let values: Vec<_> = found.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["lib:Book", "lib:Base", "lib:X", "xs:string"]);
        assert_eq!(found[0].target, RefTarget::Type);
        assert_eq!(found[0].name, Some(QName::with_namespace("urn:lib", "Book")));
        assert_eq!(
            found[3].name,
            Some(QName::with_namespace(XS_NAMESPACE, "string"))
        );
    }

    #[test]
    fn ref_target_depends_on_element() {
        let root = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="T">
                  <xs:sequence><xs:element ref="e"/><xs:group ref="g"/></xs:sequence>
                  <xs:attribute ref="a"/>
                  <xs:attributeGroup ref="ag"/>
                </xs:complexType>
              </xs:schema>"#,
        );
        let targets: Vec<_> = references(&root).iter().map(|r| r.target).collect();
        assert_eq!(
            targets,
            [
                RefTarget::Element,
                RefTarget::Group,
                RefTarget::Attribute,
                RefTarget::AttributeGroup
            ]
        );
    }

    #[test]
    fn skips_documentation_and_foreign_content() {
        let root = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:f="urn:foreign">
                <xs:annotation>
                  <xs:appinfo><xs:element type="Hidden"/></xs:appinfo>
                </xs:annotation>
                <f:thing type="AlsoHidden"/>
              </xs:schema>"#,
        );
        assert!(references(&root).is_empty());
    }

    #[test]
    fn rewrites_list_tokens_individually() {
        let mut root = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:simpleType name="U"><xs:union memberTypes="A  xs:int B"/></xs:simpleType>
              </xs:schema>"#,
        );
        let mut scope = NamespaceScope::new();
        rewrite_references(&mut root, &mut scope, &mut |reference| {
            (!reference.value.contains(':')).then(|| format!("p_{}", reference.value))
        });
        let union = root.child_elements().next().unwrap().child_elements().next().unwrap();
        assert_eq!(union.attribute("memberTypes"), Some("p_A xs:int p_B"));
    }

    #[test]
    fn reports_reference_attributes_outside_the_table() {
        let root = parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                <xs:complexType name="T"><xs:sequence ref="odd"/></xs:complexType>
              </xs:schema>"#,
        );
        let warnings = unknown_reference_attributes(&root);
        assert_eq!(
            warnings,
            vec![Warning::UnknownReferenceAttribute {
                element: "xs:sequence".into(),
                attribute: "ref".into(),
                value: "odd".into(),
            }]
        );
    }
}
