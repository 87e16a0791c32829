//! Moving content from one namespace context into another.
//!
//! Spliced definitions and re-homed copies carry prefixes that only mean something under their
//! original declarations. [`relocate`] rewrites element names and qualified attribute names so they
//! resolve to the same namespaces under the destination's bindings, and reference values so they
//! resolve to the (possibly remapped) namespaces of their targets. Every declaration is folded
//! into the destination bindings.

use crate::namespaces::{Bindings, NamespaceScope};
use crate::reference::{is_examined, reference_attribute, tokens};
use crate::tree::{Element, XmlNode};
use crate::xstypes::PrefixedName;

/// Maps the namespace of a reference target in the source context to the namespace it stands for
/// in the destination.
pub(crate) type NamespaceMap<'a> = dyn Fn(Option<&str>) -> Option<String> + 'a;

/// `scope` must contain the ancestors of `element` in its source document.
pub(crate) fn relocate(
    element: &mut Element,
    scope: &mut NamespaceScope,
    bindings: &mut Bindings,
    map_namespace: &NamespaceMap,
) {
    relocate_element(element, scope, bindings, map_namespace, true);
}

fn relocate_element(
    element: &mut Element,
    scope: &mut NamespaceScope,
    bindings: &mut Bindings,
    map_namespace: &NamespaceMap,
    parent_examined: bool,
) {
    scope.push(element);
    let examined = parent_examined && is_examined(element);
    element.namespace_declarations.clear();

    let local_name = element.local_name().to_string();
    let hint = element.prefix().map(str::to_string);
    element.name = bindings.qualify(element.namespace.as_deref(), &local_name, hint.as_deref());

    for attribute in element.attributes.iter_mut() {
        if attribute.namespace.is_some() {
            let local_name = attribute.local_name().to_string();
            let hint = attribute.name.split_once(':').map(|(p, _)| p.to_string());
            attribute.name = bindings.qualify_attribute(
                attribute.namespace.as_deref(),
                &local_name,
                hint.as_deref(),
            );
            continue;
        }
        if !examined {
            continue;
        }
        let Some(entry) = reference_attribute(&local_name, attribute) else {
            continue;
        };
        let rewritten: Vec<String> = tokens(&attribute.value, entry.is_list)
            .into_iter()
            .map(|token| match scope.resolve(token) {
                Some(name) => {
                    let namespace = map_namespace(name.namespace_name.as_deref());
                    let hint = PrefixedName::parse(token).prefix;
                    bindings.qualify(namespace.as_deref(), &name.local_name, hint)
                }
                // Unbound prefix: already dangling, pass through.
                None => token.to_string(),
            })
            .collect();
        attribute.value = rewritten.join(" ");
    }

    for child in element
        .children
        .iter_mut()
        .filter_map(XmlNode::as_element_mut)
    {
        relocate_element(child, scope, bindings, map_namespace, examined);
    }
    scope.pop();
}

/// Relocates every element among `nodes`, leaving comments, text and processing instructions as
/// they are.
pub(crate) fn relocate_nodes(
    nodes: &mut [XmlNode],
    scope: &mut NamespaceScope,
    bindings: &mut Bindings,
    map_namespace: &NamespaceMap,
) {
    for element in nodes.iter_mut().filter_map(XmlNode::as_element_mut) {
        relocate(element, scope, bindings, map_namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::XS_NAMESPACE;
    use crate::tree::{NamespaceDeclaration, ParseOptions, XmlDocument};

    #[test]
    fn moves_default_namespace_content_under_prefixes() {
        let document = XmlDocument::parse(
            r#"<schema xmlns="http://www.w3.org/2001/XMLSchema" xmlns:lib="urn:lib" targetNamespace="urn:lib">
                 <element name="a" type="lib:Book"/>
                 <element name="b" type="string"/>
               </schema>"#,
            &ParseOptions::default(),
        )
        .unwrap();
        let mut root = document.root;

        let mut scope = NamespaceScope::new();
        let mut bindings = Bindings::new(vec![NamespaceDeclaration {
            prefix: Some("xsd".into()),
            uri: XS_NAMESPACE.into(),
        }]);
        let own = |ns: Option<&str>| match ns {
            Some("urn:lib") => None,
            other => other.map(str::to_string),
        };
        relocate(&mut root, &mut scope, &mut bindings, &own);

        assert_eq!(root.name, "xsd:schema");
        assert!(root.namespace_declarations.is_empty());
        let types: Vec<_> = root
            .child_elements()
            .map(|e| (e.name.as_str(), e.attribute("type").unwrap()))
            .collect();
        assert_eq!(
            types,
            [("xsd:element", "Book"), ("xsd:element", "xsd:string")]
        );
    }

    #[test]
    fn conflicting_prefix_gets_a_fresh_one() {
        let document = XmlDocument::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:p="urn:incoming">
                 <xs:element name="a" type="p:T"/>
               </xs:schema>"#,
            &ParseOptions::default(),
        )
        .unwrap();
        let mut root = document.root;
        let mut bindings = Bindings::new(vec![
            NamespaceDeclaration {
                prefix: Some("xs".into()),
                uri: XS_NAMESPACE.into(),
            },
            NamespaceDeclaration {
                prefix: Some("p".into()),
                uri: "urn:taken".into(),
            },
        ]);
        let identity = |ns: Option<&str>| ns.map(str::to_string);
        relocate(&mut root, &mut NamespaceScope::new(), &mut bindings, &identity);

        let element = root.child_elements().next().unwrap();
        assert_eq!(element.attribute("type"), Some("ns0:T"));
        assert_eq!(bindings.uri_for(Some("ns0")), Some("urn:incoming"));
        assert_eq!(bindings.uri_for(Some("p")), Some("urn:taken"));
    }
}
