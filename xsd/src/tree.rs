//! Owned, mutable XML tree.
//!
//! roxmltree gives us a read-only view of the input, so every document is copied into this tree
//! once. Element and attribute names keep the prefix they were written with, alongside the
//! namespace URI the prefix resolved to at parse time. Whitespace-only text between elements is
//! dropped; the writer re-indents.

use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::NodeType;

use crate::error::{Result, XsdError};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Allow a XML Document Type Definition (DTD) to occur.
    pub allow_dtd: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum XmlNode {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// `xmlns="uri"` (prefix `None`) or `xmlns:prefix="uri"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NamespaceDeclaration {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attribute {
    /// Name as written, including a prefix if the attribute is namespace-qualified.
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Element {
    /// Name as written, including its prefix.
    pub name: String,
    /// The namespace URI the element name resolved to.
    pub namespace: Option<String>,
    pub namespace_declarations: Vec<NamespaceDeclaration>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<XmlNode>,
}

fn local_part(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

impl Element {
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            namespace_declarations: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name() == local_name
    }

    /// Looks up an unqualified attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            Some(attribute) => attribute.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                namespace: None,
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self
            .attributes
            .iter()
            .position(|a| a.namespace.is_none() && a.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// URI bound to `prefix` by a declaration on this element itself.
    pub fn declared_namespace(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespace_declarations
            .iter()
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.as_str())
    }

    /// Adds or replaces the declaration for `prefix`.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: impl Into<String>) {
        let uri = uri.into();
        match self
            .namespace_declarations
            .iter_mut()
            .find(|d| d.prefix.as_deref() == prefix)
        {
            Some(declaration) => declaration.uri = uri,
            None => self.namespace_declarations.push(NamespaceDeclaration {
                prefix: prefix.map(str::to_string),
                uri,
            }),
        }
    }

    pub fn undeclare_namespace(&mut self, prefix: Option<&str>) -> Option<String> {
        let index = self
            .namespace_declarations
            .iter()
            .position(|d| d.prefix.as_deref() == prefix)?;
        Some(self.namespace_declarations.remove(index).uri)
    }

    /// Pre-order walk over this element and all element descendants.
    pub fn for_each_element<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for child in self.child_elements() {
            child.for_each_element(f);
        }
    }

    pub fn for_each_element_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in self.children.iter_mut().filter_map(XmlNode::as_element_mut) {
            child.for_each_element_mut(f);
        }
    }
}

/// A whole XML document: the root element plus comments and processing instructions around it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDocument {
    pub prolog: Vec<XmlNode>,
    pub root: Element,
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn parse(text: &str, options: &ParseOptions) -> std::result::Result<Self, roxmltree::Error> {
        let parsing_options = roxmltree::ParsingOptions {
            allow_dtd: options.allow_dtd,
            ..Default::default()
        };
        let document = roxmltree::Document::parse_with_options(text, parsing_options)?;

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;
        for node in document.root().children() {
            if node.is_element() {
                root = Some(element_from_xml(node));
                continue;
            }
            let Some(converted) = node_from_xml(node, true) else {
                continue;
            };
            if root.is_none() {
                prolog.push(converted);
            } else {
                epilog.push(converted);
            }
        }

        let root = root.unwrap_or_else(|| element_from_xml(document.root_element()));
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn element_from_xml(node: roxmltree::Node) -> Element {
    let tag_name = node.tag_name();
    let has_element_children = node.children().any(|c| c.is_element());

    Element {
        name: written_name(node, tag_name.namespace(), tag_name.name(), true),
        namespace: tag_name.namespace().map(str::to_string),
        namespace_declarations: declared_namespaces(node),
        attributes: node
            .attributes()
            .map(|attribute| Attribute {
                name: written_name(node, attribute.namespace(), attribute.name(), false),
                namespace: attribute.namespace().map(str::to_string),
                value: attribute.value().to_string(),
            })
            .collect(),
        children: node
            .children()
            .filter_map(|child| node_from_xml(child, has_element_children))
            .collect(),
    }
}

fn node_from_xml(node: roxmltree::Node, drop_blank_text: bool) -> Option<XmlNode> {
    match node.node_type() {
        NodeType::Element => Some(XmlNode::Element(element_from_xml(node))),
        NodeType::Text => {
            let text = node.text().unwrap_or_default();
            if drop_blank_text && text.trim().is_empty() {
                None
            } else {
                Some(XmlNode::Text(text.to_string()))
            }
        }
        NodeType::Comment => Some(XmlNode::Comment(node.text().unwrap_or_default().to_string())),
        NodeType::PI => node.pi().map(|pi| XmlNode::ProcessingInstruction {
            target: pi.target.to_string(),
            data: pi.value.map(str::to_string),
        }),
        NodeType::Root => None,
    }
}

/// Declarations made on `node` itself, i.e. in scope here but not on the parent.
fn declared_namespaces(node: roxmltree::Node) -> Vec<NamespaceDeclaration> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| NamespaceDeclaration {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect()
}

/// Reconstructs the prefixed name for a resolved (namespace, local) pair. Elements may use the
/// default namespace, attributes never do.
fn written_name(
    node: roxmltree::Node,
    namespace: Option<&str>,
    local_name: &str,
    is_element: bool,
) -> String {
    let Some(uri) = namespace else {
        return local_name.to_string();
    };
    if uri == XML_NAMESPACE {
        return format!("xml:{local_name}");
    }

    let bindings: Vec<Option<&str>> = node
        .namespaces()
        .filter(|ns| ns.uri() == uri)
        .map(|ns| ns.name())
        .collect();
    if is_element && bindings.contains(&None) {
        return local_name.to_string();
    }
    match bindings.into_iter().flatten().next() {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.to_string(),
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| XsdError::Serialize(e.to_string()))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(element) => write_element(writer, element),
        XmlNode::Text(text) => write_event(writer, Event::Text(BytesText::new(text))),
        XmlNode::Comment(text) => write_event(
            writer,
            Event::Comment(BytesText::from_escaped(text.as_str())),
        ),
        XmlNode::ProcessingInstruction { target, data } => {
            let content = match data {
                Some(data) => format!("{target} {data}"),
                None => target.clone(),
            };
            write_event(writer, Event::PI(BytesPI::new(content)))
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for declaration in &element.namespace_declarations {
        let key = match &declaration.prefix {
            Some(prefix) => format!("xmlns:{prefix}"),
            None => "xmlns".to_string(),
        };
        start.push_attribute((key.as_str(), declaration.uri.as_str()));
    }
    for attribute in &element.attributes {
        start.push_attribute((attribute.name.as_str(), attribute.value.as_str()));
    }

    if element.children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }
    write_event(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"<?xml version="1.0"?>
<!-- leading -->
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:lib="urn:lib">
  <?keep me?>
  <xs:annotation><xs:documentation>A &amp; B</xs:documentation></xs:annotation>
  <xs:element name="book" type="lib:Book"/>
  <!-- trailing -->
</xs:schema>
"#;

    #[test]
    fn keeps_prefixes_and_namespaces() {
        let document = XmlDocument::parse(SOURCE, &ParseOptions::default()).unwrap();
        assert_eq!(document.root.name, "xs:schema");
        assert_eq!(document.root.local_name(), "schema");
        assert_eq!(
            document.root.namespace.as_deref(),
            Some("http://www.w3.org/2001/XMLSchema")
        );
        assert_eq!(document.root.declared_namespace(Some("lib")), Some("urn:lib"));
        let element = document.root.child_elements().nth(1).unwrap();
        assert_eq!(element.name, "xs:element");
        assert_eq!(element.attribute("type"), Some("lib:Book"));
        // Nested elements inherit, they do not redeclare.
        assert!(element.namespace_declarations.is_empty());
    }

    #[test]
    fn keeps_comments_and_processing_instructions() {
        let document = XmlDocument::parse(SOURCE, &ParseOptions::default()).unwrap();
        assert_eq!(document.prolog, vec![XmlNode::Comment(" leading ".into())]);
        assert!(document.root.children.contains(&XmlNode::ProcessingInstruction {
            target: "keep".into(),
            data: Some("me".into()),
        }));
        assert!(document
            .root
            .children
            .contains(&XmlNode::Comment(" trailing ".into())));
    }

    #[test]
    fn serializes_and_parses_back_to_the_same_tree() {
        let document = XmlDocument::parse(SOURCE, &ParseOptions::default()).unwrap();
        let bytes = document.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("A &amp; B"));
        assert!(text.contains("<?keep me?>"));

        let reparsed = XmlDocument::parse(&text, &ParseOptions::default()).unwrap();
        assert_eq!(reparsed, document);
    }

    #[test]
    fn default_namespace_elements_stay_unprefixed() {
        let source = r#"<schema xmlns="http://www.w3.org/2001/XMLSchema"><element name="a"/></schema>"#;
        let document = XmlDocument::parse(source, &ParseOptions::default()).unwrap();
        assert_eq!(document.root.name, "schema");
        let element = document.root.child_elements().next().unwrap();
        assert_eq!(element.name, "element");
        assert!(element.is("http://www.w3.org/2001/XMLSchema", "element"));
    }

    #[test]
    fn rejects_dtd_unless_allowed() {
        let source = r#"<!DOCTYPE schema []><schema/>"#;
        assert!(XmlDocument::parse(source, &ParseOptions::default()).is_err());
        let options = ParseOptions { allow_dtd: true };
        assert!(XmlDocument::parse(source, &options).is_ok());
    }

    #[test]
    fn attribute_helpers() {
        let mut element = Element::new("xs:element", Some("http://www.w3.org/2001/XMLSchema"));
        element.set_attribute("name", "a");
        element.set_attribute("name", "b");
        assert_eq!(element.attribute("name"), Some("b"));
        assert_eq!(element.remove_attribute("name"), Some("b".into()));
        assert_eq!(element.attribute("name"), None);
    }
}
