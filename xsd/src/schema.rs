//! A parsed schema document: the XML tree plus the XSD view on it (target namespace, top-level
//! definitions, import and include statements, references).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Result, XsdError};
use crate::import::{ImportStatement, IncludeStatement};
use crate::namespaces::NamespaceScope;
use crate::reference::{collect_references, Reference};
use crate::tree::{Element, NamespaceDeclaration, ParseOptions, XmlDocument};

pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// The kinds of named top-level schema components.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefinitionKind {
    Element,
    Attribute,
    ComplexType,
    SimpleType,
    Group,
    AttributeGroup,
    Notation,
}

impl DefinitionKind {
    pub const ALL: [Self; 7] = [
        Self::Element,
        Self::Attribute,
        Self::ComplexType,
        Self::SimpleType,
        Self::Group,
        Self::AttributeGroup,
        Self::Notation,
    ];

    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::ComplexType => "complexType",
            Self::SimpleType => "simpleType",
            Self::Group => "group",
            Self::AttributeGroup => "attributeGroup",
            Self::Notation => "notation",
        }
    }

    pub fn from_tag_name(tag_name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag_name() == tag_name)
    }

    /// Simple and complex types share one symbol space; every other kind has its own.
    pub fn symbol_space(self) -> SymbolSpace {
        match self {
            Self::Element => SymbolSpace::Element,
            Self::Attribute => SymbolSpace::Attribute,
            Self::ComplexType | Self::SimpleType => SymbolSpace::Type,
            Self::Group => SymbolSpace::Group,
            Self::AttributeGroup => SymbolSpace::AttributeGroup,
            Self::Notation => SymbolSpace::Notation,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolSpace {
    Element,
    Attribute,
    Type,
    Group,
    AttributeGroup,
    Notation,
}

/// One top-level definition of a schema document.
#[derive(Copy, Clone, Debug)]
pub struct Definition<'a> {
    /// Position among the schema element's children.
    pub index: usize,
    pub kind: DefinitionKind,
    pub name: Option<&'a str>,
    pub element: &'a Element,
}

impl<'a> Definition<'a> {
    pub fn from_element(element: &'a Element, index: usize) -> Option<Self> {
        if element.namespace.as_deref() != Some(XS_NAMESPACE) {
            return None;
        }
        let kind = DefinitionKind::from_tag_name(element.local_name())?;
        Some(Self {
            index,
            kind,
            name: element.attribute("name"),
            element,
        })
    }
}

/// Reads a schema file as text.
pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| XsdError::Unresolvable {
        location: path.display().to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Whether `element` is a top-level definition, without borrowing it for a [`Definition`].
pub(crate) fn definition_kind(element: &Element) -> Option<DefinitionKind> {
    if element.namespace.as_deref() != Some(XS_NAMESPACE) {
        return None;
    }
    DefinitionKind::from_tag_name(element.local_name())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaDocument {
    path: Option<PathBuf>,
    xml: XmlDocument,
}

impl SchemaDocument {
    pub const TAG_NAME: &'static str = "schema";

    /// Reads and parses the file at `path`. A missing or unreadable file is reported as
    /// [`XsdError::Unresolvable`].
    pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<Self> {
        let text = read_source(path)?;
        let mut document = Self::parse_str(&text, &path.display().to_string(), options)?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    /// Parses `text`. `origin` names the source in error messages.
    pub fn parse_str(text: &str, origin: &str, options: &ParseOptions) -> Result<Self> {
        let xml = XmlDocument::parse(text, options).map_err(|source| XsdError::Malformed {
            origin: origin.to_string(),
            source,
        })?;
        Self::from_xml(xml, origin)
    }

    pub fn from_xml(xml: XmlDocument, origin: &str) -> Result<Self> {
        if !xml.root.is(XS_NAMESPACE, Self::TAG_NAME) {
            return Err(XsdError::NotASchema {
                origin: origin.to_string(),
                found: xml.root.name.clone(),
            });
        }
        Ok(Self { path: None, xml })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Directory relative locations in this document are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    pub fn root(&self) -> &Element {
        &self.xml.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.xml.root
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.root()
            .attribute("targetNamespace")
            .filter(|ns| !ns.is_empty())
    }

    /// Prefix bindings declared on the schema element, in document order.
    pub fn namespaces(&self) -> &[NamespaceDeclaration] {
        &self.root().namespace_declarations
    }

    pub fn namespace_uri(&self, prefix: Option<&str>) -> Option<&str> {
        self.root().declared_namespace(prefix)
    }

    /// A non-empty prefix the schema element binds to `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.namespaces()
            .iter()
            .find(|d| d.uri == uri && d.prefix.is_some())
            .and_then(|d| d.prefix.as_deref())
    }

    pub fn definitions(&self) -> impl Iterator<Item = Definition<'_>> {
        self.root()
            .children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| Definition::from_element(node.as_element()?, index))
    }

    pub fn definition(&self, kind: DefinitionKind, name: &str) -> Option<Definition<'_>> {
        self.definitions()
            .find(|d| d.kind == kind && d.name == Some(name))
    }

    pub fn imports(&self) -> Vec<ImportStatement> {
        self.root()
            .children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| ImportStatement::from_element(node.as_element()?, index))
            .collect()
    }

    pub fn includes(&self) -> Vec<IncludeStatement> {
        self.root()
            .children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| IncludeStatement::from_element(node.as_element()?, index))
            .collect()
    }

    /// The bindings in effect directly below the schema element.
    pub fn root_scope(&self) -> NamespaceScope {
        let mut scope = NamespaceScope::new();
        scope.push(self.root());
        scope
    }

    pub fn references_in(&self, definition: &Definition) -> Vec<Reference> {
        let mut scope = self.root_scope();
        let mut references = Vec::new();
        collect_references(definition.element, &mut scope, &mut references);
        references
    }

    /// Every reference in the document, including those outside definitions.
    pub fn references(&self) -> Vec<Reference> {
        let mut references = Vec::new();
        collect_references(self.root(), &mut NamespaceScope::new(), &mut references);
        references
    }

    /// The local definition `reference` designates, if it points into this document's target
    /// namespace and such a definition exists.
    pub fn resolve(&self, reference: &Reference) -> Option<Definition<'_>> {
        let name = reference.name.as_ref()?;
        if name.namespace_name.as_deref() != self.target_namespace() {
            return None;
        }
        reference
            .target
            .kinds()
            .iter()
            .find_map(|kind| self.definition(*kind, &name.local_name))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.xml.to_bytes()
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        fs::write(path, bytes).map_err(|source| XsdError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("wrote {}", path.display());
        Ok(())
    }
}
