use crate::schema::XS_NAMESPACE;
use crate::tree::Element;

/// An `<xs:import>` child of the schema element.
///
/// Note that an import is allowed to have neither a `schemaLocation` nor a `namespace` attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportStatement {
    pub namespace: Option<String>,
    pub schema_location: Option<String>,
    /// Position among the schema element's children.
    pub index: usize,
}

impl ImportStatement {
    pub const TAG_NAME: &'static str = "import";

    pub fn from_element(element: &Element, index: usize) -> Option<Self> {
        if !element.is(XS_NAMESPACE, Self::TAG_NAME) {
            return None;
        }
        Some(Self {
            namespace: element
                .attribute("namespace")
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            schema_location: non_empty_location(element),
            index,
        })
    }

    /// Imports that point nowhere, or at a URL, are left to the consumer of the schema.
    pub fn is_external(&self) -> bool {
        match self.schema_location.as_deref() {
            None => true,
            Some(location) => is_url(location),
        }
    }
}

/// An `<xs:include>` child of the schema element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeStatement {
    pub schema_location: Option<String>,
    pub index: usize,
}

impl IncludeStatement {
    pub const TAG_NAME: &'static str = "include";

    pub fn from_element(element: &Element, index: usize) -> Option<Self> {
        if !element.is(XS_NAMESPACE, Self::TAG_NAME) {
            return None;
        }
        Some(Self {
            schema_location: non_empty_location(element),
            index,
        })
    }
}

fn non_empty_location(element: &Element) -> Option<String> {
    element
        .attribute("schemaLocation")
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .map(str::to_string)
}

pub(crate) fn is_url(location: &str) -> bool {
    let Some((scheme, _)) = location.split_once("://") else {
        return false;
    };
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(namespace: Option<&str>, location: Option<&str>) -> Element {
        let mut element = Element::new("xs:import", Some(XS_NAMESPACE));
        if let Some(namespace) = namespace {
            element.set_attribute("namespace", namespace);
        }
        if let Some(location) = location {
            element.set_attribute("schemaLocation", location);
        }
        element
    }

    #[test]
    fn reads_import_attributes() {
        let statement =
            ImportStatement::from_element(&import(Some("urn:lib"), Some("lib.xsd")), 3).unwrap();
        assert_eq!(statement.namespace.as_deref(), Some("urn:lib"));
        assert_eq!(statement.schema_location.as_deref(), Some("lib.xsd"));
        assert_eq!(statement.index, 3);
        assert!(!statement.is_external());
    }

    #[test]
    fn imports_without_local_location_are_external() {
        let statement =
            ImportStatement::from_element(&import(Some(crate::tree::XML_NAMESPACE), None), 0)
                .unwrap();
        assert!(statement.is_external());
        let statement = ImportStatement::from_element(
            &import(None, Some("http://www.w3.org/2001/xml.xsd")),
            0,
        )
        .unwrap();
        assert!(statement.is_external());
    }

    #[test]
    fn ignores_other_elements() {
        let element = Element::new("xs:include", Some(XS_NAMESPACE));
        assert!(ImportStatement::from_element(&element, 0).is_none());
        assert!(IncludeStatement::from_element(&element, 0).is_some());
    }
}
