use log::debug;

use crate::diagnostics::Warning;
use crate::schema::XS_NAMESPACE;
use crate::tree::{Element, NamespaceDeclaration, XML_NAMESPACE};
use crate::xstypes::{PrefixedName, QName};

/// In-scope namespace bindings while walking down a tree.
#[derive(Clone, Debug, Default)]
pub struct NamespaceScope {
    bindings: Vec<NamespaceDeclaration>,
    marks: Vec<usize>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `element`, making its declarations visible.
    pub fn push(&mut self, element: &Element) {
        self.marks.push(self.bindings.len());
        self.bindings
            .extend(element.namespace_declarations.iter().cloned());
    }

    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    /// URI bound to `prefix`; `None` selects the default namespace. An empty URI (`xmlns=""`)
    /// counts as unbound.
    pub fn namespace_for(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Resolves a QName-valued attribute token. Unprefixed names take the default namespace.
    /// Returns `None` if the prefix is not bound.
    pub fn resolve(&self, lexical: &str) -> Option<QName> {
        let name = PrefixedName::parse(lexical);
        let namespace = match name.prefix {
            Some(prefix) => Some(self.namespace_for(Some(prefix))?),
            None => self.namespace_for(None),
        };
        Some(QName::with_optional_namespace(namespace, name.local_name))
    }
}

/// The prefix bindings of a destination root element, extended on demand while content from
/// another namespace context is moved under it.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    declarations: Vec<NamespaceDeclaration>,
    /// No-namespace names written while a default namespace was bound.
    captured: Vec<String>,
}

impl Bindings {
    pub fn new(declarations: Vec<NamespaceDeclaration>) -> Self {
        Self {
            declarations,
            captured: Vec::new(),
        }
    }

    pub fn into_declarations(self) -> Vec<NamespaceDeclaration> {
        self.declarations
    }

    pub fn declarations(&self) -> &[NamespaceDeclaration] {
        &self.declarations
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.uri_for(None)
    }

    pub fn uri_for(&self, prefix: Option<&str>) -> Option<&str> {
        self.declarations
            .iter()
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// A non-empty prefix bound to `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|d| d.uri == uri && d.prefix.is_some())
            .and_then(|d| d.prefix.as_deref())
    }

    /// Binds `prefix` to `uri`. Returns `false` and changes nothing if `prefix` is already bound to
    /// a different URI.
    pub fn bind(&mut self, prefix: &str, uri: &str) -> bool {
        match self.uri_for(Some(prefix)) {
            Some(existing) => existing == uri,
            None => {
                self.declarations.push(NamespaceDeclaration {
                    prefix: Some(prefix.to_string()),
                    uri: uri.to_string(),
                });
                true
            }
        }
    }

    /// Returns a prefix bound to `uri`, declaring one if none is. `hint` is tried before falling back
    /// to `xs` for the schema namespace or `ns0`, `ns1`, ...
    pub fn ensure_prefix(&mut self, uri: &str, hint: Option<&str>) -> String {
        if uri == XML_NAMESPACE {
            return "xml".to_string();
        }
        if let Some(prefix) = self.prefix_for(uri) {
            return prefix.to_string();
        }

        let is_free = |bindings: &Self, prefix: &str| {
            !prefix.is_empty() && prefix != "xml" && bindings.uri_for(Some(prefix)).is_none()
        };
        let prefix = match hint {
            Some(hint) if is_free(self, hint) => hint.to_string(),
            _ if uri == XS_NAMESPACE && is_free(self, "xs") => "xs".to_string(),
            _ => (0..)
                .map(|n| format!("ns{n}"))
                .find(|candidate| is_free(self, candidate))
                .unwrap_or_default(),
        };
        debug!("declaring prefix {prefix:?} for {uri:?}");
        self.bind(&prefix, uri);
        prefix
    }

    /// Writes `local_name` so that it resolves to `namespace` under these bindings.
    pub fn qualify(&mut self, namespace: Option<&str>, local_name: &str, hint: Option<&str>) -> String {
        match namespace {
            None => {
                // There is no way to write a no-namespace QName while a default namespace is bound.
                if self.default_namespace().is_some() {
                    self.captured.push(local_name.to_string());
                }
                local_name.to_string()
            }
            Some(uri) if self.default_namespace() == Some(uri) => local_name.to_string(),
            Some(uri) => {
                let prefix = self.ensure_prefix(uri, hint);
                format!("{prefix}:{local_name}")
            }
        }
    }

    /// Like [`Self::qualify`], but never uses the default namespace (attribute names).
    pub fn qualify_attribute(&mut self, namespace: Option<&str>, local_name: &str, hint: Option<&str>) -> String {
        match namespace {
            None => local_name.to_string(),
            Some(uri) => {
                let prefix = self.ensure_prefix(uri, hint);
                format!("{prefix}:{local_name}")
            }
        }
    }

    /// One warning per no-namespace name that had to be written unprefixed under the default
    /// namespace since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        let mut names = std::mem::take(&mut self.captured);
        names.sort();
        names.dedup();
        let default_namespace = self.default_namespace().unwrap_or_default().to_string();
        names
            .into_iter()
            .map(|name| Warning::CapturedByDefaultNamespace {
                name,
                default_namespace: default_namespace.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(prefix: Option<&str>, uri: &str) -> NamespaceDeclaration {
        NamespaceDeclaration {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
        }
    }

    #[test]
    fn scope_shadows_and_restores() {
        let mut outer = Element::new("a", None);
        outer.namespace_declarations = vec![declaration(Some("p"), "urn:outer")];
        let mut inner = Element::new("b", None);
        inner.namespace_declarations = vec![declaration(Some("p"), "urn:inner")];

        let mut scope = NamespaceScope::new();
        scope.push(&outer);
        scope.push(&inner);
        assert_eq!(scope.namespace_for(Some("p")), Some("urn:inner"));
        scope.pop();
        assert_eq!(scope.namespace_for(Some("p")), Some("urn:outer"));
    }

    #[test]
    fn unprefixed_values_take_the_default_namespace() {
        let mut root = Element::new("schema", None);
        root.namespace_declarations = vec![declaration(None, "urn:main")];
        let mut scope = NamespaceScope::new();
        scope.push(&root);
        assert_eq!(
            scope.resolve("Book"),
            Some(QName::with_namespace("urn:main", "Book"))
        );
        assert_eq!(scope.resolve("nope:Book"), None);
        assert_eq!(
            scope.resolve("xml:lang"),
            Some(QName::with_namespace(XML_NAMESPACE, "lang"))
        );
    }

    #[test]
    fn qualify_prefers_existing_bindings() {
        let mut bindings = Bindings::new(vec![
            declaration(None, "urn:main"),
            declaration(Some("xs"), XS_NAMESPACE),
        ]);
        assert_eq!(bindings.qualify(Some("urn:main"), "Book", None), "Book");
        assert_eq!(bindings.qualify(Some(XS_NAMESPACE), "string", None), "xs:string");
        assert_eq!(bindings.qualify(Some("urn:new"), "X", Some("xs")), "ns0:X");
        assert_eq!(bindings.uri_for(Some("ns0")), Some("urn:new"));
        assert_eq!(bindings.qualify(Some("urn:other"), "Y", Some("o")), "o:Y");
    }

    #[test]
    fn bind_refuses_rebinding() {
        let mut bindings = Bindings::new(vec![declaration(Some("a"), "urn:a")]);
        assert!(bindings.bind("a", "urn:a"));
        assert!(!bindings.bind("a", "urn:b"));
        assert_eq!(bindings.uri_for(Some("a")), Some("urn:a"));
    }

    #[test]
    fn prefixed_binding_is_found_behind_a_default_one() {
        let mut bindings = Bindings::new(vec![
            declaration(None, "urn:a"),
            declaration(Some("a"), "urn:a"),
        ]);
        assert_eq!(bindings.prefix_for("urn:a"), Some("a"));
        assert_eq!(bindings.qualify_attribute(Some("urn:a"), "x", None), "a:x");
        assert_eq!(bindings.declarations().len(), 2);
    }

    #[test]
    fn no_namespace_names_under_a_default_namespace_are_reported() {
        let mut bindings = Bindings::new(vec![declaration(None, XS_NAMESPACE)]);
        assert_eq!(bindings.qualify(None, "Book", None), "Book");
        assert_eq!(bindings.qualify(None, "Book", None), "Book");
        assert_eq!(
            bindings.take_warnings(),
            vec![Warning::CapturedByDefaultNamespace {
                name: "Book".into(),
                default_namespace: XS_NAMESPACE.into(),
            }]
        );
        assert!(bindings.take_warnings().is_empty());

        let mut plain = Bindings::new(vec![declaration(Some("xs"), XS_NAMESPACE)]);
        plain.qualify(None, "Book", None);
        assert!(plain.take_warnings().is_empty());
    }
}
