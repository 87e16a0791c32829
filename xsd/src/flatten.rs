//! Splicing `<xs:include>`d documents into the including document.
//!
//! Every physical file is incorporated at most once per session, identified by its canonical
//! path, so diamonds and cycles in the include graph terminate with each definition present once.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Result, XsdError};
use crate::import::{is_url, ImportStatement, IncludeStatement};
use crate::namespaces::Bindings;
use crate::relocate::relocate_nodes;
use crate::schema::{definition_kind, DefinitionKind, SchemaDocument, SymbolSpace};
use crate::tree::{ParseOptions, XmlNode};

/// Outcome of one flattening call.
#[derive(Debug, Default)]
pub struct FlattenReport {
    /// Files spliced in, in the order they were read.
    pub included: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
}

/// Resolves every include of `main`, recursively, in place.
pub fn flatten(main: &mut SchemaDocument, options: &ParseOptions) -> Result<FlattenReport> {
    FlattenSession::new(main, options).flatten(main)
}

/// State of one flattening call: the identities already incorporated and the origin of every
/// definition seen so far.
#[derive(Debug)]
pub struct FlattenSession {
    options: ParseOptions,
    seen: HashSet<PathBuf>,
    included: Vec<PathBuf>,
    origins: HashMap<(SymbolSpace, String), Vec<(DefinitionKind, Option<PathBuf>)>>,
    diagnostics: Diagnostics,
}

impl FlattenSession {
    pub fn new(main: &SchemaDocument, options: &ParseOptions) -> Self {
        let mut seen = HashSet::new();
        if let Some(path) = main.path() {
            seen.insert(identity(path));
        }
        Self {
            options: *options,
            seen,
            included: Vec::new(),
            origins: HashMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn flatten(mut self, main: &mut SchemaDocument) -> Result<FlattenReport> {
        self.record_definitions(main);
        self.flatten_document(main)?;
        self.report_collisions();
        Ok(FlattenReport {
            included: self.included,
            diagnostics: self.diagnostics,
        })
    }

    fn flatten_document(&mut self, document: &mut SchemaDocument) -> Result<()> {
        let base_dir = document.base_dir();
        let mut index = 0;
        while index < document.root().children.len() {
            let Some(include) = document.root().children[index]
                .as_element()
                .and_then(|element| IncludeStatement::from_element(element, index))
            else {
                index += 1;
                continue;
            };

            let Some(location) = include.schema_location else {
                let removed = document.root_mut().children.remove(index);
                if let XmlNode::Element(element) = removed {
                    self.diagnostics.push(Warning::MissingLocation {
                        statement: element.name,
                    });
                }
                continue;
            };

            let path = base_dir.join(&location);
            let canonical = fs::canonicalize(&path).map_err(|source| XsdError::Unresolvable {
                location: location.clone(),
                path: path.clone(),
                source,
            })?;
            if !self.seen.insert(canonical) {
                debug!("{} already included, dropping include", path.display());
                document.root_mut().children.remove(index);
                continue;
            }

            let mut included = SchemaDocument::parse_file(&path, &self.options)?;
            self.record_definitions(&included);
            self.flatten_document(&mut included)?;
            info!("including {}", path.display());
            self.included.push(path);

            let nodes = self.splice(document, included);
            let count = nodes.len();
            document.root_mut().children.splice(index..=index, nodes);
            index += count;
        }
        move_imports_to_front(document);
        Ok(())
    }

    /// Prepares the content of `included` for insertion into `document`: merges prefix
    /// declarations, requalifies names and hoists imports `document` does not have yet.
    fn splice(&mut self, document: &mut SchemaDocument, mut included: SchemaDocument) -> Vec<XmlNode> {
        let incoming_namespace = included.target_namespace().map(str::to_string);
        let target_namespace = document.target_namespace().map(str::to_string);
        if incoming_namespace.is_some() && incoming_namespace != target_namespace {
            warn!(
                "{} has target namespace {:?} but is included into {:?}",
                display_path(included.path()),
                incoming_namespace,
                target_namespace
            );
        }
        let adopt = |namespace: Option<&str>| -> Option<String> {
            if namespace == incoming_namespace.as_deref() {
                target_namespace.clone()
            } else {
                namespace.map(str::to_string)
            }
        };

        let mut bindings = Bindings::new(document.root().namespace_declarations.clone());
        for declaration in &included.root().namespace_declarations {
            let Some(prefix) = declaration.prefix.as_deref() else {
                continue;
            };
            if declaration.uri.is_empty() {
                continue;
            }
            let Some(uri) = adopt(Some(declaration.uri.as_str())) else {
                continue;
            };
            if !bindings.bind(prefix, &uri) {
                self.diagnostics.push(Warning::PrefixConflict {
                    file: included.path().map(Path::to_path_buf),
                    prefix: prefix.to_string(),
                    existing: bindings.uri_for(Some(prefix)).unwrap_or_default().to_string(),
                    incoming: uri,
                });
            }
        }

        let mut scope = included.root_scope();
        let mut nodes = mem::take(&mut included.root_mut().children);
        relocate_nodes(&mut nodes, &mut scope, &mut bindings, &adopt);
        for warning in bindings.take_warnings() {
            self.diagnostics.push(warning);
        }
        document.root_mut().namespace_declarations = bindings.into_declarations();

        let from_dir = included.base_dir();
        let to_dir = document.base_dir();
        let mut imported: Vec<Option<String>> = document
            .imports()
            .into_iter()
            .map(|import| import.namespace)
            .collect();
        nodes.retain_mut(|node| {
            let Some(element) = node.as_element_mut() else {
                return true;
            };
            let Some(import) = ImportStatement::from_element(element, 0) else {
                return true;
            };
            if imported.contains(&import.namespace) {
                debug!("import of {:?} already present", import.namespace);
                return false;
            }
            if let Some(location) = &import.schema_location {
                element.set_attribute("schemaLocation", rebase(location, &from_dir, &to_dir));
            }
            imported.push(import.namespace);
            true
        });
        nodes
    }

    fn record_definitions(&mut self, document: &SchemaDocument) {
        for definition in document.definitions() {
            let Some(name) = definition.name else {
                continue;
            };
            self.origins
                .entry((definition.kind.symbol_space(), name.to_string()))
                .or_default()
                .push((definition.kind, document.path().map(Path::to_path_buf)));
        }
    }

    fn report_collisions(&mut self) {
        let mut collisions: Vec<_> = self
            .origins
            .iter()
            .filter(|(_, origins)| origins.len() > 1)
            .collect();
        collisions.sort_by(|a, b| a.0.cmp(b.0));

        let mut warnings = Vec::new();
        for ((_, name), origins) in collisions {
            let (_, first) = &origins[0];
            for (kind, file) in &origins[1..] {
                warnings.push(Warning::NameCollision {
                    file: file.clone(),
                    kind: *kind,
                    name: name.clone(),
                    other: first.clone(),
                });
            }
        }
        for warning in warnings {
            self.diagnostics.push(warning);
        }
    }
}

/// Imports spliced in after the first definition move up to just before it.
fn move_imports_to_front(document: &mut SchemaDocument) {
    let children = &mut document.root_mut().children;
    let Some(first_definition) = children
        .iter()
        .position(|node| node.as_element().and_then(definition_kind).is_some())
    else {
        return;
    };

    let mut late_imports = Vec::new();
    let mut index = first_definition;
    while index < children.len() {
        let is_import = children[index]
            .as_element()
            .and_then(|element| ImportStatement::from_element(element, index))
            .is_some();
        if is_import {
            late_imports.push(children.remove(index));
        } else {
            index += 1;
        }
    }
    children.splice(first_definition..first_definition, late_imports);
}

/// Rewrites a location relative to `from_dir` so it can be resolved from `to_dir`.
fn rebase(location: &str, from_dir: &Path, to_dir: &Path) -> String {
    if is_url(location) || Path::new(location).is_absolute() {
        return location.to_string();
    }
    let from_dir = fs::canonicalize(from_dir).unwrap_or_else(|_| from_dir.to_path_buf());
    let to_dir = fs::canonicalize(to_dir).unwrap_or_else(|_| to_dir.to_path_buf());
    if from_dir == to_dir {
        return location.to_string();
    }
    let joined = from_dir.join(location);
    let rebased = joined.strip_prefix(&to_dir).unwrap_or(&joined);
    rebased.to_string_lossy().replace('\\', "/")
}

pub(crate) fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn display_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "<main document>".to_string(), |p| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(
            &path,
            format!(r#"<xs:schema {XS} xmlns="urn:m" targetNamespace="urn:m">{body}</xs:schema>"#),
        )
        .unwrap();
        path
    }

    fn flatten_file(path: &Path) -> (SchemaDocument, FlattenReport) {
        let mut document = SchemaDocument::parse_file(path, &ParseOptions::default()).unwrap();
        let report = flatten(&mut document, &ParseOptions::default()).unwrap();
        (document, report)
    }

    fn names(document: &SchemaDocument) -> Vec<&str> {
        document.definitions().filter_map(|d| d.name).collect()
    }

    #[test]
    fn splices_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.xsd", r#"<xs:simpleType name="B"><xs:restriction base="xs:string"/></xs:simpleType>"#);
        let a = write(
            &dir,
            "a.xsd",
            r#"<xs:element name="first" type="B"/><xs:include schemaLocation="b.xsd"/><xs:element name="last" type="B"/>"#,
        );
        let (document, report) = flatten_file(&a);
        assert_eq!(names(&document), ["first", "B", "last"]);
        assert!(document.includes().is_empty());
        assert_eq!(report.included.len(), 1);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn diamond_includes_shared_file_once() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "d.xsd", r#"<xs:simpleType name="D"><xs:restriction base="xs:string"/></xs:simpleType>"#);
        write(&dir, "b.xsd", r#"<xs:include schemaLocation="d.xsd"/><xs:element name="b" type="D"/>"#);
        write(&dir, "c.xsd", r#"<xs:include schemaLocation="d.xsd"/><xs:element name="c" type="D"/>"#);
        let a = write(
            &dir,
            "a.xsd",
            r#"<xs:include schemaLocation="b.xsd"/><xs:include schemaLocation="c.xsd"/>"#,
        );
        let (document, report) = flatten_file(&a);
        assert_eq!(names(&document), ["D", "b", "c"]);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.xsd", r#"<xs:include schemaLocation="a.xsd"/><xs:element name="b"/>"#);
        let a = write(&dir, "a.xsd", r#"<xs:include schemaLocation="b.xsd"/><xs:element name="a"/>"#);
        let (document, _) = flatten_file(&a);
        assert_eq!(names(&document), ["b", "a"]);
        assert!(document.includes().is_empty());
    }

    #[test]
    fn chameleon_content_adopts_the_target_namespace() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("c.xsd"),
            format!(
                r#"<xs:schema {XS}><xs:complexType name="C"><xs:sequence><xs:element name="x" type="S"/></xs:sequence></xs:complexType><xs:simpleType name="S"><xs:restriction base="xs:int"/></xs:simpleType></xs:schema>"#
            ),
        )
        .unwrap();
        let main = dir.path().join("main.xsd");
        fs::write(
            &main,
            format!(
                r#"<xs:schema {XS} xmlns:m="urn:m" targetNamespace="urn:m"><xs:include schemaLocation="c.xsd"/><xs:element name="e" type="m:C"/></xs:schema>"#
            ),
        )
        .unwrap();
        let (document, _) = flatten_file(&main);
        let values: Vec<_> = document.references().into_iter().map(|r| r.value).collect();
        assert_eq!(values, ["m:S", "xs:int", "m:C"]);
    }

    #[test]
    fn conflicting_prefix_is_reported_and_renamed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.xsd"),
            format!(
                r#"<xs:schema {XS} xmlns:p="urn:other-b" xmlns="urn:m" targetNamespace="urn:m"><xs:element name="b" type="p:T"/></xs:schema>"#
            ),
        )
        .unwrap();
        let main = dir.path().join("main.xsd");
        fs::write(
            &main,
            format!(
                r#"<xs:schema {XS} xmlns:p="urn:other-a" xmlns="urn:m" targetNamespace="urn:m"><xs:include schemaLocation="b.xsd"/></xs:schema>"#
            ),
        )
        .unwrap();
        let (document, report) = flatten_file(&main);
        assert!(matches!(
            report.diagnostics.warnings(),
            [Warning::PrefixConflict { prefix, .. }] if prefix == "p"
        ));
        assert_eq!(document.namespace_uri(Some("p")), Some("urn:other-a"));
        let element = document.definition(DefinitionKind::Element, "b").unwrap();
        assert_eq!(element.element.attribute("type"), Some("ns0:T"));
        assert_eq!(document.namespace_uri(Some("ns0")), Some("urn:other-b"));
    }

    #[test]
    fn hoists_external_imports_once() {
        let dir = tempfile::tempdir().unwrap();
        let import = r#"<xs:import namespace="http://www.w3.org/XML/1998/namespace" schemaLocation="http://www.w3.org/2001/xml.xsd"/>"#;
        write(&dir, "b.xsd", &format!(r#"{import}<xs:element name="b"/>"#));
        let a = write(
            &dir,
            "a.xsd",
            r#"<xs:element name="a"/><xs:include schemaLocation="b.xsd"/>"#,
        );
        let (document, _) = flatten_file(&a);
        let kinds: Vec<_> = document
            .root()
            .child_elements()
            .map(|e| e.local_name())
            .collect();
        assert_eq!(kinds, ["import", "element", "element"]);
    }

    #[test]
    fn reports_duplicate_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let b = write(&dir, "b.xsd", r#"<xs:element name="dup"/>"#);
        let a = write(&dir, "a.xsd", r#"<xs:element name="dup"/><xs:include schemaLocation="b.xsd"/>"#);
        let (document, report) = flatten_file(&a);
        assert_eq!(names(&document), ["dup", "dup"]);
        match report.diagnostics.warnings() {
            [Warning::NameCollision { file, other, name, .. }] => {
                assert_eq!(name, "dup");
                assert_eq!(file.as_deref(), Some(b.as_path()));
                assert_eq!(other.as_deref(), Some(a.as_path()));
            }
            other => panic!("unexpected warnings {other:?}"),
        }
    }

    #[test]
    fn missing_location_is_dropped_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.xsd", r#"<xs:include/><xs:element name="a"/>"#);
        let (document, report) = flatten_file(&a);
        assert!(document.includes().is_empty());
        assert!(matches!(
            report.diagnostics.warnings(),
            [Warning::MissingLocation { .. }]
        ));
    }

    #[test]
    fn unreadable_include_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.xsd", r#"<xs:include schemaLocation="nope.xsd"/>"#);
        let mut document = SchemaDocument::parse_file(&a, &ParseOptions::default()).unwrap();
        let error = flatten(&mut document, &ParseOptions::default()).unwrap_err();
        assert!(matches!(error, XsdError::Unresolvable { .. }));
    }

    #[test]
    fn rebases_relative_locations() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        assert_eq!(rebase("x.xsd", &sub, dir.path()), "sub/x.xsd");
        assert_eq!(rebase("x.xsd", dir.path(), dir.path()), "x.xsd");
        assert_eq!(
            rebase("http://example.com/x.xsd", &sub, dir.path()),
            "http://example.com/x.xsd"
        );
    }
}
