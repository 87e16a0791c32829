//! Prefixing the top-level definitions of a schema and every reference to them.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::diagnostics::Warning;
use crate::exclusions::ExclusionSet;
use crate::namespaces::NamespaceScope;
use crate::reference::{rewrite_references, unknown_reference_attributes, RefTarget};
use crate::schema::{definition_kind, DefinitionKind, SchemaDocument, SymbolSpace};
use crate::tree::XmlNode;
use crate::xstypes::PrefixedName;

/// Old (kind, name) to new name, for the definitions that were renamed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameMap {
    names: BTreeMap<(DefinitionKind, String), String>,
}

impl RenameMap {
    pub fn get(&self, kind: DefinitionKind, name: &str) -> Option<&str> {
        self.names
            .get(&(kind, name.to_string()))
            .map(String::as_str)
    }

    /// New name for a reference into `target`, trying each candidate kind in order.
    pub fn lookup(&self, target: RefTarget, name: &str) -> Option<&str> {
        target.kinds().iter().find_map(|kind| self.get(*kind, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefinitionKind, &str, &str)> {
        self.names
            .iter()
            .map(|((kind, old), new)| (*kind, old.as_str(), new.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Result of [`Renamer::rename`].
#[derive(Clone, Debug)]
pub struct Renamed {
    pub document: SchemaDocument,
    pub map: RenameMap,
    pub warnings: Vec<Warning>,
}

pub struct Renamer<'a> {
    prefix: &'a str,
    exclusions: &'a ExclusionSet,
}

impl<'a> Renamer<'a> {
    pub fn new(prefix: &'a str, exclusions: &'a ExclusionSet) -> Self {
        Self { prefix, exclusions }
    }

    pub fn new_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// Returns a renamed copy of `document`; `document` itself is left untouched.
    pub fn rename(&self, document: &SchemaDocument) -> Renamed {
        let mut warnings = unknown_reference_attributes(document.root());
        let map = self.plan(document, &mut warnings);

        let mut copy = document.clone();
        let own_namespace = document.target_namespace().map(str::to_string);

        // References first, while the scope still sees the original declarations.
        rewrite_references(
            copy.root_mut(),
            &mut NamespaceScope::new(),
            &mut |reference| {
                let name = reference.name.as_ref()?;
                if name.namespace_name != own_namespace {
                    return None;
                }
                let new_name = map.lookup(reference.target, &name.local_name)?;
                Some(match PrefixedName::parse(&reference.value).prefix {
                    Some(prefix) => format!("{prefix}:{new_name}"),
                    None => new_name.to_string(),
                })
            },
        );

        for element in copy
            .root_mut()
            .children
            .iter_mut()
            .filter_map(XmlNode::as_element_mut)
        {
            let Some(kind) = definition_kind(element) else {
                continue;
            };
            let Some(new_name) = element.attribute("name").and_then(|name| map.get(kind, name))
            else {
                continue;
            };
            let new_name = new_name.to_string();
            element.set_attribute("name", new_name);
        }

        Renamed {
            document: copy,
            map,
            warnings,
        }
    }

    /// The map [`Self::rename`] would apply to `document`, without renaming anything.
    pub fn rename_map(&self, document: &SchemaDocument) -> RenameMap {
        self.plan(document, &mut Vec::new())
    }

    /// Builds the rename map from the pre-rename names. A new name that would clash with the
    /// final name of another definition in the same symbol space is dropped, latest first.
    fn plan(&self, document: &SchemaDocument, warnings: &mut Vec<Warning>) -> RenameMap {
        let definitions: Vec<(DefinitionKind, &str)> = document
            .definitions()
            .filter_map(|d| Some((d.kind, d.name?)))
            .collect();

        let mut names: BTreeMap<(DefinitionKind, String), String> = definitions
            .iter()
            .filter(|(_, name)| !self.exclusions.contains(name))
            .map(|(kind, name)| ((*kind, name.to_string()), self.new_name(name)))
            .collect();

        loop {
            let Some((kind, name)) = latest_clash(&definitions, &names) else {
                break;
            };
            names.remove(&(kind, name.to_string()));
            warnings.push(Warning::NameCollision {
                file: document.path().map(|p| p.to_path_buf()),
                kind,
                name: self.new_name(name),
                other: document.path().map(|p| p.to_path_buf()),
            });
        }

        for ((kind, old), new) in &names {
            debug!("renaming {kind} {old:?} to {new:?}");
        }
        RenameMap { names }
    }
}

/// The last renamed definition whose new name is also the final name of another definition in
/// its symbol space.
fn latest_clash<'d>(
    definitions: &[(DefinitionKind, &'d str)],
    names: &BTreeMap<(DefinitionKind, String), String>,
) -> Option<(DefinitionKind, &'d str)> {
    let mut owners: HashMap<(SymbolSpace, &str), Vec<(DefinitionKind, &str)>> = HashMap::new();
    for (kind, name) in definitions {
        let final_name = names
            .get(&(*kind, name.to_string()))
            .map_or(*name, String::as_str);
        owners
            .entry((kind.symbol_space(), final_name))
            .or_default()
            .push((*kind, *name));
    }

    definitions.iter().rev().copied().find(|(kind, name)| {
        let Some(new_name) = names.get(&(*kind, name.to_string())) else {
            return false;
        };
        owners
            .get(&(kind.symbol_space(), new_name.as_str()))
            .is_some_and(|owners| owners.iter().any(|owner| owner != &(*kind, *name)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ParseOptions;

    const LIBRARY: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:lib="urn:lib" targetNamespace="urn:lib">
          <xs:complexType name="Book">
            <xs:sequence>
              <xs:element name="title" type="lib:Title"/>
              <xs:element name="sequel" type="lib:Book" minOccurs="0"/>
              <xs:element name="isbn" type="xs:string"/>
            </xs:sequence>
          </xs:complexType>
          <xs:simpleType name="Title"><xs:restriction base="xs:string"/></xs:simpleType>
          <xs:element name="Book" type="lib:Book"/>
          <xs:element name="shelf">
            <xs:complexType>
              <xs:sequence><xs:element ref="lib:Book"/></xs:sequence>
            </xs:complexType>
          </xs:element>
        </xs:schema>"#;

    fn library() -> SchemaDocument {
        SchemaDocument::parse_str(LIBRARY, "lib.xsd", &ParseOptions::default()).unwrap()
    }

    fn names(document: &SchemaDocument) -> Vec<(DefinitionKind, String)> {
        document
            .definitions()
            .map(|d| (d.kind, d.name.unwrap().to_string()))
            .collect()
    }

    fn references(document: &SchemaDocument) -> Vec<String> {
        document.references().into_iter().map(|r| r.value).collect()
    }

    #[test]
    fn prefixes_definitions_and_references() {
        let exclusions = ExclusionSet::new();
        let renamed = Renamer::new("lib", &exclusions).rename(&library());
        assert_eq!(
            names(&renamed.document),
            [
                (DefinitionKind::ComplexType, "lib_Book".into()),
                (DefinitionKind::SimpleType, "lib_Title".into()),
                (DefinitionKind::Element, "lib_Book".into()),
                (DefinitionKind::Element, "lib_shelf".into()),
            ]
        );
        assert_eq!(
            references(&renamed.document),
            [
                "lib:lib_Title",
                "lib:lib_Book",
                "xs:string",
                "xs:string",
                "lib:lib_Book",
                "lib:lib_Book"
            ]
        );
        assert!(renamed.warnings.is_empty());
    }

    #[test]
    fn original_is_untouched() {
        let original = library();
        let exclusions = ExclusionSet::new();
        let _ = Renamer::new("lib", &exclusions).rename(&original);
        assert_eq!(original, library());
    }

    #[test]
    fn same_name_in_different_kinds_renamed_independently() {
        let exclusions = ExclusionSet::from_iter(["Book"]);
        let renamed = Renamer::new("lib", &exclusions).rename(&library());
        assert!(renamed
            .document
            .definition(DefinitionKind::ComplexType, "Book")
            .is_some());
        assert!(renamed
            .document
            .definition(DefinitionKind::Element, "Book")
            .is_some());
        assert_eq!(renamed.map.get(DefinitionKind::SimpleType, "Title"), Some("lib_Title"));
        assert_eq!(renamed.map.get(DefinitionKind::ComplexType, "Book"), None);
        assert!(references(&renamed.document).contains(&"lib:Book".to_string()));
    }

    #[test]
    fn renaming_twice_prefixes_twice() {
        let exclusions = ExclusionSet::new();
        let renamer = Renamer::new("lib", &exclusions);
        let once = renamer.rename(&library()).document;
        let twice = renamer.rename(&once).document;
        assert!(twice
            .definition(DefinitionKind::SimpleType, "lib_lib_Title")
            .is_some());
        assert_eq!(
            renamer
                .rename(&library())
                .document
                .definitions()
                .filter(|d| d.name.unwrap().starts_with("lib_lib_"))
                .count(),
            0
        );
    }

    #[test]
    fn collision_keeps_the_original_name() {
        let source = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
              <xs:simpleType name="A"><xs:restriction base="xs:string"/></xs:simpleType>
              <xs:complexType name="p_A"><xs:attribute name="x" type="A"/></xs:complexType>
            </xs:schema>"#;
        let document =
            SchemaDocument::parse_str(source, "a.xsd", &ParseOptions::default()).unwrap();
        let exclusions = ExclusionSet::from_iter(["p_A"]);
        let renamed = Renamer::new("p", &exclusions).rename(&document);

        assert_eq!(
            names(&renamed.document),
            [
                (DefinitionKind::SimpleType, "A".into()),
                (DefinitionKind::ComplexType, "p_A".into()),
            ]
        );
        assert_eq!(references(&renamed.document), ["xs:string", "A"]);
        assert!(matches!(
            renamed.warnings.as_slice(),
            [Warning::NameCollision { kind: DefinitionKind::SimpleType, .. }]
        ));
    }
}
