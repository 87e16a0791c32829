//! Turning `<xs:import>`s of local files into `<xs:include>`s of renamed, namespace-less copies.
//!
//! Each imported document is renamed with a prefix, re-homed as a chameleon schema and written
//! next to its source. The importing document then includes the copy and its references into the
//! former namespace are redirected to the renamed definitions.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Result, XsdError};
use crate::exclusions::ExclusionSet;
use crate::flatten::flatten;
use crate::import::ImportStatement;
use crate::namespaces::{Bindings, NamespaceScope};
use crate::reference::rewrite_references;
use crate::relocate::relocate;
use crate::rename::{RenameMap, Renamer};
use crate::schema::SchemaDocument;
use crate::tree::{Element, ParseOptions, XmlNode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Prefix used for documents imported without a namespace.
    pub no_namespace_prefix: String,
    /// Inserted between the prefix and the extension of generated file names.
    pub include_suffix: String,
    pub parse: ParseOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            no_namespace_prefix: "nons".to_string(),
            include_suffix: "_include".to_string(),
            parse: ParseOptions::default(),
        }
    }
}

/// A renamed copy produced by the converter, not yet written.
#[derive(Clone, Debug)]
pub struct GeneratedInclude {
    /// The imported document the copy was made from.
    pub source: PathBuf,
    /// Where the copy goes.
    pub path: PathBuf,
    pub prefix: String,
    /// The namespace the copied definitions had.
    pub namespace: Option<String>,
    pub document: SchemaDocument,
}

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub generated: Vec<GeneratedInclude>,
    pub diagnostics: Diagnostics,
}

impl ConversionReport {
    /// Writes every generated copy to its path.
    pub fn write_generated(&self) -> Result<()> {
        for generated in &self.generated {
            generated.document.write_to(&generated.path)?;
        }
        Ok(())
    }
}

/// Converts every local import of `main`, depth-first. Nothing is written; see
/// [`ConversionReport::write_generated`].
pub fn convert(
    main: &mut SchemaDocument,
    exclusions: &ExclusionSet,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    Converter::new(exclusions, options).convert(main)
}

#[derive(Clone, Debug)]
struct CachedInclude {
    file_name: String,
    namespace: Option<String>,
    map: RenameMap,
}

pub struct Converter<'a> {
    exclusions: &'a ExclusionSet,
    options: &'a ConvertOptions,
    /// Canonical paths of the documents whose imports are being converted, outermost first.
    in_progress: Vec<PathBuf>,
    /// One generated copy per (canonical source, prefix).
    cache: HashMap<(PathBuf, String), CachedInclude>,
    /// Copies still being generated, by canonical source. An import cycle includes these.
    pending: HashMap<PathBuf, CachedInclude>,
    /// Which source each prefix was handed out for.
    prefix_owners: HashMap<String, PathBuf>,
    generated: Vec<GeneratedInclude>,
    diagnostics: Diagnostics,
}

impl<'a> Converter<'a> {
    pub fn new(exclusions: &'a ExclusionSet, options: &'a ConvertOptions) -> Self {
        Self {
            exclusions,
            options,
            in_progress: Vec::new(),
            cache: HashMap::new(),
            pending: HashMap::new(),
            prefix_owners: HashMap::new(),
            generated: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Splices the includes of `main` first, so imports made by included files are converted too.
    pub fn convert(mut self, main: &mut SchemaDocument) -> Result<ConversionReport> {
        if let Some(path) = main.path() {
            self.in_progress.push(crate::flatten::identity(path));
        }
        let flattened = flatten(main, &self.options.parse)?;
        self.diagnostics.extend(flattened.diagnostics);
        self.convert_document(main)?;
        Ok(ConversionReport {
            generated: self.generated,
            diagnostics: self.diagnostics,
        })
    }

    fn convert_document(&mut self, document: &mut SchemaDocument) -> Result<()> {
        let base_dir = document.base_dir();
        let mut redirects: Vec<(Option<String>, RenameMap)> = Vec::new();
        let mut converted_prefixes: Vec<String> = Vec::new();

        for import in document.imports() {
            if import.is_external() {
                debug!("leaving external import of {:?}", import.namespace);
                continue;
            }
            let Some(location) = import.schema_location.clone() else {
                continue;
            };
            let source = base_dir.join(&location);
            let canonical = fs::canonicalize(&source).map_err(|error| XsdError::Unresolvable {
                location: location.clone(),
                path: source.clone(),
                source: error,
            })?;
            let cached = if self.in_progress.contains(&canonical) {
                match self.pending.get(&canonical) {
                    Some(pending) => {
                        debug!("import of {location:?} closes a cycle, including the pending copy");
                        pending.clone()
                    }
                    None => {
                        self.diagnostics.push(Warning::ImportCycle { location });
                        continue;
                    }
                }
            } else {
                let prefix = self.choose_prefix(document, &import, &location, &canonical);
                match self.cache.get(&(canonical.clone(), prefix.clone())) {
                    Some(cached) => cached.clone(),
                    None => self.generate(document, &source, &canonical, &prefix)?,
                }
            };

            let include_location = sibling_location(&location, &cached.file_name);
            debug!("import of {location:?} becomes include of {include_location:?}");
            replace_with_include(document.root_mut(), import.index, &include_location);

            if let Some(namespace) = &import.namespace {
                converted_prefixes.extend(
                    document
                        .namespaces()
                        .iter()
                        .filter(|d| &d.uri == namespace)
                        .filter_map(|d| d.prefix.clone()),
                );
            }
            redirects.push((cached.namespace, cached.map));
        }

        if !redirects.is_empty() {
            for warning in redirect_references(document, &redirects) {
                self.diagnostics.push(warning);
            }
        }
        for prefix in converted_prefixes {
            if !prefix_in_use(document.root(), &prefix) {
                debug!("dropping unused prefix {prefix:?}");
                document.root_mut().undeclare_namespace(Some(&prefix));
            }
        }
        Ok(())
    }

    /// Produces the renamed copy of the document at `source` and remembers it under
    /// (`canonical`, `prefix`).
    fn generate(
        &mut self,
        importer: &SchemaDocument,
        source: &Path,
        canonical: &Path,
        prefix: &str,
    ) -> Result<CachedInclude> {
        let mut imported = SchemaDocument::parse_file(source, &self.options.parse)?;
        let flattened = flatten(&mut imported, &self.options.parse)?;
        self.diagnostics.extend(flattened.diagnostics);

        let namespace = imported.target_namespace().map(str::to_string);
        let renamer = Renamer::new(prefix, self.exclusions);
        let path = generated_path(source, prefix, &self.options.include_suffix);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Converting imports leaves the definitions alone, so the map is already final.
        self.pending.insert(
            canonical.to_path_buf(),
            CachedInclude {
                file_name: file_name.clone(),
                namespace: namespace.clone(),
                map: renamer.rename_map(&imported),
            },
        );
        self.in_progress.push(canonical.to_path_buf());
        let converted = self.convert_document(&mut imported);
        self.in_progress.pop();
        self.pending.remove(canonical);
        converted?;

        let renamed = renamer.rename(&imported);
        for warning in renamed.warnings {
            self.diagnostics.push(warning);
        }

        let mut copy = renamed.document;
        rehome(&mut copy);
        copy.set_path(path.clone());
        self.report_clashes(importer, &copy);
        info!(
            "converted {} with prefix {prefix:?} into {}",
            source.display(),
            path.display()
        );

        let cached = CachedInclude {
            file_name,
            namespace: namespace.clone(),
            map: renamed.map,
        };
        self.cache
            .insert((canonical.to_path_buf(), prefix.to_string()), cached.clone());
        self.generated.push(GeneratedInclude {
            source: source.to_path_buf(),
            path,
            prefix: prefix.to_string(),
            namespace,
            document: copy,
        });
        Ok(cached)
    }

    /// The importer's own prefix for the namespace, else one derived from the file name. A
    /// prefix already handed out for another file gets the smallest free counter appended.
    fn choose_prefix(
        &mut self,
        importer: &SchemaDocument,
        import: &ImportStatement,
        location: &str,
        canonical: &Path,
    ) -> String {
        let base = match import.namespace.as_deref() {
            None => self.options.no_namespace_prefix.clone(),
            Some(namespace) => importer
                .prefix_for(namespace)
                .map(str::to_string)
                .unwrap_or_else(|| prefix_from_location(location)),
        };

        let mut prefix = base.clone();
        let mut counter = 2;
        while self
            .prefix_owners
            .get(&prefix)
            .is_some_and(|owner| owner != canonical)
        {
            prefix = format!("{base}{counter}");
            counter += 1;
        }
        self.prefix_owners
            .insert(prefix.clone(), canonical.to_path_buf());
        prefix
    }

    fn report_clashes(&mut self, importer: &SchemaDocument, copy: &SchemaDocument) {
        let mut warnings = Vec::new();
        for definition in copy.definitions() {
            let Some(name) = definition.name else {
                continue;
            };
            let space = definition.kind.symbol_space();
            if importer
                .definitions()
                .any(|d| d.name == Some(name) && d.kind.symbol_space() == space)
            {
                warnings.push(Warning::NameCollision {
                    file: copy.path().map(Path::to_path_buf),
                    kind: definition.kind,
                    name: name.to_string(),
                    other: importer.path().map(Path::to_path_buf),
                });
            }
        }
        for warning in warnings {
            self.diagnostics.push(warning);
        }
    }
}

/// Drops the target namespace of `copy` so its definitions take the namespace of whoever
/// includes it.
fn rehome(copy: &mut SchemaDocument) {
    let own_namespace = copy.target_namespace().map(str::to_string);
    let root = copy.root_mut();
    let kept = root
        .namespace_declarations
        .iter()
        .filter(|d| d.prefix.is_some() && !d.uri.is_empty())
        .filter(|d| Some(d.uri.as_str()) != own_namespace.as_deref())
        .cloned()
        .collect();
    let mut bindings = Bindings::new(kept);
    let unqualify_own = |namespace: Option<&str>| -> Option<String> {
        if namespace.is_some() && namespace == own_namespace.as_deref() {
            None
        } else {
            namespace.map(str::to_string)
        }
    };
    relocate(root, &mut NamespaceScope::new(), &mut bindings, &unqualify_own);
    root.namespace_declarations = bindings.into_declarations();
    root.remove_attribute("targetNamespace");
}

/// Points references into converted namespaces at the renamed definitions, qualified into the
/// document's own target namespace.
fn redirect_references(
    document: &mut SchemaDocument,
    redirects: &[(Option<String>, RenameMap)],
) -> Vec<Warning> {
    let target_namespace = document.target_namespace().map(str::to_string);
    let root = document.root_mut();
    let mut bindings = Bindings::new(root.namespace_declarations.clone());

    rewrite_references(root, &mut NamespaceScope::new(), &mut |reference| {
        let name = reference.name.as_ref()?;
        let namespace = name.namespace_name.as_deref();
        if namespace == target_namespace.as_deref() {
            return None;
        }
        let mut maps = redirects
            .iter()
            .filter(|(converted, _)| converted.as_deref() == namespace)
            .peekable();
        maps.peek()?;
        let local_name = maps
            .find_map(|(_, map)| map.lookup(reference.target, &name.local_name))
            .unwrap_or(name.local_name.as_str());
        Some(bindings.qualify(target_namespace.as_deref(), local_name, None))
    });

    let warnings = bindings.take_warnings();
    root.namespace_declarations = bindings.into_declarations();
    warnings
}

fn replace_with_include(root: &mut Element, index: usize, location: &str) {
    let Some(element) = root.children.get_mut(index).and_then(XmlNode::as_element_mut) else {
        return;
    };
    element.name = match element.prefix() {
        Some(prefix) => format!("{prefix}:include"),
        None => "include".to_string(),
    };
    element.remove_attribute("namespace");
    element.set_attribute("schemaLocation", location);
}

/// Whether anything below `root` still writes `prefix`: element or attribute names, or any
/// QName-looking token in an attribute value.
fn prefix_in_use(root: &Element, prefix: &str) -> bool {
    let qualified = format!("{prefix}:");
    let mut used = false;
    root.for_each_element(&mut |element| {
        used |= element.prefix() == Some(prefix)
            || element.attributes.iter().any(|attribute| {
                attribute.name.starts_with(&qualified)
                    || attribute
                        .value
                        .split(|c: char| c.is_whitespace() || "/[]()@=,|'\"".contains(c))
                        .any(|token| token.starts_with(&qualified))
            });
    });
    used
}

/// `{stem}_{prefix}{suffix}.{ext}` in the directory of `source`.
pub fn generated_path(source: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xsd".to_string());
    source.with_file_name(format!("{stem}_{prefix}{suffix}.{extension}"))
}

/// `location` with its last path segment replaced by `file_name`.
fn sibling_location(location: &str, file_name: &str) -> String {
    match location.rsplit_once('/') {
        Some((directory, _)) => format!("{directory}/{file_name}"),
        None => file_name.to_string(),
    }
}

/// A usable NCName derived from the file stem of `location`.
fn prefix_from_location(location: &str) -> String {
    let stem = Path::new(location)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut prefix: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || "_-.".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !prefix.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        prefix.insert_str(0, "ns_");
    }
    if prefix.to_ascii_lowercase().starts_with("xml") {
        prefix.insert(0, '_');
    }
    prefix
}
