use std::fmt;
use std::path::PathBuf;

use log::warn;

use crate::schema::DefinitionKind;

/// Conditions worth telling the caller about that do not stop processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// Two definitions ended up sharing a (kind, name) pair. Both are kept.
    NameCollision {
        file: Option<PathBuf>,
        kind: DefinitionKind,
        name: String,
        other: Option<PathBuf>,
    },
    /// Two documents bind the same prefix to different namespaces.
    PrefixConflict {
        file: Option<PathBuf>,
        prefix: String,
        existing: String,
        incoming: String,
    },
    /// A reference-bearing attribute on an element the reference table does not cover.
    UnknownReferenceAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    /// An import of a document that is still being converted further up the import chain.
    ImportCycle { location: String },
    /// An include or import that cannot be followed because it names no location.
    MissingLocation { statement: String },
    /// A reference to a no-namespace definition had to be written unprefixed while a default
    /// namespace is bound, so it now resolves into that namespace.
    CapturedByDefaultNamespace {
        name: String,
        default_namespace: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameCollision {
                file,
                kind,
                name,
                other,
            } => {
                write!(f, "{kind} {name:?} in {}", display_file(file))?;
                write!(f, " collides with a definition from {}", display_file(other))
            }
            Self::PrefixConflict {
                file,
                prefix,
                existing,
                incoming,
            } => write!(
                f,
                "{} binds prefix {prefix:?} to {incoming:?}, but it is already bound to {existing:?}",
                display_file(file)
            ),
            Self::UnknownReferenceAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "attribute {attribute}={value:?} on <{element}> is not a known reference, left as is"
            ),
            Self::ImportCycle { location } => {
                write!(f, "import of {location:?} closes an import cycle, left as import")
            }
            Self::MissingLocation { statement } => {
                write!(f, "<{statement}> without schemaLocation cannot be followed")
            }
            Self::CapturedByDefaultNamespace {
                name,
                default_namespace,
            } => write!(
                f,
                "{name:?} has no namespace but is written under the default namespace \
                 {default_namespace:?}, where it does not resolve"
            ),
        }
    }
}

fn display_file(file: &Option<PathBuf>) -> String {
    match file {
        Some(path) => path.display().to_string(),
        None => "<main document>".to_string(),
    }
}

/// Warnings gathered during one invocation.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs the warning and keeps it for the caller.
    pub fn push(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
