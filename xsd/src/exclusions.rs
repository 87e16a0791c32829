use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::info;

use crate::error::{Result, XsdError};

/// Definition names that keep their spelling when an imported schema is renamed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one bare name per line; surrounding whitespace is trimmed and blank lines skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| XsdError::Unresolvable {
            location: path.display().to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        let exclusions = Self::parse(&text);
        info!(
            "excluding {} name(s) from renaming: {:?}",
            exclusions.len(),
            exclusions.names
        );
        Ok(exclusions)
    }

    pub fn parse(text: &str) -> Self {
        text.lines().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|name| name.as_ref().trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }
}
