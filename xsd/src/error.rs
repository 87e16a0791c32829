use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures. Any of these aborts the current top-level invocation.
#[derive(Debug, Error)]
pub enum XsdError {
    #[error("{origin}: not well-formed XML: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("{origin}: root element is <{found}>, expected xs:schema")]
    NotASchema { origin: String, found: String },
    #[error("cannot read {location:?} (resolved to {}): {source}", path.display())]
    Unresolvable {
        location: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize schema: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, XsdError>;
