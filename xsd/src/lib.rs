pub mod analysis;
pub mod compare;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod exclusions;
pub mod flatten;
pub mod import;
pub mod namespaces;
pub mod reference;
pub mod rename;
pub mod schema;
pub mod sort;
pub mod tree;
pub mod xstypes;

mod relocate;

pub use analysis::{
    find_annotation_discrepancies, find_missing_annotations, find_orphans, AnnotationDiscrepancy,
    MissingAnnotation, Orphan,
};
pub use compare::{compare_copy, Comparison, CopyComparison};
pub use convert::{convert, ConversionReport, ConvertOptions, Converter, GeneratedInclude};
pub use diagnostics::{Diagnostics, Warning};
pub use error::{Result, XsdError};
pub use exclusions::ExclusionSet;
pub use flatten::{flatten, FlattenReport, FlattenSession};
pub use import::{ImportStatement, IncludeStatement};
pub use reference::{RefTarget, Reference};
pub use rename::{RenameMap, Renamed, Renamer};
pub use schema::{
    read_source, Definition, DefinitionKind, SchemaDocument, SymbolSpace, XS_NAMESPACE,
};
pub use sort::{sort, SortMode};
pub use tree::ParseOptions;
