use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum SortOrder {
    /// By kind, then by name
    #[default]
    KindFirst,
    /// By name, then by kind
    NameFirst,
}

impl From<SortOrder> for dt_xsd_flatten::SortMode {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::KindFirst => Self::KindFirst,
            SortOrder::NameFirst => Self::NameFirst,
        }
    }
}

#[derive(Parser)]
#[clap(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,

    #[clap(long, global = true, help = "Allow a XML Document Type Definition (DTD) to occur")]
    pub allow_dtd: bool,

    #[clap(short, long, global = true, conflicts_with = "debug", help = "Report files read and written")]
    pub verbose: bool,

    #[clap(short, long, global = true, help = "Print debug information")]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert imports to includes, flatten all includes and sort the result
    Flatten(FlattenArgs),
    /// Convert the imports of a schema into includes of renamed copies
    Convert(ConvertArgs),
    /// Splice all included schemas into one document
    Include(IncludeArgs),
    /// Sort the top-level definitions of a schema
    Sort(SortArgs),
    /// Compare the prefixed definitions of a generated copy with their originals
    Compare(CompareArgs),
    /// List top-level definitions that are never referenced
    Orphans(ReportArgs),
    /// List elements, attributes and types without an annotation
    Annotations(ReportArgs),
    /// List element and attribute references documented differently from their declaration
    Discrepancies(ReportArgs),
}

#[derive(Args)]
pub struct FlattenArgs {
    #[clap(value_parser, help = "The main schema")]
    pub input: PathBuf,

    #[clap(value_parser, help = "Where to write the flattened schema")]
    pub output: PathBuf,

    #[clap(short, long, value_parser, help = "File with names to keep unrenamed, one per line")]
    pub exclude: Option<PathBuf>,

    #[clap(long, value_enum, default_value = "kind-first")]
    pub sort: SortOrder,

    #[clap(long, help = "Also write the converted main schema as <stem>_processed.xsd")]
    pub write_processed: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    #[clap(value_parser)]
    pub input: PathBuf,

    #[clap(short, long, value_parser, help = "File with names to keep unrenamed, one per line")]
    pub exclude: Option<PathBuf>,

    #[clap(short, long, value_parser, help = "Defaults to <stem>_processed.xsd")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct IncludeArgs {
    #[clap(value_parser)]
    pub input: PathBuf,

    #[clap(short, long, value_parser, help = "Defaults to <stem>_flattened.xsd")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct SortArgs {
    #[clap(value_parser)]
    pub input: PathBuf,

    #[clap(short, long, value_parser, help = "Defaults to <stem>_sorted.xsd")]
    pub output: Option<PathBuf>,

    #[clap(long, help = "Sort by name first, then kind")]
    pub name_first: bool,
}

#[derive(Args)]
pub struct CompareArgs {
    #[clap(value_parser, help = "The prefix the copy was renamed with")]
    pub prefix: String,

    #[clap(value_parser)]
    pub original: PathBuf,

    #[clap(value_parser)]
    pub copy: PathBuf,
}

#[derive(Args)]
pub struct ReportArgs {
    #[clap(value_parser)]
    pub input: PathBuf,
}
