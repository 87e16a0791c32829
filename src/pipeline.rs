use std::path::{Path, PathBuf};

use dt_xsd_flatten::{
    convert, flatten, sort, ConvertOptions, ExclusionSet, ParseOptions, Result, SchemaDocument,
    SortMode,
};
use log::info;

/// Options of a full run.
#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    pub exclude: Option<PathBuf>,
    pub sort: SortMode,
    pub parse: ParseOptions,
    /// Also write the converted main document next to the input.
    pub write_processed: bool,
}

pub fn read_exclusions(path: Option<&Path>) -> Result<ExclusionSet> {
    match path {
        Some(path) => ExclusionSet::from_file(path),
        None => Ok(ExclusionSet::new()),
    }
}

/// Convert, sort the generated copies, flatten, sort, write.
pub fn run(input: &Path, output: &Path, options: &PipelineOptions) -> Result<()> {
    let exclusions = read_exclusions(options.exclude.as_deref())?;
    let mut main = SchemaDocument::parse_file(input, &options.parse)?;

    let convert_options = ConvertOptions {
        parse: options.parse,
        ..ConvertOptions::default()
    };
    let mut conversion = convert(&mut main, &exclusions, &convert_options)?;
    for generated in &mut conversion.generated {
        sort(&mut generated.document, options.sort);
    }
    conversion.write_generated()?;

    if options.write_processed {
        main.write_to(&derived_path(input, "_processed"))?;
    }

    let flattened = flatten(&mut main, &options.parse)?;
    info!("spliced {} file(s)", flattened.included.len());
    sort(&mut main, options.sort);
    main.write_to(output)?;

    let warnings = conversion.diagnostics.warnings().len() + flattened.diagnostics.warnings().len();
    if warnings > 0 {
        info!("finished with {warnings} warning(s)");
    }
    Ok(())
}

/// `{stem}{suffix}.{ext}` next to `input`.
pub fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xsd".to_string());
    input.with_file_name(format!("{stem}{suffix}.{extension}"))
}
