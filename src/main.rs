mod cli;
mod pipeline;

use std::path::Path;
use std::process;

use clap::Parser;
use cli::{Cli, Command};
use dt_xsd_flatten::{
    compare_copy, convert, find_annotation_discrepancies, find_missing_annotations, find_orphans,
    flatten, read_source, sort, AnnotationDiscrepancy, Comparison, ConvertOptions, ParseOptions,
    Result, SchemaDocument, SortMode,
};
use log::LevelFilter;
use pipeline::{derived_path, read_exclusions, PipelineOptions};

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .parse_default_env()
        .init();

    let options = ParseOptions {
        allow_dtd: cli.allow_dtd,
    };
    if let Err(e) = run(cli.command, options) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(command: Command, parse: ParseOptions) -> Result<()> {
    match command {
        Command::Flatten(args) => {
            let options = PipelineOptions {
                exclude: args.exclude,
                sort: args.sort.into(),
                parse,
                write_processed: args.write_processed,
            };
            pipeline::run(&args.input, &args.output, &options)
        }
        Command::Convert(args) => {
            let exclusions = read_exclusions(args.exclude.as_deref())?;
            let mut main = SchemaDocument::parse_file(&args.input, &parse)?;
            let options = ConvertOptions {
                parse,
                ..ConvertOptions::default()
            };
            let report = convert(&mut main, &exclusions, &options)?;
            report.write_generated()?;
            let output = args
                .output
                .unwrap_or_else(|| derived_path(&args.input, "_processed"));
            main.write_to(&output)
        }
        Command::Include(args) => {
            let mut main = SchemaDocument::parse_file(&args.input, &parse)?;
            flatten(&mut main, &parse)?;
            let output = args
                .output
                .unwrap_or_else(|| derived_path(&args.input, "_flattened"));
            main.write_to(&output)
        }
        Command::Sort(args) => {
            let mut document = SchemaDocument::parse_file(&args.input, &parse)?;
            let mode = if args.name_first {
                SortMode::NameFirst
            } else {
                SortMode::KindFirst
            };
            sort(&mut document, mode);
            let output = args
                .output
                .unwrap_or_else(|| derived_path(&args.input, "_sorted"));
            document.write_to(&output)
        }
        Command::Compare(args) => {
            let original = SchemaDocument::parse_file(&args.original, &parse)?;
            let copy = SchemaDocument::parse_file(&args.copy, &parse)?;
            print_comparisons(&args.prefix, &original, &copy);
            Ok(())
        }
        Command::Orphans(args) => {
            let document = SchemaDocument::parse_file(&args.input, &parse)?;
            for orphan in find_orphans(&document) {
                println!("{} {}", orphan.kind, orphan.name);
            }
            Ok(())
        }
        Command::Annotations(args) => {
            let document = SchemaDocument::parse_file(&args.input, &parse)?;
            print_missing_annotations(&args.input, &document);
            Ok(())
        }
        Command::Discrepancies(args) => {
            let text = read_source(&args.input)?;
            let origin = args.input.display().to_string();
            print_discrepancies(&find_annotation_discrepancies(&text, &origin, &parse)?);
            Ok(())
        }
    }
}

fn print_comparisons(prefix: &str, original: &SchemaDocument, copy: &SchemaDocument) {
    let comparisons = compare_copy(prefix, original, copy);
    let mut differing = 0;
    for comparison in &comparisons {
        match &comparison.outcome {
            Comparison::Identical => {
                log::debug!("{} {} matches", comparison.kind, comparison.copy_name)
            }
            Comparison::Missing => {
                differing += 1;
                println!(
                    "{} {}: no {} in the original",
                    comparison.kind, comparison.copy_name, comparison.original_name
                );
            }
            Comparison::Differs { original, copy } => {
                differing += 1;
                println!("{} {} differs", comparison.kind, comparison.copy_name);
                println!("  original: {original}");
                println!("  copy:     {copy}");
            }
        }
    }
    println!(
        "{} of {} definitions identical",
        comparisons.len() - differing,
        comparisons.len()
    );
}

fn print_missing_annotations(input: &Path, document: &SchemaDocument) {
    let missing = find_missing_annotations(document);
    for entry in &missing {
        match &entry.ancestor {
            Some((kind, Some(name))) => {
                println!("{} {} (in {kind} {name})", entry.kind, entry.name)
            }
            Some((kind, None)) => println!("{} {} (in anonymous {kind})", entry.kind, entry.name),
            None => println!("{} {}", entry.kind, entry.name),
        }
    }
    log::info!("{}: {} without annotation", input.display(), missing.len());
}

fn print_discrepancies(discrepancies: &[AnnotationDiscrepancy]) {
    for entry in discrepancies {
        println!("{} {}:", entry.kind, entry.name);
        print_documentation("declaration", &entry.definition_text);
        match &entry.ancestor {
            Some((kind, Some(name))) => println!("  line {} in {kind} {name}", entry.line),
            Some((kind, None)) => println!("  line {} in anonymous {kind}", entry.line),
            None => println!("  line {} at the top level", entry.line),
        }
        print_documentation("reference", &entry.reference_text);
    }
    println!("{} discrepancies", discrepancies.len());
}

fn print_documentation(label: &str, text: &str) {
    if text.is_empty() {
        println!("  {label}: none");
        return;
    }
    println!("  {label}:");
    for line in text.lines() {
        println!("    {line}");
    }
}
