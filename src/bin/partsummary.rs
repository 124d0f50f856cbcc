//! Command line tool to summarise the parts of a d3plot file family
//!
//! Loads the geometry of a d3plot family, reorganises every cell into
//! per-material parts, and reports what each part ended up with. Useful as a
//! quick check that a family and its metadata agree before doing anything
//! expensive with them.
//!
//! # Usage
//!
//! ```text
//! Usage: partsummary <d3plot> --meta <json> [options]
//! ```
//!
//! Help is printed with the `-h` flag, and `--help` will show examples, default
//! values, examples, and any important behaviour.
//!
//! ## Options
//!
//! By default a table of every part is printed to the terminal.
//!
//! ```bash
//! # Summarise every part of the family
//! partsummary path/to/d3plot --meta d3plot.json
//! ```
//!
//! ### Disable parts
//!
//! Parts that are not of interest can be skipped entirely, so no memory is
//! spent on them. Material indices are given as a list of values and
//! inclusive ranges.
//!
//! ```bash
//! # Ignore materials 1 to 4, 7, and 9
//! partsummary path/to/d3plot --meta d3plot.json --disable "1-4 7,9"
//! ```
//!
//! ### Write a JSON summary
//!
//! ```bash
//! # Output a file named 'parts.json'
//! partsummary path/to/d3plot --meta d3plot.json --json parts.json
//! ```

// standard libraries
use std::fs::File;
use std::io::BufWriter;

// crate modules
use d3parts::family::Family;
use d3parts::part::PartSummary;
use d3parts::readers::parsers::parse_part_selection;
use d3parts::readers::{read_metadata, D3plotReader};
use d3parts::utils::*;

// external crates
use anyhow::{anyhow, Result};
use clap::{arg, Parser};
use log::*;

#[doc(hidden)]
fn main() -> Result<()> {
    // set up the command line interface and match arguments
    let cli: Cli = Cli::parse();

    // set up logging (+2 to make 'Info' the default)
    let verbosity = cli.verbose as usize + 2;
    logging_init(verbosity, cli.quiet)?;

    info!("Reading metadata from {}", &cli.meta);
    let meta = read_metadata(&cli.meta)?;

    info!("Opening {}", &cli.d3plot);
    let mut family = Family::open(&cli.d3plot)?;

    let mut reader = D3plotReader::new();
    if cli.quiet || cli.verbose > 1 {
        reader.disable_progress();
    }

    if let Some(selection) = &cli.disable {
        let materials = parse_part_selection(selection)?;
        info!("Disabling materials {materials:?}");
        reader.set_disabled_parts(&materials);
    }

    if cli.no_coords {
        reader.skip_coordinates();
    }

    let collection = reader.parse(&mut family, &meta)?;
    let summary = collection.summary();
    if summary.is_empty() {
        return Err(anyhow!("No parts with cells found in {}", cli.d3plot));
    }

    if !cli.quiet {
        println!("{}", summary_table(&meta.title, &summary));
    }

    if let Some(path) = &cli.json {
        write_json(path, &summary)?;
    }

    Ok(())
}

/// Summarise the parts of a d3plot file family
///
/// Reads the geometry section of a d3plot family, splitting all cells into
/// one part per material, and reports the cells, points, and bounds of each.
///
/// The family is described by a JSON metadata file, giving the node and cell
/// counts, the parts, and the word offsets of each geometry section.
///
/// Examples
/// --------
///
///  Summarise every part
///     $ partsummary d3plot --meta d3plot.json
///
///  Skip materials 1 to 4, 7 and 9
///     $ partsummary d3plot --meta d3plot.json --disable "1-4 7,9"
///
///  Write the summary to JSON
///     $ partsummary d3plot --meta d3plot.json --json parts.json
///
/// Notes
/// -----
///
/// Family members are found automatically as d3plot01, d3plot02, etc...
/// Word size and endian are detected from the control section.
#[doc(hidden)]
#[derive(Parser)]
#[command(
    verbatim_doc_comment,
    arg_required_else_help(true),
    before_help(banner()),
    after_help(concat!(
        "Typical use: partsummary d3plot --meta d3plot.json\n\n",
        "NOTE: --help shows more detail and examples"
    )),
    term_width(70),
    hide_possible_values(true),
    override_usage("partsummary <d3plot> --meta <json> [options]")
)]
struct Cli {
    // * Positional
    /// Path to the first member of the d3plot family
    #[arg(name = "d3plot")]
    d3plot: String,

    // * Required
    /// Path to the JSON metadata describing the family
    #[arg(short, long)]
    #[arg(value_name = "json")]
    meta: String,

    // * Optional
    /// Material indices to skip (e.g. "1-4 7,9")
    ///
    /// Parts of these 1-based material indices are never created, so no
    /// memory or time is spent on them.
    #[arg(help_heading("Part options"))]
    #[arg(short, long)]
    #[arg(value_name = "list")]
    disable: Option<String>,

    /// Do not read the point coordinates
    #[arg(help_heading("Part options"))]
    #[arg(long)]
    no_coords: bool,

    /// Write the summary to a JSON file
    #[arg(help_heading("Output options"))]
    #[arg(short, long)]
    #[arg(value_name = "path")]
    json: Option<String>,

    // * Flags
    /// Verbose logging (-v, -vv)
    ///
    /// If specified, the default log level of INFO is increased to DEBUG (-v)
    /// or TRACE (-vv). Errors and Warnings are always logged unless in quiet
    /// (-q) mode.
    #[arg(short, long)]
    #[arg(action = clap::ArgAction::Count)]
    verbose: u8,

    /// Supress all log output (overrules --verbose)
    #[arg(short, long)]
    quiet: bool,
}

/// Sets up logging at runtime to allow for multiple verbosity levels
#[doc(hidden)]
fn logging_init(verbosity: usize, quiet: bool) -> Result<()> {
    stderrlog::new()
        .modules(vec![module_path!(), "d3parts"])
        .quiet(quiet)
        .verbosity(verbosity)
        .show_level(false)
        .color(stderrlog::ColorChoice::Never)
        .timestamp(stderrlog::Timestamp::Off)
        .init()?;
    Ok(())
}

/// Creates a banner for the command line
#[doc(hidden)]
fn banner() -> String {
    let mut s = f!("{:-<1$}\n", "", 70);
    s += &f!("{:^70}\n", "D3parts :: Part Summary");
    s += &f!("{:-<1$}", "", 70);
    s
}

#[doc(hidden)]
fn summary_table(title: &str, parts: &[PartSummary]) -> String {
    let mut s = match title.is_empty() {
        true => "Parts".to_string(),
        false => textwrap::fill(&f!("Parts of \"{title}\""), 80),
    };

    s += &f!(
        "\n{:>6} {:>8} {:<12} {:>10} {:>10} {:>8}  name\n",
        "slot",
        "id",
        "type",
        "cells",
        "points",
        "dead"
    );
    s += &"-".repeat(80);

    for p in parts {
        s += &f!(
            "\n{:>6} {:>8} {:<12} {:>10} {:>10} {:>8}  {}",
            p.slot,
            p.id,
            p.cell_type.to_string(),
            p.cells,
            p.points,
            p.dead_cells,
            p.name
        );
        if let Some(b) = p.bounds {
            s += &f!(
                "\n{:>8}x [{}, {}] y [{}, {}] z [{}, {}]",
                "",
                b[0].sci(3, 2),
                b[1].sci(3, 2),
                b[2].sci(3, 2),
                b[3].sci(3, 2),
                b[4].sci(3, 2),
                b[5].sci(3, 2)
            );
        }
    }

    let cells: usize = parts.iter().map(|p| p.cells).sum();
    s += &f!("\n\n{} parts, {cells} cells in total", parts.len());
    s
}

#[doc(hidden)]
/// Write the part summaries to json
fn write_json(path: &str, parts: &[PartSummary]) -> Result<()> {
    debug!("Writing JSON summary to {path}");
    let file: File = File::create(path)?;
    let writer = BufWriter::new(file);
    Ok(serde_json::to_writer_pretty(writer, parts)?)
}
