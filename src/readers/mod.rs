//! Readers for d3plot file families and their metadata

// internal modules
use crate::collection::PartCollection;
use crate::family::Family;
use crate::meta::Metadata;
use crate::utils::*;

// standard library
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// external crates
use anyhow::{Context, Result};
use log::debug;

// files under the readers module
mod d3plot_file;
pub mod parsers;
pub mod records;

// inline important the reader-related modules for a nice API
#[doc(inline)]
pub use crate::readers::d3plot_file::D3plotReader;

/// Read the JSON description of a file family
///
/// The metadata is validated before it is returned.
///
/// - `path` - Path to the JSON file, can be [&str], [String], [Path], etc...
///
/// Example
/// ```ignore
/// let meta: Metadata = d3parts::read_metadata("path/to/d3plot.json")?;
/// ```
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    let path: &Path = Path::new(path.as_ref());
    let file = File::open(path).with_context(|| f!("Could not open {}", path.display()))?;
    let meta: Metadata = serde_json::from_reader(BufReader::new(file))
        .with_context(|| f!("Could not parse metadata from {}", path.display()))?;
    meta.validate()?;
    debug!(
        "Metadata for \"{}\": {} parts, {} nodes",
        meta.title,
        meta.parts.len(),
        meta.num_nodes
    );
    Ok(meta)
}

/// Read every part of a d3plot file family
///
/// Returns a result containing the [PartCollection] built from the family at
/// `path`, described by the JSON metadata at `meta_path`.
///
/// - `path` - Path to the first family member, e.g. `d3plot`
/// - `meta_path` - Path to the JSON metadata
///
/// Example
/// ```ignore
/// let collection = d3parts::read_parts("path/to/d3plot", "path/to/d3plot.json")?;
/// for part in collection.parts() {
///     println!("{part}");
/// }
/// ```
pub fn read_parts<P, Q>(path: P, meta_path: Q) -> Result<PartCollection>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let meta = read_metadata(meta_path)?;
    let mut family = Family::open(path)?;
    let mut reader = D3plotReader::new();
    reader.disable_progress();
    reader.parse(&mut family, &meta)
}
