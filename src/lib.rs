//! # The d3parts crate
//!
//! Reorganise LS-DYNA d3plot cell and point data into per-material parts
//!
//! ## Overview
//!
//! A d3plot file family writes every cell grouped by cell type, in whatever
//! order the solver kept them, with each cell naming its material. Most
//! consumers want the opposite: one mesh per material (a *part*), each with
//! only the points its own cells use. This crate builds those parts while
//! streaming the family in bounded chunks, so even very large models never
//! need the whole file in memory.
//!
//! | Command line   | Description                                             |
//! | -------------- | ------------------------------------------------------- |
//! | `partsummary`  | Load a family and summarise every part it contains     |
//!
//! ### Supported cell types
//!
//! | Cell type                                   | Output cells            |
//! | ------------------------------------------- | ----------------------- |
//! | [CellType::Solid](crate::meta::CellType)      | hexahedron, tetra       |
//! | [CellType::ThickShell](crate::meta::CellType) | hexahedron              |
//! | [CellType::Shell](crate::meta::CellType)      | quad, triangle          |
//! | [CellType::Beam](crate::meta::CellType)       | line                    |
//! | [CellType::Particle](crate::meta::CellType)   | vertex                  |
//!
//! Rigid body and road surface cells share the same index machinery, but have
//! no connectivity section of their own to read.
//!
//! ## Advanced use
//!
//! Parsing the d3plot control section is left to the caller, who describes
//! the family with a [Metadata](crate::meta::Metadata) struct, usually read
//! from JSON. From there the parts are a one-liner:
//!
//! ```ignore
//! let collection = d3parts::read_parts("path/to/d3plot", "path/to/d3plot.json")?;
//!
//! for part in collection.parts() {
//!     println!("{part}");
//! }
//! ```
//!
//! State data for a time step is then streamed into the same collection with
//! [read_cell_properties()](crate::collection::PartCollection::read_cell_properties),
//! [read_dead_cells()](crate::collection::PartCollection::read_dead_cells),
//! [read_point_property()](crate::collection::PartCollection::read_point_property)
//! and friends.
//!
//! As an overview:
//! - The [collection] module maps global cells onto parts and streams data
//! into them.
//! - The [part] module holds the per-material meshes themselves.
//! - The [family] module treats the members of a file family as one word
//! stream.
//! - The [meta] module describes what is in a family.
//! - The [readers] module drives a full load from a family and its metadata.
//!
//! In the background, `nom` parses the small text inputs, `clap` is used for
//! the command line interface, and `kdam` reports progress on large files.

// Public facing modules
pub mod collection;
pub mod family;
pub mod meta;
pub mod part;
pub mod utils;

// note that docs are hidden to prevent confusing the current simple API
pub mod readers;

// Re-exports of useful data structures
#[doc(inline)]
pub use crate::readers::{read_metadata, read_parts, D3plotReader};

#[doc(inline)]
pub use crate::collection::{CellWindows, PartCollection};

#[doc(inline)]
pub use crate::family::Family;

#[doc(inline)]
pub use crate::meta::{CellType, Metadata};

#[doc(inline)]
pub use crate::part::Part;
