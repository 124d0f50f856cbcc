//! Per-material part meshes
//!
//! # Overview
//!
//! A [Part] is the mesh of a single material. The part collection creates one
//! for every enabled material, sizes its storage, and then feeds it cells,
//! cell records, user ids, deleted flags, and chunks of the global point
//! arrays. The part only ever sees decoded numeric buffers and counts, never
//! raw bytes.
//!
//! ```rust
//! use d3parts::family::WordSize;
//! use d3parts::meta::CellType;
//! use d3parts::part::{CellKind, Connectivity, Part};
//!
//! let mut part = Part::new(CellType::Shell, "plate", 0, 101, 6, WordSize::Four);
//! part.allocate_cell_memory(1, 4).unwrap();
//! part.add_cell(CellKind::Quad, &Connectivity::new(&[1, 2, 5, 4]).unwrap()).unwrap();
//! part.build_topology().unwrap();
//!
//! assert_eq!(part.global_point_ids(), &[1, 2, 4, 5]);
//! assert_eq!(part.connectivity(), &[0, 1, 3, 2]);
//! ```

// Split into subfiles for development, but anything important is re-exported
mod cell;
mod core;
mod property;

#[doc(inline)]
pub use crate::part::cell::{CellKind, Connectivity, MAX_CELL_POINTS};

#[doc(inline)]
pub use crate::part::core::{Part, PartSummary};

#[doc(inline)]
pub use crate::part::property::{CellProperty, PointProperty, PointRole};
