//! Output cell kinds and bounded connectivity
//!
//! Every cell read from a d3plot file references at most eight points, so the
//! connectivity is kept on the stack as a fixed array and an explicit length
//! rather than as a heap allocated list per cell.

// external crates
use anyhow::{bail, Result};
use serde::Serialize;

/// Largest number of points any cell in the file format references
pub const MAX_CELL_POINTS: usize = 8;

/// Topology of a single output cell
///
/// The discriminants match the VTK cell type ids so that downstream writers
/// can use them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CellKind {
    Vertex = 1,
    Line = 3,
    Triangle = 5,
    Quad = 9,
    Tetra = 10,
    Hexahedron = 12,
}

impl CellKind {
    /// VTK cell type id
    #[inline]
    pub const fn vtk_id(&self) -> u8 {
        *self as u8
    }

    /// Number of points a cell of this kind references
    ///
    /// ```rust
    /// # use d3parts::part::CellKind;
    /// assert_eq!(CellKind::Quad.num_points(), 4);
    /// assert_eq!(CellKind::Hexahedron.num_points(), 8);
    /// ```
    #[inline]
    pub const fn num_points(&self) -> usize {
        match self {
            Self::Vertex => 1,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Quad => 4,
            Self::Tetra => 4,
            Self::Hexahedron => 8,
        }
    }
}

/// Global point ids of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
    ids: [usize; MAX_CELL_POINTS],
    len: usize,
}

impl Connectivity {
    /// Build from zero-based global point ids
    ///
    /// ```rust
    /// # use d3parts::part::Connectivity;
    /// let conn = Connectivity::new(&[4, 5, 9]).unwrap();
    /// assert_eq!(conn.len(), 3);
    /// assert_eq!(conn.as_slice(), &[4, 5, 9]);
    /// assert!(Connectivity::new(&[0; 9]).is_err());
    /// ```
    pub fn new(ids: &[usize]) -> Result<Self> {
        if ids.len() > MAX_CELL_POINTS {
            bail!(
                "A cell may reference at most {MAX_CELL_POINTS} points, found {}",
                ids.len()
            );
        }
        let mut conn = Self::default();
        conn.ids[..ids.len()].copy_from_slice(ids);
        conn.len = ids.len();
        Ok(conn)
    }

    /// Number of points referenced
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The referenced global point ids
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.ids[..self.len]
    }
}
