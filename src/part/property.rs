//! Cell and point property arrays held by a part

// external crates
use serde::Serialize;

/// A named per-cell array
///
/// Cell records in the state section hold several values per cell. A property
/// selects `components` consecutive values starting at `offset` within each
/// record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellProperty {
    pub name: String,
    /// Position of the first component within a cell record
    pub offset: usize,
    /// Number of consecutive values per cell
    pub components: usize,
    /// Values for every cell of the part, `components` per cell
    #[serde(skip)]
    pub values: Vec<f64>,
}

impl CellProperty {
    pub fn new(name: &str, offset: usize, components: usize) -> Self {
        Self {
            name: name.to_string(),
            offset,
            components,
            values: Vec::new(),
        }
    }

    /// Components of a single cell
    pub fn cell(&self, index: usize) -> Option<&[f64]> {
        let start = index * self.components;
        self.values.get(start..start + self.components)
    }
}

/// A named per-point array
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointProperty {
    pub name: String,
    /// Number of values per point
    pub components: usize,
    /// Values for every local point of the part, `components` per point
    #[serde(skip)]
    pub values: Vec<f64>,
}

impl PointProperty {
    pub fn new(name: &str, components: usize, num_points: usize) -> Self {
        Self {
            name: name.to_string(),
            components,
            values: vec![0.0; components * num_points],
        }
    }

    /// Components of a single local point
    pub fn point(&self, index: usize) -> Option<&[f64]> {
        let start = index * self.components;
        self.values.get(start..start + self.components)
    }
}

/// What a point-based array read from the file is used for
///
/// With no role set the array is skipped entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointRole {
    /// Keep the values as a named point property
    pub property: bool,
    /// The values are point coordinates
    pub geometry: bool,
    /// The values belong to the road surface points rather than the mesh
    pub road: bool,
}

impl PointRole {
    /// Coordinates of the shared mesh points
    pub const GEOMETRY: PointRole = PointRole {
        property: false,
        geometry: true,
        road: false,
    };

    /// A named property of the shared mesh points
    pub const PROPERTY: PointRole = PointRole {
        property: true,
        geometry: false,
        road: false,
    };

    /// Whether the array needs reading at all
    #[inline]
    pub fn is_wanted(&self) -> bool {
        self.property || self.geometry || self.road
    }
}
