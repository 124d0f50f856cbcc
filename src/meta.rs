//! Description of the parts, cell counts, and section offsets in a file family
//!
//! Parsing the d3plot control section is outside the scope of this crate, so
//! everything the part collection needs to know about a file family is held in
//! a [Metadata] struct. This is usually deserialised from JSON:
//!
//! ```json
//! {
//!   "title": "crash box",
//!   "word_size": 4,
//!   "num_nodes": 1200,
//!   "cells": { "shell": 800, "solid": 150 },
//!   "parts": [
//!     { "material": 1, "id": 101, "cell_type": "shell", "name": "rail" },
//!     { "material": 2, "id": 102, "cell_type": "solid", "name": "foam" }
//!   ],
//!   "sections": { "coordinates": 64, "solids": 3664, "shells": 5014 }
//! }
//! ```

// internal modules
use crate::family::WordSize;

// external crates
use anyhow::{bail, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Coarse category of cell, each with its own global cell index space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Particle,
    Beam,
    Shell,
    ThickShell,
    Solid,
    RigidBody,
    RoadSurface,
}

impl CellType {
    /// Number of cell types, and so the number of independent index spaces
    pub const COUNT: usize = 7;

    /// Every cell type in index order
    pub const ALL: [CellType; CellType::COUNT] = [
        CellType::Particle,
        CellType::Beam,
        CellType::Shell,
        CellType::ThickShell,
        CellType::Solid,
        CellType::RigidBody,
        CellType::RoadSurface,
    ];

    /// Cell types whose parts share the global point array
    pub const GEOMETRY: [CellType; 5] = [
        CellType::Particle,
        CellType::Beam,
        CellType::Shell,
        CellType::ThickShell,
        CellType::Solid,
    ];

    /// Position of the type in per-type tables
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Particle => "particle",
            Self::Beam => "beam",
            Self::Shell => "shell",
            Self::ThickShell => "thick shell",
            Self::Solid => "solid",
            Self::RigidBody => "rigid body",
            Self::RoadSurface => "road surface",
        };
        write!(f, "{name}")
    }
}

/// Number of cells declared in the file for every cell type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellCounts {
    pub particle: usize,
    pub beam: usize,
    pub shell: usize,
    pub thick_shell: usize,
    pub solid: usize,
    pub rigid_body: usize,
    pub road_surface: usize,
}

impl CellCounts {
    /// Number of cells of the given type
    pub fn get(&self, cell_type: CellType) -> usize {
        match cell_type {
            CellType::Particle => self.particle,
            CellType::Beam => self.beam,
            CellType::Shell => self.shell,
            CellType::ThickShell => self.thick_shell,
            CellType::Solid => self.solid,
            CellType::RigidBody => self.rigid_body,
            CellType::RoadSurface => self.road_surface,
        }
    }

    /// Mutable access to the count of the given type
    pub fn get_mut(&mut self, cell_type: CellType) -> &mut usize {
        match cell_type {
            CellType::Particle => &mut self.particle,
            CellType::Beam => &mut self.beam,
            CellType::Shell => &mut self.shell,
            CellType::ThickShell => &mut self.thick_shell,
            CellType::Solid => &mut self.solid,
            CellType::RigidBody => &mut self.rigid_body,
            CellType::RoadSurface => &mut self.road_surface,
        }
    }

    /// Counts as a per-type table
    pub fn to_array(&self) -> [usize; CellType::COUNT] {
        CellType::ALL.map(|t| self.get(t))
    }
}

/// One part (material) declared by the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartMeta {
    /// 1-based material index, as written in the connectivity records
    pub material: usize,
    /// User facing part id
    pub id: i32,
    /// Category of every cell in this part
    pub cell_type: CellType,
    /// Part name, may be empty
    #[serde(default)]
    pub name: String,
    /// Parts may be disabled so that no memory is spent on them
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl PartMeta {
    pub fn new(material: usize, id: i32, cell_type: CellType, name: &str) -> Self {
        Self {
            material,
            id,
            cell_type,
            name: name.to_string(),
            enabled: true,
        }
    }

    /// Zero-based slot of the part in the part directory
    pub fn slot(&self) -> usize {
        self.material - 1
    }
}

/// Absolute word offsets of the sections the reader knows how to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sections {
    pub coordinates: Option<u64>,
    pub solids: Option<u64>,
    pub thick_shells: Option<u64>,
    pub beams: Option<u64>,
    pub shells: Option<u64>,
    pub particles: Option<u64>,
}

impl Sections {
    /// Connectivity offset for a cell type, if the section is present
    pub fn connectivity(&self, cell_type: CellType) -> Option<u64> {
        match cell_type {
            CellType::Solid => self.solids,
            CellType::ThickShell => self.thick_shells,
            CellType::Beam => self.beams,
            CellType::Shell => self.shells,
            CellType::Particle => self.particles,
            CellType::RigidBody | CellType::RoadSurface => None,
        }
    }
}

/// Everything the part collection needs to know about a file family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub word_size: WordSize,
    /// Number of points in the global point array
    pub num_nodes: usize,
    /// Coordinate components per point
    #[serde(default = "num_dims_default")]
    pub num_dims: usize,
    #[serde(default)]
    pub cells: CellCounts,
    pub parts: Vec<PartMeta>,
    #[serde(default)]
    pub sections: Sections,
}

fn num_dims_default() -> usize {
    3
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            word_size: WordSize::Four,
            num_nodes: 0,
            num_dims: 3,
            cells: CellCounts::default(),
            parts: Vec::new(),
            sections: Sections::default(),
        }
    }
}

impl Metadata {
    /// Number of part slots, one per declared material
    pub fn num_parts(&self) -> usize {
        self.parts.iter().map(|p| p.material).max().unwrap_or(0)
    }

    /// Common sense checks before anything is allocated
    pub fn validate(&self) -> Result<()> {
        if !(2..=3).contains(&self.num_dims) {
            bail!("Expected 2 or 3 coordinate dimensions, found {}", self.num_dims);
        }

        if let Some(part) = self.parts.iter().find(|p| p.material == 0) {
            bail!("Part \"{}\" has material index 0, indices are 1-based", part.name);
        }

        let duplicates = self
            .parts
            .iter()
            .map(|p| p.material)
            .duplicates()
            .collect::<Vec<usize>>();

        if !duplicates.is_empty() {
            bail!("Material indices declared more than once: {duplicates:?}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_from_json() {
        let json = r#"{
            "num_nodes": 12,
            "cells": { "shell": 4 },
            "parts": [
                { "material": 2, "id": 20, "cell_type": "shell", "name": "skin" },
                { "material": 1, "id": 10, "cell_type": "thick_shell", "enabled": false }
            ],
            "sections": { "shells": 100 }
        }"#;

        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.word_size, WordSize::Four);
        assert_eq!(meta.num_dims, 3);
        assert_eq!(meta.cells.get(CellType::Shell), 4);
        assert_eq!(meta.num_parts(), 2);
        assert!(meta.parts[0].enabled);
        assert!(!meta.parts[1].enabled);
        assert_eq!(meta.parts[1].name, "");
        assert_eq!(meta.sections.connectivity(CellType::Shell), Some(100));
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn duplicate_materials_rejected() {
        let meta = Metadata {
            num_nodes: 4,
            parts: vec![
                PartMeta::new(1, 1, CellType::Shell, "a"),
                PartMeta::new(1, 2, CellType::Solid, "b"),
            ],
            ..Default::default()
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn zero_material_rejected() {
        let meta = Metadata {
            parts: vec![PartMeta::new(0, 1, CellType::Beam, "bad")],
            ..Default::default()
        };
        assert!(meta.validate().is_err());
    }
}
