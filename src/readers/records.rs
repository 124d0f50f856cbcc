//! Decoding of the fixed-size connectivity records of each cell type
//!
//! Every record is a run of integer words, node ids first (1-based) and the
//! material index last.
//!
//! | Cell type   | Words | Layout                                     |
//! | ----------- | ----- | ------------------------------------------ |
//! | solid       | 9     | n1..n8, material                           |
//! | thick shell | 9     | n1..n8, material                           |
//! | beam        | 6     | n1, n2, orientation, unused, unused, material |
//! | shell       | 5     | n1..n4, material                           |
//! | particle    | 2     | n1, material                               |

// internal modules
use crate::meta::CellType;
use crate::part::{CellKind, Connectivity};

// external crates
use anyhow::{anyhow, bail, Result};

/// A single decoded connectivity record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRecord {
    /// 1-based material index
    pub material: usize,
    pub kind: CellKind,
    /// Zero-based global point ids
    pub conn: Connectivity,
}

/// Number of words in a record, for types with a connectivity section
pub fn record_words(cell_type: CellType) -> Option<usize> {
    match cell_type {
        CellType::Solid | CellType::ThickShell => Some(9),
        CellType::Beam => Some(6),
        CellType::Shell => Some(5),
        CellType::Particle => Some(2),
        CellType::RigidBody | CellType::RoadSurface => None,
    }
}

/// Decode one record of a cell type
pub fn decode_record(cell_type: CellType, record: &[i64]) -> Result<CellRecord> {
    let words = record_words(cell_type)
        .ok_or_else(|| anyhow!("No connectivity records for {cell_type} cells"))?;

    if record.len() != words {
        bail!(
            "Expected {words} words in a {cell_type} record, found {}",
            record.len()
        );
    }

    let raw_material = record[words - 1];
    let material = usize::try_from(raw_material)
        .map_err(|_| anyhow!("Negative material index {raw_material} in {cell_type} record"))?;

    let (kind, nodes) = match cell_type {
        CellType::Solid if is_collapsed(&record[3..8]) => (CellKind::Tetra, &record[..4]),
        CellType::Solid | CellType::ThickShell => (CellKind::Hexahedron, &record[..8]),
        CellType::Shell if record[2] == record[3] => (CellKind::Triangle, &record[..3]),
        CellType::Shell => (CellKind::Quad, &record[..4]),
        CellType::Beam => (CellKind::Line, &record[..2]),
        _ => (CellKind::Vertex, &record[..1]),
    };

    let mut ids = [0usize; 8];
    for (id, &node) in ids.iter_mut().zip(nodes) {
        *id = zero_based(node)?;
    }

    Ok(CellRecord {
        material,
        kind,
        conn: Connectivity::new(&ids[..nodes.len()])?,
    })
}

/// Degenerate solids repeat their fourth node
fn is_collapsed(nodes: &[i64]) -> bool {
    nodes.iter().all(|&n| n == nodes[0])
}

fn zero_based(node: i64) -> Result<usize> {
    match usize::try_from(node) {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(anyhow!("Invalid node id {node}, ids are 1-based")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solids_and_tetras() {
        let hex = decode_record(CellType::Solid, &[1, 2, 3, 4, 5, 6, 7, 8, 3]).unwrap();
        assert_eq!(hex.kind, CellKind::Hexahedron);
        assert_eq!(hex.material, 3);
        assert_eq!(hex.conn.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);

        let tet = decode_record(CellType::Solid, &[1, 2, 3, 4, 4, 4, 4, 4, 1]).unwrap();
        assert_eq!(tet.kind, CellKind::Tetra);
        assert_eq!(tet.conn.as_slice(), &[0, 1, 2, 3]);

        let thick = decode_record(CellType::ThickShell, &[1, 2, 3, 4, 4, 4, 4, 4, 1]).unwrap();
        assert_eq!(thick.kind, CellKind::Hexahedron);
    }

    #[test]
    fn shells_beams_particles() {
        let quad = decode_record(CellType::Shell, &[5, 6, 7, 8, 2]).unwrap();
        assert_eq!(quad.kind, CellKind::Quad);
        assert_eq!(quad.conn.as_slice(), &[4, 5, 6, 7]);

        let tri = decode_record(CellType::Shell, &[5, 6, 7, 7, 2]).unwrap();
        assert_eq!(tri.kind, CellKind::Triangle);
        assert_eq!(tri.conn.as_slice(), &[4, 5, 6]);

        let beam = decode_record(CellType::Beam, &[10, 11, 12, 0, 0, 4]).unwrap();
        assert_eq!(beam.kind, CellKind::Line);
        assert_eq!(beam.conn.as_slice(), &[9, 10]);
        assert_eq!(beam.material, 4);

        let particle = decode_record(CellType::Particle, &[1, 1]).unwrap();
        assert_eq!(particle.kind, CellKind::Vertex);
        assert_eq!(particle.conn.as_slice(), &[0]);
    }

    #[test]
    fn bad_records() {
        assert!(decode_record(CellType::Shell, &[1, 2, 3, 4]).is_err());
        assert!(decode_record(CellType::Shell, &[0, 2, 3, 4, 1]).is_err());
        assert!(decode_record(CellType::Shell, &[1, 2, 3, 4, -1]).is_err());
        assert!(decode_record(CellType::RoadSurface, &[1, 2]).is_err());
    }
}
