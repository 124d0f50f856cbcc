//! Run-length map from global cell index to owning part
//!
//! Cells are stored in the file grouped by cell type, and within a type the
//! cells of a material tend to be written together. Rather than keeping the
//! owning part of every cell, each cell type keeps an ordered list of
//! [PartInfo] blocks, each a contiguous span of global cells that belong to
//! the same part.
//!
//! ```text
//! shell cells   0 ............ 10 ...................... 30
//!               [ slot 0, 10 ] [ slot 2, 20             ]
//! ```
//!
//! Cells are registered one at a time in file order. A cell that belongs to
//! the same part as the previous one extends the last block, so the list
//! stays as short as the number of material changes in the file.

// internal modules
use crate::meta::CellType;
use crate::utils::clip;

// external crates
use anyhow::{bail, Result};
use log::trace;

/// A contiguous span of global cells of one type owned by one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartInfo {
    /// Zero-based material slot of the owning part, which may be empty
    pub slot: usize,
    /// Global index of the first cell in the block
    pub start: usize,
    /// Number of cells in the block
    pub num_cells: usize,
    /// Connectivity ids used by all the cells of the block
    pub cell_structure_size: usize,
    /// Cells of the same part registered before this block
    pub local_start: usize,
}

impl PartInfo {
    /// One past the last global cell of the block
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.num_cells
    }
}

/// Portion of a block that falls inside a requested window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Owning part slot
    pub slot: usize,
    /// Part-local index of the first cell of the span
    pub local_start: usize,
    /// Number of cells in the span
    pub count: usize,
}

/// The per-type block lists
#[derive(Debug, Default)]
pub struct CellIndex {
    blocks: [Vec<PartInfo>; CellType::COUNT],
    /// Cells registered so far for every (type, slot), for `local_start`
    registered: [Vec<usize>; CellType::COUNT],
}

impl CellIndex {
    pub fn new() -> Self {
        Default::default()
    }

    /// Record the next cell of a type in file order
    ///
    /// Cells must be registered in strictly increasing global order for each
    /// type, the block boundaries are only meaningful under that ordering.
    pub fn register(&mut self, cell_type: CellType, slot: usize, points_in_cell: usize) {
        let t = cell_type.index();

        let registered = &mut self.registered[t];
        if registered.len() <= slot {
            registered.resize(slot + 1, 0);
        }

        let blocks = &mut self.blocks[t];
        match blocks.last_mut() {
            Some(last) if last.slot == slot => {
                last.num_cells += 1;
                last.cell_structure_size += points_in_cell;
            }
            last => {
                let start = last.map_or(0, |b| b.end());
                trace!("New {cell_type} block for slot {slot} at cell {start}");
                blocks.push(PartInfo {
                    slot,
                    start,
                    num_cells: 1,
                    cell_structure_size: points_in_cell,
                    local_start: registered[slot],
                });
            }
        }

        registered[slot] += 1;
    }

    /// Ordered blocks of a cell type
    pub fn blocks(&self, cell_type: CellType) -> &[PartInfo] {
        &self.blocks[cell_type.index()]
    }

    /// Number of cells registered for a type
    pub fn num_cells(&self, cell_type: CellType) -> usize {
        self.blocks(cell_type).last().map_or(0, |b| b.end())
    }

    /// Total cells and connectivity length of a part within a type
    ///
    /// A linear walk over the blocks, which are already coalesced.
    pub fn size_of(&self, cell_type: CellType, slot: usize) -> (usize, usize) {
        self.blocks(cell_type)
            .iter()
            .filter(|b| b.slot == slot)
            .fold((0, 0), |(cells, length), b| {
                (cells + b.num_cells, length + b.cell_structure_size)
            })
    }

    /// Walk the blocks of a type from the block holding global cell `start`
    pub fn read_cursor(&self, cell_type: CellType, start: usize) -> ReadCursor<'_> {
        ReadCursor::new(self.blocks(cell_type), start)
    }

    /// Clip the blocks of a type to the window `start..start + len`
    ///
    /// Yields one [Span] per overlapping block in order, stopping at the
    /// first block that no longer overlaps.
    pub fn spans(
        &self,
        cell_type: CellType,
        start: usize,
        len: usize,
    ) -> impl Iterator<Item = Span> + '_ {
        let window = start..start + len;
        self.read_cursor(cell_type, start).map_while(move |info| {
            let clipped = clip(info.start..info.end(), window.clone())?;
            Some(Span {
                slot: info.slot,
                local_start: info.local_start + (clipped.start - info.start),
                count: clipped.len(),
            })
        })
    }

    /// A fresh set of insertion cursors, one per type
    pub fn insertion_cursors(&self) -> [InsertionCursor; CellType::COUNT] {
        Default::default()
    }
}

/// Re-entrant walk over the blocks of one type
///
/// Built fresh for every read, starting part way into the list.
#[derive(Debug, Clone)]
pub struct ReadCursor<'a> {
    blocks: &'a [PartInfo],
    position: usize,
}

impl<'a> ReadCursor<'a> {
    /// Position the cursor on the block containing global cell `start`
    ///
    /// Blocks are contiguous and sorted, so the block is found by bisection.
    /// A `start` past the last block leaves the cursor exhausted.
    pub fn new(blocks: &'a [PartInfo], start: usize) -> Self {
        let position = blocks.partition_point(|b| b.end() <= start);
        Self { blocks, position }
    }
}

impl<'a> Iterator for ReadCursor<'a> {
    type Item = &'a PartInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let info = self.blocks.get(self.position)?;
        self.position += 1;
        Some(info)
    }
}

/// Progress of the single sequential insertion pass for one type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertionCursor {
    /// Current block in the type's list
    block: usize,
    /// Cells already consumed from the current block
    inserted: usize,
}

impl InsertionCursor {
    /// Block owning the next cell, advancing past that cell
    ///
    /// Advancing beyond the last registered cell is an error.
    pub fn next_cell(&mut self, blocks: &[PartInfo]) -> Result<PartInfo> {
        let Some(info) = blocks.get(self.block).copied() else {
            bail!(
                "More cells inserted than the {} registered",
                blocks.last().map_or(0, |b| b.end())
            );
        };

        self.inserted += 1;
        if self.inserted == info.num_cells {
            self.block += 1;
            self.inserted = 0;
        }

        Ok(info)
    }

    /// Has every registered cell been inserted
    pub fn is_exhausted(&self, blocks: &[PartInfo]) -> bool {
        self.block >= blocks.len()
    }
}
