//! Reorganise file-ordered cell and point data into per-material parts
//!
//! # Overview
//!
//! The d3plot format writes cells grouped by [CellType] and then in file
//! order, with every cell naming its material. State data for each time step
//! follows the same cell order, and point data is written once for the
//! whole global point array. The [PartCollection] maps all of this onto
//! [Part] meshes.
//!
//! The collection is used in strictly sequential phases:
//!
//! 1. [register_cell()](PartCollection::register_cell) for every cell, in file
//!    order, building the run-length [CellIndex]
//! 2. [allocate_parts()](PartCollection::allocate_parts) to size every part
//!    exactly once
//! 3. [init_cell_insertion()](PartCollection::init_cell_insertion) and
//!    [insert_cell()](PartCollection::insert_cell) for every cell, in the same
//!    order
//! 4. [finalize_topology()](PartCollection::finalize_topology) to prune empty
//!    parts and build the rest
//! 5. any number of streaming reads of cell records, user ids, deleted flags,
//!    and point arrays
//!
//! ```rust
//! use d3parts::collection::PartCollection;
//! use d3parts::meta::{CellType, Metadata, PartMeta};
//!
//! let mut meta = Metadata {
//!     num_nodes: 100,
//!     parts: vec![
//!         PartMeta::new(1, 11, CellType::Shell, "door"),
//!         PartMeta::new(2, 12, CellType::Shell, "roof"),
//!     ],
//!     ..Default::default()
//! };
//! meta.cells.shell = 3;
//!
//! let mut collection = PartCollection::new(&meta).unwrap();
//! for material in [1, 1, 2] {
//!     collection.register_cell(CellType::Shell, material, 4).unwrap();
//! }
//!
//! assert_eq!(collection.size_of(CellType::Shell, 0), (2, 8));
//! assert_eq!(collection.size_of(CellType::Shell, 1), (1, 4));
//! ```

// Split into subfiles for development, but anything important is re-exported
mod directory;
mod index;
mod merge;

#[doc(inline)]
pub use crate::collection::directory::PartDirectory;

#[doc(inline)]
pub use crate::collection::index::{CellIndex, InsertionCursor, PartInfo, ReadCursor, Span};

#[doc(inline)]
pub use crate::collection::merge::{PointMerge, PointRange};

// internal modules
use crate::family::{chunk_sizes, Family, Word, WordKind, WordSize};
use crate::meta::{CellCounts, CellType, Metadata};
use crate::part::{CellKind, Connectivity, Part, PartSummary, PointRole};

// standard library
use std::ops::Range;

// external crates
use anyhow::{anyhow, bail, Result};
use log::{debug, trace};

/// Points buffered per chunk when streaming point arrays
pub const POINTS_PER_CHUNK: usize = 1_048_576;

/// Cells buffered per chunk when streaming cell arrays
pub const CELLS_PER_CHUNK: usize = 262_144;

/// Range of global cells of interest for each cell type
///
/// Fixed when the collection is created. Streaming reads only deliver cells
/// inside these windows and skip over the rest of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWindows {
    min: [usize; CellType::COUNT],
    max: [usize; CellType::COUNT],
}

impl CellWindows {
    /// Every cell of every type
    pub fn full(counts: &CellCounts) -> Self {
        Self {
            min: [0; CellType::COUNT],
            max: counts.to_array(),
        }
    }

    /// Explicit per-type `min..max` windows
    pub fn new(min: [usize; CellType::COUNT], max: [usize; CellType::COUNT]) -> Self {
        Self { min, max }
    }

    /// Replace the window of a single type
    pub fn with(mut self, cell_type: CellType, range: Range<usize>) -> Self {
        self.min[cell_type.index()] = range.start;
        self.max[cell_type.index()] = range.end;
        self
    }

    /// Window of a type, empty if the max does not exceed the min
    pub fn range(&self, cell_type: CellType) -> Range<usize> {
        let t = cell_type.index();
        self.min[t]..self.max[t].max(self.min[t])
    }
}

/// How to read one cell type's block of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadWindow {
    /// Cells to read
    pub num_cells: usize,
    /// Cells to skip before the read
    pub skip_start: usize,
    /// Cells to skip after the read
    pub skip_end: usize,
}

/// Every part of a file family and the index mapping cells onto them
#[derive(Debug)]
pub struct PartCollection {
    /// Parts by material slot
    directory: PartDirectory,
    /// Run-length map of global cells to slots
    index: CellIndex,
    /// Insertion progress, once insertion has started
    cursors: Option<[InsertionCursor; CellType::COUNT]>,
    /// Cells of interest per type
    windows: CellWindows,
    /// Cells declared in the file per type
    cell_counts: CellCounts,
    /// Size of the global point array
    num_nodes: usize,
    /// Points buffered per chunk for point arrays
    points_per_chunk: usize,
    /// Cells buffered per chunk for cell arrays
    cells_per_chunk: usize,
}

/// Construction and configuration
impl PartCollection {
    /// Collection covering every cell of every type
    pub fn new(meta: &Metadata) -> Result<Self> {
        Self::with_windows(meta, CellWindows::full(&meta.cells))
    }

    /// Collection reading only the given windows of each cell type
    ///
    /// A part is constructed for every enabled part in the metadata. Slots of
    /// disabled parts stay empty.
    pub fn with_windows(meta: &Metadata, windows: CellWindows) -> Result<Self> {
        meta.validate()?;

        for cell_type in CellType::ALL {
            let range = windows.range(cell_type);
            if range.end > meta.cells.get(cell_type) {
                bail!(
                    "Window {range:?} exceeds the {} {cell_type} cells in the file",
                    meta.cells.get(cell_type)
                );
            }
        }

        let mut directory = PartDirectory::new(meta.num_parts());
        for part in meta.parts.iter().filter(|p| p.enabled) {
            directory.construct(
                part.slot(),
                part.cell_type,
                &part.name,
                part.id,
                meta.num_nodes,
                meta.word_size,
            )?;
        }

        debug!(
            "Collection of {} part slots, {} enabled",
            directory.len(),
            directory.iter().count()
        );

        Ok(Self {
            directory,
            index: CellIndex::new(),
            cursors: None,
            windows,
            cell_counts: meta.cells,
            num_nodes: meta.num_nodes,
            points_per_chunk: POINTS_PER_CHUNK,
            cells_per_chunk: CELLS_PER_CHUNK,
        })
    }

    /// Bound on the points buffered at once for point arrays
    pub fn set_points_per_chunk(&mut self, points: usize) {
        self.points_per_chunk = points.max(1);
    }

    /// Bound on the cells buffered at once for cell arrays
    pub fn set_cells_per_chunk(&mut self, cells: usize) {
        self.cells_per_chunk = cells.max(1);
    }
}

/// Registration, allocation, insertion
impl PartCollection {
    /// Record the owning material of the next cell of a type
    ///
    /// `material` is the 1-based material index written in the file. Cells
    /// must arrive in file order per type, and all cells must be registered
    /// before insertion starts.
    pub fn register_cell(
        &mut self,
        cell_type: CellType,
        material: usize,
        points_in_cell: usize,
    ) -> Result<()> {
        if self.cursors.is_some() {
            bail!("Cannot register cells once insertion has started");
        }

        if material == 0 || material > self.directory.len() {
            bail!(
                "Material index {material} is outside 1..={}",
                self.directory.len()
            );
        }

        self.index.register(cell_type, material - 1, points_in_cell);
        Ok(())
    }

    /// Cells and connectivity length registered for a slot within a type
    pub fn size_of(&self, cell_type: CellType, slot: usize) -> (usize, usize) {
        self.index.size_of(cell_type, slot)
    }

    /// Size the storage of every part from the index
    pub fn allocate_parts(&mut self) -> Result<()> {
        for part in self.directory.iter_mut() {
            let (cells, length) = self.index.size_of(part.cell_type(), part.slot());
            trace!(
                "Allocating part {}: {cells} cells, {length} connectivity ids",
                part.material_id()
            );
            part.allocate_cell_memory(cells, length)?;
        }
        Ok(())
    }

    /// Start the insertion pass from the first block of every type
    pub fn init_cell_insertion(&mut self) {
        debug!("Starting cell insertion");
        self.cursors = Some(self.index.insertion_cursors());
    }

    /// Commit the next cell of a type to its part
    ///
    /// Cells of disabled parts are skipped, but still consume their place in
    /// the index.
    pub fn insert_cell(
        &mut self,
        cell_type: CellType,
        kind: CellKind,
        conn: &Connectivity,
    ) -> Result<()> {
        let cursors = self
            .cursors
            .as_mut()
            .ok_or_else(|| anyhow!("Cell insertion has not been initialised"))?;

        let info = cursors[cell_type.index()].next_cell(self.index.blocks(cell_type))?;
        if let Some(part) = self.directory.get_mut(info.slot) {
            part.add_cell(kind, conn)?;
        }
        Ok(())
    }

    /// Build every part's topology, dropping parts left without cells
    pub fn finalize_topology(&mut self) -> Result<()> {
        let mut pruned = Vec::new();
        for slot in 0..self.directory.len() {
            let keep = match self.directory.get_mut(slot) {
                None => continue,
                Some(part) if part.has_cells() => {
                    part.build_topology()?;
                    true
                }
                Some(_) => false,
            };

            if !keep {
                self.directory.remove(slot);
                pruned.push(slot);
            }
        }

        if !pruned.is_empty() {
            debug!("Pruned {} empty part(s) from slots {pruned:?}", pruned.len());
        }
        Ok(())
    }
}

/// Cell arrays
impl PartCollection {
    /// Which cells of a type to read, and how many to skip either side
    pub fn read_info(&self, cell_type: CellType) -> ReadWindow {
        let total = self.cell_counts.get(cell_type);
        let range = self.windows.range(cell_type);

        match range.len() {
            0 => ReadWindow {
                num_cells: 0,
                skip_start: total,
                skip_end: 0,
            },
            n => ReadWindow {
                num_cells: n,
                skip_start: range.start,
                skip_end: total - range.end,
            },
        }
    }

    /// Register a per-cell property on every part of a type
    pub fn add_property(
        &mut self,
        cell_type: CellType,
        name: &str,
        offset: usize,
        components: usize,
    ) {
        for part in self.directory.parts_of_type_mut(cell_type) {
            part.add_cell_property(name, offset, components);
        }
    }

    /// Dispatch decoded cell records to their parts
    ///
    /// `buffer` holds `values_per_cell` values for each of the global cells
    /// `start..start + num_cells`.
    pub fn fill_cell_properties<T: Word>(
        &mut self,
        buffer: &[T],
        cell_type: CellType,
        start: usize,
        num_cells: usize,
        values_per_cell: usize,
    ) -> Result<()> {
        if buffer.len() != num_cells * values_per_cell {
            bail!(
                "Expected {} values for {num_cells} cells, found {}",
                num_cells * values_per_cell,
                buffer.len()
            );
        }

        let mut remaining = buffer;
        for span in self.index.spans(cell_type, start, num_cells) {
            let (head, tail) = remaining.split_at(span.count * values_per_cell);
            if let Some(part) = self.directory.get_mut(span.slot) {
                part.read_cell_properties(span.local_start, head, values_per_cell)?;
            }
            remaining = tail;
        }

        ensure_consumed(remaining.len() / values_per_cell.max(1), cell_type, start, num_cells)
    }

    /// Dispatch decoded user ids to their parts
    pub fn fill_cell_user_ids<T: Word>(
        &mut self,
        buffer: &[T],
        cell_type: CellType,
        start: usize,
        num_cells: usize,
    ) -> Result<()> {
        if buffer.len() != num_cells {
            bail!("Expected {num_cells} user ids, found {}", buffer.len());
        }

        let mut remaining = buffer;
        for span in self.index.spans(cell_type, start, num_cells) {
            let (head, tail) = remaining.split_at(span.count);
            if let Some(part) = self.directory.get_mut(span.slot) {
                part.enable_cell_user_ids();
                part.seek_cell_user_id(span.local_start);
                for id in head {
                    part.set_next_cell_user_id(id.as_i64())?;
                }
            }
            remaining = tail;
        }

        ensure_consumed(remaining.len(), cell_type, start, num_cells)
    }

    /// Apply the deleted flags of the current time step to every part of a type
    ///
    /// `flags` covers exactly the window of the type, one byte per cell, and a
    /// non-zero byte marks a deleted cell.
    pub fn set_cell_dead_flags(&mut self, cell_type: CellType, flags: &[u8]) -> Result<()> {
        let window = self.windows.range(cell_type);
        if flags.len() != window.len() {
            bail!(
                "Expected {} deleted flags for {cell_type} cells {window:?}, found {}",
                window.len(),
                flags.len()
            );
        }

        for part in self.directory.parts_of_type_mut(cell_type) {
            part.enable_dead_cells();
        }

        let mut remaining = flags;
        for span in self.index.spans(cell_type, window.start, window.len()) {
            let (head, tail) = remaining.split_at(span.count);
            if let Some(part) = self.directory.get_mut(span.slot) {
                part.set_cells_dead_state(span.local_start, head)?;
            }
            remaining = tail;
        }

        ensure_consumed(remaining.len(), cell_type, window.start, window.len())
    }

    /// Stream the user ids of a type from the family
    ///
    /// With `status` false the whole block is skipped.
    pub fn read_cell_user_ids(
        &mut self,
        family: &mut Family,
        cell_type: CellType,
        status: bool,
    ) -> Result<()> {
        let window = self.read_info(cell_type);

        if !status {
            trace!("Skipping {cell_type} user ids");
            let total = window.skip_start + window.num_cells + window.skip_end;
            return family.skip_words(total as u64);
        }

        family.skip_words(window.skip_start as u64)?;
        match family.word_size() {
            WordSize::Four => self.stream_user_ids::<i32>(family, cell_type, window.num_cells)?,
            WordSize::Eight => self.stream_user_ids::<i64>(family, cell_type, window.num_cells)?,
        }
        family.skip_words(window.skip_end as u64)?;
        family.clear_buffer();
        Ok(())
    }

    fn stream_user_ids<T: Word>(
        &mut self,
        family: &mut Family,
        cell_type: CellType,
        num_cells: usize,
    ) -> Result<()> {
        let mut start = self.windows.range(cell_type).start;
        for n in chunk_sizes(num_cells, self.cells_per_chunk) {
            family.buffer_chunk(WordKind::Int, n)?;
            let buffer = family.buffer_as::<T>()?;
            self.fill_cell_user_ids(&buffer, cell_type, start, n)?;
            start += n;
        }
        Ok(())
    }

    /// Stream the cell records of a type from the family
    ///
    /// Each record holds `values_per_cell` words, and the properties registered
    /// with [add_property()](PartCollection::add_property) pick their values
    /// out of it.
    pub fn read_cell_properties(
        &mut self,
        family: &mut Family,
        cell_type: CellType,
        values_per_cell: usize,
    ) -> Result<()> {
        let window = self.read_info(cell_type);
        family.skip_words((window.skip_start * values_per_cell) as u64)?;
        match family.word_size() {
            WordSize::Four => self.stream_cell_records::<f32>(
                family,
                cell_type,
                window.num_cells,
                values_per_cell,
            )?,
            WordSize::Eight => self.stream_cell_records::<f64>(
                family,
                cell_type,
                window.num_cells,
                values_per_cell,
            )?,
        }
        family.skip_words((window.skip_end * values_per_cell) as u64)?;
        family.clear_buffer();
        Ok(())
    }

    fn stream_cell_records<T: Word>(
        &mut self,
        family: &mut Family,
        cell_type: CellType,
        num_cells: usize,
        values_per_cell: usize,
    ) -> Result<()> {
        let mut start = self.windows.range(cell_type).start;
        for n in chunk_sizes(num_cells, self.cells_per_chunk) {
            family.buffer_chunk(WordKind::Float, n * values_per_cell)?;
            let buffer = family.buffer_as::<T>()?;
            self.fill_cell_properties(&buffer, cell_type, start, n, values_per_cell)?;
            start += n;
        }
        Ok(())
    }

    /// Stream the deleted flags of a type from the family
    ///
    /// The file holds one float per cell, zero meaning the cell was deleted.
    pub fn read_dead_cells(&mut self, family: &mut Family, cell_type: CellType) -> Result<()> {
        let window = self.read_info(cell_type);
        family.skip_words(window.skip_start as u64)?;

        let mut flags = Vec::with_capacity(window.num_cells);
        for n in chunk_sizes(window.num_cells, self.cells_per_chunk) {
            family.buffer_chunk(WordKind::Float, n)?;
            match family.word_size() {
                WordSize::Four => extend_dead_flags(&mut flags, &family.buffer_as::<f32>()?),
                WordSize::Eight => extend_dead_flags(&mut flags, &family.buffer_as::<f64>()?),
            }
        }

        family.skip_words(window.skip_end as u64)?;
        family.clear_buffer();
        self.set_cell_dead_flags(cell_type, &flags)
    }

    /// Stop tracking deleted cells on every part
    pub fn disable_dead_cells(&mut self) {
        for part in self.directory.iter_mut().filter(|p| p.has_cells()) {
            part.disable_dead_cells();
        }
    }

    /// Drop everything read for the current time step from every part
    pub fn reset_time_step_info(&mut self) {
        for part in self.directory.iter_mut() {
            part.reset_time_step();
        }
    }
}

/// Point arrays
impl PartCollection {
    /// Stream a point-based array from the family into the parts using it
    ///
    /// The array holds `num_tuples` points of `num_comps` words. Geometry and
    /// properties go to the parts of every geometry-bearing cell type, road
    /// arrays only to road surface parts. Only the span of points actually
    /// used is read, the rest is skipped.
    pub fn read_point_property(
        &mut self,
        family: &mut Family,
        num_tuples: usize,
        num_comps: usize,
        name: &str,
        role: PointRole,
    ) -> Result<()> {
        let words = (num_tuples * num_comps) as u64;
        if !role.is_wanted() {
            trace!("Skipping point array \"{name}\"");
            return family.skip_words(words);
        }

        let cell_types: &[CellType] = match role.road {
            true => &[CellType::RoadSurface],
            false => &CellType::GEOMETRY,
        };

        let mut ranges = Vec::new();
        for &cell_type in cell_types {
            for part in self
                .directory
                .parts_of_type_mut(cell_type)
                .filter(|p| p.has_cells())
            {
                part.add_point_property(name, num_comps, role.property, role.geometry)?;
                ranges.push(PointRange::new(
                    part.slot(),
                    part.min_global_point_id(),
                    part.max_global_point_id(),
                ));
            }
        }

        let mut merge = PointMerge::new(ranges);
        let Some((min, max)) = merge.span() else {
            debug!("No parts use point array \"{name}\", skipping");
            return family.skip_words(words);
        };

        if max > num_tuples {
            bail!("Parts use points up to {max} but \"{name}\" only has {num_tuples}");
        }

        debug!(
            "Reading point array \"{name}\" for points {min}..{max} into {} parts",
            merge.len()
        );

        family.skip_words((min * num_comps) as u64)?;
        match family.word_size() {
            WordSize::Four => self.stream_points::<f32>(family, &mut merge, min..max, num_comps)?,
            WordSize::Eight => self.stream_points::<f64>(family, &mut merge, min..max, num_comps)?,
        }
        family.skip_words(((num_tuples - max) * num_comps) as u64)?;
        family.clear_buffer();
        Ok(())
    }

    fn stream_points<T: Word>(
        &mut self,
        family: &mut Family,
        merge: &mut PointMerge,
        span: Range<usize>,
        num_comps: usize,
    ) -> Result<()> {
        let mut offset = span.start;
        for n in chunk_sizes(span.len(), self.points_per_chunk) {
            family.buffer_chunk(WordKind::Float, n * num_comps)?;
            let buffer = family.buffer_as::<T>()?;

            let slots = merge.next_chunk(offset, n);
            trace!("Points {offset}..{} feed slots {slots:?}", offset + n);
            for slot in slots {
                if let Some(part) = self.directory.get_mut(slot) {
                    part.read_point_based_property(&buffer, n, num_comps, offset)?;
                }
            }
            offset += n;
        }
        Ok(())
    }
}

/// Getters
impl PartCollection {
    /// Number of part slots, including empty ones
    pub fn number_of_parts(&self) -> usize {
        self.directory.len()
    }

    /// Does the slot hold a part
    pub fn is_active_part(&self, slot: usize) -> bool {
        self.directory.exists(slot)
    }

    pub fn part(&self, slot: usize) -> Option<&Part> {
        self.directory.get(slot)
    }

    pub fn part_mut(&mut self, slot: usize) -> Option<&mut Part> {
        self.directory.get_mut(slot)
    }

    /// Every part in slot order
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.directory.iter()
    }

    /// Take ownership of every remaining part
    pub fn into_parts(self) -> Vec<Part> {
        let PartCollection { mut directory, .. } = self;
        (0..directory.len())
            .filter_map(|slot| directory.remove(slot))
            .collect()
    }

    pub fn directory(&self) -> &PartDirectory {
        &self.directory
    }

    pub fn index(&self) -> &CellIndex {
        &self.index
    }

    pub fn windows(&self) -> &CellWindows {
        &self.windows
    }

    /// Size of the global point array
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Overview of every part
    pub fn summary(&self) -> Vec<PartSummary> {
        self.parts().map(|p| p.summary()).collect()
    }
}

/// A window must be fully covered by registered cells
fn ensure_consumed(left: usize, cell_type: CellType, start: usize, num_cells: usize) -> Result<()> {
    if left > 0 {
        bail!(
            "Only {} of {num_cells} {cell_type} cells from {start} are registered",
            num_cells - left
        );
    }
    Ok(())
}

/// Zero means deleted
fn extend_dead_flags<T: Word>(flags: &mut Vec<u8>, words: &[T]) {
    flags.extend(words.iter().map(|w| u8::from(w.as_f64() == 0.0)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Endian;
    use crate::meta::PartMeta;

    fn meta() -> Metadata {
        let mut meta = Metadata {
            num_nodes: 100,
            parts: vec![
                PartMeta::new(1, 1, CellType::Shell, "upper"),
                PartMeta::new(2, 2, CellType::Solid, "block"),
                PartMeta::new(3, 3, CellType::Shell, "lower"),
                PartMeta::new(4, 4, CellType::Beam, "unused"),
            ],
            ..Default::default()
        };
        meta.cells.shell = 30;
        meta.cells.solid = 5;
        meta
    }

    fn quad(first: usize) -> Connectivity {
        Connectivity::new(&[first, first + 1, first + 2, first + 3]).unwrap()
    }

    /// Shell part 1 with 10 cells, solid part 2 with 5, shell part 3 with 20
    fn loaded(windows: CellWindows) -> PartCollection {
        let mut collection = PartCollection::with_windows(&meta(), windows).unwrap();
        for _ in 0..10 {
            collection.register_cell(CellType::Shell, 1, 4).unwrap();
        }
        for _ in 0..5 {
            collection.register_cell(CellType::Solid, 2, 8).unwrap();
        }
        for _ in 0..20 {
            collection.register_cell(CellType::Shell, 3, 4).unwrap();
        }

        collection.allocate_parts().unwrap();
        collection.init_cell_insertion();

        for i in 0..10 {
            collection
                .insert_cell(CellType::Shell, CellKind::Quad, &quad(i))
                .unwrap();
        }
        let hex = Connectivity::new(&(80..88).collect::<Vec<usize>>()).unwrap();
        for _ in 0..5 {
            collection
                .insert_cell(CellType::Solid, CellKind::Hexahedron, &hex)
                .unwrap();
        }
        for i in 0..20 {
            collection
                .insert_cell(CellType::Shell, CellKind::Quad, &quad(40 + i))
                .unwrap();
        }

        collection.finalize_topology().unwrap();
        collection
    }

    fn full() -> PartCollection {
        loaded(CellWindows::full(&meta().cells))
    }

    fn f32_family(values: &[f32]) -> Family {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Family::from_bytes(bytes, WordSize::Four, Endian::Little)
    }

    #[test]
    fn sizes_and_pruning() {
        let collection = full();
        assert_eq!(collection.size_of(CellType::Shell, 0), (10, 40));
        assert_eq!(collection.size_of(CellType::Shell, 2), (20, 80));
        assert_eq!(collection.size_of(CellType::Solid, 1), (5, 40));

        assert_eq!(collection.number_of_parts(), 4);
        assert!(collection.is_active_part(0));
        assert!(!collection.is_active_part(3));
        assert_eq!(collection.parts().count(), 3);
        assert_eq!(collection.part(2).map(|p| p.num_cells()), Some(20));
    }

    #[test]
    fn windowed_cell_properties_split_across_parts() {
        let mut collection = full();
        collection.add_property(CellType::Shell, "stress", 0, 2);

        let buffer: Vec<f32> = (5..15).flat_map(|c| [c as f32, 10.0 * c as f32]).collect();
        assert_eq!(buffer.len(), 20);
        collection
            .fill_cell_properties(&buffer, CellType::Shell, 5, 10, 2)
            .unwrap();

        let upper = collection.part(0).unwrap().cell_property("stress").unwrap();
        assert_eq!(upper.cell(4), Some(&[0.0, 0.0][..]));
        assert_eq!(upper.cell(5), Some(&[5.0, 50.0][..]));
        assert_eq!(upper.cell(9), Some(&[9.0, 90.0][..]));

        let lower = collection.part(2).unwrap().cell_property("stress").unwrap();
        assert_eq!(lower.cell(0), Some(&[10.0, 100.0][..]));
        assert_eq!(lower.cell(4), Some(&[14.0, 140.0][..]));
        assert_eq!(lower.cell(5), Some(&[0.0, 0.0][..]));

        let short = vec![0.0f32; 19];
        assert!(collection
            .fill_cell_properties(&short, CellType::Shell, 5, 10, 2)
            .is_err());
    }

    #[test]
    fn streamed_cell_records_skip_outside_window() {
        let windows = CellWindows::full(&meta().cells).with(CellType::Shell, 8..12);
        let mut collection = loaded(windows);
        collection.set_cells_per_chunk(3);
        collection.add_property(CellType::Shell, "thickness", 1, 1);

        let records: Vec<f32> = (0..30).flat_map(|c| [-1.0, c as f32]).collect();
        let mut family = f32_family(&records);
        collection
            .read_cell_properties(&mut family, CellType::Shell, 2)
            .unwrap();
        assert_eq!(family.position(), 60);

        let upper = collection.part(0).unwrap().cell_property("thickness").unwrap();
        assert_eq!(upper.cell(8), Some(&[8.0][..]));
        assert_eq!(upper.cell(7), Some(&[0.0][..]));
        let lower = collection.part(2).unwrap().cell_property("thickness").unwrap();
        assert_eq!(lower.cell(1), Some(&[11.0][..]));
        assert_eq!(lower.cell(2), Some(&[0.0][..]));
    }

    #[test]
    fn dead_cells_follow_window() {
        let windows = CellWindows::full(&meta().cells).with(CellType::Shell, 8..12);
        let mut collection = loaded(windows);

        assert_eq!(
            collection.read_info(CellType::Shell),
            ReadWindow {
                num_cells: 4,
                skip_start: 8,
                skip_end: 18,
            }
        );

        let mut words = vec![1.0f32; 30];
        words[9] = 0.0;
        words[10] = 0.0;
        words[20] = 0.0;
        let mut family = f32_family(&words);
        collection
            .read_dead_cells(&mut family, CellType::Shell)
            .unwrap();
        assert_eq!(family.position(), 30);

        let upper = collection.part(0).unwrap();
        assert!(!upper.is_cell_dead(8));
        assert!(upper.is_cell_dead(9));
        assert_eq!(upper.num_dead_cells(), 1);

        let lower = collection.part(2).unwrap();
        assert!(lower.is_cell_dead(0));
        assert!(!lower.is_cell_dead(10));
        assert_eq!(lower.num_dead_cells(), 1);

        assert!(collection
            .set_cell_dead_flags(CellType::Shell, &[0, 1])
            .is_err());

        collection.disable_dead_cells();
        assert!(collection.part(0).unwrap().dead_cells().is_none());
    }

    #[test]
    fn empty_window_skips_whole_block() {
        let windows = CellWindows::full(&meta().cells).with(CellType::Solid, 3..3);
        let mut collection = loaded(windows);
        assert_eq!(
            collection.read_info(CellType::Solid),
            ReadWindow {
                num_cells: 0,
                skip_start: 5,
                skip_end: 0,
            }
        );

        let mut family = f32_family(&[1.0; 5]);
        collection
            .read_dead_cells(&mut family, CellType::Solid)
            .unwrap();
        assert_eq!(family.position(), 5);
    }

    #[test]
    fn user_ids_from_integer_words() {
        let mut collection = full();
        let ids: Vec<u8> = (1001..1006i32).flat_map(|v| v.to_le_bytes()).collect();

        let mut family = Family::from_bytes(ids.clone(), WordSize::Four, Endian::Little);
        collection
            .read_cell_user_ids(&mut family, CellType::Solid, false)
            .unwrap();
        assert_eq!(family.position(), 5);
        assert!(collection.part(1).unwrap().user_ids().is_none());

        let mut family = Family::from_bytes(ids, WordSize::Four, Endian::Little);
        collection
            .read_cell_user_ids(&mut family, CellType::Solid, true)
            .unwrap();
        assert_eq!(
            collection.part(1).unwrap().user_ids(),
            Some(&[1001, 1002, 1003, 1004, 1005][..])
        );
    }

    #[test]
    fn windowed_user_ids_from_long_words() {
        let mut meta = Metadata {
            word_size: WordSize::Eight,
            num_nodes: 40,
            parts: vec![
                PartMeta::new(1, 1, CellType::Shell, "outer"),
                PartMeta::new(2, 2, CellType::Shell, "inner"),
                PartMeta::new(3, 3, CellType::Shell, "off"),
            ],
            ..Default::default()
        };
        meta.parts[2].enabled = false;
        meta.cells.shell = 7;

        // globals 1..6 start inside an outer block and cross the disabled one
        let windows = CellWindows::full(&meta.cells).with(CellType::Shell, 1..6);
        let mut collection = PartCollection::with_windows(&meta, windows).unwrap();
        let materials = [1, 1, 2, 3, 2, 1, 1];
        for material in materials {
            collection.register_cell(CellType::Shell, material, 4).unwrap();
        }
        collection.allocate_parts().unwrap();
        collection.init_cell_insertion();
        for i in 0..materials.len() {
            collection
                .insert_cell(CellType::Shell, CellKind::Quad, &quad(4 * i))
                .unwrap();
        }
        collection.finalize_topology().unwrap();

        let ids: Vec<u8> = (1000..1007i64).flat_map(|v| v.to_le_bytes()).collect();
        let mut family = Family::from_bytes(ids, WordSize::Eight, Endian::Little);
        collection
            .read_cell_user_ids(&mut family, CellType::Shell, true)
            .unwrap();
        assert_eq!(family.position(), 7);

        let outer = collection.part(0).unwrap();
        assert_eq!(outer.user_ids(), Some(&[0, 1001, 1005, 0][..]));
        let inner = collection.part(1).unwrap();
        assert_eq!(inner.user_ids(), Some(&[1002, 1004][..]));

        // the disabled block still takes its flag
        collection
            .set_cell_dead_flags(CellType::Shell, &[1, 0, 1, 0, 1])
            .unwrap();
        let outer = collection.part(0).unwrap();
        assert_eq!(outer.dead_cells(), Some(&[false, true, true, false][..]));
        let inner = collection.part(1).unwrap();
        assert_eq!(inner.dead_cells(), Some(&[false, false][..]));
    }

    #[test]
    fn point_array_streamed_in_chunks() {
        let mut collection = full();
        collection.set_points_per_chunk(16);

        let coords: Vec<f32> = (0..100).flat_map(|g| [g as f32, 0.5, -(g as f32)]).collect();
        let mut family = f32_family(&coords);
        collection
            .read_point_property(&mut family, 100, 3, "coordinates", PointRole::GEOMETRY)
            .unwrap();
        assert_eq!(family.position(), 300);

        let upper = collection.part(0).unwrap();
        assert_eq!(upper.num_points(), 13);
        assert_eq!(upper.point(12), Some(&[12.0, 0.5, -12.0][..]));

        let block = collection.part(1).unwrap();
        assert_eq!(block.point(0), Some(&[80.0, 0.5, -80.0][..]));
        assert_eq!(block.point(7), Some(&[87.0, 0.5, -87.0][..]));

        let lower = collection.part(2).unwrap();
        assert_eq!(lower.point(0), Some(&[40.0, 0.5, -40.0][..]));
        assert_eq!(lower.point(22), Some(&[62.0, 0.5, -62.0][..]));
    }

    #[test]
    fn nested_point_ranges_get_their_own_values() {
        let mut meta = Metadata {
            num_nodes: 300,
            parts: vec![
                PartMeta::new(1, 1, CellType::Shell, "outer"),
                PartMeta::new(2, 2, CellType::Shell, "inner"),
                PartMeta::new(3, 3, CellType::Beam, "far"),
            ],
            ..Default::default()
        };
        meta.cells.shell = 76;
        meta.cells.beam = 1;

        // outer covers points 0..300, inner sits inside it at 100..104
        let mut shells: Vec<(usize, usize)> = (0..50).map(|i| (1, 4 * i)).collect();
        shells.push((2, 100));
        shells.extend((50..75).map(|i| (1, 4 * i)));

        let mut collection = PartCollection::new(&meta).unwrap();
        for &(material, _) in &shells {
            collection.register_cell(CellType::Shell, material, 4).unwrap();
        }
        collection.register_cell(CellType::Beam, 3, 2).unwrap();
        collection.allocate_parts().unwrap();
        collection.init_cell_insertion();
        for &(_, first) in &shells {
            collection
                .insert_cell(CellType::Shell, CellKind::Quad, &quad(first))
                .unwrap();
        }
        let line = Connectivity::new(&[200, 201]).unwrap();
        collection
            .insert_cell(CellType::Beam, CellKind::Line, &line)
            .unwrap();
        collection.finalize_topology().unwrap();

        collection.set_points_per_chunk(7);
        let values: Vec<f32> = (0..300).map(|g| g as f32).collect();
        let mut family = f32_family(&values);
        collection
            .read_point_property(&mut family, 300, 1, "id", PointRole::GEOMETRY)
            .unwrap();
        assert_eq!(family.position(), 300);

        let inner = collection.part(1).unwrap();
        assert_eq!(inner.points(), &[100.0, 101.0, 102.0, 103.0][..]);

        let far = collection.part(2).unwrap();
        assert_eq!(far.points(), &[200.0, 201.0][..]);

        let outer = collection.part(0).unwrap();
        assert_eq!(outer.num_points(), 300);
        assert_eq!(outer.point(0), Some(&[0.0][..]));
        assert_eq!(outer.point(103), Some(&[103.0][..]));
        assert_eq!(outer.point(299), Some(&[299.0][..]));
        assert!(outer.points().iter().enumerate().all(|(i, &v)| v == i as f64));
    }

    #[test]
    fn unwanted_or_unused_point_arrays_are_skipped() {
        let mut collection = full();
        let mut family = f32_family(&[0.0; 300]);
        collection
            .read_point_property(&mut family, 100, 3, "ignored", PointRole::default())
            .unwrap();
        assert_eq!(family.position(), 300);

        let road = PointRole {
            road: true,
            ..PointRole::PROPERTY
        };
        let mut family = f32_family(&[0.0; 300]);
        collection
            .read_point_property(&mut family, 100, 3, "road", road)
            .unwrap();
        assert_eq!(family.position(), 300);
    }

    #[test]
    fn misuse_is_an_error() {
        let mut collection = PartCollection::new(&meta()).unwrap();
        assert!(collection.register_cell(CellType::Shell, 0, 4).is_err());
        assert!(collection.register_cell(CellType::Shell, 5, 4).is_err());
        assert!(collection
            .insert_cell(CellType::Shell, CellKind::Quad, &quad(0))
            .is_err());

        collection.register_cell(CellType::Shell, 1, 4).unwrap();
        collection.allocate_parts().unwrap();
        collection.init_cell_insertion();
        assert!(collection.register_cell(CellType::Shell, 1, 4).is_err());

        collection
            .insert_cell(CellType::Shell, CellKind::Quad, &quad(0))
            .unwrap();
        assert!(collection
            .insert_cell(CellType::Shell, CellKind::Quad, &quad(0))
            .is_err());
    }

    #[test]
    fn disabled_part_still_advances() {
        let mut meta = meta();
        meta.parts[0].enabled = false;

        let mut collection = PartCollection::new(&meta).unwrap();
        for material in [1, 1, 3, 3, 1] {
            collection.register_cell(CellType::Shell, material, 4).unwrap();
        }
        assert_eq!(collection.size_of(CellType::Shell, 0), (3, 12));

        collection.allocate_parts().unwrap();
        collection.init_cell_insertion();
        for i in 0..5 {
            collection
                .insert_cell(CellType::Shell, CellKind::Quad, &quad(i))
                .unwrap();
        }
        collection.finalize_topology().unwrap();
        assert!(!collection.is_active_part(0));

        collection.add_property(CellType::Shell, "id", 0, 1);
        let buffer: Vec<f64> = (0..5).map(|c| c as f64).collect();
        collection
            .fill_cell_properties(&buffer, CellType::Shell, 0, 5, 1)
            .unwrap();

        let lower = collection.part(2).unwrap().cell_property("id").unwrap();
        assert_eq!(lower.values, vec![2.0, 3.0]);
    }

    #[test]
    fn window_beyond_file_rejected() {
        let windows = CellWindows::full(&meta().cells).with(CellType::Shell, 0..31);
        assert!(PartCollection::with_windows(&meta(), windows).is_err());
    }
}
