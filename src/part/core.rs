// internal modules
use crate::family::{Word, WordSize};
use crate::meta::CellType;
use crate::part::{CellKind, CellProperty, Connectivity, PointProperty};
use crate::utils::*;

// external crates
use anyhow::{anyhow, bail, Result};
use log::{debug, trace, warn};
use serde::Serialize;

/// The mesh of a single material
///
/// A part owns its cells, the subset of the global points those cells use, and
/// any cell or point arrays read for the current time step. All cells of a
/// part share the same [CellType].
///
/// Cells are added with global point ids. Once every cell is known,
/// [build_topology()](Part::build_topology) collects the unique global points
/// and rewrites the connectivity in terms of local point ids.
#[derive(Debug, Clone)]
pub struct Part {
    /// Category of every cell in the part
    cell_type: CellType,
    /// Name given to the part, may be empty
    name: String,
    /// Zero-based material slot
    slot: usize,
    /// User facing part id
    material_id: i32,
    /// Size of the global point array
    num_global_nodes: usize,
    /// Word size of the family the part is read from
    word_size: WordSize,

    /// Cells and connectivity storage allocated, if any
    allocated: Option<(usize, usize)>,
    /// Kind of every cell
    kinds: Vec<CellKind>,
    /// Start of every cell in `connectivity`, with a trailing end offset
    offsets: Vec<usize>,
    /// Global point ids until the topology is built, local ids afterwards
    connectivity: Vec<usize>,
    /// Lowest and one-past-highest global point id referenced
    point_span: Option<(usize, usize)>,
    /// Sorted unique global point ids, position is the local point id
    global_points: Vec<usize>,
    /// Has `connectivity` been rewritten to local ids
    topology_built: bool,

    /// Point coordinates, `point_dims` per local point
    points: Vec<f64>,
    point_dims: usize,

    cell_properties: Vec<CellProperty>,
    point_properties: Vec<PointProperty>,
    /// Target of the next point-based read
    point_read: Option<PointRead>,

    /// User ids of every cell, once enabled
    user_ids: Option<Vec<i64>>,
    /// Local cell the next user id is written to
    user_id_cursor: usize,

    /// Deleted state of every cell for the current time step, once enabled
    dead: Option<Vec<bool>>,
}

/// Where the values of a point-based read are stored
#[derive(Debug, Clone, Copy, PartialEq)]
struct PointRead {
    components: usize,
    property: Option<usize>,
    geometry: bool,
}

/// Construction and cell insertion
impl Part {
    /// Create an empty part for a material slot
    pub fn new(
        cell_type: CellType,
        name: &str,
        slot: usize,
        material_id: i32,
        num_global_nodes: usize,
        word_size: WordSize,
    ) -> Self {
        trace!("New {cell_type} part {material_id} \"{name}\" in slot {slot}");
        Self {
            cell_type,
            name: name.to_string(),
            slot,
            material_id,
            num_global_nodes,
            word_size,
            allocated: None,
            kinds: Vec::new(),
            offsets: Vec::new(),
            connectivity: Vec::new(),
            point_span: None,
            global_points: Vec::new(),
            topology_built: false,
            points: Vec::new(),
            point_dims: 0,
            cell_properties: Vec::new(),
            point_properties: Vec::new(),
            point_read: None,
            user_ids: None,
            user_id_cursor: 0,
            dead: None,
        }
    }

    /// Reserve exactly enough storage for every cell of the part
    ///
    /// This may only happen once, cells are never added past the allocation.
    pub fn allocate_cell_memory(
        &mut self,
        num_cells: usize,
        cell_array_length: usize,
    ) -> Result<()> {
        if let Some((cells, _)) = self.allocated {
            bail!(
                "Part {} already allocated for {cells} cells",
                self.material_id
            );
        }

        self.kinds = Vec::with_capacity(num_cells);
        self.offsets = Vec::with_capacity(num_cells + 1);
        self.offsets.push(0);
        self.connectivity = Vec::with_capacity(cell_array_length);
        self.allocated = Some((num_cells, cell_array_length));
        Ok(())
    }

    /// Append a cell given in global point ids
    pub fn add_cell(&mut self, kind: CellKind, conn: &Connectivity) -> Result<()> {
        let (max_cells, max_length) = self
            .allocated
            .ok_or_else(|| anyhow!("Part {} has no cell storage allocated", self.material_id))?;

        if self.topology_built {
            bail!("Cannot add cells to part {} after building topology", self.material_id);
        }

        if self.kinds.len() == max_cells || self.connectivity.len() + conn.len() > max_length {
            bail!(
                "Part {} is full, allocated {max_cells} cells and {max_length} connectivity ids",
                self.material_id
            );
        }

        if conn.len() != kind.num_points() {
            bail!("{kind:?} needs {} points, found {}", kind.num_points(), conn.len());
        }

        for &id in conn.as_slice() {
            if id >= self.num_global_nodes {
                bail!(
                    "Point {id} is outside the global point array of {} points",
                    self.num_global_nodes
                );
            }
            self.point_span = Some(match self.point_span {
                None => (id, id + 1),
                Some((min, max)) => (min.min(id), max.max(id + 1)),
            });
        }

        self.kinds.push(kind);
        self.connectivity.extend_from_slice(conn.as_slice());
        self.offsets.push(self.connectivity.len());
        Ok(())
    }

    /// Collect the unique global points and switch connectivity to local ids
    pub fn build_topology(&mut self) -> Result<()> {
        if self.topology_built {
            return Ok(());
        }

        if let Some((cells, _)) = self.allocated {
            if cells != self.kinds.len() {
                warn!(
                    "Part {} allocated {cells} cells but {} were inserted",
                    self.material_id,
                    self.kinds.len()
                );
            }
        }

        let mut global_points = self.connectivity.clone();
        global_points.sort_unstable();
        global_points.dedup();

        for id in self.connectivity.iter_mut() {
            *id = global_points
                .binary_search(id)
                .map_err(|_| anyhow!("Point {id} missing from the unique point list"))?;
        }

        debug!(
            "Part {} topology: {} cells, {} points",
            self.material_id,
            self.kinds.len(),
            global_points.len()
        );

        self.global_points = global_points;
        self.topology_built = true;
        Ok(())
    }
}

/// Cell arrays
impl Part {
    /// Register a per-cell array read from each cell record
    pub fn add_cell_property(&mut self, name: &str, offset: usize, components: usize) {
        self.cell_properties.retain(|p| p.name != name);
        self.cell_properties
            .push(CellProperty::new(name, offset, components));
    }

    /// Copy cell records into every registered cell property
    ///
    /// `buffer` holds whole records of `values_per_cell` values for
    /// consecutive cells, the first of which is local cell `first_cell`.
    pub fn read_cell_properties<T: Word>(
        &mut self,
        first_cell: usize,
        buffer: &[T],
        values_per_cell: usize,
    ) -> Result<()> {
        if values_per_cell == 0 || buffer.len() % values_per_cell != 0 {
            bail!(
                "Buffer of {} values is not a whole number of {values_per_cell}-value records",
                buffer.len()
            );
        }

        let count = buffer.len() / values_per_cell;
        self.check_cell_range(first_cell, count)?;

        let num_cells = self.num_cells();
        for property in self.cell_properties.iter_mut() {
            let (offset, n) = (property.offset, property.components);
            if offset + n > values_per_cell {
                bail!(
                    "Property \"{}\" needs values {offset}..{} of a {values_per_cell}-value record",
                    property.name,
                    offset + n
                );
            }

            property.values.resize(num_cells * n, 0.0);
            for (i, record) in buffer.chunks_exact(values_per_cell).enumerate() {
                let start = (first_cell + i) * n;
                for (dst, src) in property.values[start..start + n]
                    .iter_mut()
                    .zip(&record[offset..offset + n])
                {
                    *dst = src.as_f64();
                }
            }
        }

        Ok(())
    }

    /// Start storing user ids for every cell
    pub fn enable_cell_user_ids(&mut self) {
        if self.user_ids.is_none() {
            self.user_ids = Some(vec![0; self.num_cells()]);
        }
    }

    /// Position the next user id at a local cell
    pub fn seek_cell_user_id(&mut self, cell: usize) {
        self.user_id_cursor = cell;
    }

    /// Store the user id of the next cell
    pub fn set_next_cell_user_id(&mut self, id: i64) -> Result<()> {
        let cursor = self.user_id_cursor;
        let ids = self
            .user_ids
            .as_mut()
            .ok_or_else(|| anyhow!("User ids are not enabled for part {}", self.material_id))?;

        let slot = ids.get_mut(cursor).ok_or_else(|| {
            anyhow!(
                "User id for cell {cursor} is past the end of part {}",
                self.material_id
            )
        })?;

        *slot = id;
        self.user_id_cursor += 1;
        Ok(())
    }

    /// Start tracking deleted cells, every cell begins alive
    pub fn enable_dead_cells(&mut self) {
        self.dead = Some(vec![false; self.num_cells()]);
    }

    /// Stop tracking deleted cells
    pub fn disable_dead_cells(&mut self) {
        self.dead = None;
    }

    /// Set the deleted state of consecutive cells from `first_cell`
    ///
    /// Any non-zero flag marks the cell as dead.
    pub fn set_cells_dead_state(&mut self, first_cell: usize, flags: &[u8]) -> Result<()> {
        self.check_cell_range(first_cell, flags.len())?;
        let dead = self
            .dead
            .as_mut()
            .ok_or_else(|| anyhow!("Dead cells are not enabled for part {}", self.material_id))?;

        for (cell, &flag) in dead[first_cell..].iter_mut().zip(flags) {
            *cell = flag != 0;
        }
        Ok(())
    }

    fn check_cell_range(&self, first_cell: usize, count: usize) -> Result<()> {
        if first_cell + count > self.num_cells() {
            bail!(
                "Cells {first_cell}..{} are outside part {} with {} cells",
                first_cell + count,
                self.material_id,
                self.num_cells()
            );
        }
        Ok(())
    }
}

/// Point arrays
impl Part {
    /// Prepare for a point-based read
    ///
    /// Properties are stored under `name`, geometry replaces the point
    /// coordinates. The topology must already be built so that the local
    /// points are known.
    pub fn add_point_property(
        &mut self,
        name: &str,
        components: usize,
        is_property: bool,
        is_geometry: bool,
    ) -> Result<()> {
        if !self.topology_built {
            bail!(
                "Cannot add point property \"{name}\" to part {} before its topology is built",
                self.material_id
            );
        }

        let n = self.global_points.len();
        let property = if is_property {
            self.point_properties.retain(|p| p.name != name);
            self.point_properties
                .push(PointProperty::new(name, components, n));
            Some(self.point_properties.len() - 1)
        } else {
            None
        };

        if is_geometry {
            self.point_dims = components;
            self.points = vec![0.0; components * n];
        }

        self.point_read = Some(PointRead {
            components,
            property,
            geometry: is_geometry,
        });
        Ok(())
    }

    /// Copy the values of the part's own points out of a chunk of the global
    /// point array
    ///
    /// `buffer` holds `count` points of `components` values, the first being
    /// global point `global_offset`. Points outside the part are ignored.
    pub fn read_point_based_property<T: Word>(
        &mut self,
        buffer: &[T],
        count: usize,
        components: usize,
        global_offset: usize,
    ) -> Result<()> {
        let read = self.point_read.ok_or_else(|| {
            anyhow!("No point property prepared for part {}", self.material_id)
        })?;

        if read.components != components {
            bail!(
                "Point property prepared with {} components, read with {components}",
                read.components
            );
        }

        if buffer.len() < count * components {
            bail!(
                "Chunk of {} values is too short for {count} points of {components}",
                buffer.len()
            );
        }

        // local points are sorted by global id, so the chunk maps to one run
        let first = self.global_points.partition_point(|&g| g < global_offset);
        let last = self
            .global_points
            .partition_point(|&g| g < global_offset + count);

        for local in first..last {
            let src = (self.global_points[local] - global_offset) * components;
            let src = &buffer[src..src + components];
            let dst = local * components;

            if let Some(p) = read.property {
                for (d, s) in self.point_properties[p].values[dst..dst + components]
                    .iter_mut()
                    .zip(src)
                {
                    *d = s.as_f64();
                }
            }

            if read.geometry {
                for (d, s) in self.points[dst..dst + components].iter_mut().zip(src) {
                    *d = s.as_f64();
                }
            }
        }

        Ok(())
    }

    /// Drop everything read for the current time step
    pub fn reset_time_step(&mut self) {
        self.cell_properties.clear();
        self.point_properties.clear();
        self.point_read = None;
        if let Some(dead) = self.dead.as_mut() {
            dead.iter_mut().for_each(|d| *d = false);
        }
    }
}

/// Getters
impl Part {
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based material slot in the part directory
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// User facing part id
    pub fn material_id(&self) -> i32 {
        self.material_id
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    pub fn has_cells(&self) -> bool {
        !self.kinds.is_empty()
    }

    pub fn num_cells(&self) -> usize {
        self.kinds.len()
    }

    /// Number of local points, known once the topology is built
    pub fn num_points(&self) -> usize {
        self.global_points.len()
    }

    pub fn is_topology_built(&self) -> bool {
        self.topology_built
    }

    /// Lowest global point id used by the part
    pub fn min_global_point_id(&self) -> usize {
        self.point_span.map_or(0, |(min, _)| min)
    }

    /// One past the highest global point id used by the part
    pub fn max_global_point_id(&self) -> usize {
        self.point_span.map_or(0, |(_, max)| max)
    }

    /// Global id of every local point
    pub fn global_point_ids(&self) -> &[usize] {
        &self.global_points
    }

    pub fn cell_kinds(&self) -> &[CellKind] {
        &self.kinds
    }

    /// Start of every cell in [connectivity()](Part::connectivity), plus the
    /// end of the last cell
    pub fn cell_offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn connectivity(&self) -> &[usize] {
        &self.connectivity
    }

    /// Kind and point ids of a single cell
    pub fn cell(&self, index: usize) -> Option<(CellKind, &[usize])> {
        let kind = *self.kinds.get(index)?;
        let conn = &self.connectivity[self.offsets[index]..self.offsets[index + 1]];
        Some((kind, conn))
    }

    /// Coordinates of every local point, [point_dims()](Part::point_dims) each
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn point_dims(&self) -> usize {
        self.point_dims
    }

    pub fn point(&self, index: usize) -> Option<&[f64]> {
        let start = index * self.point_dims;
        self.points.get(start..start + self.point_dims)
    }

    pub fn cell_properties(&self) -> &[CellProperty] {
        &self.cell_properties
    }

    pub fn cell_property(&self, name: &str) -> Option<&CellProperty> {
        self.cell_properties.iter().find(|p| p.name == name)
    }

    pub fn point_properties(&self) -> &[PointProperty] {
        &self.point_properties
    }

    pub fn point_property(&self, name: &str) -> Option<&PointProperty> {
        self.point_properties.iter().find(|p| p.name == name)
    }

    pub fn user_ids(&self) -> Option<&[i64]> {
        self.user_ids.as_deref()
    }

    pub fn dead_cells(&self) -> Option<&[bool]> {
        self.dead.as_deref()
    }

    pub fn is_cell_dead(&self, index: usize) -> bool {
        self.dead
            .as_ref()
            .and_then(|d| d.get(index).copied())
            .unwrap_or(false)
    }

    pub fn num_dead_cells(&self) -> usize {
        self.dead
            .as_ref()
            .map_or(0, |d| d.iter().filter(|&&dead| dead).count())
    }

    /// Axis aligned bounds `[xmin, xmax, ymin, ymax, zmin, zmax]`
    ///
    /// Unused dimensions stay at zero for 2D coordinates. Returns `None`
    /// until coordinates have been read.
    pub fn bounds(&self) -> Option<[f64; 6]> {
        if self.point_dims == 0 || self.points.is_empty() {
            return None;
        }

        let mut bounds = [0.0; 6];
        for axis in 0..self.point_dims.min(3) {
            let values = self.points.iter().skip(axis).step_by(self.point_dims);
            bounds[2 * axis] = values.clone().copied().fold(f64::INFINITY, f64::min);
            bounds[2 * axis + 1] = values.copied().fold(f64::NEG_INFINITY, f64::max);
        }
        Some(bounds)
    }

    /// Serialisable overview of the part
    pub fn summary(&self) -> PartSummary {
        PartSummary {
            slot: self.slot,
            id: self.material_id,
            name: self.name.clone(),
            cell_type: self.cell_type,
            cells: self.num_cells(),
            points: self.num_points(),
            dead_cells: self.num_dead_cells(),
            global_points: (self.min_global_point_id(), self.max_global_point_id()),
            bounds: self.bounds(),
            cell_properties: self.cell_properties.iter().map(|p| p.name.clone()).collect(),
            point_properties: self.point_properties.iter().map(|p| p.name.clone()).collect(),
        }
    }
}

impl std::fmt::Display for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = f!("Part {} \"{}\" {{\n", self.material_id, self.name);
        s += &f!("    type: {}\n", self.cell_type);
        s += &f!("    cells: {} ({} dead)\n", self.num_cells(), self.num_dead_cells());
        s += &f!(
            "    points: {} (global {}..{})\n",
            self.num_points(),
            self.min_global_point_id(),
            self.max_global_point_id()
        );
        if let Some(b) = self.bounds() {
            s += &f!(
                "    bounds: [{}, {}] [{}, {}] [{}, {}]\n",
                b[0].sci(4, 2),
                b[1].sci(4, 2),
                b[2].sci(4, 2),
                b[3].sci(4, 2),
                b[4].sci(4, 2),
                b[5].sci(4, 2)
            );
        }
        s += "}";
        write!(f, "{}", s)
    }
}

/// Overview of a part for reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSummary {
    pub slot: usize,
    pub id: i32,
    pub name: String,
    pub cell_type: CellType,
    pub cells: usize,
    pub points: usize,
    pub dead_cells: usize,
    /// Lowest and one past the highest global point id
    pub global_points: (usize, usize),
    pub bounds: Option<[f64; 6]>,
    pub cell_properties: Vec<String>,
    pub point_properties: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(ids: [usize; 4]) -> Connectivity {
        Connectivity::new(&ids).unwrap()
    }

    fn shell_part() -> Part {
        let mut part = Part::new(CellType::Shell, "plate", 0, 100, 20, WordSize::Four);
        part.allocate_cell_memory(2, 8).unwrap();
        part.add_cell(CellKind::Quad, &quad([10, 11, 15, 14])).unwrap();
        part.add_cell(CellKind::Quad, &quad([11, 12, 16, 15])).unwrap();
        part
    }

    #[test]
    fn allocation_is_exact() {
        let mut part = shell_part();
        assert!(part.add_cell(CellKind::Quad, &quad([0, 1, 2, 3])).is_err());
        assert!(part.allocate_cell_memory(4, 16).is_err());
        assert_eq!(part.min_global_point_id(), 10);
        assert_eq!(part.max_global_point_id(), 17);
    }

    #[test]
    fn topology_uses_local_ids() {
        let mut part = shell_part();
        part.build_topology().unwrap();

        assert_eq!(part.global_point_ids(), &[10, 11, 12, 14, 15, 16]);
        assert_eq!(part.cell(0), Some((CellKind::Quad, &[0, 1, 4, 3][..])));
        assert_eq!(part.cell(1), Some((CellKind::Quad, &[1, 2, 5, 4][..])));
        assert_eq!(part.cell_offsets(), &[0, 4, 8]);
    }

    #[test]
    fn rejects_points_outside_global_array() {
        let mut part = Part::new(CellType::Beam, "", 0, 1, 4, WordSize::Four);
        part.allocate_cell_memory(1, 2).unwrap();
        let conn = Connectivity::new(&[3, 4]).unwrap();
        assert!(part.add_cell(CellKind::Line, &conn).is_err());
    }

    #[test]
    fn cell_properties_are_positioned() {
        let mut part = shell_part();
        part.add_cell_property("stress", 1, 2);

        // record of 3 values for the second cell only
        part.read_cell_properties(1, &[9.0f32, 1.0, 2.0], 3).unwrap();
        let stress = part.cell_property("stress").unwrap();
        assert_eq!(stress.values, vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(stress.cell(1), Some(&[1.0, 2.0][..]));

        assert!(part.read_cell_properties(2, &[0.0f32; 3], 3).is_err());
        assert!(part.read_cell_properties(0, &[0.0f32; 4], 3).is_err());
    }

    #[test]
    fn point_property_from_chunk() {
        let mut part = shell_part();
        part.build_topology().unwrap();
        part.add_point_property("temperature", 1, true, false)
            .unwrap();

        // chunk covering global points 12..16
        let chunk = [12.0f64, 13.0, 14.0, 15.0];
        part.read_point_based_property(&chunk, 4, 1, 12).unwrap();

        let t = part.point_property("temperature").unwrap();
        assert_eq!(t.values, vec![0.0, 0.0, 12.0, 14.0, 15.0, 0.0]);
    }

    #[test]
    fn dead_cells_and_user_ids() {
        let mut part = shell_part();
        assert!(part.set_cells_dead_state(0, &[1]).is_err());

        part.enable_dead_cells();
        part.set_cells_dead_state(1, &[1]).unwrap();
        assert!(!part.is_cell_dead(0));
        assert!(part.is_cell_dead(1));
        assert_eq!(part.num_dead_cells(), 1);

        part.enable_cell_user_ids();
        part.seek_cell_user_id(1);
        part.set_next_cell_user_id(77).unwrap();
        assert!(part.set_next_cell_user_id(78).is_err());
        assert_eq!(part.user_ids(), Some(&[0, 77][..]));
    }
}
