// internal modules
use crate::collection::{CellWindows, PartCollection, CELLS_PER_CHUNK, POINTS_PER_CHUNK};
use crate::family::{chunk_sizes, Family, WordKind, WordSize};
use crate::meta::{CellType, Metadata};
use crate::part::PointRole;
use crate::readers::records::{decode_record, record_words};

// external crates
use anyhow::{anyhow, bail, Result};
use kdam::{Bar, BarBuilder, BarExt};
use log::{debug, trace, warn};

/// Order of the connectivity sections in a d3plot geometry block
const SECTION_ORDER: [CellType; 5] = [
    CellType::Solid,
    CellType::ThickShell,
    CellType::Beam,
    CellType::Shell,
    CellType::Particle,
];

/// Builds the [PartCollection] of a d3plot file family
///
/// The geometry section is read twice. The first pass registers the owner of
/// every cell so that each part can be allocated exactly once, the second
/// pass inserts the cells themselves. The point coordinates are then streamed
/// into the parts that use them.
///
/// Example:
/// ```ignore
///     let meta = d3parts::read_metadata("d3plot.json")?;
///     let mut family = Family::open("path/to/d3plot")?;
///     let mut reader = D3plotReader::new();
///     reader.set_disabled_parts(&[3, 4]);
///     let collection = reader.parse(&mut family, &meta)?;
/// ```
#[derive(Debug)]
pub struct D3plotReader {
    /// Disable progress bar?
    disable_progress: bool,
    /// 1-based material indices that are never constructed
    disabled_parts: Vec<usize>,
    /// Cells of interest, everything if not set
    windows: Option<CellWindows>,
    /// Read the coordinate section once the topology is known
    read_coordinates: bool,
    points_per_chunk: usize,
    cells_per_chunk: usize,
}

impl Default for D3plotReader {
    fn default() -> Self {
        Self {
            disable_progress: false,
            disabled_parts: Vec::new(),
            windows: None,
            read_coordinates: true,
            points_per_chunk: POINTS_PER_CHUNK,
            cells_per_chunk: CELLS_PER_CHUNK,
        }
    }
}

/// Which of the two connectivity passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Register,
    Insert,
}

/// High level methods
impl D3plotReader {
    /// Just calls Default::default(), nothing special to be initialised
    pub fn new() -> Self {
        Default::default()
    }

    /// Read every enabled part of the family described by `meta`
    pub fn parse(&self, family: &mut Family, meta: &Metadata) -> Result<PartCollection> {
        if family.word_size() != meta.word_size {
            bail!(
                "Metadata expects {} words but the family has {} words",
                meta.word_size,
                family.word_size()
            );
        }

        let meta = self.apply_disabled_parts(meta);
        let windows = self
            .windows
            .unwrap_or_else(|| CellWindows::full(&meta.cells));

        let mut collection = PartCollection::with_windows(&meta, windows)?;
        collection.set_points_per_chunk(self.points_per_chunk);
        collection.set_cells_per_chunk(self.cells_per_chunk);

        let sections = Self::connectivity_sections(&meta);

        debug!("Registering cells");
        self.connectivity_pass(family, &meta, &sections, &mut collection, Pass::Register)?;
        collection.allocate_parts()?;

        debug!("Inserting cells");
        collection.init_cell_insertion();
        self.connectivity_pass(family, &meta, &sections, &mut collection, Pass::Insert)?;
        collection.finalize_topology()?;

        match meta.sections.coordinates {
            Some(offset) if self.read_coordinates => {
                debug!("Reading coordinates from word {offset}");
                family.seek_word(offset)?;
                collection.read_point_property(
                    family,
                    meta.num_nodes,
                    meta.num_dims,
                    "coordinates",
                    PointRole::GEOMETRY,
                )?;
            }
            Some(_) => debug!("Coordinates not requested"),
            None => warn!("No coordinate section given, parts will have no geometry"),
        }

        Ok(collection)
    }

    /// Never construct the parts of these 1-based material indices
    pub fn set_disabled_parts(&mut self, materials: &[usize]) {
        self.disabled_parts = materials.to_vec();
    }

    /// Only read the given windows of each cell type
    pub fn set_windows(&mut self, windows: CellWindows) {
        self.windows = Some(windows);
    }

    /// Skip the coordinate section
    pub fn skip_coordinates(&mut self) {
        self.read_coordinates = false;
    }

    pub fn set_points_per_chunk(&mut self, points: usize) {
        self.points_per_chunk = points;
    }

    pub fn set_cells_per_chunk(&mut self, cells: usize) {
        self.cells_per_chunk = cells;
    }

    /// Do not print the kdam progress indicators
    pub fn disable_progress(&mut self) {
        debug!("Progress bar disabled");
        self.disable_progress = true;
    }
}

/// Connectivity passes
impl D3plotReader {
    /// Metadata with the explicitly disabled parts switched off
    fn apply_disabled_parts(&self, meta: &Metadata) -> Metadata {
        let mut meta = meta.clone();
        for part in meta
            .parts
            .iter_mut()
            .filter(|p| self.disabled_parts.contains(&p.material))
        {
            trace!("Disabling part {} \"{}\"", part.id, part.name);
            part.enabled = false;
        }
        meta
    }

    /// Offsets of every connectivity section present, in file order
    fn connectivity_sections(meta: &Metadata) -> Vec<(CellType, u64)> {
        SECTION_ORDER
            .iter()
            .filter_map(|&cell_type| {
                let offset = meta.sections.connectivity(cell_type);
                if offset.is_none() && meta.cells.get(cell_type) > 0 {
                    warn!(
                        "{} {cell_type} cells declared without a connectivity section, ignoring",
                        meta.cells.get(cell_type)
                    );
                }
                offset.map(|o| (cell_type, o))
            })
            .collect()
    }

    fn connectivity_pass(
        &self,
        family: &mut Family,
        meta: &Metadata,
        sections: &[(CellType, u64)],
        collection: &mut PartCollection,
        pass: Pass,
    ) -> Result<()> {
        let total: usize = sections.iter().map(|(t, _)| meta.cells.get(*t)).sum();
        let mut progress_bar = self.init_progress_bar(total, pass)?;

        if !self.disable_progress {
            progress_bar.refresh()?;
        };

        for &(cell_type, offset) in sections {
            let num_cells = meta.cells.get(cell_type);
            trace!("{pass:?} {num_cells} {cell_type} cells from word {offset}");
            family.seek_word(offset)?;
            self.read_records(family, collection, cell_type, num_cells, pass, &mut progress_bar)?;
        }

        // need an extra line for clean spacing if the progress bar is printed
        if !self.disable_progress {
            eprintln!()
        };

        family.clear_buffer();
        Ok(())
    }

    fn read_records(
        &self,
        family: &mut Family,
        collection: &mut PartCollection,
        cell_type: CellType,
        num_cells: usize,
        pass: Pass,
        progress_bar: &mut Bar,
    ) -> Result<()> {
        let words = record_words(cell_type)
            .ok_or_else(|| anyhow!("No connectivity records for {cell_type} cells"))?;

        for n in chunk_sizes(num_cells, self.cells_per_chunk) {
            family.buffer_chunk(WordKind::Int, n * words)?;
            let buffer: Vec<i64> = match family.word_size() {
                WordSize::Four => family
                    .buffer_as::<i32>()?
                    .into_iter()
                    .map(i64::from)
                    .collect(),
                WordSize::Eight => family.buffer_as::<i64>()?,
            };

            for record in buffer.chunks_exact(words) {
                let cell = decode_record(cell_type, record)?;
                match pass {
                    Pass::Register => {
                        collection.register_cell(cell_type, cell.material, cell.kind.num_points())?
                    }
                    Pass::Insert => collection.insert_cell(cell_type, cell.kind, &cell.conn)?,
                }
            }

            progress_bar.update(n)?;
        }

        Ok(())
    }

    fn init_progress_bar(&self, total: usize, pass: Pass) -> Result<Bar> {
        let desc = match pass {
            Pass::Register => "Registering",
            Pass::Insert => "Inserting",
        };

        BarBuilder::default()
            .total(total)
            .desc(desc)
            .delay(0.0)
            .unit(" cells")
            .unit_scale(true)
            .disable(self.disable_progress)
            .build()
            .map_err(|e| anyhow!("Could not create progress bar: {e}"))
    }
}
