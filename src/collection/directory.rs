//! Sparse owning store of parts, indexed by material slot

// internal modules
use crate::family::WordSize;
use crate::meta::CellType;
use crate::part::Part;

// external crates
use anyhow::{bail, Result};
use log::trace;

/// Every part of a file family, one slot per material
///
/// Slots are zero-based material indices. A slot stays empty when the part
/// is disabled, or once the part has been pruned for having no cells.
#[derive(Debug, Default)]
pub struct PartDirectory {
    slots: Vec<Option<Part>>,
}

impl PartDirectory {
    /// Directory of `num_parts` empty slots
    pub fn new(num_parts: usize) -> Self {
        Self {
            slots: (0..num_parts).map(|_| None).collect(),
        }
    }

    /// Number of slots, occupied or not
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Create the part for a slot
    ///
    /// Each slot may only be constructed once.
    pub fn construct(
        &mut self,
        index: usize,
        cell_type: CellType,
        name: &str,
        material_id: i32,
        num_global_nodes: usize,
        word_size: WordSize,
    ) -> Result<()> {
        let num_parts = self.len();
        match self.slots.get_mut(index) {
            None => bail!("Part slot {index} is outside the {num_parts} available"),
            Some(Some(existing)) => bail!(
                "Part slot {index} already holds part {}",
                existing.material_id()
            ),
            Some(slot) => {
                *slot = Some(Part::new(
                    cell_type,
                    name,
                    index,
                    material_id,
                    num_global_nodes,
                    word_size,
                ));
                Ok(())
            }
        }
    }

    /// Is there a part in the slot
    pub fn exists(&self, index: usize) -> bool {
        index < self.slots.len() && self.slots[index].is_some()
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Part> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Empty a slot, returning the part it held
    pub fn remove(&mut self, index: usize) -> Option<Part> {
        trace!("Removing part slot {index}");
        self.slots.get_mut(index)?.take()
    }

    /// Every part in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Part> {
        self.slots.iter_mut().flatten()
    }

    /// Every part of one cell type, in slot order
    ///
    /// Walks are independent of each other, any number may be in progress.
    pub fn parts_of_type(&self, cell_type: CellType) -> impl Iterator<Item = &Part> {
        self.iter().filter(move |p| p.cell_type() == cell_type)
    }

    pub fn parts_of_type_mut(&mut self, cell_type: CellType) -> impl Iterator<Item = &mut Part> {
        self.iter_mut().filter(move |p| p.cell_type() == cell_type)
    }

    /// Slots currently holding a part
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|_| i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> PartDirectory {
        let mut dir = PartDirectory::new(4);
        dir.construct(0, CellType::Shell, "a", 10, 8, WordSize::Four)
            .unwrap();
        dir.construct(2, CellType::Solid, "b", 20, 8, WordSize::Four)
            .unwrap();
        dir.construct(3, CellType::Shell, "c", 30, 8, WordSize::Four)
            .unwrap();
        dir
    }

    #[test]
    fn exists_checks_bounds() {
        let dir = directory();
        assert!(dir.exists(0));
        assert!(!dir.exists(1));
        assert!(dir.exists(3));
        assert!(!dir.exists(4));
        assert!(dir.get(4).is_none());
    }

    #[test]
    fn construct_twice_fails() {
        let mut dir = directory();
        assert!(dir
            .construct(0, CellType::Beam, "again", 11, 8, WordSize::Four)
            .is_err());
        assert!(dir
            .construct(4, CellType::Beam, "outside", 11, 8, WordSize::Four)
            .is_err());
    }

    #[test]
    fn independent_walks_by_type() {
        let dir = directory();
        let mut first = dir.parts_of_type(CellType::Shell);
        let mut second = dir.parts_of_type(CellType::Shell);

        assert_eq!(first.next().map(|p| p.material_id()), Some(10));
        assert_eq!(second.next().map(|p| p.material_id()), Some(10));
        assert_eq!(first.next().map(|p| p.material_id()), Some(30));
        assert!(first.next().is_none());
        assert_eq!(second.next().map(|p| p.material_id()), Some(30));

        let solids: Vec<i32> = dir
            .parts_of_type(CellType::Solid)
            .map(|p| p.material_id())
            .collect();
        assert_eq!(solids, vec![20]);
        assert_eq!(dir.parts_of_type(CellType::Beam).count(), 0);
    }

    #[test]
    fn remove_empties_slot() {
        let mut dir = directory();
        assert_eq!(dir.remove(2).map(|p| p.material_id()), Some(20));
        assert!(!dir.exists(2));
        assert_eq!(dir.occupied().collect::<Vec<_>>(), vec![0, 3]);
    }
}
