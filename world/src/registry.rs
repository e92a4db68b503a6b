//! Registry of gaps left behind by fallen cells.

use std::collections::BTreeMap;

use collapse_road_core::{CellCoord, GapRecord};

/// Last known footprint of every fallen cell, ordered by lattice position.
#[derive(Debug, Default)]
pub(crate) struct GapRegistry {
    entries: BTreeMap<CellCoord, GapRecord>,
}

impl GapRegistry {
    /// Registers the gap, or refreshes its position when already present.
    pub(crate) fn record(&mut self, cell: CellCoord, x: f64, z: f64) {
        let _ = self.entries.insert(cell, GapRecord { cell, x, z });
    }

    pub(crate) fn remove(&mut self, cell: CellCoord) -> bool {
        self.entries.remove(&cell).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn contains(&self, cell: CellCoord) -> bool {
        self.entries.contains_key(&cell)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &GapRecord> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_refreshes_existing_entries() {
        let mut registry = GapRegistry::default();
        let cell = CellCoord::new(0, 3, 4);
        registry.record(cell, 1.0, 2.0);
        registry.record(cell, 1.0, 9.0);

        assert_eq!(registry.len(), 1);
        let record = registry.iter().next().expect("entry");
        assert_eq!(record.z, 9.0);
        assert!(registry.remove(cell));
        assert!(!registry.remove(cell));
        assert!(!registry.contains(cell));
    }

    #[test]
    fn entries_iterate_in_lattice_order() {
        let mut registry = GapRegistry::default();
        registry.record(CellCoord::new(1, 0, 0), 0.0, 0.0);
        registry.record(CellCoord::new(0, 5, 3), 0.0, 0.0);
        registry.record(CellCoord::new(0, 2, 3), 0.0, 0.0);

        let order: Vec<CellCoord> = registry.iter().map(|record| record.cell).collect();
        assert_eq!(
            order,
            vec![
                CellCoord::new(0, 2, 3),
                CellCoord::new(0, 5, 3),
                CellCoord::new(1, 0, 0),
            ]
        );
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
