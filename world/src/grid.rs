//! Pooled cell lattice and the builder that lays it out.

use collapse_road_core::{CellCoord, CellSnapshot, CellState, RoadDimensions};
use collapse_road_system_safe_path::SafePath;
use glam::DVec3;
use rand::Rng;

/// Single pooled road cell. Cells are recycled in place and never freed
/// individually.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    pub(crate) coord: CellCoord,
    pub(crate) state: CellState,
    pub(crate) position: DVec3,
    pub(crate) layout_z: f64,
    pub(crate) origin_height: f64,
    pub(crate) fall_velocity: f64,
    pub(crate) is_safe_path: bool,
    pub(crate) is_edge_protected: bool,
    pub(crate) fall_timing_offset: f64,
}

impl Cell {
    pub(crate) fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            coord: self.coord,
            state: self.state,
            position: self.position,
            origin_height: self.origin_height,
            fall_velocity: self.fall_velocity,
            is_safe_path: self.is_safe_path,
            is_edge_protected: self.is_edge_protected,
        }
    }

    /// Puts the cell back on its feet at the origin height.
    pub(crate) fn stand(&mut self) {
        self.state = CellState::Active;
        self.position.y = self.origin_height;
        self.fall_velocity = 0.0;
    }

    pub(crate) fn is_protected(&self) -> bool {
        self.is_safe_path || self.is_edge_protected
    }
}

/// Placement parameters shared by every cell of a build.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Layout {
    pub(crate) start_offset: f64,
    pub(crate) origin_height: f64,
    pub(crate) fall_timing_jitter: f64,
}

/// Dense arena of cells indexed by `(segment, row, column)` plus per-row hole counters.
#[derive(Debug)]
pub(crate) struct Grid {
    dimensions: RoadDimensions,
    cells: Vec<Cell>,
    row_holes: Vec<u32>,
}

impl Grid {
    pub(crate) fn empty(dimensions: RoadDimensions) -> Self {
        Self {
            dimensions,
            cells: Vec::new(),
            row_holes: Vec::new(),
        }
    }

    /// Discards the previous lattice and lays out a fresh one.
    pub(crate) fn build<R>(
        &mut self,
        dimensions: RoadDimensions,
        layout: Layout,
        safe_path: &SafePath,
        rng: &mut R,
    ) where
        R: Rng + ?Sized,
    {
        self.dispose();
        self.dimensions = dimensions;
        self.cells.reserve_exact(dimensions.cell_count());
        self.row_holes.resize(dimensions.row_count(), 0);

        let jitter = layout.fall_timing_jitter;
        for index in 0..dimensions.cell_count() {
            let Some(coord) = dimensions.coord_at(index) else {
                break;
            };
            let (x, z) = layout_position(&dimensions, layout.start_offset, coord);
            let fall_timing_offset = if jitter.is_finite() && jitter > 0.0 {
                rng.gen_range(0.0..jitter)
            } else {
                0.0
            };
            self.cells.push(Cell {
                coord,
                state: CellState::Active,
                position: DVec3::new(x, layout.origin_height, z),
                layout_z: z,
                origin_height: layout.origin_height,
                fall_velocity: 0.0,
                is_safe_path: safe_path.contains(coord),
                is_edge_protected: dimensions.is_edge_column(coord.column()),
                fall_timing_offset,
            });
        }
    }

    /// Releases every cell and counter while remembering the dimensions.
    pub(crate) fn dispose(&mut self) {
        self.cells = Vec::new();
        self.row_holes = Vec::new();
    }

    pub(crate) fn dimensions(&self) -> RoadDimensions {
        self.dimensions
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.dimensions
            .index_of(coord)
            .and_then(|index| self.cells.get(index))
    }

    pub(crate) fn cell_at_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub(crate) fn index_of(&self, coord: CellCoord) -> Option<usize> {
        self.dimensions
            .index_of(coord)
            .filter(|index| *index < self.cells.len())
    }

    /// Number of falling or fallen cells sharing the cell's `(segment, row)`.
    pub(crate) fn holes_in_row(&self, coord: CellCoord) -> u32 {
        self.dimensions
            .row_index_of(coord)
            .and_then(|index| self.row_holes.get(index).copied())
            .unwrap_or(0)
    }

    /// Moves a standing cell into the falling state and counts the new hole.
    pub(crate) fn begin_fall(&mut self, index: usize) -> Option<CellCoord> {
        let cell = self.cells.get_mut(index)?;
        if cell.state != CellState::Active {
            return None;
        }
        cell.state = CellState::Falling;
        cell.fall_velocity = 0.0;
        let coord = cell.coord;
        self.adjust_holes(coord, true);
        Some(coord)
    }

    /// Stands a collapsed cell back up and releases its hole.
    pub(crate) fn restore(&mut self, index: usize) -> Option<CellCoord> {
        let cell = self.cells.get_mut(index)?;
        let was_collapsed = cell.state.is_collapsed();
        cell.stand();
        let coord = cell.coord;
        if was_collapsed {
            self.adjust_holes(coord, false);
        }
        Some(coord)
    }

    /// Stands every cell at its built position and clears all counters.
    pub(crate) fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.stand();
            cell.position.z = cell.layout_z;
        }
        self.row_holes.fill(0);
    }

    fn adjust_holes(&mut self, coord: CellCoord, opened: bool) {
        let Some(slot) = self
            .dimensions
            .row_index_of(coord)
            .and_then(|index| self.row_holes.get_mut(index))
        else {
            return;
        };
        if opened {
            *slot = slot.saturating_add(1);
        } else {
            *slot = slot.saturating_sub(1);
        }
    }
}

/// World-space centre of a cell in its built position.
///
/// Column 0 and the last column touch the outer edges of the road; row 0 of
/// segment 0 sits at `start_offset` and every later row sits one cell further
/// ahead, at smaller `z`.
pub(crate) fn layout_position(
    dimensions: &RoadDimensions,
    start_offset: f64,
    coord: CellCoord,
) -> (f64, f64) {
    let cell_size = dimensions.cell_size();
    let x =
        -dimensions.total_width() / 2.0 + cell_size / 2.0 + f64::from(coord.column()) * cell_size;
    let z = start_offset
        - (f64::from(coord.segment()) * dimensions.segment_length()
            + f64::from(coord.row()) * cell_size);
    (x, z)
}
