#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative state of the collapsing road.
//!
//! The world owns the pooled cell arena, the woven safe path and the gap
//! registry. It mutates only through [`apply`] and exposes read-only views
//! through [`query`].

mod grid;
mod lifecycle;
mod registry;

use collapse_road_core::{
    derive_stream_seed, CellCoord, CellState, CollapseCause, CollapseRejection, Command, Event,
    RoadDimensions, RoadTuning, MAX_ROWS_PER_SEGMENT, RNG_STREAM_FALL_TIMING,
    RNG_STREAM_SAFE_PATH,
};
use collapse_road_system_safe_path::SafePath;
use log::{debug, trace, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    grid::{Grid, Layout},
    registry::GapRegistry,
};

/// Seed used by [`World::new`] when the host does not supply one.
pub const DEFAULT_SEED: u64 = 0x2f6c_9d3a_51e7_b804;

/// Represents the authoritative collapsing-road state.
#[derive(Debug)]
pub struct World {
    tuning: RoadTuning,
    seed: u64,
    grid: Grid,
    registry: GapRegistry,
    safe_path: SafePath,
    weaver_rng: ChaCha8Rng,
    timing_rng: ChaCha8Rng,
    tick_index: u64,
    disposed: bool,
}

impl World {
    /// Creates a road with default tuning, laid out and ready for simulation.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tuning(RoadTuning::default(), DEFAULT_SEED)
    }

    /// Creates a road from the provided tuning whose randomness derives from `seed`.
    #[must_use]
    pub fn with_tuning(tuning: RoadTuning, seed: u64) -> Self {
        let dimensions = tuning.grid.dimensions();
        let mut world = Self {
            grid: Grid::empty(dimensions),
            registry: GapRegistry::default(),
            safe_path: SafePath::default(),
            weaver_rng: ChaCha8Rng::seed_from_u64(derive_stream_seed(seed, RNG_STREAM_SAFE_PATH)),
            timing_rng: ChaCha8Rng::seed_from_u64(derive_stream_seed(
                seed,
                RNG_STREAM_FALL_TIMING,
            )),
            tuning,
            seed,
            tick_index: 0,
            disposed: false,
        };
        world.lay_out(dimensions);
        world
    }

    /// Replaces the lattice, re-weaves the safe path and clears every gap.
    fn lay_out(&mut self, dimensions: RoadDimensions) {
        self.tuning.grid.columns = dimensions.columns();
        self.tuning.grid.rows_per_segment = dimensions.rows_per_segment();
        self.tuning.grid.segment_count = dimensions.segment_count();
        self.tuning.grid.cell_size = dimensions.cell_size();

        let layout = Layout {
            start_offset: self.tuning.grid.start_offset,
            origin_height: self.tuning.grid.origin_height,
            fall_timing_jitter: self.tuning.lifecycle.fall_timing_jitter,
        };
        self.safe_path = collapse_road_system_safe_path::weave(&dimensions, &mut self.weaver_rng);
        self.grid
            .build(dimensions, layout, &self.safe_path, &mut self.timing_rng);
        self.registry.clear();
        self.disposed = false;

        debug!(
            "built road {}x{}x{} (cell size {}, length {})",
            dimensions.columns(),
            dimensions.rows_per_segment(),
            dimensions.segment_count(),
            dimensions.cell_size(),
            dimensions.total_length()
        );
    }

    fn validate_collapse(&self, coord: CellCoord) -> Result<usize, CollapseRejection> {
        let index = self
            .grid
            .index_of(coord)
            .ok_or(CollapseRejection::OutOfBounds)?;
        let cell = self
            .grid
            .cell(coord)
            .ok_or(CollapseRejection::OutOfBounds)?;
        if cell.state != CellState::Active {
            return Err(CollapseRejection::NotActive);
        }
        if cell.is_protected() {
            return Err(if cell.is_safe_path {
                CollapseRejection::SafePath
            } else {
                CollapseRejection::EdgeProtected
            });
        }
        if self.grid.holes_in_row(coord) >= self.tuning.trigger.max_holes_per_row {
            return Err(CollapseRejection::RowFull);
        }
        Ok(index)
    }

    fn collapse_cells(&mut self, cells: Vec<CellCoord>, out: &mut Vec<Event>) {
        for coord in cells {
            match self.validate_collapse(coord) {
                Ok(index) => {
                    if self.grid.begin_fall(index).is_some() {
                        out.push(Event::CellCollapsed {
                            cell: coord,
                            cause: CollapseCause::Forward,
                        });
                    }
                }
                Err(reason) => {
                    trace!("collapse of {coord:?} rejected: {reason:?}");
                    out.push(Event::CollapseRejected {
                        cell: coord,
                        reason,
                    });
                }
            }
        }
    }

    fn fill_gap_at(&mut self, x: f64, z: f64, out: &mut Vec<Event>) {
        let reach = self.grid.dimensions().cell_size();
        let reach_squared = reach * reach;

        let mut nearest: Option<(usize, f64)> = None;
        for (index, cell) in self.grid.cells().iter().enumerate() {
            if cell.state != CellState::Fallen {
                continue;
            }
            let distance = cell.snapshot().ground_distance_squared(x, z);
            if distance > reach_squared {
                continue;
            }
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((index, distance));
            }
        }

        let Some((index, _)) = nearest else {
            return;
        };
        if let Some(coord) = self.grid.restore(index) {
            let _ = self.registry.remove(coord);
            out.push(Event::GapRepaired { cell: coord });
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { dimensions } => {
            world.lay_out(dimensions);
            out_events.push(Event::RoadBuilt { dimensions });
        }
        Command::RebuildToLength { target_length } => {
            let current = world.grid.dimensions();
            let rows = RoadDimensions::rows_for_length(target_length, current.cell_size());
            if rows == MAX_ROWS_PER_SEGMENT {
                warn!("target length {target_length} clamped to {rows} rows per segment");
            }
            let dimensions = current.with_rows_per_segment(rows);
            world.lay_out(dimensions);
            out_events.push(Event::RoadBuilt { dimensions });
        }
        Command::Tick { dt, scroll_speed } => {
            world.tick_index = world.tick_index.saturating_add(1);
            if !(scroll_speed.is_finite() && scroll_speed > 0.0) {
                return;
            }
            lifecycle::advance(
                &mut world.grid,
                &mut world.registry,
                &world.tuning.lifecycle,
                dt,
                scroll_speed,
                out_events,
            );
        }
        Command::CollapseCells { cells } => world.collapse_cells(cells, out_events),
        Command::FillGapAt { x, z } => world.fill_gap_at(x, z, out_events),
        Command::Reset => {
            world.grid.reset();
            world.registry.clear();
            debug!("reset road at tick {}", world.tick_index);
            out_events.push(Event::RoadReset);
        }
        Command::Dispose => {
            world.grid.dispose();
            world.registry.clear();
            world.safe_path = SafePath::default();
            world.disposed = true;
            debug!("disposed road at tick {}", world.tick_index);
            out_events.push(Event::RoadDisposed);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use collapse_road_core::{
        BoundingBox, CellCoord, CellSnapshot, CellState, GapRecord, RoadDimensions, RoadTuning,
    };
    use collapse_road_system_safe_path::SafePath;
    use glam::DVec3;

    use super::{grid::Grid, World};

    /// Provides read-only access to the tuning the road runs with.
    #[must_use]
    pub fn tuning(world: &World) -> &RoadTuning {
        &world.tuning
    }

    /// Seed the world's random streams were derived from.
    #[must_use]
    pub fn seed(world: &World) -> u64 {
        world.seed
    }

    /// Layout of the current lattice.
    #[must_use]
    pub fn dimensions(world: &World) -> RoadDimensions {
        world.grid.dimensions()
    }

    /// Number of ticks applied since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Reports whether the lattice was released and not rebuilt since.
    #[must_use]
    pub fn is_disposed(world: &World) -> bool {
        world.disposed
    }

    /// Safe path woven for the current lattice.
    #[must_use]
    pub fn safe_path(world: &World) -> &SafePath {
        &world.safe_path
    }

    /// Exposes a read-only view of every pooled cell.
    #[must_use]
    pub fn cell_view(world: &World) -> CellView<'_> {
        CellView {
            grid: &world.grid,
            reference_z: world.tuning.lifecycle.reference_z,
        }
    }

    /// Snapshot of a single cell, if it exists.
    #[must_use]
    pub fn cell(world: &World, coord: CellCoord) -> Option<CellSnapshot> {
        world.grid.cell(coord).map(|cell| cell.snapshot())
    }

    /// Snapshots of every cell in arena order.
    #[must_use]
    pub fn cells(world: &World) -> Vec<CellSnapshot> {
        cell_view(world).iter().collect()
    }

    /// Reports whether a fallen cell lies within the gap query radius of the ground point.
    #[must_use]
    pub fn is_over_gap(world: &World, x: f64, z: f64) -> bool {
        let radius = world.tuning.query.gap_query_radius.max(0.0);
        let radius_squared = radius * radius;
        world.registry.iter().any(|gap| {
            let dx = gap.x - x;
            let dz = gap.z - z;
            dx * dx + dz * dz <= radius_squared
        })
    }

    /// Registered gaps in coordinate order.
    #[must_use]
    pub fn gaps(world: &World) -> Vec<GapRecord> {
        world.registry.iter().copied().collect()
    }

    /// One box per registered gap, reaching from below the road up to its surface.
    #[must_use]
    pub fn gap_bounding_boxes(world: &World) -> Vec<BoundingBox> {
        let half = world.grid.dimensions().cell_size() / 2.0;
        let top = world.tuning.grid.origin_height;
        let bottom = top - world.tuning.query.gap_box_depth.max(0.0);
        world
            .registry
            .iter()
            .map(|gap| {
                BoundingBox::from_corners(
                    DVec3::new(gap.x - half, bottom, gap.z - half),
                    DVec3::new(gap.x + half, top, gap.z + half),
                )
            })
            .collect()
    }

    /// Counts cells per lifecycle state.
    #[must_use]
    pub fn stats(world: &World) -> RoadStats {
        let mut stats = RoadStats {
            gaps: world.registry.len(),
            ..RoadStats::default()
        };
        for cell in world.grid.cells() {
            match cell.state {
                CellState::Active => stats.active += 1,
                CellState::Falling => stats.falling += 1,
                CellState::Fallen => stats.fallen += 1,
            }
        }
        stats
    }

    /// Per-state cell totals.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RoadStats {
        /// Standing cells.
        pub active: usize,
        /// Cells dropping under gravity.
        pub falling: usize,
        /// Hidden cells.
        pub fallen: usize,
        /// Entries in the gap registry.
        pub gaps: usize,
    }

    /// Read-only view over the pooled cells.
    #[derive(Clone, Copy, Debug)]
    pub struct CellView<'a> {
        grid: &'a Grid,
        reference_z: f64,
    }

    impl<'a> CellView<'a> {
        /// Iterator over every cell in arena order.
        pub fn iter(&self) -> impl Iterator<Item = CellSnapshot> + 'a {
            let grid: &'a Grid = self.grid;
            grid.cells().iter().map(|cell| cell.snapshot())
        }

        /// Iterator over the cells a renderer should draw.
        pub fn visible(&self) -> impl Iterator<Item = CellSnapshot> + 'a {
            self.iter().filter(|cell| cell.state.is_visible())
        }

        /// Snapshot of a single cell.
        #[must_use]
        pub fn get(&self, coord: CellCoord) -> Option<CellSnapshot> {
            self.grid.cell(coord).map(|cell| cell.snapshot())
        }

        /// Falling or fallen cells currently sharing the cell's row.
        #[must_use]
        pub fn holes_in_row(&self, coord: CellCoord) -> u32 {
            self.grid.holes_in_row(coord)
        }

        /// Layout of the lattice.
        #[must_use]
        pub fn dimensions(&self) -> RoadDimensions {
            self.grid.dimensions()
        }

        /// Player's travel-axis position.
        #[must_use]
        pub fn reference_z(&self) -> f64 {
            self.reference_z
        }

        /// Number of pooled cells.
        #[must_use]
        pub fn len(&self) -> usize {
            self.grid.len()
        }

        /// Reports whether the road holds no cells.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.grid.is_empty()
        }
    }
}
