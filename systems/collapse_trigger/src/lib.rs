#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that opens holes in the road ahead of the player.
//!
//! Every tick the system rolls a difficulty-scaled collapse chance for each
//! standing cell inside the trigger zone. A successful roll becomes a
//! collapse origin only when the obstacle layer, edge and safe-path
//! protection, row spacing and the per-row hole cap all allow it; the origin
//! then grows into one of the weighted hole patterns.

use std::collections::{BTreeMap, BTreeSet};

use collapse_road_core::{
    CellCoord, CellSnapshot, CellState, Command, Event, ObstacleChecker, TriggerTuning,
};
use collapse_road_world::query::CellView;
use log::trace;
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng, SeedableRng,
};
use rand_chacha::ChaCha8Rng;

/// Shape carved around a collapse origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HolePattern {
    Single,
    Pair,
    Corner,
    Block,
}

impl HolePattern {
    const ALL: [Self; 4] = [Self::Single, Self::Pair, Self::Corner, Self::Block];

    /// Column and row offsets of the extra cells, relative to the origin.
    fn offsets<R: Rng + ?Sized>(self, rng: &mut R) -> Vec<(i64, i64)> {
        match self {
            Self::Single => Vec::new(),
            Self::Pair => vec![pair_offset(rng)],
            Self::Corner => vec![pair_offset(rng), (1, 1)],
            Self::Block => vec![(1, 0), (0, 1), (1, 1)],
        }
    }
}

/// Neighbour one row further along the segment or one lane over, with equal odds.
fn pair_offset<R: Rng + ?Sized>(rng: &mut R) -> (i64, i64) {
    if rng.gen_bool(0.5) {
        (0, 1)
    } else {
        (1, 0)
    }
}

/// Forward collapse system with a private random stream and per-tick scratch state.
#[derive(Debug)]
pub struct CollapseTrigger {
    tuning: TriggerTuning,
    rng: ChaCha8Rng,
    patterns: Option<WeightedIndex<u32>>,
    claimed: BTreeSet<CellCoord>,
    row_claims: BTreeMap<usize, u32>,
}

impl CollapseTrigger {
    /// Creates a trigger whose rolls are driven by the provided seed.
    #[must_use]
    pub fn new(tuning: TriggerTuning, seed: u64) -> Self {
        let patterns = WeightedIndex::new(tuning.hole_pattern_weights.as_array()).ok();
        Self {
            tuning,
            rng: ChaCha8Rng::seed_from_u64(seed),
            patterns,
            claimed: BTreeSet::new(),
            row_claims: BTreeMap::new(),
        }
    }

    /// Tuning the trigger evaluates with.
    #[must_use]
    pub fn tuning(&self) -> &TriggerTuning {
        &self.tuning
    }

    /// Consumes world events and appends collapse requests for the cells that
    /// should start falling this tick.
    ///
    /// Nothing happens unless the events report that time advanced. The
    /// obstacle predicate is consulted before any other rule and always wins.
    pub fn handle<O>(
        &mut self,
        events: &[Event],
        cells: &CellView<'_>,
        match_progress: f64,
        obstacles: &O,
        out: &mut Vec<Command>,
    ) where
        O: ObstacleChecker + ?Sized,
    {
        let elapsed: f64 = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt, .. } => Some(dt.as_secs_f64()),
                _ => None,
            })
            .sum();
        let advanced = events
            .iter()
            .any(|event| matches!(event, Event::TimeAdvanced { .. }));
        if !advanced {
            return;
        }

        let probability = self.tuning.collapse_probability(match_progress, elapsed);
        if probability <= 0.0 {
            return;
        }

        self.claimed.clear();
        self.row_claims.clear();

        let reference_z = cells.reference_z();
        let zone_start = reference_z - self.tuning.trigger_zone_far;
        let zone_end = reference_z - self.tuning.trigger_zone_near;

        for cell in cells.iter() {
            if cell.state != CellState::Active
                || cell.position.z < zone_start
                || cell.position.z > zone_end
            {
                continue;
            }
            if !self.rng.gen_bool(probability) {
                continue;
            }
            if !self.admits_origin(&cell, cells, obstacles) {
                continue;
            }

            let pattern = self.draw_pattern();
            self.claim(cells, cell.coord);
            let mut batch = vec![cell.coord];
            for (columns, rows) in pattern.offsets(&mut self.rng) {
                let Some(neighbour) = cell.coord.offset(columns, rows) else {
                    continue;
                };
                if self.admits_neighbour(neighbour, cells, obstacles) {
                    self.claim(cells, neighbour);
                    batch.push(neighbour);
                }
            }

            trace!(
                "collapse origin {:?} with {:?} pattern, {} cell(s)",
                cell.coord,
                pattern,
                batch.len()
            );
            out.push(Command::CollapseCells { cells: batch });
        }
    }

    fn draw_pattern(&mut self) -> HolePattern {
        self.patterns
            .as_ref()
            .and_then(|weights| HolePattern::ALL.get(weights.sample(&mut self.rng)).copied())
            .unwrap_or(HolePattern::Single)
    }

    fn admits_origin<O>(&self, cell: &CellSnapshot, cells: &CellView<'_>, obstacles: &O) -> bool
    where
        O: ObstacleChecker + ?Sized,
    {
        if obstacles.blocks_collapse_at(
            cell.position.x,
            cell.position.z,
            self.tuning.obstacle_clearance,
        ) {
            return false;
        }
        if cell.is_safe_path || cell.is_edge_protected || self.claimed.contains(&cell.coord) {
            return false;
        }
        if cell.coord.row() % self.tuning.effective_row_spacing() != 0 {
            return false;
        }
        self.row_has_room(cells, cell.coord)
    }

    fn admits_neighbour<O>(&self, coord: CellCoord, cells: &CellView<'_>, obstacles: &O) -> bool
    where
        O: ObstacleChecker + ?Sized,
    {
        let dimensions = cells.dimensions();
        if !dimensions.contains(coord) || dimensions.is_edge_column(coord.column()) {
            return false;
        }
        let Some(cell) = cells.get(coord) else {
            return false;
        };
        if obstacles.blocks_collapse_at(
            cell.position.x,
            cell.position.z,
            self.tuning.obstacle_clearance,
        ) {
            return false;
        }
        if cell.state != CellState::Active
            || cell.is_safe_path
            || cell.is_edge_protected
            || self.claimed.contains(&coord)
        {
            return false;
        }
        self.row_has_room(cells, coord)
    }

    fn row_has_room(&self, cells: &CellView<'_>, coord: CellCoord) -> bool {
        let claimed = cells
            .dimensions()
            .row_index_of(coord)
            .and_then(|row| self.row_claims.get(&row).copied())
            .unwrap_or(0);
        cells.holes_in_row(coord).saturating_add(claimed) < self.tuning.max_holes_per_row
    }

    fn claim(&mut self, cells: &CellView<'_>, coord: CellCoord) {
        let _ = self.claimed.insert(coord);
        if let Some(row) = cells.dimensions().row_index_of(coord) {
            let count = self.row_claims.entry(row).or_insert(0);
            *count = count.saturating_add(1);
        }
    }
}
