#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Safe-path weaver that keeps one uninterrupted standing lane through the road.
//!
//! The weaver runs a bounded random walk across every row of every segment.
//! Each step moves at most one lane sideways and never enters an edge column,
//! so the marked cells always form a connected lane. Marked cells are excluded
//! from every collapse source, which is what keeps the road solvable.

use collapse_road_core::{CellCoord, RoadDimensions};
use log::warn;
use rand::Rng;

/// Lane chosen for every row of every segment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SafePath {
    columns: u32,
    rows_per_segment: u32,
    lanes: Vec<u32>,
}

impl SafePath {
    /// Lane marked in the provided segment row.
    #[must_use]
    pub fn lane(&self, segment: u32, row: u32) -> Option<u32> {
        if row >= self.rows_per_segment {
            return None;
        }
        let index = u64::from(segment) * u64::from(self.rows_per_segment) + u64::from(row);
        let index = usize::try_from(index).ok()?;
        self.lanes.get(index).copied()
    }

    /// Lanes of a single segment in row order; empty when the segment does not exist.
    #[must_use]
    pub fn segment_lanes(&self, segment: u32) -> &[u32] {
        let (Ok(rows), Ok(segment)) = (
            usize::try_from(self.rows_per_segment),
            usize::try_from(segment),
        ) else {
            return &[];
        };
        let Some(start) = segment.checked_mul(rows) else {
            return &[];
        };
        self.lanes.get(start..start.saturating_add(rows)).unwrap_or(&[])
    }

    /// Lanes of the whole road, segment by segment.
    #[must_use]
    pub fn lanes(&self) -> &[u32] {
        &self.lanes
    }

    /// Reports whether the cell was marked by the weaver.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns
            && self.lane(cell.segment(), cell.row()) == Some(cell.column())
    }

    /// Iterator over every marked cell in lattice order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let rows = self.rows_per_segment.max(1);
        (0_u32..)
            .zip(&self.lanes)
            .map(move |(index, lane)| CellCoord::new(index / rows, *lane, index % rows))
    }

    /// Number of marked cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Reports whether nothing has been woven yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Weaves a fresh safe path through a lattice of the provided dimensions.
///
/// The walk starts at the centre column and continues across segment
/// boundaries. Near the end of the last segment it is steered back toward the
/// centre so that the seam where the road loops onto itself stays connected.
pub fn weave<R>(dimensions: &RoadDimensions, rng: &mut R) -> SafePath
where
    R: Rng + ?Sized,
{
    let interior = dimensions.interior_columns();
    let (low, high) = (*interior.start(), *interior.end());
    let centre = dimensions.centre_column();
    let total_rows = dimensions.row_count();

    let mut lanes = Vec::with_capacity(total_rows);
    let mut lane = centre;
    for index in 0..total_rows {
        lane = checked_lane(lane, low, high);
        lanes.push(lane);

        let rows_after_next = total_rows.saturating_sub(index + 2);
        let delta = rng.gen_range(-1_i64..=1);
        lane = next_lane(lane, delta, low, high, centre, rows_after_next);
    }

    SafePath {
        columns: dimensions.columns(),
        rows_per_segment: dimensions.rows_per_segment(),
        lanes,
    }
}

/// Applies a random step, clamps it into the interior, and steers toward the
/// centre once the remaining rows no longer allow a free step.
///
/// `rows_after_next` counts the rows that follow the lane being chosen; the
/// lane must end within one column of the centre after the last row.
fn next_lane(
    lane: u32,
    delta: i64,
    low: u32,
    high: u32,
    centre: u32,
    rows_after_next: usize,
) -> u32 {
    let stepped = (i64::from(lane) + delta).clamp(i64::from(low), i64::from(high));
    let stepped = u32::try_from(stepped).unwrap_or(centre);

    let allowed = u64::try_from(rows_after_next)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    if u64::from(stepped.abs_diff(centre)) <= allowed {
        return stepped;
    }

    if lane > centre {
        lane - 1
    } else if lane < centre {
        lane + 1
    } else {
        lane
    }
}

fn checked_lane(lane: u32, low: u32, high: u32) -> u32 {
    debug_assert!(
        (low..=high).contains(&lane),
        "safe path lane {lane} escaped the interior {low}..={high}"
    );
    if (low..=high).contains(&lane) {
        lane
    } else {
        warn!("safe path lane {lane} outside interior {low}..={high}; clamping");
        lane.clamp(low, high)
    }
}
