//! Per-tick cell lifecycle: scrolling, the rear wave, falling and recycling.

use std::time::Duration;

use collapse_road_core::{CellState, CollapseCause, Event, LifecycleTuning, RoadDimensions};
use log::trace;

use crate::{
    grid::{Cell, Grid},
    registry::GapRegistry,
};

/// Number of cell sizes a falling cell drops before it is hidden.
const FALL_DEPTH_IN_CELLS: f64 = 3.0;

/// Travel-axis thresholds derived once per tick.
#[derive(Clone, Copy, Debug)]
struct Thresholds {
    reference_z: f64,
    rear_collapse_z: f64,
    grace_end_z: f64,
    recycle_z: f64,
    total_length: f64,
    fall_depth: f64,
    centre: f64,
    column_stagger: f64,
    gravity: f64,
    max_fall_speed: f64,
}

impl Thresholds {
    fn new(dimensions: &RoadDimensions, tuning: &LifecycleTuning) -> Self {
        Self {
            reference_z: tuning.reference_z,
            rear_collapse_z: tuning.reference_z + tuning.rear_collapse_distance,
            grace_end_z: tuning.reference_z + tuning.grace_window,
            recycle_z: tuning.reference_z + tuning.recycle_distance,
            total_length: dimensions.total_length(),
            fall_depth: FALL_DEPTH_IN_CELLS * dimensions.cell_size(),
            centre: f64::from(dimensions.columns() - 1) / 2.0,
            column_stagger: tuning.column_stagger,
            gravity: tuning.gravity,
            max_fall_speed: tuning.max_fall_speed,
        }
    }

    /// Position past which the rear wave drops the cell. Lanes further from
    /// the centre and cells with a larger timing offset drop later.
    fn rear_threshold(&self, cell: &Cell) -> f64 {
        let lanes_from_centre = (f64::from(cell.coord.column()) - self.centre).abs();
        self.rear_collapse_z + lanes_from_centre * self.column_stagger + cell.fall_timing_offset
    }

    fn in_grace_window(&self, z: f64) -> bool {
        z > self.reference_z && z <= self.grace_end_z
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Transition {
    None,
    Recycled,
    RearCollapse,
    GapOpened { x: f64, z: f64 },
    StillFallen { x: f64, z: f64 },
}

/// Scrolls every cell by `scroll_speed * dt` and advances its state machine.
pub(crate) fn advance(
    grid: &mut Grid,
    registry: &mut GapRegistry,
    tuning: &LifecycleTuning,
    dt: Duration,
    scroll_speed: f64,
    out_events: &mut Vec<Event>,
) {
    let dt_seconds = dt.as_secs_f64();
    let distance = scroll_speed * dt_seconds;
    out_events.push(Event::TimeAdvanced { dt, distance });

    let thresholds = Thresholds::new(&grid.dimensions(), tuning);
    for index in 0..grid.len() {
        let Some(cell) = grid.cell_at_mut(index) else {
            break;
        };
        let coord = cell.coord;
        match step_cell(cell, &thresholds, distance, dt_seconds) {
            Transition::None => {}
            Transition::Recycled => {
                let _ = grid.restore(index);
                if registry.remove(coord) {
                    trace!("recycled gap {coord:?}");
                }
                out_events.push(Event::CellRecycled { cell: coord });
            }
            Transition::RearCollapse => {
                if grid.begin_fall(index).is_some() {
                    out_events.push(Event::CellCollapsed {
                        cell: coord,
                        cause: CollapseCause::RearWave,
                    });
                }
            }
            Transition::GapOpened { x, z } => {
                registry.record(coord, x, z);
                out_events.push(Event::GapOpened { cell: coord, x, z });
            }
            Transition::StillFallen { x, z } => registry.record(coord, x, z),
        }
    }

    debug_assert!(
        registry_matches_cells(grid, registry),
        "gap registry diverged from fallen cells"
    );
}

fn step_cell(
    cell: &mut Cell,
    thresholds: &Thresholds,
    distance: f64,
    dt_seconds: f64,
) -> Transition {
    cell.position.z += distance;
    if cell.position.z > thresholds.recycle_z && thresholds.total_length > 0.0 {
        let overshoot = cell.position.z - thresholds.recycle_z;
        let laps = (overshoot / thresholds.total_length).ceil().max(1.0);
        cell.position.z -= laps * thresholds.total_length;
        return Transition::Recycled;
    }

    match cell.state {
        CellState::Active => {
            if !cell.is_safe_path && cell.position.z > thresholds.rear_threshold(cell) {
                Transition::RearCollapse
            } else {
                Transition::None
            }
        }
        CellState::Falling => {
            cell.fall_velocity = (cell.fall_velocity + thresholds.gravity * dt_seconds)
                .min(thresholds.max_fall_speed);
            cell.position.y -= cell.fall_velocity * dt_seconds;

            let dropped_out = cell.position.y < cell.origin_height - thresholds.fall_depth;
            if dropped_out && !thresholds.in_grace_window(cell.position.z) {
                cell.state = CellState::Fallen;
                Transition::GapOpened {
                    x: cell.position.x,
                    z: cell.position.z,
                }
            } else {
                Transition::None
            }
        }
        CellState::Fallen => Transition::StillFallen {
            x: cell.position.x,
            z: cell.position.z,
        },
    }
}

pub(crate) fn registry_matches_cells(grid: &Grid, registry: &GapRegistry) -> bool {
    let mut fallen = 0_usize;
    for cell in grid.cells() {
        if cell.state == CellState::Fallen {
            fallen += 1;
            if !registry.contains(cell.coord) {
                return false;
            }
        }
    }
    fallen == registry.len()
}
