#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-facing facade that drives the collapsing road.
//!
//! [`CollapsingRoad`] owns the world and the forward collapse system, routes
//! every tick through both, and answers the gap queries a player controller
//! needs between ticks.

mod config;

use std::fmt;

use collapse_road_core::{
    derive_stream_seed, BoundingBox, CellCoord, CellSnapshot, Command, Event, GapRecord,
    NoObstacles, ObstacleChecker, RoadDimensions, RoadTuning, SimulationInput,
    RNG_STREAM_FORWARD_COLLAPSE,
};
use collapse_road_system_collapse_trigger::CollapseTrigger;
use collapse_road_system_safe_path::SafePath;
use collapse_road_world::{
    self as world,
    query::{self, CellView, RoadStats},
    World,
};
use log::debug;

pub use config::{ConfigError, RoadConfig};

/// Collapsing-floor road with its collapse policy and obstacle layer.
pub struct CollapsingRoad {
    world: World,
    trigger: CollapseTrigger,
    obstacles: Box<dyn ObstacleChecker>,
    events: Vec<Event>,
    commands: Vec<Command>,
}

impl CollapsingRoad {
    /// Builds a road from the provided tuning; all randomness derives from `seed`.
    #[must_use]
    pub fn new(tuning: RoadTuning, seed: u64) -> Self {
        let trigger = CollapseTrigger::new(
            tuning.trigger.clone(),
            derive_stream_seed(seed, RNG_STREAM_FORWARD_COLLAPSE),
        );
        Self {
            world: World::with_tuning(tuning, seed),
            trigger,
            obstacles: Box::new(NoObstacles),
            events: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Validates the configuration and builds the road it describes.
    pub fn from_config(config: &RoadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.tuning(), config.seed))
    }

    /// Installs the obstacle-layer predicate consulted before every forward collapse.
    pub fn set_obstacle_checker<O>(&mut self, checker: O)
    where
        O: ObstacleChecker + 'static,
    {
        self.obstacles = Box::new(checker);
    }

    /// Advances the road by one frame. Inactive input leaves the road untouched.
    pub fn update(&mut self, input: SimulationInput) {
        self.events.clear();
        if !input.is_active {
            return;
        }

        world::apply(
            &mut self.world,
            Command::Tick {
                dt: input.dt,
                scroll_speed: input.scroll_speed,
            },
            &mut self.events,
        );

        self.commands.clear();
        self.trigger.handle(
            &self.events,
            &query::cell_view(&self.world),
            input.match_progress,
            self.obstacles.as_ref(),
            &mut self.commands,
        );
        for command in self.commands.drain(..) {
            world::apply(&mut self.world, command, &mut self.events);
        }
    }

    /// Resizes segments so one segment spans `target_length`, then rebuilds and re-weaves.
    pub fn rebuild(&mut self, target_length: f64) {
        self.submit(Command::RebuildToLength { target_length });
    }

    /// Rebuilds the road with explicit dimensions.
    pub fn configure(&mut self, dimensions: RoadDimensions) {
        self.submit(Command::ConfigureGrid { dimensions });
    }

    /// Stands every cell back up at its built position, keeping the safe path.
    pub fn reset(&mut self) {
        self.submit(Command::Reset);
    }

    /// Releases every cell; the road stays empty until the next rebuild.
    pub fn dispose(&mut self) {
        self.submit(Command::Dispose);
    }

    /// Repairs the nearest gap within one cell of the ground point.
    ///
    /// Returns `true` when a gap was repaired.
    pub fn fill_gap_at(&mut self, x: f64, z: f64) -> bool {
        self.submit(Command::FillGapAt { x, z });
        self.events
            .iter()
            .any(|event| matches!(event, Event::GapRepaired { .. }))
    }

    /// Reports whether the ground point lies over a gap.
    #[must_use]
    pub fn is_over_gap(&self, x: f64, z: f64) -> bool {
        query::is_over_gap(&self.world, x, z)
    }

    /// Boxes covering every registered gap, for collision layers.
    #[must_use]
    pub fn gap_bounding_boxes(&self) -> Vec<BoundingBox> {
        query::gap_bounding_boxes(&self.world)
    }

    /// Registered gaps in coordinate order.
    #[must_use]
    pub fn gaps(&self) -> Vec<GapRecord> {
        query::gaps(&self.world)
    }

    /// Layout of the current lattice.
    #[must_use]
    pub fn dimensions(&self) -> RoadDimensions {
        query::dimensions(&self.world)
    }

    /// Read-only view of every pooled cell.
    #[must_use]
    pub fn cells(&self) -> CellView<'_> {
        query::cell_view(&self.world)
    }

    /// Snapshot of a single cell.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<CellSnapshot> {
        query::cell(&self.world, coord)
    }

    /// Per-state cell totals.
    #[must_use]
    pub fn stats(&self) -> RoadStats {
        query::stats(&self.world)
    }

    /// Safe path woven for the current lattice.
    #[must_use]
    pub fn safe_path(&self) -> &SafePath {
        query::safe_path(&self.world)
    }

    /// Ticks processed so far, including paused ones.
    #[must_use]
    pub fn tick_index(&self) -> u64 {
        query::tick_index(&self.world)
    }

    /// Events produced by the most recent operation.
    #[must_use]
    pub fn last_events(&self) -> &[Event] {
        &self.events
    }

    /// Underlying world, for hosts that need the full query surface.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    fn submit(&mut self, command: Command) {
        self.events.clear();
        debug!("road command {command:?}");
        world::apply(&mut self.world, command, &mut self.events);
    }
}

impl Default for CollapsingRoad {
    fn default() -> Self {
        Self::new(RoadTuning::default(), world::DEFAULT_SEED)
    }
}

impl fmt::Debug for CollapsingRoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollapsingRoad")
            .field("world", &self.world)
            .field("trigger", &self.trigger)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn inactive_input_is_ignored() {
        let mut road = CollapsingRoad::default();
        let before: Vec<_> = road.cells().iter().collect();
        road.update(SimulationInput::new(Duration::from_millis(16), 55.0).with_active(false));

        assert!(road.last_events().is_empty());
        assert_eq!(road.tick_index(), 0);
        assert_eq!(road.cells().iter().collect::<Vec<_>>(), before);
    }

    #[test]
    fn rebuild_reports_road_built() {
        let mut road = CollapsingRoad::default();
        road.rebuild(450.0);
        assert_eq!(road.dimensions().rows_per_segment(), 30);
        assert!(matches!(road.last_events(), [Event::RoadBuilt { .. }]));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = RoadConfig::default();
        config.lifecycle.gravity = 0.0;
        assert!(CollapsingRoad::from_config(&config).is_err());
    }
}
