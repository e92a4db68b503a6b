use std::{cell::RefCell, time::Duration};

use collapse_road_core::{
    CellCoord, CellState, CollapseCause, Command, Event, NoObstacles, ObstacleChecker,
    RoadTuning, TriggerTuning,
};
use collapse_road_system_collapse_trigger::CollapseTrigger;
use collapse_road_world::{self as world, query, World};

const FRAME: Duration = Duration::from_nanos(16_666_667);

fn aggressive_tuning() -> RoadTuning {
    let mut tuning = RoadTuning::default();
    tuning.trigger = TriggerTuning {
        base_rate: 6.0,
        ..TriggerTuning::default()
    };
    tuning
}

/// Runs one tick: world motion, then the trigger, then the trigger's requests.
fn step<O>(
    world: &mut World,
    trigger: &mut CollapseTrigger,
    obstacles: &O,
    speed: f64,
    log: &mut Vec<Event>,
) where
    O: ObstacleChecker + ?Sized,
{
    let mut events = Vec::new();
    world::apply(
        world,
        Command::Tick {
            dt: FRAME,
            scroll_speed: speed,
        },
        &mut events,
    );

    let mut commands = Vec::new();
    trigger.handle(
        &events,
        &query::cell_view(world),
        1.0,
        obstacles,
        &mut commands,
    );
    for command in commands {
        world::apply(world, command, &mut events);
    }
    log.extend(events);
}

fn forward_collapses(events: &[Event]) -> Vec<CellCoord> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::CellCollapsed {
                cell,
                cause: CollapseCause::Forward,
            } => Some(*cell),
            _ => None,
        })
        .collect()
}

#[test]
fn forward_collapse_opens_holes_in_trigger_zone() {
    let tuning = aggressive_tuning();
    let mut world = World::with_tuning(tuning.clone(), 42);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 42);
    let mut events = Vec::new();

    for _ in 0..120 {
        step(&mut world, &mut trigger, &NoObstacles, 55.0, &mut events);
    }

    let collapsed = forward_collapses(&events);
    assert!(!collapsed.is_empty(), "expected forward collapses");
    for coord in collapsed {
        let cell = query::cell(&world, coord).expect("collapsed cell exists");
        assert!(!cell.is_safe_path);
        assert!(!cell.is_edge_protected);
    }
}

#[test]
fn blocked_cells_are_never_forward_collapsed() {
    let tuning = aggressive_tuning();
    let mut world = World::with_tuning(tuning.clone(), 5);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 5);

    let blocked_at = RefCell::new(Vec::new());
    let obstacles = |x: f64, z: f64, _radius: f64| {
        let blocks = x < 0.0;
        if blocks {
            blocked_at.borrow_mut().push((x, z));
        }
        blocks
    };

    for _ in 0..240 {
        let mut events = Vec::new();
        blocked_at.borrow_mut().clear();
        step(&mut world, &mut trigger, &obstacles, 55.0, &mut events);

        for coord in forward_collapses(&events) {
            let cell = query::cell(&world, coord).expect("cell");
            assert!(
                !blocked_at
                    .borrow()
                    .iter()
                    .any(|(x, z)| *x == cell.position.x && *z == cell.position.z),
                "cell {coord:?} collapsed although the obstacle layer blocked it"
            );
            assert!(cell.position.x > 0.0);
        }
    }
}

#[test]
fn rows_ahead_of_the_player_respect_hole_cap() {
    let mut tuning = aggressive_tuning();
    tuning.trigger.base_rate = 40.0;
    tuning.trigger.row_spacing = 1;
    let max_holes = tuning.trigger.max_holes_per_row as usize;
    let mut world = World::with_tuning(tuning.clone(), 99);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 99);
    let dimensions = query::dimensions(&world);

    for _ in 0..400 {
        let mut events = Vec::new();
        step(&mut world, &mut trigger, &NoObstacles, 55.0, &mut events);

        let view = query::cell_view(&world);
        for segment in 0..dimensions.segment_count() {
            for row in 0..dimensions.rows_per_segment() {
                let cells: Vec<_> = (0..dimensions.columns())
                    .filter_map(|column| view.get(CellCoord::new(segment, column, row)))
                    .collect();
                if cells.iter().any(|cell| cell.position.z >= tuning.lifecycle.reference_z) {
                    continue;
                }
                let holes = cells
                    .iter()
                    .filter(|cell| cell.state.is_collapsed())
                    .count();
                assert!(
                    holes <= max_holes,
                    "segment {segment} row {row} holds {holes} holes"
                );
            }
        }
    }
}

#[test]
fn origins_respect_row_spacing() {
    let mut tuning = aggressive_tuning();
    tuning.trigger.hole_pattern_weights.pair = 0;
    tuning.trigger.hole_pattern_weights.corner = 0;
    tuning.trigger.hole_pattern_weights.block = 0;
    let spacing = tuning.trigger.row_spacing;
    let mut world = World::with_tuning(tuning.clone(), 17);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 17);
    let mut events = Vec::new();

    for _ in 0..180 {
        step(&mut world, &mut trigger, &NoObstacles, 55.0, &mut events);
    }

    let collapsed = forward_collapses(&events);
    assert!(!collapsed.is_empty());
    assert!(collapsed.iter().all(|coord| coord.row() % spacing == 0));
}

#[test]
fn paused_road_requests_nothing() {
    let tuning = aggressive_tuning();
    let mut world = World::with_tuning(tuning.clone(), 3);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 3);
    let mut events = Vec::new();

    for _ in 0..120 {
        step(&mut world, &mut trigger, &NoObstacles, 0.0, &mut events);
    }

    assert!(events.is_empty());
    assert_eq!(
        query::stats(&world).active,
        query::dimensions(&world).cell_count()
    );
}

#[test]
fn events_without_time_advancing_are_ignored() {
    let tuning = aggressive_tuning();
    let world = World::with_tuning(tuning.clone(), 8);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 8);
    let mut commands = Vec::new();

    trigger.handle(
        &[Event::RoadReset],
        &query::cell_view(&world),
        1.0,
        &NoObstacles,
        &mut commands,
    );
    assert!(commands.is_empty());
}

#[test]
fn same_seed_requests_same_collapses() {
    let run = |seed: u64| {
        let tuning = aggressive_tuning();
        let mut world = World::with_tuning(tuning.clone(), seed);
        let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), seed);
        let mut events = Vec::new();
        for _ in 0..150 {
            step(&mut world, &mut trigger, &NoObstacles, 55.0, &mut events);
        }
        forward_collapses(&events)
    };

    assert_eq!(run(21), run(21));
}

#[test]
fn safe_path_survives_forward_and_rear_collapse() {
    let mut tuning = aggressive_tuning();
    tuning.trigger.base_rate = 40.0;
    tuning.trigger.row_spacing = 1;
    tuning.trigger.max_holes_per_row = 9;
    let mut world = World::with_tuning(tuning.clone(), 64);
    let mut trigger = CollapseTrigger::new(tuning.trigger.clone(), 64);

    for _ in 0..1_500 {
        let mut events = Vec::new();
        step(&mut world, &mut trigger, &NoObstacles, 55.0, &mut events);
        assert!(query::cell_view(&world)
            .iter()
            .filter(|cell| cell.is_safe_path)
            .all(|cell| cell.state == CellState::Active));
    }
}
