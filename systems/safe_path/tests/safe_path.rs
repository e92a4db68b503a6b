use collapse_road_core::{CellCoord, RoadDimensions};
use collapse_road_system_safe_path::weave;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn weave_seeded(dimensions: &RoadDimensions, seed: u64) -> collapse_road_system_safe_path::SafePath {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    weave(dimensions, &mut rng)
}

#[test]
fn every_row_of_every_segment_has_one_interior_lane() {
    let dimensions = RoadDimensions::new(10, 56, 2, 15.0);
    let path = weave_seeded(&dimensions, 42);

    assert_eq!(path.len(), dimensions.row_count());
    for segment in 0..dimensions.segment_count() {
        for row in 0..dimensions.rows_per_segment() {
            let lane = path.lane(segment, row).expect("row has a lane");
            assert!(
                dimensions.interior_columns().contains(&lane),
                "lane {lane} of segment {segment} row {row} left the interior",
            );
            let marked = (0..dimensions.columns())
                .filter(|column| path.contains(CellCoord::new(segment, *column, row)))
                .count();
            assert_eq!(marked, 1, "segment {segment} row {row} must mark one cell");
        }
    }
}

#[test]
fn walk_starts_at_centre_and_moves_at_most_one_lane_per_row() {
    for seed in 0..32 {
        let dimensions = RoadDimensions::new(10, 56, 2, 15.0);
        let path = weave_seeded(&dimensions, seed);
        let lanes = path.lanes();

        assert_eq!(lanes[0], dimensions.centre_column());
        for pair in lanes.windows(2) {
            assert!(
                pair[0].abs_diff(pair[1]) <= 1,
                "seed {seed}: lane jumped from {} to {}",
                pair[0],
                pair[1],
            );
        }
    }
}

#[test]
fn loop_seam_stays_connected() {
    for seed in 0..64 {
        let dimensions = RoadDimensions::new(12, 6, 3, 10.0);
        let path = weave_seeded(&dimensions, seed);
        let lanes = path.lanes();
        let first = lanes[0];
        let last = lanes[lanes.len() - 1];
        assert!(
            first.abs_diff(last) <= 1,
            "seed {seed}: seam connects lane {last} back to lane {first}",
        );
    }
}

#[test]
fn segment_boundaries_are_continuous() {
    let dimensions = RoadDimensions::new(10, 8, 4, 15.0);
    let path = weave_seeded(&dimensions, 7);

    for segment in 1..dimensions.segment_count() {
        let previous = path.segment_lanes(segment - 1);
        let current = path.segment_lanes(segment);
        assert_eq!(previous.len(), 8);
        assert_eq!(current.len(), 8);
        assert!(previous[previous.len() - 1].abs_diff(current[0]) <= 1);
    }
}

#[test]
fn narrowest_road_keeps_the_single_interior_lane() {
    let dimensions = RoadDimensions::new(3, 20, 2, 15.0);
    let path = weave_seeded(&dimensions, 99);
    assert!(path.lanes().iter().all(|lane| *lane == 1));
}

#[test]
fn same_seed_weaves_same_path() {
    let dimensions = RoadDimensions::new(10, 56, 2, 15.0);
    assert_eq!(weave_seeded(&dimensions, 42), weave_seeded(&dimensions, 42));
}

#[test]
fn marked_cells_enumerate_in_lattice_order() {
    let dimensions = RoadDimensions::new(6, 4, 2, 1.0);
    let path = weave_seeded(&dimensions, 3);
    let cells: Vec<CellCoord> = path.cells().collect();

    assert_eq!(cells.len(), 8);
    assert!(cells.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(cells.iter().all(|cell| path.contains(*cell)));
    assert_eq!(cells[4].segment(), 1);
    assert_eq!(cells[4].row(), 0);
}
