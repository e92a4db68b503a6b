//! Gameplay tuning knobs for the road lattice, its lifecycle and collapse policy.

use serde::{Deserialize, Serialize};

use crate::RoadDimensions;

/// Aggregated tuning knobs controlling every adjustable aspect of the road.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadTuning {
    /// Lattice layout and placement.
    pub grid: GridTuning,
    /// Motion, gravity, rear wave and recycling distances.
    pub lifecycle: LifecycleTuning,
    /// Forward probabilistic collapse and hole patterns.
    pub trigger: TriggerTuning,
    /// Gap query radii and exported box depth.
    pub query: QueryTuning,
}

/// Layout of the lattice in cells and its placement along the travel axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridTuning {
    /// Number of lanes, including the two protected edge columns.
    pub columns: u32,
    /// Rows per segment; replaced by `rebuild` when the road follows an external length.
    pub rows_per_segment: u32,
    /// Segments concatenated end to end; they recycle to scroll forever.
    pub segment_count: u32,
    /// Side length of a square cell in world units.
    pub cell_size: f64,
    /// Travel-axis position of row 0 of segment 0; later rows sit at smaller `z`.
    pub start_offset: f64,
    /// Resting height every standing cell returns to.
    pub origin_height: f64,
}

impl GridTuning {
    /// Lattice dimensions described by this tuning, with degenerate values clamped.
    #[must_use]
    pub fn dimensions(&self) -> RoadDimensions {
        RoadDimensions::new(
            self.columns,
            self.rows_per_segment,
            self.segment_count,
            self.cell_size,
        )
    }
}

impl Default for GridTuning {
    fn default() -> Self {
        Self {
            columns: 10,
            rows_per_segment: 56,
            segment_count: 2,
            cell_size: 15.0,
            start_offset: 150.0,
            origin_height: 0.0,
        }
    }
}

/// Motion and fall parameters applied every tick.
///
/// Distances are measured along the travel axis relative to `reference_z`;
/// positive values lie behind the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleTuning {
    /// Player's fixed travel-axis position.
    pub reference_z: f64,
    /// Downward acceleration applied to falling cells.
    pub gravity: f64,
    /// Terminal fall speed; lower values keep the rear wave on screen longer.
    pub max_fall_speed: f64,
    /// Distance behind the player at which the centre lanes start dropping.
    pub rear_collapse_distance: f64,
    /// Extra delay distance per column away from the centre, shaping the falling wave.
    pub column_stagger: f64,
    /// Upper bound of the random per-cell delay distance added to the rear wave.
    pub fall_timing_jitter: f64,
    /// Band behind the player in which falling cells stay visible and unregistered.
    pub grace_window: f64,
    /// Distance behind the player past which cells wrap to the front of the road.
    pub recycle_distance: f64,
}

impl Default for LifecycleTuning {
    fn default() -> Self {
        Self {
            reference_z: 0.0,
            gravity: 90.0,
            max_fall_speed: 140.0,
            rear_collapse_distance: 10.0,
            column_stagger: 4.0,
            fall_timing_jitter: 6.0,
            grace_window: 45.0,
            recycle_distance: 150.0,
        }
    }
}

/// Relative likelihood of each hole shape carved from a collapse origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolePatternWeights {
    /// Weight of a lone cell.
    pub single: u32,
    /// Weight of the origin plus one neighbour along the row or column.
    pub pair: u32,
    /// Weight of the pair plus the diagonally opposite cell.
    pub corner: u32,
    /// Weight of a complete 2x2 block.
    pub block: u32,
}

impl HolePatternWeights {
    /// Weights in pattern order: single, pair, corner, block.
    #[must_use]
    pub const fn as_array(&self) -> [u32; 4] {
        [self.single, self.pair, self.corner, self.block]
    }

    /// Sum of all weights; zero disables multi-cell patterns entirely.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.as_array().iter().map(|weight| u64::from(*weight)).sum()
    }
}

impl Default for HolePatternWeights {
    fn default() -> Self {
        Self {
            single: 40,
            pair: 30,
            corner: 20,
            block: 10,
        }
    }
}

/// Forward probabilistic collapse parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerTuning {
    /// Distance ahead of the player where the trigger zone begins.
    pub trigger_zone_near: f64,
    /// Distance ahead of the player where the trigger zone ends.
    pub trigger_zone_far: f64,
    /// Collapse chance per standing cell per second at the start of a match.
    pub base_rate: f64,
    /// Multiplier reached at full match progress; the ramp never exceeds it.
    pub max_difficulty_multiplier: f64,
    /// Shape of the difficulty ramp; values above one back-load the increase.
    pub difficulty_ramp_exponent: f64,
    /// Only rows whose index is a multiple of this may host a collapse origin.
    pub row_spacing: u32,
    /// Maximum number of falling or fallen cells in one `(segment, row)`.
    pub max_holes_per_row: u32,
    /// Likelihood of each hole shape.
    pub hole_pattern_weights: HolePatternWeights,
    /// Radius handed to the obstacle predicate around every candidate cell.
    pub obstacle_clearance: f64,
}

impl TriggerTuning {
    /// Multiplier applied to `base_rate` for the provided match progress.
    ///
    /// Progress is clamped to `[0, 1]`, non-finite progress counts as zero, and
    /// the result grows monotonically from one to `max_difficulty_multiplier`.
    #[must_use]
    pub fn difficulty_multiplier(&self, match_progress: f64) -> f64 {
        let progress = if match_progress.is_finite() {
            match_progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ceiling = self.max_difficulty_multiplier.max(1.0);
        let exponent = if self.difficulty_ramp_exponent.is_finite()
            && self.difficulty_ramp_exponent > 0.0
        {
            self.difficulty_ramp_exponent
        } else {
            1.0
        };
        1.0 + (ceiling - 1.0) * progress.powf(exponent)
    }

    /// Probability that a single standing cell collapses during a tick of `dt_seconds`.
    #[must_use]
    pub fn collapse_probability(&self, match_progress: f64, dt_seconds: f64) -> f64 {
        let probability = self.base_rate * self.difficulty_multiplier(match_progress) * dt_seconds;
        if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Row spacing with zero treated as "every row".
    #[must_use]
    pub fn effective_row_spacing(&self) -> u32 {
        self.row_spacing.max(1)
    }
}

impl Default for TriggerTuning {
    fn default() -> Self {
        Self {
            trigger_zone_near: 90.0,
            trigger_zone_far: 480.0,
            base_rate: 0.05,
            max_difficulty_multiplier: 3.0,
            difficulty_ramp_exponent: 1.0,
            row_spacing: 3,
            max_holes_per_row: 2,
            hole_pattern_weights: HolePatternWeights::default(),
            obstacle_clearance: 15.0,
        }
    }
}

/// Gap query parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryTuning {
    /// Radius around a ground point searched by `is_over_gap`.
    pub gap_query_radius: f64,
    /// Depth below the origin height that exported gap boxes reach.
    pub gap_box_depth: f64,
}

impl Default for QueryTuning {
    fn default() -> Self {
        Self {
            gap_query_radius: 6.0,
            gap_box_depth: 100.0,
        }
    }
}
