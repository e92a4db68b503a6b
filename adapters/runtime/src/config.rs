//! TOML configuration for a collapsing road.

use std::{
    fs,
    path::{Path, PathBuf},
};

use collapse_road_core::{
    GridTuning, LifecycleTuning, QueryTuning, RoadTuning, TriggerTuning, MAX_ROWS_PER_SEGMENT,
    MIN_COLUMNS,
};
use collapse_road_world::DEFAULT_SEED;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a road configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read road config at {}", .path.display())]
    Io {
        /// Location that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The contents are not valid TOML for a road configuration.
    #[error("failed to parse road config toml")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but describes an unplayable road.
    #[error("invalid road config: `{field}` {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        field: &'static str,
        /// What is wrong with the value.
        reason: &'static str,
    },
}

/// Complete configuration of a road: the seed plus every tuning table.
///
/// Every table is optional in the TOML source; missing keys keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadConfig {
    /// Root seed every random stream is derived from.
    pub seed: u64,
    /// Lattice layout.
    pub grid: GridTuning,
    /// Motion, rear wave and recycling.
    pub lifecycle: LifecycleTuning,
    /// Forward collapse policy.
    pub trigger: TriggerTuning,
    /// Gap query parameters.
    pub query: QueryTuning,
}

impl Default for RoadConfig {
    fn default() -> Self {
        Self::from_tuning(RoadTuning::default(), DEFAULT_SEED)
    }
}

impl RoadConfig {
    /// Wraps existing tuning with a seed.
    #[must_use]
    pub fn from_tuning(tuning: RoadTuning, seed: u64) -> Self {
        let RoadTuning {
            grid,
            lifecycle,
            trigger,
            query,
        } = tuning;
        Self {
            seed,
            grid,
            lifecycle,
            trigger,
            query,
        }
    }

    /// Reads and validates the configuration stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Tuning tables without the seed.
    #[must_use]
    pub fn tuning(&self) -> RoadTuning {
        RoadTuning {
            grid: self.grid.clone(),
            lifecycle: self.lifecycle.clone(),
            trigger: self.trigger.clone(),
            query: self.query.clone(),
        }
    }

    /// Rejects values that would make the road unsolvable or the simulation meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = &self.grid;
        ensure(grid.columns >= MIN_COLUMNS, "grid.columns", "must be at least 3")?;
        ensure(grid.rows_per_segment > 0, "grid.rows_per_segment", "must be positive")?;
        ensure(
            grid.rows_per_segment <= MAX_ROWS_PER_SEGMENT,
            "grid.rows_per_segment",
            "must not exceed 16384",
        )?;
        ensure(grid.segment_count > 0, "grid.segment_count", "must be positive")?;
        ensure(
            positive(grid.cell_size),
            "grid.cell_size",
            "must be positive and finite",
        )?;
        ensure(
            grid.start_offset.is_finite() && grid.origin_height.is_finite(),
            "grid.start_offset",
            "must be finite",
        )?;

        let lifecycle = &self.lifecycle;
        ensure(
            positive(lifecycle.gravity),
            "lifecycle.gravity",
            "must be positive and finite",
        )?;
        ensure(
            positive(lifecycle.max_fall_speed),
            "lifecycle.max_fall_speed",
            "must be positive and finite",
        )?;
        ensure(
            lifecycle.recycle_distance.is_finite()
                && lifecycle.recycle_distance > lifecycle.rear_collapse_distance,
            "lifecycle.recycle_distance",
            "must lie beyond the rear collapse distance",
        )?;

        let trigger = &self.trigger;
        ensure(
            trigger.hole_pattern_weights.total() > 0,
            "trigger.hole_pattern_weights",
            "must not all be zero",
        )?;
        ensure(
            trigger.trigger_zone_near.is_finite()
                && trigger.trigger_zone_far.is_finite()
                && trigger.trigger_zone_near <= trigger.trigger_zone_far,
            "trigger.trigger_zone_near",
            "must not lie beyond trigger_zone_far",
        )?;

        if trigger.row_spacing == 0 {
            warn!("trigger.row_spacing is 0; every row may host a collapse origin");
        }
        if lifecycle.fall_timing_jitter <= 0.0 {
            warn!("lifecycle.fall_timing_jitter is not positive; the rear wave will be uniform");
        }
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn ensure(condition: bool, field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason })
    }
}
