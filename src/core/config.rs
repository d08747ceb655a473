//! Engine behavior tuning.

use crate::core::constants;
use crate::core::geometry::Size;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Tunable knobs for a player instance.
///
/// The defaults reproduce stock behavior; embedders with unusual memory or
/// input constraints can override individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Hard ceiling on the committed zoom scale.
    pub max_scale_factor: f64,
    /// Whether adjacent off-screen tiles are fetched speculatively.
    pub prefetch_enabled: bool,
    /// Fling velocity half-life in seconds.
    pub fling_half_life: f64,
    /// Minimum fling speed (px/s) before the animation stops.
    pub fling_min_velocity: f64,
    /// Fixed tile size for every frame in the tree, overriding the
    /// per-viewport default.
    pub tile_size_override: Option<Size>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_scale_factor: constants::MAX_SCALE_FACTOR,
            prefetch_enabled: true,
            fling_half_life: constants::DEFAULT_FLING_HALF_LIFE,
            fling_min_velocity: constants::DEFAULT_FLING_MIN_VELOCITY,
            tile_size_override: None,
        }
    }
}

impl PlayerConfig {
    /// Parses a config from a JSON document, filling omitted fields with
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayerConfig::default();
        assert_eq!(config.max_scale_factor, constants::MAX_SCALE_FACTOR);
        assert!(config.prefetch_enabled);
        assert!(config.tile_size_override.is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config = PlayerConfig::from_json(r#"{"prefetch_enabled": false}"#).unwrap();
        assert!(!config.prefetch_enabled);
        assert_eq!(config.max_scale_factor, constants::MAX_SCALE_FACTOR);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(PlayerConfig::from_json("not json").is_err());
    }
}
