//! Floor area calibration
//!
//! Domain calibration constants for estimating building floor area when the
//! register value is missing or the matched register footprint is too small.
//! The defaults are the values the Helsinki dataset was prepared with; they are
//! not claimed to be optimal anywhere else.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FloorAreaConfig {
    /// Matched register area below `threshold × footprint` triggers the
    /// deficit correction (기본: 0.8)
    #[validate(range(min = 0.0, max = 1.0))]
    pub deficit_threshold: f64,
    /// Net-to-gross floor area coefficient per activity function type
    pub coefficients: BTreeMap<String, f64>,
    /// Coefficient for activity types not listed above (기본: 0.98)
    #[validate(range(min = 0.0))]
    pub default_coefficient: f64,
    /// Mean floor count per activity function type, used when a building has
    /// no floor count of its own
    pub mean_floor_counts: BTreeMap<String, f64>,
    /// (기본: 1.0)
    #[validate(range(min = 0.0))]
    pub default_mean_floor_count: f64,
    /// Spatial unit label of open land parts; their floor area is their area
    #[validate(length(min = 1))]
    pub land_label: String,
    #[validate]
    pub columns: FloorAreaColumns,
}

impl Default for FloorAreaConfig {
    fn default() -> Self {
        Self {
            deficit_threshold: 0.8,
            coefficients: BTreeMap::from([
                ("residential".to_string(), 0.95),
                ("service".to_string(), 0.91),
            ]),
            default_coefficient: 0.98,
            mean_floor_counts: BTreeMap::from([
                ("residential".to_string(), 2.0),
                ("service".to_string(), 2.0),
            ]),
            default_mean_floor_count: 1.0,
            land_label: "land".to_string(),
            columns: FloorAreaColumns::default(),
        }
    }
}

impl FloorAreaConfig {
    pub fn coefficient(&self, activity_function: &str) -> f64 {
        self.coefficients
            .get(activity_function)
            .copied()
            .unwrap_or(self.default_coefficient)
    }

    pub fn mean_floor_count(&self, activity_function: &str) -> f64 {
        self.mean_floor_counts
            .get(activity_function)
            .copied()
            .unwrap_or(self.default_mean_floor_count)
    }

    /// Hand-checked constraints the derive cannot express
    pub fn check_values(&self) -> Result<(), String> {
        for (name, map) in [
            ("coefficients", &self.coefficients),
            ("mean_floor_counts", &self.mean_floor_counts),
        ] {
            if let Some((key, value)) = map.iter().find(|(_, v)| !(v.is_finite() && **v >= 0.0)) {
                return Err(format!(
                    "floor_area.{}.{} must be a non-negative number, got {}",
                    name, key, value
                ));
            }
        }
        Ok(())
    }
}

/// Extra columns of the floor-area parts table. Cell key, zone key and the
/// type columns are shared with the surface table.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FloorAreaColumns {
    #[validate(length(min = 1))]
    pub footprint_area_column: String,
    #[validate(length(min = 1))]
    pub floor_area_column: String,
    #[validate(length(min = 1))]
    pub floor_count_column: String,
    #[validate(length(min = 1))]
    pub matched_area_column: String,
    /// Written by `mfd floor-area` next to the RFA column
    #[validate(length(min = 1))]
    pub estimated_floor_area_column: String,
}

impl Default for FloorAreaColumns {
    fn default() -> Self {
        Self {
            footprint_area_column: "AREA".to_string(),
            floor_area_column: "FLAREA".to_string(),
            floor_count_column: "FLCOUNT".to_string(),
            matched_area_column: "MATCHED_AREA".to_string(),
            estimated_floor_area_column: "FA".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_calibration() {
        let cfg = FloorAreaConfig::default();
        assert!((cfg.deficit_threshold - 0.8).abs() < 1e-12);
        assert!((cfg.coefficient("residential") - 0.95).abs() < 1e-12);
        assert!((cfg.coefficient("service") - 0.91).abs() < 1e-12);
        assert!((cfg.coefficient("work") - 0.98).abs() < 1e-12);
        assert!((cfg.mean_floor_count("service") - 2.0).abs() < 1e-12);
        assert!((cfg.mean_floor_count("transport") - 1.0).abs() < 1e-12);
        assert!(cfg.check_values().is_ok());
    }

    #[test]
    fn test_negative_coefficient_rejected() {
        let mut cfg = FloorAreaConfig::default();
        cfg.coefficients.insert("work".to_string(), -1.0);
        assert!(cfg.check_values().is_err());
    }
}
