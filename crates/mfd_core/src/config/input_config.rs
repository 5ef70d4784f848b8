//! Input table locations and column names

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use super::{validate_hour_template, validate_path};

/// Time-use profile table
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TimeUseInput {
    #[validate(custom = "validate_path")]
    pub path: PathBuf,
    #[validate(length(min = 1))]
    pub spatial_unit_column: String,
    #[validate(length(min = 1))]
    pub activity_function_column: String,
    #[validate(length(min = 1))]
    pub seasonal_factor_column: String,
    /// Activity fraction column per hour, e.g. `H{hour}t` → `H9t`
    #[validate(custom = "validate_hour_template")]
    pub hour_column_template: String,
}

impl Default for TimeUseInput {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/time_use.csv"),
            spatial_unit_column: "Spatial_unit".to_string(),
            activity_function_column: "Activity_function_type".to_string(),
            seasonal_factor_column: "Seasonal_factor".to_string(),
            hour_column_template: "H{hour}t".to_string(),
        }
    }
}

/// Disaggregated physical surface layer (attribute table only)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SurfaceInput {
    #[validate(custom = "validate_path")]
    pub path: PathBuf,
    #[validate(length(min = 1))]
    pub cell_key_column: String,
    #[validate(length(min = 1))]
    pub zone_key_column: String,
    #[validate(length(min = 1))]
    pub spatial_unit_column: String,
    #[validate(length(min = 1))]
    pub activity_function_column: String,
    #[validate(length(min = 1))]
    pub seasonal_factor_column: String,
    #[validate(length(min = 1))]
    pub rfa_column: String,
}

impl Default for SurfaceInput {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/physical_surface.csv"),
            cell_key_column: "SITEID".to_string(),
            zone_key_column: "YKR_ID".to_string(),
            spatial_unit_column: "SPUT".to_string(),
            activity_function_column: "AFT".to_string(),
            seasonal_factor_column: "SF".to_string(),
            rfa_column: "RFA".to_string(),
        }
    }
}

/// Hourly counts per coverage cell
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CountsInput {
    #[validate(custom = "validate_path")]
    pub path: PathBuf,
    #[validate(length(min = 1))]
    pub cell_key_column: String,
    /// Raw count column per hour, e.g. `H{hour}m` → `H9m`
    #[validate(custom = "validate_hour_template")]
    pub hour_column_template: String,
}

impl Default for CountsInput {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/hourly_counts.csv"),
            cell_key_column: "SITEID".to_string(),
            hour_column_template: "H{hour}m".to_string(),
        }
    }
}

/// Target zone table
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ZonesInput {
    #[validate(custom = "validate_path")]
    pub path: PathBuf,
    #[validate(length(min = 1))]
    pub zone_key_column: String,
    /// Geometry column copied verbatim into the output (WKT or similar)
    pub geometry_column: Option<String>,
}

impl Default for ZonesInput {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/target_zones.csv"),
            zone_key_column: "YKR_ID".to_string(),
            geometry_column: Some("geometry".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InputConfig {
    #[validate]
    pub time_use: TimeUseInput,
    #[validate]
    pub surface: SurfaceInput,
    #[validate]
    pub counts: CountsInput,
    #[validate]
    pub zones: ZonesInput,
}
