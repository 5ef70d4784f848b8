//! # Run Configuration
//!
//! Every path, column name and calibration constant of a run lives here and is
//! handed to the orchestrator at construction. Nothing in the pipeline reads a
//! column name from anywhere else.
//!
//! ## 사용법
//! ```rust,no_run
//! use mfd_core::config::MfdConfig;
//! use std::path::Path;
//!
//! let config = MfdConfig::from_yaml_file(Path::new("mfd.yaml")).unwrap();
//! assert!(config.hours.len() <= 24);
//! ```

mod floor_area_config;
mod input_config;
mod output_config;

pub use floor_area_config::{FloorAreaColumns, FloorAreaConfig};
pub use input_config::{CountsInput, InputConfig, SurfaceInput, TimeUseInput, ZonesInput};
pub use output_config::{OutputConfig, UnmatchedZonePolicy};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use validator::{Validate, ValidationError};

use crate::error::ConfigError;
use crate::model::{Hour, HourRange};

/// Placeholder replaced by the hour number in column and file templates
pub const HOUR_PLACEHOLDER: &str = "{hour}";

/// Which seasonal factor feeds the presence estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalFactorSource {
    /// Coefficient of the matched time-use profile row
    #[default]
    Profile,
    /// Coefficient carried by the physical surface unit itself
    Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MfdConfig {
    /// Inclusive hour window processed by the run
    pub hours: HourRange,
    #[validate]
    pub inputs: InputConfig,
    #[validate]
    pub output: OutputConfig,
    pub seasonal_factor_source: SeasonalFactorSource,
    /// Run hours as parallel tasks
    pub parallel: bool,
    #[validate]
    pub floor_area: FloorAreaConfig,
    pub csv_delimiter: char,
}

impl Default for MfdConfig {
    fn default() -> Self {
        Self {
            hours: HourRange::full_day(),
            inputs: InputConfig::default(),
            output: OutputConfig::default(),
            seasonal_factor_source: SeasonalFactorSource::Profile,
            parallel: true,
            floor_area: FloorAreaConfig::default(),
            csv_delimiter: ',',
        }
    }
}

impl MfdConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: MfdConfig = serde_yaml::from_str(text)?;
        config.validate_all()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Derived field checks plus the cross-field rules.
    pub fn validate_all(&self) -> Result<(), ConfigError> {
        self.validate()?;

        if HourRange::new(self.hours.start, self.hours.end).is_none() {
            return Err(ConfigError::Invalid(format!(
                "hours.start ({}) is after hours.end ({})",
                self.hours.start, self.hours.end
            )));
        }
        if !self.csv_delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "csv_delimiter must be a single ASCII character, got '{}'",
                self.csv_delimiter
            )));
        }
        self.floor_area.check_values().map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// Same config with a narrower hour window
    pub fn with_hours(mut self, hours: HourRange) -> Self {
        self.hours = hours;
        self
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.csv_delimiter as u8
    }
}

/// Expand a `{hour}` template for one hour.
pub fn hour_column(template: &str, hour: Hour) -> String {
    template.replace(HOUR_PLACEHOLDER, &hour.to_string())
}

fn validate_hour_template(template: &str) -> Result<(), ValidationError> {
    if template.contains(HOUR_PLACEHOLDER) {
        Ok(())
    } else {
        Err(ValidationError::new("missing_hour_placeholder"))
    }
}

fn validate_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        Err(ValidationError::new("empty_path"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = MfdConfig::default();
        assert!(cfg.validate_all().is_ok());
        assert_eq!(cfg.hours.len(), 24);
        assert_eq!(cfg.inputs.surface.cell_key_column, "SITEID");
        assert_eq!(cfg.inputs.counts.hour_column_template, "H{hour}m");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
hours:
  start: 7
  end: 9
output:
  dir: out
  unmatched_zones: zero_fill
seasonal_factor_source: unit
"#;
        let cfg = MfdConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.hours.len(), 3);
        assert_eq!(cfg.output.unmatched_zones, UnmatchedZonePolicy::ZeroFill);
        assert_eq!(cfg.seasonal_factor_source, SeasonalFactorSource::Unit);
        assert_eq!(cfg.output.file_template, "ZROP_results_H{hour}.csv");
        assert_eq!(cfg.inputs.time_use.spatial_unit_column, "Spatial_unit");
    }

    #[test]
    fn test_demo_config_loads() {
        let cfg = MfdConfig::from_yaml_str(include_str!("../../../../demos/mfd.yaml")).unwrap();
        assert_eq!(cfg.hours, HourRange::full_day());
        assert_eq!(cfg.inputs.zones.geometry_column.as_deref(), Some("geometry"));
        assert_eq!(
            cfg.output.summary_path(),
            Some(Path::new("results/run_summary.json"))
        );
        assert!((cfg.floor_area.coefficient("service") - 0.91).abs() < 1e-12);
    }

    #[test]
    fn test_reversed_hours_rejected() {
        let yaml = "hours:\n  start: 10\n  end: 3\n";
        assert!(matches!(
            MfdConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_hour_out_of_day_rejected() {
        let yaml = "hours:\n  start: 0\n  end: 24\n";
        assert!(matches!(
            MfdConfig::from_yaml_str(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut cfg = MfdConfig::default();
        cfg.output.file_template = "result.csv".to_string();
        assert!(matches!(
            cfg.validate_all(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_column_rejected() {
        let mut cfg = MfdConfig::default();
        cfg.inputs.surface.rfa_column = String::new();
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn test_hour_column_expansion() {
        let h = Hour::new(9).unwrap();
        assert_eq!(hour_column("H{hour}t", h), "H9t");
        assert_eq!(hour_column("RMP H{hour}m", h), "RMP H9m");
    }
}
