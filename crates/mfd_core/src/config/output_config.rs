//! Per-hour output naming and unmatched-zone policy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use super::{hour_column, validate_hour_template, validate_path};
use crate::model::Hour;

/// How zones without any contributing unit are finalized by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedZonePolicy {
    /// Inner join against the target zone table
    #[default]
    Omit,
    /// Every target zone is written, 0.0 where nothing was aggregated
    ZeroFill,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    #[validate(custom = "validate_path")]
    pub dir: PathBuf,
    /// File name per hour, e.g. `ZROP_results_H{hour}.csv`
    #[validate(custom = "validate_hour_template")]
    pub file_template: String,
    #[validate(length(min = 1))]
    pub zone_key_column: String,
    #[validate(length(min = 1))]
    pub value_column_template: String,
    pub unmatched_zones: UnmatchedZonePolicy,
    /// Optional JSON run summary
    pub summary: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            file_template: "ZROP_results_H{hour}.csv".to_string(),
            zone_key_column: "YKR_ID".to_string(),
            value_column_template: "ZROP H{hour}".to_string(),
            unmatched_zones: UnmatchedZonePolicy::Omit,
            summary: None,
        }
    }
}

impl OutputConfig {
    pub fn file_for(&self, hour: Hour) -> PathBuf {
        self.dir.join(hour_column(&self.file_template, hour))
    }

    pub fn value_column(&self, hour: Hour) -> String {
        hour_column(&self.value_column_template, hour)
    }

    pub fn summary_path(&self) -> Option<&Path> {
        self.summary.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_naming_per_hour() {
        let cfg = OutputConfig::default();
        let h = Hour::new(14).unwrap();
        assert_eq!(
            cfg.file_for(h),
            PathBuf::from("results").join("ZROP_results_H14.csv")
        );
        assert_eq!(cfg.value_column(h), "ZROP H14");
    }

    #[test]
    fn test_policy_yaml_names() {
        let policy: UnmatchedZonePolicy = serde_yaml::from_str("zero_fill").unwrap();
        assert_eq!(policy, UnmatchedZonePolicy::ZeroFill);
        let policy: UnmatchedZonePolicy = serde_yaml::from_str("omit").unwrap();
        assert_eq!(policy, UnmatchedZonePolicy::Omit);
    }
}
