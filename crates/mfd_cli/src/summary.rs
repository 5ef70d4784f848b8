//! Run summary JSON

use anyhow::{Context, Result};
use mfd_core::pipeline::HourOutcome;
use mfd_core::{Hour, HourRange, IssueCounts, RunSummary};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::writer::WrittenHour;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourEntry {
    pub hour: Hour,
    pub file: PathBuf,
    /// SHA256 of the written file
    pub checksum: String,
    pub zones_written: usize,
    pub zero_filled: usize,
    pub unplaced_zones: usize,
    pub units_total: usize,
    pub units_joined: usize,
    pub share_total: f64,
    pub retained_share: f64,
    pub zone_total: f64,
    pub issues: IssueCounts,
}

impl HourEntry {
    fn from_outcome(outcome: &HourOutcome<WrittenHour>) -> Self {
        let report = &outcome.report;
        let written = &outcome.receipt;
        Self {
            hour: report.hour,
            file: written.path.clone(),
            checksum: written.checksum.clone(),
            zones_written: written.zones_written,
            zero_filled: written.zero_filled,
            unplaced_zones: written.unplaced_zones.len(),
            units_total: report.units_total,
            units_joined: report.units_joined,
            share_total: report.share_total,
            retained_share: report.retained_share,
            zone_total: report.zone_total,
            issues: report.issue_counts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// 생성 시각 (RFC3339 형식)
    pub created_at: String,
    pub hours: HourRange,
    /// Input cache used instead of the CSV files
    pub cache: Option<PathBuf>,
    pub cancelled: bool,
    pub skipped_hours: Vec<Hour>,
    /// Cells whose unit RFAs do not sum to 1
    pub rfa_deviations: usize,
    pub entries: Vec<HourEntry>,
}

impl RunMetadata {
    pub fn from_summary(
        hours: HourRange,
        cache: Option<&Path>,
        summary: &RunSummary<WrittenHour>,
    ) -> Self {
        Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            hours,
            cache: cache.map(Path::to_path_buf),
            cancelled: summary.cancelled(),
            skipped_hours: summary.skipped.clone(),
            rfa_deviations: summary.rfa_deviations.len(),
            entries: summary.hours.iter().map(HourEntry::from_outcome).collect(),
        }
    }

    /// Issue counts summed over every written hour
    pub fn total_issues(&self) -> IssueCounts {
        self.entries
            .iter()
            .fold(IssueCounts::default(), |mut acc, entry| {
                acc.missing_profile += entry.issues.missing_profile;
                acc.missing_share += entry.issues.missing_share;
                acc.degenerate_groups += entry.issues.degenerate_groups;
                acc.key_cast_failures += entry.issues.key_cast_failures;
                acc.key_cast_rows += entry.issues.key_cast_rows;
                acc.uncovered_cells += entry.issues.uncovered_cells;
                acc
            })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, json)
            .with_context(|| format!("Failed to write run summary: {}", path.display()))?;
        Ok(())
    }
}
