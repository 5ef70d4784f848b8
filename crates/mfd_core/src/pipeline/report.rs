//! Per-hour audit data
//!
//! Recoverable per-hour conditions (MissingJoinMatch, DegenerateGroupSum,
//! KeyCastFailure) are recorded here instead of being raised as errors.

use serde::{Deserialize, Serialize};

use super::join::{JoinStage, UnmatchedUnit};
use super::zone::ZoneAggregation;
use crate::model::{CellKey, Hour, ZoneKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourReport {
    pub hour: Hour,
    pub units_total: usize,
    pub units_joined: usize,
    /// MissingJoinMatch records, in unit order
    pub unmatched: Vec<UnmatchedUnit>,
    /// Cells whose presence sum was zero
    pub degenerate_cells: Vec<CellKey>,
    /// Zone keys that stayed in raw form
    pub cast_failures: Vec<ZoneKey>,
    /// Unit rows carrying one of those keys
    pub cast_failure_rows: usize,
    /// Cells with a positive share that no joined unit carries
    pub uncovered_cells: Vec<CellKey>,
    /// Sum of RelativeShare over all cells
    pub share_total: f64,
    /// Share of the cells that reach at least one zone
    pub retained_share: f64,
    /// Sum over all emitted zones
    pub zone_total: f64,
}

/// Auditable per-hour counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub missing_profile: usize,
    pub missing_share: usize,
    pub degenerate_groups: usize,
    /// Distinct zone keys kept as text
    pub key_cast_failures: usize,
    /// Unit rows flagged with such a key
    pub key_cast_rows: usize,
    pub uncovered_cells: usize,
}

impl IssueCounts {
    pub fn missing_join_matches(&self) -> usize {
        self.missing_profile + self.missing_share
    }

    pub fn is_clean(&self) -> bool {
        *self == IssueCounts::default()
    }
}

impl HourReport {
    /// Report of an hour with no units and no shares
    pub fn empty(hour: Hour) -> Self {
        Self {
            hour,
            units_total: 0,
            units_joined: 0,
            unmatched: Vec::new(),
            degenerate_cells: Vec::new(),
            cast_failures: Vec::new(),
            cast_failure_rows: 0,
            uncovered_cells: Vec::new(),
            share_total: 0.0,
            retained_share: 0.0,
            zone_total: 0.0,
        }
    }

    pub fn issue_counts(&self) -> IssueCounts {
        let at = |stage| self.unmatched.iter().filter(|u| u.stage == stage).count();
        IssueCounts {
            missing_profile: at(JoinStage::TimeUseProfile),
            missing_share: at(JoinStage::CoverageShare),
            degenerate_groups: self.degenerate_cells.len(),
            key_cast_failures: self.cast_failures.len(),
            key_cast_rows: self.cast_failure_rows,
            uncovered_cells: self.uncovered_cells.len(),
        }
    }

    /// Share lost between the cells and the zones
    pub fn lost_share(&self) -> f64 {
        self.share_total - self.zone_total
    }
}

/// Result of one full pass for one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourResult {
    pub aggregation: ZoneAggregation,
    pub report: HourReport,
}

impl HourResult {
    pub fn hour(&self) -> Hour {
        self.report.hour
    }
}
