//! # Hourly interpolation pipeline
//!
//! ```text
//! Idle → LoadInputs → { per hour: Normalize → Join → EstimatePresence
//!                        → EstimatePopulation → Aggregate → Emit } → Done
//! ```
//!
//! The input tables are loaded once and shared read-only. Each hour is a pure
//! function of those tables and the hour index ([`run_hour`]), so hours run as
//! independent rayon tasks when `parallel` is set. Nothing computed for one
//! hour is visible to another.

pub mod cancel;
pub mod join;
pub mod population;
pub mod presence;
pub mod report;
pub mod share;
pub mod zone;

pub use cancel::CancelToken;
pub use join::{JoinStage, ProfileIndex, UnmatchedUnit};
pub use report::{HourReport, HourResult, IssueCounts};
pub use zone::{ZoneAggregation, ZoneId, ZonePopulation};

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{InputConfig, MfdConfig, SeasonalFactorSource};
use crate::error::{ConfigError, InputError, PipelineError, Result, TableKind};
use crate::floor_area::{rfa_closure_violations, RfaDeviation, RFA_CLOSURE_TOLERANCE};
use crate::model::{CellKey, Hour, HourRange, InputTables, TargetZone};

/// Run-level state of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    LoadInputs,
    Hours,
    Done,
    Cancelled,
}

/// Stage of one hour's pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourStage {
    Normalize,
    Join,
    EstimatePresence,
    EstimatePopulation,
    Aggregate,
    Emit,
}

impl fmt::Display for HourStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HourStage::Normalize => "normalize",
            HourStage::Join => "join",
            HourStage::EstimatePresence => "estimate_presence",
            HourStage::EstimatePopulation => "estimate_population",
            HourStage::Aggregate => "aggregate",
            HourStage::Emit => "emit",
        };
        f.write_str(name)
    }
}

/// Supplies the four input tables. Schema problems must be reported here so
/// that the run fails before any hour starts.
pub trait InputSource {
    fn load(
        &self,
        inputs: &InputConfig,
        hours: HourRange,
    ) -> std::result::Result<InputTables, InputError>;
}

/// Output collaborator, called once per finished hour (possibly from several
/// threads at once).
pub trait HourSink: Sync {
    /// Whatever the sink wants to remember about an emitted hour
    type Receipt: Send;

    fn emit(
        &self,
        zones: &[TargetZone],
        result: &HourResult,
    ) -> std::result::Result<Self::Receipt, Box<dyn std::error::Error + Send + Sync>>;
}

/// Keeps every hour's result in memory
#[derive(Debug, Default)]
pub struct CollectSink {
    results: Mutex<Vec<HourResult>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected results ordered by hour
    pub fn into_results(self) -> Vec<HourResult> {
        let mut results = self
            .results
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        results.sort_by_key(|r| r.hour());
        results
    }
}

impl HourSink for CollectSink {
    type Receipt = ();

    fn emit(
        &self,
        _zones: &[TargetZone],
        result: &HourResult,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.results
            .lock()
            .map_err(|_| "result collector poisoned")?
            .push(result.clone());
        Ok(())
    }
}

/// Read-only inputs plus the indexes every hour shares
#[derive(Debug)]
pub struct PreparedInputs<'a> {
    pub tables: &'a InputTables,
    pub profiles: ProfileIndex,
    /// Cells whose unit RFAs do not close to 1
    pub rfa_deviations: Vec<RfaDeviation>,
}

impl<'a> PreparedInputs<'a> {
    /// Structural checks shared by every hour: empty tables, duplicate keys.
    pub fn prepare(tables: &'a InputTables) -> std::result::Result<Self, InputError> {
        for (table, empty) in [
            (TableKind::TimeUse, tables.profiles.is_empty()),
            (TableKind::Surface, tables.units.is_empty()),
            (TableKind::Counts, tables.cells.is_empty()),
        ] {
            if empty {
                return Err(InputError::EmptyTable { table });
            }
        }

        let profiles = ProfileIndex::build(&tables.profiles)?;
        join::check_unique_cells(&tables.cells)?;

        let rfa_deviations = rfa_closure_violations(&tables.units, RFA_CLOSURE_TOLERANCE);
        for deviation in &rfa_deviations {
            warn!(
                cell = %deviation.cell,
                sum = deviation.sum,
                "relative floor areas of cell do not sum to 1"
            );
        }

        Ok(Self {
            tables,
            profiles,
            rfa_deviations,
        })
    }
}

/// One full pass for one hour. Pure: same inputs, same result.
pub fn run_hour(
    inputs: &PreparedInputs<'_>,
    hour: Hour,
    sf_source: SeasonalFactorSource,
) -> HourResult {
    let tables = inputs.tables;

    debug!(%hour, stage = %HourStage::Normalize, "stage");
    let shares = share::relative_shares(&tables.cells, hour);

    debug!(%hour, stage = %HourStage::Join, "stage");
    let joined = join::join_units(
        &tables.units,
        &tables.profiles,
        &inputs.profiles,
        &shares,
        hour,
        sf_source,
    );

    debug!(%hour, stage = %HourStage::EstimatePresence, "stage");
    let presence = presence::estimate_presence(&joined.rows);

    debug!(%hour, stage = %HourStage::EstimatePopulation, "stage");
    let population = population::estimate_population(&joined.rows, &presence.rows);

    debug!(%hour, stage = %HourStage::Aggregate, "stage");
    let aggregation = zone::aggregate_zones(hour, &population);

    // Cells that reach a zone: carried by a joined unit and not degenerate
    let degenerate: FxHashSet<&str> = presence
        .degenerate_cells
        .iter()
        .map(CellKey::as_str)
        .collect();
    let carried: FxHashSet<&str> = joined
        .rows
        .iter()
        .map(|row| row.unit.cell.as_str())
        .collect();

    let mut retained_share = 0.0;
    let mut uncovered_cells = Vec::new();
    for cell in &tables.cells {
        let share = shares.get(cell.key.as_str()).unwrap_or(0.0);
        if carried.contains(cell.key.as_str()) {
            if !degenerate.contains(cell.key.as_str()) {
                retained_share += share;
            }
        } else if share > 0.0 {
            uncovered_cells.push(cell.key.clone());
        }
    }
    uncovered_cells.sort();

    let report = HourReport {
        hour,
        units_total: tables.units.len(),
        units_joined: joined.rows.len(),
        unmatched: joined.unmatched,
        degenerate_cells: presence.degenerate_cells,
        cast_failures: aggregation.cast_failures.clone(),
        cast_failure_rows: aggregation.cast_failure_rows,
        uncovered_cells,
        share_total: shares.total(),
        retained_share,
        zone_total: aggregation.total(),
    };

    HourResult {
        aggregation,
        report,
    }
}

fn log_issues(report: &HourReport) {
    let counts = report.issue_counts();
    if counts.missing_join_matches() > 0 {
        warn!(
            hour = %report.hour,
            missing_profile = counts.missing_profile,
            missing_share = counts.missing_share,
            "units excluded by missing join match"
        );
    }
    if counts.degenerate_groups > 0 {
        warn!(
            hour = %report.hour,
            cells = counts.degenerate_groups,
            "cells with zero presence sum, normalized to 0"
        );
    }
    if counts.key_cast_failures > 0 {
        warn!(
            hour = %report.hour,
            keys = counts.key_cast_failures,
            rows = counts.key_cast_rows,
            "zone keys could not be converted to integers, kept as text"
        );
    }
    if counts.uncovered_cells > 0 {
        warn!(
            hour = %report.hour,
            cells = counts.uncovered_cells,
            "cells with positive share but no joined units"
        );
    }
}

/// Emitted hour with the sink's receipt
#[derive(Debug)]
pub struct HourOutcome<R> {
    pub report: HourReport,
    pub receipt: R,
}

#[derive(Debug)]
pub struct RunSummary<R> {
    pub hours: Vec<HourOutcome<R>>,
    /// Hours not started because the run was cancelled
    pub skipped: Vec<Hour>,
    pub rfa_deviations: Vec<RfaDeviation>,
}

impl<R> RunSummary<R> {
    pub fn cancelled(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Drives the whole run from configuration to the last emitted hour
#[derive(Debug)]
pub struct Orchestrator {
    config: MfdConfig,
    state: RunState,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(config: MfdConfig) -> std::result::Result<Self, ConfigError> {
        config.validate_all()?;
        Ok(Self {
            config,
            state: RunState::Idle,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &MfdConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Handle for cancelling from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Load the inputs through `source`, then run every configured hour.
    ///
    /// A cancellation left over from an earlier run is cleared first.
    pub fn run<S: HourSink>(
        &mut self,
        source: &dyn InputSource,
        sink: &S,
    ) -> Result<RunSummary<S::Receipt>> {
        self.cancel.reset();
        self.state = RunState::LoadInputs;
        info!(hours = %self.config.hours, "loading inputs");
        let tables = match source.load(&self.config.inputs, self.config.hours) {
            Ok(tables) => tables,
            Err(err) => {
                self.state = RunState::Idle;
                return Err(err.into());
            }
        };
        self.run_loaded(&tables, sink)
    }

    /// Run every configured hour over already loaded tables.
    ///
    /// A cancellation left over from an earlier run is cleared first.
    pub fn run_tables<S: HourSink>(
        &mut self,
        tables: &InputTables,
        sink: &S,
    ) -> Result<RunSummary<S::Receipt>> {
        self.cancel.reset();
        self.run_loaded(tables, sink)
    }

    fn run_loaded<S: HourSink>(
        &mut self,
        tables: &InputTables,
        sink: &S,
    ) -> Result<RunSummary<S::Receipt>> {
        self.state = RunState::LoadInputs;
        let inputs = match PreparedInputs::prepare(tables) {
            Ok(inputs) => inputs,
            Err(err) => {
                self.state = RunState::Idle;
                return Err(err.into());
            }
        };
        info!(
            profiles = tables.profiles.len(),
            units = tables.units.len(),
            cells = tables.cells.len(),
            zones = tables.zones.len(),
            "inputs ready"
        );

        self.state = RunState::Hours;
        let hours: Vec<Hour> = self.config.hours.hours().collect();
        let sf_source = self.config.seasonal_factor_source;
        let cancel = &self.cancel;

        let process = |hour: Hour| -> Option<Result<HourOutcome<S::Receipt>>> {
            if cancel.is_cancelled() {
                return None;
            }
            let result = run_hour(&inputs, hour, sf_source);
            log_issues(&result.report);

            debug!(%hour, stage = %HourStage::Emit, "stage");
            let receipt = match sink.emit(&tables.zones, &result) {
                Ok(receipt) => receipt,
                Err(err) => {
                    return Some(Err(PipelineError::Emit {
                        hour,
                        message: err.to_string(),
                    }))
                }
            };
            info!(
                %hour,
                zones = result.aggregation.len(),
                zone_total = result.report.zone_total,
                "hour done"
            );
            Some(Ok(HourOutcome {
                report: result.report,
                receipt,
            }))
        };

        let outcomes: Vec<(Hour, Option<Result<HourOutcome<S::Receipt>>>)> =
            if self.config.parallel {
                hours.par_iter().map(|&h| (h, process(h))).collect()
            } else {
                hours.iter().map(|&h| (h, process(h))).collect()
            };

        let mut summary = RunSummary {
            hours: Vec::with_capacity(outcomes.len()),
            skipped: Vec::new(),
            rfa_deviations: inputs.rfa_deviations.clone(),
        };
        for (hour, outcome) in outcomes {
            match outcome {
                Some(Ok(done)) => summary.hours.push(done),
                Some(Err(err)) => {
                    self.state = RunState::Idle;
                    return Err(err);
                }
                None => summary.skipped.push(hour),
            }
        }

        self.state = if summary.cancelled() {
            warn!(skipped = summary.skipped.len(), "run cancelled");
            RunState::Cancelled
        } else {
            RunState::Done
        };
        Ok(summary)
    }
}
