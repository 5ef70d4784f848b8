//! # mfd_core - Multi-temporal Function-based Dasymetric Interpolation
//!
//! Reallocates hourly activity counts observed per network coverage cell onto a
//! statistical grid, weighting each cell's sub-units by relative floor area and
//! time-use activity profiles.
//!
//! ## Pipeline (per hour)
//! - RMP: relative share of raw counts per cell
//! - join: surface units × time-use profile × cell share
//! - EHP: estimated human presence, normalized within each cell
//! - ROP: presence × cell share
//! - ZROP: ROP summed per target zone
//!
//! Hours are independent; see [`pipeline::Orchestrator`].

pub mod config;
pub mod error;
pub mod floor_area;
pub mod model;
pub mod pipeline;

pub use config::{MfdConfig, SeasonalFactorSource, UnmatchedZonePolicy};
pub use error::{ConfigError, InputError, PipelineError, Result, TableKind};
pub use model::{
    CellKey, CoverageCell, Hour, HourRange, HourlySeries, InputTables, PhysicalSurfaceUnit,
    TargetZone, TimeUseProfile, UnitId, ZoneKey, HOURS_PER_DAY,
};
pub use pipeline::{
    run_hour, CancelToken, CollectSink, HourReport, HourResult, HourSink, InputSource,
    IssueCounts, Orchestrator, PreparedInputs, RunState, RunSummary, ZoneAggregation, ZoneId,
};
