//! Required equality joins of the surface units
//!
//! 1. unit ⨝ time-use profile on (spatial unit type, activity function type)
//! 2. result ⨝ relative share on coverage cell key
//!
//! Units failing either join are returned as [`UnmatchedUnit`]s, never dropped
//! silently.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::share::RelativeShares;
use crate::config::SeasonalFactorSource;
use crate::error::{InputError, TableKind};
use crate::model::{CellKey, CoverageCell, Hour, PhysicalSurfaceUnit, TimeUseProfile, UnitId};

/// Lookup from (spatial unit, activity function) to a profile row
#[derive(Debug, Clone, Default)]
pub struct ProfileIndex {
    by_spatial_unit: FxHashMap<String, FxHashMap<String, usize>>,
}

impl ProfileIndex {
    /// Fails on a repeated key: a unit could then match more than one row.
    pub fn build(profiles: &[TimeUseProfile]) -> Result<Self, InputError> {
        let mut by_spatial_unit: FxHashMap<String, FxHashMap<String, usize>> =
            FxHashMap::default();

        for (row, profile) in profiles.iter().enumerate() {
            let by_activity = by_spatial_unit
                .entry(profile.spatial_unit.clone())
                .or_default();
            if let Some(first) = by_activity.insert(profile.activity_function.clone(), row) {
                return Err(InputError::DuplicateKey {
                    table: TableKind::TimeUse,
                    key: format!("({}, {})", profile.spatial_unit, profile.activity_function),
                    first_row: first as u32 + 1,
                    row: row as u32 + 1,
                });
            }
        }

        Ok(Self { by_spatial_unit })
    }

    pub fn lookup(&self, spatial_unit: &str, activity_function: &str) -> Option<usize> {
        self.by_spatial_unit
            .get(spatial_unit)
            .and_then(|m| m.get(activity_function))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_spatial_unit.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rejects repeated cell keys in the counts table.
pub fn check_unique_cells(cells: &[CoverageCell]) -> Result<(), InputError> {
    let mut seen: FxHashMap<&CellKey, usize> = FxHashMap::default();
    for (row, cell) in cells.iter().enumerate() {
        if let Some(first) = seen.insert(&cell.key, row) {
            return Err(InputError::DuplicateKey {
                table: TableKind::Counts,
                key: cell.key.to_string(),
                first_row: first as u32 + 1,
                row: row as u32 + 1,
            });
        }
    }
    Ok(())
}

/// Join that a unit failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStage {
    TimeUseProfile,
    CoverageShare,
}

/// MissingJoinMatch record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedUnit {
    pub unit: UnitId,
    pub stage: JoinStage,
    /// Key that found no partner, formatted for diagnostics
    pub key: String,
}

/// One surface unit with everything the estimators need for one hour
#[derive(Debug, Clone, Copy)]
pub struct JoinedUnit<'a> {
    pub unit: &'a PhysicalSurfaceUnit,
    pub seasonal_factor: f64,
    pub activity_fraction: f64,
    pub share: f64,
}

#[derive(Debug, Clone, Default)]
pub struct JoinOutcome<'a> {
    /// Same order as the input units
    pub rows: Vec<JoinedUnit<'a>>,
    pub unmatched: Vec<UnmatchedUnit>,
}

impl JoinOutcome<'_> {
    pub fn unmatched_at(&self, stage: JoinStage) -> usize {
        self.unmatched.iter().filter(|u| u.stage == stage).count()
    }
}

/// Join every unit against the profile index and the hour's shares.
pub fn join_units<'a>(
    units: &'a [PhysicalSurfaceUnit],
    profiles: &[TimeUseProfile],
    index: &ProfileIndex,
    shares: &RelativeShares,
    hour: Hour,
    sf_source: SeasonalFactorSource,
) -> JoinOutcome<'a> {
    let mut outcome = JoinOutcome {
        rows: Vec::with_capacity(units.len()),
        unmatched: Vec::new(),
    };

    for unit in units {
        let Some(profile_row) = index.lookup(&unit.spatial_unit, &unit.activity_function) else {
            outcome.unmatched.push(UnmatchedUnit {
                unit: unit.id,
                stage: JoinStage::TimeUseProfile,
                key: format!("({}, {})", unit.spatial_unit, unit.activity_function),
            });
            continue;
        };
        let profile = &profiles[profile_row];

        let Some(share) = shares.get(unit.cell.as_str()) else {
            outcome.unmatched.push(UnmatchedUnit {
                unit: unit.id,
                stage: JoinStage::CoverageShare,
                key: unit.cell.to_string(),
            });
            continue;
        };

        let seasonal_factor = match sf_source {
            SeasonalFactorSource::Profile => profile.seasonal_factor,
            SeasonalFactorSource::Unit => unit.seasonal_factor,
        };

        outcome.rows.push(JoinedUnit {
            unit,
            seasonal_factor,
            activity_fraction: profile.fractions.get(hour),
            share,
        });
    }

    outcome
}
