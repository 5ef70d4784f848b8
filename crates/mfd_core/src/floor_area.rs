//! Floor area estimation and relative floor area (RFA)
//!
//! Scalar part of preparing the physical surface layer: given per-part areas
//! that a GIS step already produced, estimate floor areas and turn them into
//! per-cell shares. No geometry is handled here.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::FloorAreaConfig;
use crate::model::{CellKey, PhysicalSurfaceUnit};

/// Tolerance for the "RFAs of a cell sum to 1" check
pub const RFA_CLOSURE_TOLERANCE: f64 = 1e-6;

/// One building or land part before its floor area is known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorAreaRecord {
    pub cell: CellKey,
    pub spatial_unit: String,
    pub activity_function: String,
    /// Ground area of the part
    pub footprint_area: f64,
    /// Floor area from the building register, when known
    pub recorded_floor_area: Option<f64>,
    pub floor_count: Option<f64>,
    /// Footprint area of the matched register buildings
    pub matched_area: Option<f64>,
}

/// Floor area of one part.
///
/// Land parts count with their ground area. For buildings the register floor
/// area wins, then floor count × footprint × coefficient, then footprint ×
/// coefficient × mean floor count. When the matched register footprint is
/// smaller than `deficit_threshold` of the part's footprint, the missing area
/// is added back with the mean floor count.
pub fn estimate_floor_area(record: &FloorAreaRecord, config: &FloorAreaConfig) -> f64 {
    if record.spatial_unit == config.land_label {
        return record.footprint_area;
    }

    let coefficient = config.coefficient(&record.activity_function);
    let mean_floors = config.mean_floor_count(&record.activity_function);
    let footprint = record.footprint_area;

    let mut floor_area = match (record.recorded_floor_area, record.floor_count) {
        (Some(recorded), _) => recorded,
        (None, Some(floors)) => floors * footprint * coefficient,
        (None, None) => footprint * coefficient * mean_floors,
    };

    if let Some(matched) = record.matched_area {
        if matched >= 0.0 && matched < footprint * config.deficit_threshold {
            floor_area += (footprint - matched) * coefficient * mean_floors;
        }
    }

    floor_area
}

/// Each part's share of its cell's total floor area.
///
/// `parts` is (cell, floor area); the result is parallel to it. A cell with a
/// zero total gives 0.0 to all its parts.
pub fn relative_floor_areas(parts: &[(CellKey, f64)]) -> Vec<f64> {
    let mut totals: FxHashMap<&CellKey, f64> = FxHashMap::default();
    for (cell, area) in parts {
        *totals.entry(cell).or_insert(0.0) += area;
    }

    parts
        .iter()
        .map(|(cell, area)| {
            let total = totals[cell];
            if total > 0.0 {
                area / total
            } else {
                0.0
            }
        })
        .collect()
}

/// A cell whose units' RFAs do not close to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfaDeviation {
    pub cell: CellKey,
    pub sum: f64,
}

/// Cells whose RFA sum is off by more than `tolerance`, sorted by cell key.
pub fn rfa_closure_violations(units: &[PhysicalSurfaceUnit], tolerance: f64) -> Vec<RfaDeviation> {
    let mut sums: FxHashMap<&CellKey, f64> = FxHashMap::default();
    for unit in units {
        *sums.entry(&unit.cell).or_insert(0.0) += unit.rfa;
    }

    let mut deviations: Vec<RfaDeviation> = sums
        .into_iter()
        .filter(|(_, sum)| (sum - 1.0).abs() > tolerance)
        .map(|(cell, sum)| RfaDeviation {
            cell: cell.clone(),
            sum,
        })
        .collect();
    deviations.sort_by(|a, b| a.cell.cmp(&b.cell));
    deviations
}
