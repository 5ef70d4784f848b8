//! Estimated human presence (EHP)
//!
//! Raw presence is `RFA × SF × activity fraction`. It is normalized within each
//! coverage cell: one pass aggregates the per-cell sums, a second pass divides
//! every row by its cell's sum. Row order plays no part.

use rustc_hash::FxHashMap;

use super::join::JoinedUnit;
use crate::model::CellKey;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitPresence {
    /// Absolute estimate (aEHP)
    pub estimated: f64,
    /// Share of the cell's presence (EHP), 0 in degenerate cells
    pub normalized: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PresenceEstimate {
    /// Parallel to the joined rows
    pub rows: Vec<UnitPresence>,
    /// Cells whose presence sum was zero (DegenerateGroupSum), sorted
    pub degenerate_cells: Vec<CellKey>,
}

pub fn raw_presence(row: &JoinedUnit<'_>) -> f64 {
    row.unit.rfa * row.seasonal_factor * row.activity_fraction
}

pub fn estimate_presence(rows: &[JoinedUnit<'_>]) -> PresenceEstimate {
    let raw: Vec<f64> = rows.iter().map(raw_presence).collect();

    let mut cell_sums: FxHashMap<&str, f64> = FxHashMap::default();
    for (row, value) in rows.iter().zip(&raw) {
        *cell_sums.entry(row.unit.cell.as_str()).or_insert(0.0) += value;
    }

    let usable = |sum: f64| sum.is_finite() && sum > 0.0;

    let presence = rows
        .iter()
        .zip(&raw)
        .map(|(row, &estimated)| {
            let sum = cell_sums[row.unit.cell.as_str()];
            let normalized = if usable(sum) { estimated / sum } else { 0.0 };
            UnitPresence {
                estimated,
                normalized,
            }
        })
        .collect();

    let mut degenerate_cells: Vec<CellKey> = cell_sums
        .iter()
        .filter(|(_, sum)| !usable(**sum))
        .map(|(cell, _)| CellKey::from(*cell))
        .collect();
    degenerate_cells.sort();

    PresenceEstimate {
        rows: presence,
        degenerate_cells,
    }
}
