//! Relative observed population (ROP)

use super::join::JoinedUnit;
use super::presence::UnitPresence;
use crate::model::{UnitId, ZoneKey};

#[derive(Debug, Clone, PartialEq)]
pub struct UnitPopulation<'a> {
    pub unit: UnitId,
    pub zone: &'a ZoneKey,
    pub value: f64,
}

/// `NormalizedPresence × RelativeShare(parent cell)`, row by row.
pub fn estimate_population<'a>(
    rows: &[JoinedUnit<'a>],
    presence: &[UnitPresence],
) -> Vec<UnitPopulation<'a>> {
    debug_assert_eq!(rows.len(), presence.len());

    rows.iter()
        .zip(presence)
        .map(|(row, p)| UnitPopulation {
            unit: row.unit.id,
            zone: &row.unit.zone,
            value: p.normalized * row.share,
        })
        .collect()
}
