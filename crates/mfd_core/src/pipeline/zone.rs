//! Target zone aggregation (ZROP)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::population::UnitPopulation;
use crate::model::{Hour, ZoneKey};

/// Canonical zone identifier. Keys that cannot be read as an integer keep their
/// original text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneId {
    Numeric(i64),
    Raw(String),
}

impl ZoneId {
    /// Integer form of a key: `"5790"`, `" 5790 "` and `"5790.0"` all give 5790.
    pub fn cast(key: &str) -> Option<i64> {
        let key = key.trim();
        if let Ok(id) = key.parse::<i64>() {
            return Some(id);
        }
        let value = key.parse::<f64>().ok()?;
        let in_range = value.is_finite()
            && value.fract() == 0.0
            && value >= i64::MIN as f64
            && value < i64::MAX as f64;
        in_range.then_some(value as i64)
    }

    pub fn from_key(key: &ZoneKey) -> Self {
        match Self::cast(key.as_str()) {
            Some(id) => ZoneId::Numeric(id),
            None => ZoneId::Raw(key.to_string()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ZoneId::Numeric(_))
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneId::Numeric(id) => write!(f, "{}", id),
            ZoneId::Raw(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePopulation {
    pub zone: ZoneId,
    pub value: f64,
}

/// One hour's ZROP table. Only zones that received at least one unit appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAggregation {
    pub hour: Hour,
    /// Sorted by zone id
    pub zones: Vec<ZonePopulation>,
    /// Distinct keys kept in raw form (KeyCastFailure)
    pub cast_failures: Vec<ZoneKey>,
    /// Unit rows whose zone key stayed in raw form
    pub cast_failure_rows: usize,
}

impl ZoneAggregation {
    pub fn total(&self) -> f64 {
        self.zones.iter().map(|z| z.value).sum()
    }

    pub fn get(&self, zone: &ZoneId) -> Option<f64> {
        self.zones
            .binary_search_by(|z| z.zone.cmp(zone))
            .ok()
            .map(|i| self.zones[i].value)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Sum unit estimates per zone. Keys that spell the same integer merge.
pub fn aggregate_zones(hour: Hour, units: &[UnitPopulation<'_>]) -> ZoneAggregation {
    let mut sums: BTreeMap<ZoneId, f64> = BTreeMap::new();
    let mut cast_failures: BTreeSet<&ZoneKey> = BTreeSet::new();
    let mut cast_failure_rows = 0;

    for unit in units {
        let id = ZoneId::from_key(unit.zone);
        if !id.is_numeric() {
            cast_failures.insert(unit.zone);
            cast_failure_rows += 1;
        }
        *sums.entry(id).or_insert(0.0) += unit.value;
    }

    ZoneAggregation {
        hour,
        zones: sums
            .into_iter()
            .map(|(zone, value)| ZonePopulation { zone, value })
            .collect(),
        cast_failures: cast_failures.into_iter().cloned().collect(),
        cast_failure_rows,
    }
}
