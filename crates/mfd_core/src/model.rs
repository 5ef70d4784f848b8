//! Input table model
//!
//! Immutable rows supplied by the input collaborators. Every hour-dependent
//! value is addressed through [`Hour`], never through a column name.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Number of hourly slots carried by every series.
pub const HOURS_PER_DAY: usize = 24;

/// Hour of day (0-23)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Hour(u8);

impl Hour {
    pub const FIRST: Hour = Hour(0);
    pub const LAST: Hour = Hour(HOURS_PER_DAY as u8 - 1);

    pub fn new(hour: u8) -> Option<Self> {
        ((hour as usize) < HOURS_PER_DAY).then_some(Self(hour))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for Hour {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Hour::new(value).ok_or_else(|| format!("hour {} is outside 0-23", value))
    }
}

impl From<Hour> for u8 {
    fn from(hour: Hour) -> Self {
        hour.0
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed, contiguous hour range (`start..=end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: Hour,
    pub end: Hour,
}

impl HourRange {
    /// Returns `None` when `start > end`.
    pub fn new(start: Hour, end: Hour) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn full_day() -> Self {
        Self {
            start: Hour::FIRST,
            end: Hour::LAST,
        }
    }

    pub fn contains(&self, hour: Hour) -> bool {
        self.start <= hour && hour <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.index() - self.start.index() + 1
    }

    pub fn hours(&self) -> impl Iterator<Item = Hour> + Clone {
        (self.start.0..=self.end.0).map(Hour)
    }

    /// Parse `"7"` or `"7-9"`.
    pub fn parse(text: &str) -> Option<Self> {
        let parse_hour = |s: &str| s.trim().parse::<u8>().ok().and_then(Hour::new);
        match text.split_once('-') {
            Some((a, b)) => HourRange::new(parse_hour(a)?, parse_hour(b)?),
            None => {
                let h = parse_hour(text)?;
                Some(Self { start: h, end: h })
            }
        }
    }
}

impl fmt::Display for HourRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One value per hour of the day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries([f64; HOURS_PER_DAY]);

impl HourlySeries {
    pub fn zeros() -> Self {
        Self([0.0; HOURS_PER_DAY])
    }

    pub fn from_values(values: [f64; HOURS_PER_DAY]) -> Self {
        Self(values)
    }

    pub fn get(&self, hour: Hour) -> f64 {
        self.0[hour.index()]
    }

    pub fn set(&mut self, hour: Hour, value: f64) {
        self.0[hour.index()] = value;
    }

    /// Series with a single non-zero slot. Mostly useful in tests.
    pub fn at(hour: Hour, value: f64) -> Self {
        let mut series = Self::zeros();
        series.set(hour, value);
        series
    }
}

impl Default for HourlySeries {
    fn default() -> Self {
        Self::zeros()
    }
}

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_string())
            }
        }
    };
}

string_key!(
    /// Coverage cell (base station service area) identifier
    CellKey
);
string_key!(
    /// Target zone (statistical grid cell) identifier as it arrives in the input
    ZoneKey
);

/// Stable unit identity: 1-based row position in the physical surface table
pub type UnitId = u32;

/// Hourly raw activity counts for one coverage cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageCell {
    pub key: CellKey,
    pub counts: HourlySeries,
}

/// Time-use profile row, keyed by (spatial unit type, activity function type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeUseProfile {
    pub spatial_unit: String,
    pub activity_function: String,
    pub seasonal_factor: f64,
    /// Fraction of the activity taking place in each hour, in [0, 1]
    pub fractions: HourlySeries,
}

/// Sub-division of one coverage cell's service area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalSurfaceUnit {
    pub id: UnitId,
    pub cell: CellKey,
    pub zone: ZoneKey,
    pub spatial_unit: String,
    pub activity_function: String,
    pub seasonal_factor: f64,
    /// Relative floor area: share of the parent cell's weighted floor area
    pub rfa: f64,
}

/// Target grid cell. Geometry is carried through untouched for the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetZone {
    pub key: ZoneKey,
    pub geometry: Option<String>,
}

/// The four immutable input tables of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTables {
    pub profiles: Vec<TimeUseProfile>,
    pub units: Vec<PhysicalSurfaceUnit>,
    pub cells: Vec<CoverageCell>,
    pub zones: Vec<TargetZone>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_bounds() {
        assert!(Hour::new(0).is_some());
        assert!(Hour::new(23).is_some());
        assert!(Hour::new(24).is_none());
        assert_eq!(Hour::LAST.index(), 23);
    }

    #[test]
    fn test_hour_range_iteration() {
        let range = HourRange::new(Hour::new(7).unwrap(), Hour::new(9).unwrap()).unwrap();
        let hours: Vec<u8> = range.hours().map(Hour::get).collect();
        assert_eq!(hours, vec![7, 8, 9]);
        assert_eq!(range.len(), 3);
        assert!(range.contains(Hour::new(8).unwrap()));
        assert!(!range.contains(Hour::new(10).unwrap()));
        assert_eq!(HourRange::full_day().len(), 24);
    }

    #[test]
    fn test_hour_range_rejects_reversed() {
        assert!(HourRange::new(Hour::new(9).unwrap(), Hour::new(7).unwrap()).is_none());
    }

    #[test]
    fn test_hour_range_parse() {
        assert_eq!(HourRange::parse("7-9").unwrap().to_string(), "7-9");
        assert_eq!(HourRange::parse("12").unwrap().len(), 1);
        assert!(HourRange::parse("9-7").is_none());
        assert!(HourRange::parse("3-30").is_none());
        assert!(HourRange::parse("x").is_none());
    }

    #[test]
    fn test_hour_deserialize_out_of_range() {
        assert!(serde_json::from_str::<Hour>("5").is_ok());
        assert!(serde_json::from_str::<Hour>("24").is_err());
    }

    #[test]
    fn test_series_slot_access() {
        let h9 = Hour::new(9).unwrap();
        let series = HourlySeries::at(h9, 0.5);
        assert_eq!(series.get(h9), 0.5);
        assert_eq!(series.get(Hour::FIRST), 0.0);
    }
}
