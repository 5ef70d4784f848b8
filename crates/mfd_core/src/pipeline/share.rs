//! Relative share of raw counts per coverage cell (RMP)

use rustc_hash::FxHashMap;

use crate::model::{CellKey, CoverageCell, Hour};

/// RelativeShare(cell, h) for every cell of the counts table
#[derive(Debug, Clone)]
pub struct RelativeShares {
    pub hour: Hour,
    /// Sum of raw counts at `hour` over all cells
    pub raw_total: f64,
    by_cell: FxHashMap<CellKey, f64>,
}

impl RelativeShares {
    pub fn get(&self, cell: &str) -> Option<f64> {
        self.by_cell.get(cell).copied()
    }

    pub fn len(&self) -> usize {
        self.by_cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_cell.is_empty()
    }

    /// Sum of all shares: 1 when anything was observed, 0 otherwise
    pub fn total(&self) -> f64 {
        self.by_cell.values().sum()
    }

    /// True when no cell observed any activity in this hour
    pub fn is_degenerate(&self) -> bool {
        self.raw_total == 0.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, f64)> {
        self.by_cell.iter().map(|(k, v)| (k, *v))
    }
}

/// Normalize the hour's raw counts by their total over all cells.
///
/// A zero (or non-finite) total yields 0.0 for every cell.
pub fn relative_shares(cells: &[CoverageCell], hour: Hour) -> RelativeShares {
    let raw_total: f64 = cells.iter().map(|c| c.counts.get(hour)).sum();
    let degenerate = !(raw_total.is_finite() && raw_total > 0.0);

    let by_cell = cells
        .iter()
        .map(|cell| {
            let share = if degenerate {
                0.0
            } else {
                cell.counts.get(hour) / raw_total
            };
            (cell.key.clone(), share)
        })
        .collect();

    RelativeShares {
        hour,
        raw_total: if degenerate { 0.0 } else { raw_total },
        by_cell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HourlySeries;
    use proptest::prelude::*;

    fn cell(key: &str, hour: Hour, count: f64) -> CoverageCell {
        CoverageCell {
            key: CellKey::from(key),
            counts: HourlySeries::at(hour, count),
        }
    }

    #[test]
    fn test_shares_divide_by_hour_total() {
        let h = Hour::new(9).unwrap();
        let cells = vec![cell("a", h, 40.0), cell("b", h, 60.0)];
        let shares = relative_shares(&cells, h);

        assert!((shares.get("a").unwrap() - 0.4).abs() < 1e-12);
        assert!((shares.get("b").unwrap() - 0.6).abs() < 1e-12);
        assert!((shares.total() - 1.0).abs() < 1e-12);
        assert!((shares.raw_total - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_hour_yields_zero_shares() {
        let h9 = Hour::new(9).unwrap();
        let h3 = Hour::new(3).unwrap();
        let cells = vec![cell("a", h9, 40.0), cell("b", h9, 60.0)];
        let shares = relative_shares(&cells, h3);

        assert!(shares.is_degenerate());
        assert_eq!(shares.get("a"), Some(0.0));
        assert_eq!(shares.get("b"), Some(0.0));
        assert_eq!(shares.total(), 0.0);
    }

    #[test]
    fn test_all_zero_cell_gets_zero_share() {
        let h = Hour::new(12).unwrap();
        let cells = vec![cell("a", h, 10.0), cell("quiet", h, 0.0)];
        let shares = relative_shares(&cells, h);

        assert_eq!(shares.get("quiet"), Some(0.0));
        assert_eq!(shares.get("a"), Some(1.0));
    }

    #[test]
    fn test_unknown_cell_has_no_share() {
        let h = Hour::new(1).unwrap();
        let shares = relative_shares(&[cell("a", h, 1.0)], h);
        assert_eq!(shares.get("zzz"), None);
        assert_eq!(shares.len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let shares = relative_shares(&[], Hour::FIRST);
        assert!(shares.is_empty());
        assert!(shares.is_degenerate());
    }

    proptest! {
        /// Property: shares close to 1 whenever any count is positive
        #[test]
        fn prop_shares_sum_to_one(counts in prop::collection::vec(0.0f64..1.0e6, 1..40)) {
            let h = Hour::new(8).unwrap();
            let cells: Vec<CoverageCell> = counts
                .iter()
                .enumerate()
                .map(|(i, c)| cell(&format!("c{}", i), h, *c))
                .collect();
            let shares = relative_shares(&cells, h);
            let any_positive = counts.iter().any(|c| *c > 0.0);
            if any_positive {
                prop_assert!((shares.total() - 1.0).abs() < 1e-9);
            } else {
                prop_assert!(shares.iter().all(|(_, s)| s == 0.0));
            }
        }
    }
}
