//! Per-hour ZROP CSV writer
//!
//! One file per hour under `output.dir`. Rows follow the target zone table
//! order; zone keys are matched through [`ZoneId`] so `5790` and `5790.0`
//! meet. The file is rendered in memory, hashed, then written in one call.

use anyhow::{Context, Result};
use mfd_core::config::OutputConfig;
use mfd_core::{Hour, HourResult, HourSink, MfdConfig, TargetZone, UnmatchedZonePolicy, ZoneId};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::sha256_hex;

/// What the writer did for one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrittenHour {
    pub hour: Hour,
    pub path: PathBuf,
    /// SHA256 of the written file
    pub checksum: String,
    pub zones_written: usize,
    /// Rows written as 0.0 under the zero-fill policy
    pub zero_filled: usize,
    /// Aggregated zones missing from the target zone table
    pub unplaced_zones: Vec<ZoneId>,
}

#[derive(Debug, Clone)]
pub struct CsvZoneWriter {
    output: OutputConfig,
    geometry_column: Option<String>,
    delimiter: u8,
}

impl CsvZoneWriter {
    pub fn new(output: OutputConfig, geometry_column: Option<String>, delimiter: u8) -> Self {
        Self {
            output,
            geometry_column,
            delimiter,
        }
    }

    pub fn from_config(config: &MfdConfig) -> Self {
        Self::new(
            config.output.clone(),
            config.inputs.zones.geometry_column.clone(),
            config.delimiter_byte(),
        )
    }

    /// Render one hour's table; returns the bytes and the row bookkeeping.
    fn render(&self, zones: &[TargetZone], result: &HourResult) -> Result<(Vec<u8>, Tally)> {
        let hour = result.hour();
        let aggregation = &result.aggregation;

        let mut out = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        let value_column = self.output.value_column(hour);
        let mut header = vec![self.output.zone_key_column.as_str(), value_column.as_str()];
        if let Some(geometry) = &self.geometry_column {
            header.push(geometry.as_str());
        }
        out.write_record(&header)?;

        let mut tally = Tally::default();
        let mut placed: FxHashSet<ZoneId> = FxHashSet::default();
        for zone in zones {
            let id = ZoneId::from_key(&zone.key);
            let value = match (aggregation.get(&id), self.output.unmatched_zones) {
                (Some(value), _) => value,
                (None, UnmatchedZonePolicy::ZeroFill) => {
                    tally.zero_filled += 1;
                    0.0
                }
                (None, UnmatchedZonePolicy::Omit) => continue,
            };

            let key = id.to_string();
            let value = value.to_string();
            let mut row = vec![key.as_str(), value.as_str()];
            if self.geometry_column.is_some() {
                row.push(zone.geometry.as_deref().unwrap_or(""));
            }
            out.write_record(&row)?;
            tally.written += 1;
            placed.insert(id);
        }

        tally.unplaced = aggregation
            .zones
            .iter()
            .filter(|z| !placed.contains(&z.zone))
            .map(|z| z.zone.clone())
            .collect();

        let bytes = out
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to finish CSV buffer: {}", e))?;
        Ok((bytes, tally))
    }

    fn write_hour(&self, zones: &[TargetZone], result: &HourResult) -> Result<WrittenHour> {
        let hour = result.hour();
        let (bytes, tally) = self.render(zones, result)?;

        fs::create_dir_all(&self.output.dir).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                self.output.dir.display()
            )
        })?;
        let path = self.output.file_for(hour);
        fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write output file: {}", path.display()))?;

        if !tally.unplaced.is_empty() {
            warn!(
                %hour,
                count = tally.unplaced.len(),
                first = %tally.unplaced[0],
                "aggregated zones not in target zone table"
            );
        }

        Ok(WrittenHour {
            hour,
            path,
            checksum: sha256_hex(&bytes),
            zones_written: tally.written,
            zero_filled: tally.zero_filled,
            unplaced_zones: tally.unplaced,
        })
    }
}

#[derive(Debug, Default)]
struct Tally {
    written: usize,
    zero_filled: usize,
    unplaced: Vec<ZoneId>,
}

impl HourSink for CsvZoneWriter {
    type Receipt = WrittenHour;

    fn emit(
        &self,
        zones: &[TargetZone],
        result: &HourResult,
    ) -> std::result::Result<WrittenHour, Box<dyn std::error::Error + Send + Sync>> {
        self.write_hour(zones, result).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfd_core::pipeline::ZonePopulation;
    use mfd_core::{HourReport, ZoneAggregation, ZoneKey};
    use tempfile::TempDir;

    fn h9() -> Hour {
        Hour::new(9).unwrap()
    }

    fn result(values: &[(ZoneId, f64)]) -> HourResult {
        HourResult {
            aggregation: ZoneAggregation {
                hour: h9(),
                zones: values
                    .iter()
                    .map(|(zone, value)| ZonePopulation {
                        zone: zone.clone(),
                        value: *value,
                    })
                    .collect(),
                cast_failures: Vec::new(),
                cast_failure_rows: 0,
            },
            report: HourReport::empty(h9()),
        }
    }

    fn zones(keys: &[&str]) -> Vec<TargetZone> {
        keys.iter()
            .map(|k| TargetZone {
                key: ZoneKey::from(*k),
                geometry: Some(format!("POINT ({} 0)", k)),
            })
            .collect()
    }

    fn writer(dir: &TempDir, policy: UnmatchedZonePolicy, geometry: bool) -> CsvZoneWriter {
        let output = OutputConfig {
            dir: dir.path().join("results"),
            unmatched_zones: policy,
            ..OutputConfig::default()
        };
        CsvZoneWriter::new(output, geometry.then(|| "geometry".to_string()), b',')
    }

    #[test]
    fn test_omit_writes_inner_join() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, UnmatchedZonePolicy::Omit, false);
        let res = result(&[(ZoneId::Numeric(5790), 0.25), (ZoneId::Numeric(5791), 0.75)]);

        let written = w.emit(&zones(&["5791", "5789", "5790"]), &res).unwrap();
        let text = fs::read_to_string(&written.path).unwrap();
        assert_eq!(text, "YKR_ID,ZROP H9\n5791,0.75\n5790,0.25\n");
        assert_eq!(written.zones_written, 2);
        assert_eq!(written.zero_filled, 0);
        assert!(written.unplaced_zones.is_empty());
        assert!(written.path.ends_with("ZROP_results_H9.csv"));
        assert_eq!(written.checksum, sha256_hex(text.as_bytes()));
    }

    #[test]
    fn test_zero_fill_writes_every_zone() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, UnmatchedZonePolicy::ZeroFill, true);
        let res = result(&[(ZoneId::Numeric(5790), 1.0)]);

        let written = w.emit(&zones(&["5789", "5790.0"]), &res).unwrap();
        let text = fs::read_to_string(&written.path).unwrap();
        assert_eq!(
            text,
            "YKR_ID,ZROP H9,geometry\n5789,0,POINT (5789 0)\n5790,1,POINT (5790.0 0)\n"
        );
        assert_eq!(written.zones_written, 2);
        assert_eq!(written.zero_filled, 1);
    }

    #[test]
    fn test_unplaced_zones_reported() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, UnmatchedZonePolicy::Omit, false);
        let res = result(&[
            (ZoneId::Numeric(5790), 0.5),
            (ZoneId::Raw("ZONE-X".to_string()), 0.5),
        ]);

        let written = w.emit(&zones(&["5790"]), &res).unwrap();
        assert_eq!(written.zones_written, 1);
        assert_eq!(written.unplaced_zones, vec![ZoneId::Raw("ZONE-X".to_string())]);
    }

    #[test]
    fn test_unwritable_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("results");
        fs::write(&blocker, "not a directory").unwrap();
        let w = writer(&dir, UnmatchedZonePolicy::Omit, false);

        let err = w.emit(&zones(&["1"]), &result(&[])).unwrap_err();
        assert!(err.to_string().contains("output directory"));
    }
}
