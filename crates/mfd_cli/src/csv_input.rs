//! CSV → input tables
//!
//! Column names come from the run configuration. Headers are resolved once per
//! file, hourly columns through an explicit hour → column index map, so a
//! missing column fails the whole load before any hour is computed.
//!
//! Row numbers in errors are 1-based and exclude the header. The same number is
//! the stable identity of a physical surface unit.

use mfd_core::config::{
    hour_column, CountsInput, InputConfig, SurfaceInput, TimeUseInput, ZonesInput,
};
use mfd_core::{
    CellKey, CoverageCell, Hour, HourRange, HourlySeries, InputError, InputSource, InputTables,
    PhysicalSurfaceUnit, TableKind, TargetZone, TimeUseProfile, ZoneKey,
};
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::info;

/// Slack allowed above 1.0 for activity fractions
const FRACTION_TOLERANCE: f64 = 1e-9;

/// Column name → index for one CSV header
#[derive(Debug, Clone)]
pub struct Header {
    table: TableKind,
    names: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl Header {
    pub fn new(table: TableKind, record: &csv::StringRecord) -> Self {
        let names: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.trim();
                // Strip BOM from the first column
                if i == 0 {
                    name.trim_start_matches('\u{feff}').to_string()
                } else {
                    name.to_string()
                }
            })
            .collect();
        let mut index = FxHashMap::default();
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            table,
            names,
            index,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// InputSchemaError when absent
    pub fn require(&self, column: &str) -> Result<usize, InputError> {
        self.position(column).ok_or_else(|| InputError::MissingColumn {
            table: self.table,
            column: column.to_string(),
        })
    }

    /// Resolve `template` for every hour of `hours`.
    pub fn hour_columns(
        &self,
        template: &str,
        hours: HourRange,
    ) -> Result<Vec<(Hour, usize)>, InputError> {
        hours
            .hours()
            .map(|hour| Ok((hour, self.require(&hour_column(template, hour))?)))
            .collect()
    }
}

/// Open a CSV file and read its header.
pub fn open_table(
    table: TableKind,
    path: &Path,
    delimiter: u8,
) -> Result<(csv::Reader<std::fs::File>, Header), InputError> {
    let unreadable = |e: csv::Error| InputError::Unreadable {
        table,
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)
        .map_err(unreadable)?;
    let header = Header::new(table, reader.headers().map_err(unreadable)?);
    Ok((reader, header))
}

/// One data row with the context needed for error messages
pub struct Row<'a> {
    pub table: TableKind,
    pub number: u32,
    pub record: &'a csv::StringRecord,
    pub header: &'a Header,
}

impl Row<'_> {
    pub fn text(&self, idx: usize) -> &str {
        self.record.get(idx).unwrap_or("").trim()
    }

    fn invalid(&self, idx: usize) -> InputError {
        InputError::InvalidValue {
            table: self.table,
            row: self.number,
            column: self.header.names[idx].clone(),
            value: self.text(idx).to_string(),
        }
    }

    /// Non-empty key column
    pub fn key(&self, idx: usize) -> Result<String, InputError> {
        let text = self.text(idx);
        if text.is_empty() {
            return Err(self.invalid(idx));
        }
        Ok(text.to_string())
    }

    /// Finite, non-negative number; `empty` is used for blank cells when given.
    pub fn number(&self, idx: usize, empty: Option<f64>) -> Result<f64, InputError> {
        let text = self.text(idx);
        if text.is_empty() {
            return empty.ok_or_else(|| self.invalid(idx));
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(self.invalid(idx)),
        }
    }

    /// Like [`Row::number`] but blank cells are `None`.
    pub fn optional_number(&self, idx: Option<usize>) -> Result<Option<f64>, InputError> {
        match idx {
            Some(idx) if !self.text(idx).is_empty() => self.number(idx, None).map(Some),
            _ => Ok(None),
        }
    }
}

/// Iterate data rows, turning CSV read errors into input errors.
pub fn for_each_row(
    table: TableKind,
    path: &Path,
    reader: &mut csv::Reader<std::fs::File>,
    header: &Header,
    mut f: impl FnMut(&Row<'_>) -> Result<(), InputError>,
) -> Result<u32, InputError> {
    let mut number = 0u32;
    for result in reader.records() {
        number += 1;
        let record = result.map_err(|e| InputError::Unreadable {
            table,
            path: path.display().to_string(),
            message: format!("row {}: {}", number, e),
        })?;
        f(&Row {
            table,
            number,
            record: &record,
            header,
        })?;
    }
    Ok(number)
}

pub fn load_time_use(
    cfg: &TimeUseInput,
    hours: HourRange,
    delimiter: u8,
) -> Result<Vec<TimeUseProfile>, InputError> {
    let table = TableKind::TimeUse;
    let (mut reader, header) = open_table(table, &cfg.path, delimiter)?;

    let sput = header.require(&cfg.spatial_unit_column)?;
    let aft = header.require(&cfg.activity_function_column)?;
    let sf = header.require(&cfg.seasonal_factor_column)?;
    let hour_cols = header.hour_columns(&cfg.hour_column_template, hours)?;

    let mut profiles = Vec::new();
    for_each_row(table, &cfg.path, &mut reader, &header, |row| {
        let mut fractions = HourlySeries::zeros();
        for &(hour, idx) in &hour_cols {
            let value = row.number(idx, None)?;
            if value > 1.0 + FRACTION_TOLERANCE {
                return Err(row.invalid(idx));
            }
            fractions.set(hour, value);
        }
        profiles.push(TimeUseProfile {
            spatial_unit: row.key(sput)?,
            activity_function: row.key(aft)?,
            seasonal_factor: row.number(sf, None)?,
            fractions,
        });
        Ok(())
    })?;

    Ok(profiles)
}

pub fn load_surface(cfg: &SurfaceInput, delimiter: u8) -> Result<Vec<PhysicalSurfaceUnit>, InputError> {
    let table = TableKind::Surface;
    let (mut reader, header) = open_table(table, &cfg.path, delimiter)?;

    let cell = header.require(&cfg.cell_key_column)?;
    let zone = header.require(&cfg.zone_key_column)?;
    let sput = header.require(&cfg.spatial_unit_column)?;
    let aft = header.require(&cfg.activity_function_column)?;
    let sf = header.require(&cfg.seasonal_factor_column)?;
    let rfa = header.require(&cfg.rfa_column)?;

    let mut units = Vec::new();
    for_each_row(table, &cfg.path, &mut reader, &header, |row| {
        units.push(PhysicalSurfaceUnit {
            id: row.number,
            cell: CellKey::new(row.key(cell)?),
            zone: ZoneKey::new(row.key(zone)?),
            spatial_unit: row.key(sput)?,
            activity_function: row.key(aft)?,
            seasonal_factor: row.number(sf, None)?,
            rfa: row.number(rfa, None)?,
        });
        Ok(())
    })?;

    Ok(units)
}

pub fn load_counts(
    cfg: &CountsInput,
    hours: HourRange,
    delimiter: u8,
) -> Result<Vec<CoverageCell>, InputError> {
    let table = TableKind::Counts;
    let (mut reader, header) = open_table(table, &cfg.path, delimiter)?;

    let key = header.require(&cfg.cell_key_column)?;
    let hour_cols = header.hour_columns(&cfg.hour_column_template, hours)?;

    let mut cells = Vec::new();
    for_each_row(table, &cfg.path, &mut reader, &header, |row| {
        let mut counts = HourlySeries::zeros();
        for &(hour, idx) in &hour_cols {
            // Hours without records arrive as blanks
            counts.set(hour, row.number(idx, Some(0.0))?);
        }
        cells.push(CoverageCell {
            key: CellKey::new(row.key(key)?),
            counts,
        });
        Ok(())
    })?;

    Ok(cells)
}

pub fn load_zones(cfg: &ZonesInput, delimiter: u8) -> Result<Vec<TargetZone>, InputError> {
    let table = TableKind::Zones;
    let (mut reader, header) = open_table(table, &cfg.path, delimiter)?;

    let key = header.require(&cfg.zone_key_column)?;
    let geometry = cfg
        .geometry_column
        .as_deref()
        .map(|column| header.require(column))
        .transpose()?;

    let mut zones = Vec::new();
    for_each_row(table, &cfg.path, &mut reader, &header, |row| {
        zones.push(TargetZone {
            key: ZoneKey::new(row.key(key)?),
            geometry: geometry.map(|idx| row.text(idx).to_string()),
        });
        Ok(())
    })?;

    Ok(zones)
}

/// Reads all four tables from the CSV files named in the configuration
#[derive(Debug, Clone, Copy)]
pub struct CsvInputSource {
    pub delimiter: u8,
}

impl CsvInputSource {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl InputSource for CsvInputSource {
    fn load(&self, inputs: &InputConfig, hours: HourRange) -> Result<InputTables, InputError> {
        let tables = InputTables {
            profiles: load_time_use(&inputs.time_use, hours, self.delimiter)?,
            units: load_surface(&inputs.surface, self.delimiter)?,
            cells: load_counts(&inputs.counts, hours, self.delimiter)?,
            zones: load_zones(&inputs.zones, self.delimiter)?,
        };
        info!(
            profiles = tables.profiles.len(),
            units = tables.units.len(),
            cells = tables.cells.len(),
            zones = tables.zones.len(),
            "CSV inputs parsed"
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn h(hour: u8) -> Hour {
        Hour::new(hour).unwrap()
    }

    fn range(a: u8, b: u8) -> HourRange {
        HourRange::new(h(a), h(b)).unwrap()
    }

    #[test]
    fn test_load_time_use_hour_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tu.csv",
            "\u{feff}Spatial_unit,Activity_function_type,Seasonal_factor,H8t,H9t\n\
             building,residential,0.9,0.4,0.5\n\
             building,work,1.0,0.1,0.2\n",
        );
        let cfg = TimeUseInput {
            path,
            ..TimeUseInput::default()
        };

        let profiles = load_time_use(&cfg, range(8, 9), b',').unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].spatial_unit, "building");
        assert_eq!(profiles[0].fractions.get(h(9)), 0.5);
        assert_eq!(profiles[1].fractions.get(h(8)), 0.1);
        assert_eq!(profiles[1].fractions.get(h(10)), 0.0);
    }

    #[test]
    fn test_missing_hour_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tu.csv",
            "Spatial_unit,Activity_function_type,Seasonal_factor,H8t\nbuilding,work,1.0,0.1\n",
        );
        let cfg = TimeUseInput {
            path,
            ..TimeUseInput::default()
        };

        match load_time_use(&cfg, range(8, 9), b',') {
            Err(err @ InputError::MissingColumn { .. }) => {
                assert!(err.is_schema_error());
                assert!(err.to_string().contains("H9t"));
            }
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_fraction_above_one_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tu.csv",
            "Spatial_unit,Activity_function_type,Seasonal_factor,H8t\nbuilding,work,1.0,1.5\n",
        );
        let cfg = TimeUseInput {
            path,
            ..TimeUseInput::default()
        };
        assert!(matches!(
            load_time_use(&cfg, range(8, 8), b','),
            Err(InputError::InvalidValue { row: 1, .. })
        ));
    }

    #[test]
    fn test_load_surface_assigns_row_ids() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "dps.csv",
            "SITEID;YKR_ID;SPUT;AFT;SF;RFA;AREA\n\
             s1;5790;building;residential;0.9;0.3;120\n\
             s1;5791;land;other;0.1;0.7;400\n",
        );
        let cfg = SurfaceInput {
            path,
            ..SurfaceInput::default()
        };

        let units = load_surface(&cfg, b';').unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id, 1);
        assert_eq!(units[1].id, 2);
        assert_eq!(units[1].zone.as_str(), "5791");
        assert_eq!(units[1].rfa, 0.7);
    }

    #[test]
    fn test_negative_rfa_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "dps.csv",
            "SITEID,YKR_ID,SPUT,AFT,SF,RFA\ns1,1,building,work,1.0,-0.2\n",
        );
        let cfg = SurfaceInput {
            path,
            ..SurfaceInput::default()
        };
        match load_surface(&cfg, b',') {
            Err(InputError::InvalidValue { column, value, .. }) => {
                assert_eq!(column, "RFA");
                assert_eq!(value, "-0.2");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_counts_read_as_zero() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "cdr.csv", "SITEID,H0m,H1m\na,12,\nb,,3.5\n");
        let cfg = CountsInput {
            path,
            ..CountsInput::default()
        };

        let cells = load_counts(&cfg, range(0, 1), b',').unwrap();
        assert_eq!(cells[0].counts.get(h(1)), 0.0);
        assert_eq!(cells[1].counts.get(h(0)), 0.0);
        assert_eq!(cells[1].counts.get(h(1)), 3.5);
    }

    #[test]
    fn test_zones_with_geometry() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "tz.csv",
            "YKR_ID,geometry\n5790,\"POLYGON ((0 0, 250 0, 250 250, 0 0))\"\n",
        );
        let cfg = ZonesInput {
            path,
            ..ZonesInput::default()
        };
        let zones = load_zones(&cfg, b',').unwrap();
        assert_eq!(zones[0].key.as_str(), "5790");
        assert!(zones[0].geometry.as_deref().unwrap().starts_with("POLYGON"));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let cfg = ZonesInput {
            path: "/definitely/not/here.csv".into(),
            ..ZonesInput::default()
        };
        assert!(matches!(
            load_zones(&cfg, b','),
            Err(InputError::Unreadable { .. })
        ));
    }
}
