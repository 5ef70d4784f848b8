//! Floor-area parts CSV → physical surface CSV
//!
//! Each input row is one building or land part already intersected with a
//! coverage cell. Every input column is passed through; the estimated floor
//! area and the RFA column are appended (or overwritten when present).

use anyhow::{Context, Result};
use mfd_core::floor_area::{estimate_floor_area, relative_floor_areas, FloorAreaRecord};
use mfd_core::{CellKey, MfdConfig, TableKind};
use rustc_hash::FxHashSet;
use std::path::Path;
use tracing::info;

use crate::csv_input::{for_each_row, open_table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloorAreaStats {
    pub parts: usize,
    pub cells: usize,
    pub land_parts: usize,
    /// Cells whose parts all have zero floor area (RFA 0)
    pub zero_area_cells: usize,
}

pub fn build_surface_table(
    config: &MfdConfig,
    parts_csv: &Path,
    output_csv: &Path,
) -> Result<FloorAreaStats> {
    let table = TableKind::FloorArea;
    let surface = &config.inputs.surface;
    let calibration = &config.floor_area;
    let columns = &calibration.columns;
    let delimiter = config.delimiter_byte();

    let (mut reader, header) = open_table(table, parts_csv, delimiter)?;
    let cell = header.require(&surface.cell_key_column)?;
    let sput = header.require(&surface.spatial_unit_column)?;
    let aft = header.require(&surface.activity_function_column)?;
    let footprint = header.require(&columns.footprint_area_column)?;
    let recorded = header.position(&columns.floor_area_column);
    let floors = header.position(&columns.floor_count_column);
    let matched = header.position(&columns.matched_area_column);

    let mut rows: Vec<csv::StringRecord> = Vec::new();
    let mut records: Vec<FloorAreaRecord> = Vec::new();
    for_each_row(table, parts_csv, &mut reader, &header, |row| {
        records.push(FloorAreaRecord {
            cell: CellKey::new(row.key(cell)?),
            spatial_unit: row.key(sput)?,
            activity_function: row.key(aft)?,
            footprint_area: row.number(footprint, None)?,
            recorded_floor_area: row.optional_number(recorded)?,
            floor_count: row.optional_number(floors)?,
            matched_area: row.optional_number(matched)?,
        });
        rows.push(row.record.clone());
        Ok(())
    })?;

    let parts: Vec<(CellKey, f64)> = records
        .iter()
        .map(|rec| (rec.cell.clone(), estimate_floor_area(rec, calibration)))
        .collect();
    let rfa = relative_floor_areas(&parts);

    // Output header: input columns, then FA and RFA unless already present
    let mut out_header: Vec<String> = header.names().to_vec();
    let mut slot = |name: &str| match header.position(name) {
        Some(idx) => idx,
        None => {
            out_header.push(name.to_string());
            out_header.len() - 1
        }
    };
    let fa_idx = slot(&columns.estimated_floor_area_column);
    let rfa_idx = slot(&surface.rfa_column);

    if let Some(parent) = output_csv.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(output_csv)
        .with_context(|| format!("Failed to create output file: {}", output_csv.display()))?;
    writer.write_record(&out_header)?;

    for (i, record) in rows.iter().enumerate() {
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        fields.resize(out_header.len(), String::new());
        fields[fa_idx] = parts[i].1.to_string();
        fields[rfa_idx] = rfa[i].to_string();
        writer.write_record(&fields)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write output file: {}", output_csv.display()))?;

    let mut cells: FxHashSet<&CellKey> = FxHashSet::default();
    let mut nonzero: FxHashSet<&CellKey> = FxHashSet::default();
    for (cell, area) in &parts {
        cells.insert(cell);
        if *area > 0.0 {
            nonzero.insert(cell);
        }
    }

    let stats = FloorAreaStats {
        parts: records.len(),
        cells: cells.len(),
        land_parts: records
            .iter()
            .filter(|rec| rec.spatial_unit == calibration.land_label)
            .count(),
        zero_area_cells: cells.len() - nonzero.len(),
    };
    info!(
        parts = stats.parts,
        cells = stats.cells,
        zero_area_cells = stats.zero_area_cells,
        "surface table written"
    );
    Ok(stats)
}
