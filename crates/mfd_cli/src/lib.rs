//! MFD CLI Library
//!
//! CSV 입력 로딩, 시간별 ZROP CSV 출력, 실행 요약
//! CSV (four input tables) → MessagePack → LZ4 → SHA256 input cache

pub mod csv_input;
pub mod floor_area_table;
pub mod summary;
pub mod writer;

use anyhow::{Context, Result};
use mfd_core::{HourRange, InputSource, InputTables, MfdConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub use csv_input::CsvInputSource;
pub use floor_area_table::{build_surface_table, FloorAreaStats};
pub use summary::{HourEntry, RunMetadata};
pub use writer::{CsvZoneWriter, WrittenHour};

/// Bumped whenever the layout of [`CachedInputs`] changes
pub const INPUT_CACHE_SCHEMA: &str = "v1";

/// 캐시 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// 스키마 버전 (예: "v1")
    pub schema_version: String,
    /// SHA256 체크섬 (hex 문자열)
    pub checksum: String,
    /// 생성 시각 (RFC3339 형식)
    pub created_at: String,
    /// MessagePack 직렬화 크기 (bytes)
    pub original_size: u64,
    /// 압축 후 크기 (bytes)
    pub compressed_size: u64,
    /// 압축률 (압축 후 / 원본)
    pub compression_ratio: f64,
}

/// Parsed input tables as stored in the cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedInputs {
    pub schema_version: String,
    /// Hours whose columns were read; other hours are zero in the tables
    pub hours: HourRange,
    pub tables: InputTables,
}

impl CachedInputs {
    /// Tables for a run over `hours`, if the cache was built for them.
    pub fn tables_for(&self, hours: HourRange) -> Result<&InputTables> {
        if !(self.hours.contains(hours.start) && self.hours.contains(hours.end)) {
            anyhow::bail!(
                "cache covers hours {} but the run needs {}",
                self.hours,
                hours
            );
        }
        Ok(&self.tables)
    }
}

/// 입력 CSV 4개를 파싱하여 MessagePack+LZ4 캐시 빌드
///
/// # Arguments
///
/// * `config` - 입력 경로와 컬럼 이름, 시간 범위
/// * `output_msgpack_lz4` - 출력 MsgPack+LZ4 파일 경로
/// * `schema_version` - 스키마 버전 문자열
///
/// # Returns
///
/// 생성된 캐시의 메타데이터
pub fn build_input_cache(
    config: &MfdConfig,
    output_msgpack_lz4: &Path,
    schema_version: &str,
) -> Result<CacheMetadata> {
    // 1. CSV 파싱
    let source = CsvInputSource::new(config.delimiter_byte());
    let tables = source
        .load(&config.inputs, config.hours)
        .context("Failed to load input tables")?;

    let cached = CachedInputs {
        schema_version: schema_version.to_string(),
        hours: config.hours,
        tables,
    };

    // 2. MessagePack 직렬화
    let msgpack_bytes =
        rmp_serde::to_vec(&cached).context("Failed to serialize inputs to MessagePack")?;
    let original_size = msgpack_bytes.len() as u64;

    // 3. LZ4 압축 (크기 정보 포함)
    let compressed = lz4_flex::compress_prepend_size(&msgpack_bytes);
    let compressed_size = compressed.len() as u64;

    // 4. SHA256 체크섬 계산
    let checksum = sha256_hex(&compressed);

    // 5. 출력 파일 쓰기
    if let Some(parent) = output_msgpack_lz4.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    fs::write(output_msgpack_lz4, &compressed).with_context(|| {
        format!(
            "Failed to write output file: {}",
            output_msgpack_lz4.display()
        )
    })?;

    let compression_ratio = if original_size > 0 {
        compressed_size as f64 / original_size as f64
    } else {
        1.0
    };

    Ok(CacheMetadata {
        schema_version: schema_version.to_string(),
        checksum,
        created_at: chrono::Utc::now().to_rfc3339(),
        original_size,
        compressed_size,
        compression_ratio,
    })
}

/// 캐시 파일의 무결성 검증
pub fn verify_cache(cache_file: &Path, expected_checksum: &str) -> Result<bool> {
    let bytes = fs::read(cache_file)
        .with_context(|| format!("Failed to read cache file: {}", cache_file.display()))?;

    Ok(sha256_hex(&bytes) == expected_checksum)
}

/// Load an input cache.
///
/// Pipeline: Binary file → LZ4 decompress → MessagePack deserialize → CachedInputs
pub fn load_input_cache(cache_file: &Path) -> Result<CachedInputs> {
    let compressed = fs::read(cache_file)
        .with_context(|| format!("Failed to read cache file: {}", cache_file.display()))?;

    let msgpack_bytes =
        lz4_flex::decompress_size_prepended(&compressed).context("Failed to decompress LZ4")?;

    let cached: CachedInputs = rmp_serde::from_slice(&msgpack_bytes)
        .context("Failed to deserialize input cache from MessagePack")?;

    if cached.schema_version != INPUT_CACHE_SCHEMA {
        anyhow::bail!(
            "input cache schema {} is not supported (expected {})",
            cached.schema_version,
            INPUT_CACHE_SCHEMA
        );
    }

    Ok(cached)
}

/// SHA256 of `bytes` as lowercase hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Human-readable byte size formatting
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfd_core::Hour;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Four small input files plus a config pointing at them
    pub(crate) fn write_inputs(dir: &TempDir) -> MfdConfig {
        let file = |name: &str, body: &str| -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            path
        };

        let mut config = MfdConfig::default();
        config.hours = HourRange::new(Hour::new(8).unwrap(), Hour::new(9).unwrap()).unwrap();
        config.inputs.time_use.path = file(
            "time_use.csv",
            "Spatial_unit,Activity_function_type,Seasonal_factor,H8t,H9t\n\
             building,residential,0.9,0.6,0.5\n\
             building,work,1.0,0.1,0.2\n",
        );
        config.inputs.surface.path = file(
            "surface.csv",
            "SITEID,YKR_ID,SPUT,AFT,SF,RFA\n\
             s1,5790,building,residential,0.9,0.3\n\
             s1,5791,building,work,1.0,0.7\n\
             s2,5791,building,work,1.0,1.0\n",
        );
        config.inputs.counts.path = file("counts.csv", "SITEID,H8m,H9m\ns1,10,40\ns2,30,60\n");
        config.inputs.zones.path = file(
            "zones.csv",
            "YKR_ID,geometry\n5789,POLYGON EMPTY\n5790,POLYGON EMPTY\n5791,POLYGON EMPTY\n",
        );
        config.output.dir = dir.path().join("out");
        config
    }

    #[test]
    fn test_build_verify_and_load_input_cache() -> Result<()> {
        let dir = TempDir::new()?;
        let config = write_inputs(&dir);
        let cache_path = dir.path().join("cache").join("inputs.msgpack.lz4");

        let meta = build_input_cache(&config, &cache_path, INPUT_CACHE_SCHEMA)?;
        assert_eq!(meta.schema_version, INPUT_CACHE_SCHEMA);
        assert!(meta.compressed_size > 0);
        assert!(verify_cache(&cache_path, &meta.checksum)?);
        assert!(!verify_cache(&cache_path, "0000")?);

        let cached = load_input_cache(&cache_path)?;
        assert_eq!(cached.hours, config.hours);
        assert_eq!(cached.tables.units.len(), 3);
        assert_eq!(cached.tables.cells[1].counts.get(Hour::new(9).unwrap()), 60.0);
        assert_eq!(cached.tables.zones.len(), 3);

        Ok(())
    }

    #[test]
    fn test_cache_rejects_hours_outside_build_range() -> Result<()> {
        let dir = TempDir::new()?;
        let config = write_inputs(&dir);
        let cache_path = dir.path().join("inputs.msgpack.lz4");
        build_input_cache(&config, &cache_path, INPUT_CACHE_SCHEMA)?;
        let cached = load_input_cache(&cache_path)?;

        assert!(cached.tables_for(HourRange::parse("9").unwrap()).is_ok());
        assert!(cached.tables_for(HourRange::parse("7-9").unwrap()).is_err());
        Ok(())
    }

    #[test]
    fn test_old_schema_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let config = write_inputs(&dir);
        let cache_path = dir.path().join("inputs.msgpack.lz4");
        build_input_cache(&config, &cache_path, "v0")?;
        assert!(load_input_cache(&cache_path).is_err());
        Ok(())
    }

    #[test]
    fn test_csv_run_writes_each_hour() -> Result<()> {
        let dir = TempDir::new()?;
        let config = write_inputs(&dir);
        let source = CsvInputSource::new(config.delimiter_byte());
        let writer = CsvZoneWriter::from_config(&config);

        let mut orchestrator = mfd_core::Orchestrator::new(config.clone())?;
        let summary = orchestrator.run(&source, &writer)?;
        assert_eq!(orchestrator.state(), mfd_core::RunState::Done);
        assert_eq!(summary.hours.len(), 2);

        let h9 = config.output.file_for(Hour::new(9).unwrap());
        let mut reader = csv::Reader::from_path(&h9)?;
        let rows: Vec<(i64, f64)> = reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                (r[0].parse().unwrap(), r[1].parse().unwrap())
            })
            .collect();

        // 5789 has no units and is omitted
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 5790);
        assert!((rows[0].1 - 0.4 * 0.135 / 0.275).abs() < 1e-9);
        assert!((rows[1].1 - (0.4 * 0.14 / 0.275 + 0.6)).abs() < 1e-9);

        let meta = RunMetadata::from_summary(config.hours, None, &summary);
        assert_eq!(meta.entries[1].checksum, sha256_hex(&fs::read(&h9)?));
        assert!(meta.total_issues().is_clean());
        Ok(())
    }

    #[test]
    fn test_cached_run_matches_csv_run() -> Result<()> {
        let dir = TempDir::new()?;
        let mut config = write_inputs(&dir);
        let cache_path = dir.path().join("inputs.msgpack.lz4");
        build_input_cache(&config, &cache_path, INPUT_CACHE_SCHEMA)?;

        let collect = |tables: Option<&InputTables>, config: &MfdConfig| -> Result<_> {
            let sink = mfd_core::CollectSink::new();
            let mut orchestrator = mfd_core::Orchestrator::new(config.clone())?;
            match tables {
                Some(tables) => orchestrator.run_tables(tables, &sink)?,
                None => orchestrator.run(&CsvInputSource::new(b','), &sink)?,
            };
            Ok(sink.into_results())
        };

        config.parallel = false;
        let cached = load_input_cache(&cache_path)?;
        let from_cache = collect(Some(cached.tables_for(config.hours)?), &config)?;
        let from_csv = collect(None, &config)?;
        assert_eq!(from_cache, from_csv);
        Ok(())
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0.00 B");
        assert_eq!(human_bytes(1024), "1.00 KB");
        assert_eq!(human_bytes(1536), "1.50 KB");
        assert_eq!(human_bytes(1024 * 1024), "1.00 MB");
    }
}
