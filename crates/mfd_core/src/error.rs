use std::fmt;
use thiserror::Error;

use crate::model::Hour;

/// Which input table an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TableKind {
    TimeUse,
    Surface,
    Counts,
    Zones,
    FloorArea,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TableKind::TimeUse => "time-use profile",
            TableKind::Surface => "physical surface",
            TableKind::Counts => "coverage cell counts",
            TableKind::Zones => "target zone",
            TableKind::FloorArea => "floor area parts",
        };
        f.write_str(name)
    }
}

/// Fatal input problems. Raised before the hour loop starts.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("{table} table is missing required column `{column}`")]
    MissingColumn { table: TableKind, column: String },

    #[error("{table} table, row {row}: invalid {column} value '{value}'")]
    InvalidValue {
        table: TableKind,
        row: u32,
        column: String,
        value: String,
    },

    #[error("{table} table has duplicate key {key} (rows {first_row} and {row})")]
    DuplicateKey {
        table: TableKind,
        key: String,
        first_row: u32,
        row: u32,
    },

    #[error("cannot read {table} table at {path}: {message}")]
    Unreadable {
        table: TableKind,
        path: String,
        message: String,
    },

    #[error("{table} table is empty")]
    EmptyTable { table: TableKind },
}

impl InputError {
    /// True for errors about the table layout itself rather than its values.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, InputError::MissingColumn { .. })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("failed to emit hour {hour}: {message}")]
    Emit { hour: Hour, message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
