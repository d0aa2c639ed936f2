//! Common errors across the cmip5-rs crate
use std::path::PathBuf;

use crate::nested::Key;

/// Errors from looking up or assigning key paths in a [`crate::nested::KeyPathStore`]
#[derive(Debug, thiserror::Error)]
pub enum NestedError {
    #[error("This key does not exist: {key}")]
    NotFound { key: Key },
    #[error("A key path must contain at least one key")]
    InvalidKeyPath,
    #[error("The key path ({}) leads to a nested level, not a value", join_keys(.path))]
    NotALeaf { path: Vec<Key> },
}

fn join_keys(path: &[Key]) -> String {
    path.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

/// Errors from parsing CMIP5 file names
#[derive(Debug, thiserror::Error)]
pub enum FilenameError {
    #[error("Path {} has no file name", .0.display())]
    NoFileName(PathBuf),
    #[error("File name of {} is not valid unicode", .0.display())]
    NonUnicodeName(PathBuf),
    #[error("File name '{name}' has {n} underscore-separated fields, expected at least 5 (variable_table_model_experiment_ensemble)")]
    TooFewFields { name: String, n: usize },
    #[error("File name '{name}' has {n} underscore-separated fields, expected at most 6 (variable_table_model_experiment_ensemble_period)")]
    TooManyFields { name: String, n: usize },
    #[error("File name '{name}' has an empty {field} field")]
    EmptyField { name: String, field: &'static str },
    #[error("Period '{period}' is not in the format YYYYMM-YYYYMM[-clim]: {reason}")]
    BadPeriod { period: String, reason: String },
}

/// Errors from clustering files or building CDO commands
#[derive(Debug, thiserror::Error)]
pub enum CmdError {
    #[error("Files don't all belong to the same simulation and variable: found {} different values for {field} ({})", .values.len(), .values.join(", "))]
    InconsistentGroup { field: &'static str, values: Vec<String> },
    #[error("File {0} has no time period in its name")]
    MissingPeriod(String),
    #[error("Climatology file found: {0}")]
    ClimatologyInput(String),
    #[error("The year selection {0} does not include any year covered by the input files")]
    EmptyYearSlice(String),
    #[error("Years {y1} to {y2} cannot be represented as dates")]
    BadYears { y1: i32, y2: i32 },
    #[error("No input files given")]
    NoFiles,
    #[error("Error globbing for netCDF files in {}: {reason}", .dir.display())]
    Glob { dir: PathBuf, reason: String },
    #[error(transparent)]
    Filename(#[from] FilenameError),
    #[error(transparent)]
    Nested(#[from] NestedError),
}

/// Errors loading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file {} does not exist", .0.display())]
    MissingFile(PathBuf),
    #[error("Could not load configuration: {0}")]
    Load(#[from] figment::Error),
}

/// Errors from building ESGF queries or pruning wget scripts
#[derive(Debug, thiserror::Error)]
pub enum EsgError {
    #[error("Query criterion name must not be empty")]
    EmptyCriterion,
    #[error("Query criterion '{0}' is not in the form key=value")]
    BadCriterion(String),
    #[error("'{0}' is not a valid YYYYMM date limit")]
    BadDateLimit(String),
}
