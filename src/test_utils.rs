use std::path::PathBuf;

/// Directory holding the files used by the unit tests. The netCDF files in
/// it are empty; only their names matter.
pub(crate) fn test_data_dir() -> PathBuf {
    let crate_root = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(crate_root).join("test-data")
}
