//! Parsing and formatting of CMIP5 dataset file names.
//!
//! CMIP5 files follow the naming convention
//! `variable_table_model_experiment_ensemble[_period[-clim]].nc`, for example
//! `tas_Amon_HadCM3_historical_r1i1p1_185001-200512.nc`. The period is given
//! as `YYYYMM-YYYYMM`, and files holding a climatology computed over that
//! period carry a third component starting with `clim`.
use std::{fmt::Display, path::Path, str::FromStr};

use chrono::{Datelike, NaiveDate};

use crate::error::FilenameError;

pub const NC_EXTENSION: &str = ".nc";

/// The names of the fields that identify a simulation, in file name order.
pub const IDENTITY_FIELDS: [&str; 5] = ["variable", "table", "model", "experiment", "ensemble"];

/// The time span covered by a file, plus an optional climatology tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Period {
    /// First day of the first month in the file
    pub start: NaiveDate,
    /// First day of the last month in the file
    pub end: NaiveDate,
    /// Climatology tag (e.g. "clim" or "clim<f50>"), `None` for regular time series
    pub clim: Option<String>,
}

impl Period {
    /// Create a period from a start and end year and month. Returns `None`
    /// if either month is not in 1 to 12.
    pub fn new(start_year: i32, start_month: u32, end_year: i32, end_month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(start_year, start_month, 1)?;
        let end = NaiveDate::from_ymd_opt(end_year, end_month, 1)?;
        Some(Self { start, end, clim: None })
    }

    /// The period from January of `start_year` to December of `end_year`.
    /// Returns `None` if either year is outside the range `chrono` can represent.
    pub fn years(start_year: i32, end_year: i32) -> Option<Self> {
        Self::new(start_year, 1, end_year, 12)
    }

    /// Combine the start of `self` with the end of `other`.
    pub fn through(&self, other: &Period) -> Self {
        Self { start: self.start, end: other.end, clim: None }
    }

    pub fn with_clim<S: ToString>(mut self, clim: S) -> Self {
        self.clim = Some(clim.to_string());
        self
    }

    pub fn is_climatology(&self) -> bool {
        self.clim.is_some()
    }

    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    pub fn end_year(&self) -> i32 {
        self.end.year()
    }
}

fn parse_yyyymm(s: &str, full: &str) -> Result<NaiveDate, FilenameError> {
    let bad = |reason: String| FilenameError::BadPeriod { period: full.to_string(), reason };

    if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad(format!("'{s}' must be exactly 6 digits")));
    }

    NaiveDate::parse_from_str(&format!("{s}01"), "%Y%m%d")
        .map_err(|e| bad(format!("'{s}' is not a valid year and month ({e})")))
}

impl FromStr for Period {
    type Err = FilenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let (start, end, clim) = match parts.as_slice() {
            [start, end] => (start, end, None),
            [start, end, clim] if !clim.is_empty() => (start, end, Some(clim.to_string())),
            _ => {
                return Err(FilenameError::BadPeriod {
                    period: s.to_string(),
                    reason: format!("expected 2 or 3 '-' separated parts, got {}", parts.len()),
                })
            }
        };

        let start = parse_yyyymm(start, s)?;
        let end = parse_yyyymm(end, s)?;
        Ok(Self { start, end, clim })
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%Y%m"), self.end.format("%Y%m"))?;
        if let Some(clim) = &self.clim {
            write!(f, "-{clim}")?;
        }
        Ok(())
    }
}

/// The components of a CMIP5 file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cmip5Filename {
    pub variable: String,
    /// The MIP table, e.g. "Amon" or "fx"
    pub table: String,
    pub model: String,
    pub experiment: String,
    pub ensemble: String,
    pub period: Option<Period>,
}

impl Cmip5Filename {
    /// Parse the base name of `path`; leading directories are ignored.
    pub fn from_path(path: &Path) -> Result<Self, FilenameError> {
        let name = path
            .file_name()
            .ok_or_else(|| FilenameError::NoFileName(path.to_path_buf()))?
            .to_str()
            .ok_or_else(|| FilenameError::NonUnicodeName(path.to_path_buf()))?;
        name.parse()
    }

    /// The fields that identify the simulation and variable, paired with
    /// their names. This is the key path used to cluster files.
    pub fn identity(&self) -> [(&'static str, &str); 5] {
        [
            (IDENTITY_FIELDS[0], self.variable.as_str()),
            (IDENTITY_FIELDS[1], self.table.as_str()),
            (IDENTITY_FIELDS[2], self.model.as_str()),
            (IDENTITY_FIELDS[3], self.experiment.as_str()),
            (IDENTITY_FIELDS[4], self.ensemble.as_str()),
        ]
    }

    /// True if `other` only differs from `self` in its period.
    pub fn same_simulation(&self, other: &Cmip5Filename) -> bool {
        self.identity() == other.identity()
    }

    pub fn with_period(mut self, period: Option<Period>) -> Self {
        self.period = period;
        self
    }

    /// Set the climatology tag. Has no effect on a file name without a period,
    /// since the tag is written as part of the period.
    pub fn with_clim<S: ToString>(mut self, clim: S) -> Self {
        if let Some(p) = self.period.take() {
            self.period = Some(p.with_clim(clim));
        }
        self
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Cmip5Filename {
    type Err = FilenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stem = s.strip_suffix(NC_EXTENSION).unwrap_or(s);
        let fields: Vec<&str> = stem.split('_').collect();

        if fields.len() < 5 {
            return Err(FilenameError::TooFewFields { name: s.to_string(), n: fields.len() });
        } else if fields.len() > 6 {
            return Err(FilenameError::TooManyFields { name: s.to_string(), n: fields.len() });
        }

        for (field, name) in fields.iter().zip(IDENTITY_FIELDS.iter()) {
            if field.is_empty() {
                return Err(FilenameError::EmptyField { name: s.to_string(), field: *name });
            }
        }

        let period = fields.get(5).map(|p| p.parse::<Period>()).transpose()?;

        Ok(Self {
            variable: fields[0].to_string(),
            table: fields[1].to_string(),
            model: fields[2].to_string(),
            experiment: fields[3].to_string(),
            ensemble: fields[4].to_string(),
            period,
        })
    }
}

impl Display for Cmip5Filename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.variable, self.table, self.model, self.experiment, self.ensemble
        )?;
        if let Some(period) = &self.period {
            write!(f, "_{period}")?;
        }
        write!(f, "{NC_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_name() {
        let fname: Cmip5Filename = "tas_Amon_HADCM3_historical_r1i1p1_185001-200512.nc".parse().unwrap();
        assert_eq!(fname.variable, "tas");
        assert_eq!(fname.table, "Amon");
        assert_eq!(fname.model, "HADCM3");
        assert_eq!(fname.experiment, "historical");
        assert_eq!(fname.ensemble, "r1i1p1");

        let period = fname.period.unwrap();
        assert_eq!(period.start, NaiveDate::from_ymd_opt(1850, 1, 1).unwrap());
        assert_eq!(period.end, NaiveDate::from_ymd_opt(2005, 12, 1).unwrap());
        assert!(!period.is_climatology());
    }

    #[test]
    fn test_parse_from_path() {
        let fname = Cmip5Filename::from_path(Path::new("/data/cmip5/orog_fx_CCSM4_historical_r0i0p0.nc")).unwrap();
        assert_eq!(fname.table, "fx");
        assert_eq!(fname.ensemble, "r0i0p0");
        assert!(fname.period.is_none());
    }

    #[test]
    fn test_parse_climatology() {
        let fname: Cmip5Filename = "sic_OImon_CCSM4_rcp85_r1i1p1_204001-206912-clim<f50>.nc".parse().unwrap();
        let period = fname.period.as_ref().unwrap();
        assert_eq!(period.clim.as_deref(), Some("clim<f50>"));
        assert_eq!(period.start_year(), 2040);
        assert_eq!(period.end_year(), 2069);
    }

    #[rstest]
    #[case("tas_Amon_HADCM3_historical_r1i1p1_185001-200512.nc")]
    #[case("orog_fx_CCSM4_historical_r0i0p0.nc")]
    #[case("sic_OImon_CCSM4_rcp85_r1i1p1_204001-206912-clim.nc")]
    fn test_name_survives_parsing(#[case] name: &str) {
        let fname: Cmip5Filename = name.parse().unwrap();
        assert_eq!(fname.file_name(), name);
    }

    #[rstest]
    #[case("tas_Amon_HADCM3.nc")]
    #[case("tas_Amon_HADCM3_historical_r1i1p1_185001-200512_extra.nc")]
    #[case("tas__HADCM3_historical_r1i1p1.nc")]
    #[case("tas_Amon_HADCM3_historical_r1i1p1_1850-2005.nc")]
    #[case("tas_Amon_HADCM3_historical_r1i1p1_185013-200512.nc")]
    #[case("tas_Amon_HADCM3_historical_r1i1p1_185001.nc")]
    fn test_bad_names(#[case] name: &str) {
        assert!(name.parse::<Cmip5Filename>().is_err(), "{name} should not parse");
    }

    #[test]
    fn test_clim_requires_period() {
        let fname: Cmip5Filename = "orog_fx_CCSM4_historical_r0i0p0.nc".parse().unwrap();
        assert_eq!(fname.with_clim("clim").file_name(), "orog_fx_CCSM4_historical_r0i0p0.nc");

        let fname: Cmip5Filename = "tas_Amon_CCSM4_rcp85_r1i1p1_200601-210012.nc".parse().unwrap();
        let fname = fname.with_period(Period::years(2040, 2069)).with_clim("clim");
        assert_eq!(fname.file_name(), "tas_Amon_CCSM4_rcp85_r1i1p1_204001-206912-clim.nc");
    }

    #[test]
    fn test_years_out_of_range() {
        assert!(Period::years(2040, 2069).is_some());
        assert!(Period::years(0, 300_000).is_none());
        assert!(Period::years(-300_000, 2000).is_none());
    }

    #[test]
    fn test_same_simulation() {
        let a: Cmip5Filename = "tas_Amon_CCSM4_rcp85_r1i1p1_200601-205012.nc".parse().unwrap();
        let b: Cmip5Filename = "tas_Amon_CCSM4_rcp85_r1i1p1_205101-210012.nc".parse().unwrap();
        let c: Cmip5Filename = "tas_Amon_CCSM4_rcp85_r2i1p1_205101-210012.nc".parse().unwrap();
        assert!(a.same_simulation(&b));
        assert!(!a.same_simulation(&c));
    }

    #[test]
    fn test_period_through() {
        let a: Period = "200601-205012".parse().unwrap();
        let b: Period = "205101-210012".parse().unwrap();
        assert_eq!(a.through(&b).to_string(), "200601-210012");
    }
}
