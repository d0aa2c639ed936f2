//! Shell commands for common operations on CMIP5 files.
//!
//! The commands rely on [CDO](https://code.mpimet.mpg.de/projects/cdo):
//!
//! - concatenate files holding consecutive time slices of one simulation, and
//! - compute monthly climatologies over a given range of years.
//!
//! Nothing here runs the commands. The functions only return the command
//! strings; it is up to the caller to launch them.
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use indexmap::IndexSet;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    error::CmdError,
    filename::{Cmip5Filename, Period, IDENTITY_FIELDS, NC_EXTENSION},
    nested::KeyPathStore,
};

/// Files grouped by variable, table, model, experiment and ensemble (in that
/// order). Each leaf holds the files of one simulation, sorted by name.
pub type Clusters = KeyPathStore<Vec<PathBuf>>;

/// Identify all netCDF files in `dir` that belong to the same simulation
/// and variable and could be concatenated along time.
///
/// Files with a MIP table listed in `skip_tables` (usually just "fx", which
/// has no time dimension) are ignored, as are files whose names do not follow
/// the CMIP5 convention.
pub fn cluster_time_slices(dir: &Path, skip_tables: &[String]) -> Result<Clusters, CmdError> {
    let pattern = format!("{}/*{NC_EXTENSION}", dir.display());
    let matches = glob::glob(&pattern).map_err(|e| CmdError::Glob {
        dir: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files = vec![];
    for entry in matches {
        let entry = entry.map_err(|e| CmdError::Glob {
            dir: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        files.push(entry);
    }

    debug!("Found {} netCDF files in {}", files.len(), dir.display());
    cluster_files(files, skip_tables)
}

/// Cluster an explicit list of files the same way as [`cluster_time_slices`].
pub fn cluster_files(mut files: Vec<PathBuf>, skip_tables: &[String]) -> Result<Clusters, CmdError> {
    files.sort();
    let mut clusters = Clusters::new();

    for path in files {
        let fname = match Cmip5Filename::from_path(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        if skip_tables.iter().any(|t| t == &fname.table) {
            debug!("Skipping {} because its table is {}", path.display(), fname.table);
            continue;
        }

        let [variable, table, model, experiment, ensemble] = fname.identity().map(|(_, v)| v);
        let simulations = clusters.obtain([variable, table, model, experiment]);
        if !simulations.contains([ensemble]) {
            simulations.set([ensemble], vec![])?;
        }
        simulations.get_leaf_mut([ensemble])?.push(path);
    }

    Ok(clusters)
}

/// Return the name of the file resulting from concatenating `files`, which
/// must be given in time order.
///
/// This is the name of the first file with its period extended to the end
/// of the last file's period. A single file keeps its own name.
pub fn agg_file_name<P: AsRef<Path>>(files: &[P]) -> Result<String, CmdError> {
    let (first, last) = match files {
        [] => return Err(CmdError::NoFiles),
        [only] => return Ok(Cmip5Filename::from_path(only.as_ref())?.file_name()),
        [first, .., last] => (first.as_ref(), last.as_ref()),
    };

    let first_name = Cmip5Filename::from_path(first)?;
    let last_name = Cmip5Filename::from_path(last)?;
    let start = require_period(&first_name, first)?;
    let end = require_period(&last_name, last)?;
    let period = start.through(end);
    Ok(first_name.with_period(Some(period)).file_name())
}

fn require_period<'f>(fname: &'f Cmip5Filename, path: &Path) -> Result<&'f Period, CmdError> {
    fname
        .period
        .as_ref()
        .ok_or_else(|| CmdError::MissingPeriod(path.display().to_string()))
}

/// Commands to concatenate the time slices of each simulation, plus the
/// commands to remove the original slices afterwards.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConcatPlan {
    pub cat: Vec<String>,
    pub rm: Vec<String>,
}

/// Build `cdo cat` commands for every simulation in `dir` split over more
/// than one file. Output files are placed in `out_dir`; simulations whose
/// output file already exists are skipped.
pub fn concatenate(dir: &Path, out_dir: &Path, skip_tables: &[String]) -> Result<ConcatPlan, CmdError> {
    let clusters = cluster_time_slices(dir, skip_tables)?;
    concat_commands(&clusters, out_dir)
}

/// Build the concatenation commands for already clustered files.
pub fn concat_commands(clusters: &Clusters, out_dir: &Path) -> Result<ConcatPlan, CmdError> {
    let mut plan = ConcatPlan::default();

    for (keys, files) in clusters.iter() {
        if files.len() < 2 {
            continue;
        }

        let ofile = out_dir.join(agg_file_name(files)?);
        if ofile.exists() {
            info!(
                "Not concatenating {} because {} already exists",
                keys.iter().join("/"),
                ofile.display()
            );
            continue;
        }

        let inputs = files.iter().map(|f| f.display()).join(" ");
        plan.cat.push(format!("cdo cat {inputs} {}", ofile.display()));
        plan.rm.push(format!("rm {inputs}"));
    }

    Ok(plan)
}

/// Which years to average over when computing a climatology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearSelection {
    /// An inclusive range of years.
    Range(i32, i32),

    /// A slice into the years covered by the input files, using the same
    /// rules as a Python slice: negative indices count from the end and
    /// missing bounds extend to the start or end.
    Slice { start: Option<isize>, stop: Option<isize> },
}

impl YearSelection {
    /// Resolve to an inclusive `(first, last)` pair of years given the first
    /// and last year covered by the data.
    pub fn resolve(&self, first_year: i32, last_year: i32) -> Result<(i32, i32), CmdError> {
        match *self {
            YearSelection::Range(y1, y2) => Ok((y1, y2)),
            YearSelection::Slice { start, stop } => {
                let n = (last_year - first_year + 1).max(0) as isize;
                let clamp = |i: isize| if i < 0 { (n + i).max(0) } else { i.min(n) };
                let i0 = start.map(clamp).unwrap_or(0);
                let i1 = stop.map(clamp).unwrap_or(n);
                if i0 >= i1 {
                    return Err(CmdError::EmptyYearSlice(self.to_string()));
                }
                Ok((first_year + i0 as i32, first_year + i1 as i32 - 1))
            }
        }
    }
}

impl Display for YearSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YearSelection::Range(y1, y2) => write!(f, "{y1}-{y2}"),
            YearSelection::Slice { start, stop } => {
                if let Some(i) = start {
                    write!(f, "{i}")?;
                }
                write!(f, ":")?;
                if let Some(i) = stop {
                    write!(f, "{i}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for YearSelection {
    type Err = String;

    /// Parse "Y1-Y2" as a range of years or "START:STOP" as a slice (either
    /// bound may be omitted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((start, stop)) = s.split_once(':') {
            let bound = |b: &str| -> Result<Option<isize>, String> {
                if b.trim().is_empty() {
                    Ok(None)
                } else {
                    b.trim()
                        .parse()
                        .map(Some)
                        .map_err(|e| format!("invalid slice bound '{b}': {e}"))
                }
            };
            return Ok(Self::Slice { start: bound(start)?, stop: bound(stop)? });
        }

        let (y1, y2) = s
            .split_once('-')
            .ok_or_else(|| format!("'{s}' must be a range of years (Y1-Y2) or a slice (START:STOP)"))?;
        let y1 = y1.trim().parse().map_err(|e| format!("invalid year '{y1}': {e}"))?;
        let y2 = y2.trim().parse().map_err(|e| format!("invalid year '{y2}': {e}"))?;
        Ok(Self::Range(y1, y2))
    }
}

/// Return the CDO command computing the monthly climatology of `inputs`.
///
/// `inputs` must be time slices of a single simulation and variable, in time
/// order. If `years` is given, only the files overlapping those years are
/// used and the command selects those years with `-seldate`. `ofile`
/// defaults to a name derived from the first input file, with the averaging
/// period and a `clim{tag}` suffix, in the current directory. `options` are
/// passed to CDO before the operator (e.g. "-f nc4").
///
/// Returns `Ok(None)` if no input file covers the requested years.
///
/// ```
/// use cmip5_rs::cmds::{monthly_clim, YearSelection};
///
/// let cmd = monthly_clim(
///     &["../data/sic_OImon_CCSM4_rcp85_r1i1p1_200601-210012.nc"],
///     None,
///     Some(YearSelection::Range(2040, 2069)),
///     "<f50>",
///     "",
/// ).unwrap().unwrap();
/// assert_eq!(
///     cmd,
///     "cdo ymonavg -seldate,2040-01-01,2069-12-31 ../data/sic_OImon_CCSM4_rcp85_r1i1p1_200601-210012.nc sic_OImon_CCSM4_rcp85_r1i1p1_204001-206912-clim<f50>.nc"
/// );
/// ```
pub fn monthly_clim<P: AsRef<Path>>(
    inputs: &[P],
    ofile: Option<&Path>,
    years: Option<YearSelection>,
    tag: &str,
    options: &str,
) -> Result<Option<String>, CmdError> {
    if inputs.is_empty() {
        return Err(CmdError::NoFiles);
    }

    let names = inputs
        .iter()
        .map(|p| Cmip5Filename::from_path(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    check_same_simulation(&names)?;

    let mut periods = vec![];
    for (path, name) in inputs.iter().zip(names.iter()) {
        let period = require_period(name, path.as_ref())?;
        if period.is_climatology() {
            return Err(CmdError::ClimatologyInput(path.as_ref().display().to_string()));
        }
        periods.push(period);
    }

    let first_year = periods[0].start_year();
    let last_year = periods[periods.len() - 1].end_year();
    let years = years.map(|y| y.resolve(first_year, last_year)).transpose()?;

    let selected: Vec<usize> = (0..inputs.len())
        .filter(|&i| match years {
            Some((y1, y2)) => periods[i].end_year() >= y1 && periods[i].start_year() <= y2,
            None => true,
        })
        .collect();

    let Some(&first_selected) = selected.first() else {
        info!("No input file overlaps the years {years:?}, no climatology command created");
        return Ok(None);
    };

    let ofile = match ofile {
        Some(p) => p.display().to_string(),
        None => {
            let (y1, y2) = years.unwrap_or((first_year, last_year));
            let period = Period::years(y1, y2).ok_or(CmdError::BadYears { y1, y2 })?;
            names[first_selected]
                .clone()
                .with_period(Some(period))
                .with_clim(format!("clim{tag}"))
                .file_name()
        }
    };

    let mut cmd = vec!["cdo".to_string()];
    if !options.trim().is_empty() {
        cmd.push(options.trim().to_string());
    }
    cmd.push("ymonavg".to_string());

    if let Some((y1, y2)) = years {
        cmd.push(format!("-seldate,{y1}-01-01,{y2}-12-31"));
    }

    if selected.len() > 1 {
        cmd.push("-cat".to_string());
    }
    cmd.extend(selected.iter().map(|&i| inputs[i].as_ref().display().to_string()));
    cmd.push(ofile);

    Ok(Some(cmd.join(" ")))
}

fn check_same_simulation(names: &[Cmip5Filename]) -> Result<(), CmdError> {
    for (i, field) in IDENTITY_FIELDS.into_iter().enumerate() {
        let values: IndexSet<&str> = names.iter().map(|n| n.identity()[i].1).collect();
        if values.len() > 1 {
            return Err(CmdError::InconsistentGroup {
                field,
                values: values.into_iter().map(|v| v.to_string()).collect(),
            });
        }
    }
    Ok(())
}
