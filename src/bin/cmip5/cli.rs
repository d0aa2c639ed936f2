//! Command line interface definitions
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use cmip5_rs::{cmds::YearSelection, esg::Endpoint};

/// Utilities to manage collections of CMIP5 netCDF files.
///
/// Commands that operate on files print shell commands (for CDO) to stdout
/// rather than running them, so they can be reviewed before being piped to
/// a shell. Log messages go to stderr.
#[derive(Debug, Parser)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) command: Commands,

    /// Path to a TOML configuration file. Settings may also be given as
    /// environment variables prefixed with CMIP5_, e.g. CMIP5_ESG_NODE.
    #[clap(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// List the simulations found in a directory and the files in each.
    Cluster(ClusterCli),
    /// Print the commands that concatenate time slices of the same simulation.
    Concat(ConcatCli),
    /// Print the command that computes a monthly climatology.
    Clim(ClimCli),
    /// Print the components of CMIP5 file names.
    Name(NameCli),
    /// Print the name of the file that concatenating the given files would create.
    AggName(AggNameCli),
    /// Print an ESGF query URL.
    Url(UrlCli),
    /// Remove files outside a period from an ESGF wget script.
    PruneWget(PruneWgetCli),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ClusterCli {
    /// Directory containing the netCDF files
    pub(crate) dir: PathBuf,

    /// Print the clusters as JSON instead of a table
    #[clap(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ConcatCli {
    /// Directory containing the netCDF files
    pub(crate) dir: PathBuf,

    /// Directory in which the concatenated files will be written. Simulations
    /// whose concatenated file already exists there are skipped.
    #[clap(short, long, default_value = ".")]
    pub(crate) out_dir: PathBuf,

    /// Do not print the commands that remove the original files
    #[clap(long)]
    pub(crate) no_rm: bool,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ClimCli {
    /// Input files, all time slices of the same simulation, in time order
    #[clap(required = true)]
    pub(crate) files: Vec<PathBuf>,

    /// Years to average over, either as a range "Y1-Y2" or as a slice
    /// "START:STOP" into the years covered by the files (e.g. "-30:" for
    /// the last 30 years).
    #[clap(short, long, allow_hyphen_values = true)]
    pub(crate) years: Option<YearSelection>,

    /// Tag appended to "clim" in the default output name, to tell apart
    /// climatologies over different periods.
    #[clap(short, long, default_value = "")]
    pub(crate) tag: String,

    /// Output file. By default, derived from the first input file and
    /// placed in the current directory.
    #[clap(short, long)]
    pub(crate) output: Option<PathBuf>,

    /// Options passed to CDO before the operator. Overrides the configured
    /// cdo_options.
    #[clap(long, allow_hyphen_values = true)]
    pub(crate) options: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct NameCli {
    #[clap(required = true)]
    pub(crate) files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct AggNameCli {
    /// Files to concatenate, in time order
    #[clap(required = true)]
    pub(crate) files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct UrlCli {
    /// Which service to query: search, wget or aggregation
    pub(crate) endpoint: Endpoint,

    /// Criteria as key=value. Comma-separated or repeated values are
    /// combined with OR; "true" and "false" are booleans.
    pub(crate) criteria: Vec<String>,

    /// ESGF index node to query. Overrides the configured esg_node.
    #[clap(long)]
    pub(crate) node: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct PruneWgetCli {
    /// The wget script downloaded from ESGF
    pub(crate) script: PathBuf,

    /// Remove files ending on or before this month (YYYYMM)
    #[clap(long)]
    pub(crate) start: Option<String>,

    /// Remove files starting on or after this month (YYYYMM)
    #[clap(long)]
    pub(crate) end: Option<String>,

    /// Where to write the pruned script. Printed to stdout if not given.
    #[clap(short, long)]
    pub(crate) output: Option<PathBuf>,
}
