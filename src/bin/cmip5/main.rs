use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use cmip5_rs::{
    cmds::{self, Clusters},
    config::Config,
    esg::{self, SearchQuery},
    filename::Cmip5Filename,
    logging::init_logging,
};
use error_stack::ResultExt;
use itertools::Itertools;
use log::info;
use tabled::Tabled;

use crate::{
    cli::{AggNameCli, ClimCli, Cli, ClusterCli, Commands, ConcatCli, NameCli, PruneWgetCli, UrlCli},
    error::CliError,
};

mod cli;
mod error;

fn main() -> ExitCode {
    let clargs = Cli::parse();
    init_logging(clargs.verbosity.log_level_filter());
    if let Err(e) = main_inner(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_inner(clargs: Cli) -> error_stack::Result<(), CliError> {
    let config = Config::load(clargs.config.as_deref())
        .change_context_lazy(|| CliError::use_error("Could not load the configuration"))?;

    match clargs.command {
        Commands::Cluster(args) => cluster(args, &config),
        Commands::Concat(args) => concat(args, &config),
        Commands::Clim(args) => clim(args, &config),
        Commands::Name(args) => name(args),
        Commands::AggName(args) => agg_name(args),
        Commands::Url(args) => url(args, &config),
        Commands::PruneWget(args) => prune_wget(args),
    }
}

#[derive(Debug, Tabled)]
struct ClusterRow {
    variable: String,
    table: String,
    model: String,
    experiment: String,
    ensemble: String,
    #[tabled(rename = "files")]
    nfiles: usize,
    #[tabled(rename = "first file")]
    first: String,
    #[tabled(rename = "last file")]
    last: String,
}

impl ClusterRow {
    fn new(keys: &[cmip5_rs::nested::Key], files: &[PathBuf]) -> Self {
        let key = |i: usize| keys.get(i).map(|k| k.to_string()).unwrap_or_default();
        let base_name = |p: Option<&PathBuf>| {
            p.and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        };

        Self {
            variable: key(0),
            table: key(1),
            model: key(2),
            experiment: key(3),
            ensemble: key(4),
            nfiles: files.len(),
            first: base_name(files.first()),
            last: base_name(files.last()),
        }
    }
}

fn cluster(args: ClusterCli, config: &Config) -> error_stack::Result<(), CliError> {
    let clusters: Clusters = cmds::cluster_time_slices(&args.dir, &config.skip_tables)
        .change_context_lazy(|| CliError::context("Error occurred while clustering files"))?;

    if args.json {
        let s = serde_json::to_string_pretty(&clusters)
            .change_context_lazy(|| CliError::context("Could not serialize the clusters to JSON"))?;
        println!("{s}");
    } else {
        let rows = clusters
            .iter()
            .map(|(keys, files)| ClusterRow::new(&keys, files))
            .collect_vec();
        let mut table = tabled::Table::new(rows);
        table.with(tabled::settings::style::Style::blank());
        println!("{table}");
    }

    info!("{} simulations found", clusters.size());
    Ok(())
}

fn concat(args: ConcatCli, config: &Config) -> error_stack::Result<(), CliError> {
    let plan = cmds::concatenate(&args.dir, &args.out_dir, &config.skip_tables)
        .change_context_lazy(|| CliError::context("Error occurred while building concatenation commands"))?;

    for cmd in plan.cat.iter() {
        println!("{cmd}");
    }

    if !args.no_rm {
        for cmd in plan.rm.iter() {
            println!("{cmd}");
        }
    }

    info!("{} simulations to concatenate", plan.cat.len());
    Ok(())
}

fn clim(args: ClimCli, config: &Config) -> error_stack::Result<(), CliError> {
    let options = args.options.as_deref().unwrap_or(&config.cdo_options);
    let cmd = cmds::monthly_clim(&args.files, args.output.as_deref(), args.years, &args.tag, options)
        .change_context_lazy(|| CliError::input_error("Could not build the climatology command"))?;

    match cmd {
        Some(cmd) => println!("{cmd}"),
        None => info!("None of the input files cover the requested years, nothing to do"),
    }
    Ok(())
}

fn name(args: NameCli) -> error_stack::Result<(), CliError> {
    for file in args.files.iter() {
        let fname = Cmip5Filename::from_path(file)
            .change_context_lazy(|| CliError::input_error(format!("Could not parse {}", file.display())))?;

        let period = fname.period.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{}: variable={} table={} model={} experiment={} ensemble={} period={period}",
            file.display(),
            fname.variable,
            fname.table,
            fname.model,
            fname.experiment,
            fname.ensemble,
        );
    }
    Ok(())
}

fn agg_name(args: AggNameCli) -> error_stack::Result<(), CliError> {
    let name = cmds::agg_file_name(&args.files)
        .change_context_lazy(|| CliError::input_error("Could not determine the aggregated file name"))?;
    println!("{name}");
    Ok(())
}

fn url(args: UrlCli, config: &Config) -> error_stack::Result<(), CliError> {
    let mut query = SearchQuery::new();
    for criterion in args.criteria.iter() {
        query
            .add_criterion_str(criterion)
            .change_context_lazy(|| CliError::use_error("Invalid query criterion"))?;
    }

    let node = args.node.as_deref().unwrap_or(&config.esg_node);
    println!("{}", query.url(node, args.endpoint));
    Ok(())
}

fn prune_wget(args: PruneWgetCli) -> error_stack::Result<(), CliError> {
    let script = std::fs::read_to_string(&args.script).change_context_lazy(|| {
        CliError::input_error(format!("Could not read {}", args.script.display()))
    })?;

    let pruned = esg::prune_wget(&script, args.start.as_deref(), args.end.as_deref())
        .change_context_lazy(|| CliError::use_error("Could not prune the wget script"))?;

    match &args.output {
        Some(out) => std::fs::write(out, pruned + "\n").change_context_lazy(|| {
            CliError::context(format!("Could not write {}", out.display()))
        })?,
        None => println!("{pruned}"),
    }
    Ok(())
}
