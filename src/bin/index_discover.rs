//! Run every configured query and report the composite indexes they need.
//!
//! Queries go through either a replay file of canned outcomes (`--replay`) or
//! an external executor program (`--exec`). The report is always written;
//! the merged catalog only with `--write-catalog`. Exits 1 when any query
//! needs an index so CI can gate on it.

use anyhow::{Context, Result, bail};
use indexsmith::{
    CommandExecutor, DiscoveryConfig, QueryExecutor, ReplayExecutor, default_catalog_path,
    default_config_path, default_report_path, find_project_root, init_logging, load_catalog,
    run_discovery, save_catalog,
};
use log::info;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

fn main() {
    init_logging();
    match run() {
        Ok(needs_indexes) => {
            if needs_indexes {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(2);
        }
    }
}

fn run() -> Result<bool> {
    let args = CliArgs::parse()?;
    let root = match (&args.config, &args.catalog, &args.report) {
        (Some(_), Some(_), Some(_)) => None,
        _ => Some(find_project_root()?),
    };
    let resolve = |explicit: &Option<PathBuf>, default: fn(&std::path::Path) -> PathBuf| {
        explicit
            .clone()
            .or_else(|| root.as_deref().map(default))
            .context("unable to resolve default path")
    };
    let config_path = resolve(&args.config, default_config_path)?;
    let catalog_path = resolve(&args.catalog, default_catalog_path)?;
    let report_path = resolve(&args.report, default_report_path)?;

    let config = DiscoveryConfig::load(&config_path)?;
    let mut catalog = load_catalog(&catalog_path)?;
    let mut executor: Box<dyn QueryExecutor> = match args.executor {
        ExecutorChoice::Replay(path) => Box::new(ReplayExecutor::load(&path)?),
        ExecutorChoice::Command(program) => Box::new(CommandExecutor::new(program)),
    };

    let run = run_discovery(&config, executor.as_mut(), &mut catalog);
    run.report.save(&report_path)?;
    info!("report written to {}", report_path.display());

    if args.write_catalog && run.catalog_changed() {
        save_catalog(&catalog_path, &catalog)?;
    } else if run.catalog_changed() {
        info!(
            "{} new indexes not written; pass --write-catalog or run index-update",
            run.merge.unique_new.len()
        );
    }

    Ok(run.report.needs_indexes())
}

enum ExecutorChoice {
    Replay(PathBuf),
    Command(PathBuf),
}

struct CliArgs {
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    report: Option<PathBuf>,
    executor: ExecutorChoice,
    write_catalog: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut config = None;
        let mut catalog = None;
        let mut report = None;
        let mut executor: Option<ExecutorChoice> = None;
        let mut write_catalog = false;

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(next_value(&mut args, "--config")?)),
                "--catalog" => catalog = Some(PathBuf::from(next_value(&mut args, "--catalog")?)),
                "--report" => report = Some(PathBuf::from(next_value(&mut args, "--report")?)),
                "--replay" | "--exec" => {
                    if executor.is_some() {
                        bail!("--replay/--exec may only be provided once");
                    }
                    let value = PathBuf::from(next_value(&mut args, &arg)?);
                    executor = Some(if arg == "--replay" {
                        ExecutorChoice::Replay(value)
                    } else {
                        ExecutorChoice::Command(value)
                    });
                }
                "--write-catalog" => write_catalog = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}"),
            }
        }

        let Some(executor) = executor else {
            print_usage();
            bail!("one of --replay or --exec is required");
        };
        Ok(CliArgs {
            config,
            catalog,
            report,
            executor,
            write_catalog,
        })
    }
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String> {
    args.next()
        .map(|os| {
            os.into_string()
                .map_err(|_| anyhow::anyhow!("value for {flag} is not valid UTF-8"))
        })
        .transpose()?
        .with_context(|| format!("missing value for {flag}"))
}

fn print_usage() {
    eprintln!(
        "Usage: index-discover (--replay FILE | --exec PROGRAM) [--config PATH] [--catalog PATH] [--report PATH] [--write-catalog]\n\nExit status: 0 when no index is missing, 1 when indexes are needed, 2 on error."
    );
}
