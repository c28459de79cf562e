//! Merge a saved discovery report into the index catalog.
//!
//! Reads every index definition from `missing-indexes.json`, merges them
//! into `firestore.indexes.json` structurally, and writes the catalog back
//! unless `--dry-run` is given. Prints a JSON summary on stdout.

use anyhow::{Context, Result, bail};
use indexsmith::discovery::extract_index_definitions;
use indexsmith::{
    default_catalog_path, default_report_path, find_project_root, init_logging, load_catalog,
    save_catalog,
};
use log::info;
use serde_json::json;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse()?;
    let root = if args.report.is_some() && args.catalog.is_some() {
        None
    } else {
        Some(find_project_root()?)
    };
    let report_path = match (args.report, &root) {
        (Some(path), _) => path,
        (None, Some(root)) => default_report_path(root),
        (None, None) => bail!("no report path"),
    };
    let catalog_path = match (args.catalog, &root) {
        (Some(path), _) => path,
        (None, Some(root)) => default_catalog_path(root),
        (None, None) => bail!("no catalog path"),
    };

    if !report_path.is_file() {
        bail!(
            "report not found: {} (run index-discover first)",
            report_path.display()
        );
    }
    let candidates = extract_index_definitions(&report_path)?;
    let mut catalog = load_catalog(&catalog_path)?;
    let outcome = catalog.absorb(&candidates);

    if outcome.is_noop() {
        info!("catalog already contains every reported index");
    } else if args.dry_run {
        info!(
            "dry run: {} indexes would be added to {}",
            outcome.unique_new.len(),
            catalog_path.display()
        );
    } else {
        save_catalog(&catalog_path, &catalog)?;
    }

    let summary = json!({
        "added": outcome.unique_new.len(),
        "skipped": outcome.skipped_count,
        "total": catalog.indexes.len(),
        "dryRun": args.dry_run,
        "addedIndexes": outcome.unique_new,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

struct CliArgs {
    report: Option<PathBuf>,
    catalog: Option<PathBuf>,
    dry_run: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut report = None;
        let mut catalog = None;
        let mut dry_run = false;

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--report" => report = Some(PathBuf::from(next_value(&mut args, "--report")?)),
                "--catalog" => catalog = Some(PathBuf::from(next_value(&mut args, "--catalog")?)),
                "--dry-run" => dry_run = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}"),
            }
        }

        Ok(CliArgs {
            report,
            catalog,
            dry_run,
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
    eprintln!("Usage: index-update [--report PATH] [--catalog PATH] [--dry-run]");
}
