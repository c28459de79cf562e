//! Decode console "create composite index" links.
//!
//! Each URL argument is parsed and printed as one compact IndexDefinition
//! JSON line on stdout. Malformed links are reported on stderr and make the
//! command exit non-zero after the remaining links are processed.

use anyhow::{Result, bail};
use indexsmith::{init_logging, parse_link};
use std::env;

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let urls = parse_args()?;
    let mut failures = 0usize;

    for url in &urls {
        match parse_link(url) {
            Ok(parsed) => {
                let definition = parsed.into_definition();
                println!("{}", serde_json::to_string(&definition)?);
            }
            Err(err) => {
                eprintln!("{url}: {err}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} links could not be parsed", urls.len());
    }
    Ok(())
}

fn parse_args() -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for arg_os in env::args_os().skip(1) {
        let arg = arg_os
            .into_string()
            .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => urls.push(arg),
        }
    }
    if urls.is_empty() {
        print_usage();
        bail!("at least one console link is required");
    }
    Ok(urls)
}

fn print_usage() {
    eprintln!("Usage: index-link <URL>...\n\nPrints the index definition encoded in each console link as JSON.");
}
