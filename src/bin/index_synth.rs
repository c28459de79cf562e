//! Synthesize the composite index for one ad hoc query.
//!
//! Looks up the collection's classification in the discovery config,
//! classifies the given parameters, and prints the resulting
//! IndexDefinition as pretty JSON.

use anyhow::{Context, Result, bail};
use indexsmith::{
    DiscoveryConfig, QueryParams, classify, default_config_path, find_project_root, init_logging,
    synthesize,
};
use serde_json::Value;
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
    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path(&find_project_root()?),
    };
    let config = DiscoveryConfig::load(&config_path)?;
    let Some(collection) = config.collection(&args.collection) else {
        bail!(
            "collection '{}' is not declared in {}",
            args.collection,
            config_path.display()
        );
    };

    let shape = classify(
        &collection.collection,
        &args.params,
        &collection.classification,
    );
    let definition = synthesize(&shape, collection.group());
    println!("{}", serde_json::to_string_pretty(&definition)?);
    Ok(())
}

struct CliArgs {
    config: Option<PathBuf>,
    collection: String,
    params: QueryParams,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut config: Option<PathBuf> = None;
        let mut collection: Option<String> = None;
        let mut params = QueryParams::new();

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow::anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(next_value(&mut args, "--config")?)),
                "--collection" => collection = Some(next_value(&mut args, "--collection")?),
                "--param" => {
                    let raw = next_value(&mut args, "--param")?;
                    let (key, value) = parse_param(&raw)?;
                    params.insert(key, value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}"),
            }
        }

        let Some(collection) = collection else {
            print_usage();
            bail!("--collection is required");
        };
        Ok(CliArgs {
            config,
            collection,
            params,
        })
    }
}

// Values that parse as JSON (`true`, `100`) keep their type; anything else is
// a string.
fn parse_param(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("--param expects KEY=VALUE, got '{raw}'");
    };
    if key.is_empty() {
        bail!("--param key must not be empty");
    }
    let value = serde_json::from_str(value)
        .ok()
        .filter(|parsed: &Value| !parsed.is_object() && !parsed.is_array())
        .unwrap_or_else(|| Value::String(value.to_string()));
    Ok((key.to_string(), value))
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
        "Usage: index-synth --collection NAME [--param KEY=VALUE]... [--config PATH]\n\nPrints the composite index the query needs as JSON."
    );
}
