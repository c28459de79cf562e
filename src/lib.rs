//! Composite index inference for a document store.
//!
//! The crate works out which composite indexes a set of listing queries
//! needs and keeps `firestore.indexes.json` in sync with them:
//!
//! - [`wire`] and [`link`] decode the index definition embedded in the
//!   console links the backend returns with "requires an index" errors.
//! - [`query`] reduces request parameters to a query shape, and
//!   [`synthesize`] derives the index that shape needs.
//! - [`catalog`] holds the catalog types, structural merge, and store.
//! - [`discovery`] drives a run over the configured queries through an
//!   injected executor and produces the `missing-indexes.json` report.
//!
//! The helper binaries under `src/bin/` are thin wrappers over these.

use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub mod catalog;
pub mod discovery;
pub mod link;
pub mod query;
pub mod synthesize;
pub mod wire;

mod schema_loader;

pub use catalog::{
    CollectionGroup, DOCUMENT_KEY_FIELD, Density, Direction, IndexCatalog, IndexDefinition,
    IndexFieldSpec, IndexKey, MergeOutcome, QueryScope, load_catalog, save_catalog,
};
pub use discovery::{
    CONFIG_FILE_NAME, CommandExecutor, DEFAULT_REPORT_FILE, DiscoveryConfig, DiscoveryReport,
    DiscoveryRun, ExecutionFailure, QueryExecutor, ReplayExecutor, run_discovery,
};
pub use link::{LinkError, ParsedLink, find_console_link, parse_link};
pub use query::{ParamClassification, QueryParams, QueryShape, SortDirection, classify};
pub use synthesize::synthesize;
pub use wire::DecodeError;

pub const DEFAULT_CATALOG_FILE: &str = "firestore.indexes.json";
const ROOT_ENV: &str = "INDEXSMITH_ROOT";

fn is_project_root(candidate: &Path) -> bool {
    candidate.join(CONFIG_FILE_NAME).is_file()
}

fn project_root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !is_project_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_project_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the directory holding `indexsmith.json`.
///
/// Honors `INDEXSMITH_ROOT` when it points at a project, then climbs up from
/// the current directory, then falls back to the build-time hint.
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(env_root) = env::var(ROOT_ENV) {
        if let Some(root) = project_root_from_hint(&env_root) {
            return Ok(root);
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(root) = search_upwards(&cwd) {
            return Ok(root);
        }
    }

    if let Some(hint) = option_env!("INDEXSMITH_ROOT_HINT") {
        if let Some(root) = project_root_from_hint(hint) {
            return Ok(root);
        }
    }

    bail!(
        "Unable to locate a project containing {CONFIG_FILE_NAME}. Set {ROOT_ENV} or pass explicit paths."
    );
}

pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

pub fn default_catalog_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_CATALOG_FILE)
}

pub fn default_report_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_REPORT_FILE)
}

/// Route `log` output to stderr at `info` unless `RUST_LOG` says otherwise.
/// Stdout stays reserved for JSON.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();
}
