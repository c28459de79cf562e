//! Read-once/write-once persistence for the index catalog file.
//!
//! Loading validates the file against the embedded catalog schema before
//! deserializing. Saving goes through a temporary file in the target directory
//! that is persisted over the catalog, so readers never observe a partially
//! written file. No locking is attempted; one writer per catalog is assumed.

use crate::catalog::model::IndexCatalog;
use crate::schema_loader::CompiledSchema;
use anyhow::{Context, Result};
use log::{debug, info};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Load the catalog at `path`.
///
/// A missing file is not an error: discovery against a fresh project starts
/// from an empty catalog, which the first save creates.
pub fn load_catalog(path: &Path) -> Result<IndexCatalog> {
    if !path.exists() {
        info!(
            "catalog {} not found; starting from an empty catalog",
            path.display()
        );
        return Ok(IndexCatalog::default());
    }

    let file = File::open(path).with_context(|| format!("opening catalog {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing catalog {}", path.display()))?;
    load_catalog_from_value(value, &path.display().to_string())
}

/// Validate and deserialize an already-parsed catalog document.
pub fn load_catalog_from_value(value: Value, subject: &str) -> Result<IndexCatalog> {
    CompiledSchema::catalog()?.validate(&value, subject)?;
    let catalog: IndexCatalog =
        serde_json::from_value(value).with_context(|| format!("decoding catalog {subject}"))?;
    debug!("loaded {} indexes from {subject}", catalog.indexes.len());
    Ok(catalog)
}

/// Atomically replace the catalog at `path` with `catalog`.
pub fn save_catalog(path: &Path, catalog: &IndexCatalog) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut body = serde_json::to_string_pretty(catalog)?;
    body.push('\n');

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("staging catalog in {}", dir.display()))?;
    staged
        .write_all(body.as_bytes())
        .with_context(|| format!("writing staged catalog for {}", path.display()))?;
    staged.flush()?;
    staged
        .persist(path)
        .with_context(|| format!("replacing catalog {}", path.display()))?;

    info!(
        "wrote {} indexes to {}",
        catalog.indexes.len(),
        path.display()
    );
    Ok(())
}
