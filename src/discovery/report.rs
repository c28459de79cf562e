//! Discovery report (`missing-indexes.json`).

use crate::catalog::IndexDefinition;
use crate::query::QueryParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const DEFAULT_REPORT_FILE: &str = "missing-indexes.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub generated_at: String,
    pub summary: ReportSummary,
    pub collections: BTreeMap<String, CollectionReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_mismatches: Vec<LinkMismatch>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_collections: usize,
    pub total_queries: usize,
    pub total_successful: usize,
    pub total_failed: usize,
    pub total_indexes_needed: usize,
    pub by_collection: BTreeMap<String, CollectionTally>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionTally {
    pub queries: usize,
    pub indexes_needed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub summary: CollectionSummary,
    #[serde(default)]
    pub missing_indexes: Vec<DiscoveryError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<QueryFailure>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub total_queries: usize,
    pub successful_queries: usize,
    /// Index-required plus other failures.
    pub failed_queries: usize,
    pub indexes_needed: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A query that failed because a composite index is missing.
pub struct DiscoveryError {
    pub query_name: String,
    pub params: QueryParams,
    pub error_message: String,
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,
    pub index_definition: IndexDefinition,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A query that failed for a reason other than a missing index.
pub struct QueryFailure {
    pub query_name: String,
    pub params: QueryParams,
    pub error_message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A console link that disagrees with the synthesized definition, or could
/// not be parsed at all.
pub struct LinkMismatch {
    pub collection: String,
    pub query_name: String,
    pub url: String,
    pub synthesized: IndexDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked: Option<IndexDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

pub fn default_instructions() -> Vec<String> {
    [
        "Create the missing indexes listed in this report:",
        "1. Open the console link from the backend error to create an index directly",
        "2. Or create the index by hand in the console",
        "3. Once built, export the live catalog with `firebase firestore:indexes > firestore.indexes.json`",
        "4. Or merge this report into the catalog with `index-update`",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Current UTC time in RFC 3339 form.
pub fn timestamp_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

impl DiscoveryReport {
    pub fn new(generated_at: String) -> Self {
        Self {
            generated_at,
            summary: ReportSummary::default(),
            collections: BTreeMap::new(),
            link_mismatches: Vec::new(),
            instructions: default_instructions(),
        }
    }

    /// Recompute the top-level summary from the per-collection entries.
    pub fn tally(&mut self) {
        let mut summary = ReportSummary {
            total_collections: self.collections.len(),
            ..ReportSummary::default()
        };
        for (name, collection) in &self.collections {
            summary.total_queries += collection.summary.total_queries;
            summary.total_successful += collection.summary.successful_queries;
            summary.total_failed += collection.summary.failed_queries;
            summary.total_indexes_needed += collection.summary.indexes_needed;
            summary.by_collection.insert(
                name.clone(),
                CollectionTally {
                    queries: collection.summary.total_queries,
                    indexes_needed: collection.summary.indexes_needed,
                },
            );
        }
        self.summary = summary;
    }

    pub fn needs_indexes(&self) -> bool {
        self.summary.total_indexes_needed > 0
    }

    /// Every index definition in the report, by collection then entry order.
    pub fn index_definitions(&self) -> Vec<IndexDefinition> {
        self.collections
            .values()
            .flat_map(|collection| collection.missing_indexes.iter())
            .map(|entry| entry.index_definition.clone())
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening report {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing report {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        fs::write(path, body).with_context(|| format!("writing report {}", path.display()))
    }
}

/// Pull every index definition out of a saved report.
pub fn extract_index_definitions(path: &Path) -> Result<Vec<IndexDefinition>> {
    Ok(DiscoveryReport::load(path)?.index_definitions())
}
