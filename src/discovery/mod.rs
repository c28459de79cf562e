//! Discovery runs.
//!
//! A run tries every configured query once, in config order, and turns each
//! index-required failure into a synthesized [`IndexDefinition`]. The
//! definitions are merged into the caller's catalog in memory; persisting it
//! is left to the caller.
//!
//! Queries run strictly one at a time so a missing-index error can be
//! attributed to the query that produced it.

pub mod config;
pub mod executor;
pub mod report;

pub use config::{CONFIG_FILE_NAME, CollectionConfig, DiscoveryConfig, NamedQuery};
pub use executor::{
    CommandExecutor, ExecutionFailure, QueryExecutor, QueryRequest, RecordedOutcome,
    ReplayExecutor, classify_backend_error,
};
pub use report::{
    CollectionReport, CollectionSummary, CollectionTally, DEFAULT_REPORT_FILE, DiscoveryError,
    DiscoveryReport, LinkMismatch, QueryFailure, ReportSummary, extract_index_definitions,
};

use crate::catalog::{IndexCatalog, IndexDefinition, IndexKey, MergeOutcome};
use crate::link::{find_console_link, parse_link};
use crate::query::classify;
use crate::synthesize::synthesize;
use log::{error, info, warn};

/// Result of a discovery run: the report plus what the merge added.
#[derive(Debug, Clone)]
pub struct DiscoveryRun {
    pub report: DiscoveryReport,
    pub merge: MergeOutcome,
}

impl DiscoveryRun {
    pub fn catalog_changed(&self) -> bool {
        !self.merge.is_noop()
    }
}

/// Run every configured query through `executor` and merge the indexes they
/// need into `catalog`.
///
/// No single query can abort the run; every outcome lands in the report.
pub fn run_discovery(
    config: &DiscoveryConfig,
    executor: &mut dyn QueryExecutor,
    catalog: &mut IndexCatalog,
) -> DiscoveryRun {
    run_discovery_at(config, executor, catalog, report::timestamp_now())
}

/// [`run_discovery`] with a fixed `generatedAt` stamp.
pub fn run_discovery_at(
    config: &DiscoveryConfig,
    executor: &mut dyn QueryExecutor,
    catalog: &mut IndexCatalog,
    generated_at: String,
) -> DiscoveryRun {
    let mut report = DiscoveryReport::new(generated_at);
    let mut discovered: Vec<IndexDefinition> = Vec::new();

    for collection in &config.collections {
        info!(
            "checking {} queries for collection {}",
            collection.queries.len(),
            collection.collection
        );
        let entry = discover_collection(
            collection,
            config.result_limit,
            executor,
            &mut report.link_mismatches,
        );
        discovered.extend(
            entry
                .missing_indexes
                .iter()
                .map(|missing| missing.index_definition.clone()),
        );
        report.collections.insert(collection.collection.clone(), entry);
    }
    report.tally();

    let merge = catalog.absorb(&discovered);
    info!(
        "{} queries, {} succeeded, {} failed, {} need an index ({} new catalog entries, {} already known)",
        report.summary.total_queries,
        report.summary.total_successful,
        report.summary.total_failed,
        report.summary.total_indexes_needed,
        merge.unique_new.len(),
        merge.skipped_count
    );

    DiscoveryRun { report, merge }
}

fn discover_collection(
    collection: &CollectionConfig,
    limit: u32,
    executor: &mut dyn QueryExecutor,
    mismatches: &mut Vec<LinkMismatch>,
) -> CollectionReport {
    let mut entry = CollectionReport::default();
    let group = collection.group();

    for query in &collection.queries {
        entry.summary.total_queries += 1;
        let request = QueryRequest {
            collection: &collection.collection,
            query_name: &query.name,
            params: &query.params,
            limit,
        };

        match executor.execute(&request) {
            Ok(()) => {
                entry.summary.successful_queries += 1;
                info!("{}/{}: ok", collection.collection, query.name);
            }
            Err(ExecutionFailure::IndexRequired { message }) => {
                entry.summary.failed_queries += 1;
                entry.summary.indexes_needed += 1;
                warn!("{}/{}: index required", collection.collection, query.name);

                let shape = classify(&collection.collection, &query.params, &collection.classification);
                let definition = synthesize(&shape, group.clone());
                let console_url = find_console_link(&message).map(str::to_string);
                if let Some(url) = &console_url {
                    if let Some(mismatch) = cross_check(collection, query, url, &definition) {
                        mismatches.push(mismatch);
                    }
                }

                entry.missing_indexes.push(DiscoveryError {
                    query_name: query.name.clone(),
                    params: query.params.clone(),
                    error_message: message,
                    console_url,
                    index_definition: definition,
                });
            }
            Err(ExecutionFailure::Other { message }) => {
                entry.summary.failed_queries += 1;
                error!("{}/{}: {message}", collection.collection, query.name);
                entry.failures.push(QueryFailure {
                    query_name: query.name.clone(),
                    params: query.params.clone(),
                    error_message: message,
                });
            }
        }
    }

    entry
}

// The synthesized definition stays authoritative; disagreement is surfaced,
// never reconciled.
fn cross_check(
    collection: &CollectionConfig,
    query: &NamedQuery,
    url: &str,
    synthesized: &IndexDefinition,
) -> Option<LinkMismatch> {
    let mismatch = |linked: Option<IndexDefinition>, parse_error: Option<String>| LinkMismatch {
        collection: collection.collection.clone(),
        query_name: query.name.clone(),
        url: url.to_string(),
        synthesized: synthesized.clone(),
        linked,
        parse_error,
    };

    match parse_link(url) {
        Ok(parsed) => {
            let linked = parsed.into_definition();
            if IndexKey::of(&linked) == IndexKey::of(synthesized) {
                None
            } else {
                error!(
                    "{}/{}: console link describes a different index than the one synthesized",
                    collection.collection, query.name
                );
                Some(mismatch(Some(linked), None))
            }
        }
        Err(err) => {
            error!(
                "{}/{}: console link could not be parsed: {err}",
                collection.collection, query.name
            );
            Some(mismatch(None, Some(err.to_string())))
        }
    }
}
