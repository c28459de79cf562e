//! Structural deduplication of index definitions against a catalog.
//!
//! Two definitions are the same index exactly when collection group, scope,
//! ordered field list and density all match. Field order is part of the
//! identity: `[a, b]` and `[b, a]` are different indexes.

use crate::catalog::model::{IndexCatalog, IndexDefinition};
use log::debug;
use std::collections::BTreeSet;

/// Canonical identity of an index definition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey(String);

impl IndexKey {
    pub fn of(index: &IndexDefinition) -> Self {
        let mut key = String::new();
        push_component(&mut key, index.collection_group.as_str());
        push_component(&mut key, index.query_scope.as_str());
        for field in &index.fields {
            push_component(&mut key, &field.field_path);
            push_component(&mut key, field.order.as_str());
        }
        push_component(&mut key, index.density.as_str());
        IndexKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Length-prefixing each component keeps keys unambiguous for any field name.
fn push_component(key: &mut String, component: &str) {
    key.push_str(&component.len().to_string());
    key.push(':');
    key.push_str(component);
    key.push('|');
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Outcome of merging a batch of candidates.
pub struct MergeOutcome {
    pub unique_new: Vec<IndexDefinition>,
    pub skipped_count: usize,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.unique_new.is_empty()
    }
}

/// Return the candidates not already present in `existing`, in input order.
///
/// Duplicates inside `candidates` collapse to their first occurrence. Nothing
/// in `existing` is touched.
pub fn merge_indexes(existing: &[IndexDefinition], candidates: &[IndexDefinition]) -> MergeOutcome {
    let mut seen: BTreeSet<IndexKey> = existing.iter().map(IndexKey::of).collect();
    let mut outcome = MergeOutcome::default();

    for candidate in candidates {
        if seen.insert(IndexKey::of(candidate)) {
            outcome.unique_new.push(candidate.clone());
        } else {
            debug!(
                "skipping index on {} already present in catalog",
                candidate.collection_group.as_str()
            );
            outcome.skipped_count += 1;
        }
    }

    outcome
}

impl IndexCatalog {
    /// Append the genuinely new candidates to this catalog.
    ///
    /// The new entries are computed in full before the catalog is extended.
    pub fn absorb(&mut self, candidates: &[IndexDefinition]) -> MergeOutcome {
        let outcome = merge_indexes(&self.indexes, candidates);
        self.indexes.extend(outcome.unique_new.iter().cloned());
        outcome
    }

    pub fn contains(&self, index: &IndexDefinition) -> bool {
        let key = IndexKey::of(index);
        self.indexes.iter().any(|existing| IndexKey::of(existing) == key)
    }
}
