//! Composite index catalog wiring.
//!
//! This module wraps `firestore.indexes.json`: the value types for index
//! definitions, structural deduplication of candidate indexes, and the
//! read-merge-write store. Discovery produces `IndexDefinition`s; only this
//! module decides whether they are new.

pub mod identity;
pub mod merge;
pub mod model;
pub mod store;

pub use identity::{CollectionGroup, DOCUMENT_KEY_FIELD, Density, Direction, QueryScope};
pub use merge::{IndexKey, MergeOutcome, merge_indexes};
pub use model::{IndexCatalog, IndexDefinition, IndexFieldSpec};
pub use store::{load_catalog, load_catalog_from_value, save_catalog};
