//! Serializable representation of `firestore.indexes.json`.
//!
//! The types mirror the catalog format the Firebase CLI reads and writes, so
//! discovery output can be pasted into (or merged with) an existing catalog
//! without reshaping. Field order inside an index is significant and is kept
//! exactly as produced.

use crate::catalog::identity::{CollectionGroup, DOCUMENT_KEY_FIELD, Density, Direction, QueryScope};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One indexed field and its sort order.
pub struct IndexFieldSpec {
    pub field_path: String,
    pub order: Direction,
}

impl IndexFieldSpec {
    pub fn new(field_path: impl Into<String>, order: Direction) -> Self {
        Self {
            field_path: field_path.into(),
            order,
        }
    }

    pub fn ascending(field_path: impl Into<String>) -> Self {
        Self::new(field_path, Direction::Ascending)
    }

    pub fn descending(field_path: impl Into<String>) -> Self {
        Self::new(field_path, Direction::Descending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A composite index as stored in the catalog.
pub struct IndexDefinition {
    pub collection_group: CollectionGroup,
    pub query_scope: QueryScope,
    pub fields: Vec<IndexFieldSpec>,
    // Older catalogs omit density; they are treated as SPARSE_ALL.
    #[serde(default = "sparse_all")]
    pub density: Density,
}

fn sparse_all() -> Density {
    Density::SparseAll
}

impl IndexDefinition {
    /// Collection-scoped, `SPARSE_ALL` definition over `fields` in the given
    /// order.
    pub fn new(collection_group: CollectionGroup, fields: Vec<IndexFieldSpec>) -> Self {
        Self {
            collection_group,
            query_scope: QueryScope::Collection,
            fields,
            density: Density::SparseAll,
        }
    }

    /// True when the final field is the document-key tie-break.
    pub fn ends_with_document_key(&self) -> bool {
        self.fields
            .last()
            .map(|field| field.field_path == DOCUMENT_KEY_FIELD)
            .unwrap_or(false)
    }

    pub fn field(&self, field_path: &str) -> Option<&IndexFieldSpec> {
        self.fields.iter().find(|field| field.field_path == field_path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Whole catalog file. Keys other than `indexes` and `fieldOverrides` are
/// carried through untouched so a read-merge-write never drops data.
pub struct IndexCatalog {
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default)]
    pub field_overrides: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexCatalog {
    /// Indexes declared for one collection group, in catalog order.
    pub fn for_collection<'a>(
        &'a self,
        group: &'a CollectionGroup,
    ) -> impl Iterator<Item = &'a IndexDefinition> + 'a {
        self.indexes
            .iter()
            .filter(move |index| &index.collection_group == group)
    }
}
