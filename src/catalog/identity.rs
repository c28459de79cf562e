use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Reserved document-key field appended as the final tie-break of every
/// synthesized index.
pub const DOCUMENT_KEY_FIELD: &str = "__name__";

/// Name of the collection group an index applies to (e.g., `orders`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionGroup(pub String);

impl CollectionGroup {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CollectionGroup {
    fn from(value: &str) -> Self {
        CollectionGroup(value.to_string())
    }
}

/// Per-field sort order inside an index definition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        }
    }

    /// Map the order code carried in console links (`1` ascending, `2`
    /// descending).
    pub fn from_order_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Direction::Ascending),
            2 => Some(Direction::Descending),
            _ => None,
        }
    }
}

/// Scope of a composite index.
///
/// Discovery only ever produces `Collection`; `Other` preserves catalog
/// entries written by other tools (e.g., `COLLECTION_GROUP`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum QueryScope {
    Collection,
    Other(String),
}

/// Density marker carried through unchanged.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Density {
    SparseAll,
    Other(String),
}

impl Serialize for QueryScope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QueryScope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl QueryScope {
    pub fn as_str(&self) -> &str {
        match self {
            QueryScope::Collection => "COLLECTION",
            QueryScope::Other(value) => value.as_str(),
        }
    }

    fn from_str(value: &str) -> Self {
        match value {
            "COLLECTION" => QueryScope::Collection,
            other => QueryScope::Other(other.to_string()),
        }
    }
}

impl Serialize for Density {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Density {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_str(&value))
    }
}

impl Density {
    pub fn as_str(&self) -> &str {
        match self {
            Density::SparseAll => "SPARSE_ALL",
            Density::Other(value) => value.as_str(),
        }
    }

    fn from_str(value: &str) -> Self {
        match value {
            "SPARSE_ALL" => Density::SparseAll,
            other => Density::Other(other.to_string()),
        }
    }
}
