//! Discovery configuration (`indexsmith.json`).
//!
//! Lists, per collection, how request parameters are classified and which
//! named parameter sets to try. The file is schema-checked and then
//! structurally checked before any query runs.

use crate::catalog::CollectionGroup;
use crate::query::{ParamClassification, QueryParams};
use crate::schema_loader::CompiledSchema;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "indexsmith.json";
pub const DEFAULT_RESULT_LIMIT: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    #[serde(rename = "schema_version")]
    pub schema_version: String,
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
    pub collections: Vec<CollectionConfig>,
}

fn default_result_limit() -> u32 {
    DEFAULT_RESULT_LIMIT
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_group: Option<String>,
    pub classification: ParamClassification,
    pub queries: Vec<NamedQuery>,
}

impl CollectionConfig {
    /// Group the synthesized indexes target; the collection name unless
    /// overridden.
    pub fn group(&self) -> CollectionGroup {
        CollectionGroup(
            self.collection_group
                .clone()
                .unwrap_or_else(|| self.collection.clone()),
        )
    }

    pub fn query(&self, name: &str) -> Option<&NamedQuery> {
        self.queries.iter().find(|query| query.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A parameter set to try against one collection.
pub struct NamedQuery {
    pub name: String,
    pub params: QueryParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DiscoveryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let value: Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Self::from_value(value, &path.display().to_string())
    }

    pub fn from_value(value: Value, subject: &str) -> Result<Self> {
        CompiledSchema::discovery_config()?.validate(&value, subject)?;
        let config: DiscoveryConfig =
            serde_json::from_value(value).with_context(|| format!("decoding config {subject}"))?;
        config
            .validate()
            .with_context(|| format!("invalid config {subject}"))?;
        Ok(config)
    }

    /// Structural checks the schema cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.result_limit == 0 {
            bail!("resultLimit must be at least 1");
        }
        if self.collections.is_empty() {
            bail!("config declares no collections");
        }

        let mut collections = BTreeSet::new();
        for collection in &self.collections {
            let name = collection.collection.trim();
            if name.is_empty() {
                bail!("collection name must not be empty");
            }
            if !collections.insert(name) {
                bail!("collection '{name}' is declared more than once");
            }
            collection
                .classification
                .validate()
                .with_context(|| format!("collection '{name}'"))?;

            if collection.queries.is_empty() {
                bail!("collection '{name}' declares no queries");
            }
            let mut queries = BTreeSet::new();
            for query in &collection.queries {
                if query.name.trim().is_empty() {
                    bail!("collection '{name}' has a query with an empty name");
                }
                if !queries.insert(query.name.as_str()) {
                    bail!("collection '{name}' declares query '{}' twice", query.name);
                }
            }
        }
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections
            .iter()
            .find(|collection| collection.collection == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "schema_version": "indexsmith_config_v1",
            "collections": [{
                "collection": "orders",
                "classification": {
                    "equality": ["memberId", "status"],
                    "range": [{"param": "minAmount", "field": "totalAmount"}],
                    "orderBy": {},
                    "ignored": ["limit"]
                },
                "queries": [
                    {"name": "by_member", "params": {"memberId": "m1"}},
                    {"name": "by_amount", "params": {"minAmount": 10}, "description": "amount floor"}
                ]
            }]
        })
    }

    #[test]
    fn loads_with_defaults() {
        let config = DiscoveryConfig::from_value(sample(), "sample").expect("valid config");
        assert_eq!(config.result_limit, DEFAULT_RESULT_LIMIT);
        let orders = config.collection("orders").expect("orders");
        assert_eq!(orders.group().as_str(), "orders");
        assert_eq!(
            orders.query("by_amount").and_then(|q| q.description.as_deref()),
            Some("amount floor")
        );
    }

    #[test]
    fn wrong_schema_version_is_rejected() {
        let mut value = sample();
        value["schema_version"] = json!("indexsmith_config_v0");
        let err = DiscoveryConfig::from_value(value, "sample").unwrap_err();
        assert!(err.to_string().contains("schema_version"));
    }

    #[test]
    fn missing_classification_section_fails_schema() {
        let mut value = sample();
        value["collections"][0]["classification"]
            .as_object_mut()
            .unwrap()
            .remove("ignored");
        assert!(DiscoveryConfig::from_value(value, "sample").is_err());
    }

    #[test]
    fn duplicate_query_names_are_rejected() {
        let mut value = sample();
        value["collections"][0]["queries"][1]["name"] = json!("by_member");
        let err = DiscoveryConfig::from_value(value, "sample").unwrap_err();
        assert!(format!("{err:#}").contains("by_member"));
    }

    #[test]
    fn duplicate_collections_are_rejected() {
        let mut value = sample();
        let copy = value["collections"][0].clone();
        value["collections"].as_array_mut().unwrap().push(copy);
        assert!(DiscoveryConfig::from_value(value, "sample").is_err());
    }

    #[test]
    fn conflicting_roles_are_rejected_with_collection_context() {
        let mut value = sample();
        value["collections"][0]["classification"]["ignored"] = json!(["limit", "memberId"]);
        let err = DiscoveryConfig::from_value(value, "sample").unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("orders"));
        assert!(rendered.contains("memberId"));
    }
}
