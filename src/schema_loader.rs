//! Embedded JSON Schemas for the catalog and the discovery config.
//!
//! Both files on disk are validated against a schema before they are
//! deserialized, so malformed input is reported with every violation at once
//! instead of the first serde error.

use anyhow::{Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;

const CATALOG_SCHEMA: &str = include_str!("../schema/index_catalog.schema.json");
const CONFIG_SCHEMA: &str = include_str!("../schema/discovery_config.schema.json");

// Where the config schema pins its accepted schema_version.
const SCHEMA_VERSION_POINTER: &str = "/properties/schema_version/const";

/// A compiled schema plus the label used in error messages.
pub(crate) struct CompiledSchema {
    label: &'static str,
    schema_version: Option<String>,
    compiled: JSONSchema,
}

impl CompiledSchema {
    pub(crate) fn catalog() -> Result<Self> {
        compile_embedded("index catalog", CATALOG_SCHEMA)
    }

    pub(crate) fn discovery_config() -> Result<Self> {
        compile_embedded("discovery config", CONFIG_SCHEMA)
    }

    /// The `schema_version` this schema accepts, when it pins one.
    pub(crate) fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    /// Validate `instance`, reporting every violation for `subject`.
    pub(crate) fn validate(&self, instance: &Value, subject: &str) -> Result<()> {
        if let Some(expected) = self.schema_version() {
            let found = instance
                .get("schema_version")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if found != expected {
                bail!(
                    "{subject}: schema_version '{found}' does not match expected '{expected}'"
                );
            }
        }

        if let Err(errors) = self.compiled.validate(instance) {
            let details = errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{path}: {err}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            bail!(
                "{subject} failed {} schema validation:\n{details}",
                self.label
            );
        }
        Ok(())
    }
}

fn compile_embedded(label: &'static str, raw: &str) -> Result<CompiledSchema> {
    let schema: Value =
        serde_json::from_str(raw).map_err(|err| anyhow!("parsing {label} schema: {err}"))?;
    let schema_version = extract_schema_version(&schema, SCHEMA_VERSION_POINTER);
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| anyhow!("compiling {label} schema: {err}"))?;
    Ok(CompiledSchema {
        label,
        schema_version,
        compiled,
    })
}

fn extract_schema_version(schema: &Value, pointer: &str) -> Option<String> {
    let version = schema.pointer(pointer).and_then(Value::as_str)?;
    if version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Some(version.to_string())
    } else {
        None
    }
}
