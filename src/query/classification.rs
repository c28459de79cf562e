//! Per-collection parameter classification.
//!
//! A classification says which request parameters become equality filters,
//! which become range bounds (and on which field), which pick the sort, and
//! which have no effect on index shape. It is declared once per collection in
//! the discovery config and validated before any query runs.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_ORDER_FIELD: &str = "createdAt";
const DEFAULT_FIELD_PARAM: &str = "orderBy";
const DEFAULT_DIRECTION_PARAM: &str = "order";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamClassification {
    pub equality: Vec<ParamMapping>,
    pub range: Vec<ParamMapping>,
    pub order_by: OrderByParams,
    pub ignored: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implicit_equality: Vec<ImplicitEquality>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMapping")]
/// A request parameter and the document field it filters on.
pub struct ParamMapping {
    pub param: String,
    pub field: String,
}

impl ParamMapping {
    pub fn new(param: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            field: field.into(),
        }
    }

    /// Parameter and field share a name.
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name)
    }
}

// Config accepts a bare parameter name as shorthand for `{param, field}` with
// equal names.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMapping {
    Same(String),
    Mapped { param: String, field: String },
}

impl From<RawMapping> for ParamMapping {
    fn from(raw: RawMapping) -> Self {
        match raw {
            RawMapping::Same(name) => ParamMapping::same(name),
            RawMapping::Mapped { param, field } => ParamMapping::new(param, field),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Parameters selecting the sort field and direction.
pub struct OrderByParams {
    #[serde(default = "default_field_param")]
    pub field_param: String,
    #[serde(default = "default_direction_param")]
    pub direction_param: String,
    #[serde(default = "default_order_field")]
    pub default_field: String,
}

impl Default for OrderByParams {
    fn default() -> Self {
        Self {
            field_param: default_field_param(),
            direction_param: default_direction_param(),
            default_field: default_order_field(),
        }
    }
}

fn default_field_param() -> String {
    DEFAULT_FIELD_PARAM.to_string()
}

fn default_direction_param() -> String {
    DEFAULT_DIRECTION_PARAM.to_string()
}

fn default_order_field() -> String {
    DEFAULT_ORDER_FIELD.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// An equality filter the listing applies on its own (soft-delete), dropped
/// only when `unless_param` is true.
pub struct ImplicitEquality {
    pub field: String,
    pub unless_param: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Role a request parameter plays in a classification.
pub enum ParamRole {
    Equality,
    Range,
    OrderField,
    OrderDirection,
    Ignored,
    ImplicitSwitch,
}

impl ParamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamRole::Equality => "equality",
            ParamRole::Range => "range",
            ParamRole::OrderField => "order field",
            ParamRole::OrderDirection => "order direction",
            ParamRole::Ignored => "ignored",
            ParamRole::ImplicitSwitch => "implicit equality switch",
        }
    }
}

impl ParamClassification {
    /// Every parameter name with the role it plays.
    pub fn roles(&self) -> Vec<(&str, ParamRole)> {
        let mut roles = Vec::new();
        roles.extend(
            self.equality
                .iter()
                .map(|mapping| (mapping.param.as_str(), ParamRole::Equality)),
        );
        roles.extend(
            self.range
                .iter()
                .map(|mapping| (mapping.param.as_str(), ParamRole::Range)),
        );
        roles.push((self.order_by.field_param.as_str(), ParamRole::OrderField));
        roles.push((
            self.order_by.direction_param.as_str(),
            ParamRole::OrderDirection,
        ));
        roles.extend(
            self.ignored
                .iter()
                .map(|param| (param.as_str(), ParamRole::Ignored)),
        );
        roles.extend(
            self.implicit_equality
                .iter()
                .map(|implicit| (implicit.unless_param.as_str(), ParamRole::ImplicitSwitch)),
        );
        roles
    }

    pub fn role_of(&self, param: &str) -> Option<ParamRole> {
        self.roles()
            .into_iter()
            .find(|(name, _)| *name == param)
            .map(|(_, role)| role)
    }

    /// Reject classifications that would make the shape ambiguous.
    ///
    /// Each parameter name may play exactly one role; names and fields must
    /// be non-empty. The same implicit switch may guard several fields.
    pub fn validate(&self) -> Result<()> {
        for mapping in self.equality.iter().chain(&self.range) {
            if mapping.param.trim().is_empty() || mapping.field.trim().is_empty() {
                bail!("classification contains an empty parameter or field name");
            }
        }
        for implicit in &self.implicit_equality {
            if implicit.field.trim().is_empty() || implicit.unless_param.trim().is_empty() {
                bail!("implicitEquality entries need both field and unlessParam");
            }
        }
        if self.order_by.default_field.trim().is_empty() {
            bail!("orderBy.defaultField must not be empty");
        }

        let mut claimed: BTreeMap<&str, ParamRole> = BTreeMap::new();
        for (param, role) in self.roles() {
            if param.trim().is_empty() {
                bail!("classification contains an empty {} parameter", role.as_str());
            }
            match claimed.get(param) {
                Some(ParamRole::ImplicitSwitch) if role == ParamRole::ImplicitSwitch => {}
                Some(previous) => bail!(
                    "parameter '{param}' is declared as both {} and {}",
                    previous.as_str(),
                    role.as_str()
                ),
                None => {
                    claimed.insert(param, role);
                }
            }
        }
        Ok(())
    }
}
