//! Normalized query shapes.
//!
//! A shape keeps only what decides the composite index a query needs: which
//! fields are matched by equality, which carry range bounds, and the sort
//! field and direction. Literal filter values are dropped.

use crate::catalog::Direction;
use crate::query::classification::ParamClassification;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

/// Raw request parameters for one query, as declared in the discovery config.
pub type QueryParams = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Requested sort direction. Anything other than the literal `asc` sorts
/// descending.
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn index_direction(&self) -> Direction {
        match self {
            SortDirection::Asc => Direction::Ascending,
            SortDirection::Desc => Direction::Descending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryShape {
    pub collection: String,
    pub equality_fields: Vec<String>,
    pub range_fields: Vec<String>,
    pub order_by_field: String,
    pub order_direction: SortDirection,
}

impl QueryShape {
    /// Shape with no filters, sorted by `order_by_field`.
    pub fn new(
        collection: impl Into<String>,
        order_by_field: impl Into<String>,
        order_direction: SortDirection,
    ) -> Self {
        Self {
            collection: collection.into(),
            equality_fields: Vec::new(),
            range_fields: Vec::new(),
            order_by_field: order_by_field.into(),
            order_direction,
        }
    }

    pub fn with_equality(mut self, field: impl Into<String>) -> Self {
        push_unique(&mut self.equality_fields, field.into());
        self
    }

    pub fn with_range(mut self, field: impl Into<String>) -> Self {
        push_unique(&mut self.range_fields, field.into());
        self
    }

    pub fn has_range(&self, field: &str) -> bool {
        self.range_fields.iter().any(|candidate| candidate == field)
    }
}

fn push_unique(fields: &mut Vec<String>, field: String) {
    if !fields.contains(&field) {
        fields.push(field);
    }
}

/// Reduce concrete parameters to a shape using the collection's
/// classification.
///
/// Presence is the only test applied to filter values (a JSON `null` counts
/// as absent). Equality and range fields keep the classification's declared
/// order, never the order parameters appear in.
pub fn classify(
    collection: &str,
    params: &QueryParams,
    classification: &ParamClassification,
) -> QueryShape {
    let order_by_field = param_text(params, &classification.order_by.field_param)
        .unwrap_or_else(|| classification.order_by.default_field.clone());
    let order_direction = SortDirection::from_param(
        param_text(params, &classification.order_by.direction_param).as_deref(),
    );
    let mut shape = QueryShape::new(collection, order_by_field, order_direction);

    for implicit in &classification.implicit_equality {
        if !param_is_true(params, &implicit.unless_param) {
            push_unique(&mut shape.equality_fields, implicit.field.clone());
        }
    }

    for mapping in &classification.equality {
        if is_present(params, &mapping.param) {
            push_unique(&mut shape.equality_fields, mapping.field.clone());
        }
    }

    for mapping in &classification.range {
        if is_present(params, &mapping.param) {
            push_unique(&mut shape.range_fields, mapping.field.clone());
        }
    }

    for name in params.keys() {
        if classification.role_of(name).is_none() {
            debug!("{collection}: parameter '{name}' is not classified; ignoring");
        }
    }

    shape
}

fn is_present(params: &QueryParams, name: &str) -> bool {
    params.get(name).map(|value| !value.is_null()).unwrap_or(false)
}

fn param_text(params: &QueryParams, name: &str) -> Option<String> {
    match params.get(name)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn param_is_true(params: &QueryParams, name: &str) -> bool {
    match params.get(name) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text == "true",
        _ => false,
    }
}
