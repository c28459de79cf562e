//! Query-shape classification.
//!
//! Turns the concrete parameters of a listing request into a [`QueryShape`]
//! using the collection's declared [`ParamClassification`].

pub mod classification;
pub mod shape;

pub use classification::{
    DEFAULT_ORDER_FIELD, ImplicitEquality, OrderByParams, ParamClassification, ParamMapping,
    ParamRole,
};
pub use shape::{QueryParams, QueryShape, SortDirection, classify};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::{Value, json};

    /// Classification used by the orders listing.
    pub(crate) fn orders_classification() -> ParamClassification {
        serde_json::from_value(json!({
            "equality": ["memberId", "status"],
            "range": [
                {"param": "minCreatedAt", "field": "createdAt"},
                {"param": "maxCreatedAt", "field": "createdAt"},
                {"param": "minAmount", "field": "totalAmount"},
                {"param": "maxAmount", "field": "totalAmount"}
            ],
            "orderBy": {},
            "ignored": ["limit", "cursor"]
        }))
        .expect("classification parses")
    }

    pub(crate) fn params(value: Value) -> QueryParams {
        match value {
            Value::Object(map) => map,
            other => panic!("params fixture must be an object, got {other}"),
        }
    }
}
