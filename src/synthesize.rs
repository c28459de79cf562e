//! Composite index synthesis from a query shape.
//!
//! Field order follows the backend's requirements for a combined filter and
//! sort: equality fields first, then range fields, then the sort field, then
//! the document key as a terminal tie-break.

use crate::catalog::{CollectionGroup, DOCUMENT_KEY_FIELD, Direction, IndexDefinition, IndexFieldSpec};
use crate::query::QueryShape;
use std::collections::BTreeSet;

/// Build the composite index a query of this shape needs.
///
/// - equality fields are ascending, in declared order
/// - a range field that is also the sort field takes the sort direction;
///   other range fields are ascending
/// - the sort field is appended if absent, otherwise its direction is forced
///   to the sort direction
/// - `__name__` always closes the index in the sort direction
pub fn synthesize(shape: &QueryShape, collection_group: CollectionGroup) -> IndexDefinition {
    let sort = shape.order_direction.index_direction();
    let mut fields: Vec<IndexFieldSpec> = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();

    for field in &shape.equality_fields {
        if seen.insert(field.as_str()) {
            fields.push(IndexFieldSpec::ascending(field.as_str()));
        }
    }

    for field in &shape.range_fields {
        if seen.insert(field.as_str()) {
            let order = if *field == shape.order_by_field {
                sort
            } else {
                Direction::Ascending
            };
            fields.push(IndexFieldSpec::new(field.as_str(), order));
        }
    }

    if seen.insert(shape.order_by_field.as_str()) {
        fields.push(IndexFieldSpec::new(shape.order_by_field.as_str(), sort));
    } else if let Some(existing) = fields
        .iter_mut()
        .find(|spec| spec.field_path == shape.order_by_field)
    {
        existing.order = sort;
    }

    fields.push(IndexFieldSpec::new(DOCUMENT_KEY_FIELD, sort));

    IndexDefinition::new(collection_group, fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::parse_link;
    use crate::query::{SortDirection, classify};
    use crate::query::fixtures::params;
    use serde_json::json;

    fn orders() -> CollectionGroup {
        CollectionGroup::from("orders")
    }

    #[test]
    fn equality_with_explicit_ascending_sort() {
        let shape = QueryShape::new("orders", "totalAmount", SortDirection::Asc)
            .with_equality("memberId")
            .with_equality("status");
        let index = synthesize(&shape, orders());
        assert_eq!(
            index.fields,
            vec![
                IndexFieldSpec::ascending("memberId"),
                IndexFieldSpec::ascending("status"),
                IndexFieldSpec::ascending("totalAmount"),
                IndexFieldSpec::ascending("__name__"),
            ]
        );
        assert_eq!(index.collection_group.as_str(), "orders");
    }

    #[test]
    fn range_before_default_sort() {
        let shape = QueryShape::new("orders", "createdAt", SortDirection::Desc).with_range("totalAmount");
        assert_eq!(
            synthesize(&shape, orders()).fields,
            vec![
                IndexFieldSpec::ascending("totalAmount"),
                IndexFieldSpec::descending("createdAt"),
                IndexFieldSpec::descending("__name__"),
            ]
        );
    }

    #[test]
    fn equality_only_gets_default_sort() {
        let shape = QueryShape::new("orders", "createdAt", SortDirection::Desc)
            .with_equality("memberId")
            .with_equality("status");
        assert_eq!(
            synthesize(&shape, orders()).fields,
            vec![
                IndexFieldSpec::ascending("memberId"),
                IndexFieldSpec::ascending("status"),
                IndexFieldSpec::descending("createdAt"),
                IndexFieldSpec::descending("__name__"),
            ]
        );
    }

    #[test]
    fn range_on_sort_field_appears_once_with_sort_direction() {
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let shape = QueryShape::new("orders", "createdAt", direction)
                .with_equality("status")
                .with_range("createdAt");
            let index = synthesize(&shape, orders());
            let created: Vec<_> = index
                .fields
                .iter()
                .filter(|spec| spec.field_path == "createdAt")
                .collect();
            assert_eq!(created.len(), 1);
            assert_eq!(created[0].order, direction.index_direction());
            assert_eq!(index.fields.len(), 3);
        }
    }

    #[test]
    fn sort_direction_overrides_equality_default() {
        // Sorting on an equality field keeps its position but takes the sort
        // direction.
        let shape = QueryShape::new("orders", "status", SortDirection::Desc).with_equality("status");
        assert_eq!(
            synthesize(&shape, orders()).fields,
            vec![
                IndexFieldSpec::descending("status"),
                IndexFieldSpec::descending("__name__"),
            ]
        );
    }

    #[test]
    fn document_key_is_always_last_in_sort_direction() {
        let shapes = [
            QueryShape::new("orders", "createdAt", SortDirection::Desc),
            QueryShape::new("orders", "createdAt", SortDirection::Asc).with_range("createdAt"),
            QueryShape::new("orders", "totalAmount", SortDirection::Asc)
                .with_equality("memberId")
                .with_range("createdAt"),
            QueryShape::new("orders", "__name__", SortDirection::Desc).with_equality("status"),
        ];
        for shape in shapes {
            let index = synthesize(&shape, orders());
            let last = index.fields.last().expect("never empty");
            assert_eq!(last.field_path, "__name__");
            assert_eq!(last.order, shape.order_direction.index_direction());
        }
    }

    #[test]
    fn agrees_with_console_link_for_soft_deleted_admins() {
        let classification = serde_json::from_value(json!({
            "equality": ["isActive", "role"],
            "range": [],
            "orderBy": {},
            "ignored": ["limit", "cursor"],
            "implicitEquality": [{"field": "deletedAt", "unlessParam": "includeDeleted"}]
        }))
        .unwrap();
        let shape = classify("admins", &params(json!({"isActive": true})), &classification);
        let synthesized = synthesize(&shape, CollectionGroup::from("admins"));

        let link = "https://console.firebase.google.com/u/0/project/liang-dev/firestore/databases/firestore-demo-api/indexes?create_composite=ClFwcm9qZWN0cy9saWFuZy1kZXYvZGF0YWJhc2VzL2ZpcmVzdG9yZS1kZW1vLWFwaS9jb2xsZWN0aW9uR3JvdXBzL2FkbWlucy9pbmRleGVzL18QARoNCglkZWxldGVkQXQQARoMCghpc0FjdGl2ZRABGg0KCWNyZWF0ZWRBdBACGgwKCF9fbmFtZV9fEAI";
        assert_eq!(synthesized, parse_link(link).unwrap().into_definition());
    }
}
