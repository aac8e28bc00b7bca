//! Evaluation of the basic and object field rules of a rule set

use common::config::{BasicField, ObjectField};
use common::model::Metric;
use serde_json::Value;

use crate::clock::Clock;
use crate::error::ParseError;
use crate::expand::expand;
use crate::flatten::flatten;
use crate::query::query;
use crate::row::WorkingRow;

/// Field name used when a rule does not give one: the last path segment
pub fn default_field_name(query: &str) -> &str {
    query.rsplit('.').next().unwrap_or(query)
}

/// Run every basic field rule and merge their rows into one set
pub fn process_basic_fields(
    metric_name: &str,
    fields: &[BasicField],
    document: &Value,
    clock: &dyn Clock,
) -> Result<Vec<Metric>, ParseError> {
    let mut groups = Vec::with_capacity(fields.len());

    for field in fields {
        let result = query(document, &field.query);
        let field_name = field
            .name
            .as_deref()
            .unwrap_or_else(|| default_field_name(&field.query));

        if result.is_object() {
            return Err(ParseError::use_object_selection(field_name));
        }

        let row = WorkingRow::new(
            field_name,
            field.field_type,
            Metric::new(metric_name, clock.now()),
            result.value(),
        );
        let group: Vec<Metric> = expand(row, clock)?
            .into_iter()
            .map(WorkingRow::into_metric)
            .collect();

        tracing::trace!(
            metric = %metric_name,
            query = %field.query,
            rows = group.len(),
            "Expanded basic field"
        );
        groups.push(group);
    }

    Ok(merge_row_groups(groups))
}

/// Fold row groups into the largest one
///
/// Groups are ordered by size (ties keep rule order). Every row of a group
/// has its fields written into every row of the next group, so the fields of
/// all smaller groups reach the rows of the last one. Only the last group is
/// returned.
pub fn merge_row_groups(mut groups: Vec<Vec<Metric>>) -> Vec<Metric> {
    groups.retain(|group| !group.is_empty());
    groups.sort_by_key(Vec::len);

    for i in 1..groups.len() {
        let (done, rest) = groups.split_at_mut(i);
        let previous = &done[i - 1];
        let current = &mut rest[0];

        for source in previous {
            for target in current.iter_mut() {
                for (key, value) in source.fields() {
                    target.add_field(key.clone(), value.clone());
                }
            }
        }
    }

    groups.pop().unwrap_or_default()
}

/// Run every object field rule, concatenating the rows they produce
pub fn process_object_fields(
    metric_name: &str,
    fields: &[ObjectField],
    document: &Value,
    clock: &dyn Clock,
) -> Result<Vec<Metric>, ParseError> {
    let mut metrics = Vec::new();

    for field in fields {
        let result = query(document, &field.query);
        if !result.exists() {
            tracing::debug!(
                metric = %metric_name,
                query = %field.query,
                "Object field matched nothing, emitting empty root row"
            );
        }

        let root = WorkingRow::new(
            default_field_name(&field.query),
            None,
            Metric::new(metric_name, clock.now()),
            result.value(),
        );
        let rows = flatten(root, &field.name_map, &field.type_map, clock)?;

        tracing::trace!(
            metric = %metric_name,
            query = %field.query,
            rows = rows.len(),
            "Flattened object field"
        );
        metrics.extend(rows.into_iter().map(WorkingRow::into_metric));
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::USE_OBJECT_SELECTION;
    use chrono::{TimeZone, Utc};
    use common::config::FieldType;
    use common::model::FieldValue;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
    }

    fn metric(fields: &[(&str, FieldValue)]) -> Metric {
        let mut metric = Metric::new("m", clock().0);
        for (key, value) in fields {
            metric.add_field(*key, value.clone());
        }
        metric
    }

    #[test]
    fn test_default_field_name() {
        assert_eq!(default_field_name("a.b.c"), "c");
        assert_eq!(default_field_name("single"), "single");
        assert_eq!(default_field_name("list.#"), "#");
        assert_eq!(default_field_name("trailing."), "");
    }

    #[test]
    fn test_single_scalar_rule() {
        let doc = json!({"a": {"b": 5}});
        let metrics =
            process_basic_fields("m", &[BasicField::new("a.b")], &doc, &clock()).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].fields(), &[("b".to_string(), FieldValue::Float(5.0))]);
        assert_eq!(metrics[0].name, "m");
    }

    #[test]
    fn test_explicit_name_and_type() {
        let doc = json!({"values": ["1", "2"]});
        let rule = BasicField::new("values")
            .with_name("value")
            .with_type(FieldType::Int);
        let metrics = process_basic_fields("m", &[rule], &doc, &clock()).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].field("value"), Some(&FieldValue::Int(2)));
    }

    #[test]
    fn test_object_result_is_rejected() {
        let doc = json!({"station": {"id": 1}});
        let err = process_basic_fields("m", &[BasicField::new("station")], &doc, &clock())
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnsupportedShape { ref field, reason } if field == "station" && reason == USE_OBJECT_SELECTION
        ));
    }

    #[test]
    fn test_two_groups_fold_into_larger() {
        let doc = json!({"a": [1, 2], "b": [10, 20, 30]});
        let rules = [BasicField::new("b"), BasicField::new("a")];
        let metrics = process_basic_fields("m", &rules, &doc, &clock()).unwrap();

        assert_eq!(metrics.len(), 3);
        for (metric, b) in metrics.iter().zip([10.0, 20.0, 30.0]) {
            assert_eq!(metric.field("b"), Some(&FieldValue::Float(b)));
            // every row of the smaller group is written in turn, the last wins
            assert_eq!(metric.field("a"), Some(&FieldValue::Float(2.0)));
        }
    }

    #[test]
    fn test_missing_rule_contributes_nothing() {
        let doc = json!({"a": [1, 2]});
        let rules = [BasicField::new("a"), BasicField::new("nope")];
        let metrics = process_basic_fields("m", &rules, &doc, &clock()).unwrap();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|m| m.field_count() == 1));

        let none = process_basic_fields("m", &[BasicField::new("nope")], &doc, &clock()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_merge_accumulates_through_chain() {
        let groups = vec![
            vec![
                metric(&[("c", FieldValue::Int(1))]),
                metric(&[("c", FieldValue::Int(2))]),
                metric(&[("c", FieldValue::Int(3))]),
            ],
            vec![metric(&[("a", FieldValue::Int(1))])],
            vec![
                metric(&[("b", FieldValue::Int(1))]),
                metric(&[("b", FieldValue::Int(2))]),
            ],
        ];

        let merged = merge_row_groups(groups);
        assert_eq!(merged.len(), 3);
        for (row, c) in merged.iter().zip(1..) {
            assert_eq!(row.field("c"), Some(&FieldValue::Int(c)));
            assert_eq!(row.field("b"), Some(&FieldValue::Int(2)));
            assert_eq!(row.field("a"), Some(&FieldValue::Int(1)));
        }
    }

    #[test]
    fn test_merge_ties_keep_rule_order() {
        let groups = vec![
            vec![metric(&[("x", FieldValue::Int(1))])],
            vec![metric(&[("x", FieldValue::Int(2))])],
        ];
        // the later group is the target, its own value is overwritten
        let merged = merge_row_groups(groups);
        assert_eq!(merged, vec![metric(&[("x", FieldValue::Int(1))])]);
    }

    #[test]
    fn test_merge_without_groups() {
        assert!(merge_row_groups(Vec::new()).is_empty());
        assert!(merge_row_groups(vec![Vec::new(), Vec::new()]).is_empty());
    }

    #[test]
    fn test_object_rules_concatenate() {
        let doc = json!({
            "station": {"name": "north", "readings": [1, 2]},
            "owner": {"id": "x"}
        });
        let rules = [
            ObjectField::new("station").with_type("name", FieldType::String),
            ObjectField::new("missing"),
            ObjectField::new("owner").rename("id", "owner_id"),
        ];
        let metrics = process_object_fields("m", &rules, &doc, &clock()).unwrap();

        assert_eq!(metrics.len(), 5);
        assert_eq!(metrics[0].field("readings"), Some(&FieldValue::Float(1.0)));
        assert_eq!(metrics[1].field("readings"), Some(&FieldValue::Float(2.0)));
        assert_eq!(metrics[2].fields(), &[("name".to_string(), FieldValue::from("north"))]);
        // the unmatched rule still contributes its root row
        assert_eq!(metrics[3].field_count(), 0);
        assert_eq!(metrics[4].fields(), &[("owner_id".to_string(), FieldValue::from("x"))]);
    }

    #[test]
    fn test_unmatched_object_rule_emits_root_row() {
        let doc = json!({"o": {}});
        let metrics =
            process_object_fields("m", &[ObjectField::new("missing")], &doc, &clock()).unwrap();
        assert_eq!(metrics, vec![Metric::new("m", clock().0)]);
    }

    #[test]
    fn test_object_rule_on_scalar_uses_last_segment() {
        let doc = json!({"station": {"elevation": 120}});
        let metrics = process_object_fields(
            "m",
            &[ObjectField::new("station.elevation")],
            &doc,
            &clock(),
        )
        .unwrap();
        assert_eq!(metrics[0].field("elevation"), Some(&FieldValue::Float(120.0)));
    }
}
