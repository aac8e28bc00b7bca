//! Object flattening
//!
//! The members of a selected object become fields of one metric, no matter how
//! deep they are nested: `{"a": 1, "b": {"c": 2}}` gives `a=1,c=2`. Array
//! members cannot live in that single metric, so each of them is expanded
//! into extra rows that start from the fields collected up to that member.

use std::collections::HashMap;

use common::config::FieldType;
use common::model::Metric;
use serde_json::Value;

use crate::clock::Clock;
use crate::convert::convert;
use crate::error::ParseError;
use crate::expand::expand;
use crate::row::WorkingRow;

/// Flatten the object at `row.node` into `row.metric`
///
/// Returns the rows produced by array members in document order, followed by
/// the root row itself.
pub fn flatten<'v>(
    mut row: WorkingRow<'v>,
    name_map: &HashMap<String, String>,
    type_map: &HashMap<String, FieldType>,
    clock: &dyn Clock,
) -> Result<Vec<WorkingRow<'v>>, ParseError> {
    let mut rows = Vec::new();
    if let Some(node) = row.node {
        let flattener = Flattener {
            name_map,
            type_map,
            clock,
        };
        flattener.visit(&mut row.metric, &row.field_name, node, &mut rows)?;
    }
    rows.push(row);
    Ok(rows)
}

struct Flattener<'a> {
    name_map: &'a HashMap<String, String>,
    type_map: &'a HashMap<String, FieldType>,
    clock: &'a dyn Clock,
}

impl Flattener<'_> {
    fn visit<'v>(
        &self,
        metric: &mut Metric,
        field_name: &str,
        node: &'v Value,
        out: &mut Vec<WorkingRow<'v>>,
    ) -> Result<(), ParseError> {
        for (key, value) in members(node) {
            let output_name = self.output_name(key, field_name);
            let branch_name = if key.is_empty() { field_name } else { key };

            match value {
                Value::Array(_) => {
                    let branch = WorkingRow::new(branch_name, None, metric.clone(), Some(value));
                    out.extend(expand(branch, self.clock)?);
                }
                Value::Object(_) => {
                    // only the shared metric matters, rows found below are dropped
                    let mut nested = Vec::new();
                    self.visit(metric, branch_name, value, &mut nested)?;
                }
                scalar => {
                    let declared = self.type_map.get(key).copied();
                    if let Some(converted) = convert(scalar, declared, &output_name)? {
                        metric.add_field(output_name, converted);
                    }
                }
            }
        }
        Ok(())
    }

    fn output_name(&self, key: &str, fallback: &str) -> String {
        if key.is_empty() {
            return fallback.to_string();
        }
        let name = self.name_map.get(key).map_or(key, String::as_str);
        name.replace(' ', "")
    }
}

/// Direct children of a node as `(key, value)` pairs
///
/// Array elements and a bare scalar have an empty key.
fn members(node: &Value) -> Vec<(&str, &Value)> {
    match node {
        Value::Object(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        Value::Array(items) => items.iter().map(|v| ("", v)).collect(),
        scalar => vec![("", scalar)],
    }
}
