use common::config::FieldType;
use common::model::Metric;
use serde_json::Value;

use crate::clock::Clock;
use crate::convert::convert;
use crate::error::ParseError;

/// A metric under construction together with the part of the document it
/// still has to consume
#[derive(Debug, Clone)]
pub struct WorkingRow<'v> {
    /// Name of the field this branch contributes
    pub field_name: String,
    /// Declared type for that field
    pub field_type: Option<FieldType>,
    pub metric: Metric,
    /// Current position in the document, `None` when the query matched nothing
    pub node: Option<&'v Value>,
}

impl<'v> WorkingRow<'v> {
    pub fn new(
        field_name: impl Into<String>,
        field_type: Option<FieldType>,
        metric: Metric,
        node: Option<&'v Value>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            metric,
            node,
        }
    }

    /// Start a new branch at `node` carrying a copy of the accumulated fields
    ///
    /// The branch metric is freshly stamped by `clock`. Only fields are carried
    /// over, the copy shares nothing with this row.
    pub fn branch(&self, node: &'v Value, clock: &dyn Clock) -> WorkingRow<'v> {
        let mut metric = Metric::new(self.metric.name.clone(), clock.now());
        for (key, value) in self.metric.fields() {
            metric.add_field(key.clone(), value.clone());
        }

        WorkingRow {
            field_name: self.field_name.clone(),
            field_type: self.field_type,
            metric,
            node: Some(node),
        }
    }

    /// Convert `value` with this row's declared type and store it under the
    /// row's field name
    pub fn add_value(&mut self, value: &Value) -> Result<(), ParseError> {
        if let Some(converted) = convert(value, self.field_type, &self.field_name)? {
            self.metric.add_field(self.field_name.clone(), converted);
        }
        Ok(())
    }

    pub fn into_metric(self) -> Metric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use common::model::FieldValue;
    use serde_json::json;

    #[test]
    fn test_branch_copies_fields_not_identity() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 5).unwrap();

        let mut metric = Metric::new("m", start);
        metric.add_field("a", FieldValue::Int(1));
        let node = json!([1, 2]);
        let row = WorkingRow::new("x", Some(FieldType::Int), metric, Some(&node));

        let mut branch = row.branch(&node[0], &FixedClock(later));
        branch.add_value(&node[0]).unwrap();

        assert_eq!(branch.metric.timestamp, later);
        assert_eq!(branch.metric.field("a"), Some(&FieldValue::Int(1)));
        assert_eq!(branch.metric.field("x"), Some(&FieldValue::Int(1)));
        assert!(!row.metric.has_field("x"));
    }

    #[test]
    fn test_add_value_skips_untyped_null() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut row = WorkingRow::new("x", None, Metric::new("m", start), None);
        row.add_value(&Value::Null).unwrap();
        assert_eq!(row.into_metric().field_count(), 0);
    }
}
