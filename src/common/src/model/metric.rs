use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single field value carried by a [`Metric`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{s}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A flat metric record: measurement name, tag set, ordered field set and timestamp.
///
/// Field keys are unique within a metric. Writing an existing key replaces the
/// value in place, so the first insertion position of a key is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    #[serde(with = "ordered_fields")]
    fields: Vec<(String, FieldValue)>,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    /// Add a field, replacing the value if the key already exists
    pub fn add_field(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Render the metric as an InfluxDB line protocol line
    ///
    /// Non-finite floats cannot be expressed in line protocol and are left out.
    /// Returns `None` when no field remains, line protocol requires at least one.
    pub fn to_line_protocol(&self) -> Option<String> {
        let fields: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let rendered = match value {
                    FieldValue::String(s) => format!("\"{}\"", escape(s, &['"', '\\'])),
                    FieldValue::Int(v) => format!("{v}i"),
                    FieldValue::Float(v) if !v.is_finite() => return None,
                    FieldValue::Float(v) => format!("{v}"),
                    FieldValue::Bool(v) => format!("{v}"),
                };
                Some(format!("{}={rendered}", escape(key, &[',', '=', ' '])))
            })
            .collect();

        if fields.is_empty() {
            return None;
        }

        let mut line = escape(&self.name, &[',', ' ']);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }

        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&nanos.to_string());
        }

        Some(line)
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Serialize fields as a JSON object while keeping insertion order
mod ordered_fields {
    use super::FieldValue;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(fields: &[(String, FieldValue)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, FieldValue)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Vec<(String, FieldValue)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to scalar values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
                    fields.push((key, value));
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_add_field_overwrites_in_place() {
        let mut metric = Metric::new("cpu", ts());
        metric.add_field("a", FieldValue::Int(1));
        metric.add_field("b", FieldValue::Int(2));
        metric.add_field("a", FieldValue::Int(3));

        assert_eq!(metric.field_count(), 2);
        assert_eq!(metric.fields()[0], ("a".to_string(), FieldValue::Int(3)));
        assert_eq!(metric.field("b"), Some(&FieldValue::Int(2)));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = Metric::new("cpu", ts());
        original.add_field("a", FieldValue::Int(1));

        let mut copy = original.clone();
        copy.add_field("b", FieldValue::Bool(true));

        assert!(!original.has_field("b"));
        assert!(copy.has_field("a"));
    }

    #[test]
    fn test_line_protocol() {
        let mut metric = Metric::new("weather station", ts());
        metric.add_tag("site", "a=b");
        metric.add_field("temp", FieldValue::Float(21.5));
        metric.add_field("count", FieldValue::Int(3));
        metric.add_field("label", FieldValue::String("say \"hi\"".to_string()));
        metric.add_field("ok", FieldValue::Bool(true));
        metric.add_field("nan", FieldValue::Float(f64::NAN));

        assert_eq!(
            metric.to_line_protocol().as_deref(),
            Some("weather\\ station,site=a\\=b temp=21.5,count=3i,label=\"say \\\"hi\\\"\",ok=true 1704067200000000000")
        );
    }

    #[test]
    fn test_line_protocol_needs_a_field() {
        let mut metric = Metric::new("empty", ts());
        assert_eq!(metric.to_line_protocol(), None);

        metric.add_field("nan", FieldValue::Float(f64::NAN));
        assert_eq!(metric.to_line_protocol(), None);

        metric.add_field("ok", FieldValue::Bool(false));
        assert_eq!(
            metric.to_line_protocol().as_deref(),
            Some("empty ok=false 1704067200000000000")
        );
    }

    #[test]
    fn test_json_keeps_field_order() {
        let mut metric = Metric::new("m", ts());
        metric.add_field("z", FieldValue::Int(1));
        metric.add_field("a", FieldValue::String("x".to_string()));

        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains(r#""fields":{"z":1,"a":"x"}"#), "{json}");

        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metric);
    }
}
