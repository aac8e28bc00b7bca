//! Rule driven conversion of JSON documents into flat metrics
//!
//! A [`JsonParser`] holds a list of [`RuleSet`]s. For every document it runs
//! the basic field rules of each set (scalars and arrays, merged across rules)
//! followed by its object field rules (flattened objects), and returns all
//! produced metrics in rule set order.

pub mod clock;
pub mod convert;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod query;
pub mod row;
pub mod selection;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use common::config::{Configuration, RuleSet};
use common::model::Metric;
use serde_json::Value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ParseError;
pub use query::{QueryResult, query};

/// Capabilities shared by metric parsers
pub trait MetricParser {
    /// Parse a complete input buffer into metrics
    fn parse(&self, input: &[u8]) -> Result<Vec<Metric>, ParseError>;

    /// Parse a single line of input into one metric
    fn parse_line(&self, line: &str) -> Result<Metric, ParseError>;

    /// Tags to add to every produced metric
    fn set_default_tags(&mut self, tags: HashMap<String, String>);
}

/// Document parser driven by configured rule sets
#[derive(Clone)]
pub struct JsonParser {
    rule_sets: Vec<RuleSet>,
    clock: Arc<dyn Clock>,
}

impl JsonParser {
    /// Create a parser stamping metrics with the current time
    pub fn new(rule_sets: Vec<RuleSet>) -> Self {
        Self {
            rule_sets,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.rule_sets.clone())
    }

    /// Replace the timestamp source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run all rule sets against an already decoded document
    pub fn parse_value(&self, document: &Value) -> Result<Vec<Metric>, ParseError> {
        let clock = self.clock.as_ref();
        let mut metrics = Vec::new();

        for rule_set in &self.rule_sets {
            let basic = selection::process_basic_fields(
                &rule_set.metric_name,
                &rule_set.basic_fields,
                document,
                clock,
            )?;
            let objects = selection::process_object_fields(
                &rule_set.metric_name,
                &rule_set.object_fields,
                document,
                clock,
            )?;

            tracing::debug!(
                metric = %rule_set.metric_name,
                basic = basic.len(),
                objects = objects.len(),
                "Rule set evaluated"
            );
            metrics.extend(basic);
            metrics.extend(objects);
        }

        Ok(metrics)
    }
}

impl MetricParser for JsonParser {
    fn parse(&self, input: &[u8]) -> Result<Vec<Metric>, ParseError> {
        let document: Value = serde_json::from_slice(input)
            .map_err(|e| ParseError::InvalidDocument(e.to_string()))?;
        self.parse_value(&document)
    }

    fn parse_line(&self, _line: &str) -> Result<Metric, ParseError> {
        Err(ParseError::UnsupportedOperation(
            "parse_line is meant for line protocol input and is not implemented by the JSON parser"
                .to_string(),
        ))
    }

    fn set_default_tags(&mut self, _tags: HashMap<String, String>) {}
}

impl fmt::Debug for JsonParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonParser")
            .field("rule_sets", &self.rule_sets)
            .finish_non_exhaustive()
    }
}
