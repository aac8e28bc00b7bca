use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "metricjson.toml";

/// Prefix for environment variable overrides, nested keys split on `__`
pub const ENV_PREFIX: &str = "METRICJSON__";

/// Target type a selected JSON scalar is coerced to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selection of a scalar or array value that becomes one field per row
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicField {
    /// Path query into the document
    pub query: String,
    /// Output field name, defaults to the last query segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared type, the native JSON type is kept when absent
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl BasicField {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }
}

/// Selection of an object whose members are flattened into fields
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    /// Path query into the document
    pub query: String,
    /// Member key to output field name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub name_map: HashMap<String, String>,
    /// Member key to declared type
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub type_map: HashMap<String, FieldType>,
}

impl ObjectField {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn rename(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.name_map.insert(key.into(), name.into());
        self
    }

    pub fn with_type(mut self, key: impl Into<String>, field_type: FieldType) -> Self {
        self.type_map.insert(key.into(), field_type);
        self
    }
}

/// Rules that produce metrics of one name from a document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub metric_name: String,
    /// Reserved, has no effect on parsing
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metric_selection: String,
    #[serde(default)]
    pub basic_fields: Vec<BasicField>,
    #[serde(default)]
    pub object_fields: Vec<ObjectField>,
}

impl RuleSet {
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            ..Default::default()
        }
    }

    pub fn basic(mut self, field: BasicField) -> Self {
        self.basic_fields.push(field);
        self
    }

    pub fn object(mut self, field: ObjectField) -> Self {
        self.object_fields.push(field);
        self
    }
}

/// Rendering of produced metrics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// InfluxDB line protocol
    #[default]
    Line,
    /// One JSON object per line
    Json,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Output settings for the command line front end
    #[serde(default)]
    pub output: OutputConfig,
    /// Rule sets, evaluated in order against every document
    #[serde(default)]
    pub rule_sets: Vec<RuleSet>,
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path.as_ref()))
            .extract()
            .map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check the rule sets for values that cannot produce sensible metrics
    pub fn validate(&self) -> anyhow::Result<()> {
        for (index, rule_set) in self.rule_sets.iter().enumerate() {
            if rule_set.metric_name.is_empty() {
                anyhow::bail!("Rule set #{index}: metric_name cannot be empty");
            }

            for field in &rule_set.basic_fields {
                if field.query.is_empty() {
                    anyhow::bail!(
                        "Rule set '{}': basic field query cannot be empty",
                        rule_set.metric_name
                    );
                }
                if field.name.as_deref() == Some("") {
                    anyhow::bail!(
                        "Rule set '{}': basic field '{}' has an empty name",
                        rule_set.metric_name,
                        field.query
                    );
                }
            }

            for field in &rule_set.object_fields {
                if field.query.is_empty() {
                    anyhow::bail!(
                        "Rule set '{}': object field query cannot be empty",
                        rule_set.metric_name
                    );
                }
                for (key, name) in &field.name_map {
                    if name.replace(' ', "").is_empty() {
                        anyhow::bail!(
                            "Rule set '{}': name_map entry '{key}' of '{}' maps to an empty name",
                            rule_set.metric_name,
                            field.query
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
