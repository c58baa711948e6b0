// Data source descriptors - where a component's data comes from and how it is reshaped
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataConfig {
    #[serde(flatten)]
    pub source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformConfig>,
    /// Overrides the fetcher-wide cache TTL for this component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_ms: Option<u64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Static { data: Value::Null },
            transform: None,
            cache_ttl_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataSource {
    Postgresql {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<String>,
    },
    Graphql {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variables: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
    Static {
        #[serde(default)]
        data: Value,
    },
}

/// Post-processing steps, applied template first, then query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransformConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Extra variables merged into the template context next to `data`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

pub fn soft_error(reason: impl Into<String>) -> Value {
    json!({ "error": reason.into() })
}

/// A soft error is an object carrying nothing but an `error` member
pub fn as_soft_error(value: &Value) -> Option<&str> {
    match value.as_object() {
        Some(map) if map.len() == 1 => map.get("error").and_then(Value::as_str),
        _ => None,
    }
}
