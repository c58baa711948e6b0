// Parameter objects accepted by the tool catalog
use crate::domain::dashboard::ComponentType;
use crate::domain::data_source::DataConfig;
use crate::domain::schema::PostgresSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Any field left out keeps its current value
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetGridLayoutParams {
    #[serde(default)]
    pub columns: Option<String>,
    #[serde(default)]
    pub rows: Option<String>,
    #[serde(default)]
    pub gap: Option<String>,
    #[serde(default)]
    pub template_areas: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateComponentParams {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub grid_area: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data_config: Option<DataConfig>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub style: Option<Value>,
}

/// Either `path` + `value` for a targeted write, or `updates` to merge top-level fields
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComponentParams {
    pub id: String,
    #[serde(default)]
    pub updates: Option<Map<String, Value>>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ComponentIdParams {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FetchComponentParams {
    pub id: String,
    /// Skip the cache and hit the data source
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetPostgresSchemaParams {
    pub schema: PostgresSchema,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryPostgresSchemaParams {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetGraphqlEndpointParams {
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FieldDescriptor {
    pub field: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartTemplateParams {
    /// line, bar, area, pie, ... passed through to the renderer
    #[serde(default = "default_chart_type")]
    pub chart_type: String,
    pub label_field: String,
    pub value_fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub title: Option<String>,
}

fn default_chart_type() -> String {
    "line".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    Text,
    Number,
    Currency,
    Percent,
    Date,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub field: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub format: Option<ColumnFormat>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableTemplateParams {
    pub columns: Vec<ColumnDescriptor>,
}
