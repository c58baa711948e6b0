// Tool catalog - closed set of tool names, their parameter schemas and dispatch
use crate::application::dashboard_tools::DashboardTools;
use crate::application::errors::ToolError;
use crate::application::tool_params::{
    ChartTemplateParams, ComponentIdParams, CreateComponentParams, FetchComponentParams,
    QueryPostgresSchemaParams, SetGraphqlEndpointParams, SetGridLayoutParams,
    SetPostgresSchemaParams, TableTemplateParams, UpdateComponentParams,
};
use crate::application::tool_result::ToolResult;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use strum::IntoEnumIterator;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    GetDashboard,
    SetGridLayout,
    CreateComponent,
    UpdateComponent,
    RemoveComponent,
    GetComponent,
    FetchComponentData,
    RefreshAllComponents,
    GetGridInfo,
    SetPostgresSchema,
    GetPostgresSchema,
    QueryPostgresSchema,
    SetGraphqlEndpoint,
    GenerateChartTemplate,
    GenerateTableTemplate,
}

/// Parameter object of the tools that take none
#[derive(Debug, JsonSchema)]
pub struct NoParams {}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolName {
    pub fn description(self) -> &'static str {
        match self {
            ToolName::GetDashboard => "Return the full dashboard state.",
            ToolName::SetGridLayout => {
                "Replace the grid layout. Omitted fields keep their current value. Rejected if any component would lose its area."
            }
            ToolName::CreateComponent => {
                "Create a component in a free grid area. Ids are unique and the area must exist in the layout."
            }
            ToolName::UpdateComponent => {
                "Update a component either by writing `value` at a JSON `path` (e.g. $.dataConfig.query) or by merging top-level `updates`."
            }
            ToolName::RemoveComponent => "Remove a component and free its grid area.",
            ToolName::GetComponent => "Return one component by id.",
            ToolName::FetchComponentData => {
                "Fetch data for one component from its data source and apply its transform. Set `force` to bypass the cache."
            }
            ToolName::RefreshAllComponents => {
                "Refetch every component concurrently. Failures are recorded per component."
            }
            ToolName::GetGridInfo => {
                "Return the grid layout, area usage and a summary of each component."
            }
            ToolName::SetPostgresSchema => {
                "Store the PostgreSQL schema snapshot used for query authoring. Shape: {\"schemas\": [{\"name\", \"tables\": [{\"name\", \"columns\": [...]}]}]}; any other fields are kept as-is."
            }
            ToolName::GetPostgresSchema => "Return the stored PostgreSQL schema snapshot.",
            ToolName::QueryPostgresSchema => {
                "Look up tables by name (optionally within one schema), a single schema by name, or list all schemas."
            }
            ToolName::SetGraphqlEndpoint => {
                "Set the GraphQL endpoint used by components that do not name their own."
            }
            ToolName::GenerateChartTemplate => {
                "Build a transform template turning rows into chart labels and datasets."
            }
            ToolName::GenerateTableTemplate => {
                "Build a transform template turning rows into table columns and formatted rows."
            }
        }
    }

    pub fn parameters_schema(self) -> Value {
        let schema = match self {
            ToolName::GetDashboard
            | ToolName::RefreshAllComponents
            | ToolName::GetGridInfo
            | ToolName::GetPostgresSchema => schema_for!(NoParams),
            ToolName::SetGridLayout => schema_for!(SetGridLayoutParams),
            ToolName::CreateComponent => schema_for!(CreateComponentParams),
            ToolName::UpdateComponent => schema_for!(UpdateComponentParams),
            ToolName::RemoveComponent | ToolName::GetComponent => schema_for!(ComponentIdParams),
            ToolName::FetchComponentData => schema_for!(FetchComponentParams),
            ToolName::SetPostgresSchema => schema_for!(SetPostgresSchemaParams),
            ToolName::QueryPostgresSchema => schema_for!(QueryPostgresSchemaParams),
            ToolName::SetGraphqlEndpoint => schema_for!(SetGraphqlEndpointParams),
            ToolName::GenerateChartTemplate => schema_for!(ChartTemplateParams),
            ToolName::GenerateTableTemplate => schema_for!(TableTemplateParams),
        };
        schema.to_value()
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.to_string(),
            description: self.description(),
            parameters: self.parameters_schema(),
        }
    }
}

pub fn definitions() -> Vec<ToolDefinition> {
    ToolName::iter().map(ToolName::definition).collect()
}

fn parse<T: DeserializeOwned>(tool: ToolName, params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Invokes `name` with `params`; an absent parameter object counts as `{}`
pub async fn dispatch(tools: &DashboardTools, name: &str, params: Value) -> ToolResult {
    let Ok(tool) = ToolName::from_str(name) else {
        tracing::info!("Unknown tool requested: {}", name);
        return ToolError::UnknownTool(name.to_string()).into();
    };
    let params = match params {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    match invoke(tools, tool, params).await {
        Ok(result) => result,
        Err(e) => {
            tracing::info!("Tool {} called with bad parameters: {}", tool, e);
            e.into()
        }
    }
}

async fn invoke(tools: &DashboardTools, tool: ToolName, params: Value) -> Result<ToolResult, ToolError> {
    let result = match tool {
        ToolName::GetDashboard => tools.get_dashboard().await,
        ToolName::SetGridLayout => tools.set_grid_layout(parse(tool, params)?).await,
        ToolName::CreateComponent => tools.create_component(parse(tool, params)?).await,
        ToolName::UpdateComponent => tools.update_component(parse(tool, params)?).await,
        ToolName::RemoveComponent => tools.remove_component(parse(tool, params)?).await,
        ToolName::GetComponent => tools.get_component(parse(tool, params)?).await,
        ToolName::FetchComponentData => tools.fetch_component_data(parse(tool, params)?).await,
        ToolName::RefreshAllComponents => tools.refresh_all_components().await,
        ToolName::GetGridInfo => tools.get_grid_info().await,
        ToolName::SetPostgresSchema => tools.set_postgres_schema(parse(tool, params)?).await,
        ToolName::GetPostgresSchema => tools.get_postgres_schema().await,
        ToolName::QueryPostgresSchema => tools.query_postgres_schema(parse(tool, params)?).await,
        ToolName::SetGraphqlEndpoint => tools.set_graphql_endpoint(parse(tool, params)?).await,
        ToolName::GenerateChartTemplate => tools.generate_chart_template(parse(tool, params)?),
        ToolName::GenerateTableTemplate => tools.generate_table_template(parse(tool, params)?),
    };
    Ok(result)
}
