// Dashboard tool service - the only writer of a session's dashboard state
use crate::application::data_fetcher::{DataFetcher, FetchOptions};
use crate::application::errors::ToolError;
use crate::application::template_builders::{chart_template, table_template};
use crate::application::tool_params::{
    ChartTemplateParams, ComponentIdParams, CreateComponentParams, FetchComponentParams,
    QueryPostgresSchemaParams, SetGraphqlEndpointParams, SetGridLayoutParams,
    SetPostgresSchemaParams, TableTemplateParams, UpdateComponentParams,
};
use crate::application::tool_result::ToolResult;
use crate::domain::dashboard::{Component, DashboardState, FetchStatus};
use crate::domain::data_source::{as_soft_error, DataConfig};
use crate::domain::grid::{
    area_occupant, extract_grid_areas, get_grid_stats, is_valid_grid_area, validate_grid_layout,
    GridLayout,
};
use crate::domain::path::{navigate, set_value_at_path};
use crate::domain::payload::ComponentPayload;
use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use tokio::sync::{watch, RwLock};

type ToolOutcome = Result<ToolResult, ToolError>;

pub struct DashboardTools {
    state: RwLock<DashboardState>,
    fetcher: DataFetcher,
    revision: watch::Sender<u64>,
}

fn settle(tool: &str, outcome: ToolOutcome) -> ToolResult {
    match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::info!("Tool {} rejected: {}", tool, e);
            e.into()
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Validation every component placement must pass
fn check_placement(state: &DashboardState, id: &str, area: &str) -> Result<(), ToolError> {
    if !is_valid_grid_area(area, &state.grid.template_areas) {
        return Err(ToolError::InvalidGridArea {
            area: area.to_string(),
            available: extract_grid_areas(&state.grid.template_areas),
        });
    }
    match area_occupant(area, state) {
        Some(occupant) if occupant.id != id => Err(ToolError::AreaOccupied {
            area: area.to_string(),
            occupant: occupant.id.clone(),
        }),
        _ => Ok(()),
    }
}

impl DashboardTools {
    pub fn new(state: DashboardState, fetcher: DataFetcher) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(state),
            fetcher,
            revision,
        }
    }

    /// Ticks once per committed mutation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    fn committed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub async fn get_dashboard(&self) -> ToolResult {
        let state = self.state.read().await;
        ToolResult::success("Current dashboard state").with_data(to_json(&*state))
    }

    pub async fn set_grid_layout(&self, params: SetGridLayoutParams) -> ToolResult {
        settle("set_grid_layout", self.try_set_grid_layout(params).await)
    }

    async fn try_set_grid_layout(&self, params: SetGridLayoutParams) -> ToolOutcome {
        let mut state = self.state.write().await;

        let candidate = GridLayout {
            columns: params.columns.unwrap_or_else(|| state.grid.columns.clone()),
            rows: params.rows.unwrap_or_else(|| state.grid.rows.clone()),
            gap: params.gap.unwrap_or_else(|| state.grid.gap.clone()),
            template_areas: params
                .template_areas
                .unwrap_or_else(|| state.grid.template_areas.clone()),
        }
        .normalized();

        let validation = validate_grid_layout(&candidate);
        if !validation.valid {
            return Err(ToolError::InvalidLayout(validation.errors));
        }

        let orphans: Vec<(String, String)> = state
            .components
            .values()
            .filter(|c| !is_valid_grid_area(&c.grid_area, &candidate.template_areas))
            .map(|c| (c.id.clone(), c.grid_area.clone()))
            .collect();
        if !orphans.is_empty() {
            return Err(ToolError::OrphanedComponents(orphans));
        }

        state.grid = candidate;
        self.committed();

        Ok(ToolResult::success("Grid layout updated").with_data(json!({
            "grid": to_json(&state.grid),
            "stats": to_json(&get_grid_stats(&state)),
        })))
    }

    pub async fn create_component(&self, params: CreateComponentParams) -> ToolResult {
        settle("create_component", self.try_create_component(params).await)
    }

    async fn try_create_component(&self, params: CreateComponentParams) -> ToolOutcome {
        let id = params.id.trim().to_string();
        if id.is_empty() {
            return Err(ToolError::InvalidParams {
                tool: "create_component".to_string(),
                reason: "id must not be empty".to_string(),
            });
        }

        let mut state = self.state.write().await;
        if state.components.contains_key(&id) {
            return Err(ToolError::DuplicateComponent(id));
        }
        check_placement(&state, &id, &params.grid_area)?;

        let mut component = Component::new(id.clone(), params.kind, params.grid_area, params.title);
        component.description = params.description;
        component.data_config = params.data_config.unwrap_or_default();
        component.data = params.data.unwrap_or(Value::Null);
        component.style = params.style;

        let data = to_json(&component);
        state.components.insert(id.clone(), component);
        self.committed();

        Ok(ToolResult::success(format!("Component '{}' created", id)).with_data(data))
    }

    pub async fn update_component(&self, params: UpdateComponentParams) -> ToolResult {
        settle("update_component", self.try_update_component(params).await)
    }

    async fn try_update_component(&self, params: UpdateComponentParams) -> ToolOutcome {
        let mut state = self.state.write().await;
        let id = params.id;
        let current = state
            .components
            .get(&id)
            .ok_or_else(|| ToolError::ComponentNotFound(id.clone()))?;

        let invalid = |reason: String| ToolError::InvalidUpdate {
            id: id.clone(),
            reason,
        };

        let mut record = to_json(current);
        let message = match (params.path, params.updates) {
            (Some(path), _) => {
                let verb = if navigate(&record, &path).exists { "set" } else { "created" };
                record = set_value_at_path(&record, &path, params.value)
                    .map_err(|e| invalid(e.to_string()))?;
                format!("Component '{}' updated ({} {})", id, verb, path)
            }
            (None, Some(updates)) => {
                let Some(fields) = record.as_object_mut() else {
                    return Err(invalid("component is not an object".to_string()));
                };
                let keys: Vec<String> = updates.keys().cloned().collect();
                fields.extend(updates);
                format!("Component '{}' updated ({})", id, keys.join(", "))
            }
            (None, None) => {
                return Err(ToolError::InvalidParams {
                    tool: "update_component".to_string(),
                    reason: "provide either `path` and `value`, or `updates`".to_string(),
                });
            }
        };

        let mut updated: Component =
            serde_json::from_value(record).map_err(|e| invalid(e.to_string()))?;
        if updated.id != id {
            return Err(invalid("id cannot be changed".to_string()));
        }
        if updated.grid_area != current.grid_area {
            check_placement(&state, &id, &updated.grid_area)?;
        }

        let data_config_changed = updated.data_config != current.data_config;
        if data_config_changed && updated.metadata.fetch_status == FetchStatus::Loading {
            // the in-flight fetch targets the old source and will be dropped
            updated.metadata.fetch_status = FetchStatus::Idle;
        }
        updated.metadata.updated_at = Some(Utc::now());
        let data = to_json(&updated);
        state.components.insert(id.clone(), updated);

        if data_config_changed {
            self.fetcher.invalidate(&id).await;
        }
        self.committed();

        Ok(ToolResult::success(message).with_data(data))
    }

    pub async fn remove_component(&self, params: ComponentIdParams) -> ToolResult {
        settle("remove_component", self.try_remove_component(params).await)
    }

    async fn try_remove_component(&self, params: ComponentIdParams) -> ToolOutcome {
        let mut state = self.state.write().await;
        let removed = state
            .components
            .remove(&params.id)
            .ok_or_else(|| ToolError::ComponentNotFound(params.id.clone()))?;

        self.fetcher.invalidate(&params.id).await;
        self.committed();

        Ok(ToolResult::success(format!("Component '{}' removed", params.id))
            .with_data(json!({ "id": removed.id, "freedArea": removed.grid_area })))
    }

    pub async fn get_component(&self, params: ComponentIdParams) -> ToolResult {
        let state = self.state.read().await;
        match state.components.get(&params.id) {
            Some(component) => ToolResult::success(format!("Component '{}'", params.id))
                .with_data(to_json(component)),
            None => ToolResult::from(ToolError::ComponentNotFound(params.id)).with_data(Value::Null),
        }
    }

    /// Runs one fetch; soft source errors and transform errors both come back as `Err(reason)`
    async fn run_fetch(
        &self,
        id: &str,
        config: &DataConfig,
        options: &FetchOptions,
    ) -> Result<Value, String> {
        match self.fetcher.fetch(id, config, options).await {
            Ok(data) => match as_soft_error(&data) {
                Some(reason) => Err(reason.to_string()),
                None => Ok(data),
            },
            Err(e) => {
                tracing::warn!("Transform failed for component {}: {}", id, e);
                Err(e.to_string())
            }
        }
    }

    pub async fn fetch_component_data(&self, params: FetchComponentParams) -> ToolResult {
        settle("fetch_component_data", self.try_fetch_component_data(params).await)
    }

    async fn try_fetch_component_data(&self, params: FetchComponentParams) -> ToolOutcome {
        let id = params.id;
        let (config, options) = {
            let mut state = self.state.write().await;
            let graphql_endpoint = state.graphql_endpoint.clone();
            let component = state
                .components
                .get_mut(&id)
                .ok_or_else(|| ToolError::ComponentNotFound(id.clone()))?;
            component.mark_loading();
            (
                component.data_config.clone(),
                FetchOptions {
                    use_cache: !params.force,
                    graphql_endpoint,
                },
            )
        };

        tracing::debug!("Fetching data for component {}", id);
        let outcome = self.run_fetch(&id, &config, &options).await;

        let mut state = self.state.write().await;
        let Some(component) = state.components.get_mut(&id) else {
            // Removed while the fetch was in flight
            return Err(ToolError::ComponentNotFound(id));
        };
        if component.data_config != config {
            return Err(ToolError::FetchSuperseded(id));
        }

        match outcome {
            Ok(data) => {
                component.record_success(data.clone());
                self.committed();
                Ok(ToolResult::success(format!("Data fetched for component '{}'", id)).with_data(data))
            }
            Err(reason) => {
                component.record_failure(reason.clone());
                self.committed();
                Err(ToolError::FetchFailed { id, reason })
            }
        }
    }

    /// Best effort: every component settles on its own, the call itself always succeeds
    pub async fn refresh_all_components(&self) -> ToolResult {
        let (jobs, graphql_endpoint) = {
            let mut state = self.state.write().await;
            let graphql_endpoint = state.graphql_endpoint.clone();
            let jobs: Vec<_> = state
                .components
                .values_mut()
                .map(|component| {
                    component.mark_loading();
                    (component.id.clone(), component.data_config.clone())
                })
                .collect();
            (jobs, graphql_endpoint)
        };

        let options = FetchOptions {
            use_cache: false,
            graphql_endpoint,
        };
        let outcomes = join_all(
            jobs.iter()
                .map(|(id, config)| self.run_fetch(id, config, &options)),
        )
        .await;

        let mut state = self.state.write().await;
        let mut succeeded = 0;
        let mut failed = Vec::new();
        let mut discarded = Vec::new();
        for ((id, config), outcome) in jobs.iter().zip(outcomes) {
            let Some(component) = state.components.get_mut(id) else {
                discarded.push(id.clone());
                continue;
            };
            if component.data_config != *config {
                discarded.push(id.clone());
                continue;
            }
            match outcome {
                Ok(data) => {
                    component.record_success(data);
                    succeeded += 1;
                }
                Err(reason) => {
                    failed.push(json!({ "id": id, "error": reason }));
                    component.record_failure(reason);
                }
            }
        }
        self.committed();

        tracing::info!(
            "Refreshed {} components ({} ok, {} failed)",
            jobs.len(),
            succeeded,
            failed.len()
        );
        ToolResult::success(format!("Refreshed {} components", jobs.len())).with_data(json!({
            "refreshedCount": jobs.len(),
            "succeeded": succeeded,
            "failed": failed,
            "discarded": discarded,
        }))
    }

    pub async fn get_grid_info(&self) -> ToolResult {
        let state = self.state.read().await;
        let components: Vec<Value> = state
            .components
            .values()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": to_json(&c.kind),
                    "gridArea": c.grid_area,
                    "title": c.title,
                    "fetchStatus": to_json(&c.metadata.fetch_status),
                    "renderable": ComponentPayload::is_renderable(c.kind, &c.data),
                })
            })
            .collect();

        ToolResult::success("Grid information").with_data(json!({
            "grid": to_json(&state.grid),
            "stats": to_json(&get_grid_stats(&state)),
            "components": components,
        }))
    }

    pub async fn set_postgres_schema(&self, params: SetPostgresSchemaParams) -> ToolResult {
        let mut state = self.state.write().await;
        let tables: usize = params.schema.schemas.iter().map(|s| s.tables.len()).sum();
        let schemas = params.schema.schemas.len();
        state.postgres_schema = Some(params.schema);
        self.committed();

        ToolResult::success(format!(
            "PostgreSQL schema stored ({} schemas, {} tables)",
            schemas, tables
        ))
    }

    pub async fn get_postgres_schema(&self) -> ToolResult {
        let state = self.state.read().await;
        match &state.postgres_schema {
            Some(schema) => ToolResult::success("PostgreSQL schema").with_data(to_json(schema)),
            None => ToolResult::from(ToolError::SchemaNotConfigured).with_data(Value::Null),
        }
    }

    pub async fn query_postgres_schema(&self, params: QueryPostgresSchemaParams) -> ToolResult {
        settle("query_postgres_schema", self.try_query_postgres_schema(params).await)
    }

    async fn try_query_postgres_schema(&self, params: QueryPostgresSchemaParams) -> ToolOutcome {
        let state = self.state.read().await;
        let schema = state
            .postgres_schema
            .as_ref()
            .ok_or(ToolError::SchemaNotConfigured)?;

        match (params.table_name, params.schema_name) {
            (Some(table), schema_name) => {
                let matches = schema.find_tables(&table, schema_name.as_deref());
                if matches.is_empty() {
                    let qualified = match schema_name {
                        Some(name) => format!("{}.{}", name, table),
                        None => table,
                    };
                    return Err(ToolError::TableNotFound(qualified));
                }
                let tables: Vec<Value> = matches
                    .into_iter()
                    .map(|(owner, table)| json!({ "schema": owner.name, "table": to_json(table) }))
                    .collect();
                Ok(ToolResult::success(format!("Found {} matching tables", tables.len()))
                    .with_data(json!({ "tables": tables })))
            }
            (None, Some(name)) => {
                let found = schema
                    .schema(&name)
                    .ok_or_else(|| ToolError::SchemaNameNotFound(name.clone()))?;
                Ok(ToolResult::success(format!("Schema '{}'", name))
                    .with_data(json!({ "schemas": [to_json(found)] })))
            }
            (None, None) => Ok(ToolResult::success("All schemas")
                .with_data(json!({ "schemas": to_json(&schema.schemas) }))),
        }
    }

    pub async fn set_graphql_endpoint(&self, params: SetGraphqlEndpointParams) -> ToolResult {
        let endpoint = params.endpoint.trim().to_string();
        if endpoint.is_empty() {
            return settle(
                "set_graphql_endpoint",
                Err(ToolError::InvalidParams {
                    tool: "set_graphql_endpoint".to_string(),
                    reason: "endpoint must not be empty".to_string(),
                }),
            );
        }

        let mut state = self.state.write().await;
        state.graphql_endpoint = Some(endpoint.clone());
        // cached GraphQL results may come from the previous endpoint
        self.fetcher.clear_cache().await;
        self.committed();
        ToolResult::success(format!("GraphQL endpoint set to {}", endpoint))
    }

    pub fn generate_chart_template(&self, params: ChartTemplateParams) -> ToolResult {
        ToolResult::success("Chart template generated")
            .with_data(json!({ "template": chart_template(&params) }))
    }

    pub fn generate_table_template(&self, params: TableTemplateParams) -> ToolResult {
        ToolResult::success("Table template generated")
            .with_data(json!({ "template": table_template(&params) }))
    }
}
