// Dashboard domain model - the single aggregate every tool call mutates
use super::data_source::DataConfig;
use super::grid::GridLayout;
use super::schema::PostgresSchema;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub grid: GridLayout,
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
    pub metadata: DashboardMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres_schema: Option<PostgresSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql_endpoint: Option<String>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            grid: GridLayout::default(),
            components: BTreeMap::new(),
            metadata: DashboardMetadata::new("Untitled Dashboard".to_string(), String::new()),
            postgres_schema: None,
            graphql_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl DashboardMetadata {
    pub fn new(name: String, description: String) -> Self {
        Self {
            name,
            description,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    Chart,
    Table,
    StatCard,
    MetricCard,
    Gauge,
    Heatmap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fetch_status: FetchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub grid_area: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data_config: DataConfig,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    pub metadata: ComponentMetadata,
}

impl Component {
    pub fn new(id: String, kind: ComponentType, grid_area: String, title: String) -> Self {
        Self {
            id,
            kind,
            grid_area,
            title,
            description: None,
            data_config: DataConfig::default(),
            data: Value::Null,
            style: None,
            metadata: ComponentMetadata {
                created_at: Utc::now(),
                updated_at: None,
                fetch_status: FetchStatus::Idle,
                last_fetched_at: None,
                error: None,
            },
        }
    }

    pub fn mark_loading(&mut self) {
        self.metadata.fetch_status = FetchStatus::Loading;
    }

    pub fn record_success(&mut self, data: Value) {
        self.data = data;
        self.metadata.fetch_status = FetchStatus::Success;
        self.metadata.last_fetched_at = Some(Utc::now());
        self.metadata.error = None;
    }

    /// Prior data stays in place so the component keeps rendering its last good payload
    pub fn record_failure(&mut self, reason: String) {
        self.metadata.fetch_status = FetchStatus::Error;
        self.metadata.error = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_component_wire_format() {
        let component = Component::new(
            "kpi".to_string(),
            ComponentType::StatCard,
            "header".to_string(),
            "Revenue".to_string(),
        );
        let value = serde_json::to_value(&component).unwrap();

        assert_eq!(value["type"], "stat-card");
        assert_eq!(value["gridArea"], "header");
        assert_eq!(value["dataConfig"]["type"], "static");
        assert_eq!(value["metadata"]["fetchStatus"], "idle");
        assert!(value["metadata"].get("updatedAt").is_none());
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut component = Component::new(
            "c1".to_string(),
            ComponentType::Gauge,
            "main".to_string(),
            "Load".to_string(),
        );
        component.record_success(json!({"value": 42}));
        component.record_failure("timeout".to_string());

        assert_eq!(component.data, json!({"value": 42}));
        assert_eq!(component.metadata.fetch_status, FetchStatus::Error);
        assert_eq!(component.metadata.error.as_deref(), Some("timeout"));

        component.record_success(json!({"value": 7}));
        assert!(component.metadata.error.is_none());
        assert!(component.metadata.last_fetched_at.is_some());
    }

    #[test]
    fn test_state_round_trips_through_snapshot_json() {
        let mut state = DashboardState::default();
        state.graphql_endpoint = Some("https://api.example.com/graphql".to_string());
        state.components.insert(
            "c1".to_string(),
            Component::new("c1".to_string(), ComponentType::Chart, "main".to_string(), "Sales".to_string()),
        );

        let restored: DashboardState =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(restored.components["c1"], state.components["c1"]);
        assert_eq!(restored.grid, state.grid);
        assert_eq!(restored.graphql_endpoint, state.graphql_endpoint);
    }
}
