// Introspected PostgreSQL schema snapshot, stored on the dashboard as-is
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PostgresSchema {
    #[serde(default)]
    pub schemas: Vec<SchemaInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaInfo {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostgresSchema {
    pub fn schema(&self, name: &str) -> Option<&SchemaInfo> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Exact-name table lookup, optionally restricted to one schema
    pub fn find_tables(&self, table: &str, schema: Option<&str>) -> Vec<(&SchemaInfo, &TableInfo)> {
        self.schemas
            .iter()
            .filter(|s| schema.is_none_or(|name| s.name == name))
            .flat_map(|s| s.tables.iter().map(move |t| (s, t)))
            .filter(|(_, t)| t.name == table)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PostgresSchema {
        serde_json::from_value(json!({
            "schemas": [
                {"name": "public", "tables": [
                    {"name": "orders", "columns": [{"name": "id", "type": "integer"}]},
                    {"name": "users", "columns": []}
                ]},
                {"name": "archive", "tables": [{"name": "orders"}]}
            ],
            "introspectedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_find_tables_across_and_within_schemas() {
        let schema = sample();
        assert_eq!(schema.find_tables("orders", None).len(), 2);

        let scoped = schema.find_tables("orders", Some("archive"));
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].0.name, "archive");

        assert!(schema.find_tables("missing", None).is_empty());
    }

    #[test]
    fn test_unknown_fields_survive() {
        let schema = sample();
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["introspectedAt"], "2024-01-01T00:00:00Z");
        assert_eq!(value["schemas"][0]["tables"][0]["columns"][0]["type"], "integer");
    }
}
