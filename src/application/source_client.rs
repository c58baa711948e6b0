// Source client trait for outbound query execution (SQL endpoint, GraphQL)
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Run a SQL query through the query execution endpoint and return its rows
    async fn execute_sql(&self, request: &SqlRequest) -> anyhow::Result<Value>;

    /// POST a GraphQL document, returning the response's `data` member
    /// (an error when the response carries GraphQL `errors`)
    async fn execute_graphql(&self, endpoint: &str, request: &GraphQlRequest) -> anyhow::Result<Value>;
}
