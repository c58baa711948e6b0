// HTTP source client - query endpoint and GraphQL over reqwest
use crate::application::source_client::{GraphQlRequest, SourceClient, SqlRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpSourceClient {
    client: reqwest::Client,
    query_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl HttpSourceClient {
    pub fn new(query_endpoint: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            query_endpoint: query_endpoint.filter(|e| !e.trim().is_empty()),
        })
    }

    async fn post_json<T: serde::Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{}", status_text(status));
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// The query endpoint answers `{data: [...]}`, `{error: ...}` or a bare array
fn extract_rows(body: Value) -> Result<Value> {
    match body {
        Value::Object(mut map) => {
            if let Some(error) = map.get("error").filter(|e| !e.is_null()) {
                let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
                anyhow::bail!(message);
            }
            Ok(map.remove("data").unwrap_or_else(|| Value::Array(Vec::new())))
        }
        other => Ok(other),
    }
}

fn extract_graphql_data(body: Value) -> Result<Value> {
    let response: GraphQlResponse =
        serde_json::from_value(body).context("Malformed GraphQL response")?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        anyhow::bail!("{}", messages.join("; "));
    }

    Ok(response.data)
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn execute_sql(&self, request: &SqlRequest) -> Result<Value> {
        let endpoint = self
            .query_endpoint
            .as_deref()
            .context("PostgreSQL query endpoint is not configured")?;

        tracing::debug!("Forwarding SQL query to {}", endpoint);
        extract_rows(self.post_json(endpoint, request).await?)
    }

    async fn execute_graphql(&self, endpoint: &str, request: &GraphQlRequest) -> Result<Value> {
        tracing::debug!("Sending GraphQL query to {}", endpoint);
        extract_graphql_data(self.post_json(endpoint, request).await?)
    }
}
