// Data fetcher - resolves data sources, applies transforms and caches per component
use crate::application::errors::TransformError;
use crate::application::row_query::RowQuery;
use crate::application::source_client::{GraphQlRequest, SourceClient, SqlRequest};
use crate::application::template::apply_template;
use crate::domain::data_source::{as_soft_error, soft_error, DataConfig, DataSource, TransformConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub cache_ttl: Duration,
    /// Used for GraphQL sources when neither the descriptor nor the dashboard names one
    pub graphql_endpoint: Option<String>,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            graphql_endpoint: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub use_cache: bool,
    pub graphql_endpoint: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            graphql_endpoint: None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    stored_at: Instant,
}

/// Cached results plus the invalidation counters a fetch checks before storing
#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<String, CacheEntry>,
    generations: HashMap<String, u64>,
    epoch: u64,
}

impl Cache {
    fn generation(&self, component_id: &str) -> (u64, u64) {
        let generation = self.generations.get(component_id).copied().unwrap_or_default();
        (self.epoch, generation)
    }
}

pub struct DataFetcher {
    client: Arc<dyn SourceClient>,
    row_query: Arc<dyn RowQuery>,
    settings: FetcherSettings,
    cache: Mutex<Cache>,
}

impl DataFetcher {
    pub fn new(
        client: Arc<dyn SourceClient>,
        row_query: Arc<dyn RowQuery>,
        settings: FetcherSettings,
    ) -> Self {
        Self {
            client,
            row_query,
            settings,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Source failures come back as a soft error value; transform failures are errors.
    pub async fn fetch(
        &self,
        component_id: &str,
        config: &DataConfig,
        options: &FetchOptions,
    ) -> Result<Value, TransformError> {
        let ttl = config
            .cache_ttl_ms
            .map(Duration::from_millis)
            .unwrap_or(self.settings.cache_ttl);

        if options.use_cache {
            if let Some(data) = self.cached(component_id, ttl).await {
                tracing::debug!("Cache hit for component {}", component_id);
                return Ok(data);
            }
        }

        let generation = self.cache.lock().await.generation(component_id);

        let raw = self.resolve_source(component_id, &config.source, options).await;
        if as_soft_error(&raw).is_some() {
            return Ok(raw);
        }

        let data = match config.transform.clone() {
            Some(transform) => {
                let row_query = self.row_query.clone();
                tokio::task::spawn_blocking(move || post_process(row_query.as_ref(), raw, &transform))
                    .await
                    .map_err(|e| TransformError::Query(format!("transform task failed: {}", e)))??
            }
            None => raw,
        };

        let mut cache = self.cache.lock().await;
        // invalidated while in flight: the result belongs to a stale config
        if cache.generation(component_id) == generation {
            cache.entries.insert(
                component_id.to_string(),
                CacheEntry {
                    data: data.clone(),
                    stored_at: Instant::now(),
                },
            );
        } else {
            tracing::debug!("Not caching stale result for component {}", component_id);
        }

        Ok(data)
    }

    async fn cached(&self, component_id: &str, ttl: Duration) -> Option<Value> {
        let mut cache = self.cache.lock().await;
        let entry = cache.entries.get(component_id)?;

        if entry.stored_at.elapsed() <= ttl {
            return Some(entry.data.clone());
        }

        cache.entries.remove(component_id);
        None
    }

    async fn resolve_source(
        &self,
        component_id: &str,
        source: &DataSource,
        options: &FetchOptions,
    ) -> Value {
        match source {
            DataSource::Static { data } => data.clone(),
            DataSource::Postgresql { query, params, schema } => {
                let request = SqlRequest {
                    query: query.clone(),
                    params: params.clone(),
                    schema: schema.clone(),
                };
                match self.client.execute_sql(&request).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!("PostgreSQL source for component {} failed: {:#}", component_id, e);
                        soft_error(format!("{:#}", e))
                    }
                }
            }
            DataSource::Graphql { query, variables, endpoint } => {
                let endpoint = endpoint
                    .as_deref()
                    .or(options.graphql_endpoint.as_deref())
                    .or(self.settings.graphql_endpoint.as_deref());

                let Some(endpoint) = endpoint else {
                    tracing::warn!("No GraphQL endpoint for component {}", component_id);
                    return soft_error("No GraphQL endpoint configured");
                };

                let request = GraphQlRequest {
                    query: query.clone(),
                    variables: variables.clone(),
                };
                match self.client.execute_graphql(endpoint, &request).await {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!("GraphQL source for component {} failed: {:#}", component_id, e);
                        soft_error(format!("{:#}", e))
                    }
                }
            }
        }
    }

    pub async fn invalidate(&self, component_id: &str) {
        let mut cache = self.cache.lock().await;
        cache.entries.remove(component_id);
        *cache.generations.entry(component_id.to_string()).or_default() += 1;
    }

    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        cache.entries.clear();
        cache.epoch += 1;
    }
}

/// Template first, then query. Runs on the blocking pool.
fn post_process(
    row_query: &dyn RowQuery,
    data: Value,
    transform: &TransformConfig,
) -> Result<Value, TransformError> {
    let mut data = data;
    if let Some(template) = &transform.template {
        data = apply_template(template, &data, &transform.context)?;
    }

    if let Some(query) = &transform.query {
        let rows = match data {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        let result = row_query
            .query(query, &rows)
            .map_err(|e| TransformError::Query(format!("{:#}", e)))?;
        data = Value::Array(result);
    }

    Ok(data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::sqlite_row_query::SqliteRowQuery;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers SQL with fixed rows, or fails for queries mentioning `unreachable`
    #[derive(Default)]
    pub(crate) struct FakeSourceClient {
        pub sql_calls: AtomicUsize,
        pub graphql_endpoints: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceClient for FakeSourceClient {
        async fn execute_sql(&self, request: &SqlRequest) -> anyhow::Result<Value> {
            self.sql_calls.fetch_add(1, Ordering::SeqCst);
            if request.query.contains("unreachable") {
                anyhow::bail!("connection refused");
            }
            Ok(json!([
                {"region": "north", "total": 120},
                {"region": "south", "total": 80},
                {"region": "north", "total": 30}
            ]))
        }

        async fn execute_graphql(&self, endpoint: &str, request: &GraphQlRequest) -> anyhow::Result<Value> {
            self.graphql_endpoints.lock().unwrap().push(endpoint.to_string());
            if request.query.contains("broken") {
                anyhow::bail!("Cannot query field \"broken\"");
            }
            Ok(json!({"viewer": {"login": "octocat"}}))
        }
    }

    /// Answers SQL with `rows` after `delay`, leaving room to change things mid-fetch
    pub(crate) struct SlowSourceClient {
        pub delay: Duration,
        pub rows: Value,
        pub sql_calls: AtomicUsize,
    }

    impl SlowSourceClient {
        pub(crate) fn new(delay: Duration, rows: Value) -> Self {
            Self {
                delay,
                rows,
                sql_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceClient for SlowSourceClient {
        async fn execute_sql(&self, _request: &SqlRequest) -> anyhow::Result<Value> {
            self.sql_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.rows.clone())
        }

        async fn execute_graphql(&self, _endpoint: &str, _request: &GraphQlRequest) -> anyhow::Result<Value> {
            anyhow::bail!("GraphQL is not served here")
        }
    }

    fn fetcher(client: Arc<FakeSourceClient>, ttl_ms: u64) -> DataFetcher {
        DataFetcher::new(
            client,
            Arc::new(SqliteRowQuery),
            FetcherSettings {
                cache_ttl: Duration::from_millis(ttl_ms),
                graphql_endpoint: Some("https://default.example/graphql".to_string()),
            },
        )
    }

    fn sql(query: &str) -> DataConfig {
        DataConfig {
            source: DataSource::Postgresql {
                query: query.to_string(),
                params: None,
                schema: None,
            },
            ..DataConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_respects_ttl() {
        let client = Arc::new(FakeSourceClient::default());
        let fetcher = fetcher(client.clone(), 1000);
        let config = sql("SELECT * FROM orders");

        let first = fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();

        tokio::time::advance(Duration::from_millis(500)).await;
        let second = fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bypass_and_invalidate_cache() {
        let client = Arc::new(FakeSourceClient::default());
        let fetcher = fetcher(client.clone(), 60_000);
        let config = sql("SELECT * FROM orders");
        let forced = FetchOptions {
            use_cache: false,
            ..FetchOptions::default()
        };

        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        fetcher.fetch("c1", &config, &forced).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 2);

        fetcher.invalidate("c1").await;
        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 3);

        fetcher.clear_cache().await;
        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_invalidated_in_flight_is_not_cached() {
        let client = Arc::new(SlowSourceClient::new(Duration::from_millis(100), json!([{"n": 1}])));
        let fetcher = DataFetcher::new(client.clone(), Arc::new(SqliteRowQuery), FetcherSettings::default());
        let config = sql("SELECT * FROM orders");

        let invalidate_midway = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            fetcher.invalidate("c1").await;
        };
        let opts = FetchOptions::default();
        let (data, ()) = tokio::join!(
            fetcher.fetch("c1", &config, &opts),
            invalidate_midway
        );
        assert_eq!(data.unwrap(), json!([{"n": 1}]));

        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 2);

        // settled results are cached again once nothing interferes
        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 2);

        let clear_midway = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            fetcher.clear_cache().await;
        };
        let forced = FetchOptions {
            use_cache: false,
            ..FetchOptions::default()
        };
        let (forced_result, ()) = tokio::join!(fetcher.fetch("c1", &config, &forced), clear_midway);
        forced_result.unwrap();
        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_source_failure_is_soft_and_not_cached() {
        let client = Arc::new(FakeSourceClient::default());
        let fetcher = fetcher(client.clone(), 60_000);
        let mut config = sql("SELECT * FROM unreachable");
        config.transform = Some(TransformConfig {
            template: Some("{{#if}}".to_string()),
            ..TransformConfig::default()
        });

        let data = fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(as_soft_error(&data), Some("connection refused"));

        fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(client.sql_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_static_source_is_verbatim() {
        let fetcher = fetcher(Arc::new(FakeSourceClient::default()), 60_000);
        let config = DataConfig {
            source: DataSource::Static {
                data: json!({"value": 42, "label": "Answer"}),
            },
            ..DataConfig::default()
        };

        let data = fetcher.fetch("kpi", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(data, json!({"value": 42, "label": "Answer"}));
    }

    #[tokio::test]
    async fn test_template_then_query_transform() {
        let fetcher = fetcher(Arc::new(FakeSourceClient::default()), 60_000);
        let mut config = sql("SELECT * FROM orders");
        config.transform = Some(TransformConfig {
            template: Some(
                "[{{#each data}}{\"region\": {{json region}}, \"total\": {{multiply total 2}}}{{#unless @last}},{{/unless}}{{/each}}]"
                    .to_string(),
            ),
            query: Some("SELECT region, SUM(total) AS total FROM ? GROUP BY region ORDER BY region".to_string()),
            ..TransformConfig::default()
        });

        let data = fetcher.fetch("c1", &config, &FetchOptions::default()).await.unwrap();
        assert_eq!(
            data,
            json!([{"region": "north", "total": 300}, {"region": "south", "total": 160}])
        );
    }

    #[tokio::test]
    async fn test_transform_errors_are_raised() {
        let fetcher = fetcher(Arc::new(FakeSourceClient::default()), 60_000);

        let mut bad_query = sql("SELECT * FROM orders");
        bad_query.transform = Some(TransformConfig {
            query: Some("SELEC nonsense".to_string()),
            ..TransformConfig::default()
        });
        let err = fetcher.fetch("c1", &bad_query, &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, TransformError::Query(_)));

        let mut writing_query = sql("SELECT * FROM orders");
        writing_query.transform = Some(TransformConfig {
            query: Some("DELETE FROM ?".to_string()),
            ..TransformConfig::default()
        });
        let err = fetcher.fetch("c3", &writing_query, &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, TransformError::Query(ref reason) if reason.contains("read-only")));

        let mut bad_template = sql("SELECT * FROM orders");
        bad_template.transform = Some(TransformConfig {
            template: Some("{{#each data}}".to_string()),
            ..TransformConfig::default()
        });
        let err = fetcher.fetch("c2", &bad_template, &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, TransformError::Template(_)));
    }

    #[tokio::test]
    async fn test_graphql_endpoint_resolution_order() {
        let client = Arc::new(FakeSourceClient::default());
        let fetcher = fetcher(client.clone(), 60_000);
        let graphql = |endpoint: Option<&str>| DataConfig {
            source: DataSource::Graphql {
                query: "{ viewer { login } }".to_string(),
                variables: None,
                endpoint: endpoint.map(str::to_string),
            },
            ..DataConfig::default()
        };
        let from_state = FetchOptions {
            use_cache: false,
            graphql_endpoint: Some("https://state.example/graphql".to_string()),
        };
        let plain = FetchOptions {
            use_cache: false,
            graphql_endpoint: None,
        };

        fetcher.fetch("g", &graphql(Some("https://own.example/graphql")), &from_state).await.unwrap();
        fetcher.fetch("g", &graphql(None), &from_state).await.unwrap();
        let data = fetcher.fetch("g", &graphql(None), &plain).await.unwrap();

        assert_eq!(data, json!({"viewer": {"login": "octocat"}}));
        assert_eq!(
            *client.graphql_endpoints.lock().unwrap(),
            vec![
                "https://own.example/graphql",
                "https://state.example/graphql",
                "https://default.example/graphql"
            ]
        );
    }

    #[tokio::test]
    async fn test_graphql_errors_and_missing_endpoint_are_soft() {
        let client = Arc::new(FakeSourceClient::default());
        let no_default = DataFetcher::new(client.clone(), Arc::new(SqliteRowQuery), FetcherSettings::default());
        let config = |query: &str| DataConfig {
            source: DataSource::Graphql {
                query: query.to_string(),
                variables: None,
                endpoint: None,
            },
            ..DataConfig::default()
        };

        let missing = no_default.fetch("g", &config("{ a }"), &FetchOptions::default()).await.unwrap();
        assert_eq!(as_soft_error(&missing), Some("No GraphQL endpoint configured"));

        let with_endpoint = FetchOptions {
            use_cache: true,
            graphql_endpoint: Some("https://api.example/graphql".to_string()),
        };
        let failed = no_default.fetch("g", &config("{ broken }"), &with_endpoint).await.unwrap();
        assert!(as_soft_error(&failed).unwrap().contains("broken"));
    }
}
