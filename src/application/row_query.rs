// Row-set query capability used by the query transform step

use serde_json::Value;

/// Runs an ad-hoc SQL statement over in-memory rows exposed as table `data`.
pub trait RowQuery: Send + Sync {
    fn query(&self, sql: &str, rows: &[Value]) -> anyhow::Result<Vec<Value>>;
}
