// In-memory SQLite engine backing the query transform
use crate::application::row_query::RowQuery;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::limits::Limit;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};

const TABLE: &str = "data";

// `FROM ?` is the placeholder style agents tend to write for "the current rows"
static ANONYMOUS_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(FROM|JOIN)\s+\?").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRowQuery;

impl RowQuery for SqliteRowQuery {
    fn query(&self, sql: &str, rows: &[Value]) -> Result<Vec<Value>> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        // no ATTACH: queries only ever see the row table
        let _previous = conn.set_limit(Limit::SQLITE_LIMIT_ATTACHED, 0);
        let columns = collect_columns(rows);
        load_rows(&conn, &columns, rows)?;

        let sql = ANONYMOUS_SOURCE.replace_all(sql, format!("$1 {}", TABLE));
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        if !stmt.readonly() {
            anyhow::bail!("Only read-only queries are allowed over rows: {}", sql);
        }
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let mut result = Vec::new();
        let mut cursor = stmt.query([]).context("Failed to run query")?;
        while let Some(row) = cursor.next()? {
            let mut record = Map::with_capacity(names.len());
            for (index, name) in names.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(index)?));
            }
            result.push(Value::Object(record));
        }

        Ok(result)
    }
}

/// Union of object keys in first-seen order; scalar rows land in `value`
fn collect_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        match row {
            Value::Object(map) => {
                for key in map.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
            _ => {
                if !columns.iter().any(|c| c == "value") {
                    columns.push("value".to_string());
                }
            }
        }
    }

    if columns.is_empty() {
        columns.push("value".to_string());
    }
    columns
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn load_rows(conn: &Connection, columns: &[String], rows: &[Value]) -> Result<()> {
    let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    conn.execute(&format!("CREATE TABLE {} ({})", TABLE, column_list), [])
        .context("Failed to create row table")?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut insert = conn.prepare(&format!(
        "INSERT INTO {} ({}) VALUES ({})",
        TABLE, column_list, placeholders
    ))?;

    for row in rows {
        let values = columns.iter().map(|column| match row {
            Value::Object(map) => map.get(column).map(to_sql).unwrap_or(SqlValue::Null),
            scalar if column == "value" => to_sql(scalar),
            _ => SqlValue::Null,
        });
        insert.execute(params_from_iter(values))?;
    }

    Ok(())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
