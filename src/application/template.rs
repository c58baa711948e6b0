// Template transform - handlebars rendering with a fixed, process-wide helper set
use crate::application::errors::TransformError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderError, RenderErrorReason,
};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

static REGISTRY: Lazy<Handlebars<'static>> = Lazy::new(build_registry);

handlebars_helper!(gt: |a: f64, b: f64| a > b);
handlebars_helper!(lt: |a: f64, b: f64| a < b);
handlebars_helper!(gte: |a: f64, b: f64| a >= b);
handlebars_helper!(lte: |a: f64, b: f64| a <= b);
handlebars_helper!(eq: |a: Json, b: Json| a == b);
handlebars_helper!(ne: |a: Json, b: Json| a != b);
handlebars_helper!(add: |a: f64, b: f64| number(a + b));
handlebars_helper!(subtract: |a: f64, b: f64| number(a - b));
handlebars_helper!(multiply: |a: f64, b: f64| number(a * b));
handlebars_helper!(divide: |a: f64, b: f64| if b == 0.0 { number(0.0) } else { number(a / b) });
handlebars_helper!(json: |v: Json| v.to_string());

fn build_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    // Output is data (usually JSON), never markup
    registry.register_escape_fn(handlebars::no_escape);

    registry.register_helper("gt", Box::new(gt));
    registry.register_helper("lt", Box::new(lt));
    registry.register_helper("gte", Box::new(gte));
    registry.register_helper("lte", Box::new(lte));
    registry.register_helper("eq", Box::new(eq));
    registry.register_helper("ne", Box::new(ne));
    registry.register_helper("add", Box::new(add));
    registry.register_helper("subtract", Box::new(subtract));
    registry.register_helper("multiply", Box::new(multiply));
    registry.register_helper("divide", Box::new(divide));
    registry.register_helper("json", Box::new(json));
    registry.register_helper("formatNumber", Box::new(format_number_helper));
    registry.register_helper("formatPercent", Box::new(format_percent_helper));
    registry.register_helper("formatCurrency", Box::new(format_currency_helper));
    registry.register_helper("formatDate", Box::new(format_date_helper));

    registry
}

/// Whole results render without a trailing `.0`
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

pub fn render(template: &str, context: &Value) -> Result<String, RenderError> {
    REGISTRY.render_template(template, context)
}

/// Renders `template` against `{data, ...context}`; output that looks like JSON
/// is parsed back into structured data, otherwise the string is kept.
pub fn apply_template(
    template: &str,
    data: &Value,
    context: &Map<String, Value>,
) -> Result<Value, TransformError> {
    let mut scope = context.clone();
    scope.insert("data".to_string(), data.clone());

    let rendered = render(template, &Value::Object(scope))?;
    let trimmed = rendered.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str(trimmed) {
            return Ok(parsed);
        }
        tracing::debug!("template output looked like JSON but did not parse, keeping raw string");
    }

    Ok(Value::String(rendered))
}

fn numeric_param(h: &Helper, index: usize, name: &'static str) -> Result<f64, RenderError> {
    let param = h
        .param(index)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex(name, index))?;

    let parsed = match param.value() {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RenderErrorReason::InvalidParamType("number").into())
}

/// Missing values format as empty cells rather than failing the whole render
fn is_missing(h: &Helper, index: usize) -> bool {
    h.param(index).is_some_and(|p| p.value().is_null())
}

fn decimals_param(h: &Helper, index: usize, default: usize) -> usize {
    h.param(index)
        .and_then(|p| p.value().as_u64())
        .map(|d| d.min(20) as usize)
        .unwrap_or(default)
}

fn str_param<'a>(h: &'a Helper, index: usize) -> Option<&'a str> {
    h.param(index).and_then(|p| p.value().as_str())
}

fn format_number_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if is_missing(h, 0) {
        return Ok(());
    }
    let value = numeric_param(h, 0, "formatNumber")?;
    out.write(&format_number(value, decimals_param(h, 1, 2)))?;
    Ok(())
}

fn format_percent_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if is_missing(h, 0) {
        return Ok(());
    }
    let value = numeric_param(h, 0, "formatPercent")?;
    out.write(&format_percent(value, decimals_param(h, 1, 1)))?;
    Ok(())
}

fn format_currency_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    if is_missing(h, 0) {
        return Ok(());
    }
    let value = numeric_param(h, 0, "formatCurrency")?;
    out.write(&format_currency(value, str_param(h, 1).unwrap_or("USD")))?;
    Ok(())
}

fn format_date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("formatDate", 0))?;
    let style = str_param(h, 1).unwrap_or("short");

    match parse_date(param.value()) {
        Some(date) => out.write(&format_date(&date, style))?,
        // Unparseable dates pass through untouched
        None => match param.value() {
            Value::Null => {}
            Value::String(s) => out.write(s)?,
            other => out.write(&other.to_string())?,
        },
    }
    Ok(())
}

pub fn format_number(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

pub fn format_percent(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

pub fn format_currency(value: f64, code: &str) -> String {
    let code = code.to_ascii_uppercase();
    let (symbol, decimals) = match code.as_str() {
        "USD" => (Some("$"), 2),
        "EUR" => (Some("€"), 2),
        "GBP" => (Some("£"), 2),
        "JPY" => (Some("¥"), 0),
        _ => (None, 2),
    };

    let sign = if value < 0.0 { "-" } else { "" };
    let amount = group_thousands(value.abs(), decimals);
    match symbol {
        Some(symbol) => format!("{}{}{}", sign, symbol, amount),
        None => format!("{}{} {}", sign, amount, code),
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac_part) = frac_part {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and epoch milliseconds
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|d| d.and_utc())
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|d| d.and_utc())
                })
        }
        _ => None,
    }
}

pub fn format_date(date: &DateTime<Utc>, style: &str) -> String {
    match style {
        "long" => date.format("%B %-d, %Y").to_string(),
        "iso" => date.to_rfc3339_opts(SecondsFormat::Millis, true),
        _ => date.format("%-m/%-d/%Y").to_string(),
    }
}
