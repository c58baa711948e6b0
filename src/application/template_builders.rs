// Template generators for common chart and table shapes
use crate::application::tool_params::{ChartTemplateParams, ColumnFormat, TableTemplateParams};
use serde_json::Value;

const SEPARATOR: &str = "{{#unless @last}},{{/unless}}";

/// JSON string literal that handlebars will emit untouched
fn literal(text: &str) -> String {
    Value::String(text.to_string()).to_string().replace("{{", "\\{{")
}

fn field_ref(field: &str) -> String {
    format!("[{}]", field)
}

fn each_item(body: &str) -> String {
    format!("{{{{#each data}}}}{}{}{{{{/each}}}}", body, SEPARATOR)
}

/// Renders rows into `{type, title?, labels, datasets: [{label, data}]}`
pub fn chart_template(params: &ChartTemplateParams) -> String {
    let labels = each_item(&format!("{{{{json {}}}}}", field_ref(&params.label_field)));

    let datasets: Vec<String> = params
        .value_fields
        .iter()
        .map(|descriptor| {
            let label = descriptor.label.as_deref().unwrap_or(&descriptor.field);
            format!(
                "{{\"label\": {}, \"data\": [{}]}}",
                literal(label),
                each_item(&format!("{{{{json {}}}}}", field_ref(&descriptor.field)))
            )
        })
        .collect();

    let title = params
        .title
        .as_deref()
        .map(|t| format!("\"title\": {}, ", literal(t)))
        .unwrap_or_default();

    format!(
        "{{\"type\": {}, {}\"labels\": [{}], \"datasets\": [{}]}}",
        literal(&params.chart_type),
        title,
        labels,
        datasets.join(", ")
    )
}

/// Renders rows into `{columns: [{field, header}], rows: [{field: cell}]}`
pub fn table_template(params: &TableTemplateParams) -> String {
    let columns: Vec<String> = params
        .columns
        .iter()
        .map(|c| {
            format!(
                "{{\"field\": {}, \"header\": {}}}",
                literal(&c.field),
                literal(c.header.as_deref().unwrap_or(&c.field))
            )
        })
        .collect();

    let cells: Vec<String> = params
        .columns
        .iter()
        .map(|c| {
            let reference = field_ref(&c.field);
            let cell = match c.format.unwrap_or(ColumnFormat::Text) {
                ColumnFormat::Text => format!("{{{{json {}}}}}", reference),
                ColumnFormat::Number => format!("\"{{{{formatNumber {}}}}}\"", reference),
                ColumnFormat::Currency => format!("\"{{{{formatCurrency {}}}}}\"", reference),
                ColumnFormat::Percent => format!("\"{{{{formatPercent {}}}}}\"", reference),
                ColumnFormat::Date => format!("\"{{{{formatDate {}}}}}\"", reference),
            };
            format!("{}: {}", literal(&c.field), cell)
        })
        .collect();

    format!(
        "{{\"columns\": [{}], \"rows\": [{}]}}",
        columns.join(", "),
        each_item(&format!("{{ {} }}", cells.join(", ")))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::template::apply_template;
    use crate::application::tool_params::{ColumnDescriptor, FieldDescriptor};
    use crate::domain::dashboard::ComponentType;
    use crate::domain::payload::ComponentPayload;
    use serde_json::{json, Map};

    fn rows() -> Value {
        json!([
            {"month": "Jan", "revenue": 1200.5, "cost": 800, "margin": 0.33, "day": "2024-01-31"},
            {"month": "Feb", "revenue": 1500, "cost": 900, "margin": 0.4, "day": "2024-02-29"}
        ])
    }

    #[test]
    fn test_chart_template_renders_chart_payload() {
        let template = chart_template(&ChartTemplateParams {
            chart_type: "bar".to_string(),
            label_field: "month".to_string(),
            value_fields: vec![
                FieldDescriptor { field: "revenue".to_string(), label: Some("Revenue".to_string()) },
                FieldDescriptor { field: "cost".to_string(), label: None },
            ],
            title: Some("Monthly \"P&L\"".to_string()),
        });

        let rendered = apply_template(&template, &rows(), &Map::new()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "type": "bar",
                "title": "Monthly \"P&L\"",
                "labels": ["Jan", "Feb"],
                "datasets": [
                    {"label": "Revenue", "data": [1200.5, 1500]},
                    {"label": "cost", "data": [800, 900]}
                ]
            })
        );
        assert!(ComponentPayload::is_renderable(ComponentType::Chart, &rendered));
    }

    #[test]
    fn test_table_template_formats_cells() {
        let template = table_template(&TableTemplateParams {
            columns: vec![
                ColumnDescriptor { field: "month".to_string(), header: Some("Month".to_string()), format: None },
                ColumnDescriptor { field: "revenue".to_string(), header: None, format: Some(ColumnFormat::Currency) },
                ColumnDescriptor { field: "margin".to_string(), header: None, format: Some(ColumnFormat::Percent) },
                ColumnDescriptor { field: "day".to_string(), header: None, format: Some(ColumnFormat::Date) },
            ],
        });

        let rendered = apply_template(&template, &rows(), &Map::new()).unwrap();
        assert_eq!(rendered["columns"][0], json!({"field": "month", "header": "Month"}));
        assert_eq!(
            rendered["rows"][0],
            json!({"month": "Jan", "revenue": "$1,200.50", "margin": "33.0%", "day": "1/31/2024"})
        );
        assert_eq!(rendered["rows"].as_array().unwrap().len(), 2);
        assert!(ComponentPayload::is_renderable(ComponentType::Table, &rendered));
    }

    #[test]
    fn test_empty_rows_still_render_valid_json() {
        let template = table_template(&TableTemplateParams {
            columns: vec![ColumnDescriptor { field: "a".to_string(), header: None, format: None }],
        });
        let rendered = apply_template(&template, &json!([]), &Map::new()).unwrap();
        assert_eq!(rendered, json!({"columns": [{"field": "a", "header": "a"}], "rows": []}));
    }
}
