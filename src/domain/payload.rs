// Render-boundary payloads - typed views over a component's free-form `data`
//
// Mutations store whatever a fetch or the agent produced; these shapes are only
// checked when something wants to draw the component.
use super::dashboard::ComponentType;
use serde::Deserialize;
use serde_json::{Map, Value};

type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentPayload {
    Chart(ChartPayload),
    Table(TablePayload),
    StatCard(StatCardPayload),
    MetricCard(MetricCardPayload),
    Gauge(GaugePayload),
    Heatmap(HeatmapPayload),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChartPayload {
    Series {
        #[serde(default)]
        labels: Vec<Value>,
        datasets: Vec<ChartDataset>,
    },
    Rows(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartDataset {
    #[serde(default)]
    pub label: Option<String>,
    pub data: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TablePayload {
    Grid { columns: Vec<Value>, rows: Vec<Value> },
    Rows(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatCardPayload {
    pub value: DisplayValue,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricCardPayload {
    pub value: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub previous: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GaugePayload {
    pub value: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl GaugePayload {
    pub fn range(&self) -> (f64, f64) {
        (self.min.unwrap_or(0.0), self.max.unwrap_or(100.0))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HeatmapPayload {
    #[serde(rename_all = "camelCase")]
    Matrix {
        x_labels: Vec<Value>,
        y_labels: Vec<Value>,
        values: Vec<Vec<Option<f64>>>,
    },
    Cells(Vec<HeatmapCell>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeatmapCell {
    pub x: Value,
    pub y: Value,
    pub value: Option<f64>,
}

impl ComponentPayload {
    pub fn from_data(kind: ComponentType, data: &Value) -> Result<Self, serde_json::Error> {
        let data = data.clone();
        let payload = match kind {
            ComponentType::Chart => Self::Chart(serde_json::from_value(data)?),
            ComponentType::Table => Self::Table(serde_json::from_value(data)?),
            ComponentType::StatCard => Self::StatCard(serde_json::from_value(data)?),
            ComponentType::MetricCard => Self::MetricCard(serde_json::from_value(data)?),
            ComponentType::Gauge => {
                let gauge: GaugePayload = serde_json::from_value(data)?;
                let (min, max) = gauge.range();
                if min >= max {
                    return Err(serde::de::Error::custom("gauge min must be below max"));
                }
                Self::Gauge(gauge)
            }
            ComponentType::Heatmap => {
                let heatmap: HeatmapPayload = serde_json::from_value(data)?;
                if let HeatmapPayload::Matrix { y_labels, values, .. } = &heatmap {
                    if y_labels.len() != values.len() {
                        return Err(serde::de::Error::custom(
                            "heatmap needs one value row per y label",
                        ));
                    }
                }
                Self::Heatmap(heatmap)
            }
        };
        Ok(payload)
    }

    pub fn is_renderable(kind: ComponentType, data: &Value) -> bool {
        Self::from_data(kind, data).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chart_accepts_datasets_or_rows() {
        let series = json!({"labels": ["Jan", "Feb"], "datasets": [{"label": "Sales", "data": [1, null]}]});
        assert!(matches!(
            ComponentPayload::from_data(ComponentType::Chart, &series),
            Ok(ComponentPayload::Chart(ChartPayload::Series { .. }))
        ));

        let rows = json!([{"month": "Jan", "sales": 1}]);
        assert!(ComponentPayload::is_renderable(ComponentType::Chart, &rows));
        assert!(!ComponentPayload::is_renderable(ComponentType::Chart, &json!("oops")));
    }

    #[test]
    fn test_stat_card_and_gauge() {
        let stat = json!({"value": "$1.2k", "label": "Revenue", "trend": "up"});
        assert!(ComponentPayload::is_renderable(ComponentType::StatCard, &stat));
        assert!(!ComponentPayload::is_renderable(ComponentType::StatCard, &json!({"label": "x"})));

        match ComponentPayload::from_data(ComponentType::Gauge, &json!({"value": 30})).unwrap() {
            ComponentPayload::Gauge(gauge) => assert_eq!(gauge.range(), (0.0, 100.0)),
            other => panic!("unexpected payload {:?}", other),
        }
        let inverted = json!({"value": 5, "min": 10, "max": 0});
        assert!(!ComponentPayload::is_renderable(ComponentType::Gauge, &inverted));
    }

    #[test]
    fn test_heatmap_matrix_shape() {
        let good = json!({"xLabels": ["a", "b"], "yLabels": ["r1"], "values": [[1, 2]]});
        assert!(ComponentPayload::is_renderable(ComponentType::Heatmap, &good));

        let bad = json!({"xLabels": ["a"], "yLabels": ["r1", "r2"], "values": [[1]]});
        assert!(!ComponentPayload::is_renderable(ComponentType::Heatmap, &bad));
    }

    #[test]
    fn test_null_data_is_not_renderable() {
        assert!(!ComponentPayload::is_renderable(ComponentType::Table, &Value::Null));
    }
}
