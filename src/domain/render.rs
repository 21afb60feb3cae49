// Type-dispatched widget renderers
//
// Renderers turn a widget payload into a structured body. Turning that body
// into pixels is left to the view layer.
use super::widget::{WidgetData, WidgetType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderedBody {
    Loading,
    Error {
        message: String,
    },
    Empty,
    Metric {
        display: String,
        label: Option<String>,
        trend: Option<Trend>,
    },
    Chart {
        chart_type: String,
        dataset_count: usize,
        label_count: usize,
    },
    List {
        items: Vec<ListItemView>,
    },
    Table {
        columns: Vec<ColumnView>,
        rows: Vec<Vec<String>>,
        sortable: bool,
    },
    Card {
        content: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Absolute change, e.g. `5.2%`
    pub change: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItemView {
    pub icon: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub value: Option<String>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnView {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricFormat {
    #[default]
    Number,
    Currency,
    Percentage,
}

impl From<String> for MetricFormat {
    fn from(name: String) -> Self {
        match name.as_str() {
            "currency" => MetricFormat::Currency,
            "percentage" | "percent" => MetricFormat::Percentage,
            _ => MetricFormat::Number,
        }
    }
}

impl<'de> Deserialize<'de> for MetricFormat {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(String::deserialize(deserializer)?.into())
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricData {
    pub value: f64,
    #[serde(default)]
    pub format: MetricFormat,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartPayload {
    #[serde(default, rename = "chartType", alias = "chart_type")]
    pub chart_type: Option<String>,
    #[serde(default)]
    pub datasets: Vec<Value>,
    #[serde(default)]
    pub labels: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
pub struct ListItem {
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub actions: Vec<ListItemAction>,
}

#[derive(Debug, Deserialize)]
pub struct ListItemAction {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub sortable: bool,
}

#[derive(Debug, Deserialize)]
pub struct TableColumn {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Render a payload with the renderer selected by `widget_type`.
///
/// Payloads that do not fit the typed renderer are shown as card content.
pub fn render(widget_type: WidgetType, data: &WidgetData) -> RenderedBody {
    let rendered = match widget_type {
        WidgetType::Metric => parse(data).map(render_metric),
        WidgetType::Chart => parse(data).map(render_chart),
        WidgetType::List => parse(data).map(render_list),
        WidgetType::Table => parse(data).map(render_table),
        WidgetType::Card => return render_card(data),
    };

    rendered.unwrap_or_else(|e| {
        tracing::warn!("Payload does not fit the {} renderer: {}", widget_type, e);
        render_card(data)
    })
}

fn parse<T: DeserializeOwned>(data: &WidgetData) -> serde_json::Result<T> {
    T::deserialize(data)
}

fn render_metric(metric: MetricData) -> RenderedBody {
    let display = match metric.format {
        MetricFormat::Currency => format_currency(metric.value),
        MetricFormat::Percentage => format!("{}%", format_decimal(metric.value, 0, 2)),
        MetricFormat::Number => format_decimal(metric.value, 0, 3),
    };

    let trend = metric.change.map(|change| Trend {
        direction: if change >= 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        },
        change: format!("{}%", format_decimal(change.abs(), 0, 2)),
    });

    RenderedBody::Metric {
        display,
        label: metric.label,
        trend,
    }
}

fn render_chart(chart: ChartPayload) -> RenderedBody {
    RenderedBody::Chart {
        chart_type: chart.chart_type.unwrap_or_else(|| "line".to_string()),
        dataset_count: chart.datasets.len(),
        label_count: chart.labels.len(),
    }
}

fn render_list(list: ListData) -> RenderedBody {
    let items = list
        .items
        .into_iter()
        .map(|item| ListItemView {
            icon: item.icon,
            title: item.title,
            description: item.description,
            value: item.value.as_ref().map(display_value),
            actions: item.actions.into_iter().map(|a| a.id).collect(),
        })
        .collect();

    RenderedBody::List { items }
}

fn render_table(table: TableData) -> RenderedBody {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let cell = match row {
                        Value::Object(fields) => fields.get(&column.key),
                        Value::Array(cells) => cells.get(idx),
                        _ => None,
                    };
                    cell.map(display_value).unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let columns = table
        .columns
        .into_iter()
        .map(|c| ColumnView {
            label: c.label.unwrap_or_else(|| c.key.clone()),
            key: c.key,
        })
        .collect();

    RenderedBody::Table {
        columns,
        rows,
        sortable: table.sortable,
    }
}

fn render_card(data: &WidgetData) -> RenderedBody {
    let content = match data {
        Value::String(s) => s.clone(),
        Value::Object(fields) => match fields.get("content") {
            Some(Value::String(s)) => s.clone(),
            _ => data.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    };
    RenderedBody::Card { content }
}

/// Render a scalar cell or value without JSON quoting
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_decimal(f, 0, 3),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Look up a list item payload by index, for item action events
pub fn list_item(data: &WidgetData, index: usize) -> Option<&Map<String, Value>> {
    data.get("items")?.as_array()?.get(index)?.as_object()
}

pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${}", format_decimal(value.abs(), 2, 2))
}

/// Format with thousands separators and between `min_frac` and `max_frac`
/// fraction digits.
pub fn format_decimal(value: f64, min_frac: usize, max_frac: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.*}", max_frac, value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < min_frac {
        frac.push('0');
    }

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // no "-0"
    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let sign = if negative { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

impl fmt::Display for RenderedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderedBody::Loading => f.write_str("loading…"),
            RenderedBody::Error { message } => write!(f, "error: {message}"),
            RenderedBody::Empty => f.write_str("no data"),
            RenderedBody::Metric { display, label, trend } => {
                if let Some(label) = label {
                    write!(f, "{label}: ")?;
                }
                f.write_str(display)?;
                match trend {
                    Some(Trend { direction: TrendDirection::Up, change }) => write!(f, " ▲ {change}"),
                    Some(Trend { direction: TrendDirection::Down, change }) => write!(f, " ▼ {change}"),
                    None => Ok(()),
                }
            }
            RenderedBody::Chart {
                chart_type,
                dataset_count,
                label_count,
            } => write!(f, "{chart_type} chart, {dataset_count} datasets × {label_count} labels"),
            RenderedBody::List { items } => write!(f, "{} items", items.len()),
            RenderedBody::Table { columns, rows, .. } => {
                write!(f, "{} columns × {} rows", columns.len(), rows.len())
            }
            RenderedBody::Card { content } => f.write_str(content),
        }
    }
}
