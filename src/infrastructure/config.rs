use crate::application::grid::{DEFAULT_COLUMNS, DEFAULT_GAP};
use crate::domain::placement::Placement;
use crate::domain::widget::{WidgetData, WidgetSize, WidgetType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub presets: HashMap<String, Vec<PresetWidgetConfig>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GridSettings {
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_gap")]
    pub gap: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            gap: DEFAULT_GAP,
        }
    }
}

fn default_columns() -> u32 {
    DEFAULT_COLUMNS
}

fn default_gap() -> u32 {
    DEFAULT_GAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from(".dashboard")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PresetWidgetConfig {
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    pub title: String,
    #[serde(default)]
    pub size: WidgetSize,
    #[serde(default)]
    pub data: Option<WidgetData>,
    /// Only takes effect once the host attaches a data source to the entry
    #[serde(default)]
    pub refresh_interval_ms: u64,
    #[serde(default)]
    pub placement: Placement,
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Parse dashboard settings from TOML text
pub fn parse_dashboard_config(toml: &str) -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::placement::GridPosition;
    use serde_json::json;

    #[test]
    fn test_parse_presets() {
        let config = parse_dashboard_config(
            r#"
            [grid]
            columns = 6

            [[presets.trading]]
            type = "metric"
            title = "Portfolio"
            size = "large"
            refresh_interval_ms = 5000
            data = { value = 125000, format = "currency", change = 5.2 }
            placement = { row = 1, column = 1, column_span = 3 }

            [[presets.trading]]
            type = "sparkline"
            title = "Notes"
            placement = { row = "auto", column = "auto" }
            "#,
        )
        .unwrap();

        assert_eq!(config.grid.columns, 6);
        assert_eq!(config.grid.gap, DEFAULT_GAP);
        assert_eq!(config.storage.directory, PathBuf::from(".dashboard"));

        let trading = &config.presets["trading"];
        assert_eq!(trading.len(), 2);
        assert_eq!(trading[0].widget_type, WidgetType::Metric);
        assert_eq!(trading[0].size, WidgetSize::Large);
        assert_eq!(trading[0].refresh_interval_ms, 5000);
        assert_eq!(trading[0].data.as_ref().unwrap()["format"], json!("currency"));
        assert_eq!(trading[0].placement, Placement::at(1, 1).with_span(1, 3));

        assert_eq!(trading[1].widget_type, WidgetType::Card);
        assert_eq!(trading[1].placement.row, GridPosition::Auto);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_dashboard_config("").unwrap();
        assert_eq!(config.grid.columns, DEFAULT_COLUMNS);
        assert!(config.presets.is_empty());
    }
}
