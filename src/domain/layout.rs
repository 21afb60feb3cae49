// Persisted dashboard layout
use super::placement::LayoutEntry;
use super::widget::{WidgetData, WidgetType};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

const LAYOUT_KEY_PREFIX: &str = "dashboard-layout-";

/// Store key under which the layout `name` is saved
pub fn layout_key(name: &str) -> String {
    format!("{LAYOUT_KEY_PREFIX}{name}")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedLayout {
    pub grid: Vec<LayoutEntry>,
    pub widgets: BTreeMap<String, PersistedWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWidget {
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    pub title: String,
    /// Absent when the widget holds no data; an explicit `null` is kept
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub data: Option<WidgetData>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<WidgetData>, D::Error>
where
    D: Deserializer<'de>,
{
    WidgetData::deserialize(deserializer).map(Some)
}

impl PersistedLayout {
    /// First grid id with no matching widget record, if any
    pub fn dangling_placement(&self) -> Option<&str> {
        self.grid
            .iter()
            .map(|entry| entry.id.as_str())
            .find(|id| !self.widgets.contains_key(*id))
    }
}
