// Preset catalogue - Named, host-supplied widget arrangements
use crate::application::widget::WidgetConfig;
use crate::domain::placement::Placement;
use crate::infrastructure::config::PresetWidgetConfig;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PresetEntry {
    pub config: WidgetConfig,
    pub placement: Placement,
}

impl PresetEntry {
    pub fn new(config: WidgetConfig, placement: Placement) -> Self {
        Self { config, placement }
    }
}

impl From<&PresetWidgetConfig> for PresetEntry {
    fn from(preset: &PresetWidgetConfig) -> Self {
        let mut config = WidgetConfig::new(preset.widget_type, preset.title.clone())
            .with_size(preset.size)
            .with_refresh_interval(Duration::from_millis(preset.refresh_interval_ms));
        config.data = preset.data.clone();
        Self::new(config, preset.placement)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresetCatalogue {
    presets: HashMap<String, Vec<PresetEntry>>,
}

impl PresetCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(presets: &HashMap<String, Vec<PresetWidgetConfig>>) -> Self {
        let presets = presets
            .iter()
            .map(|(name, widgets)| (name.clone(), widgets.iter().map(PresetEntry::from).collect()))
            .collect();
        Self { presets }
    }

    /// Register `entries` under `name`, replacing any existing preset
    pub fn insert(&mut self, name: impl Into<String>, entries: Vec<PresetEntry>) {
        self.presets.insert(name.into(), entries);
    }

    pub fn get(&self, name: &str) -> Option<&[PresetEntry]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    /// Entries of `name`, for hosts wiring data sources onto configured presets
    pub fn get_mut(&mut self, name: &str) -> Option<&mut [PresetEntry]> {
        self.presets.get_mut(name).map(Vec::as_mut_slice)
    }

    /// Preset names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
