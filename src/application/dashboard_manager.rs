// Dashboard manager - Composes the grid with widgets and owns persistence
use crate::application::grid::Grid;
use crate::application::key_value_store::KeyValueStore;
use crate::application::presets::PresetCatalogue;
use crate::application::view_handle::{
    ViewFactory, ViewHandle, ViewRole, WIDGET_ID_ATTR, WIDGET_TYPE_ATTR,
};
use crate::application::widget::{Widget, WidgetConfig};
use crate::domain::layout::{layout_key, PersistedLayout, PersistedWidget};
use crate::domain::placement::{Placement, PlacementPatch};
use crate::domain::widget::WidgetType;
use crate::error::{DashboardError, Result};
use crate::infrastructure::config::GridSettings;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AddedWidget {
    pub id: String,
    pub widget: Widget,
}

pub struct DashboardManager {
    grid: Grid,
    widgets: HashMap<String, Widget>,
    views: Arc<dyn ViewFactory>,
    store: Arc<dyn KeyValueStore>,
    presets: PresetCatalogue,
}

impl DashboardManager {
    pub fn new(views: Arc<dyn ViewFactory>, store: Arc<dyn KeyValueStore>) -> Self {
        let grid = Grid::new(views.create(ViewRole::Grid));
        Self {
            grid,
            widgets: HashMap::new(),
            views,
            store,
            presets: PresetCatalogue::default(),
        }
    }

    pub fn with_presets(mut self, presets: PresetCatalogue) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_grid_settings(mut self, settings: &GridSettings) -> Self {
        self.grid.set_columns(settings.columns);
        self.grid.set_gap(settings.gap);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn presets(&self) -> &PresetCatalogue {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetCatalogue {
        &mut self.presets
    }

    pub fn add_widget(&mut self, config: WidgetConfig, placement: Placement) -> AddedWidget {
        let widget = Widget::new(config, self.views.as_ref());
        self.place(widget, placement)
    }

    fn place(&mut self, widget: Widget, placement: Placement) -> AddedWidget {
        let id = self.grid.add_widget(widget.view(), placement);
        tracing::debug!("Added {} widget {}", widget.widget_type(), id);
        self.widgets.insert(id.clone(), widget.clone());
        AddedWidget { id, widget }
    }

    /// Destroy the widget, then drop its placement. `false` for unknown ids.
    pub fn remove_widget(&mut self, id: &str) -> bool {
        let Some(widget) = self.widgets.remove(id) else {
            return false;
        };
        widget.destroy();
        self.grid.remove_widget(id);
        tracing::debug!("Removed widget {}", id);
        true
    }

    /// Move a movable widget. Unset patch fields keep their current value.
    pub fn move_widget(&mut self, id: &str, patch: PlacementPatch) -> bool {
        let Some(widget) = self.widgets.get(id) else {
            return false;
        };
        if !widget.is_movable() {
            tracing::debug!("Widget {} is not movable", id);
            return false;
        }
        if !self.grid.move_widget(id, patch) {
            return false;
        }
        if let Some(entry) = self.grid.get_widget(id) {
            widget.notify_moved(&entry.placement);
        }
        true
    }

    pub fn get_widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.get(id)
    }

    /// Widgets in grid order
    pub fn get_all_widgets(&self) -> Vec<&Widget> {
        self.grid
            .get_all_widgets()
            .iter()
            .filter_map(|entry| self.widgets.get(&entry.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Destroy every widget and empty the grid
    pub fn clear(&mut self) {
        for (_, widget) in self.widgets.drain() {
            widget.destroy();
        }
        self.grid.clear();
    }

    /// Replace the dashboard with the named preset. Unknown names leave the
    /// current state untouched and return `false`.
    pub fn load_preset(&mut self, name: &str) -> bool {
        let Some(entries) = self.presets.get(name).map(<[_]>::to_vec) else {
            tracing::warn!("Unknown preset {}", name);
            return false;
        };

        self.clear();
        for entry in entries {
            self.add_widget(entry.config, entry.placement);
        }
        tracing::info!("Loaded preset {} ({} widgets)", name, self.len());
        true
    }

    /// Refresh every widget that has a data source. Failures stay inside
    /// each widget. Returns how many widgets were refreshed.
    pub async fn refresh_all(&self) -> usize {
        let widgets: Vec<Widget> = self
            .widgets
            .values()
            .filter(|widget| widget.can_refresh())
            .cloned()
            .collect();

        join_all(widgets.iter().map(Widget::refresh)).await;
        tracing::debug!("Refreshed {} widgets", widgets.len());
        widgets.len()
    }

    pub async fn save_layout(&self, name: &str) -> bool {
        match self.try_save_layout(name).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to save layout {}: {}", name, e);
                false
            }
        }
    }

    /// Restore a saved layout. On failure the current dashboard is kept.
    pub async fn load_layout(&mut self, name: &str) -> bool {
        match self.try_load_layout(name).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to load layout {}: {}", name, e);
                false
            }
        }
    }

    pub fn snapshot(&self) -> PersistedLayout {
        let grid = self.grid.get_layout();
        let widgets = grid
            .iter()
            .filter_map(|entry| {
                let widget = self.widgets.get(&entry.id)?;
                let widget_type = widget
                    .view()
                    .attribute(WIDGET_TYPE_ATTR)
                    .map(WidgetType::from)
                    .unwrap_or_else(|| widget.widget_type());
                Some((
                    entry.id.clone(),
                    PersistedWidget {
                        widget_type,
                        title: widget.title(),
                        data: widget.data(),
                    },
                ))
            })
            .collect();

        PersistedLayout { grid, widgets }
    }

    async fn try_save_layout(&self, name: &str) -> Result<()> {
        let serialized = serde_json::to_string(&self.snapshot())?;
        self.store
            .set(&layout_key(name), serialized)
            .await
            .map_err(DashboardError::store)?;
        tracing::info!("Saved layout {} ({} widgets)", name, self.len());
        Ok(())
    }

    async fn try_load_layout(&mut self, name: &str) -> Result<()> {
        let raw = self
            .store
            .get(&layout_key(name))
            .await
            .map_err(DashboardError::store)?
            .ok_or_else(|| DashboardError::LayoutNotFound(name.to_string()))?;

        let layout: PersistedLayout =
            serde_json::from_str(&raw).map_err(|source| DashboardError::MalformedLayout {
                name: name.to_string(),
                source,
            })?;
        if let Some(id) = layout.dangling_placement() {
            return Err(DashboardError::DanglingPlacement {
                name: name.to_string(),
                id: id.to_string(),
            });
        }

        self.clear();
        for entry in &layout.grid {
            let Some(record) = layout.widgets.get(&entry.id) else {
                continue;
            };
            let mut config = WidgetConfig::new(record.widget_type, record.title.clone());
            config.data = record.data.clone();

            let widget = Widget::new(config, self.views.as_ref());
            widget.view().set_attribute(WIDGET_ID_ATTR, &entry.id);
            self.place(widget, entry.placement);
        }
        tracing::info!("Loaded layout {} ({} widgets)", name, self.len());
        Ok(())
    }
}

impl Drop for DashboardManager {
    fn drop(&mut self) {
        self.clear();
    }
}
