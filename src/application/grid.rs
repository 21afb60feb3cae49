// Grid - Spatial registry of widget placements
use crate::application::view_handle::{ViewHandle, WIDGET_ID_ATTR};
use crate::domain::placement::{GridLayout, LayoutEntry, Placement, PlacementPatch};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_COLUMNS: u32 = 12;
pub const DEFAULT_GAP: u32 = 16;

#[derive(Clone)]
pub struct GridEntry {
    pub id: String,
    pub view: Arc<dyn ViewHandle>,
    pub placement: Placement,
}

impl fmt::Debug for GridEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridEntry")
            .field("id", &self.id)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

/// Maps widget ids to placements within an N-column layout.
///
/// The grid never inspects widget data and never rejects a placement;
/// validating spans against the column count is the caller's job.
pub struct Grid {
    container: Arc<dyn ViewHandle>,
    entries: Vec<GridEntry>,
    columns: u32,
    gap: u32,
    next_id: u64,
}

impl Grid {
    pub fn new(container: Arc<dyn ViewHandle>) -> Self {
        let grid = Self {
            container,
            entries: Vec::new(),
            columns: DEFAULT_COLUMNS,
            gap: DEFAULT_GAP,
            next_id: 1,
        };
        grid.apply_container_settings();
        grid
    }

    pub fn container(&self) -> &Arc<dyn ViewHandle> {
        &self.container
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn gap(&self) -> u32 {
        self.gap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Place `view` and return its id. The id carried by the view is kept
    /// unless it is missing or already taken.
    pub fn add_widget(&mut self, view: Arc<dyn ViewHandle>, placement: Placement) -> String {
        let id = match view.attribute(WIDGET_ID_ATTR).filter(|id| !id.is_empty()) {
            Some(id) if !self.contains(&id) => id,
            Some(id) => {
                tracing::warn!("Widget id {} already placed; assigning a new id", id);
                self.generate_id()
            }
            None => self.generate_id(),
        };

        let placement = placement.normalized();
        view.set_attribute(WIDGET_ID_ATTR, &id);
        apply_placement(view.as_ref(), &placement);
        view.attach(self.container.as_ref());

        tracing::debug!("Grid placed {} at {:?}", id, placement);
        self.entries.push(GridEntry {
            id: id.clone(),
            view,
            placement,
        });
        id
    }

    pub fn remove_widget(&mut self, id: &str) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let entry = self.entries.remove(idx);
        entry.view.detach();
        tracing::debug!("Grid removed {}", id);
        true
    }

    /// Merge `patch` into the current placement of `id`
    pub fn move_widget(&mut self, id: &str, patch: PlacementPatch) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[idx];
        entry.placement = patch.merge_into(&entry.placement);
        apply_placement(entry.view.as_ref(), &entry.placement);
        tracing::debug!("Grid moved {} to {:?}", id, entry.placement);
        true
    }

    pub fn get_widget(&self, id: &str) -> Option<&GridEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn get_all_widgets(&self) -> &[GridEntry] {
        &self.entries
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn set_columns(&mut self, columns: u32) {
        self.columns = columns;
        self.apply_container_settings();
    }

    pub fn set_gap(&mut self, gap: u32) {
        self.gap = gap;
        self.apply_container_settings();
    }

    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.view.detach();
        }
    }

    pub fn get_layout(&self) -> GridLayout {
        self.entries
            .iter()
            .map(|entry| LayoutEntry {
                id: entry.id.clone(),
                placement: entry.placement,
            })
            .collect()
    }

    /// Replay each entry as a move. Unknown ids are skipped.
    pub fn set_layout(&mut self, layout: &[LayoutEntry]) {
        for entry in layout {
            if !self.move_widget(&entry.id, entry.placement.into()) {
                tracing::debug!("Layout entry {} has no placed widget; skipping", entry.id);
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn generate_id(&mut self) -> String {
        loop {
            let id = format!("widget-{}", self.next_id);
            self.next_id += 1;
            if !self.contains(&id) {
                return id;
            }
        }
    }

    fn apply_container_settings(&self) {
        self.container
            .set_attribute("grid-columns", &self.columns.to_string());
        self.container.set_attribute("grid-gap", &self.gap.to_string());
    }
}

fn apply_placement(view: &dyn ViewHandle, placement: &Placement) {
    view.set_attribute("grid-row", &placement.row_track());
    view.set_attribute("grid-column", &placement.column_track());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::view_handle::ViewRole;
    use crate::domain::placement::GridPosition;
    use crate::infrastructure::memory_view::MemoryViewFactory;

    fn grid(views: &MemoryViewFactory) -> Grid {
        Grid::new(views.create_node(ViewRole::Grid))
    }

    #[test]
    fn test_add_generates_ids_and_applies_placement() {
        let views = MemoryViewFactory::new();
        let mut grid = grid(&views);
        let view = views.create_node(ViewRole::Widget);

        let id = grid.add_widget(view.clone(), Placement::at(1, 1).with_span(1, 3));

        assert_eq!(id, "widget-1");
        assert_eq!(view.attribute(WIDGET_ID_ATTR).as_deref(), Some("widget-1"));
        assert_eq!(view.attribute("grid-column").as_deref(), Some("1 / span 3"));
        assert!(view.is_attached());
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_add_keeps_carried_id_and_avoids_collisions() {
        let views = MemoryViewFactory::new();
        let mut grid = grid(&views);

        let restored = views.create_node(ViewRole::Widget);
        restored.set_attribute(WIDGET_ID_ATTR, "widget-1");
        assert_eq!(grid.add_widget(restored, Placement::default()), "widget-1");

        let fresh = views.create_node(ViewRole::Widget);
        assert_eq!(grid.add_widget(fresh, Placement::default()), "widget-2");

        let duplicate = views.create_node(ViewRole::Widget);
        duplicate.set_attribute(WIDGET_ID_ATTR, "widget-2");
        assert_eq!(grid.add_widget(duplicate, Placement::default()), "widget-3");
    }

    #[test]
    fn test_move_merges_and_unknown_id_is_rejected() {
        let views = MemoryViewFactory::new();
        let mut grid = grid(&views);
        let id = grid.add_widget(
            views.create_node(ViewRole::Widget),
            Placement::at(1, 1).with_span(2, 2),
        );

        let patch = PlacementPatch {
            row: Some(GridPosition::Line(4)),
            ..PlacementPatch::default()
        };
        assert!(grid.move_widget(&id, patch));
        assert_eq!(
            grid.get_widget(&id).unwrap().placement,
            Placement::at(4, 1).with_span(2, 2)
        );

        let before = grid.get_layout();
        assert!(!grid.move_widget("nope", PlacementPatch::to(9, 9)));
        assert_eq!(grid.get_layout(), before);
    }

    #[test]
    fn test_out_of_range_placement_is_stored_verbatim() {
        let views = MemoryViewFactory::new();
        let mut grid = grid(&views);
        grid.set_columns(4);
        let id = grid.add_widget(
            views.create_node(ViewRole::Widget),
            Placement::at(1, 10).with_span(1, 8),
        );
        assert_eq!(grid.get_widget(&id).unwrap().placement.column_span, 8);
        assert_eq!(grid.container().attribute("grid-columns").as_deref(), Some("4"));
    }

    #[test]
    fn test_remove_and_clear_detach_views() {
        let views = MemoryViewFactory::new();
        let mut grid = grid(&views);
        let a = views.create_node(ViewRole::Widget);
        let b = views.create_node(ViewRole::Widget);
        let id_a = grid.add_widget(a.clone(), Placement::default());
        grid.add_widget(b.clone(), Placement::default());

        assert!(grid.remove_widget(&id_a));
        assert!(!grid.remove_widget(&id_a));
        assert!(!a.is_attached());

        grid.clear();
        assert!(grid.is_empty());
        assert!(!b.is_attached());
    }

    #[test]
    fn test_set_layout_skips_unknown_ids() {
        let views = MemoryViewFactory::new();
        let mut grid = grid(&views);
        let id = grid.add_widget(views.create_node(ViewRole::Widget), Placement::default());

        grid.set_layout(&[
            LayoutEntry {
                id: id.clone(),
                placement: Placement::at(2, 3),
            },
            LayoutEntry {
                id: "ghost".to_string(),
                placement: Placement::at(1, 1),
            },
        ]);

        assert_eq!(grid.get_layout().len(), 1);
        assert_eq!(grid.get_widget(&id).unwrap().placement, Placement::at(2, 3));
    }
}
