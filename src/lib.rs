//! Widget dashboard engine.
//!
//! Composes heterogeneous widgets (metrics, charts, lists, tables, cards) into
//! a positioned grid. It drives each widget's loading, error and ready states
//! and schedules periodic refreshes. Named arrangements are persisted through
//! an injected key-value store.
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::dashboard_manager::{AddedWidget, DashboardManager};
pub use application::data_source::{data_source_fn, WidgetDataSource};
pub use application::grid::Grid;
pub use application::key_value_store::KeyValueStore;
pub use application::presets::{PresetCatalogue, PresetEntry};
pub use application::view_handle::{ViewContent, ViewFactory, ViewHandle, ViewRole};
pub use application::widget::{Widget, WidgetAction, WidgetConfig};
pub use domain::placement::{GridPosition, Placement, PlacementPatch};
pub use domain::render::RenderedBody;
pub use domain::widget::{WidgetEvent, WidgetEventKind, WidgetPhase, WidgetSize, WidgetState, WidgetType};
pub use error::{DashboardError, Result};
