// Application layer - Widget engine, grid, manager and their ports
pub mod dashboard_manager;
pub mod data_source;
pub mod grid;
pub mod key_value_store;
pub mod presets;
pub mod view_handle;
pub mod widget;
