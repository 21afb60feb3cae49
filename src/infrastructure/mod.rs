// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod file_store;
pub mod memory_store;
pub mod memory_view;
