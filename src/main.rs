// Demo host - Wires adapters into a dashboard and exercises each preset
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use widget_dashboard::infrastructure::config::load_dashboard_config;
use widget_dashboard::infrastructure::file_store::FileStore;
use widget_dashboard::infrastructure::memory_view::MemoryViewFactory;
use widget_dashboard::{DashboardManager, PresetCatalogue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Create adapters (infrastructure layer)
    let store = Arc::new(FileStore::new(config.storage.directory.clone()));
    let views = Arc::new(MemoryViewFactory::new());
    tracing::info!("Layouts stored under {}", store.directory().display());

    // Create manager (application layer)
    let presets = PresetCatalogue::from_config(&config.presets);
    let names: Vec<String> = presets.names().into_iter().map(String::from).collect();
    let mut manager = DashboardManager::new(views.clone(), store)
        .with_grid_settings(&config.grid)
        .with_presets(presets);

    for name in &names {
        manager.load_preset(name);
        manager.refresh_all().await;

        for widget in manager.get_all_widgets() {
            tracing::info!(
                "[{}] {} ({}): {}",
                widget.id().unwrap_or_default(),
                widget.title(),
                widget.widget_type(),
                widget.rendered_body()
            );
        }

        for event in views.take_events() {
            tracing::info!("Event {} from {:?}", event.kind.name(), event.widget_id);
        }

        if !manager.save_layout(name).await {
            tracing::warn!("Layout {} was not saved", name);
        }
    }

    if let Some(first) = names.first() {
        let restored = manager.load_layout(first).await;
        tracing::info!("Restored layout {}: {} ({} widgets)", first, restored, manager.len());
    }

    Ok(())
}
