// Dashboard error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("key-value store error: {0}")]
    Store(String),

    #[error("no saved layout named `{0}`")]
    LayoutNotFound(String),

    #[error("malformed layout `{name}`: {source}")]
    MalformedLayout {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("layout `{name}` places widget `{id}` without a widget record")]
    DanglingPlacement { name: String, id: String },

    #[error("failed to serialize layout: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DashboardError {
    /// Wrap a store backend failure, keeping the full context chain
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{err:#}"))
    }
}
