// Data source port - Where a widget fetches fresh data on refresh
use crate::domain::widget::WidgetData;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait WidgetDataSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<WidgetData>;
}

/// Adapts an async closure into a data source
pub struct FnDataSource<F> {
    fetch: F,
}

#[async_trait]
impl<F, Fut> WidgetDataSource for FnDataSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<WidgetData>> + Send,
{
    async fn fetch(&self) -> anyhow::Result<WidgetData> {
        (self.fetch)().await
    }
}

pub fn data_source_fn<F, Fut>(fetch: F) -> Arc<dyn WidgetDataSource>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<WidgetData>> + Send + 'static,
{
    Arc::new(FnDataSource { fetch })
}
