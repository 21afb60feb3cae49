// Widget lifecycle engine - State machine, rendering dispatch and auto-refresh
use crate::application::data_source::WidgetDataSource;
use crate::application::view_handle::{
    ViewContent, ViewFactory, ViewHandle, ViewRole, WIDGET_ID_ATTR, WIDGET_TYPE_ATTR,
};
use crate::domain::placement::Placement;
use crate::domain::render::{self, ListData, RenderedBody, TableData};
use crate::domain::widget::{
    WidgetData, WidgetEvent, WidgetEventKind, WidgetPhase, WidgetSize, WidgetState, WidgetType,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const GLYPH_EXPANDED: &str = "−";
const GLYPH_COLLAPSED: &str = "+";
const GLYPH_REFRESH: &str = "↻";
const FALLBACK_ERROR: &str = "Refresh failed";

pub type ResizeCallback = Arc<dyn Fn(WidgetSize) + Send + Sync>;
pub type MoveCallback = Arc<dyn Fn(&Placement) + Send + Sync>;
pub type CollapseCallback = Arc<dyn Fn(bool) + Send + Sync>;
pub type ActionHandler = Arc<dyn Fn(&Widget) + Send + Sync>;

/// Header action button
#[derive(Clone)]
pub struct WidgetAction {
    pub id: String,
    pub label: String,
    pub icon: Option<String>,
    pub handler: ActionHandler,
}

impl WidgetAction {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&Widget) + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            icon: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Immutable widget construction input
#[derive(Clone)]
pub struct WidgetConfig {
    pub widget_type: WidgetType,
    pub title: String,
    pub size: WidgetSize,
    pub data: Option<WidgetData>,
    /// Zero disables auto-refresh
    pub refresh_interval: Duration,
    pub actions: Vec<WidgetAction>,
    pub resizable: bool,
    pub movable: bool,
    pub collapsible: bool,
    pub on_refresh: Option<Arc<dyn WidgetDataSource>>,
    pub on_resize: Option<ResizeCallback>,
    pub on_move: Option<MoveCallback>,
    pub on_collapse: Option<CollapseCallback>,
}

impl WidgetConfig {
    pub fn new(widget_type: WidgetType, title: impl Into<String>) -> Self {
        Self {
            widget_type,
            title: title.into(),
            size: WidgetSize::default(),
            data: None,
            refresh_interval: Duration::ZERO,
            actions: Vec::new(),
            resizable: true,
            movable: true,
            collapsible: true,
            on_refresh: None,
            on_resize: None,
            on_move: None,
            on_collapse: None,
        }
    }

    pub fn with_data(mut self, data: WidgetData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_size(mut self, size: WidgetSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_data_source(mut self, source: Arc<dyn WidgetDataSource>) -> Self {
        self.on_refresh = Some(source);
        self
    }

    pub fn with_action(mut self, action: WidgetAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn on_resize(mut self, callback: impl Fn(WidgetSize) + Send + Sync + 'static) -> Self {
        self.on_resize = Some(Arc::new(callback));
        self
    }

    pub fn on_move(mut self, callback: impl Fn(&Placement) + Send + Sync + 'static) -> Self {
        self.on_move = Some(Arc::new(callback));
        self
    }

    pub fn on_collapse(mut self, callback: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_collapse = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for WidgetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetConfig")
            .field("widget_type", &self.widget_type)
            .field("title", &self.title)
            .field("size", &self.size)
            .field("data", &self.data)
            .field("refresh_interval", &self.refresh_interval)
            .field("actions", &self.actions.iter().map(|a| &a.id).collect::<Vec<_>>())
            .field("has_data_source", &self.on_refresh.is_some())
            .finish_non_exhaustive()
    }
}

/// Owned auto-refresh task; dropping it cancels the schedule
struct RefreshTimer {
    task: JoinHandle<()>,
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// View nodes a widget renders into, created once at construction
struct Scaffold {
    root: Arc<dyn ViewHandle>,
    title: Arc<dyn ViewHandle>,
    body: Arc<dyn ViewHandle>,
    collapse_toggle: Option<Arc<dyn ViewHandle>>,
}

impl Scaffold {
    fn build(views: &dyn ViewFactory, config: &WidgetConfig) -> Self {
        let root = views.create(ViewRole::Widget);
        root.set_attribute(WIDGET_TYPE_ATTR, config.widget_type.as_str());
        root.set_attribute("data-size", config.size.as_str());

        let header = views.create(ViewRole::Header);
        header.attach(root.as_ref());

        let title = views.create(ViewRole::Title);
        title.set_content(ViewContent::Text(config.title.clone()));
        title.attach(header.as_ref());

        let actions = views.create(ViewRole::Actions);
        actions.attach(header.as_ref());

        for action in &config.actions {
            let button = views.create(ViewRole::Action);
            button.set_attribute("data-action", &action.id);
            let label = action.icon.clone().unwrap_or_else(|| action.label.clone());
            button.set_content(ViewContent::Text(label));
            button.attach(actions.as_ref());
        }

        if config.on_refresh.is_some() {
            let refresh = views.create(ViewRole::RefreshButton);
            refresh.set_content(ViewContent::Text(GLYPH_REFRESH.to_string()));
            refresh.attach(actions.as_ref());
        }

        let collapse_toggle = config.collapsible.then(|| {
            let toggle = views.create(ViewRole::CollapseToggle);
            toggle.set_content(ViewContent::Text(GLYPH_EXPANDED.to_string()));
            toggle.attach(actions.as_ref());
            toggle
        });

        let body = views.create(ViewRole::Body);
        body.attach(root.as_ref());

        Self {
            root,
            title,
            body,
            collapse_toggle,
        }
    }
}

struct WidgetCore {
    title: String,
    size: WidgetSize,
    state: WidgetState,
    refresh_timer: Option<RefreshTimer>,
    refresh_generation: u64,
    destroyed: bool,
}

struct WidgetShared {
    widget_type: WidgetType,
    scaffold: Scaffold,
    refresh_interval: Duration,
    resizable: bool,
    movable: bool,
    collapsible: bool,
    actions: Vec<WidgetAction>,
    data_source: Option<Arc<dyn WidgetDataSource>>,
    on_resize: Option<ResizeCallback>,
    on_move: Option<MoveCallback>,
    on_collapse: Option<CollapseCallback>,
    core: Mutex<WidgetCore>,
}

/// A single data-bearing, independently refreshable unit of display.
///
/// Cloning yields another handle to the same widget.
#[derive(Clone)]
pub struct Widget {
    shared: Arc<WidgetShared>,
}

impl Widget {
    /// Build the view scaffold and render the initial state. Auto-refresh
    /// starts immediately when an interval and a data source are configured.
    pub fn new(config: WidgetConfig, views: &dyn ViewFactory) -> Self {
        let scaffold = Scaffold::build(views, &config);
        let core = WidgetCore {
            title: config.title,
            size: config.size,
            state: WidgetState::new(config.data),
            refresh_timer: None,
            refresh_generation: 0,
            destroyed: false,
        };

        let widget = Self {
            shared: Arc::new(WidgetShared {
                widget_type: config.widget_type,
                scaffold,
                refresh_interval: config.refresh_interval,
                resizable: config.resizable,
                movable: config.movable,
                collapsible: config.collapsible,
                actions: config.actions,
                data_source: config.on_refresh,
                on_resize: config.on_resize,
                on_move: config.on_move,
                on_collapse: config.on_collapse,
                core: Mutex::new(core),
            }),
        };

        widget.render(&widget.core());
        if !widget.shared.refresh_interval.is_zero() && widget.can_refresh() {
            widget.start_auto_refresh();
        }
        widget
    }

    /// Grid id, once the widget has been placed
    pub fn id(&self) -> Option<String> {
        self.shared.scaffold.root.attribute(WIDGET_ID_ATTR)
    }

    pub fn widget_type(&self) -> WidgetType {
        self.shared.widget_type
    }

    pub fn view(&self) -> Arc<dyn ViewHandle> {
        self.shared.scaffold.root.clone()
    }

    pub fn title(&self) -> String {
        self.core().title.clone()
    }

    pub fn size(&self) -> WidgetSize {
        self.core().size
    }

    pub fn state(&self) -> WidgetState {
        self.core().state.clone()
    }

    pub fn data(&self) -> Option<WidgetData> {
        self.core().state.data.clone()
    }

    pub fn is_collapsed(&self) -> bool {
        self.core().state.collapsed
    }

    pub fn can_refresh(&self) -> bool {
        self.shared.data_source.is_some()
    }

    pub fn is_movable(&self) -> bool {
        self.shared.movable
    }

    pub fn is_resizable(&self) -> bool {
        self.shared.resizable
    }

    pub fn is_collapsible(&self) -> bool {
        self.shared.collapsible
    }

    pub fn is_destroyed(&self) -> bool {
        self.core().destroyed
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.core()
            .refresh_timer
            .as_ref()
            .is_some_and(|timer| !timer.task.is_finished())
    }

    /// Body for the current state, as last pushed to the view
    pub fn rendered_body(&self) -> RenderedBody {
        self.body_for(&self.core().state)
    }

    pub fn update_data(&self, data: WidgetData) {
        self.mutate_state(|state| state.update_data(data));
    }

    pub fn set_loading(&self, loading: bool) {
        self.mutate_state(|state| state.set_loading(loading));
    }

    /// `None` or an empty message clears the error
    pub fn set_error(&self, message: Option<&str>) {
        self.mutate_state(|state| state.set_error(message));
    }

    /// Fetch fresh data from the configured source.
    ///
    /// Failures land in the `Error` phase and never propagate. When refreshes
    /// overlap, the most recently started one wins and earlier completions
    /// are discarded.
    pub async fn refresh(&self) {
        let Some(source) = self.shared.data_source.clone() else {
            return;
        };

        let generation = {
            let mut core = self.core();
            if core.destroyed {
                return;
            }
            core.refresh_generation += 1;
            core.state.set_loading(true);
            self.render(&core);
            core.refresh_generation
        };

        let mut pending = PendingRefresh {
            widget: self,
            generation,
            armed: true,
        };
        let outcome = source.fetch().await;
        pending.armed = false;

        let mut core = self.core();
        if core.destroyed {
            tracing::debug!("Discarding refresh result for destroyed widget {:?}", self.id());
            return;
        }
        if core.refresh_generation != generation {
            tracing::debug!("Discarding stale refresh result for widget {:?}", self.id());
            return;
        }

        match outcome {
            Ok(data) => core.state.update_data(data),
            Err(e) => {
                tracing::warn!("Refresh failed for widget {:?}: {:#}", self.id(), e);
                let message = e.to_string();
                let message = if message.is_empty() {
                    FALLBACK_ERROR
                } else {
                    message.as_str()
                };
                core.state.set_error(Some(message));
            }
        }
        core.state.set_loading(false);
        self.render(&core);
    }

    /// Flip the collapsed flag. Returns the new value.
    pub fn toggle_collapse(&self) -> bool {
        if !self.shared.collapsible {
            return self.is_collapsed();
        }

        let collapsed = {
            let mut core = self.core();
            if core.destroyed {
                return core.state.collapsed;
            }
            core.state.collapsed = !core.state.collapsed;
            self.shared
                .scaffold
                .root
                .toggle_class("collapsed", core.state.collapsed);
            core.state.collapsed
        };

        if let Some(toggle) = &self.shared.scaffold.collapse_toggle {
            let glyph = if collapsed { GLYPH_COLLAPSED } else { GLYPH_EXPANDED };
            toggle.set_content(ViewContent::Text(glyph.to_string()));
        }
        if let Some(on_collapse) = &self.shared.on_collapse {
            on_collapse(collapsed);
        }
        self.emit(WidgetEventKind::Collapse { collapsed });
        collapsed
    }

    /// Start the recurring refresh timer, replacing any running one.
    ///
    /// Returns `false` when there is nothing to schedule: no interval, no
    /// data source, no tokio runtime, or the widget is destroyed.
    pub fn start_auto_refresh(&self) -> bool {
        let period = self.shared.refresh_interval;
        if period.is_zero() || !self.can_refresh() {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No tokio runtime; auto-refresh for {:?} not started", self.id());
            return false;
        };

        let mut core = self.core();
        if core.destroyed {
            return false;
        }
        let task = runtime.spawn(refresh_loop(Arc::downgrade(&self.shared), period));
        core.refresh_timer = Some(RefreshTimer { task });
        tracing::debug!("Auto-refresh every {:?} for widget {:?}", period, self.id());
        true
    }

    pub fn stop_auto_refresh(&self) {
        let timer = self.core().refresh_timer.take();
        if timer.is_some() {
            tracing::debug!("Auto-refresh stopped for widget {:?}", self.id());
        }
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        let mut core = self.core();
        if core.destroyed {
            return;
        }
        self.shared
            .scaffold
            .title
            .set_content(ViewContent::Text(title.clone()));
        core.title = title;
    }

    /// No-op for widgets configured as not resizable
    pub fn set_size(&self, size: WidgetSize) {
        if !self.shared.resizable {
            return;
        }
        {
            let mut core = self.core();
            if core.destroyed {
                return;
            }
            core.size = size;
            self.shared
                .scaffold
                .root
                .set_attribute("data-size", size.as_str());
        }
        if let Some(on_resize) = &self.shared.on_resize {
            on_resize(size);
        }
    }

    /// Tell the widget its grid placement changed
    pub fn notify_moved(&self, placement: &Placement) {
        if let Some(on_move) = &self.shared.on_move {
            on_move(placement);
        }
    }

    /// Run the header action `id`. Returns `false` for unknown actions.
    pub fn trigger_action(&self, id: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }
        match self.shared.actions.iter().find(|a| a.id == id) {
            Some(action) => {
                (action.handler)(self);
                true
            }
            None => false,
        }
    }

    /// Header click on a sortable table column.
    ///
    /// Emits `widget-sort`; sorting itself happens upstream.
    pub fn sort_by(&self, column: &str) -> bool {
        if self.shared.widget_type != WidgetType::Table {
            return false;
        }

        let sortable = {
            let core = self.core();
            !core.destroyed
                && core
                    .state
                    .data
                    .as_ref()
                    .and_then(|data| TableData::deserialize(data).ok())
                    .is_some_and(|table| {
                        table.sortable && table.columns.iter().any(|c| c.key == column)
                    })
        };
        if !sortable {
            return false;
        }

        self.emit(WidgetEventKind::Sort {
            column: column.to_string(),
        });
        true
    }

    /// Click on the `action` button of the list item at `index`.
    ///
    /// Emits `widget-item-action` carrying the raw item payload.
    pub fn activate_item_action(&self, index: usize, action: &str) -> bool {
        if self.shared.widget_type != WidgetType::List {
            return false;
        }

        let item = {
            let core = self.core();
            if core.destroyed {
                return false;
            }
            let Some(data) = core.state.data.as_ref() else {
                return false;
            };
            let has_action = ListData::deserialize(data).ok().is_some_and(|list| {
                list.items
                    .get(index)
                    .is_some_and(|item| item.actions.iter().any(|a| a.id == action))
            });
            if !has_action {
                return false;
            }
            render::list_item(data, index).map(|item| Value::Object(item.clone()))
        };

        let Some(item) = item else {
            return false;
        };
        self.emit(WidgetEventKind::ItemAction {
            action: action.to_string(),
            item,
        });
        true
    }

    /// Stop the timer, then detach the view. Safe to call repeatedly.
    pub fn destroy(&self) {
        {
            let mut core = self.core();
            if core.destroyed {
                return;
            }
            drop(core.refresh_timer.take());
            core.destroyed = true;
        }
        self.shared.scaffold.root.detach();
        tracing::debug!("Widget {:?} destroyed", self.id());
    }

    fn core(&self) -> MutexGuard<'_, WidgetCore> {
        self.shared
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate_state(&self, mutate: impl FnOnce(&mut WidgetState)) {
        let mut core = self.core();
        if core.destroyed {
            return;
        }
        mutate(&mut core.state);
        self.render(&core);
    }

    fn render(&self, core: &WidgetCore) {
        if core.destroyed {
            return;
        }
        let scaffold = &self.shared.scaffold;
        scaffold
            .root
            .set_attribute("data-phase", core.state.phase.as_str());
        scaffold
            .body
            .set_content(ViewContent::Body(self.body_for(&core.state)));
    }

    fn body_for(&self, state: &WidgetState) -> RenderedBody {
        match state.phase {
            WidgetPhase::Loading => RenderedBody::Loading,
            WidgetPhase::Error => RenderedBody::Error {
                message: state.error_message.clone().unwrap_or_default(),
            },
            WidgetPhase::Empty => RenderedBody::Empty,
            WidgetPhase::Ready => match &state.data {
                Some(data) => render::render(self.shared.widget_type, data),
                None => RenderedBody::Empty,
            },
        }
    }

    fn emit(&self, kind: WidgetEventKind) {
        tracing::debug!("Widget {:?} emits {}", self.id(), kind.name());
        self.shared.scaffold.root.dispatch(WidgetEvent {
            widget_id: self.id(),
            kind,
        });
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core();
        f.debug_struct("Widget")
            .field("type", &self.shared.widget_type)
            .field("title", &core.title)
            .field("phase", &core.state.phase)
            .field("collapsed", &core.state.collapsed)
            .field("destroyed", &core.destroyed)
            .finish()
    }
}

/// Settles a refresh whose future was dropped before the fetch completed
struct PendingRefresh<'a> {
    widget: &'a Widget,
    generation: u64,
    armed: bool,
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut core = self.widget.core();
        if core.destroyed || core.refresh_generation != self.generation {
            return;
        }
        tracing::debug!("Refresh cancelled for widget {:?}", self.widget.id());
        core.state.set_loading(false);
        self.widget.render(&core);
    }
}

/// Each tick spawns the refresh separately so cancelling the timer never
/// strands a widget mid-refresh.
async fn refresh_loop(widget: Weak<WidgetShared>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(shared) = widget.upgrade() else {
            break;
        };
        let widget = Widget { shared };
        if widget.is_destroyed() {
            break;
        }
        tokio::spawn(async move { widget.refresh().await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::data_source::data_source_fn;
    use crate::infrastructure::memory_view::MemoryViewFactory;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn body_of(views: &MemoryViewFactory, widget: &Widget) -> Option<ViewContent> {
        views
            .find(widget.view().as_ref(), ViewRole::Body)
            .and_then(|body| body.content())
    }

    fn counting_source(calls: Arc<AtomicUsize>) -> Arc<dyn WidgetDataSource> {
        data_source_fn(move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({"value": n}))
            }
        })
    }

    #[test]
    fn test_new_widget_renders_initial_state() {
        let views = MemoryViewFactory::new();
        let ready = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Notes").with_data(json!("hello")),
            &views,
        );
        assert_eq!(ready.state().phase, WidgetPhase::Ready);
        assert_eq!(
            body_of(&views, &ready),
            Some(ViewContent::Body(RenderedBody::Card {
                content: "hello".to_string()
            }))
        );
        assert_eq!(ready.view().attribute(WIDGET_TYPE_ATTR).as_deref(), Some("card"));

        let empty = Widget::new(WidgetConfig::new(WidgetType::Chart, "Empty"), &views);
        assert_eq!(empty.state().phase, WidgetPhase::Empty);
        assert_eq!(body_of(&views, &empty), Some(ViewContent::Body(RenderedBody::Empty)));
    }

    #[test]
    fn test_scaffold_has_affordances() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Metric, "Revenue")
                .with_data_source(counting_source(Arc::new(AtomicUsize::new(0))))
                .with_action(WidgetAction::new("export", "Export", |_| {})),
            &views,
        );
        let root = widget.view();
        assert!(root.query("header").is_some());
        assert!(root.query("collapse-toggle").is_some());
        assert!(root.query("refresh-button").is_some());
        let action = root.query("action").unwrap();
        assert_eq!(action.attribute("data-action").as_deref(), Some("export"));
        assert!(root.query("missing").is_none());
    }

    #[test]
    fn test_setters_transition_state() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(WidgetConfig::new(WidgetType::Metric, "KPI"), &views);

        widget.set_loading(true);
        assert_eq!(widget.state().phase, WidgetPhase::Loading);
        assert_eq!(body_of(&views, &widget), Some(ViewContent::Body(RenderedBody::Loading)));

        widget.set_loading(false);
        assert_eq!(widget.state().phase, WidgetPhase::Empty);

        widget.set_error(Some("offline"));
        assert_eq!(widget.view().attribute("data-phase").as_deref(), Some("error"));

        widget.update_data(json!({"value": 10}));
        let state = widget.state();
        assert_eq!(state.phase, WidgetPhase::Ready);
        assert!(state.error_message.is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_source_is_noop() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Static").with_data(json!("x")),
            &views,
        );
        widget.refresh().await;
        assert_eq!(widget.state().phase, WidgetPhase::Ready);
        assert!(!widget.start_auto_refresh());
    }

    #[tokio::test]
    async fn test_refresh_success_updates_data() {
        let views = MemoryViewFactory::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Metric, "Counter")
                .with_data_source(counting_source(calls.clone())),
            &views,
        );

        widget.refresh().await;

        let state = widget.state();
        assert_eq!(state.phase, WidgetPhase::Ready);
        assert_eq!(state.data, Some(json!({"value": 1})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_isolated_and_keeps_schedule() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Metric, "Flaky")
                .with_refresh_interval(Duration::from_millis(1000))
                .with_data_source(data_source_fn(|| async {
                    Err(anyhow::anyhow!("upstream unavailable"))
                })),
            &views,
        );

        widget.refresh().await;

        let state = widget.state();
        assert_eq!(state.phase, WidgetPhase::Error);
        assert_eq!(state.error_message.as_deref(), Some("upstream unavailable"));
        assert!(!widget.is_destroyed());
        assert!(widget.is_auto_refreshing());
        widget.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_ticks_on_interval() {
        let views = MemoryViewFactory::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Metric, "Ticker")
                .with_refresh_interval(Duration::from_millis(1000))
                .with_data_source(counting_source(calls.clone())),
            &views,
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(widget.state().phase, WidgetPhase::Ready);

        widget.stop_auto_refresh();
        widget.stop_auto_refresh();
        assert!(!widget.is_auto_refreshing());

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let views = MemoryViewFactory::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Metric, "Ticker")
                .with_refresh_interval(Duration::from_millis(1000))
                .with_data_source(counting_source(calls.clone())),
            &views,
        );

        assert!(widget.start_auto_refresh());
        assert!(widget.start_auto_refresh());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_timer_and_detaches_once() {
        let views = MemoryViewFactory::new();
        let container = views.create_node(ViewRole::Grid);
        let calls = Arc::new(AtomicUsize::new(0));
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Metric, "Ticker")
                .with_refresh_interval(Duration::from_millis(1000))
                .with_data_source(counting_source(calls.clone())),
            &views,
        );
        widget.view().attach(container.as_ref());

        widget.destroy();
        widget.destroy();

        let root = views.find_root(widget.view().as_ref()).unwrap();
        assert_eq!(root.detach_count(), 1);
        assert!(!root.is_attached());
        assert!(!widget.is_auto_refreshing());

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refresh_is_discarded() {
        let views = MemoryViewFactory::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let source_calls = calls.clone();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Racy").with_data_source(data_source_fn(
                move || {
                    let call = source_calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if call == 0 {
                            tokio::time::sleep(Duration::from_millis(500)).await;
                            Ok(json!("old"))
                        } else {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok(json!("new"))
                        }
                    }
                },
            )),
            &views,
        );

        tokio::join!(widget.refresh(), async {
            tokio::task::yield_now().await;
            widget.refresh().await;
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let state = widget.state();
        assert_eq!(state.phase, WidgetPhase::Ready);
        assert_eq!(state.data, Some(json!("new")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_after_destroy_is_not_rendered() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Slow").with_data_source(data_source_fn(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!("late"))
            })),
            &views,
        );

        let pending = tokio::spawn({
            let widget = widget.clone();
            async move { widget.refresh().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(body_of(&views, &widget), Some(ViewContent::Body(RenderedBody::Loading)));

        widget.destroy();
        pending.await.unwrap();

        assert_eq!(widget.state().data, None);
        assert_eq!(body_of(&views, &widget), Some(ViewContent::Body(RenderedBody::Loading)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_refresh_clears_loading() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Hung")
                .with_data(json!({"content": "cached"}))
                .with_data_source(data_source_fn(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(json!({"content": "fresh"}))
                })),
            &views,
        );

        let result = tokio::time::timeout(Duration::from_millis(100), widget.refresh()).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        let state = widget.state();
        assert_eq!(state.phase, WidgetPhase::Ready);
        assert_eq!(state.data, Some(json!({"content": "cached"})));
        assert_eq!(
            body_of(&views, &widget),
            Some(ViewContent::Body(RenderedBody::Card {
                content: "cached".to_string()
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_stale_refresh_leaves_newer_one_loading() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Overlap").with_data_source(data_source_fn(
                || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(json!("done"))
                },
            )),
            &views,
        );

        let newer = tokio::spawn({
            let widget = widget.clone();
            async move {
                tokio::task::yield_now().await;
                widget.refresh().await
            }
        });
        let _ = tokio::time::timeout(Duration::from_millis(100), widget.refresh()).await;
        assert_eq!(widget.state().phase, WidgetPhase::Loading);

        newer.await.unwrap();
        assert_eq!(widget.state().data, Some(json!("done")));
        assert_eq!(widget.state().phase, WidgetPhase::Ready);
    }

    #[test]
    fn test_toggle_collapse_emits_event_and_callback() {
        let views = MemoryViewFactory::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Fold")
                .on_collapse(move |collapsed| sink.lock().unwrap().push(collapsed)),
            &views,
        );

        assert!(widget.toggle_collapse());
        assert!(widget.view().has_class("collapsed"));
        assert!(!widget.toggle_collapse());

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
        let events = views.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, WidgetEventKind::Collapse { collapsed: true });
        assert_eq!(
            views
                .find(widget.view().as_ref(), ViewRole::CollapseToggle)
                .and_then(|t| t.content()),
            Some(ViewContent::Text(GLYPH_EXPANDED.to_string()))
        );
    }

    #[test]
    fn test_non_collapsible_widget_ignores_toggle() {
        let views = MemoryViewFactory::new();
        let mut config = WidgetConfig::new(WidgetType::Card, "Fixed");
        config.collapsible = false;
        let widget = Widget::new(config, &views);

        assert!(!widget.toggle_collapse());
        assert!(views.events().is_empty());
        assert!(widget.view().query("collapse-toggle").is_none());
    }

    #[test]
    fn test_table_header_click_emits_single_sort_event() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Table, "Holdings").with_data(json!({
                "columns": [{"key": "symbol"}, {"key": "price"}],
                "rows": [{"symbol": "AAPL", "price": 182.5}],
                "sortable": true
            })),
            &views,
        );

        assert!(widget.sort_by("price"));
        assert!(!widget.sort_by("volume"));

        let events = views.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            WidgetEventKind::Sort {
                column: "price".to_string()
            }
        );
    }

    #[test]
    fn test_unsortable_table_emits_nothing() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Table, "Static").with_data(json!({
                "columns": [{"key": "price"}],
                "rows": []
            })),
            &views,
        );
        assert!(!widget.sort_by("price"));
        assert!(views.events().is_empty());
    }

    #[test]
    fn test_list_item_action_carries_item() {
        let views = MemoryViewFactory::new();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::List, "Watchlist").with_data(json!({
                "items": [
                    {"title": "AAPL", "actions": [{"id": "remove", "icon": "x"}]},
                    {"title": "MSFT"}
                ]
            })),
            &views,
        );

        assert!(widget.activate_item_action(0, "remove"));
        assert!(!widget.activate_item_action(1, "remove"));
        assert!(!widget.activate_item_action(7, "remove"));

        let events = views.events();
        assert_eq!(events.len(), 1);
        match &events[0].kind {
            WidgetEventKind::ItemAction { action, item } => {
                assert_eq!(action, "remove");
                assert_eq!(item["title"], json!("AAPL"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_action_handler_and_mutators() {
        let views = MemoryViewFactory::new();
        let triggered = Arc::new(AtomicUsize::new(0));
        let counter = triggered.clone();
        let resized = Arc::new(Mutex::new(None));
        let resize_sink = resized.clone();
        let widget = Widget::new(
            WidgetConfig::new(WidgetType::Card, "Old")
                .with_action(WidgetAction::new("ping", "Ping", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .on_resize(move |size| *resize_sink.lock().unwrap() = Some(size)),
            &views,
        );

        assert!(widget.trigger_action("ping"));
        assert!(!widget.trigger_action("pong"));
        assert_eq!(triggered.load(Ordering::SeqCst), 1);

        widget.set_title("New");
        widget.set_size(WidgetSize::Xl);
        assert_eq!(widget.title(), "New");
        assert_eq!(widget.size(), WidgetSize::Xl);
        assert_eq!(*resized.lock().unwrap(), Some(WidgetSize::Xl));
        assert_eq!(
            views
                .find(widget.view().as_ref(), ViewRole::Title)
                .and_then(|t| t.content()),
            Some(ViewContent::Text("New".to_string()))
        );
    }

    #[test]
    fn test_fixed_size_widget_ignores_resize() {
        let views = MemoryViewFactory::new();
        let resized = Arc::new(AtomicUsize::new(0));
        let counter = resized.clone();
        let mut config = WidgetConfig::new(WidgetType::Card, "Pinned")
            .with_size(WidgetSize::Small)
            .on_resize(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        config.resizable = false;
        let widget = Widget::new(config, &views);

        widget.set_size(WidgetSize::Large);
        assert_eq!(widget.size(), WidgetSize::Small);
        assert_eq!(resized.load(Ordering::SeqCst), 0);
        assert_eq!(
            widget.view().attribute("data-size").as_deref(),
            Some(WidgetSize::Small.as_str())
        );
    }
}
