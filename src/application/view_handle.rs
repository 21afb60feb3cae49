// View handle port - Renderable node abstraction supplied by the host
use crate::domain::render::RenderedBody;
use crate::domain::widget::WidgetEvent;
use std::fmt;
use std::sync::Arc;

/// Attribute carrying the grid id of a widget's root node
pub const WIDGET_ID_ATTR: &str = "data-widget-id";
/// Attribute recording which renderer a widget uses
pub const WIDGET_TYPE_ATTR: &str = "data-widget-type";

/// Structural role of a node inside a widget scaffold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewRole {
    Grid,
    Widget,
    Header,
    Title,
    Actions,
    Action,
    CollapseToggle,
    RefreshButton,
    Body,
}

impl ViewRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewRole::Grid => "grid",
            ViewRole::Widget => "widget",
            ViewRole::Header => "header",
            ViewRole::Title => "title",
            ViewRole::Actions => "actions",
            ViewRole::Action => "action",
            ViewRole::CollapseToggle => "collapse-toggle",
            ViewRole::RefreshButton => "refresh-button",
            ViewRole::Body => "body",
        }
    }
}

impl fmt::Display for ViewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewContent {
    Text(String),
    Body(RenderedBody),
}

/// An opaque renderable node.
///
/// Implementations must not call back into the widget that owns the handle
/// from inside these methods. Host input reaches a widget through its own
/// methods (`toggle_collapse`, `trigger_action`, `sort_by`, ...), so the
/// handle only carries outbound events.
pub trait ViewHandle: Send + Sync {
    fn attach(&self, parent: &dyn ViewHandle);

    /// Detaching an unattached node is a no-op
    fn detach(&self);

    fn set_content(&self, content: ViewContent);

    fn set_attribute(&self, name: &str, value: &str);

    fn attribute(&self, name: &str) -> Option<String>;

    fn toggle_class(&self, name: &str, on: bool);

    fn has_class(&self, name: &str) -> bool;

    /// Find a descendant by selector (a role name for the built-in scaffold)
    fn query(&self, selector: &str) -> Option<Arc<dyn ViewHandle>>;

    fn dispatch(&self, event: WidgetEvent);
}

/// Creates fresh view nodes
pub trait ViewFactory: Send + Sync {
    fn create(&self, role: ViewRole) -> Arc<dyn ViewHandle>;
}
