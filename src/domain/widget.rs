// Widget domain model
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Type-dependent widget payload. Opaque to the engine beyond presence.
pub type WidgetData = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum WidgetType {
    Metric,
    Chart,
    List,
    Table,
    #[default]
    Card,
}

impl WidgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetType::Metric => "metric",
            WidgetType::Chart => "chart",
            WidgetType::List => "list",
            WidgetType::Table => "table",
            WidgetType::Card => "card",
        }
    }

    /// Unrecognized names fall back to the card renderer
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "metric" => WidgetType::Metric,
            "chart" => WidgetType::Chart,
            "list" => WidgetType::List,
            "table" => WidgetType::Table,
            _ => WidgetType::Card,
        }
    }
}

impl From<String> for WidgetType {
    fn from(name: String) -> Self {
        Self::parse_lossy(&name)
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    #[default]
    Medium,
    Large,
    Xl,
}

impl WidgetSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetSize::Small => "small",
            WidgetSize::Medium => "medium",
            WidgetSize::Large => "large",
            WidgetSize::Xl => "xl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WidgetPhase {
    Loading,
    Error,
    Empty,
    Ready,
}

impl WidgetPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetPhase::Loading => "loading",
            WidgetPhase::Error => "error",
            WidgetPhase::Empty => "empty",
            WidgetPhase::Ready => "ready",
        }
    }
}

/// Mutable widget state.
///
/// `Error` always carries a non-empty message and `Ready` always has data.
/// Collapsing is orthogonal to the phase.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub phase: WidgetPhase,
    pub data: Option<WidgetData>,
    pub error_message: Option<String>,
    pub collapsed: bool,
}

impl WidgetState {
    pub fn new(data: Option<WidgetData>) -> Self {
        let phase = if data.is_some() {
            WidgetPhase::Ready
        } else {
            WidgetPhase::Empty
        };
        Self {
            phase,
            data,
            error_message: None,
            collapsed: false,
        }
    }

    pub fn update_data(&mut self, data: WidgetData) {
        self.data = Some(data);
        self.error_message = None;
        self.phase = WidgetPhase::Ready;
    }

    pub fn set_loading(&mut self, loading: bool) {
        if loading {
            self.phase = WidgetPhase::Loading;
        } else if self.phase == WidgetPhase::Loading {
            self.phase = self.settled_phase();
        }
    }

    /// Empty or missing messages clear the error
    pub fn set_error(&mut self, message: Option<&str>) {
        match message.filter(|m| !m.is_empty()) {
            Some(message) => {
                self.error_message = Some(message.to_string());
                self.phase = WidgetPhase::Error;
            }
            None => {
                self.error_message = None;
                if self.phase == WidgetPhase::Error {
                    self.phase = self.settled_phase();
                }
            }
        }
    }

    fn settled_phase(&self) -> WidgetPhase {
        if self.error_message.is_some() {
            WidgetPhase::Error
        } else if self.data.is_some() {
            WidgetPhase::Ready
        } else {
            WidgetPhase::Empty
        }
    }
}

/// Structured event emitted towards the host application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetEvent {
    pub widget_id: Option<String>,
    #[serde(flatten)]
    pub kind: WidgetEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "detail")]
pub enum WidgetEventKind {
    #[serde(rename = "widget-collapse")]
    Collapse { collapsed: bool },
    #[serde(rename = "widget-sort")]
    Sort { column: String },
    #[serde(rename = "widget-item-action")]
    ItemAction { action: String, item: Value },
}

impl WidgetEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetEventKind::Collapse { .. } => "widget-collapse",
            WidgetEventKind::Sort { .. } => "widget-sort",
            WidgetEventKind::ItemAction { .. } => "widget-item-action",
        }
    }
}
