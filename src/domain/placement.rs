// Grid placement domain model
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Row or column origin: an explicit 1-based grid line or flow placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "PositionRepr", into = "PositionRepr")]
pub enum GridPosition {
    #[default]
    Auto,
    Line(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PositionRepr {
    Line(u32),
    Keyword(String),
}

impl TryFrom<PositionRepr> for GridPosition {
    type Error = String;

    fn try_from(repr: PositionRepr) -> Result<Self, Self::Error> {
        match repr {
            PositionRepr::Line(line) => Ok(GridPosition::Line(line)),
            PositionRepr::Keyword(k) if k.eq_ignore_ascii_case("auto") => Ok(GridPosition::Auto),
            PositionRepr::Keyword(k) => Err(format!("invalid grid position `{k}`")),
        }
    }
}

impl From<GridPosition> for PositionRepr {
    fn from(position: GridPosition) -> Self {
        match position {
            GridPosition::Auto => PositionRepr::Keyword("auto".to_string()),
            GridPosition::Line(line) => PositionRepr::Line(line),
        }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridPosition::Auto => f.write_str("auto"),
            GridPosition::Line(line) => write!(f, "{line}"),
        }
    }
}

/// A widget's origin and span. Spans are never below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(default)]
    pub row: GridPosition,
    #[serde(default)]
    pub column: GridPosition,
    #[serde(default = "default_span", deserialize_with = "deserialize_span", alias = "row_span")]
    pub row_span: u32,
    #[serde(default = "default_span", deserialize_with = "deserialize_span", alias = "column_span")]
    pub column_span: u32,
}

fn default_span() -> u32 {
    1
}

fn deserialize_span<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(u32::deserialize(deserializer)?.max(1))
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            row: GridPosition::Auto,
            column: GridPosition::Auto,
            row_span: 1,
            column_span: 1,
        }
    }
}

impl Placement {
    pub fn at(row: u32, column: u32) -> Self {
        Self {
            row: GridPosition::Line(row),
            column: GridPosition::Line(column),
            ..Self::default()
        }
    }

    pub fn with_span(mut self, row_span: u32, column_span: u32) -> Self {
        self.row_span = row_span.max(1);
        self.column_span = column_span.max(1);
        self
    }

    pub fn normalized(mut self) -> Self {
        self.row_span = self.row_span.max(1);
        self.column_span = self.column_span.max(1);
        self
    }

    /// Row track in `start / span n` form
    pub fn row_track(&self) -> String {
        format!("{} / span {}", self.row, self.row_span)
    }

    pub fn column_track(&self) -> String {
        format!("{} / span {}", self.column, self.column_span)
    }
}

/// Partial placement; unset fields keep their current value on move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementPatch {
    pub row: Option<GridPosition>,
    pub column: Option<GridPosition>,
    pub row_span: Option<u32>,
    pub column_span: Option<u32>,
}

impl PlacementPatch {
    pub fn to(row: u32, column: u32) -> Self {
        Self {
            row: Some(GridPosition::Line(row)),
            column: Some(GridPosition::Line(column)),
            ..Self::default()
        }
    }

    pub fn merge_into(&self, base: &Placement) -> Placement {
        Placement {
            row: self.row.unwrap_or(base.row),
            column: self.column.unwrap_or(base.column),
            row_span: self.row_span.unwrap_or(base.row_span),
            column_span: self.column_span.unwrap_or(base.column_span),
        }
        .normalized()
    }
}

impl From<Placement> for PlacementPatch {
    fn from(placement: Placement) -> Self {
        Self {
            row: Some(placement.row),
            column: Some(placement.column),
            row_span: Some(placement.row_span),
            column_span: Some(placement.column_span),
        }
    }
}

/// One `{ id, placement }` record of a grid layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    pub id: String,
    pub placement: Placement,
}

pub type GridLayout = Vec<LayoutEntry>;
