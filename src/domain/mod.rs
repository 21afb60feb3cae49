// Domain layer - Pure widget, placement and layout models
pub mod layout;
pub mod placement;
pub mod render;
pub mod widget;
