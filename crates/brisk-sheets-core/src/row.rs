//! Row properties

use crate::style::StyleId;

/// Largest row height Excel accepts, in points
pub const MAX_ROW_HEIGHT: f64 = 409.0;

/// Row metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowProps {
    /// Custom height in points (None = default)
    pub height: Option<f64>,
    /// Row is hidden
    pub hidden: bool,
    /// Row-level style
    pub style: Option<StyleId>,
    /// Outline/grouping level (0-7)
    pub outline_level: u8,
    /// Row is collapsed (in outline)
    pub collapsed: bool,
}

impl RowProps {
    /// Check if this row has any custom settings
    pub fn has_custom_settings(&self) -> bool {
        *self != RowProps::default()
    }
}
