//! Non-owning views of cell contents

use std::borrow::Cow;

use chrono::NaiveDateTime;

use super::{CachedValue, CellError};
use crate::date::serial_to_datetime;

/// What a cell holds, resolved against the workbook's string table and
/// styles. Borrowed from the sheet; cheap to create.
#[derive(Debug, Clone, PartialEq)]
pub enum CellView<'a> {
    /// No cell, or a styled cell without a value
    Blank,
    Number(f64),
    /// A number whose effective number format is a date format
    Date(f64),
    Bool(bool),
    Text(&'a str),
    Error(CellError),
    /// Formula text (shared members are expanded) and the cached result
    Formula {
        text: Cow<'a, str>,
        cached: Option<&'a CachedValue>,
    },
}

impl<'a> CellView<'a> {
    /// Whether the view is blank
    pub fn is_blank(&self) -> bool {
        matches!(self, CellView::Blank)
    }

    /// Numeric content; dates and cached formula numbers included
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellView::Number(n) | CellView::Date(n) => Some(*n),
            CellView::Formula {
                cached: Some(CachedValue::Number(n)),
                ..
            } => Some(*n),
            _ => None,
        }
    }

    /// Text content; cached formula strings included
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellView::Text(s) => Some(s),
            CellView::Formula {
                cached: Some(CachedValue::Text(s)),
                ..
            } => Some(s),
            _ => None,
        }
    }

    /// Boolean content; cached formula booleans included
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellView::Bool(b) => Some(*b),
            CellView::Formula {
                cached: Some(CachedValue::Bool(b)),
                ..
            } => Some(*b),
            _ => None,
        }
    }

    /// Error content
    pub fn as_error(&self) -> Option<CellError> {
        match self {
            CellView::Error(e) => Some(*e),
            CellView::Formula {
                cached: Some(CachedValue::Error(e)),
                ..
            } => Some(*e),
            _ => None,
        }
    }

    /// Formula text without a leading `=`
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellView::Formula { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Date content converted to a calendar date-time
    pub fn as_datetime(&self, date1904: bool) -> Option<NaiveDateTime> {
        match self {
            CellView::Date(serial) => serial_to_datetime(*serial, date1904),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(CellView::Number(2.0).as_number(), Some(2.0));
        assert_eq!(CellView::Text("a").as_text(), Some("a"));
        assert!(CellView::Blank.is_blank());

        let cached = CachedValue::Number(3.0);
        let view = CellView::Formula {
            text: Cow::Borrowed("A1+A2"),
            cached: Some(&cached),
        };
        assert_eq!(view.formula(), Some("A1+A2"));
        assert_eq!(view.as_number(), Some(3.0));
        assert_eq!(view.as_text(), None);
    }

    #[test]
    fn test_date_view() {
        let dt = CellView::Date(45306.0).as_datetime(false).unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 00:00:00");
        assert_eq!(CellView::Number(45306.0).as_datetime(false), None);
    }
}
