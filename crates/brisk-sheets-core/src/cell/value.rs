//! Cell value types

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::cell::CellRange;
use crate::strings::StringId;
use crate::style::StyleId;

/// The value stored in a cell.
///
/// Kept to a discriminant plus an 8-byte payload: strings live in the shared
/// string table and formulas are boxed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value (a styled but empty cell)
    #[default]
    Blank,
    /// Numeric value; dates are stored as serial numbers
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// String held in the workbook's shared string table
    SharedString(StringId),
    /// String stored inline in the cell
    InlineString(Box<String>),
    /// Error literal (#DIV/0!, #N/A, ...)
    Error(CellError),
    /// Formula with optional cached result
    Formula(Box<Formula>),
}

impl CellValue {
    /// Build a stand-alone formula value (leading `=` is stripped)
    pub fn formula<S: AsRef<str>>(text: S) -> Self {
        CellValue::Formula(Box::new(Formula::new(text)))
    }

    /// Check if the cell is blank
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }

    /// Check if the cell holds a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    /// The formula payload, if any
    pub fn as_formula(&self) -> Option<&Formula> {
        match self {
            CellValue::Formula(f) => Some(f),
            _ => None,
        }
    }

    /// Shared formula index when the cell takes part in a shared formula
    pub fn shared_index(&self) -> Option<u32> {
        match self {
            CellValue::Formula(f) => match f.kind {
                FormulaKind::Shared { si } => Some(si),
                _ => None,
            },
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Blank => "blank",
            CellValue::Number(_) => "number",
            CellValue::Bool(_) => "boolean",
            CellValue::SharedString(_) | CellValue::InlineString(_) => "string",
            CellValue::Error(_) => "error",
            CellValue::Formula(_) => "formula",
        }
    }
}

/// How a formula cell obtains its text
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaKind {
    /// Ordinary formula with its own text (no leading `=`)
    Single(String),
    /// Member of a shared formula; the text is derived from the group template
    Shared { si: u32 },
    /// Legacy array (CSE) formula entered over `range`
    Array { text: String, range: CellRange },
}

/// A formula cell payload
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub kind: FormulaKind,
    /// Result recorded in the file; never recomputed
    pub cached: Option<CachedValue>,
}

impl Formula {
    /// Create a single-cell formula
    pub fn new<S: AsRef<str>>(text: S) -> Self {
        let text = text.as_ref();
        Self {
            kind: FormulaKind::Single(text.strip_prefix('=').unwrap_or(text).to_string()),
            cached: None,
        }
    }

    /// Create a shared formula member
    pub fn shared(si: u32) -> Self {
        Self {
            kind: FormulaKind::Shared { si },
            cached: None,
        }
    }

    /// Attach a cached result
    pub fn with_cached(mut self, cached: CachedValue) -> Self {
        self.cached = Some(cached);
        self
    }

    /// Own text for single and array formulas; `None` for shared members
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            FormulaKind::Single(t) | FormulaKind::Array { text: t, .. } => Some(t),
            FormulaKind::Shared { .. } => None,
        }
    }
}

/// Formula result as recorded in the file
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Error(CellError),
}

/// Cell error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #NULL!
    Null,
    /// #DIV/0!
    Div0,
    /// #VALUE!
    Value,
    /// #REF!
    Ref,
    /// #NAME?
    Name,
    /// #NUM!
    Num,
    /// #N/A
    Na,
    /// #GETTING_DATA
    GettingData,
}

impl CellError {
    /// Literal form of the error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
            CellError::GettingData => "#GETTING_DATA",
        }
    }

    /// Parse an error literal (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        const ALL: [CellError; 8] = [
            CellError::Null,
            CellError::Div0,
            CellError::Value,
            CellError::Ref,
            CellError::Name,
            CellError::Num,
            CellError::Na,
            CellError::GettingData,
        ];
        let s = s.trim();
        ALL.into_iter().find(|e| e.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cell record: value plus an optional style reference
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellData {
    pub value: CellValue,
    pub style: Option<StyleId>,
}

impl CellData {
    /// Cell with a value and no explicit style
    pub fn new(value: CellValue) -> Self {
        Self { value, style: None }
    }

    /// Cell with a value and style
    pub fn styled(value: CellValue, style: StyleId) -> Self {
        Self {
            value,
            style: Some(style),
        }
    }
}

/// Caller-facing value accepted by the typed setters.
///
/// Strings are interned into the shared string table when written; dates are
/// converted to serial numbers and given a date number format.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Blank,
    Number(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDateTime),
    Error(CellError),
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d.and_time(chrono::NaiveTime::MIN))
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Self {
        Value::Error(e)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Blank, Into::into)
    }
}
