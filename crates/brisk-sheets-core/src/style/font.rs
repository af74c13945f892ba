//! Font style types

use std::hash::{Hash, Hasher};

use super::Color;

/// Font settings
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    /// Family name (e.g. "Calibri")
    pub name: String,
    /// Size in points
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: Underline,
    pub strike: bool,
    pub script: FontScript,
    pub color: Color,
    /// Font family classification (2 = swiss)
    pub family: Option<u8>,
    pub scheme: FontScheme,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            name: "Calibri".to_string(),
            size: 11.0,
            bold: false,
            italic: false,
            underline: Underline::None,
            strike: false,
            script: FontScript::Baseline,
            color: Color::Theme {
                index: 1,
                tint: Default::default(),
            },
            family: Some(2),
            scheme: FontScheme::Minor,
        }
    }
}

impl Font {
    /// Smallest and largest sizes accepted
    pub const MIN_SIZE: f64 = 1.0;
    pub const MAX_SIZE: f64 = 409.0;
}

impl Hash for Font {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.size.to_bits().hash(state);
        self.bold.hash(state);
        self.italic.hash(state);
        self.underline.hash(state);
        self.strike.hash(state);
        self.script.hash(state);
        self.color.hash(state);
        self.family.hash(state);
        self.scheme.hash(state);
    }
}

// Sizes are validated finite by the builder, so bitwise equality is total.
impl Eq for Font {}

/// Underline variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Underline {
    #[default]
    None,
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

impl Underline {
    /// Wire value of the `u` element
    pub fn as_str(&self) -> &'static str {
        match self {
            Underline::None => "none",
            Underline::Single => "single",
            Underline::Double => "double",
            Underline::SingleAccounting => "singleAccounting",
            Underline::DoubleAccounting => "doubleAccounting",
        }
    }

    /// Parse the `val` of a `u` element; a bare `<u/>` means single
    pub fn parse(s: &str) -> Self {
        match s {
            "double" => Underline::Double,
            "singleAccounting" => Underline::SingleAccounting,
            "doubleAccounting" => Underline::DoubleAccounting,
            "none" => Underline::None,
            _ => Underline::Single,
        }
    }
}

/// Superscript / subscript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontScript {
    #[default]
    Baseline,
    Superscript,
    Subscript,
}

impl FontScript {
    /// Wire value of `vertAlign`
    pub fn as_str(&self) -> &'static str {
        match self {
            FontScript::Baseline => "baseline",
            FontScript::Superscript => "superscript",
            FontScript::Subscript => "subscript",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "superscript" => FontScript::Superscript,
            "subscript" => FontScript::Subscript,
            _ => FontScript::Baseline,
        }
    }
}

/// Theme font scheme binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontScheme {
    #[default]
    None,
    Minor,
    Major,
}

impl FontScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontScheme::None => "none",
            FontScheme::Minor => "minor",
            FontScheme::Major => "major",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "minor" => FontScheme::Minor,
            "major" => FontScheme::Major,
            _ => FontScheme::None,
        }
    }
}
