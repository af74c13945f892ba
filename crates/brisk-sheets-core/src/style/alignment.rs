//! Text alignment types

use crate::error::{Error, Result};

/// Cell alignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Alignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    pub wrap: bool,
    pub shrink: bool,
    /// Indent level 0..=255
    pub indent: u8,
    /// Degrees in [-90, 90], or 270 for stacked vertical text
    pub rotation: i16,
    pub reading_order: ReadingOrder,
}

impl Alignment {
    /// Whether every field holds its default
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Check a rotation angle for the domain [-90, 90] ∪ {270}
pub fn validate_rotation(degrees: i16) -> Result<i16> {
    if (-90..=90).contains(&degrees) || degrees == 270 {
        Ok(degrees)
    } else {
        Err(Error::invalid_value(
            "rotation",
            format!("{} is outside [-90, 90] and is not 270", degrees),
        ))
    }
}

/// Encode an angle as the `textRotation` attribute.
///
/// 0..=90 are written as is, negative angles as 90 + |angle|, and 270
/// (stacked text) as 255.
pub fn rotation_to_wire(degrees: i16) -> u16 {
    match degrees {
        270 => 255,
        d if d < 0 => 90 + d.unsigned_abs(),
        d => d as u16,
    }
}

/// Decode a `textRotation` attribute; out-of-range values fall back to 0
pub fn rotation_from_wire(value: u16) -> i16 {
    match value {
        0..=90 => value as i16,
        91..=180 => 90 - value as i16,
        255 => 270,
        _ => 0,
    }
}

/// Horizontal alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlignment {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

impl HorizontalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlignment::General => "general",
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
            HorizontalAlignment::Fill => "fill",
            HorizontalAlignment::Justify => "justify",
            HorizontalAlignment::CenterContinuous => "centerContinuous",
            HorizontalAlignment::Distributed => "distributed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "left" => HorizontalAlignment::Left,
            "center" => HorizontalAlignment::Center,
            "right" => HorizontalAlignment::Right,
            "fill" => HorizontalAlignment::Fill,
            "justify" => HorizontalAlignment::Justify,
            "centerContinuous" => HorizontalAlignment::CenterContinuous,
            "distributed" => HorizontalAlignment::Distributed,
            _ => HorizontalAlignment::General,
        }
    }
}

/// Vertical alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlignment {
    Top,
    Center,
    #[default]
    Bottom,
    Justify,
    Distributed,
}

impl VerticalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Bottom => "bottom",
            VerticalAlignment::Justify => "justify",
            VerticalAlignment::Distributed => "distributed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "top" => VerticalAlignment::Top,
            "center" => VerticalAlignment::Center,
            "justify" => VerticalAlignment::Justify,
            "distributed" => VerticalAlignment::Distributed,
            _ => VerticalAlignment::Bottom,
        }
    }
}

/// Reading order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadingOrder {
    #[default]
    ContextDependent,
    LeftToRight,
    RightToLeft,
}

impl ReadingOrder {
    /// Wire value of `readingOrder`
    pub fn code(&self) -> u8 {
        match self {
            ReadingOrder::ContextDependent => 0,
            ReadingOrder::LeftToRight => 1,
            ReadingOrder::RightToLeft => 2,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ReadingOrder::LeftToRight,
            2 => ReadingOrder::RightToLeft,
            _ => ReadingOrder::ContextDependent,
        }
    }
}
