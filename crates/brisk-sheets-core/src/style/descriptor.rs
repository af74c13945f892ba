//! Immutable format descriptors and their builder

use super::{
    validate_rotation, Alignment, Border, BorderEdge, BorderLineStyle, Color, Fill, Font,
    FontScript, HorizontalAlignment, NumberFormat, PatternType, ReadingOrder, Underline,
    VerticalAlignment,
};
use crate::error::{Error, Result};

/// Cell protection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// A complete, immutable cell format.
///
/// Descriptors are values: equal field-by-field means equal, and the derived
/// `Hash` folds every field so the repository can content-address them. Use
/// [`StyleBuilder`] to create one, or [`FormatDescriptor::to_builder`] to
/// derive a modified copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FormatDescriptor {
    font: Font,
    fill: Fill,
    border: Border,
    alignment: Alignment,
    number_format: NumberFormat,
    protection: Protection,
}

impl FormatDescriptor {
    /// Start building a descriptor from the defaults
    pub fn builder() -> StyleBuilder {
        StyleBuilder::new()
    }

    /// Start a builder pre-filled with this descriptor
    pub fn to_builder(&self) -> StyleBuilder {
        StyleBuilder {
            inner: self.clone(),
        }
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    pub fn fill(&self) -> &Fill {
        &self.fill
    }

    pub fn border(&self) -> &Border {
        &self.border
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    pub fn number_format(&self) -> &NumberFormat {
        &self.number_format
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Whether a number in a cell with this format reads as a date
    pub fn is_date(&self) -> bool {
        self.number_format.is_date()
    }
}

/// Mutable builder producing [`FormatDescriptor`]s
///
/// ```
/// use brisk_sheets_core::{Color, StyleBuilder};
///
/// let header = StyleBuilder::new()
///     .bold(true)
///     .font_color(Color::RED)
///     .fill_color(Color::YELLOW)
///     .build()
///     .unwrap();
/// assert!(header.font().bold);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StyleBuilder {
    inner: FormatDescriptor,
}

impl StyleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing descriptor without modifying it
    pub fn from_descriptor(descriptor: &FormatDescriptor) -> Self {
        descriptor.to_builder()
    }

    pub fn font(mut self, font: Font) -> Self {
        self.inner.font = font;
        self
    }

    pub fn font_name<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.font.name = name.into();
        self
    }

    /// Size in points; checked against 1..=409 by [`build`](Self::build)
    pub fn font_size(mut self, size: f64) -> Self {
        self.inner.font.size = size;
        self
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.inner.font.bold = bold;
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.inner.font.italic = italic;
        self
    }

    pub fn underline(mut self, underline: Underline) -> Self {
        self.inner.font.underline = underline;
        self
    }

    pub fn strike(mut self, strike: bool) -> Self {
        self.inner.font.strike = strike;
        self
    }

    pub fn script(mut self, script: FontScript) -> Self {
        self.inner.font.script = script;
        self
    }

    pub fn font_color(mut self, color: Color) -> Self {
        self.inner.font.color = color;
        self
    }

    pub fn fill(mut self, fill: Fill) -> Self {
        self.inner.fill = fill;
        self
    }

    /// Solid background color
    pub fn fill_color(mut self, color: Color) -> Self {
        self.inner.fill = Fill::solid(color);
        self
    }

    pub fn pattern(mut self, pattern: PatternType, fg: Color, bg: Color) -> Self {
        self.inner.fill = Fill::pattern(pattern, fg, bg);
        self
    }

    pub fn border(mut self, border: Border) -> Self {
        self.inner.border = border;
        self
    }

    /// Same line on all four edges
    pub fn border_outline(mut self, style: BorderLineStyle, color: Color) -> Self {
        let diagonals = (self.inner.border.diagonal_up, self.inner.border.diagonal_down);
        self.inner.border = Border::outline(style, color);
        self.inner.border.diagonal_up = diagonals.0;
        self.inner.border.diagonal_down = diagonals.1;
        self
    }

    pub fn border_left(mut self, edge: BorderEdge) -> Self {
        self.inner.border.left = edge;
        self
    }

    pub fn border_right(mut self, edge: BorderEdge) -> Self {
        self.inner.border.right = edge;
        self
    }

    pub fn border_top(mut self, edge: BorderEdge) -> Self {
        self.inner.border.top = edge;
        self
    }

    pub fn border_bottom(mut self, edge: BorderEdge) -> Self {
        self.inner.border.bottom = edge;
        self
    }

    pub fn diagonal_up(mut self, edge: BorderEdge) -> Self {
        self.inner.border.diagonal_up = edge;
        self
    }

    pub fn diagonal_down(mut self, edge: BorderEdge) -> Self {
        self.inner.border.diagonal_down = edge;
        self
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.inner.alignment = alignment;
        self
    }

    pub fn horizontal(mut self, align: HorizontalAlignment) -> Self {
        self.inner.alignment.horizontal = align;
        self
    }

    pub fn vertical(mut self, align: VerticalAlignment) -> Self {
        self.inner.alignment.vertical = align;
        self
    }

    pub fn wrap(mut self, wrap: bool) -> Self {
        self.inner.alignment.wrap = wrap;
        self
    }

    pub fn shrink(mut self, shrink: bool) -> Self {
        self.inner.alignment.shrink = shrink;
        self
    }

    pub fn indent(mut self, indent: u8) -> Self {
        self.inner.alignment.indent = indent;
        self
    }

    /// Degrees in [-90, 90] or 270; checked by [`build`](Self::build)
    pub fn rotation(mut self, degrees: i16) -> Self {
        self.inner.alignment.rotation = degrees;
        self
    }

    pub fn reading_order(mut self, order: ReadingOrder) -> Self {
        self.inner.alignment.reading_order = order;
        self
    }

    pub fn number_format(mut self, format: NumberFormat) -> Self {
        self.inner.number_format = format;
        self
    }

    /// Custom number format code
    pub fn number_format_code<S: Into<String>>(mut self, code: S) -> Self {
        self.inner.number_format = NumberFormat::custom(code);
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.inner.protection.locked = locked;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.inner.protection.hidden = hidden;
        self
    }

    /// Validate and produce the descriptor
    pub fn build(self) -> Result<FormatDescriptor> {
        let size = self.inner.font.size;
        if !size.is_finite() || !(Font::MIN_SIZE..=Font::MAX_SIZE).contains(&size) {
            return Err(Error::invalid_value(
                "font size",
                format!("{} is outside {}..={}", size, Font::MIN_SIZE, Font::MAX_SIZE),
            ));
        }
        validate_rotation(self.inner.alignment.rotation)?;
        if self.inner.font.name.is_empty() {
            return Err(Error::invalid_value("font name", "must not be empty"));
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_defaults() {
        let d = StyleBuilder::new().build().unwrap();
        assert_eq!(d, FormatDescriptor::default());
        assert!(d.protection().locked);
        assert_eq!(d.font().name, "Calibri");
    }

    #[test]
    fn test_derive_does_not_mutate_original() {
        let base = StyleBuilder::new().bold(true).build().unwrap();
        let derived = base.to_builder().italic(true).build().unwrap();
        assert!(!base.font().italic);
        assert!(derived.font().italic && derived.font().bold);
        assert_ne!(base, derived);
    }

    #[test]
    fn test_validation() {
        assert!(StyleBuilder::new().font_size(0.5).build().is_err());
        assert!(StyleBuilder::new().font_size(f64::NAN).build().is_err());
        assert!(StyleBuilder::new().font_size(409.0).build().is_ok());
        assert!(StyleBuilder::new().rotation(135).build().is_err());
        assert!(StyleBuilder::new().rotation(270).build().is_ok());
    }

    #[test]
    fn test_outline_keeps_diagonals() {
        let d = StyleBuilder::new()
            .diagonal_up(BorderEdge::thin())
            .border_outline(BorderLineStyle::Medium, Color::BLACK)
            .build()
            .unwrap();
        assert_eq!(d.border().diagonal_up, BorderEdge::thin());
        assert_eq!(d.border().left.style, BorderLineStyle::Medium);
    }
}
