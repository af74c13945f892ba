//! Border style types

use super::Color;

/// Four edges plus the two diagonals
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Border {
    pub left: BorderEdge,
    pub right: BorderEdge,
    pub top: BorderEdge,
    pub bottom: BorderEdge,
    /// Bottom-left to top-right
    pub diagonal_up: BorderEdge,
    /// Top-left to bottom-right
    pub diagonal_down: BorderEdge,
}

impl Border {
    /// Same edge on all four sides
    pub fn outline(style: BorderLineStyle, color: Color) -> Self {
        let edge = BorderEdge::new(style, color);
        Self {
            left: edge,
            right: edge,
            top: edge,
            bottom: edge,
            ..Self::default()
        }
    }

    /// Whether no edge is drawn
    pub fn is_empty(&self) -> bool {
        [
            &self.left,
            &self.right,
            &self.top,
            &self.bottom,
            &self.diagonal_up,
            &self.diagonal_down,
        ]
        .iter()
        .all(|e| e.is_none())
    }

    /// The edge written as the single `diagonal` element; the package format
    /// shares one line style between both diagonals, up wins when both differ
    pub fn diagonal(&self) -> BorderEdge {
        if !self.diagonal_up.is_none() {
            self.diagonal_up
        } else {
            self.diagonal_down
        }
    }
}

/// One border line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BorderEdge {
    pub style: BorderLineStyle,
    pub color: Color,
}

impl BorderEdge {
    pub fn new(style: BorderLineStyle, color: Color) -> Self {
        Self { style, color }
    }

    /// Thin black line
    pub fn thin() -> Self {
        Self::new(BorderLineStyle::Thin, Color::BLACK)
    }

    pub fn is_none(&self) -> bool {
        self.style == BorderLineStyle::None
    }
}

/// Line style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderLineStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

const LINE_NAMES: [(BorderLineStyle, &str); 14] = [
    (BorderLineStyle::None, "none"),
    (BorderLineStyle::Thin, "thin"),
    (BorderLineStyle::Medium, "medium"),
    (BorderLineStyle::Thick, "thick"),
    (BorderLineStyle::Dashed, "dashed"),
    (BorderLineStyle::Dotted, "dotted"),
    (BorderLineStyle::Double, "double"),
    (BorderLineStyle::Hair, "hair"),
    (BorderLineStyle::MediumDashed, "mediumDashed"),
    (BorderLineStyle::DashDot, "dashDot"),
    (BorderLineStyle::MediumDashDot, "mediumDashDot"),
    (BorderLineStyle::DashDotDot, "dashDotDot"),
    (BorderLineStyle::MediumDashDotDot, "mediumDashDotDot"),
    (BorderLineStyle::SlantDashDot, "slantDashDot"),
];

impl BorderLineStyle {
    pub fn as_str(&self) -> &'static str {
        LINE_NAMES
            .iter()
            .find(|(s, _)| s == self)
            .map_or("none", |(_, n)| n)
    }

    pub fn parse(s: &str) -> Self {
        LINE_NAMES
            .iter()
            .find(|(_, n)| *n == s)
            .map_or(BorderLineStyle::None, |(st, _)| *st)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline() {
        let b = Border::outline(BorderLineStyle::Thin, Color::BLACK);
        assert!(!b.is_empty());
        assert!(b.diagonal_up.is_none());
        assert!(Border::default().is_empty());
        assert_eq!(BorderLineStyle::parse("mediumDashDotDot"), BorderLineStyle::MediumDashDotDot);
    }

    #[test]
    fn test_diagonal_prefers_up() {
        let mut b = Border::default();
        b.diagonal_down = BorderEdge::new(BorderLineStyle::Dashed, Color::RED);
        assert_eq!(b.diagonal().style, BorderLineStyle::Dashed);
        b.diagonal_up = BorderEdge::thin();
        assert_eq!(b.diagonal().style, BorderLineStyle::Thin);
    }
}
