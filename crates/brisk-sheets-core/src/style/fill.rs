//! Fill/background style types

use super::Color;

/// Pattern fill: pattern type plus foreground and background colors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fill {
    pub pattern: PatternType,
    pub fg: Color,
    pub bg: Color,
}

impl Fill {
    /// Solid fill in `color`
    pub fn solid(color: Color) -> Self {
        Self {
            pattern: PatternType::Solid,
            fg: color,
            bg: Color::Indexed(64),
        }
    }

    /// Arbitrary pattern fill
    pub fn pattern(pattern: PatternType, fg: Color, bg: Color) -> Self {
        Self { pattern, fg, bg }
    }

    /// The reserved `gray125` fill every styles part carries at index 1
    pub fn gray125() -> Self {
        Self {
            pattern: PatternType::Gray125,
            ..Self::default()
        }
    }

    /// Whether this is the empty fill
    pub fn is_none(&self) -> bool {
        self.pattern == PatternType::None
    }
}

/// `patternType` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatternType {
    #[default]
    None,
    Solid,
    MediumGray,
    DarkGray,
    LightGray,
    DarkHorizontal,
    DarkVertical,
    DarkDown,
    DarkUp,
    DarkGrid,
    DarkTrellis,
    LightHorizontal,
    LightVertical,
    LightDown,
    LightUp,
    LightGrid,
    LightTrellis,
    Gray125,
    Gray0625,
}

const PATTERN_NAMES: [(PatternType, &str); 19] = [
    (PatternType::None, "none"),
    (PatternType::Solid, "solid"),
    (PatternType::MediumGray, "mediumGray"),
    (PatternType::DarkGray, "darkGray"),
    (PatternType::LightGray, "lightGray"),
    (PatternType::DarkHorizontal, "darkHorizontal"),
    (PatternType::DarkVertical, "darkVertical"),
    (PatternType::DarkDown, "darkDown"),
    (PatternType::DarkUp, "darkUp"),
    (PatternType::DarkGrid, "darkGrid"),
    (PatternType::DarkTrellis, "darkTrellis"),
    (PatternType::LightHorizontal, "lightHorizontal"),
    (PatternType::LightVertical, "lightVertical"),
    (PatternType::LightDown, "lightDown"),
    (PatternType::LightUp, "lightUp"),
    (PatternType::LightGrid, "lightGrid"),
    (PatternType::LightTrellis, "lightTrellis"),
    (PatternType::Gray125, "gray125"),
    (PatternType::Gray0625, "gray0625"),
];

impl PatternType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        PATTERN_NAMES
            .iter()
            .find(|(p, _)| p == self)
            .map_or("none", |(_, name)| name)
    }

    /// Parse a wire name; unknown names map to `None`
    pub fn parse(s: &str) -> Self {
        PATTERN_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map_or(PatternType::None, |(p, _)| *p)
    }
}
