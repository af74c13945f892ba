//! Color representation

use std::fmt;
use std::hash::{Hash, Hasher};

/// Theme color tint in [-1.0, 1.0].
///
/// Compared and hashed by bit pattern so that [`Color`] can be a map key;
/// `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tint(f64);

impl Tint {
    /// Clamp and wrap a tint value
    pub fn new(value: f64) -> Self {
        let v = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
        Tint(if v == 0.0 { 0.0 } else { v })
    }

    /// The tint as a float
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the tint leaves the color unchanged
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl PartialEq for Tint {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Tint {}

impl Hash for Tint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A color as used by fonts, fills and borders.
///
/// Two colors are equal iff their discriminant and payload agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Automatic (application default) color
    #[default]
    Auto,
    /// ARGB packed as 0xAARRGGBB; opaque colors carry alpha 0xFF
    Rgb(u32),
    /// Legacy palette index
    Indexed(u8),
    /// Theme slot with tint
    Theme { index: u8, tint: Tint },
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 128, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const GRAY: Color = Color::rgb(128, 128, 128);

    /// Opaque RGB color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// Theme color with tint
    pub fn theme(index: u8, tint: f64) -> Self {
        Color::Theme {
            index,
            tint: Tint::new(tint),
        }
    }

    /// Parse `RRGGBB` or `AARRGGBB`, with or without a leading `#`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(Color::Rgb(0xFF00_0000 | v)),
            8 => Some(Color::Rgb(v)),
            _ => None,
        }
    }

    /// `AARRGGBB` for RGB colors, as written in the styles part
    pub fn argb_hex(&self) -> Option<String> {
        match self {
            Color::Rgb(v) => Some(format!("{:08X}", v)),
            _ => None,
        }
    }

    /// Red, green and blue channels of an RGB color
    pub fn rgb_channels(&self) -> Option<(u8, u8, u8)> {
        match *self {
            Color::Rgb(v) => Some(((v >> 16) as u8, (v >> 8) as u8, v as u8)),
            _ => None,
        }
    }

    /// Check if the color is automatic
    pub fn is_auto(&self) -> bool {
        matches!(self, Color::Auto)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Auto => f.write_str("auto"),
            Color::Rgb(v) => write!(f, "#{:08X}", v),
            Color::Indexed(i) => write!(f, "indexed({})", i),
            Color::Theme { index, tint } => write!(f, "theme({}, {})", index, tint.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex("#FF0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("80FFFFFF"), Some(Color::Rgb(0x80FF_FFFF)));
        assert_eq!(Color::from_hex("XYZ123"), None);
        assert_eq!(Color::from_hex("FFF"), None);
        assert_eq!(Color::RED.argb_hex().as_deref(), Some("FFFF0000"));
        assert_eq!(Color::RED.rgb_channels(), Some((255, 0, 0)));
    }

    #[test]
    fn test_equality_requires_same_discriminant() {
        assert_ne!(Color::Indexed(1), Color::theme(1, 0.0));
        assert_eq!(Color::theme(4, -0.25), Color::theme(4, -0.25));
        assert_ne!(Color::theme(4, -0.25), Color::theme(4, 0.25));
        assert_eq!(Color::theme(1, -0.0), Color::theme(1, 0.0));

        let set: HashSet<Color> = [Color::RED, Color::RED, Color::BLUE].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
