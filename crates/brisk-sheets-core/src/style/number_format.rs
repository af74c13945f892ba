//! Number format types

/// First id available to custom formats in the styles part
pub const FIRST_CUSTOM_FORMAT_ID: u16 = 164;

/// A number format: a built-in index or a custom format string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumberFormat {
    /// Built-in format; 0 is General
    BuiltIn(u16),
    /// Custom format code
    Custom(String),
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::BuiltIn(0)
    }
}

impl NumberFormat {
    /// 0 - General
    pub const GENERAL: u16 = 0;
    /// 2 - 0.00
    pub const DECIMAL2: u16 = 2;
    /// 4 - #,##0.00
    pub const THOUSANDS_DECIMAL2: u16 = 4;
    /// 10 - 0.00%
    pub const PERCENT_DECIMAL2: u16 = 10;
    /// 14 - short date
    pub const DATE: u16 = 14;
    /// 22 - date and time
    pub const DATETIME: u16 = 22;
    /// 49 - text
    pub const TEXT: u16 = 49;

    /// Custom format from a code; codes matching a built-in collapse to it
    pub fn custom<S: Into<String>>(code: S) -> Self {
        let code = code.into();
        match (0..=49u16).find(|&id| builtin_code(id) == Some(code.as_str())) {
            Some(id) => NumberFormat::BuiltIn(id),
            None => NumberFormat::Custom(code),
        }
    }

    /// Whether this is General
    pub fn is_general(&self) -> bool {
        matches!(self, NumberFormat::BuiltIn(0))
    }

    /// Format code, when known
    pub fn code(&self) -> Option<&str> {
        match self {
            NumberFormat::BuiltIn(id) => builtin_code(*id),
            NumberFormat::Custom(code) => Some(code),
        }
    }

    /// Whether the format renders numbers as dates or times
    pub fn is_date(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => is_builtin_date(*id),
            NumberFormat::Custom(code) => is_date_code(code),
        }
    }
}

/// Built-in ids that render dates or times, including the locale-specific
/// ranges Excel reserves for East Asian date formats
pub fn is_builtin_date(id: u16) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58 | 71..=81)
}

/// Format codes of the standard built-ins
pub fn builtin_code(id: u16) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// Scan a format code for date/time tokens outside quoted literals, escapes
/// and bracketed sections (colors, conditions, locales).
pub fn is_date_code(code: &str) -> bool {
    let mut chars = code.chars().peekable();
    let mut saw_date = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut inner = String::new();
                for q in chars.by_ref() {
                    if q == ']' {
                        break;
                    }
                    inner.push(q);
                }
                // Elapsed-time sections like [h] or [mm] are time formats
                let lower = inner.to_ascii_lowercase();
                if !lower.is_empty() && lower.chars().all(|ch| matches!(ch, 'h' | 'm' | 's')) {
                    saw_date = true;
                }
            }
            ';' => break,
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' | 'm' | 'M' => saw_date = true,
            '0' | '#' | '?' | '%' | '@' => return false,
            _ => {}
        }
    }
    saw_date
}
