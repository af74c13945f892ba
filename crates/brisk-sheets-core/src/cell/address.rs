//! A1 addressing: the single authority for letter/number column conversion.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// Convert a 0-based column index to letters (0 = A, 25 = Z, 26 = AA).
pub fn column_letters(col: u16) -> String {
    let mut out = String::with_capacity(3);
    push_column_letters(&mut out, col);
    out
}

/// Append the letters of a 0-based column index to `out`.
pub fn push_column_letters(out: &mut String, col: u16) {
    let mut buf = [0u8; 4];
    let mut len = 0;
    let mut n = u32::from(col) + 1;
    while n > 0 {
        n -= 1;
        buf[len] = b'A' + (n % 26) as u8;
        len += 1;
        n /= 26;
    }
    for &b in buf[..len].iter().rev() {
        out.push(b as char);
    }
}

/// Convert column letters (case-insensitive) to a 0-based index.
pub fn parse_column_letters(letters: &str) -> Result<u16> {
    if letters.is_empty() || letters.len() > 3 {
        return Err(Error::InvalidAddress(format!(
            "bad column letters '{}'",
            letters
        )));
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(Error::InvalidAddress(format!(
                "invalid column letter '{}'",
                b as char
            )));
        }
        col = col * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1;
    }
    let col = col - 1;
    if col >= u32::from(MAX_COLS) {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok(col as u16)
}

/// Append the 1-based row number for a 0-based row index.
pub fn push_row_number(out: &mut String, row: u32) {
    use std::fmt::Write;
    let _ = write!(out, "{}", u64::from(row) + 1);
}

/// Check a 0-based (row, col) pair against the grid limits.
pub fn check_position(row: u32, col: u32) -> Result<(u32, u16)> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= u32::from(MAX_COLS) {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok((row, col as u16))
}

/// Split an optional sheet qualifier off an address.
///
/// `Sheet1!A1` yields `(Some("Sheet1"), "A1")`; quoted names such as
/// `'My ''Q1'' data'!B2` are unquoted.
pub fn split_sheet_qualifier(s: &str) -> Result<(Option<Cow<'_, str>>, &str)> {
    let Some(bang) = s.rfind('!') else {
        return Ok((None, s));
    };
    let (sheet, rest) = (&s[..bang], &s[bang + 1..]);
    if sheet.is_empty() {
        return Err(Error::InvalidAddress(format!("empty sheet qualifier in '{}'", s)));
    }
    if let Some(inner) = sheet.strip_prefix('\'') {
        let inner = inner.strip_suffix('\'').ok_or_else(|| {
            Error::InvalidAddress(format!("unterminated sheet quote in '{}'", s))
        })?;
        if inner.contains("''") {
            return Ok((Some(Cow::Owned(inner.replace("''", "'"))), rest));
        }
        return Ok((Some(Cow::Borrowed(inner)), rest));
    }
    Ok((Some(Cow::Borrowed(sheet)), rest))
}

/// Quote a sheet name for use in a formula or defined name when needed.
pub fn quote_sheet_name(name: &str) -> Cow<'_, str> {
    let plain = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
        && !name.as_bytes()[0].is_ascii_digit()
        && !looks_like_cell_ref(name);
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("'{}'", name.replace('\'', "''")))
    }
}

fn looks_like_cell_ref(name: &str) -> bool {
    let letters = name.bytes().take_while(u8::is_ascii_alphabetic).count();
    (1..=3).contains(&letters)
        && name.len() > letters
        && name.as_bytes()[letters..].iter().all(u8::is_ascii_digit)
}

/// A cell address (e.g. "A1", "$B$2")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based, A=0 .. XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a relative cell address
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a fully absolute address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// ```
    /// use brisk_sheets_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!((addr.row, addr.col), (1, 1));
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.first() == Some(&b'$');
        if col_absolute {
            pos += 1;
        }
        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        let col = parse_column_letters(&s[col_start..pos])?;

        let row_absolute = bytes.get(pos) == Some(&b'$');
        if row_absolute {
            pos += 1;
        }
        let digits = &s[pos..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!("invalid row number in '{}'", s)));
        }
        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;
        if row == 0 {
            return Err(Error::InvalidAddress(format!("row number must be >= 1 in '{}'", s)));
        }
        let (row, col) = check_position(row - 1, u32::from(col))?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Format as an A1-style string, keeping `$` markers
    pub fn to_a1_string(&self) -> String {
        let mut out = String::with_capacity(10);
        self.push_a1(&mut out);
        out
    }

    /// Append the A1 form to `out` without allocating
    pub fn push_a1(&self, out: &mut String) {
        if self.col_absolute {
            out.push('$');
        }
        push_column_letters(out, self.col);
        if self.row_absolute {
            out.push('$');
        }
        push_row_number(out, self.row);
    }

    /// Create a range from this address to another
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g. "A1:B10"), always normalized so that
/// `start` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRange {
    /// Top-left corner
    pub start: CellAddress,
    /// Bottom-right corner
    pub end: CellAddress,
}

impl PartialOrd for CellAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.row, self.col, self.row_absolute, self.col_absolute).cmp(&(
            other.row,
            other.col,
            other.row_absolute,
            other.col_absolute,
        ))
    }
}

impl CellRange {
    /// Create a range from two corners in any order
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        let (top, bottom) = if a.row <= b.row { (a, b) } else { (b, a) };
        let (left, right) = if a.col <= b.col { (a, b) } else { (b, a) };
        Self {
            start: CellAddress {
                row: top.row,
                col: left.col,
                row_absolute: top.row_absolute,
                col_absolute: left.col_absolute,
            },
            end: CellAddress {
                row: bottom.row,
                col: right.col,
                row_absolute: bottom.row_absolute,
                col_absolute: right.col_absolute,
            },
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Single-cell range
    pub fn single(row: u32, col: u16) -> Self {
        Self::from_indices(row, col, row, col)
    }

    /// Parse `A1:B10` or a single `A1`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((a, b)) => {
                let start = CellAddress::parse(a)
                    .map_err(|_| Error::InvalidRange(s.to_string()))?;
                let end = CellAddress::parse(b)
                    .map_err(|_| Error::InvalidRange(s.to_string()))?;
                Ok(Self::new(start, end))
            }
            None => {
                let a = CellAddress::parse(s).map_err(|_| Error::InvalidRange(s.to_string()))?;
                Ok(Self::new(a, a))
            }
        }
    }

    /// The same corners with every `$` flag cleared
    pub fn relative(&self) -> CellRange {
        CellRange::from_indices(self.start.row, self.start.col, self.end.row, self.end.col)
    }

    /// Whether (row, col) lies inside the range
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Number of rows covered
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of columns covered
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Total number of cells covered
    pub fn cell_count(&self) -> u64 {
        u64::from(self.row_count()) * u64::from(self.col_count())
    }

    /// Whether the range covers exactly one cell
    pub fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Smallest range covering both
    pub fn union(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// Iterate over every (row, col) in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (u32, u16)> {
        let (c0, c1) = (self.start.col, self.end.col);
        (self.start.row..=self.end.row).flat_map(move |r| (c0..=c1).map(move |c| (r, c)))
    }

    /// Relative `A1:B2` form (single cells render as `A1`)
    pub fn to_a1_string(&self) -> String {
        let mut out = String::with_capacity(16);
        push_column_letters(&mut out, self.start.col);
        push_row_number(&mut out, self.start.row);
        if !self.is_single_cell() {
            out.push(':');
            push_column_letters(&mut out, self.end.col);
            push_row_number(&mut out, self.end.row);
        }
        out
    }

    /// Absolute `$A$1:$B$2` form, used in defined names
    pub fn to_absolute_string(&self) -> String {
        let start = CellAddress::absolute(self.start.row, self.start.col);
        let end = CellAddress::absolute(self.end.row, self.end.col);
        if self.is_single_cell() {
            start.to_a1_string()
        } else {
            format!("{}:{}", start, end)
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn check_qualifier(input: &str, qualifier: Option<Cow<'_, str>>, sheet: &str) -> Result<()> {
    match qualifier {
        Some(q) if !q.eq_ignore_ascii_case(sheet) => Err(Error::ForeignSheet {
            address: input.to_string(),
            qualifier: q.into_owned(),
            sheet: sheet.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Anything that names a single cell: a `(row, col)` pair (0-based), an A1
/// string (optionally sheet-qualified) or a [`CellAddress`].
pub trait CellPos {
    /// Resolve to a bounds-checked (row, col) pair in the context of `sheet`
    fn resolve(&self, sheet: &str) -> Result<(u32, u16)>;
}

impl CellPos for (u32, u16) {
    fn resolve(&self, _sheet: &str) -> Result<(u32, u16)> {
        check_position(self.0, u32::from(self.1))
    }
}

impl CellPos for CellAddress {
    fn resolve(&self, _sheet: &str) -> Result<(u32, u16)> {
        check_position(self.row, u32::from(self.col))
    }
}

impl CellPos for &str {
    fn resolve(&self, sheet: &str) -> Result<(u32, u16)> {
        let (qualifier, rest) = split_sheet_qualifier(self)?;
        check_qualifier(self, qualifier, sheet)?;
        let addr = CellAddress::parse(rest)?;
        Ok((addr.row, addr.col))
    }
}

impl CellPos for String {
    fn resolve(&self, sheet: &str) -> Result<(u32, u16)> {
        self.as_str().resolve(sheet)
    }
}

/// Anything that names a rectangle: an A1 range string (optionally
/// sheet-qualified), a [`CellRange`], or a pair of corner positions.
pub trait RangeArg {
    /// Resolve to a bounds-checked range in the context of `sheet`
    fn resolve_range(&self, sheet: &str) -> Result<CellRange>;
}

impl RangeArg for CellRange {
    fn resolve_range(&self, _sheet: &str) -> Result<CellRange> {
        check_position(self.end.row, u32::from(self.end.col))?;
        Ok(self.relative())
    }
}

impl RangeArg for ((u32, u16), (u32, u16)) {
    fn resolve_range(&self, _sheet: &str) -> Result<CellRange> {
        let (r0, c0) = check_position(self.0 .0, u32::from(self.0 .1))?;
        let (r1, c1) = check_position(self.1 .0, u32::from(self.1 .1))?;
        Ok(CellRange::from_indices(r0, c0, r1, c1))
    }
}

impl RangeArg for &str {
    fn resolve_range(&self, sheet: &str) -> Result<CellRange> {
        let (qualifier, rest) = split_sheet_qualifier(self)?;
        check_qualifier(self, qualifier, sheet)?;
        Ok(CellRange::parse(rest)?.relative())
    }
}

impl RangeArg for String {
    fn resolve_range(&self, sheet: &str) -> Result<CellRange> {
        self.as_str().resolve_range(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
        assert_eq!(column_letters(16383), "XFD");
        assert_eq!(parse_column_letters("xfd").unwrap(), 16383);
        assert!(parse_column_letters("XFE").is_err());
        assert!(parse_column_letters("AAAA").is_err());
    }

    #[test]
    fn test_parse_address() {
        let a = CellAddress::parse("C5").unwrap();
        assert_eq!((a.row, a.col), (4, 2));
        assert!(!a.row_absolute && !a.col_absolute);

        let a = CellAddress::parse("$C5").unwrap();
        assert!(a.col_absolute && !a.row_absolute);

        let a = CellAddress::parse("C$5").unwrap();
        assert!(!a.col_absolute && a.row_absolute);
        assert_eq!(a.to_a1_string(), "C$5");

        assert!(CellAddress::parse("A0").is_err());
        assert!(CellAddress::parse("5A").is_err());
        assert!(CellAddress::parse("A1048577").is_err());
        assert!(CellAddress::parse("A1x").is_err());
    }

    #[test]
    fn test_range_normalizes() {
        let r = CellRange::parse("C10:A1").unwrap();
        assert_eq!(r.to_a1_string(), "A1:C10");
        assert_eq!(r.row_count(), 10);
        assert_eq!(r.col_count(), 3);
        assert!(r.contains(4, 1));
        assert!(!r.contains(10, 0));
        assert_eq!(CellRange::single(0, 0).to_a1_string(), "A1");
        assert_eq!(r.to_absolute_string(), "$A$1:$C$10");
    }

    #[test]
    fn test_relative_clears_flags() {
        let r = CellRange::parse("$B$2:C$4").unwrap();
        assert_ne!(r, CellRange::parse("B2:C4").unwrap());
        assert_eq!(r.relative(), CellRange::parse("B2:C4").unwrap());
        assert_eq!("'My Sheet'!$B$2:$C$4".resolve_range("My Sheet").unwrap(), r.relative());
    }

    #[test]
    fn test_overlap() {
        let a = CellRange::parse("A1:B2").unwrap();
        assert!(a.overlaps(&CellRange::parse("B2:C3").unwrap()));
        assert!(!a.overlaps(&CellRange::parse("C1:D2").unwrap()));
    }

    #[test]
    fn test_sheet_qualifier() {
        let (q, rest) = split_sheet_qualifier("Sheet1!C4").unwrap();
        assert_eq!(q.as_deref(), Some("Sheet1"));
        assert_eq!(rest, "C4");

        let (q, rest) = split_sheet_qualifier("'It''s mine'!A1:B2").unwrap();
        assert_eq!(q.as_deref(), Some("It's mine"));
        assert_eq!(rest, "A1:B2");

        assert_eq!("Data!C4".resolve("Data").unwrap(), (3, 2));
        assert!(matches!(
            "Other!C4".resolve("Data"),
            Err(Error::ForeignSheet { .. })
        ));
    }

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("It's"), "'It''s'");
        assert_eq!(quote_sheet_name("AB12"), "'AB12'");
        assert_eq!(quote_sheet_name("2024"), "'2024'");
    }

    #[test]
    fn test_pos_bounds() {
        assert!((1_048_575u32, 16_383u16).resolve("S").is_ok());
        assert!((1_048_576u32, 0u16).resolve("S").is_err());
        assert!((0u32, 16_384u16).resolve("S").is_err());
    }

    proptest! {
        #[test]
        fn prop_address_round_trip(row in 0u32..1_048_576, col in 0u16..16_384) {
            let text = CellAddress::new(row, col).to_a1_string();
            let parsed = CellAddress::parse(&text).unwrap();
            prop_assert_eq!((parsed.row, parsed.col), (row, col));
        }
    }
}
