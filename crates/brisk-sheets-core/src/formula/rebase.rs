//! Reference scanning and rebasing for A1-style formula text.
//!
//! The scanner walks a formula once, copying everything verbatim except cell
//! references, which are handed to a callback. It understands:
//!
//! - cell references with optional `$` markers (`C5`, `$C5`, `C$5`, `$C$5`)
//! - ranges, whose endpoints are rebased independently (`A1:B2`)
//! - whole-column and whole-row ranges (`A:C`, `$1:$3`)
//! - sheet-qualified references, quoted or not (`Data!A1`, `'Q1 data'!A1`)
//!
//! String literals, function names, defined names, structured references in
//! brackets and error literals are never touched.

use crate::{MAX_COLS, MAX_ROWS};

/// A reference component that may need shifting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefPart {
    Cell {
        row: u32,
        col: u16,
        row_abs: bool,
        col_abs: bool,
    },
    Column {
        col: u16,
        abs: bool,
    },
    Row {
        row: u32,
        abs: bool,
    },
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$' || b >= 0x80
}

fn parse_letters(s: &[u8]) -> Option<u16> {
    if s.is_empty() || s.len() > 3 || !s.iter().all(u8::is_ascii_alphabetic) {
        return None;
    }
    let mut col: u32 = 0;
    for &b in s {
        col = col * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1;
    }
    (col <= u32::from(MAX_COLS)).then(|| (col - 1) as u16)
}

fn parse_digits(s: &[u8]) -> Option<u32> {
    if s.is_empty() || s.len() > 7 || !s.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut n: u32 = 0;
    for &b in s {
        n = n * 10 + u32::from(b - b'0');
    }
    (1..=MAX_ROWS).contains(&n).then(|| n - 1)
}

fn strip_dollar(s: &[u8]) -> (bool, &[u8]) {
    match s.split_first() {
        Some((b'$', rest)) => (true, rest),
        _ => (false, s),
    }
}

/// Parse a whole word as a single cell reference
fn parse_cell(word: &[u8]) -> Option<RefPart> {
    let (col_abs, rest) = strip_dollar(word);
    let letters = rest.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    let col = parse_letters(&rest[..letters])?;
    let (row_abs, digits) = strip_dollar(&rest[letters..]);
    let row = parse_digits(digits)?;
    Some(RefPart::Cell {
        row,
        col,
        row_abs,
        col_abs,
    })
}

fn parse_column(word: &[u8]) -> Option<RefPart> {
    let (abs, rest) = strip_dollar(word);
    parse_letters(rest).map(|col| RefPart::Column { col, abs })
}

fn parse_row(word: &[u8]) -> Option<RefPart> {
    let (abs, rest) = strip_dollar(word);
    parse_digits(rest).map(|row| RefPart::Row { row, abs })
}

impl RefPart {
    /// Render in A1 form
    pub fn push_to(&self, out: &mut String) {
        match *self {
            RefPart::Cell {
                row,
                col,
                row_abs,
                col_abs,
            } => {
                if col_abs {
                    out.push('$');
                }
                crate::cell::push_column_letters(out, col);
                if row_abs {
                    out.push('$');
                }
                crate::cell::push_row_number(out, row);
            }
            RefPart::Column { col, abs } => {
                if abs {
                    out.push('$');
                }
                crate::cell::push_column_letters(out, col);
            }
            RefPart::Row { row, abs } => {
                if abs {
                    out.push('$');
                }
                crate::cell::push_row_number(out, row);
            }
        }
    }

    /// Shift the relative components; `None` when the result leaves the grid
    pub fn shifted(&self, drow: i64, dcol: i64) -> Option<RefPart> {
        let shift_row = |row: u32, abs: bool| -> Option<u32> {
            if abs {
                return Some(row);
            }
            let r = i64::from(row) + drow;
            (0..i64::from(MAX_ROWS)).contains(&r).then_some(r as u32)
        };
        let shift_col = |col: u16, abs: bool| -> Option<u16> {
            if abs {
                return Some(col);
            }
            let c = i64::from(col) + dcol;
            (0..i64::from(MAX_COLS)).contains(&c).then_some(c as u16)
        };
        Some(match *self {
            RefPart::Cell {
                row,
                col,
                row_abs,
                col_abs,
            } => RefPart::Cell {
                row: shift_row(row, row_abs)?,
                col: shift_col(col, col_abs)?,
                row_abs,
                col_abs,
            },
            RefPart::Column { col, abs } => RefPart::Column {
                col: shift_col(col, abs)?,
                abs,
            },
            RefPart::Row { row, abs } => RefPart::Row {
                row: shift_row(row, abs)?,
                abs,
            },
        })
    }
}

/// Rewrites one reference or range. Receives the first endpoint and, for
/// ranges, the second; returns the replacement text.
pub trait RefVisitor {
    fn visit(&mut self, first: RefPart, second: Option<RefPart>, out: &mut String);
}

/// Walk `formula`, copying non-reference text and passing every reference to
/// `visitor`.
pub fn transform<V: RefVisitor>(formula: &str, visitor: &mut V) -> String {
    let bytes = formula.as_bytes();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut i = 0;
    let mut copied = 0;

    // Copies formula[copied..upto] then moves the cursor
    macro_rules! flush {
        ($upto:expr) => {
            out.push_str(&formula[copied..$upto]);
        };
    }

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' => {
                i = skip_quoted(bytes, i, b'"');
            }
            b'\'' => {
                // Quoted sheet name; the reference after `!` is handled by
                // the next iteration
                i = skip_quoted(bytes, i, b'\'');
            }
            b'[' => {
                i = skip_brackets(bytes, i);
            }
            b'#' => {
                // Error literal such as #REF! or #N/A
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || b"/!?_".contains(&bytes[i])) {
                    let stop = bytes[i] == b'!' || bytes[i] == b'?';
                    i += 1;
                    if stop {
                        break;
                    }
                }
            }
            _ if b.is_ascii_digit() && !prev_is_word(bytes, i) => {
                let end = scan_while(bytes, i, |c| c.is_ascii_digit());
                // Row range such as 1:3 or 2:$5
                if let Some((second, range_end)) = row_range_tail(bytes, end) {
                    if let Some(first) = parse_row(&bytes[i..end]) {
                        flush!(i);
                        visitor.visit(first, Some(second), &mut out);
                        i = range_end;
                        copied = i;
                        continue;
                    }
                }
                i = scan_number_tail(bytes, end);
            }
            _ if is_word_byte(b) && !prev_is_word(bytes, i) => {
                let end = scan_while(bytes, i, is_word_byte);
                let word = &bytes[i..end];
                let next = bytes.get(end).copied();
                if next == Some(b'(') || next == Some(b'!') {
                    // Function call or sheet qualifier
                    i = end;
                    continue;
                }
                if let Some(first) = parse_cell(word) {
                    flush!(i);
                    let (second, stop) = match range_tail(bytes, end, parse_cell) {
                        Some((second, stop)) => (Some(second), stop),
                        None => (None, end),
                    };
                    visitor.visit(first, second, &mut out);
                    i = stop;
                    copied = i;
                    continue;
                }
                if let Some(first) = parse_column(word) {
                    if let Some((second, stop)) = range_tail(bytes, end, parse_column) {
                        flush!(i);
                        visitor.visit(first, Some(second), &mut out);
                        i = stop;
                        copied = i;
                        continue;
                    }
                }
                if let Some(first) = parse_row(word) {
                    if let Some((second, stop)) = range_tail(bytes, end, parse_row) {
                        flush!(i);
                        visitor.visit(first, Some(second), &mut out);
                        i = stop;
                        copied = i;
                        continue;
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    flush!(bytes.len());
    out
}

fn prev_is_word(bytes: &[u8], i: usize) -> bool {
    i > 0 && is_word_byte(bytes[i - 1])
}

fn scan_while(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}

fn scan_number_tail(bytes: &[u8], mut i: usize) -> usize {
    i = scan_while(bytes, i, |c| c.is_ascii_digit() || c == b'.');
    if i < bytes.len() && (bytes[i] == b'E' || bytes[i] == b'e') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let k = scan_while(bytes, j, |c| c.is_ascii_digit());
        if k > j {
            i = k;
        }
    }
    i
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_brackets(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            b'\'' => {
                // Escaped bracket inside a structured reference
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// `:` followed by a whole word accepted by `parse`
fn range_tail(
    bytes: &[u8],
    colon: usize,
    parse: fn(&[u8]) -> Option<RefPart>,
) -> Option<(RefPart, usize)> {
    if bytes.get(colon) != Some(&b':') {
        return None;
    }
    let start = colon + 1;
    let end = scan_while(bytes, start, is_word_byte);
    if end == start || bytes.get(end) == Some(&b'(') || bytes.get(end) == Some(&b'!') {
        return None;
    }
    parse(&bytes[start..end]).map(|part| (part, end))
}

fn row_range_tail(bytes: &[u8], colon: usize) -> Option<(RefPart, usize)> {
    range_tail(bytes, colon, parse_row)
}

struct Shift {
    drow: i64,
    dcol: i64,
}

impl RefVisitor for Shift {
    fn visit(&mut self, first: RefPart, second: Option<RefPart>, out: &mut String) {
        let a = first.shifted(self.drow, self.dcol);
        let b = second.map(|s| s.shifted(self.drow, self.dcol));
        match (a, b) {
            (Some(a), None) => a.push_to(out),
            (Some(a), Some(Some(b))) => {
                a.push_to(out);
                out.push(':');
                b.push_to(out);
            }
            _ => out.push_str("#REF!"),
        }
    }
}

/// Shift every relative reference in `formula` by (`drow`, `dcol`).
///
/// References pushed off the grid become `#REF!`.
pub fn rebase(formula: &str, drow: i64, dcol: i64) -> String {
    if drow == 0 && dcol == 0 {
        return formula.to_string();
    }
    transform(formula, &mut Shift { drow, dcol })
}

struct RelativeKey {
    row: u32,
    col: u16,
}

impl RelativeKey {
    fn push(&self, part: RefPart, out: &mut String) {
        use std::fmt::Write;
        let _ = match part {
            RefPart::Cell {
                row,
                col,
                row_abs,
                col_abs,
            } => {
                let r = if row_abs {
                    format!("R{}", row)
                } else {
                    format!("R[{}]", i64::from(row) - i64::from(self.row))
                };
                let c = if col_abs {
                    format!("C{}", col)
                } else {
                    format!("C[{}]", i64::from(col) - i64::from(self.col))
                };
                write!(out, "{{{}{}}}", r, c)
            }
            RefPart::Column { col, abs } if abs => write!(out, "{{C{}}}", col),
            RefPart::Column { col, .. } => {
                write!(out, "{{C[{}]}}", i64::from(col) - i64::from(self.col))
            }
            RefPart::Row { row, abs } if abs => write!(out, "{{R{}}}", row),
            RefPart::Row { row, .. } => {
                write!(out, "{{R[{}]}}", i64::from(row) - i64::from(self.row))
            }
        };
    }
}

impl RefVisitor for RelativeKey {
    fn visit(&mut self, first: RefPart, second: Option<RefPart>, out: &mut String) {
        self.push(first, out);
        if let Some(second) = second {
            out.push(':');
            self.push(second, out);
        }
    }
}

/// Position-independent form of a formula written at (`row`, `col`).
///
/// Two formulas share a key exactly when one is the other rebased.
pub fn relative_key(formula: &str, row: u32, col: u16) -> String {
    transform(formula, &mut RelativeKey { row, col })
}
