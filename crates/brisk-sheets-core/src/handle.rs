//! Borrowing handles that tie a worksheet to its workbook's pools.
//!
//! A [`SheetMut`] holds the sheet together with the shared string table,
//! the format repository and the dirty tracker, so typed setters can intern
//! strings and formats and record which parts they touched. [`SheetRef`] is
//! the read-only counterpart that resolves cells into [`CellView`]s.

use std::borrow::Cow;

use crate::cell::{
    check_position, CachedValue, CellPos, CellRange, CellValue, CellView, Formula, FormulaKind,
    RangeArg, Value,
};
use crate::date::datetime_to_serial;
use crate::dirty::{DirtyManager, Part};
use crate::error::{Error, Result};
use crate::formula::SharedFormulaStats;
use crate::image::{AnchorKind, Image};
use crate::strings::SharedStringTable;
use crate::style::{Color, FormatDescriptor, FormatRepository, NumberFormat, StyleId};
use crate::worksheet::{PageSetup, Selection, Worksheet};

/// Resolve the cell at (row, col) against the pools
pub(crate) fn view_cell<'a>(
    sheet: &'a Worksheet,
    strings: &'a SharedStringTable,
    styles: &FormatRepository,
    row: u32,
    col: u16,
) -> CellView<'a> {
    let Some(data) = sheet.cell_at(row, col) else {
        return CellView::Blank;
    };
    match &data.value {
        CellValue::Blank => CellView::Blank,
        CellValue::Number(n) => {
            if styles.is_date_style(sheet.effective_style(row, col)) {
                CellView::Date(*n)
            } else {
                CellView::Number(*n)
            }
        }
        CellValue::Bool(b) => CellView::Bool(*b),
        CellValue::SharedString(id) => CellView::Text(strings.get(*id).unwrap_or_default()),
        CellValue::InlineString(s) => CellView::Text(s),
        CellValue::Error(e) => CellView::Error(*e),
        CellValue::Formula(f) => {
            let text = match &f.kind {
                FormulaKind::Single(t) | FormulaKind::Array { text: t, .. } => Cow::Borrowed(t.as_str()),
                FormulaKind::Shared { si } => match sheet.shared_formulas().expand(*si, row, col) {
                    Ok(t) => Cow::Owned(t),
                    Err(e) => {
                        log::warn!("{}!{}: {}", sheet.name(), CellRange::single(row, col), e);
                        Cow::Borrowed("")
                    }
                },
            };
            CellView::Formula {
                text,
                cached: f.cached.as_ref(),
            }
        }
    }
}

/// Read access to one sheet of a workbook
#[derive(Debug, Clone, Copy)]
pub struct SheetRef<'a> {
    index: usize,
    sheet: &'a Worksheet,
    strings: &'a SharedStringTable,
    styles: &'a FormatRepository,
    date1904: bool,
}

impl<'a> SheetRef<'a> {
    pub(crate) fn new(
        index: usize,
        sheet: &'a Worksheet,
        strings: &'a SharedStringTable,
        styles: &'a FormatRepository,
        date1904: bool,
    ) -> Self {
        Self {
            index,
            sheet,
            strings,
            styles,
            date1904,
        }
    }

    /// Position of the sheet in the workbook
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'a str {
        self.sheet.name()
    }

    /// The underlying model, for properties without a handle method
    pub fn worksheet(&self) -> &'a Worksheet {
        self.sheet
    }

    pub fn date1904(&self) -> bool {
        self.date1904
    }

    /// What the cell holds; blank when nothing is stored there
    pub fn cell<P: CellPos>(&self, pos: P) -> Result<CellView<'a>> {
        let (row, col) = pos.resolve(self.sheet.name())?;
        Ok(view_cell(self.sheet, self.strings, self.styles, row, col))
    }

    /// Whether a cell record (value or style) exists at `pos`
    pub fn has_cell_at<P: CellPos>(&self, pos: P) -> Result<bool> {
        let (row, col) = pos.resolve(self.sheet.name())?;
        Ok(self.sheet.cells().contains(row, col))
    }

    /// Style that applies to a cell: its own, else its column's, else the
    /// default
    pub fn effective_style<P: CellPos>(&self, pos: P) -> Result<StyleId> {
        let (row, col) = pos.resolve(self.sheet.name())?;
        Ok(self.sheet.effective_style(row, col))
    }

    /// The format descriptor that applies to a cell
    pub fn cell_format<P: CellPos>(&self, pos: P) -> Result<&'a FormatDescriptor> {
        let id = self.effective_style(pos)?;
        self.styles.get(id)
    }

    /// Formula text of a cell, shared members expanded
    pub fn formula<P: CellPos>(&self, pos: P) -> Result<Option<Cow<'a, str>>> {
        let (row, col) = pos.resolve(self.sheet.name())?;
        Ok(self.sheet.formula_at(row, col))
    }

    pub fn used_range(&self) -> Option<CellRange> {
        self.sheet.used_range()
    }

    /// Stored cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, CellView<'a>)> + 'a {
        let (sheet, strings, styles) = (self.sheet, self.strings, self.styles);
        sheet
            .iter_cells()
            .map(move |(row, col, _)| (row, col, view_cell(sheet, strings, styles, row, col)))
    }
}

/// Write access to one sheet of a workbook
#[derive(Debug)]
pub struct SheetMut<'a> {
    index: usize,
    sheet: &'a mut Worksheet,
    strings: &'a mut SharedStringTable,
    styles: &'a mut FormatRepository,
    dirty: &'a mut DirtyManager,
    date1904: bool,
}

impl<'a> SheetMut<'a> {
    pub(crate) fn new(
        index: usize,
        sheet: &'a mut Worksheet,
        strings: &'a mut SharedStringTable,
        styles: &'a mut FormatRepository,
        dirty: &'a mut DirtyManager,
        date1904: bool,
    ) -> Self {
        Self {
            index,
            sheet,
            strings,
            styles,
            dirty,
            date1904,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.sheet.name()
    }

    /// Read view of the same sheet
    pub fn view(&self) -> SheetRef<'_> {
        SheetRef::new(self.index, &*self.sheet, &*self.strings, &*self.styles, self.date1904)
    }

    /// The underlying model
    pub fn worksheet(&self) -> &Worksheet {
        &*self.sheet
    }

    /// The underlying model, for edits without a handle method. The sheet is
    /// marked dirty.
    pub fn worksheet_mut(&mut self) -> &mut Worksheet {
        self.touch();
        &mut *self.sheet
    }

    fn resolve<P: CellPos>(&self, pos: P) -> Result<(u32, u16)> {
        pos.resolve(self.sheet.name())
    }

    fn resolve_range<R: RangeArg>(&self, range: R) -> Result<CellRange> {
        range.resolve_range(self.sheet.name())
    }

    fn touch(&mut self) {
        self.dirty.mark(Part::Sheet(self.index));
    }

    fn touch_drawing(&mut self) {
        self.dirty.mark_all_of([
            Part::Sheet(self.index),
            Part::SheetRels(self.index),
            Part::Drawing(self.index),
            Part::ContentTypes,
            Part::Media,
        ]);
    }

    /// Store a value, recording string-table changes. Overwriting a string
    /// changes the reference count written to the table.
    fn store(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        let was_string = matches!(
            self.sheet.cell_at(row, col).map(|c| &c.value),
            Some(CellValue::SharedString(_))
        );
        let is_string = matches!(value, CellValue::SharedString(_));
        self.sheet.set_value_at(row, col, value)?;
        if was_string || is_string {
            self.dirty.mark(Part::SharedStrings);
        }
        self.touch();
        Ok(())
    }

    fn intern_style(&mut self, descriptor: FormatDescriptor) -> StyleId {
        let (id, new) = self.styles.intern_reporting(descriptor);
        if new {
            self.dirty.mark(Part::Styles);
        }
        id
    }

    // === Values ===

    /// Write a value. Strings go to the shared string table; dates become
    /// serial numbers and get a date format unless the cell already shows
    /// dates; a blank clears the value and keeps the style.
    pub fn set_value<P: CellPos, V: Into<Value>>(&mut self, pos: P, value: V) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        match value.into() {
            Value::Blank => self.set_blank(row, col),
            Value::Number(n) => self.store(row, col, CellValue::Number(n)),
            Value::Bool(b) => self.store(row, col, CellValue::Bool(b)),
            Value::Text(s) => {
                let id = self.strings.intern(&s);
                self.store(row, col, CellValue::SharedString(id))
            }
            Value::Error(e) => self.store(row, col, CellValue::Error(e)),
            Value::Date(dt) => {
                let serial = datetime_to_serial(dt, self.date1904);
                if serial < 0.0 {
                    return Err(Error::invalid_value(
                        "date",
                        format!("{} is before the workbook epoch", dt),
                    ));
                }
                let has_time = serial.fract() != 0.0;
                self.store(row, col, CellValue::Number(serial))?;
                self.ensure_date_format(row, col, has_time)
            }
        }
    }

    /// Write a date or date-time; same as [`set_value`](Self::set_value)
    /// with a date value
    pub fn set_date<P: CellPos, D: Into<Value>>(&mut self, pos: P, date: D) -> Result<()> {
        match date.into() {
            v @ Value::Date(_) => self.set_value(pos, v),
            other => Err(Error::invalid_value(
                "date",
                format!("expected a date, got {:?}", other),
            )),
        }
    }

    fn set_blank(&mut self, row: u32, col: u16) -> Result<()> {
        match self.sheet.cell_at(row, col).map(|c| c.style) {
            Some(Some(_)) => self.store(row, col, CellValue::Blank),
            Some(None) => {
                self.clear_at(row, col);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn ensure_date_format(&mut self, row: u32, col: u16, has_time: bool) -> Result<()> {
        let current = self.sheet.effective_style(row, col);
        if self.styles.is_date_style(current) {
            return Ok(());
        }
        let id = if has_time {
            NumberFormat::DATETIME
        } else {
            NumberFormat::DATE
        };
        let descriptor = self
            .styles
            .get(current)?
            .to_builder()
            .number_format(NumberFormat::BuiltIn(id))
            .build()?;
        let style = self.intern_style(descriptor);
        self.sheet.set_style_at(row, col, Some(style))
    }

    /// Store a string inline in the cell instead of the shared table
    pub fn set_inline_text<P: CellPos, S: Into<String>>(&mut self, pos: P, text: S) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        self.store(row, col, CellValue::InlineString(Box::new(text.into())))
    }

    /// Write a formula; a leading `=` is optional. No result is cached.
    pub fn set_formula<P: CellPos>(&mut self, pos: P, text: &str) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        let formula = checked_formula(text)?;
        self.store(row, col, CellValue::Formula(Box::new(formula)))
    }

    /// Write a formula together with the result consumers show until they
    /// recalculate
    pub fn set_formula_with_result<P: CellPos>(&mut self, pos: P, text: &str, cached: CachedValue) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        if let CachedValue::Number(n) = cached {
            if !n.is_finite() {
                return Err(Error::invalid_value("cached result", format!("{} is not finite", n)));
            }
        }
        let formula = checked_formula(text)?.with_cached(cached);
        self.store(row, col, CellValue::Formula(Box::new(formula)))
    }

    /// Enter a legacy array formula over `range`; the text lives in the
    /// top-left cell
    pub fn set_array_formula<R: RangeArg>(&mut self, range: R, text: &str) -> Result<()> {
        let range = self.resolve_range(range)?;
        let text = checked_formula(text)?
            .text()
            .map(str::to_string)
            .unwrap_or_default();
        let formula = Formula {
            kind: FormulaKind::Array { text, range },
            cached: None,
        };
        self.store(range.start.row, range.start.col, CellValue::Formula(Box::new(formula)))
    }

    /// Write a rectangle of values starting at `top_left`, row by row
    pub fn set_range<P, I, R, V>(&mut self, top_left: P, rows: I) -> Result<()>
    where
        P: CellPos,
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let (row0, col0) = self.resolve(top_left)?;
        for (i, values) in rows.into_iter().enumerate() {
            for (j, value) in values.into_iter().enumerate() {
                let pos = check_position(
                    row0.saturating_add(i as u32),
                    u32::from(col0).saturating_add(j as u32),
                )?;
                self.set_value(pos, value)?;
            }
        }
        Ok(())
    }

    fn clear_at(&mut self, row: u32, col: u16) -> bool {
        match self.sheet.clear_cell_at(row, col) {
            Some(old) => {
                if matches!(old.value, CellValue::SharedString(_)) {
                    self.dirty.mark(Part::SharedStrings);
                }
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Remove a cell's value and style; returns whether anything was stored
    pub fn clear_cell<P: CellPos>(&mut self, pos: P) -> Result<bool> {
        let (row, col) = self.resolve(pos)?;
        Ok(self.clear_at(row, col))
    }

    // === Formats ===

    /// Apply a style id issued by this workbook's repository
    pub fn set_cell_format<P: CellPos>(&mut self, pos: P, style: StyleId) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        self.styles.get(style)?;
        self.sheet.set_style_at(row, col, Some(style))?;
        self.touch();
        Ok(())
    }

    /// Intern a descriptor and apply it; returns its id
    pub fn set_style<P: CellPos>(&mut self, pos: P, descriptor: &FormatDescriptor) -> Result<StyleId> {
        let (row, col) = self.resolve(pos)?;
        let id = self.intern_style(descriptor.clone());
        self.sheet.set_style_at(row, col, Some(id))?;
        self.touch();
        Ok(id)
    }

    /// Drop a cell's explicit style
    pub fn clear_format<P: CellPos>(&mut self, pos: P) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        if self.sheet.cell_at(row, col).is_some() {
            self.sheet.set_style_at(row, col, None)?;
            self.touch();
        }
        Ok(())
    }

    // === Reads ===

    pub fn cell<P: CellPos>(&self, pos: P) -> Result<CellView<'_>> {
        let (row, col) = self.resolve(pos)?;
        Ok(view_cell(&*self.sheet, &*self.strings, &*self.styles, row, col))
    }

    pub fn has_cell_at<P: CellPos>(&self, pos: P) -> Result<bool> {
        let (row, col) = self.resolve(pos)?;
        Ok(self.sheet.cells().contains(row, col))
    }

    // === Layout ===

    /// Merge a rectangle; overlapping an existing merge is an error
    pub fn merge<R: RangeArg>(&mut self, range: R) -> Result<()> {
        let range = self.resolve_range(range)?;
        self.sheet.merge_cells(range)?;
        self.touch();
        Ok(())
    }

    /// Remove a merge; returns whether it existed
    pub fn unmerge<R: RangeArg>(&mut self, range: R) -> Result<bool> {
        let range = self.resolve_range(range)?;
        let removed = self.sheet.unmerge_cells(&range);
        if removed {
            self.touch();
        }
        Ok(removed)
    }

    pub fn set_row_height(&mut self, row: u32, points: f64) -> Result<()> {
        self.sheet.set_row_height(row, points)?;
        self.touch();
        Ok(())
    }

    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        self.sheet.set_row_hidden(row, hidden)?;
        self.touch();
        Ok(())
    }

    /// Set the style applied to a whole row
    pub fn set_row_style(&mut self, row: u32, style: Option<StyleId>) -> Result<()> {
        if let Some(id) = style {
            self.styles.get(id)?;
        }
        self.sheet.update_row(row, |p| p.style = style)?;
        self.touch();
        Ok(())
    }

    pub fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        self.sheet.set_column_width(col, width)?;
        self.touch();
        Ok(())
    }

    pub fn set_column_hidden(&mut self, col: u16, hidden: bool) -> Result<()> {
        self.sheet.set_column_hidden(col, hidden)?;
        self.touch();
        Ok(())
    }

    /// Set the default style of a column; cells without their own style
    /// inherit it
    pub fn set_column_style(&mut self, col: u16, style: Option<StyleId>) -> Result<()> {
        if let Some(id) = style {
            self.styles.get(id)?;
        }
        self.sheet.set_column_style(col, style)?;
        self.touch();
        Ok(())
    }

    pub fn set_default_row_height(&mut self, points: Option<f64>) -> Result<()> {
        self.sheet.set_default_row_height(points)?;
        self.touch();
        Ok(())
    }

    pub fn set_default_column_width(&mut self, width: Option<f64>) -> Result<()> {
        self.sheet.set_default_column_width(width)?;
        self.touch();
        Ok(())
    }

    /// Freeze the rows above and the columns left of `pos`; A1 unfreezes
    pub fn freeze_panes<P: CellPos>(&mut self, pos: P) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        self.sheet.set_freeze_panes(row, col)?;
        self.touch();
        Ok(())
    }

    pub fn unfreeze_panes(&mut self) {
        self.sheet.unfreeze_panes();
        self.touch();
    }

    /// Put an autofilter on a range, replacing any previous one
    pub fn set_autofilter<R: RangeArg>(&mut self, range: R) -> Result<()> {
        let range = self.resolve_range(range)?;
        self.sheet.set_autofilter(Some(range));
        self.dirty.mark(Part::Workbook);
        self.touch();
        Ok(())
    }

    pub fn clear_autofilter(&mut self) {
        if self.sheet.autofilter().is_some() {
            self.sheet.set_autofilter(None);
            self.dirty.mark(Part::Workbook);
            self.touch();
        }
    }

    /// Set the print area; it is stored as a defined name of the workbook
    pub fn set_print_area<R: RangeArg>(&mut self, range: R) -> Result<()> {
        let range = self.resolve_range(range)?;
        self.sheet.set_print_area(Some(range));
        self.dirty.mark(Part::Workbook);
        Ok(())
    }

    pub fn clear_print_area(&mut self) {
        if self.sheet.print_area().is_some() {
            self.sheet.set_print_area(None);
            self.dirty.mark(Part::Workbook);
        }
    }

    /// Make `pos` the active, selected cell
    pub fn set_active_cell<P: CellPos>(&mut self, pos: P) -> Result<()> {
        let (row, col) = self.resolve(pos)?;
        self.sheet.set_selection(Some(Selection::cell(row, col)))?;
        self.touch();
        Ok(())
    }

    pub fn set_page_setup(&mut self, setup: PageSetup) -> Result<()> {
        self.sheet.set_page_setup(setup)?;
        self.touch();
        Ok(())
    }

    pub fn set_tab_color(&mut self, color: Option<Color>) {
        self.sheet.set_tab_color(color);
        self.touch();
    }

    pub fn set_show_grid_lines(&mut self, show: bool) {
        self.sheet.set_show_grid_lines(show);
        self.touch();
    }

    // === Images ===

    /// Place a picture at `pos` at its natural size, anchored to that cell
    pub fn insert_image<P: CellPos>(&mut self, pos: P, image: Image) -> Result<usize> {
        self.insert_image_with(pos, image, AnchorKind::OneCell)
    }

    /// Place a picture at `pos` with the given anchoring behavior
    pub fn insert_image_with<P: CellPos>(&mut self, pos: P, image: Image, kind: AnchorKind) -> Result<usize> {
        let (row, col) = self.resolve(pos)?;
        let index = self.sheet.insert_image_at(row, col, image, kind)?;
        self.touch_drawing();
        Ok(index)
    }

    /// Add a picture that already carries its anchor
    pub fn add_image(&mut self, image: Image) -> Result<usize> {
        if let Some((row, col)) = image.anchor.from_cell() {
            check_position(row, u32::from(col))?;
        }
        let index = self.sheet.add_image(image);
        self.touch_drawing();
        Ok(index)
    }

    pub fn remove_image(&mut self, index: usize) -> Result<Image> {
        let image = self.sheet.remove_image(index)?;
        self.touch_drawing();
        Ok(image)
    }

    // === Shared formulas ===

    /// Fill `range` with one formula written as it reads at the top-left
    /// cell; other cells get the rebased text
    pub fn create_shared_formula<R: RangeArg>(&mut self, range: R, template: &str) -> Result<u32> {
        let range = self.resolve_range(range)?;
        checked_formula(template)?;
        let si = self.sheet.create_shared_formula(range, template)?;
        self.touch();
        Ok(si)
    }

    /// Group runs of equivalent formulas into shared formulas
    pub fn optimize_formulas(&mut self, min_group: usize) -> usize {
        let groups = self.sheet.optimize_formulas(min_group);
        if groups > 0 {
            self.touch();
        }
        groups
    }

    pub fn shared_formula_stats(&self) -> SharedFormulaStats {
        self.sheet.shared_formula_stats()
    }
}

fn checked_formula(text: &str) -> Result<Formula> {
    let formula = Formula::new(text.trim());
    match formula.text() {
        Some(t) if !t.trim().is_empty() => Ok(formula),
        _ => Err(Error::invalid_value("formula", "formula text is empty")),
    }
}
