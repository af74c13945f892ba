//! Worksheet type

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::cell::{check_position, CellData, CellRange, CellStore, CellValue, Formula, FormulaKind};
use crate::column::{ColumnMap, ColumnProps, MAX_COLUMN_WIDTH};
use crate::error::{Error, Result};
use crate::formula::{SharedFormulaManager, SharedFormulaStats};
use crate::image::{
    column_width_px, emu_to_px, px_to_emu, row_height_px, Anchor, AnchorKind, AnchorPoint, Extent,
    Image, DEFAULT_COLUMN_WIDTH, DEFAULT_ROW_HEIGHT,
};
use crate::row::{RowProps, MAX_ROW_HEIGHT};
use crate::style::{Color, StyleId};
use crate::{MAX_COLS, MAX_ROWS};

/// Sheet visibility in the workbook's tab bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetVisibility {
    #[default]
    Visible,
    /// Hidden; the user can unhide it
    Hidden,
    /// Hidden; only code can unhide it
    VeryHidden,
}

impl SheetVisibility {
    /// Value of the `state` attribute; `None` for visible sheets
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            SheetVisibility::Visible => None,
            SheetVisibility::Hidden => Some("hidden"),
            SheetVisibility::VeryHidden => Some("veryHidden"),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "hidden" => SheetVisibility::Hidden,
            "veryHidden" => SheetVisibility::VeryHidden,
            _ => SheetVisibility::Visible,
        }
    }
}

/// Frozen rows above and columns left of (row, col)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezePanes {
    /// Number of frozen rows
    pub row: u32,
    /// Number of frozen columns
    pub col: u16,
}

/// Active cell and selected ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub active: (u32, u16),
    pub ranges: Vec<CellRange>,
}

impl Selection {
    /// Select a single cell
    pub fn cell(row: u32, col: u16) -> Self {
        Self {
            active: (row, col),
            ranges: vec![CellRange::single(row, col)],
        }
    }
}

/// Page margins in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub header: f64,
    pub footer: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            left: 0.7,
            right: 0.7,
            top: 0.75,
            bottom: 0.75,
            header: 0.3,
            footer: 0.3,
        }
    }
}

/// Print settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSetup {
    /// Paper size code (e.g., 1 = Letter, 9 = A4)
    pub paper_size: Option<u32>,
    pub orientation: Option<PageOrientation>,
    /// Scale percentage (10-400)
    pub scale: Option<u32>,
    /// Fit to pages wide
    pub fit_to_width: Option<u32>,
    /// Fit to pages tall
    pub fit_to_height: Option<u32>,
    pub margins: Option<PageMargins>,
    /// Print gridlines
    pub print_gridlines: bool,
    /// Print headings (row/column headers)
    pub print_headings: bool,
    pub center_horizontally: bool,
    pub center_vertically: bool,
}

impl PageSetup {
    /// Whether any fit-to-page dimension is set
    pub fn fits_to_page(&self) -> bool {
        self.fit_to_width.is_some() || self.fit_to_height.is_some()
    }

    /// Whether a `<printOptions>` element is needed
    pub fn has_print_options(&self) -> bool {
        self.print_gridlines || self.print_headings || self.center_horizontally || self.center_vertically
    }

    /// Whether a `<pageSetup>` element is needed
    pub fn has_page_setup(&self) -> bool {
        self.paper_size.is_some()
            || self.orientation.is_some()
            || self.scale.is_some()
            || self.fits_to_page()
    }

    /// Check ranges Excel enforces
    pub fn validate(&self) -> Result<()> {
        if let Some(scale) = self.scale {
            if !(10..=400).contains(&scale) {
                return Err(Error::invalid_value("print scale", format!("{} is outside 10..=400", scale)));
            }
        }
        if let Some(m) = &self.margins {
            let all = [m.left, m.right, m.top, m.bottom, m.header, m.footer];
            if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::invalid_value("page margins", "must be finite and non-negative"));
            }
        }
        Ok(())
    }
}

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOrientation {
    #[default]
    Portrait,
    Landscape,
}

/// A top-level XML element read from a source part that the model does not
/// interpret. It is written back verbatim when the part is regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    /// Local element name
    pub name: String,
    /// Complete element markup
    pub xml: Vec<u8>,
}

/// A worksheet (single sheet in a workbook)
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: CellStore,
    rows: BTreeMap<u32, RowProps>,
    columns: ColumnMap,
    default_row_height: Option<f64>,
    default_column_width: Option<f64>,
    /// Sorted, non-overlapping
    merges: Vec<CellRange>,
    autofilter: Option<CellRange>,
    freeze_panes: Option<FreezePanes>,
    selection: Option<Selection>,
    print_area: Option<CellRange>,
    page_setup: PageSetup,
    images: Vec<Image>,
    shared_formulas: SharedFormulaManager,
    visibility: SheetVisibility,
    tab_color: Option<Color>,
    show_grid_lines: bool,
    preserved: Vec<RawElement>,
    /// Package path the sheet was loaded from
    source_part: Option<String>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStore::new(),
            rows: BTreeMap::new(),
            columns: ColumnMap::new(),
            default_row_height: None,
            default_column_width: None,
            merges: Vec::new(),
            autofilter: None,
            freeze_panes: None,
            selection: None,
            print_area: None,
            page_setup: PageSetup::default(),
            images: Vec::new(),
            shared_formulas: SharedFormulaManager::new(),
            visibility: SheetVisibility::Visible,
            tab_color: None,
            show_grid_lines: true,
            preserved: Vec::new(),
            source_part: None,
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn visibility(&self) -> SheetVisibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: SheetVisibility) {
        self.visibility = visibility;
    }

    /// Check if the sheet is visible
    pub fn is_visible(&self) -> bool {
        self.visibility == SheetVisibility::Visible
    }

    /// Get the tab color
    pub fn tab_color(&self) -> Option<Color> {
        self.tab_color
    }

    /// Set the tab color
    pub fn set_tab_color(&mut self, color: Option<Color>) {
        self.tab_color = color;
    }

    pub fn show_grid_lines(&self) -> bool {
        self.show_grid_lines
    }

    pub fn set_show_grid_lines(&mut self, show: bool) {
        self.show_grid_lines = show;
    }

    // === Cell Access ===

    /// Cell storage
    pub fn cells(&self) -> &CellStore {
        &self.cells
    }

    /// Mutable cell storage, for loaders
    pub fn cells_mut(&mut self) -> &mut CellStore {
        &mut self.cells
    }

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Replace the value of a cell, keeping its style
    pub fn set_value_at(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        check_position(row, u32::from(col))?;
        if let CellValue::Number(n) = value {
            if !n.is_finite() {
                return Err(Error::invalid_value("number", format!("{} is not finite", n)));
            }
        }
        self.cells.set_value(row, col, value);
        Ok(())
    }

    /// Set or clear the explicit style of a cell, keeping its value
    pub fn set_style_at(&mut self, row: u32, col: u16, style: Option<StyleId>) -> Result<()> {
        check_position(row, u32::from(col))?;
        self.cells.set_style(row, col, style);
        Ok(())
    }

    /// Remove a cell, value and style
    pub fn clear_cell_at(&mut self, row: u32, col: u16) -> Option<CellData> {
        self.cells.remove(row, col)
    }

    /// Style that applies to a cell: its own, else the column default, else
    /// the workbook default
    pub fn effective_style(&self, row: u32, col: u16) -> StyleId {
        self.cells
            .get(row, col)
            .and_then(|c| c.style)
            .or_else(|| self.columns.get(col).and_then(|p| p.style))
            .unwrap_or(StyleId::DEFAULT)
    }

    /// Formula text of a cell, with shared members expanded
    pub fn formula_at(&self, row: u32, col: u16) -> Option<Cow<'_, str>> {
        let formula = self.cells.get(row, col)?.value.as_formula()?;
        match &formula.kind {
            FormulaKind::Single(text) | FormulaKind::Array { text, .. } => Some(Cow::Borrowed(text)),
            FormulaKind::Shared { si } => self.shared_formulas.expand(*si, row, col).ok().map(Cow::Owned),
        }
    }

    /// Get the used range (bounds of all stored cells)
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells.used_range()
    }

    /// Range written to `<dimension>`; A1 for an empty sheet
    pub fn dimension(&self) -> CellRange {
        self.used_range().unwrap_or_else(|| CellRange::single(0, 0))
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all stored cells in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    // === Row/Column Operations ===

    /// Properties of a row, if any were set
    pub fn row_props(&self, row: u32) -> Option<&RowProps> {
        self.rows.get(&row)
    }

    /// Rows with custom properties
    pub fn rows(&self) -> impl Iterator<Item = (u32, &RowProps)> {
        self.rows.iter().map(|(&r, p)| (r, p))
    }

    /// Update one row's properties; rows left at defaults are dropped
    pub fn update_row<F: FnOnce(&mut RowProps)>(&mut self, row: u32, f: F) -> Result<()> {
        check_position(row, 0)?;
        let props = self.rows.entry(row).or_default();
        f(props);
        if !props.has_custom_settings() {
            self.rows.remove(&row);
        }
        Ok(())
    }

    /// Get row height in points
    pub fn row_height(&self, row: u32) -> f64 {
        self.rows
            .get(&row)
            .and_then(|p| p.height)
            .or(self.default_row_height)
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    /// Set row height in points (0..=409)
    pub fn set_row_height(&mut self, row: u32, height: f64) -> Result<()> {
        if !height.is_finite() || !(0.0..=MAX_ROW_HEIGHT).contains(&height) {
            return Err(Error::invalid_value(
                "row height",
                format!("{} is outside 0..={}", height, MAX_ROW_HEIGHT),
            ));
        }
        self.update_row(row, |p| p.height = Some(height))
    }

    /// Check if row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.rows.get(&row).map_or(false, |p| p.hidden)
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) -> Result<()> {
        self.update_row(row, |p| p.hidden = hidden)
    }

    /// Column property spans
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Properties of one column, if any were set
    pub fn column_props(&self, col: u16) -> Option<&ColumnProps> {
        self.columns.get(col)
    }

    /// Update the properties of `first..=last`
    pub fn update_columns<F: FnMut(&mut ColumnProps)>(&mut self, first: u16, last: u16, f: F) -> Result<()> {
        check_position(0, u32::from(first.max(last)))?;
        self.columns.update(first, last, f);
        Ok(())
    }

    /// Get column width in characters
    pub fn column_width(&self, col: u16) -> f64 {
        self.columns
            .get(col)
            .and_then(|p| p.width)
            .or(self.default_column_width)
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Set column width in characters (0..=255)
    pub fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        if !width.is_finite() || !(0.0..=MAX_COLUMN_WIDTH).contains(&width) {
            return Err(Error::invalid_value(
                "column width",
                format!("{} is outside 0..={}", width, MAX_COLUMN_WIDTH),
            ));
        }
        self.update_columns(col, col, |p| p.width = Some(width))
    }

    /// Check if column is hidden
    pub fn is_column_hidden(&self, col: u16) -> bool {
        self.columns.get(col).map_or(false, |p| p.hidden)
    }

    /// Set column hidden state
    pub fn set_column_hidden(&mut self, col: u16, hidden: bool) -> Result<()> {
        self.update_columns(col, col, |p| p.hidden = hidden)
    }

    /// Default style of a column
    pub fn column_style(&self, col: u16) -> Option<StyleId> {
        self.columns.get(col).and_then(|p| p.style)
    }

    /// Set the default style of a column
    pub fn set_column_style(&mut self, col: u16, style: Option<StyleId>) -> Result<()> {
        self.update_columns(col, col, |p| p.style = style)
    }

    pub fn default_row_height(&self) -> Option<f64> {
        self.default_row_height
    }

    pub fn set_default_row_height(&mut self, height: Option<f64>) -> Result<()> {
        if let Some(h) = height {
            if !h.is_finite() || !(0.0..=MAX_ROW_HEIGHT).contains(&h) {
                return Err(Error::invalid_value("default row height", format!("{}", h)));
            }
        }
        self.default_row_height = height;
        Ok(())
    }

    pub fn default_column_width(&self) -> Option<f64> {
        self.default_column_width
    }

    pub fn set_default_column_width(&mut self, width: Option<f64>) -> Result<()> {
        if let Some(w) = width {
            if !w.is_finite() || !(0.0..=MAX_COLUMN_WIDTH).contains(&w) {
                return Err(Error::invalid_value("default column width", format!("{}", w)));
            }
        }
        self.default_column_width = width;
        Ok(())
    }

    // === Merged Cells ===

    /// Merged regions, sorted
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merges
    }

    /// Merge cells. The range must span more than one cell and must not
    /// overlap an existing merge. Cell contents are left untouched.
    pub fn merge_cells(&mut self, range: CellRange) -> Result<()> {
        let range = range.relative();
        if range.is_single_cell() {
            return Err(Error::InvalidRange(format!(
                "{} is a single cell",
                range.to_a1_string()
            )));
        }
        if self.merges.iter().any(|m| m.overlaps(&range)) {
            return Err(Error::MergeOverlap(range.to_a1_string()));
        }
        let at = self.merges.binary_search(&range).unwrap_or_else(|i| i);
        self.merges.insert(at, range);
        Ok(())
    }

    /// Remove a merged region; false when `range` was not merged
    pub fn unmerge_cells(&mut self, range: &CellRange) -> bool {
        match self.merges.binary_search(&range.relative()) {
            Ok(i) => {
                self.merges.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    // === Freeze Panes, Filter, Selection, Printing ===

    /// Get freeze pane settings
    pub fn freeze_panes(&self) -> Option<FreezePanes> {
        self.freeze_panes
    }

    /// Freeze rows above `row` and columns left of `col`; (0, 0) unfreezes
    pub fn set_freeze_panes(&mut self, row: u32, col: u16) -> Result<()> {
        check_position(row, u32::from(col))?;
        self.freeze_panes = if row == 0 && col == 0 {
            None
        } else {
            Some(FreezePanes { row, col })
        };
        Ok(())
    }

    /// Remove freeze panes
    pub fn unfreeze_panes(&mut self) {
        self.freeze_panes = None;
    }

    pub fn autofilter(&self) -> Option<CellRange> {
        self.autofilter
    }

    pub fn set_autofilter(&mut self, range: Option<CellRange>) {
        self.autofilter = range.map(|r| r.relative());
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) -> Result<()> {
        if let Some(sel) = &selection {
            check_position(sel.active.0, u32::from(sel.active.1))?;
        }
        self.selection = selection;
        Ok(())
    }

    pub fn print_area(&self) -> Option<CellRange> {
        self.print_area
    }

    pub fn set_print_area(&mut self, range: Option<CellRange>) {
        self.print_area = range.map(|r| r.relative());
    }

    pub fn page_setup(&self) -> &PageSetup {
        &self.page_setup
    }

    pub fn set_page_setup(&mut self, setup: PageSetup) -> Result<()> {
        setup.validate()?;
        self.page_setup = setup;
        Ok(())
    }

    // === Images ===

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Add a picture with whatever anchor it carries; returns its index
    pub fn add_image(&mut self, image: Image) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    /// Add a picture anchored at (row, col) at its natural size
    pub fn insert_image_at(&mut self, row: u32, col: u16, image: Image, kind: AnchorKind) -> Result<usize> {
        check_position(row, u32::from(col))?;
        let (w, h) = image.dimensions();
        let from = AnchorPoint::new(row, col);
        let anchor = match kind {
            AnchorKind::OneCell => Anchor::OneCell {
                from,
                ext: Extent::from_px(f64::from(w), f64::from(h)),
            },
            AnchorKind::TwoCell => self.two_cell_anchor(from, f64::from(w), f64::from(h)),
        };
        Ok(self.add_image(image.with_anchor(anchor)))
    }

    /// Remove a picture by index
    pub fn remove_image(&mut self, index: usize) -> Result<Image> {
        if index >= self.images.len() {
            return Err(Error::ImageNotFound(index, self.name.clone()));
        }
        Ok(self.images.remove(index))
    }

    fn column_px(&self, col: u16) -> f64 {
        if self.is_column_hidden(col) {
            0.0
        } else {
            column_width_px(self.column_width(col))
        }
    }

    fn row_px(&self, row: u32) -> f64 {
        if self.is_row_hidden(row) {
            0.0
        } else {
            row_height_px(self.row_height(row))
        }
    }

    /// Two-cell anchor whose corners enclose a `width` x `height` pixel box
    /// starting at `from`, given the current row heights and column widths
    pub fn two_cell_anchor(&self, from: AnchorPoint, width: f64, height: f64) -> Anchor {
        let mut col = from.col;
        let mut x = emu_to_px(from.col_offset) + width;
        loop {
            let w = self.column_px(col);
            if x < w || col + 1 >= MAX_COLS {
                break;
            }
            x -= w;
            col += 1;
        }
        let mut row = from.row;
        let mut y = emu_to_px(from.row_offset) + height;
        loop {
            let h = self.row_px(row);
            if y < h || row + 1 >= MAX_ROWS {
                break;
            }
            y -= h;
            row += 1;
        }
        Anchor::TwoCell {
            from,
            to: AnchorPoint {
                row,
                col,
                row_offset: px_to_emu(y),
                col_offset: px_to_emu(x),
            },
        }
    }

    // === Shared Formulas ===

    pub fn shared_formulas(&self) -> &SharedFormulaManager {
        &self.shared_formulas
    }

    pub fn shared_formulas_mut(&mut self) -> &mut SharedFormulaManager {
        &mut self.shared_formulas
    }

    /// Turn every cell of `range` into a member of a new shared formula
    /// whose text at the top-left cell is `template`
    pub fn create_shared_formula(&mut self, range: CellRange, template: &str) -> Result<u32> {
        check_position(range.end.row, u32::from(range.end.col))?;
        let si = self.shared_formulas.create_shared(range, template);
        for (row, col) in range.cells() {
            self.cells
                .set_value(row, col, CellValue::Formula(Box::new(Formula::shared(si))));
        }
        Ok(si)
    }

    /// Convert runs of equivalent formulas into shared formulas; returns the
    /// number of groups created
    pub fn optimize_formulas(&mut self, min_group: usize) -> usize {
        self.shared_formulas.optimize(&mut self.cells, min_group)
    }

    /// Current shared formula savings
    pub fn shared_formula_stats(&self) -> SharedFormulaStats {
        self.shared_formulas.statistics(&self.cells)
    }

    // === Preserved markup ===

    /// Unmodeled top-level elements carried over from a source file
    pub fn preserved_elements(&self) -> &[RawElement] {
        &self.preserved
    }

    pub fn set_preserved_elements(&mut self, elements: Vec<RawElement>) {
        self.preserved = elements;
    }

    /// Part name inside the source package, for sheets loaded from a file
    pub fn source_part(&self) -> Option<&str> {
        self.source_part.as_deref()
    }

    pub fn set_source_part(&mut self, part: Option<String>) {
        self.source_part = part;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellAddress;
    use pretty_assertions::assert_eq;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut v = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        v.extend_from_slice(&13u32.to_be_bytes());
        v.extend_from_slice(b"IHDR");
        v.extend_from_slice(&w.to_be_bytes());
        v.extend_from_slice(&h.to_be_bytes());
        v
    }

    #[test]
    fn test_new_worksheet() {
        let ws = Worksheet::new("Test");
        assert_eq!(ws.name(), "Test");
        assert!(ws.is_visible());
        assert!(ws.is_empty());
        assert_eq!(ws.dimension(), CellRange::single(0, 0));
    }

    #[test]
    fn test_set_values() {
        let mut ws = Worksheet::new("Test");
        ws.set_value_at(0, 0, CellValue::Number(42.0)).unwrap();
        ws.set_style_at(0, 0, Some(StyleId(3))).unwrap();
        ws.set_value_at(0, 0, CellValue::Bool(true)).unwrap();
        let cell = ws.cell_at(0, 0).unwrap();
        assert_eq!(cell.value, CellValue::Bool(true));
        assert_eq!(cell.style, Some(StyleId(3)));
        assert!(ws.set_value_at(0, 1, CellValue::Number(f64::NAN)).is_err());
        assert!(matches!(
            ws.set_value_at(MAX_ROWS, 0, CellValue::Blank),
            Err(Error::RowOutOfBounds(..))
        ));
    }

    #[test]
    fn test_used_range() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.used_range().is_none());
        ws.set_value_at(5, 3, CellValue::Number(1.0)).unwrap();
        ws.set_value_at(10, 7, CellValue::Number(2.0)).unwrap();
        assert_eq!(ws.used_range(), Some(CellRange::from_indices(5, 3, 10, 7)));
    }

    #[test]
    fn test_row_column_dimensions() {
        let mut ws = Worksheet::new("Test");
        assert!((ws.row_height(0) - 15.0).abs() < 0.001);
        assert!((ws.column_width(0) - 8.43).abs() < 0.001);

        ws.set_row_height(5, 30.0).unwrap();
        ws.set_column_width(3, 20.0).unwrap();
        assert!((ws.row_height(5) - 30.0).abs() < 0.001);
        assert!((ws.column_width(3) - 20.0).abs() < 0.001);

        assert!(ws.set_row_height(1, 410.0).is_err());
        assert!(ws.set_column_width(1, -1.0).is_err());

        ws.set_row_hidden(5, true).unwrap();
        ws.set_row_hidden(7, true).unwrap();
        ws.set_row_hidden(7, false).unwrap();
        assert!(ws.is_row_hidden(5));
        assert_eq!(ws.rows().count(), 1);
    }

    #[test]
    fn test_effective_style() {
        let mut ws = Worksheet::new("Test");
        ws.set_column_style(2, Some(StyleId(4))).unwrap();
        ws.set_value_at(0, 2, CellValue::Number(1.0)).unwrap();
        assert_eq!(ws.effective_style(0, 2), StyleId(4));
        ws.set_style_at(0, 2, Some(StyleId(5))).unwrap();
        assert_eq!(ws.effective_style(0, 2), StyleId(5));
        assert_eq!(ws.effective_style(0, 1), StyleId::DEFAULT);
    }

    #[test]
    fn test_merge_cells() {
        let mut ws = Worksheet::new("Test");
        let range = CellRange::parse("A1:C3").unwrap();
        ws.merge_cells(range).unwrap();
        ws.merge_cells(CellRange::parse("A5:B5").unwrap()).unwrap();
        assert!(matches!(
            ws.merge_cells(CellRange::parse("B2:D4").unwrap()),
            Err(Error::MergeOverlap(_))
        ));
        assert!(ws.merge_cells(CellRange::parse("E1:E1").unwrap()).is_err());
        assert_eq!(ws.merged_regions()[0], range);
        assert!(ws.unmerge_cells(&range));
        assert!(!ws.unmerge_cells(&range));
        assert_eq!(ws.merged_regions().len(), 1);
    }

    #[test]
    fn test_absolute_flags_do_not_split_ranges() {
        let mut ws = Worksheet::new("Test");
        ws.merge_cells(CellRange::parse("$A$1:$B$2").unwrap()).unwrap();
        assert_eq!(ws.merged_regions()[0], CellRange::parse("A1:B2").unwrap());
        assert!(ws.unmerge_cells(&CellRange::parse("$A$1:B$2").unwrap()));
        assert!(ws.merged_regions().is_empty());

        ws.set_print_area(Some(CellRange::parse("$A$1:$D$20").unwrap()));
        assert_eq!(ws.print_area(), CellRange::parse("A1:D20").ok());
        ws.set_autofilter(Some(CellRange::parse("$A$1:$C$1").unwrap()));
        assert_eq!(ws.autofilter(), CellRange::parse("A1:C1").ok());
    }

    #[test]
    fn test_freeze_panes() {
        let mut ws = Worksheet::new("Test");
        ws.set_freeze_panes(1, 0).unwrap();
        assert_eq!(ws.freeze_panes(), Some(FreezePanes { row: 1, col: 0 }));
        ws.set_freeze_panes(0, 0).unwrap();
        assert_eq!(ws.freeze_panes(), None);
    }

    #[test]
    fn test_shared_formula_cells() {
        let mut ws = Worksheet::new("Test");
        let si = ws
            .create_shared_formula(CellRange::parse("C1:C10").unwrap(), "A1+B1")
            .unwrap();
        assert_eq!(ws.cell_count(), 10);
        let addr = CellAddress::parse("C6").unwrap();
        assert_eq!(ws.formula_at(addr.row, addr.col).as_deref(), Some("A6+B6"));
        assert_eq!(ws.cell_at(0, 2).unwrap().value.shared_index(), Some(si));
        assert_eq!(ws.shared_formula_stats().cells, 10);
    }

    #[test]
    fn test_images() {
        let mut ws = Worksheet::new("Test");
        let img = Image::from_bytes(png(128, 40)).unwrap();
        let idx = ws.insert_image_at(1, 1, img, AnchorKind::TwoCell).unwrap();
        match ws.images()[idx].anchor {
            Anchor::TwoCell { from, to } => {
                assert_eq!((from.row, from.col), (1, 1));
                // 128px spans two 64px columns; 40px spans two 20px rows
                assert_eq!((to.row, to.col), (3, 3));
                assert_eq!((to.row_offset, to.col_offset), (0, 0));
            }
            other => panic!("unexpected anchor {:?}", other),
        }
        assert!(matches!(ws.remove_image(3), Err(Error::ImageNotFound(3, _))));
        ws.remove_image(idx).unwrap();
        assert!(ws.images().is_empty());
    }
}
