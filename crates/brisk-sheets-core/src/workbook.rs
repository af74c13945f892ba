//! Workbook type - the main document structure

use crate::defined_name::{DefinedName, DefinedNames, NameScope};
use crate::dirty::{DirtyManager, Part};
use crate::error::{Error, Result};
use crate::handle::{SheetMut, SheetRef};
use crate::options::WorkbookOptions;
use crate::properties::{CustomProperties, CustomValue, DocProperties};
use crate::strings::SharedStringTable;
use crate::style::{FormatDescriptor, FormatRepository, StyleId};
use crate::worksheet::{RawElement, SheetVisibility, Worksheet};
use crate::MAX_SHEET_NAME_LEN;

/// How a workbook was obtained; fixed for its lifetime.
///
/// Read-only access is a separate type (the columnar workbook of the xlsx
/// crate), so write operations are unavailable there at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Built from scratch; every part is generated on save
    Create,
    /// Loaded from a package; clean parts are copied on save
    Edit,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Create => "create",
            AccessMode::Edit => "edit",
        }
    }
}

/// Calculation settings written to `<calcPr>`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalcSettings {
    /// Engine version that last calculated the file
    pub calc_id: Option<u32>,
    /// Ask the consumer to recalculate everything on open
    pub full_calc_on_load: bool,
}

/// Workbook-level settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkbookSettings {
    /// Use the 1904 date system
    pub date_1904: bool,
    pub calc: CalcSettings,
}

/// Everything an edit-mode loader recovers from a package
#[derive(Debug, Default)]
pub struct WorkbookParts {
    pub worksheets: Vec<Worksheet>,
    pub styles: FormatRepository,
    pub strings: SharedStringTable,
    pub properties: DocProperties,
    pub custom_properties: CustomProperties,
    pub names: DefinedNames,
    pub settings: WorkbookSettings,
    pub active_sheet: usize,
    /// Unmodeled top-level elements of the workbook part
    pub preserved: Vec<RawElement>,
}

/// Anything that identifies a sheet: its position or its name
pub trait SheetKey {
    /// Position of the sheet in `workbook`
    fn sheet_index(&self, workbook: &Workbook) -> Result<usize>;
}

impl SheetKey for usize {
    fn sheet_index(&self, workbook: &Workbook) -> Result<usize> {
        if *self < workbook.sheet_count() {
            Ok(*self)
        } else {
            Err(Error::SheetOutOfBounds(*self, workbook.sheet_count()))
        }
    }
}

impl SheetKey for &str {
    fn sheet_index(&self, workbook: &Workbook) -> Result<usize> {
        workbook
            .sheet_index(self)
            .ok_or_else(|| Error::SheetNotFound((*self).to_string()))
    }
}

impl SheetKey for String {
    fn sheet_index(&self, workbook: &Workbook) -> Result<usize> {
        self.as_str().sheet_index(workbook)
    }
}

impl SheetKey for &String {
    fn sheet_index(&self, workbook: &Workbook) -> Result<usize> {
        self.as_str().sheet_index(workbook)
    }
}

/// A workbook (spreadsheet document)
///
/// Owns the ordered sheets and the pools they share: the format repository
/// and the shared string table. Sheets are reached through [`SheetRef`] and
/// [`SheetMut`] handles, which carry the pools and the dirty tracker along
/// with the sheet.
///
/// ```
/// use brisk_sheets_core::Workbook;
///
/// let mut wb = Workbook::new();
/// let mut sheet = wb.add_sheet("Data").unwrap();
/// sheet.set_value("A1", "Hello").unwrap();
/// sheet.set_value((0, 1), 42.0).unwrap();
///
/// let sheet = wb.sheet("Data").unwrap();
/// assert_eq!(sheet.cell("A1").unwrap().as_text(), Some("Hello"));
/// assert_eq!(sheet.cell("B1").unwrap().as_number(), Some(42.0));
/// ```
#[derive(Debug)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    styles: FormatRepository,
    strings: SharedStringTable,
    properties: DocProperties,
    custom_properties: CustomProperties,
    names: DefinedNames,
    dirty: DirtyManager,
    mode: AccessMode,
    options: WorkbookOptions,
    /// Workbook settings
    settings: WorkbookSettings,
    /// Active sheet index
    active_sheet: usize,
    preserved: Vec<RawElement>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create an empty workbook in create mode
    pub fn new() -> Self {
        Self::with_options(WorkbookOptions::default())
    }

    /// Create an empty workbook in create mode with explicit options
    pub fn with_options(options: WorkbookOptions) -> Self {
        Self {
            worksheets: Vec::new(),
            styles: FormatRepository::new(),
            strings: SharedStringTable::new(),
            properties: DocProperties::default(),
            custom_properties: CustomProperties::new(),
            names: DefinedNames::new(),
            dirty: DirtyManager::all_dirty(0),
            mode: AccessMode::Create,
            options,
            settings: WorkbookSettings::default(),
            active_sheet: 0,
            preserved: Vec::new(),
        }
    }

    /// Assemble an edit-mode workbook from loaded parts; nothing is dirty
    pub fn from_parts(parts: WorkbookParts, options: WorkbookOptions) -> Self {
        let count = parts.worksheets.len();
        Self {
            active_sheet: parts.active_sheet.min(count.saturating_sub(1)),
            worksheets: parts.worksheets,
            styles: parts.styles,
            strings: parts.strings,
            properties: parts.properties,
            custom_properties: parts.custom_properties,
            names: parts.names,
            dirty: DirtyManager::clean(count),
            mode: AccessMode::Edit,
            options,
            settings: parts.settings,
            preserved: parts.preserved,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn options(&self) -> &WorkbookOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: WorkbookOptions) {
        self.options = options;
    }

    /// Get workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Get mutable workbook settings; the workbook part is rewritten
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        self.dirty.mark(Part::Workbook);
        &mut self.settings
    }

    /// Whether serials use the 1904 date system
    pub fn date1904(&self) -> bool {
        self.settings.date_1904
    }

    // ==================== Sheets ====================

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Sheet names in tab order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(|ws| ws.name()).collect()
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Read handle for a sheet
    pub fn sheet<K: SheetKey>(&self, key: K) -> Result<SheetRef<'_>> {
        let index = key.sheet_index(self)?;
        Ok(SheetRef::new(
            index,
            &self.worksheets[index],
            &self.strings,
            &self.styles,
            self.settings.date_1904,
        ))
    }

    /// Write handle for a sheet
    pub fn sheet_mut<K: SheetKey>(&mut self, key: K) -> Result<SheetMut<'_>> {
        let index = key.sheet_index(self)?;
        Ok(self.handle(index))
    }

    fn handle(&mut self, index: usize) -> SheetMut<'_> {
        let Workbook {
            worksheets,
            styles,
            strings,
            dirty,
            settings,
            ..
        } = self;
        SheetMut::new(
            index,
            &mut worksheets[index],
            strings,
            styles,
            dirty,
            settings.date_1904,
        )
    }

    /// Append a sheet and return a write handle to it
    pub fn add_sheet(&mut self, name: &str) -> Result<SheetMut<'_>> {
        let index = self.worksheets.len();
        self.insert_sheet(index, name)
    }

    /// Append a sheet with a generated name ("Sheet1", "Sheet2", ...)
    pub fn add_worksheet(&mut self) -> Result<SheetMut<'_>> {
        let name = self.generate_sheet_name();
        self.add_sheet(&name)
    }

    /// Insert a sheet at `index` and return a write handle to it
    pub fn insert_sheet(&mut self, index: usize, name: &str) -> Result<SheetMut<'_>> {
        if index > self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(name)?;

        self.worksheets.insert(index, Worksheet::new(name));
        self.dirty.sheet_inserted(index);
        self.names.sheet_inserted(index);
        self.mark_structure();

        // Adjust active sheet index if needed
        if self.worksheets.len() > 1 && self.active_sheet >= index {
            self.active_sheet += 1;
        }
        log::debug!("added sheet '{}' at {}", name, index);
        Ok(self.handle(index))
    }

    /// Remove a sheet. Names scoped to it are dropped.
    pub fn remove_sheet<K: SheetKey>(&mut self, key: K) -> Result<Worksheet> {
        let index = key.sheet_index(self)?;
        let worksheet = self.worksheets.remove(index);
        self.dirty.sheet_removed(index);
        self.names.sheet_removed(index);
        self.mark_structure();

        // Adjust active sheet index
        if self.worksheets.is_empty() {
            self.active_sheet = 0;
        } else if self.active_sheet > index || self.active_sheet >= self.worksheets.len() {
            self.active_sheet -= 1;
        }
        log::debug!("removed sheet '{}'", worksheet.name());
        Ok(worksheet)
    }

    /// Move a worksheet to a new position
    pub fn move_sheet(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(from, self.worksheets.len()));
        }
        if to >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(to, self.worksheets.len()));
        }
        if from == to {
            return Ok(());
        }

        let worksheet = self.worksheets.remove(from);
        self.worksheets.insert(to, worksheet);
        self.dirty.sheet_moved(from, to);
        self.names.sheet_moved(from, to);
        self.mark_structure();

        // Adjust active sheet if needed
        if self.active_sheet == from {
            self.active_sheet = to;
        } else if from < self.active_sheet && to >= self.active_sheet {
            self.active_sheet -= 1;
        } else if from > self.active_sheet && to <= self.active_sheet {
            self.active_sheet += 1;
        }
        Ok(())
    }

    /// Rename a worksheet. Formulas that mention the old name are left as
    /// they are.
    pub fn rename_sheet<K: SheetKey>(&mut self, key: K, new_name: &str) -> Result<()> {
        let index = key.sheet_index(self)?;
        self.validate_sheet_name_excluding(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name.to_string());
        self.dirty.mark_all_of([Part::Workbook, Part::AppProps]);
        Ok(())
    }

    /// Get the active sheet index
    pub fn active_sheet(&self) -> usize {
        self.active_sheet
    }

    /// Set the active sheet index
    pub fn set_active_sheet<K: SheetKey>(&mut self, key: K) -> Result<()> {
        self.active_sheet = key.sheet_index(self)?;
        self.dirty.mark(Part::Workbook);
        Ok(())
    }

    /// Change a sheet's visibility. At least one sheet stays visible.
    pub fn set_sheet_visibility<K: SheetKey>(&mut self, key: K, visibility: SheetVisibility) -> Result<()> {
        let index = key.sheet_index(self)?;
        if visibility != SheetVisibility::Visible {
            let others_visible = self
                .worksheets
                .iter()
                .enumerate()
                .any(|(i, ws)| i != index && ws.is_visible());
            if !others_visible {
                return Err(Error::invalid_value(
                    "sheet visibility",
                    "a workbook needs at least one visible sheet",
                ));
            }
        }
        self.worksheets[index].set_visibility(visibility);
        self.dirty.mark(Part::Workbook);
        Ok(())
    }

    fn mark_structure(&mut self) {
        self.dirty.mark_all_of([
            Part::Workbook,
            Part::WorkbookRels,
            Part::ContentTypes,
            Part::AppProps,
        ]);
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        self.validate_sheet_name_excluding(name, None)
    }

    /// Validate a sheet name, optionally excluding a sheet from duplicate check
    fn validate_sheet_name_excluding(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        validate_sheet_name(name)?;

        // Check for duplicate names (case-insensitive)
        let name_lower = name.to_lowercase();
        for (i, ws) in self.worksheets.iter().enumerate() {
            if Some(i) != exclude_index && ws.name().to_lowercase() == name_lower {
                return Err(Error::DuplicateSheetName(name.into()));
            }
        }
        Ok(())
    }

    /// Generate a unique sheet name
    fn generate_sheet_name(&self) -> String {
        let mut n = self.worksheets.len() + 1;
        loop {
            let name = format!("Sheet{}", n);
            if self.sheet_index(&name).is_none() {
                return name;
            }
            n += 1;
        }
    }

    // ==================== Pools ====================

    /// The workbook's format repository
    pub fn styles(&self) -> &FormatRepository {
        &self.styles
    }

    /// Add a format to the repository, returning its id
    pub fn intern_style(&mut self, descriptor: FormatDescriptor) -> StyleId {
        let (id, new) = self.styles.intern_reporting(descriptor);
        if new {
            self.dirty.mark(Part::Styles);
        }
        id
    }

    /// The descriptor behind a style id
    pub fn style(&self, id: StyleId) -> Result<&FormatDescriptor> {
        self.styles.get(id)
    }

    /// The workbook's shared string table
    pub fn strings(&self) -> &SharedStringTable {
        &self.strings
    }

    // ==================== Defined Names ====================

    /// Define a workbook-scoped name
    ///
    /// # Example
    /// ```
    /// use brisk_sheets_core::Workbook;
    ///
    /// let mut wb = Workbook::new();
    /// wb.add_sheet("Sheet1").unwrap();
    /// wb.define_name("TaxRate", "Sheet1!$B$1").unwrap();
    /// ```
    pub fn define_name(&mut self, name: &str, refers_to: &str) -> Result<()> {
        self.define_name_with_scope(name, refers_to, NameScope::Workbook)
    }

    /// Define a name with a specific scope
    pub fn define_name_with_scope(&mut self, name: &str, refers_to: &str, scope: NameScope) -> Result<()> {
        self.add_defined_name(DefinedName::new(name, refers_to, scope))
    }

    /// Define a fully specified name
    pub fn add_defined_name(&mut self, name: DefinedName) -> Result<()> {
        if let NameScope::Sheet(index) = name.scope {
            index.sheet_index(self)?;
        }
        self.names.define(name)?;
        self.dirty.mark(Part::Workbook);
        Ok(())
    }

    /// Look up a name the way a formula on `current_sheet` would see it
    pub fn defined_name(&self, name: &str, current_sheet: usize) -> Option<&DefinedName> {
        self.names.get(name, current_sheet)
    }

    /// Remove a name from a scope
    pub fn remove_name(&mut self, name: &str, scope: NameScope) -> Result<DefinedName> {
        let removed = self.names.remove(name, scope)?;
        self.dirty.mark(Part::Workbook);
        Ok(removed)
    }

    /// Get the defined name collection (read-only)
    pub fn defined_names(&self) -> &DefinedNames {
        &self.names
    }

    // ==================== Properties ====================

    pub fn properties(&self) -> &DocProperties {
        &self.properties
    }

    /// Mutable core and extended properties
    pub fn properties_mut(&mut self) -> &mut DocProperties {
        self.dirty.mark_all_of([Part::CoreProps, Part::AppProps]);
        &mut self.properties
    }

    pub fn custom_properties(&self) -> &CustomProperties {
        &self.custom_properties
    }

    /// Set a custom property, replacing any existing one of that name
    pub fn set_custom_property<N, V>(&mut self, name: N, value: V) -> Result<()>
    where
        N: Into<String>,
        V: Into<CustomValue>,
    {
        self.custom_properties.set(name, value)?;
        self.mark_custom_properties();
        Ok(())
    }

    pub fn remove_custom_property(&mut self, name: &str) -> Result<CustomValue> {
        let value = self.custom_properties.remove(name)?;
        self.mark_custom_properties();
        Ok(value)
    }

    fn mark_custom_properties(&mut self) {
        self.dirty.mark_all_of([
            Part::CustomProps,
            Part::RootRels,
            Part::ContentTypes,
        ]);
    }

    // ==================== Save support ====================

    /// Dirty state of every part
    pub fn dirty(&self) -> &DirtyManager {
        &self.dirty
    }

    /// Mark a part for regeneration on the next save
    pub fn mark_dirty(&mut self, part: Part) {
        self.dirty.mark(part);
    }

    /// Record that the current state has been written out
    pub fn mark_saved(&mut self) {
        self.dirty.clear();
    }

    /// Record the package path each sheet was just written to, so a later
    /// save of the same workbook can reuse it
    pub fn set_sheet_parts(&mut self, parts: Vec<String>) {
        for (ws, part) in self.worksheets.iter_mut().zip(parts) {
            ws.set_source_part(Some(part));
        }
    }

    /// Unmodeled top-level elements of the workbook part
    pub fn preserved_elements(&self) -> &[RawElement] {
        &self.preserved
    }
}

/// Check a sheet name against the rules consumers enforce: 1 to 31
/// characters, none of `: \ / ? * [ ]`, and no apostrophe at either end
pub fn validate_sheet_name(name: &str) -> Result<()> {
    // Check length
    if name.is_empty() {
        return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(Error::InvalidSheetName(format!(
            "Sheet name too long (max {} characters)",
            MAX_SHEET_NAME_LEN
        )));
    }

    // Check for invalid characters
    const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
    for c in INVALID_CHARS {
        if name.contains(*c) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Error::InvalidSheetName(
            "Sheet name cannot start or end with an apostrophe".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 0);
        assert_eq!(wb.mode(), AccessMode::Create);
        assert!(wb.dirty().is_dirty(Part::Workbook));
        assert_eq!(wb.styles().len(), 1);
    }

    #[test]
    fn test_add_worksheets() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        wb.add_worksheet().unwrap();
        wb.add_sheet("Data").unwrap();
        assert_eq!(wb.sheet_names(), vec!["Sheet1", "Sheet2", "Data"]);
        assert_eq!(wb.sheet_index("data"), Some(2));
        assert!(wb.dirty().is_dirty(Part::Sheet(2)));
    }

    #[test]
    fn test_duplicate_name() {
        let mut wb = Workbook::new();
        wb.add_sheet("Sheet1").unwrap();
        let err = wb.add_sheet("SHEET1").unwrap_err();
        assert!(matches!(err, Error::DuplicateSheetName(_)));
        assert_eq!(wb.sheet_count(), 1);
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut wb = Workbook::new();
        assert!(wb.add_sheet("").is_err());
        assert!(wb.add_sheet("a/b").is_err());
        assert!(wb.add_sheet("what?").is_err());
        assert!(wb.add_sheet("'quoted").is_err());
        assert!(wb.add_sheet("quoted'").is_err());
        assert!(wb.add_sheet(&"x".repeat(32)).is_err());
        assert!(wb.add_sheet(&"x".repeat(31)).is_ok());
        assert!(wb.add_sheet("it's fine").is_ok());
        assert_eq!(
            wb.add_sheet("[x]").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_move_worksheet() {
        let mut wb = Workbook::new();
        for name in ["A", "B", "C"] {
            wb.add_sheet(name).unwrap();
        }
        wb.set_active_sheet(0).unwrap();
        wb.move_sheet(0, 2).unwrap();
        assert_eq!(wb.sheet_names(), vec!["B", "C", "A"]);
        assert_eq!(wb.active_sheet(), 2);
        assert!(wb.move_sheet(0, 3).is_err());
    }

    #[test]
    fn test_worksheet_by_name() {
        let mut wb = Workbook::new();
        wb.add_sheet("Revenue").unwrap();
        assert_eq!(wb.sheet("revenue").unwrap().name(), "Revenue");
        let err = wb.sheet("Costs").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(wb.sheet(4), Err(Error::SheetOutOfBounds(4, 1))));
    }

    #[test]
    fn test_remove_sheet_drops_scoped_names() {
        let mut wb = Workbook::new();
        wb.add_sheet("A").unwrap();
        wb.add_sheet("B").unwrap();
        wb.add_sheet("C").unwrap();
        wb.define_name_with_scope("Local", "A!$A$1", NameScope::Sheet(0))
            .unwrap();
        wb.define_name_with_scope("Later", "C!$A$1", NameScope::Sheet(2))
            .unwrap();
        wb.set_active_sheet(2).unwrap();

        wb.remove_sheet("A").unwrap();
        assert_eq!(wb.sheet_names(), vec!["B", "C"]);
        assert_eq!(wb.active_sheet(), 1);
        assert!(wb.defined_names().get_exact("Local", NameScope::Sheet(0)).is_none());
        assert!(wb.defined_names().get_exact("Later", NameScope::Sheet(1)).is_some());
    }

    #[test]
    fn test_rename_sheet() {
        let mut wb = Workbook::from_parts(
            WorkbookParts {
                worksheets: vec![Worksheet::new("One"), Worksheet::new("Two")],
                ..Default::default()
            },
            WorkbookOptions::default(),
        );
        assert!(!wb.dirty().any());
        wb.rename_sheet(0, "one").unwrap();
        assert!(wb.rename_sheet(0, "Two").is_err());
        assert_eq!(wb.sheet_names(), vec!["one", "Two"]);
        assert!(wb.dirty().is_dirty(Part::Workbook));
        assert!(!wb.dirty().is_dirty(Part::Sheet(0)));
    }

    #[test]
    fn test_last_visible_sheet() {
        let mut wb = Workbook::new();
        wb.add_sheet("A").unwrap();
        wb.add_sheet("B").unwrap();
        wb.set_sheet_visibility(0, SheetVisibility::Hidden).unwrap();
        assert!(wb.set_sheet_visibility(1, SheetVisibility::VeryHidden).is_err());
        assert!(wb.sheet(1).unwrap().worksheet().is_visible());
    }

    #[test]
    fn test_edit_mode_dirty_tracking() {
        let mut wb = Workbook::from_parts(
            WorkbookParts {
                worksheets: vec![Worksheet::new("One")],
                ..Default::default()
            },
            WorkbookOptions::default(),
        );
        wb.sheet_mut(0).unwrap().set_value("A1", "x").unwrap();
        assert!(wb.dirty().is_dirty(Part::Sheet(0)));
        assert!(wb.dirty().is_dirty(Part::SharedStrings));
        assert!(!wb.dirty().is_dirty(Part::Styles));

        wb.mark_saved();
        wb.set_custom_property("Owner", "ops").unwrap();
        assert!(wb.dirty().is_dirty(Part::CustomProps));
        assert!(!wb.dirty().is_dirty(Part::Sheet(0)));
    }

    #[test]
    fn test_intern_style_marks_styles() {
        let mut wb = Workbook::from_parts(WorkbookParts::default(), WorkbookOptions::default());
        let bold = FormatDescriptor::builder().bold(true).build().unwrap();
        let id = wb.intern_style(bold.clone());
        assert!(wb.dirty().is_dirty(Part::Styles));
        assert_eq!(wb.style(id).unwrap(), &bold);
        assert!(wb.style(StyleId(99)).is_err());
    }
}
