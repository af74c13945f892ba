//! Per-part modification tracking for incremental saves

use std::fmt;

/// A package part whose regeneration the workbook tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Part {
    ContentTypes,
    RootRels,
    Workbook,
    WorkbookRels,
    Styles,
    SharedStrings,
    CoreProps,
    AppProps,
    CustomProps,
    /// Worksheet XML, by sheet position
    Sheet(usize),
    /// Worksheet relationships, by sheet position
    SheetRels(usize),
    /// Drawing of a sheet, by sheet position
    Drawing(usize),
    Media,
}

impl Part {
    const GLOBAL: [Part; 10] = [
        Part::ContentTypes,
        Part::RootRels,
        Part::Workbook,
        Part::WorkbookRels,
        Part::Styles,
        Part::SharedStrings,
        Part::CoreProps,
        Part::AppProps,
        Part::CustomProps,
        Part::Media,
    ];

    fn global_bit(self) -> Option<u16> {
        Part::GLOBAL
            .iter()
            .position(|p| *p == self)
            .map(|i| 1u16 << i)
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Sheet(i) => write!(f, "sheet #{}", i),
            Part::SheetRels(i) => write!(f, "sheet rels #{}", i),
            Part::Drawing(i) => write!(f, "drawing #{}", i),
            other => write!(f, "{:?}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SheetFlags {
    sheet: bool,
    rels: bool,
    drawing: bool,
}

/// Boolean dirty flag per part.
///
/// Sheet-level flags follow sheet positions: inserting, removing or moving a
/// sheet moves its flags with it.
#[derive(Debug, Clone, Default)]
pub struct DirtyManager {
    global: u16,
    sheets: Vec<SheetFlags>,
}

impl DirtyManager {
    /// Tracker with every part clean
    pub fn clean(sheet_count: usize) -> Self {
        Self {
            global: 0,
            sheets: vec![SheetFlags::default(); sheet_count],
        }
    }

    /// Tracker with every part dirty
    pub fn all_dirty(sheet_count: usize) -> Self {
        let mut dm = Self::clean(sheet_count);
        dm.mark_all();
        dm
    }

    fn flags_mut(&mut self, index: usize) -> &mut SheetFlags {
        if index >= self.sheets.len() {
            self.sheets.resize(index + 1, SheetFlags::default());
        }
        &mut self.sheets[index]
    }

    /// Mark one part dirty
    pub fn mark(&mut self, part: Part) {
        match part {
            Part::Sheet(i) => self.flags_mut(i).sheet = true,
            Part::SheetRels(i) => self.flags_mut(i).rels = true,
            Part::Drawing(i) => self.flags_mut(i).drawing = true,
            global => {
                if let Some(bit) = global.global_bit() {
                    self.global |= bit;
                }
            }
        }
    }

    /// Mark several parts dirty
    pub fn mark_all_of<I: IntoIterator<Item = Part>>(&mut self, parts: I) {
        for part in parts {
            self.mark(part);
        }
    }

    /// Mark every part dirty
    pub fn mark_all(&mut self) {
        for part in Part::GLOBAL {
            self.mark(part);
        }
        for flags in &mut self.sheets {
            *flags = SheetFlags {
                sheet: true,
                rels: true,
                drawing: true,
            };
        }
    }

    pub fn is_dirty(&self, part: Part) -> bool {
        match part {
            Part::Sheet(i) => self.sheets.get(i).is_some_and(|f| f.sheet),
            Part::SheetRels(i) => self.sheets.get(i).is_some_and(|f| f.rels),
            Part::Drawing(i) => self.sheets.get(i).is_some_and(|f| f.drawing),
            global => global.global_bit().is_some_and(|bit| self.global & bit != 0),
        }
    }

    /// Whether any part is dirty
    pub fn any(&self) -> bool {
        self.global != 0
            || self
                .sheets
                .iter()
                .any(|f| f.sheet || f.rels || f.drawing)
    }

    /// Whether any worksheet XML is dirty
    pub fn any_sheet(&self) -> bool {
        self.sheets.iter().any(|f| f.sheet)
    }

    /// Every dirty part, globals first then per sheet
    pub fn dirty_parts(&self) -> Vec<Part> {
        let mut parts: Vec<Part> = Part::GLOBAL
            .iter()
            .copied()
            .filter(|p| self.is_dirty(*p))
            .collect();
        for (i, f) in self.sheets.iter().enumerate() {
            if f.sheet {
                parts.push(Part::Sheet(i));
            }
            if f.rels {
                parts.push(Part::SheetRels(i));
            }
            if f.drawing {
                parts.push(Part::Drawing(i));
            }
        }
        parts
    }

    /// Reset every flag after a successful save
    pub fn clear(&mut self) {
        self.global = 0;
        for f in &mut self.sheets {
            *f = SheetFlags::default();
        }
    }

    /// A new sheet was inserted at `index`; it is dirty in full
    pub fn sheet_inserted(&mut self, index: usize) {
        let index = index.min(self.sheets.len());
        self.sheets.insert(
            index,
            SheetFlags {
                sheet: true,
                rels: true,
                drawing: true,
            },
        );
    }

    /// The sheet at `index` was removed
    pub fn sheet_removed(&mut self, index: usize) {
        if index < self.sheets.len() {
            self.sheets.remove(index);
        }
    }

    /// A sheet moved from `from` to `to`. Sheet parts keep their names, so
    /// only the flags travel.
    pub fn sheet_moved(&mut self, from: usize, to: usize) {
        if from >= self.sheets.len() || to >= self.sheets.len() {
            return;
        }
        let flags = self.sheets.remove(from);
        self.sheets.insert(to, flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_then_mark() {
        let mut dm = DirtyManager::clean(2);
        assert!(!dm.any());
        dm.mark(Part::Sheet(1));
        dm.mark(Part::SharedStrings);
        assert!(dm.is_dirty(Part::Sheet(1)));
        assert!(!dm.is_dirty(Part::Sheet(0)));
        assert!(!dm.is_dirty(Part::Styles));
        assert_eq!(dm.dirty_parts(), vec![Part::SharedStrings, Part::Sheet(1)]);
        dm.clear();
        assert!(!dm.any());
    }

    #[test]
    fn test_all_dirty() {
        let dm = DirtyManager::all_dirty(1);
        assert!(dm.is_dirty(Part::ContentTypes));
        assert!(dm.is_dirty(Part::Media));
        assert!(dm.is_dirty(Part::Drawing(0)));
        assert!(dm.any_sheet());
    }

    #[test]
    fn test_flags_follow_sheets() {
        let mut dm = DirtyManager::clean(3);
        dm.mark(Part::Sheet(2));
        dm.sheet_removed(0);
        assert!(dm.is_dirty(Part::Sheet(1)));
        assert!(!dm.is_dirty(Part::Sheet(0)));

        dm.clear();
        dm.sheet_inserted(0);
        assert!(dm.is_dirty(Part::Sheet(0)));
        assert!(!dm.is_dirty(Part::Sheet(1)));

        dm.clear();
        dm.mark(Part::Sheet(0));
        dm.sheet_moved(0, 2);
        assert!(dm.is_dirty(Part::Sheet(2)));
        assert!(!dm.is_dirty(Part::Sheet(0)) && !dm.is_dirty(Part::Sheet(1)));
    }
}
