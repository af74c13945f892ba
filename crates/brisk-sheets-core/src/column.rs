//! Column properties stored as spans of identical columns

use std::collections::BTreeMap;

use crate::style::StyleId;

/// Largest column width Excel accepts, in characters
pub const MAX_COLUMN_WIDTH: f64 = 255.0;

/// Column metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnProps {
    /// Custom width in characters (None = default)
    pub width: Option<f64>,
    /// Column is hidden
    pub hidden: bool,
    /// Default style for cells of this column that have none
    pub style: Option<StyleId>,
    /// Outline/grouping level (0-7)
    pub outline_level: u8,
    /// Column is collapsed (in outline)
    pub collapsed: bool,
    /// Best fit (auto-sized)
    pub best_fit: bool,
}

impl ColumnProps {
    /// Check if this column has any custom settings
    pub fn has_custom_settings(&self) -> bool {
        *self != ColumnProps::default()
    }
}

/// Column properties keyed by runs of columns, mirroring the `<col min max>`
/// records of the sheet XML. A file that styles all 16384 columns costs one
/// entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    /// first column -> (last column, props); spans never overlap
    spans: BTreeMap<u16, (u16, ColumnProps)>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties of one column
    pub fn get(&self, col: u16) -> Option<&ColumnProps> {
        self.spans
            .range(..=col)
            .next_back()
            .filter(|(_, (last, _))| *last >= col)
            .map(|(_, (_, props))| props)
    }

    /// Spans in column order: (first, last, props)
    pub fn spans(&self) -> impl Iterator<Item = (u16, u16, &ColumnProps)> {
        self.spans
            .iter()
            .map(|(&first, (last, props))| (first, *last, props))
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Apply `f` to every column in `first..=last`
    pub fn update<F: FnMut(&mut ColumnProps)>(&mut self, first: u16, last: u16, mut f: F) {
        let (first, last) = if first <= last { (first, last) } else { (last, first) };
        self.split_before(first);
        self.split_before(last.saturating_add(1));

        let existing: Vec<(u16, u16)> = self
            .spans
            .range(first..=last)
            .map(|(&s, (e, _))| (s, *e))
            .collect();
        let mut cursor = u32::from(first);
        for (start, end) in existing {
            if u32::from(start) > cursor {
                self.spans
                    .insert(cursor as u16, (start - 1, ColumnProps::default()));
            }
            cursor = u32::from(end) + 1;
        }
        if cursor <= u32::from(last) {
            self.spans
                .insert(cursor as u16, (last, ColumnProps::default()));
        }

        for (_, (_, props)) in self.spans.range_mut(first..=last) {
            f(props);
        }
        self.normalize();
    }

    /// Replace the properties of `first..=last` wholesale
    pub fn set_span(&mut self, first: u16, last: u16, props: ColumnProps) {
        self.update(first, last, |p| *p = props.clone());
    }

    /// Ensure no span crosses the boundary between `at - 1` and `at`
    fn split_before(&mut self, at: u16) {
        if at == 0 {
            return;
        }
        let found = self
            .spans
            .range(..at)
            .next_back()
            .map(|(&start, (end, props))| (start, *end, props.clone()));
        if let Some((start, end, props)) = found {
            if end >= at {
                self.spans.insert(start, (at - 1, props.clone()));
                self.spans.insert(at, (end, props));
            }
        }
    }

    /// Drop default spans and merge adjacent equal ones
    fn normalize(&mut self) {
        let old = std::mem::take(&mut self.spans);
        let mut prev: Option<(u16, u16, ColumnProps)> = None;
        for (start, (end, props)) in old {
            if !props.has_custom_settings() {
                continue;
            }
            if let Some((_, p_end, p_props)) = &mut prev {
                if u32::from(*p_end) + 1 == u32::from(start) && *p_props == props {
                    *p_end = end;
                    continue;
                }
            }
            if let Some((s, e, p)) = prev.take() {
                self.spans.insert(s, (e, p));
            }
            prev = Some((start, end, props));
        }
        if let Some((s, e, p)) = prev {
            self.spans.insert(s, (e, p));
        }
    }
}
