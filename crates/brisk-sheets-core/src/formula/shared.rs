//! Shared formula groups.
//!
//! A group stores one template formula written at an anchor cell. Every
//! member cell holds only the group index (`si`); its text is the template
//! rebased by the member's offset from the anchor.

use std::collections::BTreeMap;

use ahash::AHashMap;

use super::rebase::{rebase, relative_key};
use crate::cell::{CellRange, CellStore, CellValue, FormulaKind};
use crate::error::{Error, Result};

/// One registered shared formula
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFormula {
    pub si: u32,
    /// Formula text at the anchor, without `=`
    pub template: String,
    pub anchor: (u32, u16),
    /// Declared extent of the group
    pub range: CellRange,
}

/// Cells whose formulas are identical once rebased to a common anchor
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaPattern {
    /// Position-independent form of the formula
    pub key: String,
    /// Member positions, row-major
    pub cells: Vec<(u32, u16)>,
}

/// Savings from shared formula storage on one sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedFormulaStats {
    /// Groups with at least one member
    pub groups: usize,
    /// Cells taking part in a group
    pub cells: usize,
    /// Formula text not stored because members carry only an index
    pub bytes_saved: usize,
}

/// How one group is written out.
///
/// Computed at save time; the stored groups are not modified.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedGroup {
    /// Index written to the file
    pub si: u32,
    pub anchor: (u32, u16),
    pub range: CellRange,
    /// Text written on the anchor cell
    pub text: String,
}

/// Save-time plan for a sheet's shared formulas
#[derive(Debug, Clone, Default)]
pub struct EmissionPlan {
    groups: AHashMap<u32, EmittedGroup>,
    /// Members that cannot stay in their group and are written as plain
    /// formulas
    detached: AHashMap<(u32, u16), String>,
}

/// What to write for a shared-formula member cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemberEmission<'a> {
    /// The anchor: full text plus `ref`
    Anchor(&'a EmittedGroup),
    /// A follower: index only
    Follower(u32),
    /// Written as an ordinary formula
    Plain(&'a str),
}

impl EmissionPlan {
    /// Decide how the member at (row, col) of group `si` is written
    pub fn member(&self, si: u32, row: u32, col: u16) -> Option<MemberEmission<'_>> {
        if let Some(text) = self.detached.get(&(row, col)) {
            return Some(MemberEmission::Plain(text));
        }
        let group = self.groups.get(&si)?;
        if group.anchor == (row, col) {
            Some(MemberEmission::Anchor(group))
        } else {
            Some(MemberEmission::Follower(group.si))
        }
    }

    /// Number of groups that will be written
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Registry of a sheet's shared formula groups
#[derive(Debug, Clone, Default)]
pub struct SharedFormulaManager {
    groups: BTreeMap<u32, SharedFormula>,
    next_si: u32,
}

impl SharedFormulaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new group anchored at the top-left of `range`.
    ///
    /// The caller stores `Formula::shared(si)` in each member cell.
    pub fn create_shared(&mut self, range: CellRange, template: &str) -> u32 {
        let si = self.next_si;
        let template = template.strip_prefix('=').unwrap_or(template).to_string();
        self.insert(SharedFormula {
            si,
            template,
            anchor: (range.start.row, range.start.col),
            range,
        });
        si
    }

    /// Register a group read from a file under its original index
    pub fn register(&mut self, si: u32, anchor: (u32, u16), range: CellRange, template: String) {
        self.insert(SharedFormula {
            si,
            template,
            anchor,
            range,
        });
    }

    fn insert(&mut self, group: SharedFormula) {
        self.next_si = self.next_si.max(group.si + 1);
        self.groups.insert(group.si, group);
    }

    /// Look up a group
    pub fn get(&self, si: u32) -> Option<&SharedFormula> {
        self.groups.get(&si)
    }

    /// Forget a group
    pub fn remove(&mut self, si: u32) -> Option<SharedFormula> {
        self.groups.remove(&si)
    }

    /// Registered groups in index order
    pub fn groups(&self) -> impl Iterator<Item = &SharedFormula> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Formula text for the member at (row, col) of group `si`
    pub fn expand(&self, si: u32, row: u32, col: u16) -> Result<String> {
        let group = self.groups.get(&si).ok_or(Error::SharedFormulaNotFound(si))?;
        Ok(rebase(
            &group.template,
            i64::from(row) - i64::from(group.anchor.0),
            i64::from(col) - i64::from(group.anchor.1),
        ))
    }

    /// Group the single formulas in `cells` by their position-independent
    /// form. Only groups of at least `min_group` cells are returned.
    pub fn detect_patterns<'a, I>(cells: I, min_group: usize) -> Vec<FormulaPattern>
    where
        I: IntoIterator<Item = (u32, u16, &'a str)>,
    {
        let mut by_key: BTreeMap<String, Vec<(u32, u16)>> = BTreeMap::new();
        for (row, col, text) in cells {
            by_key
                .entry(relative_key(text, row, col))
                .or_default()
                .push((row, col));
        }
        let mut patterns: Vec<FormulaPattern> = by_key
            .into_iter()
            .filter(|(_, cells)| cells.len() >= min_group.max(2))
            .map(|(key, mut cells)| {
                cells.sort_unstable();
                FormulaPattern { key, cells }
            })
            .collect();
        patterns.sort_by(|a, b| a.cells[0].cmp(&b.cells[0]));
        patterns
    }

    /// Convert runs of equivalent single formulas in `store` into shared
    /// groups. Runs are contiguous vertical or horizontal lines of at least
    /// `min_group` cells. Returns the number of groups created.
    pub fn optimize(&mut self, store: &mut CellStore, min_group: usize) -> usize {
        let min_group = min_group.max(2);
        let candidates: Vec<(u32, u16, String)> = store
            .iter()
            .filter_map(|(row, col, data)| match &data.value {
                CellValue::Formula(f) => match &f.kind {
                    FormulaKind::Single(text) => Some((row, col, text.clone())),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        let patterns = Self::detect_patterns(
            candidates.iter().map(|(r, c, t)| (*r, *c, t.as_str())),
            min_group,
        );

        let mut created = 0;
        for pattern in patterns {
            for run in contiguous_runs(&pattern.cells, min_group) {
                let (r0, c0) = run[0];
                let (r1, c1) = run[run.len() - 1];
                let template = match store.get(r0, c0).and_then(|d| d.value.as_formula()) {
                    Some(f) => match f.text() {
                        Some(text) => text.to_string(),
                        None => continue,
                    },
                    None => continue,
                };
                let si = self.create_shared(CellRange::from_indices(r0, c0, r1, c1), &template);
                for &(row, col) in &run {
                    if let Some(data) = store.get_mut(row, col) {
                        if let CellValue::Formula(f) = &mut data.value {
                            // Cached results stay with their cells
                            f.kind = FormulaKind::Shared { si };
                        }
                    }
                }
                created += 1;
            }
        }
        if created > 0 {
            log::debug!("shared formula optimization created {} groups", created);
        }
        created
    }

    /// Savings currently realized in `store`
    pub fn statistics(&self, store: &CellStore) -> SharedFormulaStats {
        let mut stats = SharedFormulaStats::default();
        let mut seen: AHashMap<u32, usize> = AHashMap::new();
        for (row, col, data) in store.iter() {
            let Some(si) = data.value.shared_index() else {
                continue;
            };
            let Some(group) = self.groups.get(&si) else {
                continue;
            };
            stats.cells += 1;
            *seen.entry(si).or_default() += 1;
            if group.anchor != (row, col) {
                if let Ok(text) = self.expand(si, row, col) {
                    stats.bytes_saved += text.len();
                }
            }
        }
        stats.groups = seen.len();
        stats
    }

    /// Work out how each group is written given the cells that still
    /// reference it.
    ///
    /// A group whose anchor cell no longer references it is re-anchored on
    /// its first remaining member; its extent shrinks to the members' bounding
    /// box. Members left or above the new anchor are written as plain
    /// formulas. Each group keeps its own index, so gaps left by emptied
    /// groups stay in the numbering.
    pub fn emission_plan(&self, store: &CellStore) -> EmissionPlan {
        let mut members: BTreeMap<u32, Vec<(u32, u16)>> = BTreeMap::new();
        for (row, col, data) in store.iter() {
            if let Some(si) = data.value.shared_index() {
                members.entry(si).or_default().push((row, col));
            }
        }

        let mut plan = EmissionPlan::default();
        for (si, cells) in members {
            let Some(group) = self.groups.get(&si) else {
                log::warn!("cells reference unknown shared formula si={}", si);
                continue;
            };
            // Row-major order from the store
            let anchor = if cells.contains(&group.anchor) {
                group.anchor
            } else {
                cells[0]
            };
            let mut range = CellRange::single(anchor.0, anchor.1);
            let mut kept = 0usize;
            for &(row, col) in &cells {
                if row < anchor.0 || col < anchor.1 {
                    if let Ok(text) = self.expand(si, row, col) {
                        plan.detached.insert((row, col), text);
                    }
                    continue;
                }
                range = range.union(&CellRange::single(row, col));
                kept += 1;
            }
            if kept == 0 {
                continue;
            }
            let text = match self.expand(si, anchor.0, anchor.1) {
                Ok(text) => text,
                Err(_) => continue,
            };
            plan.groups.insert(
                si,
                EmittedGroup {
                    si: group.si,
                    anchor,
                    range,
                    text,
                },
            );
        }
        plan
    }
}

/// Split row-major sorted cells into vertical runs, then horizontal runs of
/// whatever is left, keeping runs of at least `min_len`.
fn contiguous_runs(cells: &[(u32, u16)], min_len: usize) -> Vec<Vec<(u32, u16)>> {
    let mut by_col: Vec<(u16, u32)> = cells.iter().map(|&(r, c)| (c, r)).collect();
    by_col.sort_unstable();

    let mut runs = Vec::new();
    let mut used = ahash::AHashSet::new();
    let mut i = 0;
    while i < by_col.len() {
        let mut j = i + 1;
        while j < by_col.len() && by_col[j].0 == by_col[i].0 && by_col[j].1 == by_col[j - 1].1 + 1 {
            j += 1;
        }
        if j - i >= min_len {
            let run: Vec<(u32, u16)> = by_col[i..j].iter().map(|&(c, r)| (r, c)).collect();
            used.extend(run.iter().copied());
            runs.push(run);
        }
        i = j;
    }

    let rest: Vec<(u32, u16)> = cells.iter().copied().filter(|p| !used.contains(p)).collect();
    let mut i = 0;
    while i < rest.len() {
        let mut j = i + 1;
        while j < rest.len() && rest[j].0 == rest[i].0 && rest[j].1 == rest[j - 1].1 + 1 {
            j += 1;
        }
        if j - i >= min_len {
            runs.push(rest[i..j].to_vec());
        }
        i = j;
    }
    runs
}
