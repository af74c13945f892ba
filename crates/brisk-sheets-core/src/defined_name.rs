//! Defined names
//!
//! A defined name binds an identifier to a formula, usually a reference such
//! as `Sheet1!$B$1`. Names are case-insensitive and are either visible to the
//! whole workbook or scoped to one sheet.
//!
//! Built-in names (`_xlnm.Print_Area`, `_xlnm._FilterDatabase`) are not kept
//! here; they are derived from worksheet state when the workbook is written.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Prefix of names reserved for Excel's built-in names
pub const BUILTIN_PREFIX: &str = "_xlnm.";

/// Scope of a defined name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NameScope {
    /// Visible from every sheet
    Workbook,
    /// Local to the sheet at this position
    Sheet(usize),
}

/// A defined name
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedName {
    /// The name as written, case preserved
    pub name: String,
    pub scope: NameScope,
    /// Formula text without a leading `=`
    pub formula: String,
    pub comment: Option<String>,
    /// Hidden from the name manager
    pub hidden: bool,
}

impl DefinedName {
    pub fn new(name: impl Into<String>, formula: impl AsRef<str>, scope: NameScope) -> Self {
        let formula = formula.as_ref();
        Self {
            name: name.into(),
            scope,
            formula: formula.strip_prefix('=').unwrap_or(formula).to_string(),
            comment: None,
            hidden: false,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Whether this is one of Excel's reserved `_xlnm.` names
    pub fn is_builtin(&self) -> bool {
        self.name
            .get(..BUILTIN_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(BUILTIN_PREFIX))
    }
}

/// Check a user-supplied name against Excel's naming rules
pub fn validate_name(name: &str) -> Result<()> {
    let bad = |reason: &str| Error::InvalidName(format!("'{}': {}", name, reason));
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(bad("empty"));
    };
    if name.chars().count() > 255 {
        return Err(bad("longer than 255 characters"));
    }
    if !(first.is_alphabetic() || first == '_' || first == '\\') {
        return Err(bad("must start with a letter, '_' or '\\'"));
    }
    if let Some(c) = chars.find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '\\' | '?'))) {
        return Err(bad(&format!("illegal character '{}'", c)));
    }
    if name.eq_ignore_ascii_case("r") || name.eq_ignore_ascii_case("c") {
        return Err(bad("reserved"));
    }
    if crate::cell::CellAddress::parse(name).is_ok() || looks_like_r1c1(name) {
        return Err(bad("conflicts with a cell reference"));
    }
    Ok(())
}

fn looks_like_r1c1(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let Some(rest) = upper.strip_prefix('R') else {
        return false;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let rest = &rest[digits..];
    match rest.strip_prefix('C') {
        Some(tail) => tail.bytes().all(|b| b.is_ascii_digit()),
        None => rest.is_empty() && digits > 0,
    }
}

/// The workbook's defined names, kept in a deterministic order
#[derive(Debug, Default, Clone)]
pub struct DefinedNames {
    names: BTreeMap<(String, NameScope), DefinedName>,
}

impl DefinedNames {
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Add a name; fails when the name already exists in the same scope
    pub fn define(&mut self, name: DefinedName) -> Result<()> {
        if !name.is_builtin() {
            validate_name(&name.name)?;
        }
        let key = Self::make_key(&name.name, name.scope);
        if self.names.contains_key(&key) {
            return Err(Error::DuplicateName(name.name));
        }
        self.names.insert(key, name);
        Ok(())
    }

    /// Add or replace a name
    pub fn define_or_update(&mut self, name: DefinedName) -> Result<()> {
        if !name.is_builtin() {
            validate_name(&name.name)?;
        }
        self.names.insert(Self::make_key(&name.name, name.scope), name);
        Ok(())
    }

    /// Resolve a name as seen from `current_sheet`: a sheet-scoped name wins
    /// over a workbook-scoped one
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&DefinedName> {
        self.get_exact(name, NameScope::Sheet(current_sheet))
            .or_else(|| self.get_exact(name, NameScope::Workbook))
    }

    /// Look up a name in exactly one scope
    pub fn get_exact(&self, name: &str, scope: NameScope) -> Option<&DefinedName> {
        self.names.get(&Self::make_key(name, scope))
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Result<DefinedName> {
        self.names
            .remove(&Self::make_key(name, scope))
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str, scope: NameScope) -> bool {
        self.names.contains_key(&Self::make_key(name, scope))
    }

    /// Iterate in (lowercase name, scope) order
    pub fn iter(&self) -> impl Iterator<Item = &DefinedName> {
        self.names.values()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn workbook_names(&self) -> impl Iterator<Item = &DefinedName> {
        self.names
            .values()
            .filter(|n| matches!(n.scope, NameScope::Workbook))
    }

    pub fn sheet_names(&self, sheet_index: usize) -> impl Iterator<Item = &DefinedName> {
        self.names
            .values()
            .filter(move |n| matches!(n.scope, NameScope::Sheet(idx) if idx == sheet_index))
    }

    fn remap_scopes(&mut self, f: impl Fn(usize) -> Option<usize>) {
        let old = std::mem::take(&mut self.names);
        for (_, mut name) in old {
            if let NameScope::Sheet(i) = name.scope {
                match f(i) {
                    Some(j) => name.scope = NameScope::Sheet(j),
                    None => continue,
                }
            }
            self.names.insert(Self::make_key(&name.name, name.scope), name);
        }
    }

    /// Drop names local to the removed sheet and shift later scopes down
    pub fn sheet_removed(&mut self, index: usize) {
        self.remap_scopes(|i| match i.cmp(&index) {
            std::cmp::Ordering::Less => Some(i),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(i - 1),
        });
    }

    /// Shift scopes at or after a newly inserted sheet
    pub fn sheet_inserted(&mut self, index: usize) {
        self.remap_scopes(|i| Some(if i >= index { i + 1 } else { i }));
    }

    /// Follow a sheet moved from `from` to `to`
    pub fn sheet_moved(&mut self, from: usize, to: usize) {
        self.remap_scopes(|i| {
            Some(if i == from {
                to
            } else if from < to && i > from && i <= to {
                i - 1
            } else if to < from && i >= to && i < from {
                i + 1
            } else {
                i
            })
        });
    }
}
