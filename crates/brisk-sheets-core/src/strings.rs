//! Shared string table

use std::sync::Arc;

use ahash::AHashMap;

/// Index of a string in a [`SharedStringTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

impl StringId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Two-way string pool with insertion-ordered ids.
///
/// Not thread-safe; the workbook owns it and serializes access.
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    strings: Vec<Arc<str>>,
    index: AHashMap<Arc<str>, StringId>,
    /// Verbatim `<si>` bodies of rich-text entries read from a source file
    rich: AHashMap<StringId, Box<[u8]>>,
    total: u64,
}

impl SharedStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a table from a source part, keeping each entry at its source
    /// index even when the source repeats a string
    pub fn from_source<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for s in entries {
            let value: Arc<str> = Arc::from(s.as_ref());
            let id = StringId(table.strings.len() as u32);
            table.index.entry(Arc::clone(&value)).or_insert(id);
            table.strings.push(value);
        }
        table
    }

    /// Return the id for `s`, appending it on first sight
    pub fn intern(&mut self, s: &str) -> StringId {
        self.intern_reporting(s).0
    }

    /// Like [`intern`](Self::intern), also reporting whether `s` was new
    pub fn intern_reporting(&mut self, s: &str) -> (StringId, bool) {
        self.total += 1;
        if let Some(&id) = self.index.get(s) {
            return (id, false);
        }
        let id = StringId(self.strings.len() as u32);
        let value: Arc<str> = Arc::from(s);
        self.index.insert(Arc::clone(&value), id);
        self.strings.push(value);
        (id, true)
    }

    /// The string behind an id
    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.index()).map(|s| &**s)
    }

    /// Inverse lookup without inserting
    pub fn find(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Number of `intern` calls, hits included
    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// Iterate in id order
    pub fn iter(&self) -> impl Iterator<Item = (StringId, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (StringId(i as u32), &**s))
    }

    /// Keep the original markup of a rich-text entry so it can be written
    /// back unchanged
    pub fn set_rich_markup(&mut self, id: StringId, body: Vec<u8>) {
        self.rich.insert(id, body.into_boxed_slice());
    }

    /// Original markup of a rich-text entry
    pub fn rich_markup(&self, id: StringId) -> Option<&[u8]> {
        self.rich.get(&id).map(|b| &**b)
    }
}
