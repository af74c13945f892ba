//! Content-addressed pool of format descriptors

use std::hash::{Hash, Hasher};

use ahash::AHashMap;

use super::FormatDescriptor;
use crate::error::{Error, Result};

/// Index of a descriptor in a [`FormatRepository`]; equals its position in
/// the `cellXfs` table on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StyleId(pub u32);

impl StyleId {
    /// The all-defaults style
    pub const DEFAULT: StyleId = StyleId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interning counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryStats {
    /// Calls to `intern`
    pub requests: u64,
    /// Calls answered with an existing id
    pub hits: u64,
    /// Calls that added a descriptor
    pub unique: u64,
}

impl RepositoryStats {
    /// Fraction of requests answered from the pool
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }
}

/// Styles part of a workbook opened for edit, kept so an untouched styles
/// part can be written back byte for byte.
#[derive(Debug, Clone, Default)]
pub struct CopiedStyles {
    /// The original `xl/styles.xml` bytes
    pub part: Vec<u8>,
    /// Number of `cellXfs` records in the source; ids below this are source
    /// indices
    pub source_len: u32,
    /// Top-level fragments of the source part that are not modeled
    /// (`cellStyleXfs`, `cellStyles`, `dxfs`, ...), keyed by element name
    pub fragments: Vec<(String, Vec<u8>)>,
}

impl CopiedStyles {
    /// Raw bytes of a preserved fragment
    pub fn fragment(&self, name: &str) -> Option<&[u8]> {
        self.fragments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_slice())
    }
}

/// Pool owning every descriptor of a workbook.
///
/// `intern` returns the same [`StyleId`] for structurally equal descriptors;
/// ids are assigned in insertion order and never reused. Id 0 always holds
/// the default descriptor.
#[derive(Debug, Clone)]
pub struct FormatRepository {
    descriptors: Vec<FormatDescriptor>,
    by_hash: AHashMap<u64, Vec<StyleId>>,
    stats: RepositoryStats,
    copied: Option<CopiedStyles>,
}

fn structural_hash(descriptor: &FormatDescriptor) -> u64 {
    let mut hasher = ahash::AHasher::default();
    descriptor.hash(&mut hasher);
    hasher.finish()
}

impl FormatRepository {
    /// Create a repository holding only the default descriptor
    pub fn new() -> Self {
        let mut repo = Self {
            descriptors: Vec::with_capacity(64),
            by_hash: AHashMap::with_capacity(64),
            stats: RepositoryStats::default(),
            copied: None,
        };
        repo.push(FormatDescriptor::default());
        repo
    }

    /// Rebuild a repository from a source workbook's `cellXfs` table.
    ///
    /// Every source record keeps its index as its id, duplicates included, so
    /// cells of untouched sheets stay valid. Later `intern` calls resolve to
    /// the first matching record.
    pub fn from_source(descriptors: Vec<FormatDescriptor>, copied: Option<CopiedStyles>) -> Self {
        let mut repo = Self {
            descriptors: Vec::with_capacity(descriptors.len().max(1)),
            by_hash: AHashMap::with_capacity(descriptors.len()),
            stats: RepositoryStats::default(),
            copied,
        };
        for d in descriptors {
            repo.push(d);
        }
        if repo.descriptors.is_empty() {
            repo.push(FormatDescriptor::default());
        }
        repo
    }

    fn push(&mut self, descriptor: FormatDescriptor) -> StyleId {
        let id = StyleId(self.descriptors.len() as u32);
        self.by_hash
            .entry(structural_hash(&descriptor))
            .or_default()
            .push(id);
        self.descriptors.push(descriptor);
        id
    }

    fn find(&self, descriptor: &FormatDescriptor, hash: u64) -> Option<StyleId> {
        self.by_hash.get(&hash)?.iter().copied().find(|id| {
            self.descriptors
                .get(id.index())
                .map_or(false, |d| d == descriptor)
        })
    }

    /// Return the id of `descriptor`, adding it on first sight
    pub fn intern(&mut self, descriptor: FormatDescriptor) -> StyleId {
        self.intern_reporting(descriptor).0
    }

    /// Like [`intern`](Self::intern), also reporting whether the descriptor
    /// was new
    pub fn intern_reporting(&mut self, descriptor: FormatDescriptor) -> (StyleId, bool) {
        self.stats.requests += 1;
        let hash = structural_hash(&descriptor);
        if let Some(id) = self.find(&descriptor, hash) {
            self.stats.hits += 1;
            return (id, false);
        }
        self.stats.unique += 1;
        let id = StyleId(self.descriptors.len() as u32);
        self.by_hash.entry(hash).or_default().push(id);
        self.descriptors.push(descriptor);
        (id, true)
    }

    /// Look up an id without counting a request
    pub fn lookup(&self, descriptor: &FormatDescriptor) -> Option<StyleId> {
        self.find(descriptor, structural_hash(descriptor))
    }

    /// The descriptor behind an id
    pub fn get(&self, id: StyleId) -> Result<&FormatDescriptor> {
        self.descriptors
            .get(id.index())
            .ok_or(Error::StyleNotFound(id.0))
    }

    /// The default descriptor's id
    pub fn default_id(&self) -> StyleId {
        StyleId::DEFAULT
    }

    /// The default descriptor
    pub fn default_descriptor(&self) -> &FormatDescriptor {
        &self.descriptors[0]
    }

    /// Number of descriptors, including the default
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Always false; the default descriptor is always present
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate in id order, which is emission order
    pub fn iter(&self) -> impl Iterator<Item = (StyleId, &FormatDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (StyleId(i as u32), d))
    }

    /// Interning counters
    pub fn stats(&self) -> RepositoryStats {
        self.stats
    }

    /// Number of distinct descriptors added through `intern`
    pub fn unique_count(&self) -> u64 {
        self.stats.unique
    }

    /// The source styles kept for edit-mode re-emission
    pub fn copied_styles(&self) -> Option<&CopiedStyles> {
        self.copied.as_ref()
    }

    /// Source `cellXfs` index of an id, when the id came from the source
    pub fn source_index(&self, id: StyleId) -> Option<u32> {
        self.copied
            .as_ref()
            .filter(|c| id.0 < c.source_len)
            .map(|_| id.0)
    }

    /// Whether nothing was added since the source styles were loaded, so the
    /// original part still describes every id
    pub fn matches_source(&self) -> bool {
        self.copied
            .as_ref()
            .map_or(false, |c| c.source_len as usize == self.descriptors.len())
    }

    /// Whether a number in a cell with this style reads as a date
    pub fn is_date_style(&self, id: StyleId) -> bool {
        self.descriptors
            .get(id.index())
            .map_or(false, FormatDescriptor::is_date)
    }
}

impl Default for FormatRepository {
    fn default() -> Self {
        Self::new()
    }
}
