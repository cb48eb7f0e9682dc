use crate::change::{Change, Payload, PayloadSet, PayloadType};
use std::sync::Arc;

/// Ordered, immutable log of changes.
///
/// Clones share the backing storage, so handing a changelog to several
/// consumers is cheap. Changes are never merged or deduplicated.
#[derive(Debug, Clone)]
pub struct Changelog {
    changes: Arc<[Change]>,
}

impl Default for Changelog {
    fn default() -> Self {
        Vec::new().into()
    }
}

impl Changelog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(change: Change) -> Self {
        Self {
            changes: Arc::from(vec![change]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn changes_of(&self, payload_type: PayloadType) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.is_of(payload_type))
    }

    pub fn contains(&self, payload_type: PayloadType) -> bool {
        self.changes.iter().any(|c| c.is_of(payload_type))
    }

    /// Payload types present in this changelog.
    pub fn payload_types(&self) -> PayloadSet {
        self.changes.iter().map(Change::payload_type).collect()
    }

    /// The sub-log of changes whose payload type is in `types`, order preserved.
    pub fn filter(&self, types: PayloadSet) -> Changelog {
        if self.payload_types().is_subset_of(types) {
            return self.clone();
        }
        self.changes
            .iter()
            .filter(|c| types.contains(c.payload_type()))
            .cloned()
            .collect()
    }

    /// Concatenation; an empty operand yields the other one unchanged.
    pub fn append(&self, other: &Changelog) -> Changelog {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        self.changes
            .iter()
            .chain(other.changes.iter())
            .cloned()
            .collect()
    }

    /// Whether both changelogs share the same storage.
    pub fn ptr_eq(&self, other: &Changelog) -> bool {
        Arc::ptr_eq(&self.changes, &other.changes)
    }
}

impl From<Vec<Change>> for Changelog {
    fn from(changes: Vec<Change>) -> Self {
        Self {
            changes: Arc::from(changes),
        }
    }
}

impl FromIterator<Change> for Changelog {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl PartialEq for Changelog {
    fn eq(&self, other: &Self) -> bool {
        self.changes[..] == other.changes[..]
    }
}

/// Accumulates the changes a stage emits during one run.
#[derive(Debug, Default)]
pub struct ChangeCollector {
    changes: Vec<Change>,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn create(&mut self, value: Payload) {
        self.add(Change::create(value));
    }

    pub fn update(&mut self, old: Payload, new: Payload) {
        self.add(Change::update(old, new));
    }

    /// Update without a known previous value.
    pub fn touch(&mut self, new: Payload) {
        self.add(Change::touch(new));
    }

    pub fn delete(&mut self, value: Payload) {
        self.add(Change::delete(value));
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changelog(self) -> Changelog {
        self.changes.into()
    }
}
