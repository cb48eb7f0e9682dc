//! Typed change events.
//!
//! Every event that flows through a pass is a [`Change`] about exactly one
//! [`Payload`]. Payload types form a closed set; stages declare the subsets they
//! consume and produce as [`PayloadSet`]s.

use crate::error::ChangeError;
use crate::vault::{Document, InternalLink};
use serde_yaml::Value;
use std::fmt;
use std::sync::Arc;

/// Kinds of payload that can travel in a changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadType {
    /// The vault root. A change to it means "everything may have changed".
    Vault,
    Folder,
    Document,
    /// A wiki link from one document to another.
    Link,
    /// A front-matter attribute written by a stage.
    Attribute,
}

impl PayloadType {
    pub const ALL: [PayloadType; 5] = [
        PayloadType::Vault,
        PayloadType::Folder,
        PayloadType::Document,
        PayloadType::Link,
        PayloadType::Attribute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadType::Vault => "Vault",
            PayloadType::Folder => "Folder",
            PayloadType::Document => "Document",
            PayloadType::Link => "Link",
            PayloadType::Attribute => "Attribute",
        }
    }

    pub fn is_reserved(&self) -> bool {
        PayloadSet::RESERVED.contains(*self)
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of payload types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PayloadSet(u8);

impl PayloadSet {
    /// Types owned by the vault itself: consumable by every stage, producible by none.
    pub const RESERVED: PayloadSet = PayloadSet(
        PayloadType::Vault.bit() | PayloadType::Folder.bit() | PayloadType::Document.bit(),
    );

    pub const fn empty() -> Self {
        PayloadSet(0)
    }

    pub fn of(types: &[PayloadType]) -> Self {
        types.iter().fold(Self::empty(), |set, t| set.with(*t))
    }

    pub const fn with(self, payload_type: PayloadType) -> Self {
        PayloadSet(self.0 | payload_type.bit())
    }

    pub fn contains(&self, payload_type: PayloadType) -> bool {
        self.0 & payload_type.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(&self, other: PayloadSet) -> PayloadSet {
        PayloadSet(self.0 | other.0)
    }

    pub fn intersection(&self, other: PayloadSet) -> PayloadSet {
        PayloadSet(self.0 & other.0)
    }

    pub fn difference(&self, other: PayloadSet) -> PayloadSet {
        PayloadSet(self.0 & !other.0)
    }

    pub fn is_subset_of(&self, other: PayloadSet) -> bool {
        self.difference(other).is_empty()
    }

    pub fn intersects(&self, other: PayloadSet) -> bool {
        !self.intersection(other).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PayloadType> + '_ {
        PayloadType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

impl FromIterator<PayloadType> for PayloadSet {
    fn from_iter<I: IntoIterator<Item = PayloadType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, t| set.with(t))
    }
}

impl fmt::Debug for PayloadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for PayloadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|t| t.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// A key/value pair a stage wrote into a document's front matter.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub document: Arc<str>,
    pub key: String,
    pub value: Value,
}

/// The value carried by a change.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Vault,
    /// Vault-relative folder path, `""` for the root.
    Folder(Arc<str>),
    Document(Arc<Document>),
    Link(InternalLink),
    Attribute(Attribute),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Vault => PayloadType::Vault,
            Payload::Folder(_) => PayloadType::Folder,
            Payload::Document(_) => PayloadType::Document,
            Payload::Link(_) => PayloadType::Link,
            Payload::Attribute(_) => PayloadType::Attribute,
        }
    }

    pub fn as_document(&self) -> Option<&Arc<Document>> {
        match self {
            Payload::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&str> {
        match self {
            Payload::Folder(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&InternalLink> {
        match self {
            Payload::Link(link) => Some(link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// An event about exactly one value.
///
/// `Update` may lack the previous value when the producer does not know it.
/// The payload type of `old` and `new` is always the same.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create(Payload),
    Update { old: Option<Payload>, new: Payload },
    Delete(Payload),
}

impl Change {
    pub fn create(value: Payload) -> Self {
        Change::Create(value)
    }

    pub fn update(old: Payload, new: Payload) -> Self {
        debug_assert_eq!(old.payload_type(), new.payload_type());
        Change::Update {
            old: Some(old),
            new,
        }
    }

    /// An update whose previous value is unknown.
    pub fn touch(new: Payload) -> Self {
        Change::Update { old: None, new }
    }

    pub fn delete(value: Payload) -> Self {
        Change::Delete(value)
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Create(_) => ChangeKind::Create,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete(_) => ChangeKind::Delete,
        }
    }

    pub fn payload_type(&self) -> PayloadType {
        self.value().payload_type()
    }

    /// The most relevant value: the new one for create and update, the old
    /// one for delete.
    pub fn value(&self) -> &Payload {
        match self {
            Change::Create(value) | Change::Delete(value) => value,
            Change::Update { new, .. } => new,
        }
    }

    pub fn new_value(&self) -> Result<&Payload, ChangeError> {
        match self {
            Change::Create(value) => Ok(value),
            Change::Update { new, .. } => Ok(new),
            Change::Delete(_) => Err(ChangeError::NoNewValue(ChangeKind::Delete)),
        }
    }

    pub fn old_value(&self) -> Result<&Payload, ChangeError> {
        match self {
            Change::Create(_) => Err(ChangeError::NoPreviousValue(ChangeKind::Create)),
            Change::Update { old: Some(old), .. } => Ok(old),
            Change::Update { old: None, .. } => {
                Err(ChangeError::NoPreviousValue(ChangeKind::Update))
            }
            Change::Delete(value) => Ok(value),
        }
    }

    pub fn is_of(&self, payload_type: PayloadType) -> bool {
        self.payload_type() == payload_type
    }
}
