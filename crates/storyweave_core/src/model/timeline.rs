//! Timeline source model.
//!
//! # Responsibility
//! - Hold the flat entity table and narrative tree produced by a source
//!   reader, independent of the reader's on-disk format.
//!
//! # Invariants
//! - Records are immutable after reading and discarded after assembly.
//! - `entities` keeps source table order; downstream id assignment relies on it.

use crate::timeline::datetime::{CanonicalDateTime, DurationComponents};
use std::collections::{BTreeMap, HashMap};

/// Opaque source identity (GUID for project files, row number for tables).
pub type SourceId = String;

/// Semantic role of a source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Event,
    Character,
    Location,
    Item,
    NarrativeContainer,
    /// Type not mapped to any role; kept as raw data only.
    Unknown,
}

/// Which reader produced a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Embedded JSON document with a nested narrative tree.
    ProjectFile,
    /// Tabular export with dotted position strings.
    Table,
}

/// One record from the source table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimelineEntity {
    pub id: SourceId,
    /// Declared type marker, resolved through `TypeDictionary`.
    pub type_marker: String,
    pub label: String,
    pub summary: Option<String>,
    pub notes: Option<String>,
    pub aka: Option<String>,
    pub bio: Option<String>,
    pub start: Option<CanonicalDateTime>,
    pub end: Option<CanonicalDateTime>,
    pub duration: Option<DurationComponents>,
    pub tags: Vec<String>,
    /// Character references, viewpoint first when the source names one.
    ///
    /// `None` when the source has no such field at all.
    pub participants: Option<Vec<SourceId>>,
    pub locations: Option<Vec<SourceId>>,
    pub items: Option<Vec<SourceId>>,
    /// Raw position text such as `Chapter 2.3` (tabular sources only).
    pub position: Option<String>,
    /// Source fields not consumed above, keyed by field name.
    pub extra: BTreeMap<String, String>,
}

/// Tree node referencing an entity by source id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NarrativeNode {
    pub id: SourceId,
    pub children: Vec<NarrativeNode>,
}

/// Source-defined mapping from type markers to roles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeDictionary {
    roles: HashMap<String, EntityKind>,
}

impl TypeDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, marker: impl Into<String>, kind: EntityKind) {
        self.roles.insert(marker.into(), kind);
    }

    /// Resolves a marker; unmapped markers are `Unknown`.
    pub fn kind_of(&self, marker: &str) -> EntityKind {
        self.roles
            .get(marker)
            .copied()
            .unwrap_or(EntityKind::Unknown)
    }

    pub fn has_role(&self, kind: EntityKind) -> bool {
        self.roles.values().any(|role| *role == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Everything a reader extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineSource {
    pub format: SourceFormat,
    pub entities: Vec<TimelineEntity>,
    pub types: TypeDictionary,
    /// Narrative roots; empty for tabular sources.
    pub narrative: Vec<NarrativeNode>,
}
