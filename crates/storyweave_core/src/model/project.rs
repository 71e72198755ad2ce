//! Project document model.
//!
//! # Responsibility
//! - Define the chapter/scene/world-element records exchanged by the
//!   document builder, the merge engine, and the project codec.
//! - Keep display order in explicit sequences, never in map iteration.
//!
//! # Invariants
//! - Every id in an ordering sequence, a chapter scene list, or a scene
//!   reference list resolves within the corresponding collection.
//! - A scene carries either a specific date/time or a relative offset,
//!   never both (`SceneTime` makes the mix unrepresentable).
//! - `None` on a field means "not supplied"; the merge engine keeps the
//!   existing value for such fields.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Collection-local identifier (a stringified positive integer in practice).
pub type EntityId = String;

/// Named custom fields attached to an entity.
pub type CustomFields = BTreeMap<String, String>;

/// Keyed records plus the explicit ordering sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection<T> {
    records: HashMap<EntityId, T>,
    order: Vec<EntityId>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one record. New ids are appended to the ordering.
    pub fn insert(&mut self, id: impl Into<EntityId>, record: T) -> Option<T> {
        let id = id.into();
        if !self.records.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.records.insert(id, record)
    }

    /// Inserts a new record right after `anchor` in the ordering.
    ///
    /// Falls back to appending when `anchor` is not ordered.
    pub fn insert_after(&mut self, anchor: &str, id: impl Into<EntityId>, record: T) {
        let id = id.into();
        self.order.retain(|existing| existing != &id);
        let position = self
            .order
            .iter()
            .position(|existing| existing == anchor)
            .map_or(self.order.len(), |index| index + 1);
        self.order.insert(position, id.clone());
        self.records.insert(id, record);
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.order.retain(|existing| existing != id);
        self.records.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ordering sequence; authoritative for display order.
    pub fn order(&self) -> &[EntityId] {
        &self.order
    }

    /// Replaces the ordering sequence.
    ///
    /// Callers must keep the sequence a permutation of the record ids;
    /// `ProjectDocument::check_integrity` reports violations.
    pub fn set_order(&mut self, order: Vec<EntityId>) {
        self.order = order;
    }

    /// Records in ordering-sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).map(|record| (id, record)))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.values_mut()
    }

    /// Consumes the collection, returning records keyed by id.
    pub fn into_records(self) -> HashMap<EntityId, T> {
        self.records
    }

    fn first_unordered(&self) -> Option<&EntityId> {
        let ordered: HashSet<&EntityId> = self.order.iter().collect();
        self.records.keys().find(|id| !ordered.contains(id))
    }

    fn first_duplicate(&self) -> Option<&EntityId> {
        let mut seen = HashSet::new();
        self.order.iter().find(|id| !seen.insert(*id))
    }
}

/// Project-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectInfo {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub author_name: Option<String>,
    pub custom: CustomFields,
}

/// Location or item record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldElement {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub aka: Option<String>,
    pub tags: Option<Vec<String>>,
    pub custom: CustomFields,
}

/// Character record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Character {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub aka: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub bio: Option<String>,
    pub goals: Option<String>,
    pub full_name: Option<String>,
    pub is_major: Option<bool>,
    pub custom: CustomFields,
}

/// Point in story time of one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneTime {
    /// Calendar date (`YYYY-MM-DD`) plus time of day (`HH:MM:SS`).
    Specific { date: String, time: String },
    /// Offset relative to the story start; each part independently optional.
    Relative {
        day: Option<u32>,
        hour: Option<u32>,
        minute: Option<u32>,
    },
}

/// Scene classification derived from flags and chapter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    Outline = 1,
    Draft = 2,
    FirstEdit = 3,
    SecondEdit = 4,
    Done = 5,
}

impl SceneStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Outline),
            2 => Some(Self::Draft),
            3 => Some(Self::FirstEdit),
            4 => Some(Self::SecondEdit),
            5 => Some(Self::Done),
            _ => None,
        }
    }
}

/// Scene record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scene {
    pub title: Option<String>,
    pub desc: Option<String>,
    /// Narrative body text; opaque to the core.
    pub content: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<SceneStatus>,
    pub when: Option<SceneTime>,
    pub lasts_days: Option<u64>,
    pub lasts_hours: Option<u32>,
    pub lasts_minutes: Option<u32>,
    pub is_notes_scene: Option<bool>,
    pub is_todo_scene: Option<bool>,
    pub is_unused: Option<bool>,
    pub characters: Option<Vec<EntityId>>,
    pub locations: Option<Vec<EntityId>>,
    pub items: Option<Vec<EntityId>>,
    pub custom: CustomFields,
}

/// Chapter nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterLevel {
    /// Level 0: ordinary chapter holding scenes.
    Chapter,
    /// Level 1: part heading grouping the chapters after it.
    Part,
}

/// Chapter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterKind {
    Normal,
    Notes,
    Todo,
    Trash,
}

/// Chapter record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chapter {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub level: Option<ChapterLevel>,
    pub kind: Option<ChapterKind>,
    pub is_unused: Option<bool>,
    /// Ordered scene ids.
    pub scenes: Vec<EntityId>,
    pub custom: CustomFields,
}

/// Integrity violations of a project document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// A sequence or reference list names an id missing from its collection.
    DanglingReference {
        collection: &'static str,
        owner: String,
        id: EntityId,
    },
    /// A record is missing from its collection ordering, or listed twice.
    OrderMismatch {
        collection: &'static str,
        id: EntityId,
    },
    /// The persisted format requires at least one chapter.
    NoChapters,
}

impl Display for IntegrityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingReference {
                collection,
                owner,
                id,
            } => write!(f, "{owner} references missing {collection} id `{id}`"),
            Self::OrderMismatch { collection, id } => {
                write!(f, "{collection} ordering does not match records at id `{id}`")
            }
            Self::NoChapters => write!(f, "project has no chapters"),
        }
    }
}

impl Error for IntegrityError {}

/// The persisted target document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectDocument {
    pub info: ProjectInfo,
    pub locations: Collection<WorldElement>,
    pub items: Collection<WorldElement>,
    pub characters: Collection<Character>,
    /// Ordering is storage order; display order comes from chapter lists.
    pub scenes: Collection<Scene>,
    pub chapters: Collection<Chapter>,
}

impl ProjectDocument {
    /// Returns the first chapter (in chapter order) listing `scene_id`.
    pub fn chapter_of(&self, scene_id: &str) -> Option<&EntityId> {
        self.chapters
            .iter()
            .find(|(_, chapter)| chapter.scenes.iter().any(|id| id == scene_id))
            .map(|(id, _)| id)
    }

    /// Propagates chapter type and unused flags down to member scenes.
    ///
    /// Todo chapters make their scenes todo+unused, notes chapters make them
    /// notes+unused, and unused chapters make them unused.
    pub fn inherit_chapter_flags(&mut self) {
        let mut updates = Vec::new();
        for (_, chapter) in self.chapters.iter() {
            let kind = chapter.kind.unwrap_or(ChapterKind::Normal);
            let unused = chapter.is_unused.unwrap_or(false);
            for scene_id in &chapter.scenes {
                updates.push((scene_id.clone(), kind, unused));
            }
        }
        for (scene_id, kind, unused) in updates {
            let Some(scene) = self.scenes.get_mut(&scene_id) else {
                continue;
            };
            match kind {
                ChapterKind::Todo => {
                    scene.is_todo_scene = Some(true);
                    scene.is_unused = Some(true);
                }
                ChapterKind::Notes => {
                    scene.is_notes_scene = Some(true);
                    scene.is_unused = Some(true);
                }
                ChapterKind::Normal | ChapterKind::Trash if unused => {
                    scene.is_unused = Some(true);
                }
                ChapterKind::Normal | ChapterKind::Trash => {}
            }
        }
    }

    /// Verifies ordering and reference invariants.
    ///
    /// # Errors
    /// - `OrderMismatch` when an ordering is not a permutation of the records.
    /// - `DanglingReference` when a chapter or scene names a missing id.
    /// - `NoChapters` when the chapter collection is empty.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        check_order(&self.locations, "location")?;
        check_order(&self.items, "item")?;
        check_order(&self.characters, "character")?;
        check_order(&self.scenes, "scene")?;
        check_order(&self.chapters, "chapter")?;

        if self.chapters.is_empty() {
            return Err(IntegrityError::NoChapters);
        }

        for (chapter_id, chapter) in self.chapters.iter() {
            for scene_id in &chapter.scenes {
                if !self.scenes.contains(scene_id) {
                    return Err(IntegrityError::DanglingReference {
                        collection: "scene",
                        owner: format!("chapter {chapter_id}"),
                        id: scene_id.clone(),
                    });
                }
            }
        }

        for (scene_id, scene) in self.scenes.iter() {
            check_refs(&scene.characters, &self.characters, "character", scene_id)?;
            check_refs(&scene.locations, &self.locations, "location", scene_id)?;
            check_refs(&scene.items, &self.items, "item", scene_id)?;
        }
        Ok(())
    }
}

fn check_order<T>(collection: &Collection<T>, name: &'static str) -> Result<(), IntegrityError> {
    if let Some(id) = collection.order().iter().find(|id| !collection.contains(id)) {
        return Err(IntegrityError::DanglingReference {
            collection: name,
            owner: format!("{name} ordering"),
            id: id.clone(),
        });
    }
    if let Some(id) = collection
        .first_duplicate()
        .or_else(|| collection.first_unordered())
    {
        return Err(IntegrityError::OrderMismatch {
            collection: name,
            id: id.clone(),
        });
    }
    Ok(())
}

fn check_refs<T>(
    refs: &Option<Vec<EntityId>>,
    target: &Collection<T>,
    name: &'static str,
    scene_id: &str,
) -> Result<(), IntegrityError> {
    let Some(refs) = refs else {
        return Ok(());
    };
    match refs.iter().find(|id| !target.contains(id)) {
        Some(id) => Err(IntegrityError::DanglingReference {
            collection: name,
            owner: format!("scene {scene_id}"),
            id: id.clone(),
        }),
        None => Ok(()),
    }
}
