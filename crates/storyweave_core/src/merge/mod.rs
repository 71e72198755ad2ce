//! Non-destructive merge of an imported document into an existing one.
//!
//! # Responsibility
//! - Apply every field the import supplies while keeping everything else.
//! - Reconcile chapter scene lists so imported scenes move, manual scenes stay.
//!
//! # Invariants
//! - Ids of existing entities are never renumbered.
//! - Chapters are never removed.
//! - The result passes `ProjectDocument::check_integrity`.

pub mod fields;
pub mod splitter;

use crate::merge::fields::{merge_lists, MergeFields};
use crate::model::project::{Collection, EntityId, IntegrityError, ProjectDocument};
use log::{error, info};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type MergeResult<T> = Result<T, MergeError>;

/// Merge failures; each one is a defect in the merge, not bad user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    DanglingReference {
        collection: &'static str,
        owner: String,
        id: EntityId,
    },
    Inconsistent(IntegrityError),
}

impl Display for MergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingReference {
                collection,
                owner,
                id,
            } => write!(
                f,
                "merge produced a dangling reference: {owner} references missing {collection} id `{id}`"
            ),
            Self::Inconsistent(err) => write!(f, "merge produced an inconsistent project: {err}"),
        }
    }
}

impl Error for MergeError {}

impl From<IntegrityError> for MergeError {
    fn from(value: IntegrityError) -> Self {
        match value {
            IntegrityError::DanglingReference {
                collection,
                owner,
                id,
            } => Self::DanglingReference {
                collection,
                owner,
                id,
            },
            other => Self::Inconsistent(other),
        }
    }
}

/// Merges `imported` into `existing` (or into an empty document when absent).
///
/// # Side effects
/// - Emits `merge` logging events; runs the scene splitter when imported
///   scenes carry content.
///
/// # Errors
/// - `DanglingReference` / `Inconsistent` when the merged document violates
///   its integrity invariants.
pub fn merge(
    existing: Option<ProjectDocument>,
    imported: &ProjectDocument,
) -> MergeResult<ProjectDocument> {
    let started_at = Instant::now();
    let had_existing = existing.is_some();
    let mut target = existing.unwrap_or_default();
    info!(
        "event=merge module=merge status=start existing={} imported_scenes={} imported_chapters={}",
        had_existing,
        imported.scenes.len(),
        imported.chapters.len()
    );

    target.locations = reconcile(std::mem::take(&mut target.locations), &imported.locations);
    target.items = reconcile(std::mem::take(&mut target.items), &imported.items);
    target.characters = reconcile(std::mem::take(&mut target.characters), &imported.characters);

    let new_scenes = merge_scenes(&mut target, imported);
    let has_content = imported.scenes.iter().any(|(_, scene)| scene.content.is_some());
    let new_chapters = merge_chapters(&mut target, imported);
    target.info.merge_from(&imported.info);
    prune_references(&mut target);

    let split = if has_content {
        splitter::split_scenes(&mut target)
    } else {
        0
    };

    match target.check_integrity() {
        Ok(()) => {
            info!(
                "event=merge module=merge status=ok new_scenes={} new_chapters={} split_scenes={} duration_ms={}",
                new_scenes,
                new_chapters,
                split,
                started_at.elapsed().as_millis()
            );
            Ok(target)
        }
        Err(err) => {
            error!(
                "event=merge module=merge status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

/// Rebuilds a world-element collection in imported order.
///
/// An empty import leaves the existing collection untouched; otherwise ids
/// missing from the import are dropped and existing data fills the fields
/// the import leaves empty.
fn reconcile<T>(existing: Collection<T>, imported: &Collection<T>) -> Collection<T>
where
    T: MergeFields + Default,
{
    if imported.is_empty() {
        return existing;
    }
    let mut previous = existing.into_records();
    let mut merged = Collection::new();
    for (id, record) in imported.iter() {
        let mut target = previous.remove(id).unwrap_or_default();
        target.merge_from(record);
        merged.insert(id.clone(), target);
    }
    merged
}

fn merge_scenes(target: &mut ProjectDocument, imported: &ProjectDocument) -> usize {
    let mut created = 0;
    for (id, scene) in imported.scenes.iter() {
        if !target.scenes.contains(id) {
            target.scenes.insert(id.clone(), Default::default());
            created += 1;
        }
        let characters = filter_refs(&scene.characters, &target.characters);
        let locations = filter_refs(&scene.locations, &target.locations);
        let items = filter_refs(&scene.items, &target.items);
        let Some(merged) = target.scenes.get_mut(id) else {
            continue;
        };
        merged.merge_from(scene);
        if characters.is_some() {
            merged.characters = characters;
        }
        if locations.is_some() {
            merged.locations = locations;
        }
        if items.is_some() {
            merged.items = items;
        }
    }
    created
}

fn filter_refs<T>(refs: &Option<Vec<EntityId>>, collection: &Collection<T>) -> Option<Vec<EntityId>> {
    refs.as_ref().map(|refs| {
        refs.iter()
            .filter(|id| collection.contains(id))
            .cloned()
            .collect()
    })
}

fn merge_chapters(target: &mut ProjectDocument, imported: &ProjectDocument) -> usize {
    let placement: HashMap<&EntityId, &EntityId> = imported
        .chapters
        .iter()
        .flat_map(|(chapter_id, chapter)| chapter.scenes.iter().map(move |scene| (scene, chapter_id)))
        .collect();

    // Scenes the import places elsewhere leave every other chapter.
    for chapter_id in target.chapters.order().to_vec() {
        if let Some(chapter) = target.chapters.get_mut(&chapter_id) {
            chapter.scenes.retain(|scene_id| {
                placement
                    .get(scene_id)
                    .map_or(true, |owner| **owner == chapter_id)
            });
        }
    }

    let mut order = target.chapters.order().to_vec();
    merge_lists(imported.chapters.order(), &mut order);

    let mut created = 0;
    for (id, chapter) in imported.chapters.iter() {
        if !target.chapters.contains(id) {
            target.chapters.insert(id.clone(), Default::default());
            created += 1;
        }
        if let Some(merged) = target.chapters.get_mut(id) {
            merged.merge_from(chapter);
            merge_lists(&chapter.scenes, &mut merged.scenes);
        }
    }
    target.chapters.set_order(order);
    created
}

/// Drops references to entities that no longer exist.
fn prune_references(document: &mut ProjectDocument) {
    let ProjectDocument {
        characters,
        locations,
        items,
        scenes,
        chapters,
        ..
    } = document;
    for scene in scenes.values_mut() {
        retain_known(&mut scene.characters, characters);
        retain_known(&mut scene.locations, locations);
        retain_known(&mut scene.items, items);
    }
    for chapter in chapters.values_mut() {
        chapter.scenes.retain(|id| scenes.contains(id));
    }
}

fn retain_known<T>(refs: &mut Option<Vec<EntityId>>, collection: &Collection<T>) {
    if let Some(list) = refs {
        list.retain(|id| collection.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::merge;
    use crate::model::project::{Chapter, ChapterKind, ProjectDocument, Scene};

    fn chapter(scenes: &[&str]) -> Chapter {
        Chapter {
            title: Some("Chapter".to_string()),
            kind: Some(ChapterKind::Normal),
            scenes: scenes.iter().map(|id| id.to_string()).collect(),
            ..Chapter::default()
        }
    }

    fn scene(title: &str) -> Scene {
        Scene {
            title: Some(title.to_string()),
            ..Scene::default()
        }
    }

    #[test]
    fn new_chapter_is_inserted_after_its_predecessor() {
        let mut existing = ProjectDocument::default();
        existing.scenes.insert("1", scene("One"));
        existing.chapters.insert("1", chapter(&["1"]));
        existing.chapters.insert("9", chapter(&[]));

        let mut imported = ProjectDocument::default();
        imported.scenes.insert("1", scene("One"));
        imported.chapters.insert("1", chapter(&["1"]));
        imported.chapters.insert("2", chapter(&[]));

        let merged = merge(Some(existing), &imported).unwrap();
        assert_eq!(merged.chapters.order(), ["1", "2", "9"]);
    }

    #[test]
    fn scene_placed_elsewhere_leaves_chapter_outside_import() {
        let mut existing = ProjectDocument::default();
        existing.scenes.insert("1", scene("One"));
        existing.chapters.insert("1", chapter(&[]));
        existing.chapters.insert("7", chapter(&["1"]));

        let mut imported = ProjectDocument::default();
        imported.scenes.insert("1", scene("One"));
        imported.chapters.insert("1", chapter(&["1"]));

        let merged = merge(Some(existing), &imported).unwrap();
        assert!(merged.chapters.get("7").unwrap().scenes.is_empty());
        assert_eq!(merged.chapters.get("1").unwrap().scenes, ["1"]);
    }
}
