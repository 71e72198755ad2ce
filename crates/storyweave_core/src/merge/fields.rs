//! Field-level merge rules and the order-preserving list merge.
//!
//! # Invariants
//! - An imported `None` never clears an existing value.
//! - Titles are only overwritten by non-empty imported titles.
//! - `merge_lists` never removes or reorders ids unknown to the source list.

use crate::model::project::{
    Chapter, Character, CustomFields, EntityId, ProjectInfo, Scene, WorldElement,
};

/// Per-entity application of the overwrite-if-present rule.
pub trait MergeFields {
    /// Applies every field `imported` supplies onto `self`.
    ///
    /// Structural lists (chapter scene lists, scene reference lists) are
    /// reconciled by the merge engine, not here.
    fn merge_from(&mut self, imported: &Self);
}

/// Overwrites `target` when `imported` is present.
pub fn merge_field<T: Clone>(target: &mut Option<T>, imported: &Option<T>) {
    if let Some(value) = imported {
        *target = Some(value.clone());
    }
}

/// Overwrites `target` only with a present, non-empty title.
pub fn merge_title(target: &mut Option<String>, imported: &Option<String>) {
    if let Some(title) = imported.as_ref().filter(|title| !title.is_empty()) {
        *target = Some(title.clone());
    }
}

/// Overlays imported custom fields; other existing fields stay untouched.
pub fn merge_custom(target: &mut CustomFields, imported: &CustomFields) {
    for (name, value) in imported {
        target.insert(name.clone(), value.clone());
    }
}

/// Inserts the ids of `source` missing from `target`, order-preserving.
///
/// Walks `source` with an insertion cursor: an id already in `target` moves
/// the cursor behind it, a missing id is inserted at the cursor.
pub fn merge_lists(source: &[EntityId], target: &mut Vec<EntityId>) {
    let mut cursor = 0;
    for id in source {
        match target.iter().position(|existing| existing == id) {
            Some(index) => cursor = index + 1,
            None => {
                target.insert(cursor, id.clone());
                cursor += 1;
            }
        }
    }
}

impl MergeFields for ProjectInfo {
    fn merge_from(&mut self, imported: &Self) {
        merge_title(&mut self.title, &imported.title);
        merge_field(&mut self.desc, &imported.desc);
        merge_field(&mut self.author_name, &imported.author_name);
        merge_custom(&mut self.custom, &imported.custom);
    }
}

impl MergeFields for WorldElement {
    fn merge_from(&mut self, imported: &Self) {
        merge_title(&mut self.title, &imported.title);
        merge_field(&mut self.desc, &imported.desc);
        merge_field(&mut self.aka, &imported.aka);
        merge_field(&mut self.tags, &imported.tags);
        merge_custom(&mut self.custom, &imported.custom);
    }
}

impl MergeFields for Character {
    fn merge_from(&mut self, imported: &Self) {
        merge_title(&mut self.title, &imported.title);
        merge_field(&mut self.desc, &imported.desc);
        merge_field(&mut self.aka, &imported.aka);
        merge_field(&mut self.tags, &imported.tags);
        merge_field(&mut self.notes, &imported.notes);
        merge_field(&mut self.bio, &imported.bio);
        merge_field(&mut self.goals, &imported.goals);
        merge_field(&mut self.full_name, &imported.full_name);
        merge_field(&mut self.is_major, &imported.is_major);
        merge_custom(&mut self.custom, &imported.custom);
    }
}

impl MergeFields for Scene {
    fn merge_from(&mut self, imported: &Self) {
        merge_title(&mut self.title, &imported.title);
        merge_field(&mut self.desc, &imported.desc);
        merge_field(&mut self.content, &imported.content);
        merge_field(&mut self.notes, &imported.notes);
        merge_field(&mut self.tags, &imported.tags);
        merge_field(&mut self.status, &imported.status);
        merge_field(&mut self.when, &imported.when);
        merge_field(&mut self.lasts_days, &imported.lasts_days);
        merge_field(&mut self.lasts_hours, &imported.lasts_hours);
        merge_field(&mut self.lasts_minutes, &imported.lasts_minutes);
        merge_field(&mut self.is_notes_scene, &imported.is_notes_scene);
        merge_field(&mut self.is_todo_scene, &imported.is_todo_scene);
        merge_field(&mut self.is_unused, &imported.is_unused);
        merge_custom(&mut self.custom, &imported.custom);
    }
}

impl MergeFields for Chapter {
    fn merge_from(&mut self, imported: &Self) {
        merge_title(&mut self.title, &imported.title);
        merge_field(&mut self.desc, &imported.desc);
        merge_field(&mut self.level, &imported.level);
        merge_field(&mut self.kind, &imported.kind);
        merge_field(&mut self.is_unused, &imported.is_unused);
        merge_custom(&mut self.custom, &imported.custom);
    }
}
