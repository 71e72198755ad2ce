//! Imported project document construction.
//!
//! # Responsibility
//! - Turn classified records plus the assembled structure into a
//!   `ProjectDocument` ready to merge.
//!
//! # Invariants
//! - Fields the source does not supply stay `None`, so merging keeps the
//!   existing value.
//! - Scene reference lists only hold ids assigned by the classifier.

use crate::config::ImportConfig;
use crate::model::project::{
    Chapter, Character, CustomFields, EntityId, ProjectDocument, Scene, SceneStatus, SceneTime,
    WorldElement,
};
use crate::model::timeline::{EntityKind, SourceId, TimelineEntity};
use crate::timeline::assemble::Assembly;
use crate::timeline::classify::Classification;
use crate::timeline::datetime::{elapsed, elapsed_from_components, ElapsedTime};
use crate::timeline::{SourceError, SourceResult};
use std::collections::HashSet;

/// Builds the imported document.
///
/// # Errors
/// - `InvalidData` when a duration cannot be resolved against its start date.
pub fn build_document(
    classification: &Classification<'_>,
    assembly: &Assembly,
    config: &ImportConfig,
) -> SourceResult<ProjectDocument> {
    let custom = &config.custom_fields;
    let mut document = ProjectDocument::default();

    for entry in classification.of_kind(EntityKind::Character) {
        let Some(id) = entry.local_id.clone() else {
            continue;
        };
        let entity = entry.entity;
        document.characters.insert(
            id,
            Character {
                title: Some(entity.label.clone()),
                desc: entity.summary.clone(),
                aka: entity.aka.clone(),
                tags: non_empty(&entity.tags),
                notes: entity.notes.clone(),
                bio: entity.bio.clone(),
                custom: pick_custom(entity, &custom.character),
                ..Character::default()
            },
        );
    }

    for (kind, names) in [
        (EntityKind::Location, &custom.location),
        (EntityKind::Item, &custom.item),
    ] {
        for entry in classification.of_kind(kind) {
            let Some(id) = entry.local_id.clone() else {
                continue;
            };
            let entity = entry.entity;
            let element = WorldElement {
                title: Some(entity.label.clone()),
                desc: entity.summary.clone(),
                aka: entity.aka.clone(),
                tags: non_empty(&entity.tags),
                custom: pick_custom(entity, names),
            };
            match kind {
                EntityKind::Location => document.locations.insert(id, element),
                _ => document.items.insert(id, element),
            };
        }
    }

    let unassigned: HashSet<&EntityId> = assembly.unassigned.iter().collect();
    for entry in classification.of_kind(EntityKind::Event) {
        let Some(id) = entry.local_id.clone() else {
            continue;
        };
        let is_notes = unassigned.contains(&id);
        let scene = build_scene(entry.entity, classification, is_notes, &custom.scene)?;
        document.scenes.insert(id, scene);
    }

    for assembled in &assembly.chapters {
        document.chapters.insert(
            assembled.id.clone(),
            Chapter {
                title: Some(assembled.title.clone()),
                desc: assembled.desc.clone(),
                level: Some(assembled.level),
                kind: Some(assembled.kind),
                is_unused: None,
                scenes: assembled.scenes.clone(),
                custom: CustomFields::new(),
            },
        );
    }

    Ok(document)
}

fn build_scene(
    entity: &TimelineEntity,
    classification: &Classification<'_>,
    is_notes: bool,
    custom_names: &[String],
) -> SourceResult<Scene> {
    let when = entity.start.map(|start| SceneTime::Specific {
        date: start.date_text(),
        time: start.time_text(),
    });

    let lasts = match (entity.start, entity.end, entity.duration) {
        (Some(start), Some(end), _) => Some(elapsed(&start, &end)),
        (Some(start), None, Some(components)) => Some(
            elapsed_from_components(&start, &components)
                .map_err(|err| SourceError::InvalidData(format!("duration of {}: {err}", entity.label)))?,
        ),
        (None, _, Some(components)) => Some(ElapsedTime::folded(
            clamp(components.weeks.saturating_mul(7).saturating_add(components.days)),
            clamp(components.hours),
            clamp(components.minutes),
        )),
        _ => None,
    };

    Ok(Scene {
        title: Some(entity.label.clone()),
        desc: entity.summary.clone(),
        notes: entity.notes.clone(),
        tags: non_empty(&entity.tags),
        status: Some(SceneStatus::Outline),
        when,
        lasts_days: lasts.map(|value| value.days),
        lasts_hours: lasts.map(|value| value.hours),
        lasts_minutes: lasts.map(|value| value.minutes),
        is_notes_scene: Some(is_notes),
        is_unused: Some(is_notes),
        characters: resolve(&entity.participants, classification, EntityKind::Character),
        locations: resolve(&entity.locations, classification, EntityKind::Location),
        items: resolve(&entity.items, classification, EntityKind::Item),
        custom: pick_custom(entity, custom_names),
        ..Scene::default()
    })
}

fn resolve(
    references: &Option<Vec<SourceId>>,
    classification: &Classification<'_>,
    kind: EntityKind,
) -> Option<Vec<EntityId>> {
    references.as_ref().map(|references| {
        references
            .iter()
            .filter_map(|source_id| classification.local_id(source_id, kind).cloned())
            .collect()
    })
}

fn pick_custom(entity: &TimelineEntity, names: &[String]) -> CustomFields {
    names
        .iter()
        .filter_map(|name| {
            entity
                .extra
                .get(name)
                .map(|value| (name.clone(), value.clone()))
        })
        .collect()
}

fn non_empty(tags: &[String]) -> Option<Vec<String>> {
    (!tags.is_empty()).then(|| tags.to_vec())
}

fn clamp(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
