//! Entity classification and id mapping.
//!
//! # Responsibility
//! - Resolve each source record's kind through the type dictionary.
//! - Assign dense, per-kind project ids (`"1"`, `"2"`, ...) in table order.
//!
//! # Invariants
//! - Entries live in one arena in table order; lookups go through an index
//!   keyed by source id.
//! - `Unknown` records stay in the arena but never receive a project id.

use crate::model::project::EntityId;
use crate::model::timeline::{EntityKind, TimelineEntity, TimelineSource};
use log::{info, warn};
use std::collections::HashMap;
use std::time::Instant;

/// One classified record.
#[derive(Debug, Clone)]
pub struct ClassifiedEntity<'a> {
    pub entity: &'a TimelineEntity,
    pub kind: EntityKind,
    /// Project id; `None` for unknown kinds.
    pub local_id: Option<EntityId>,
}

/// Arena of classified records plus the source-id index.
#[derive(Debug, Clone, Default)]
pub struct Classification<'a> {
    entries: Vec<ClassifiedEntity<'a>>,
    index_by_source: HashMap<&'a str, usize>,
    counts: HashMap<EntityKind, usize>,
}

impl<'a> Classification<'a> {
    pub fn get(&self, source_id: &str) -> Option<&ClassifiedEntity<'a>> {
        self.index_by_source
            .get(source_id)
            .and_then(|index| self.entries.get(*index))
    }

    /// Project id of a source record, if it has the expected kind.
    pub fn local_id(&self, source_id: &str, kind: EntityKind) -> Option<&EntityId> {
        self.get(source_id)
            .filter(|entry| entry.kind == kind)
            .and_then(|entry| entry.local_id.as_ref())
    }

    pub fn kind_of(&self, source_id: &str) -> EntityKind {
        self.get(source_id)
            .map_or(EntityKind::Unknown, |entry| entry.kind)
    }

    /// Records of one kind in table order.
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &ClassifiedEntity<'a>> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    /// Number of ids assigned for one kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classifies all records of a source in one pass.
///
/// # Side effects
/// - Emits a `classify` logging event with per-kind counts.
pub fn classify(source: &TimelineSource) -> Classification<'_> {
    let started_at = Instant::now();
    let mut classification = Classification {
        entries: Vec::with_capacity(source.entities.len()),
        ..Classification::default()
    };

    for entity in &source.entities {
        if classification.index_by_source.contains_key(entity.id.as_str()) {
            warn!("event=classify module=timeline status=skip reason=duplicate_source_id");
            continue;
        }
        let kind = source.types.kind_of(&entity.type_marker);
        let local_id = match kind {
            EntityKind::Unknown => None,
            _ => {
                let counter = classification.counts.entry(kind).or_insert(0);
                *counter += 1;
                Some(counter.to_string())
            }
        };
        classification
            .index_by_source
            .insert(entity.id.as_str(), classification.entries.len());
        classification.entries.push(ClassifiedEntity {
            entity,
            kind,
            local_id,
        });
    }

    info!(
        "event=classify module=timeline status=ok events={} containers={} characters={} locations={} items={} unknown={} duration_ms={}",
        classification.count(EntityKind::Event),
        classification.count(EntityKind::NarrativeContainer),
        classification.count(EntityKind::Character),
        classification.count(EntityKind::Location),
        classification.count(EntityKind::Item),
        classification.of_kind(EntityKind::Unknown).count(),
        started_at.elapsed().as_millis()
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::classify;
    use crate::model::timeline::{
        EntityKind, SourceFormat, TimelineEntity, TimelineSource, TypeDictionary,
    };

    fn entity(id: &str, marker: &str) -> TimelineEntity {
        TimelineEntity {
            id: id.to_string(),
            type_marker: marker.to_string(),
            ..TimelineEntity::default()
        }
    }

    #[test]
    fn ids_are_dense_per_kind_in_table_order() {
        let mut types = TypeDictionary::new();
        types.insert("ev", EntityKind::Event);
        types.insert("ch", EntityKind::Character);
        let source = TimelineSource {
            format: SourceFormat::ProjectFile,
            entities: vec![
                entity("g1", "ev"),
                entity("g2", "ch"),
                entity("g3", "mystery"),
                entity("g4", "ev"),
            ],
            types,
            narrative: Vec::new(),
        };

        let classification = classify(&source);
        assert_eq!(classification.len(), 4);
        assert_eq!(
            classification.local_id("g4", EntityKind::Event).map(String::as_str),
            Some("2")
        );
        assert_eq!(
            classification.local_id("g2", EntityKind::Character).map(String::as_str),
            Some("1")
        );
        assert_eq!(classification.local_id("g2", EntityKind::Event), None);
        assert_eq!(classification.kind_of("g3"), EntityKind::Unknown);
        assert_eq!(classification.get("g3").unwrap().local_id, None);
    }
}
