//! Reader for the JSON document embedded in Aeon Timeline 3 project files.
//!
//! # Responsibility
//! - Resolve the source's type dictionary to entity roles.
//! - Flatten `data.items` into `TimelineEntity` records in document order.
//! - Attach relationship references and the nested narrative tree.
//!
//! # Invariants
//! - Document key order is kept (`serde_json` `preserve_order`).
//! - Timestamps outside years `100..=9999` produce no date.

use crate::config::ImportConfig;
use crate::model::timeline::{
    EntityKind, NarrativeNode, SourceFormat, SourceId, TimelineEntity, TimelineSource,
    TypeDictionary,
};
use crate::timeline::datetime::{CanonicalDateTime, DurationComponents};
use crate::timeline::{SourceError, SourceResult};
use serde_json::{Map, Value};
use std::collections::HashMap;

const BUILTIN_TYPES: &[(&str, EntityKind)] = &[
    ("defaultEvent", EntityKind::Event),
    ("defaultPerson", EntityKind::Character),
    ("defaultLocation", EntityKind::Location),
    ("defaultNarrative", EntityKind::NarrativeContainer),
    ("defaultItem", EntityKind::Item),
];

/// Parses the embedded JSON text of a project file.
///
/// # Errors
/// - `CorruptedData` when the text is not valid JSON.
/// - `UnsupportedSourceVersion` when no type dictionary with an event role exists.
/// - `MissingRequiredField` when items lack a type or label.
pub fn parse_project(text: &str, config: &ImportConfig) -> SourceResult<TimelineSource> {
    let root: Value = serde_json::from_str(text)
        .map_err(|err| SourceError::CorruptedData(format!("invalid JSON data: {err}")))?;

    let types = read_type_dictionary(&root, config)?;
    let reference_labels = read_reference_labels(&root);

    let items = by_id(&root, &["data", "items"])
        .ok_or_else(|| SourceError::MissingRequiredField("data.items".to_string()))?;

    let mut entities = Vec::with_capacity(items.len());
    for (guid, item) in items {
        entities.push(read_item(guid, item)?);
    }

    if let Some(relationships) = by_id(&root, &["data", "relationships"]) {
        attach_relationships(&mut entities, relationships, &types, &reference_labels, config);
    }

    let narrative = match lookup(&root, &["data", "narrative", "children"]) {
        Some(children) => read_nodes(children)?,
        None => Vec::new(),
    };

    Ok(TimelineSource {
        format: SourceFormat::ProjectFile,
        entities,
        types,
        narrative,
    })
}

fn read_type_dictionary(root: &Value, config: &ImportConfig) -> SourceResult<TypeDictionary> {
    let definitions = by_id(root, &["definitions", "types"]).ok_or_else(|| {
        SourceError::UnsupportedSourceVersion("no type definitions found".to_string())
    })?;

    let labels = &config.type_labels;
    let mut types = TypeDictionary::new();
    for (type_id, definition) in definitions {
        let builtin = BUILTIN_TYPES
            .iter()
            .find(|(id, _)| *id == type_id.as_str())
            .map(|(_, kind)| *kind);
        let label = definition.get("label").and_then(Value::as_str).unwrap_or_default();
        let by_label = if label == labels.event {
            Some(EntityKind::Event)
        } else if label == labels.narrative {
            Some(EntityKind::NarrativeContainer)
        } else if label == labels.character {
            Some(EntityKind::Character)
        } else if label == labels.location {
            Some(EntityKind::Location)
        } else if label == labels.item {
            Some(EntityKind::Item)
        } else {
            None
        };
        if let Some(kind) = builtin.or(by_label) {
            types.insert(type_id.clone(), kind);
        }
    }

    if !types.has_role(EntityKind::Event) {
        return Err(SourceError::UnsupportedSourceVersion(
            "no event type defined".to_string(),
        ));
    }
    Ok(types)
}

fn read_reference_labels(root: &Value) -> HashMap<String, String> {
    by_id(root, &["definitions", "references"])
        .map(|references| {
            references
                .iter()
                .filter_map(|(id, definition)| {
                    let label = definition.get("label")?.as_str()?;
                    Some((id.clone(), label.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn read_item(guid: &str, item: &Value) -> SourceResult<TimelineEntity> {
    let type_marker = item
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::MissingRequiredField(format!("type of item {guid}")))?;
    let label = match item.get("label") {
        Some(Value::Null) => String::new(),
        Some(Value::String(label)) => label.clone(),
        Some(_) => {
            return Err(SourceError::InvalidData(format!("label of item {guid}")));
        }
        None => return Err(SourceError::MissingRequiredField(format!("label of item {guid}"))),
    };

    let start = item
        .get("startDate")
        .and_then(|date| date.get("timestamp"))
        .and_then(as_whole_number)
        .and_then(CanonicalDateTime::from_epoch_seconds);

    let tags = item
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(TimelineEntity {
        id: guid.to_string(),
        type_marker: type_marker.to_string(),
        label,
        summary: optional_text(item, "summary"),
        notes: optional_text(item, "notes"),
        start,
        duration: item.get("duration").and_then(read_duration),
        tags,
        ..TimelineEntity::default()
    })
}

fn read_duration(value: &Value) -> Option<DurationComponents> {
    let object = value.as_object()?;
    let part = |name: &str| object.get(name).and_then(as_whole_number).unwrap_or(0);
    let components = DurationComponents {
        years: part("years"),
        months: part("months"),
        weeks: part("weeks"),
        days: part("days"),
        hours: part("hours"),
        minutes: part("minutes"),
        seconds: part("seconds"),
    };
    (!components.is_empty()).then_some(components)
}

fn attach_relationships(
    entities: &mut [TimelineEntity],
    relationships: &Map<String, Value>,
    types: &TypeDictionary,
    reference_labels: &HashMap<String, String>,
    config: &ImportConfig,
) {
    let kinds: HashMap<SourceId, EntityKind> = entities
        .iter()
        .map(|entity| (entity.id.clone(), types.kind_of(&entity.type_marker)))
        .collect();

    let mut links: HashMap<SourceId, Vec<(EntityKind, SourceId)>> = HashMap::new();
    for relationship in relationships.values() {
        let (Some(subject), Some(object)) = (
            relationship.get("subject").and_then(Value::as_str),
            relationship.get("object").and_then(Value::as_str),
        ) else {
            continue;
        };
        let by_reference = relationship
            .get("reference")
            .and_then(Value::as_str)
            .and_then(|reference| reference_labels.get(reference))
            .and_then(|label| {
                let labels = &config.reference_labels;
                if *label == labels.participant {
                    Some(EntityKind::Character)
                } else if *label == labels.location {
                    Some(EntityKind::Location)
                } else if *label == labels.item {
                    Some(EntityKind::Item)
                } else {
                    None
                }
            });
        let Some(role) = by_reference.or_else(|| kinds.get(object).copied()) else {
            continue;
        };
        links
            .entry(subject.to_string())
            .or_default()
            .push((role, object.to_string()));
    }

    for entity in entities.iter_mut() {
        if kinds.get(entity.id.as_str()) != Some(&EntityKind::Event) {
            continue;
        }
        let mut participants = Vec::new();
        let mut locations = Vec::new();
        let mut items = Vec::new();
        for (role, object) in links.remove(&entity.id).unwrap_or_default() {
            match role {
                EntityKind::Character => participants.push(object),
                EntityKind::Location => locations.push(object),
                EntityKind::Item => items.push(object),
                _ => {}
            }
        }
        entity.participants = Some(participants);
        entity.locations = Some(locations);
        entity.items = Some(items);
    }
}

fn read_nodes(children: &Value) -> SourceResult<Vec<NarrativeNode>> {
    let Some(children) = children.as_array() else {
        return Err(SourceError::InvalidData(
            "narrative children must be a list".to_string(),
        ));
    };
    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        let id = child
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::MissingRequiredField("narrative node id".to_string()))?;
        let grandchildren = match child.get("children") {
            Some(value) if !value.is_null() => read_nodes(value)?,
            _ => Vec::new(),
        };
        nodes.push(NarrativeNode {
            id: id.to_string(),
            children: grandchildren,
        });
    }
    Ok(nodes)
}

fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(*key))
}

fn by_id<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Map<String, Value>> {
    lookup(root, path)?.get("byId")?.as_object()
}

fn optional_text(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn as_whole_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|number| number.trunc() as i64))
}
