//! Reader for Aeon Timeline 3 CSV exports.
//!
//! # Responsibility
//! - Turn each data row into a `TimelineEntity` keyed by its row number.
//! - Resolve title-based references to the rows they name.
//!
//! # Invariants
//! - Row ids are 1-based data row numbers in file order.
//! - A reference column absent from the header yields `None`, not an empty list.

use crate::config::ImportConfig;
use crate::model::timeline::{
    EntityKind, SourceFormat, SourceId, TimelineEntity, TimelineSource, TypeDictionary,
};
use crate::timeline::datetime::normalize;
use crate::timeline::{SourceError, SourceResult};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

const LIST_DELIMITER: char = ',';

/// Parses a CSV export.
///
/// # Errors
/// - `MissingRequiredField` when a required column label is absent.
/// - `InvalidDateFormat` when a start or end date is malformed.
/// - `CorruptedData` when the CSV structure cannot be parsed.
pub fn parse_table(text: &str, config: &ImportConfig) -> SourceResult<TimelineSource> {
    let fields = &config.table_fields;
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_error)?.clone();
    let columns: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(index, label)| (label.trim(), index))
        .collect();

    for required in [
        &fields.label,
        &fields.kind,
        &fields.narrative_position,
        &fields.start_date,
        &fields.end_date,
    ] {
        if !columns.contains_key(required.as_str()) {
            return Err(SourceError::MissingRequiredField(required.clone()));
        }
    }

    let records = reader
        .records()
        .collect::<Result<Vec<StringRecord>, csv::Error>>()
        .map_err(csv_error)?;
    let rows: Vec<Row<'_>> = records
        .iter()
        .map(|record| Row {
            record,
            columns: &columns,
        })
        .collect();

    let types = table_types(config);
    let mut titles: HashMap<(EntityKind, &str), SourceId> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let kind = types.kind_of(row.get(&fields.kind).unwrap_or_default());
        if matches!(
            kind,
            EntityKind::Character | EntityKind::Location | EntityKind::Item
        ) {
            titles
                .entry((kind, row.get(&fields.label).unwrap_or_default()))
                .or_insert_with(|| row_id(index));
        }
    }
    let resolver = TitleResolver { titles: &titles };

    let consumed: HashSet<&str> = [
        &fields.label,
        &fields.kind,
        &fields.narrative_position,
        &fields.start_date,
        &fields.end_date,
        &fields.summary,
        &fields.notes,
        &fields.tags,
        &fields.characters,
        &fields.viewpoint,
        &fields.locations,
        &fields.items,
        &fields.character_bio,
        &fields.character_aka,
    ]
    .into_iter()
    .map(String::as_str)
    .collect();

    let mut entities = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let type_marker = row.get(&fields.kind).unwrap_or_default().to_string();
        let kind = types.kind_of(&type_marker);
        let mut entity = TimelineEntity {
            id: row_id(index),
            label: row.get(&fields.label).unwrap_or_default().to_string(),
            summary: row.get(&fields.summary).map(str::to_string),
            notes: row.get(&fields.notes).map(str::to_string),
            tags: split_list(row.get(&fields.tags).unwrap_or_default()),
            position: row
                .get(&fields.narrative_position)
                .map(str::trim)
                .filter(|position| !position.is_empty())
                .map(str::to_string),
            extra: row.extra(&headers, &consumed),
            type_marker,
            ..TimelineEntity::default()
        };

        match kind {
            EntityKind::Event => {
                entity.start = normalize(row.get(&fields.start_date).unwrap_or_default())?;
                if entity.start.is_some() {
                    entity.end = normalize(row.get(&fields.end_date).unwrap_or_default())?;
                }
                entity.participants = resolver.characters(row, config);
                entity.locations = row
                    .get(&fields.locations)
                    .map(|titles| resolver.resolve(EntityKind::Location, titles));
                entity.items = row
                    .get(&fields.items)
                    .map(|titles| resolver.resolve(EntityKind::Item, titles));
            }
            EntityKind::Character => {
                entity.bio = row.get(&fields.character_bio).map(str::to_string);
                entity.aka = row.get(&fields.character_aka).map(str::to_string);
            }
            _ => {}
        }
        entities.push(entity);
    }

    Ok(TimelineSource {
        format: SourceFormat::Table,
        entities,
        types,
        narrative: Vec::new(),
    })
}

fn table_types(config: &ImportConfig) -> TypeDictionary {
    let labels = &config.type_labels;
    let mut types = TypeDictionary::new();
    types.insert(labels.event.clone(), EntityKind::Event);
    types.insert(labels.narrative.clone(), EntityKind::NarrativeContainer);
    types.insert(labels.character.clone(), EntityKind::Character);
    types.insert(labels.location.clone(), EntityKind::Location);
    types.insert(labels.item.clone(), EntityKind::Item);
    types
}

fn row_id(index: usize) -> SourceId {
    (index + 1).to_string()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn csv_error(err: csv::Error) -> SourceError {
    SourceError::CorruptedData(format!("cannot parse CSV data: {err}"))
}

struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<&'a str, usize>,
}

impl<'a> Row<'a> {
    /// Value of a column, or `None` when the header lacks it.
    fn get(&self, label: &str) -> Option<&'a str> {
        let index = *self.columns.get(label)?;
        Some(self.record.get(index).unwrap_or_default())
    }

    fn extra(&self, headers: &StringRecord, consumed: &HashSet<&str>) -> BTreeMap<String, String> {
        headers
            .iter()
            .zip(self.record.iter())
            .filter(|(label, value)| !consumed.contains(label.trim()) && !value.is_empty())
            .map(|(label, value)| (label.trim().to_string(), value.to_string()))
            .collect()
    }
}

struct TitleResolver<'a> {
    titles: &'a HashMap<(EntityKind, &'a str), SourceId>,
}

impl TitleResolver<'_> {
    fn resolve(&self, kind: EntityKind, titles: &str) -> Vec<SourceId> {
        split_list(titles)
            .iter()
            .filter_map(|title| {
                let id = self.titles.get(&(kind, title.as_str())).cloned();
                if id.is_none() {
                    debug!("event=source_read module=timeline status=skip reason=unknown_reference kind={kind:?}");
                }
                id
            })
            .collect()
    }

    /// Character references with the viewpoint character moved to the front.
    fn characters(&self, row: &Row<'_>, config: &ImportConfig) -> Option<Vec<SourceId>> {
        let fields = &config.table_fields;
        let mut characters = row
            .get(&fields.characters)
            .map(|titles| self.resolve(EntityKind::Character, titles));
        let viewpoint = row
            .get(&fields.viewpoint)
            .map(str::trim)
            .and_then(|title| self.titles.get(&(EntityKind::Character, title)));
        if let Some(viewpoint) = viewpoint {
            let list = characters.get_or_insert_with(Vec::new);
            list.retain(|id| id != viewpoint);
            list.insert(0, viewpoint.clone());
        }
        characters
    }
}

#[cfg(test)]
mod tests {
    use super::parse_table;
    use crate::config::ImportConfig;
    use crate::timeline::SourceError;

    const TABLE: &str = "\
Label,Type,Narrative Position,Start Date,End Date,Summary,Characters,Viewpoint,Locations,Mood
Alice,Character,,,,A sailor,,,,
Bob,Character,,,,,,,,
Harbor,Location,,,,,,,,
Part One,Narrative Folder,Part 1,,,,,,,
Arrival,Event,Scene 1.1.1,1910-04-05,1910-04-06 02:30,They arrive,\"Alice, Bob\",Bob,Harbor,calm
";

    #[test]
    fn rows_become_entities_with_resolved_references() {
        let source = parse_table(TABLE, &ImportConfig::default()).unwrap();
        assert_eq!(source.entities.len(), 5);

        let event = &source.entities[4];
        assert_eq!(event.id, "5");
        assert_eq!(event.position.as_deref(), Some("Scene 1.1.1"));
        assert_eq!(event.start.unwrap().to_string(), "1910-04-05 00:00:00");
        assert_eq!(event.end.unwrap().to_string(), "1910-04-06 02:30:00");
        assert_eq!(
            event.participants,
            Some(vec!["2".to_string(), "1".to_string()])
        );
        assert_eq!(event.locations, Some(vec!["3".to_string()]));
        assert_eq!(event.items, None);
        assert_eq!(event.extra.get("Mood").map(String::as_str), Some("calm"));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let err = parse_table("Label,Type\nA,Event\n", &ImportConfig::default()).unwrap_err();
        assert!(matches!(err, SourceError::MissingRequiredField(name) if name == "Narrative Position"));
    }

    #[test]
    fn malformed_date_is_reported() {
        let text = "Label,Type,Narrative Position,Start Date,End Date\nA,Event,,1910-xx-01,\n";
        let err = parse_table(text, &ImportConfig::default()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidDateFormat(_)));
    }
}
