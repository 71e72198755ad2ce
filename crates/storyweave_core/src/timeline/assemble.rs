//! Narrative structure assembly.
//!
//! # Responsibility
//! - Rebuild an ordered, leveled chapter list from either the nested
//!   narrative tree or dotted position strings.
//! - Collect events outside the structure into one "unassigned" chapter.
//!
//! # Invariants
//! - The result always holds at least one chapter.
//! - Every event id appears in exactly one chapter scene list.
//! - The walk never descends more than three levels.

use crate::config::ImportConfig;
use crate::model::project::{ChapterKind, ChapterLevel, EntityId};
use crate::model::timeline::{EntityKind, NarrativeNode, TimelineSource};
use crate::timeline::classify::{Classification, ClassifiedEntity};
use log::info;
use std::collections::HashMap;
use std::time::Instant;

const PART_MARKER: &str = "Part";
const CHAPTER_MARKER: &str = "Chapter";
const SCENE_MARKER: &str = "Scene";
const POSITION_WIDTH: usize = 4;

/// One chapter of the assembled structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledChapter {
    pub id: EntityId,
    pub title: String,
    pub desc: Option<String>,
    pub level: ChapterLevel,
    pub kind: ChapterKind,
    pub scenes: Vec<EntityId>,
}

/// Ordered chapters plus the scene ids that landed in the unassigned bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assembly {
    pub chapters: Vec<AssembledChapter>,
    pub unassigned: Vec<EntityId>,
}

/// Assembles the chapter structure of a classified source.
///
/// Sources with a narrative tree are walked; sources without one but with
/// position strings are sorted by position.
///
/// # Side effects
/// - Emits an `assemble` logging event with chapter and bucket counts.
pub fn assemble(
    source: &TimelineSource,
    classification: &Classification<'_>,
    config: &ImportConfig,
) -> Assembly {
    let started_at = Instant::now();
    let uses_positions = source.narrative.is_empty()
        && source
            .entities
            .iter()
            .any(|entity| entity.position.is_some());

    let mut builder = Builder::new(classification);
    if uses_positions {
        builder.sort_positions(config);
    } else {
        builder.walk_tree(&source.narrative);
    }
    let assembly = builder.finish(config);

    info!(
        "event=assemble module=timeline status=ok variant={} chapters={} unassigned={} duration_ms={}",
        if uses_positions { "position" } else { "tree" },
        assembly.chapters.len(),
        assembly.unassigned.len(),
        started_at.elapsed().as_millis()
    );
    assembly
}

struct Builder<'c, 'a> {
    classification: &'c Classification<'a>,
    chapters: Vec<AssembledChapter>,
    chapter_index: HashMap<EntityId, usize>,
    placed: HashMap<EntityId, usize>,
}

impl<'c, 'a> Builder<'c, 'a> {
    fn new(classification: &'c Classification<'a>) -> Self {
        Self {
            classification,
            chapters: Vec::new(),
            chapter_index: HashMap::new(),
            placed: HashMap::new(),
        }
    }

    fn walk_tree(&mut self, roots: &[NarrativeNode]) {
        for root in roots {
            if self.classification.kind_of(&root.id) != EntityKind::NarrativeContainer {
                continue;
            }
            let is_part = root.children.iter().any(|child| {
                self.classification.kind_of(&child.id) == EntityKind::NarrativeContainer
            });
            let level = if is_part {
                ChapterLevel::Part
            } else {
                ChapterLevel::Chapter
            };
            let Some(root_index) = self.open_container(&root.id, level) else {
                continue;
            };

            for child in &root.children {
                match self.classification.kind_of(&child.id) {
                    EntityKind::NarrativeContainer => {
                        let Some(index) = self.open_container(&child.id, ChapterLevel::Chapter)
                        else {
                            continue;
                        };
                        for leaf in &child.children {
                            self.place(index, &leaf.id);
                        }
                    }
                    EntityKind::Event => self.place(root_index, &child.id),
                    _ => {}
                }
            }
        }
    }

    fn open_container(&mut self, source_id: &str, level: ChapterLevel) -> Option<usize> {
        let entry = self.classification.get(source_id)?;
        let id = entry.local_id.clone()?;
        if let Some(index) = self.chapter_index.get(&id) {
            return Some(*index);
        }
        let index = self.chapters.len();
        self.chapters.push(AssembledChapter {
            id: id.clone(),
            title: entry.entity.label.clone(),
            desc: entry.entity.summary.clone(),
            level,
            kind: ChapterKind::Normal,
            scenes: Vec::new(),
        });
        self.chapter_index.insert(id, index);
        Some(index)
    }

    fn place(&mut self, chapter: usize, source_id: &str) {
        if let Some(scene_id) = self
            .classification
            .local_id(source_id, EntityKind::Event)
            .cloned()
        {
            self.place_local(chapter, scene_id);
        }
    }

    fn sort_positions(&mut self, config: &ImportConfig) {
        let classification = self.classification;
        let mut containers: Vec<(String, ChapterLevel, &ClassifiedEntity<'a>)> = classification
            .of_kind(EntityKind::NarrativeContainer)
            .filter_map(|entry| {
                let (marker, key) = parse_position(entry.entity.position.as_deref()?)?;
                let level = match marker {
                    PART_MARKER => ChapterLevel::Part,
                    CHAPTER_MARKER => ChapterLevel::Chapter,
                    _ => return None,
                };
                Some((key, level, entry))
            })
            .collect();
        containers.sort_by(|left, right| left.0.cmp(&right.0));

        let mut scenes: Vec<(String, EntityId)> = classification
            .of_kind(EntityKind::Event)
            .filter_map(|entry| {
                let (marker, key) = parse_position(entry.entity.position.as_deref()?)?;
                (marker == SCENE_MARKER).then(|| (key, entry.local_id.clone()))
            })
            .filter_map(|(key, id)| Some((key, id?)))
            .collect();
        scenes.sort_by(|left, right| left.0.cmp(&right.0));

        let mut part_number = 0;
        let mut chapter_number = 0;
        let mut chapter_keys = Vec::new();
        for (key, level, entry) in containers {
            let Some(id) = entry.local_id.clone() else {
                continue;
            };
            if self.chapter_index.contains_key(&id) {
                continue;
            }
            let title = match level {
                ChapterLevel::Part => {
                    part_number += 1;
                    format!("{} {part_number}", config.part_heading_prefix)
                }
                ChapterLevel::Chapter => {
                    chapter_number += 1;
                    chapter_keys.push((key, self.chapters.len()));
                    format!("{} {chapter_number}", config.chapter_heading_prefix)
                }
            };
            self.chapter_index.insert(id.clone(), self.chapters.len());
            self.chapters.push(AssembledChapter {
                id,
                title,
                desc: entry.entity.summary.clone(),
                level,
                kind: ChapterKind::Normal,
                scenes: Vec::new(),
            });
        }

        for (scene_key, scene_id) in scenes {
            let owner = chapter_keys
                .iter()
                .filter(|(chapter_key, _)| belongs_to(&scene_key, chapter_key))
                .max_by_key(|(chapter_key, _)| chapter_key.len())
                .map(|(_, index)| *index);
            if let Some(index) = owner {
                self.place_local(index, scene_id);
            }
        }
    }

    /// Appends a scene to a chapter; a later placement wins over an earlier one.
    fn place_local(&mut self, chapter: usize, scene_id: EntityId) {
        if let Some(previous) = self.placed.insert(scene_id.clone(), chapter) {
            if let Some(owner) = self.chapters.get_mut(previous) {
                owner.scenes.retain(|id| id != &scene_id);
            }
        }
        if let Some(owner) = self.chapters.get_mut(chapter) {
            owner.scenes.push(scene_id);
        }
    }

    fn finish(mut self, config: &ImportConfig) -> Assembly {
        let unassigned: Vec<EntityId> = self
            .classification
            .of_kind(EntityKind::Event)
            .filter_map(|entry| entry.local_id.clone())
            .filter(|id| !self.placed.contains_key(id))
            .collect();

        if !unassigned.is_empty() {
            // Chapter ids are positional so re-imports address the same
            // chapters. The bucket follows the containers; a hand-made chapter
            // that already holds this id is merged with the bucket.
            let bucket_id = self.classification.count(EntityKind::NarrativeContainer) + 1;
            self.chapters.push(AssembledChapter {
                id: bucket_id.to_string(),
                title: config.unassigned_chapter_title.clone(),
                desc: Some(config.unassigned_chapter_desc.clone()),
                level: ChapterLevel::Chapter,
                kind: ChapterKind::Notes,
                scenes: unassigned.clone(),
            });
        }

        if self.chapters.is_empty() {
            self.chapters.push(AssembledChapter {
                id: "1".to_string(),
                title: config.default_chapter_title.clone(),
                desc: None,
                level: ChapterLevel::Chapter,
                kind: ChapterKind::Normal,
                scenes: Vec::new(),
            });
        }

        Assembly {
            chapters: self.chapters,
            unassigned,
        }
    }
}

/// Splits `"<Marker> <dotted numbers>"` and pads the numbers for sorting.
fn parse_position(text: &str) -> Option<(&str, String)> {
    let (marker, numbers) = text.trim().split_once(char::is_whitespace)?;
    let numbers = numbers.trim();
    if numbers.is_empty() {
        return None;
    }
    Some((marker, pad_position(numbers)))
}

/// Zero-pads every dot-separated component to a fixed width.
pub fn pad_position(numbers: &str) -> String {
    numbers
        .split('.')
        .map(|part| format!("{:0>width$}", part.trim(), width = POSITION_WIDTH))
        .collect::<Vec<_>>()
        .join(".")
}

fn belongs_to(scene_key: &str, chapter_key: &str) -> bool {
    scene_key
        .strip_prefix(chapter_key)
        .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::{belongs_to, pad_position, parse_position};

    #[test]
    fn components_are_zero_padded() {
        assert_eq!(pad_position("2.3"), "0002.0003");
        assert_eq!(pad_position("12.100.7"), "0012.0100.0007");
        assert_eq!(pad_position("12345"), "12345");
    }

    #[test]
    fn padded_keys_sort_numerically() {
        let mut keys = vec![pad_position("10.1"), pad_position("2.10"), pad_position("2.9")];
        keys.sort();
        assert_eq!(keys, ["0002.0009", "0002.0010", "0010.0001"]);
    }

    #[test]
    fn position_text_is_split_into_marker_and_key() {
        assert_eq!(
            parse_position("Scene 1.2.3"),
            Some(("Scene", "0001.0002.0003".to_string()))
        );
        assert_eq!(parse_position("Scene"), None);
    }

    #[test]
    fn scene_membership_needs_component_boundary() {
        assert!(belongs_to("0001.0002.0003", "0001.0002"));
        assert!(!belongs_to("0001.0002", "0001.0002"));
        assert!(!belongs_to("0001.00021", "0001.0002"));
    }
}
