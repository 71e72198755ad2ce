//! Scene splitting at in-text divider markers.
//!
//! Marker lines start with `# ` (part), `## ` (chapter) or `### ` (scene),
//! optionally followed by a title. Text before the first marker stays in the
//! original scene; each marker opens a new scene, and part/chapter markers
//! also open a new chapter that takes over the remaining scenes.

use crate::model::project::{
    Chapter, ChapterKind, ChapterLevel, Collection, EntityId, ProjectDocument, Scene,
};
use log::info;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Divider {
    Part,
    Chapter,
    Scene,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    divider: Divider,
    title: Option<String>,
    body: String,
}

/// Splits every scene whose content holds divider markers.
///
/// Returns the number of scenes created.
pub fn split_scenes(document: &mut ProjectDocument) -> usize {
    let started_at = Instant::now();
    let mut created_scenes = 0;
    let mut created_chapters = 0;

    let scene_ids: Vec<EntityId> = document
        .chapters
        .iter()
        .flat_map(|(_, chapter)| chapter.scenes.iter().cloned())
        .collect();

    for scene_id in scene_ids {
        let Some(original) = document.scenes.get(&scene_id).cloned() else {
            continue;
        };
        let Some(content) = original.content.as_deref() else {
            continue;
        };
        let (head, segments) = parse_segments(content);
        if segments.is_empty() {
            continue;
        }
        let Some(mut chapter_id) = document.chapter_of(&scene_id).cloned() else {
            continue;
        };
        if let Some(scene) = document.scenes.get_mut(&scene_id) {
            scene.content = Some(head);
        }

        let mut anchor = Some(scene_id.clone());
        for segment in segments {
            match segment.divider {
                Divider::Scene => {
                    let id = add_scene(document, &chapter_id, anchor.as_deref(), &original, segment);
                    anchor = Some(id);
                    created_scenes += 1;
                }
                Divider::Part | Divider::Chapter => {
                    let level = match segment.divider {
                        Divider::Part => ChapterLevel::Part,
                        _ => ChapterLevel::Chapter,
                    };
                    let new_chapter = open_chapter(
                        document,
                        &chapter_id,
                        anchor.as_deref(),
                        level,
                        segment.title.clone(),
                    );
                    created_chapters += 1;
                    chapter_id = new_chapter;
                    anchor = None;
                    if !segment.body.trim().is_empty() {
                        let id = add_scene(document, &chapter_id, None, &original, segment);
                        anchor = Some(id);
                        created_scenes += 1;
                    }
                }
            }
        }
    }

    if created_scenes > 0 || created_chapters > 0 {
        info!(
            "event=scene_split module=merge status=ok scenes={} chapters={} duration_ms={}",
            created_scenes,
            created_chapters,
            started_at.elapsed().as_millis()
        );
    }
    created_scenes
}

fn add_scene(
    document: &mut ProjectDocument,
    chapter_id: &str,
    anchor: Option<&str>,
    original: &Scene,
    segment: Segment,
) -> EntityId {
    let id = next_id(&document.scenes);
    document.scenes.insert(
        id.clone(),
        Scene {
            title: segment.title,
            content: Some(segment.body),
            status: original.status,
            is_notes_scene: original.is_notes_scene,
            is_todo_scene: original.is_todo_scene,
            is_unused: original.is_unused,
            ..Scene::default()
        },
    );
    if let Some(chapter) = document.chapters.get_mut(chapter_id) {
        let position = anchor
            .and_then(|anchor| chapter.scenes.iter().position(|scene| scene == anchor))
            .map_or(0, |index| index + 1);
        chapter.scenes.insert(position, id.clone());
    }
    id
}

/// Creates a chapter after `current` holding the scenes behind `anchor`.
fn open_chapter(
    document: &mut ProjectDocument,
    current: &str,
    anchor: Option<&str>,
    level: ChapterLevel,
    title: Option<String>,
) -> EntityId {
    let remaining = match document.chapters.get_mut(current) {
        Some(chapter) => {
            let split_at = anchor
                .and_then(|anchor| chapter.scenes.iter().position(|scene| scene == anchor))
                .map_or(0, |index| index + 1);
            chapter.scenes.split_off(split_at.min(chapter.scenes.len()))
        }
        None => Vec::new(),
    };
    let id = next_id(&document.chapters);
    document.chapters.insert_after(
        current,
        id.clone(),
        Chapter {
            title,
            level: Some(level),
            kind: Some(ChapterKind::Normal),
            is_unused: Some(false),
            scenes: remaining,
            ..Chapter::default()
        },
    );
    id
}

/// Smallest id above every numeric id in the collection.
fn next_id<T>(collection: &Collection<T>) -> EntityId {
    let max = collection
        .order()
        .iter()
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (max + 1).to_string()
}

fn parse_divider(line: &str) -> Option<(Divider, Option<String>)> {
    let (divider, rest) = if let Some(rest) = line.strip_prefix("###") {
        (Divider::Scene, rest)
    } else if let Some(rest) = line.strip_prefix("##") {
        (Divider::Chapter, rest)
    } else if let Some(rest) = line.strip_prefix('#') {
        (Divider::Part, rest)
    } else {
        return None;
    };
    if !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    let title = rest.trim();
    Some((divider, (!title.is_empty()).then(|| title.to_string())))
}

/// Returns the text before the first marker and one segment per marker.
fn parse_segments(content: &str) -> (String, Vec<Segment>) {
    let mut head = Vec::new();
    let mut segments: Vec<Segment> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    for line in content.lines() {
        match parse_divider(line) {
            Some((divider, title)) => {
                if let Some(last) = segments.last_mut() {
                    last.body = body.join("\n").trim().to_string();
                } else {
                    head = std::mem::take(&mut body);
                }
                body.clear();
                segments.push(Segment {
                    divider,
                    title,
                    body: String::new(),
                });
            }
            None => body.push(line),
        }
    }
    match segments.last_mut() {
        Some(last) => last.body = body.join("\n").trim().to_string(),
        None => head = body,
    }
    (head.join("\n").trim_end().to_string(), segments)
}
