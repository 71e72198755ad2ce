use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use storyweave_core::model::project::{ChapterKind, ChapterLevel};
use storyweave_core::timeline::assemble::assemble;
use storyweave_core::timeline::classify::classify;
use storyweave_core::timeline::convert::build_document;
use storyweave_core::timeline::source::read_source;
use storyweave_core::{ImportConfig, SourceError};
use tempfile::TempDir;

/// Seconds from 0001-01-01 to 2021-01-01.
const JAN_2021: i64 = 63_745_056_000;
const DAY: i64 = 86_400;

fn types() -> Value {
    json!({"byId": {
        "defaultEvent": {"label": "Event"},
        "defaultPerson": {"label": "Person"},
        "defaultLocation": {"label": "Location"},
        "defaultNarrative": {"label": "Narrative Folder"}
    }})
}

fn event(label: &str, day: i64) -> Value {
    json!({
        "type": "defaultEvent",
        "label": label,
        "summary": format!("{label} happens"),
        "startDate": {"timestamp": JAN_2021 + day * DAY},
        "duration": {"hours": 2}
    })
}

/// Writes a project file: the JSON document wrapped in binary container bytes.
fn write_project(dir: &TempDir, name: &str, document: &Value) -> PathBuf {
    let path = dir.path().join(name);
    let mut bytes = vec![0x00, 0x41, 0x45, 0x4f, 0x4e, 0xff];
    bytes.extend_from_slice(document.to_string().as_bytes());
    bytes.extend_from_slice(&[0x00, 0x7d, 0x10]);
    fs::write(&path, bytes).unwrap();
    path
}

fn write_table(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn assembled_chapters(path: &Path) -> Vec<(String, ChapterLevel, ChapterKind, Vec<String>)> {
    let config = ImportConfig::default();
    let source = read_source(path, &config).unwrap();
    let classification = classify(&source);
    let assembly = assemble(&source, &classification, &config);
    assembly
        .chapters
        .into_iter()
        .map(|chapter| (chapter.title, chapter.level, chapter.kind, chapter.scenes))
        .collect()
}

#[test]
fn narrative_tree_places_events_in_their_chapters() {
    let dir = tempfile::tempdir().unwrap();
    let document = json!({
        "definitions": {"types": types()},
        "data": {
            "items": {"byId": {
                "ch1": {"type": "defaultNarrative", "label": "Chapter One"},
                "ch2": {"type": "defaultNarrative", "label": "Chapter Two"},
                "e1": event("Arrival", 0),
                "e2": event("Storm", 1),
                "e3": event("Rescue", 2)
            }},
            "narrative": {"children": [
                {"id": "ch1", "children": [{"id": "e2", "children": []}, {"id": "e1", "children": []}]},
                {"id": "ch2", "children": [{"id": "e3", "children": []}]}
            ]}
        }
    });
    let path = write_project(&dir, "novel.aeon", &document);

    let chapters = assembled_chapters(&path);
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].0, "Chapter One");
    assert_eq!(chapters[0].1, ChapterLevel::Chapter);
    assert_eq!(chapters[0].3, ["2", "1"]);
    assert_eq!(chapters[1].3, ["3"]);
}

#[test]
fn root_with_container_children_becomes_a_part() {
    let dir = tempfile::tempdir().unwrap();
    let document = json!({
        "definitions": {"types": types()},
        "data": {
            "items": {"byId": {
                "part": {"type": "defaultNarrative", "label": "Book One"},
                "ch": {"type": "defaultNarrative", "label": "Landfall"},
                "e1": event("Arrival", 0)
            }},
            "narrative": {"children": [
                {"id": "part", "children": [{"id": "ch", "children": [{"id": "e1"}]}]}
            ]}
        }
    });
    let path = write_project(&dir, "parts.aeon", &document);

    let chapters = assembled_chapters(&path);
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].1, ChapterLevel::Part);
    assert!(chapters[0].3.is_empty());
    assert_eq!(chapters[1].1, ChapterLevel::Chapter);
    assert_eq!(chapters[1].3, ["1"]);
}

#[test]
fn unreachable_events_fill_exactly_one_bucket_in_table_order() {
    let dir = tempfile::tempdir().unwrap();
    let document = json!({
        "definitions": {"types": types()},
        "data": {"items": {"byId": {
            "z": event("First in table", 5),
            "a": event("Second in table", 1),
            "m": event("Third in table", 3),
            "p": {"type": "defaultPerson", "label": "Alice"}
        }}}
    });
    let path = write_project(&dir, "loose.aeon", &document);
    let config = ImportConfig::default();

    let chapters = assembled_chapters(&path);
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].0, config.unassigned_chapter_title);
    assert_eq!(chapters[0].2, ChapterKind::Notes);
    assert_eq!(chapters[0].3, ["1", "2", "3"]);

    let source = read_source(&path, &config).unwrap();
    let classification = classify(&source);
    let assembly = assemble(&source, &classification, &config);
    let imported = build_document(&classification, &assembly, &config).unwrap();
    assert_eq!(imported.scenes.len(), 3);
    assert!(imported
        .scenes
        .iter()
        .all(|(_, scene)| scene.is_notes_scene == Some(true)));
    assert_eq!(imported.characters.len(), 1);
}

#[test]
fn bucket_id_follows_the_containers() {
    let dir = tempfile::tempdir().unwrap();
    let document = json!({
        "definitions": {"types": types()},
        "data": {
            "items": {"byId": {
                "ch1": {"type": "defaultNarrative", "label": "Landfall"},
                "ch2": {"type": "defaultNarrative", "label": "Aftermath"},
                "e1": event("Arrival", 0),
                "e2": event("Loose end", 4)
            }},
            "narrative": {"children": [
                {"id": "ch1", "children": [{"id": "e1"}]},
                {"id": "ch2", "children": []}
            ]}
        }
    });
    let path = write_project(&dir, "bucket.aeon", &document);
    let config = ImportConfig::default();

    for _ in 0..2 {
        let source = read_source(&path, &config).unwrap();
        let classification = classify(&source);
        let assembly = assemble(&source, &classification, &config);
        let ids: Vec<&str> = assembly.chapters.iter().map(|chapter| chapter.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(assembly.chapters[2].scenes, ["2"]);
        assert_eq!(assembly.unassigned, ["2"]);
    }
}

#[test]
fn empty_timeline_still_yields_one_chapter() {
    let dir = tempfile::tempdir().unwrap();
    let document = json!({
        "definitions": {"types": types()},
        "data": {"items": {"byId": {}}, "narrative": {"children": []}}
    });
    let path = write_project(&dir, "empty.aeon", &document);

    let chapters = assembled_chapters(&path);
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].2, ChapterKind::Normal);
    assert!(chapters[0].3.is_empty());
}

#[test]
fn table_positions_sort_numerically_and_nest_by_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_table(
        &dir,
        "export.csv",
        "\
Label,Type,Narrative Position,Start Date,End Date
Later scene,Event,Scene 1.10.1,1910-04-09,
Book,Narrative Folder,Part 1,,
Second,Narrative Folder,Chapter 1.10,,
First,Narrative Folder,Chapter 1.2,,
Early scene,Event,Scene 1.2.2,1910-04-02,
Earliest scene,Event,Scene 1.2.1,1910-04-01,
Unplaced,Event,,1910-05-01,
",
    );

    let chapters = assembled_chapters(&path);
    let titles: Vec<&str> = chapters.iter().map(|chapter| chapter.0.as_str()).collect();
    assert_eq!(titles, ["Part 1", "Chapter 1", "Chapter 2", "Other events"]);
    assert_eq!(chapters[1].3, ["3", "2"]);
    assert_eq!(chapters[2].3, ["1"]);
    assert_eq!(chapters[3].3, ["4"]);
}

#[test]
fn damaged_container_is_corrupted_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.aeon");
    fs::write(&path, b"\x00\x01{\"definitions\": {\"types\": {").unwrap();

    let err = read_source(&path, &ImportConfig::default()).unwrap_err();
    assert!(matches!(err, SourceError::CorruptedData(_)));
}

#[test]
fn missing_source_is_reported_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.aeon");

    let err = read_source(&path, &ImportConfig::default()).unwrap_err();
    assert!(matches!(err, SourceError::SourceNotFound(missing) if missing == path));
}
