use storyweave_core::model::project::{
    Chapter, ChapterKind, ChapterLevel, Character, ProjectDocument, Scene, SceneStatus, SceneTime,
    WorldElement,
};
use storyweave_core::merge;

fn scene(title: &str) -> Scene {
    Scene {
        title: Some(title.to_string()),
        status: Some(SceneStatus::Outline),
        is_notes_scene: Some(false),
        is_unused: Some(false),
        ..Scene::default()
    }
}

fn chapter(title: &str, scenes: &[&str]) -> Chapter {
    Chapter {
        title: Some(title.to_string()),
        level: Some(ChapterLevel::Chapter),
        kind: Some(ChapterKind::Normal),
        scenes: scenes.iter().map(|id| id.to_string()).collect(),
        ..Chapter::default()
    }
}

fn character(name: &str) -> Character {
    Character {
        title: Some(name.to_string()),
        ..Character::default()
    }
}

/// Two chapters, three timeline scenes, two characters.
fn imported() -> ProjectDocument {
    let mut document = ProjectDocument::default();
    document.characters.insert("1", character("Alice"));
    document.characters.insert("2", character("Bob"));
    document.scenes.insert(
        "1",
        Scene {
            characters: Some(vec!["1".to_string()]),
            when: Some(SceneTime::Specific {
                date: "1910-04-05".to_string(),
                time: "08:00:00".to_string(),
            }),
            ..scene("Arrival")
        },
    );
    document.scenes.insert("2", scene("Storm"));
    document.scenes.insert(
        "3",
        Scene {
            characters: Some(vec!["2".to_string(), "1".to_string()]),
            ..scene("Rescue")
        },
    );
    document.chapters.insert("1", chapter("Landfall", &["1", "2"]));
    document.chapters.insert("2", chapter("Aftermath", &["3"]));
    document
}

#[test]
fn absent_project_equals_empty_project() {
    let imported = imported();
    let from_nothing = merge(None, &imported).unwrap();
    let from_empty = merge(Some(ProjectDocument::default()), &imported).unwrap();
    assert_eq!(from_nothing, from_empty);
    assert_eq!(from_nothing.chapters.order(), ["1", "2"]);
    assert_eq!(from_nothing.chapters.get("1").unwrap().scenes, ["1", "2"]);
}

#[test]
fn merging_the_same_import_twice_changes_nothing() {
    let imported = imported();
    let once = merge(None, &imported).unwrap();
    let twice = merge(Some(once.clone()), &imported).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn manual_scene_survives_repeated_merges_in_place() {
    let imported = imported();
    let mut existing = merge(None, &imported).unwrap();
    existing.scenes.insert(
        "100",
        Scene {
            content: Some("Written by hand.".to_string()),
            ..scene("Interlude")
        },
    );
    existing
        .chapters
        .get_mut("1")
        .unwrap()
        .scenes
        .insert(1, "100".to_string());

    let first = merge(Some(existing), &imported).unwrap();
    assert_eq!(first.chapters.get("1").unwrap().scenes, ["1", "100", "2"]);
    let second = merge(Some(first.clone()), &imported).unwrap();
    assert_eq!(second, first);
    assert_eq!(
        second.scenes.get("100").unwrap().content.as_deref(),
        Some("Written by hand.")
    );
}

#[test]
fn scene_moved_in_the_timeline_moves_between_chapters() {
    let original = imported();
    let existing = merge(None, &original).unwrap();

    let mut moved = original.clone();
    moved.chapters.get_mut("1").unwrap().scenes = vec!["1".to_string()];
    moved.chapters.get_mut("2").unwrap().scenes = vec!["2".to_string(), "3".to_string()];

    let merged = merge(Some(existing), &moved).unwrap();
    assert_eq!(merged.chapters.get("1").unwrap().scenes, ["1"]);
    assert_eq!(merged.chapters.get("2").unwrap().scenes, ["2", "3"]);
    assert_eq!(merged.chapter_of("2").map(String::as_str), Some("2"));
}

#[test]
fn absent_imported_fields_keep_existing_values() {
    let imported = imported();
    let mut existing = merge(None, &imported).unwrap();
    {
        let scene = existing.scenes.get_mut("2").unwrap();
        scene.notes = Some("Check the tide tables.".to_string());
        scene.content = Some("The rain came sideways.".to_string());
        scene.status = Some(SceneStatus::Draft);
    }
    existing
        .info
        .custom
        .insert("Field_Editor".to_string(), "M.".to_string());

    let merged = merge(Some(existing), &imported).unwrap();
    let storm = merged.scenes.get("2").unwrap();
    assert_eq!(storm.notes.as_deref(), Some("Check the tide tables."));
    assert_eq!(storm.content.as_deref(), Some("The rain came sideways."));
    // Imported scenes always carry their status.
    assert_eq!(storm.status, Some(SceneStatus::Outline));
    assert_eq!(merged.info.custom.get("Field_Editor").map(String::as_str), Some("M."));
}

#[test]
fn empty_imported_title_keeps_existing_title() {
    let existing = merge(None, &imported()).unwrap();
    let mut untitled = imported();
    untitled.scenes.get_mut("2").unwrap().title = Some(String::new());

    let merged = merge(Some(existing), &untitled).unwrap();
    assert_eq!(merged.scenes.get("2").unwrap().title.as_deref(), Some("Storm"));
}

#[test]
fn dropped_character_is_pruned_from_scene_references() {
    let original = imported();
    let existing = merge(None, &original).unwrap();

    let mut reduced = original.clone();
    reduced.characters.remove("2");
    reduced.scenes.get_mut("3").unwrap().characters = None;

    let merged = merge(Some(existing), &reduced).unwrap();
    assert!(!merged.characters.contains("2"));
    assert_eq!(
        merged.scenes.get("3").unwrap().characters,
        Some(vec!["1".to_string()])
    );
    merged.check_integrity().unwrap();
}

#[test]
fn empty_imported_collection_leaves_existing_one_alone() {
    let imported = imported();
    let mut existing = merge(None, &imported).unwrap();
    existing.locations.insert(
        "1",
        WorldElement {
            title: Some("Lighthouse".to_string()),
            ..WorldElement::default()
        },
    );

    let merged = merge(Some(existing), &imported).unwrap();
    assert_eq!(
        merged.locations.get("1").and_then(|location| location.title.as_deref()),
        Some("Lighthouse")
    );
}

#[test]
fn existing_chapters_outside_the_import_are_kept() {
    let imported = imported();
    let mut existing = merge(None, &imported).unwrap();
    existing.chapters.insert("9", chapter("Appendix", &[]));

    let merged = merge(Some(existing), &imported).unwrap();
    assert_eq!(merged.chapters.order(), ["1", "2", "9"]);
}

#[test]
fn divider_markers_in_imported_content_split_the_scene() {
    let mut imported = imported();
    imported.scenes.get_mut("3").unwrap().content =
        Some("Boats at dawn.\n### Shore\nThey land.".to_string());

    let merged = merge(None, &imported).unwrap();
    let scenes = &merged.chapters.get("2").unwrap().scenes;
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0], "3");
    let split = merged.scenes.get(&scenes[1]).unwrap();
    assert_eq!(split.title.as_deref(), Some("Shore"));
    assert_eq!(
        merged.scenes.get("3").unwrap().content.as_deref(),
        Some("Boats at dawn.")
    );
}
