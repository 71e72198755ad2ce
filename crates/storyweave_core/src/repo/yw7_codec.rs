//! yWriter 7 project codec.
//!
//! # Responsibility
//! - Decode a `YWRITER7` element tree into a `ProjectDocument`.
//! - Encode a document by patching the tree it was read from, so elements
//!   the model does not know about survive a write.
//!
//! # Invariants
//! - Collections are decoded in document order.
//! - Chapter-derived scene flags are reconstructed after decoding and are
//!   never trusted from the scene elements alone.
//! - `None` model fields leave the corresponding element untouched.

use crate::config::ImportConfig;
use crate::model::project::{
    Chapter, ChapterKind, ChapterLevel, Character, Collection, CustomFields, EntityId,
    ProjectDocument, ProjectInfo, Scene, SceneStatus, SceneTime, WorldElement,
};
use crate::repo::project_file::{ProjectFileError, ProjectFileResult};
use crate::repo::xml_tree::Element;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::str::FromStr;

pub const ROOT_TAG: &str = "YWRITER7";
const FORMAT_VERSION: &str = "7";
const FLAG_SET: &str = "-1";
const SECTIONS: [&str; 6] = [
    "PROJECT",
    "LOCATIONS",
    "ITEMS",
    "CHARACTERS",
    "SCENES",
    "CHAPTERS",
];

static MARKUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[/?[a-zA-Z]+\d*\]").expect("valid markup regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Decodes a parsed project tree.
///
/// # Errors
/// - `InvalidProject` for a foreign root, an entity without `ID`, a duplicate
///   id, an unparsable number, or a chapter listing a missing scene.
pub fn decode(root: &Element, config: &ImportConfig) -> ProjectFileResult<ProjectDocument> {
    if root.name != ROOT_TAG {
        return Err(invalid(format!(
            "root element is `{}`, expected `{ROOT_TAG}`",
            root.name
        )));
    }
    let custom = &config.custom_fields;
    let mut document = ProjectDocument::default();

    if let Some(project) = root.child("PROJECT") {
        document.info = ProjectInfo {
            title: text(project, "Title"),
            desc: text(project, "Desc"),
            author_name: text(project, "AuthorName"),
            custom: read_custom(project, &custom.project),
        };
    }

    for element in entities(root, "LOCATIONS", "LOCATION") {
        let id = entity_id(element, "location")?;
        let record = decode_world_element(element, &custom.location);
        insert_unique(&mut document.locations, "location", id, record)?;
    }
    for element in entities(root, "ITEMS", "ITEM") {
        let id = entity_id(element, "item")?;
        let record = decode_world_element(element, &custom.item);
        insert_unique(&mut document.items, "item", id, record)?;
    }
    for element in entities(root, "CHARACTERS", "CHARACTER") {
        let id = entity_id(element, "character")?;
        let record = Character {
            title: text(element, "Title"),
            desc: text(element, "Desc"),
            aka: text(element, "AKA"),
            tags: tags(element),
            notes: text(element, "Notes"),
            bio: text(element, "Bio"),
            goals: text(element, "Goals"),
            full_name: text(element, "FullName"),
            is_major: Some(element.child("Major").is_some()),
            custom: read_custom(element, &custom.character),
        };
        insert_unique(&mut document.characters, "character", id, record)?;
    }
    for element in entities(root, "SCENES", "SCENE") {
        let id = entity_id(element, "scene")?;
        let record = decode_scene(element, &id, &custom.scene)?;
        insert_unique(&mut document.scenes, "scene", id, record)?;
    }
    for element in entities(root, "CHAPTERS", "CHAPTER") {
        let id = entity_id(element, "chapter")?;
        let record = decode_chapter(element, &custom.chapter);
        if let Some(missing) = record.scenes.iter().find(|scene| !document.scenes.contains(scene)) {
            return Err(invalid(format!("chapter {id} lists missing scene {missing}")));
        }
        insert_unique(&mut document.chapters, "chapter", id, record)?;
    }

    document.inherit_chapter_flags();
    Ok(document)
}

/// Encodes `document`, patching `base` when it is a project tree.
pub fn encode(document: &ProjectDocument, base: Option<Element>, config: &ImportConfig) -> Element {
    let custom = &config.custom_fields;
    let mut root = base
        .filter(|root| root.name == ROOT_TAG)
        .unwrap_or_else(|| Element::new(ROOT_TAG));
    for section in SECTIONS {
        root.ensure_child(section);
    }

    encode_project(root.ensure_child("PROJECT"), &document.info, &custom.project);

    rebuild_section(
        root.ensure_child("LOCATIONS"),
        "LOCATION",
        &document.locations,
        |element, _, record, sort_order| {
            encode_world_element(element, record, &custom.location);
            element.set_child_text("SortOrder", sort_order.to_string());
        },
    );
    rebuild_section(
        root.ensure_child("ITEMS"),
        "ITEM",
        &document.items,
        |element, _, record, sort_order| {
            encode_world_element(element, record, &custom.item);
            element.set_child_text("SortOrder", sort_order.to_string());
        },
    );
    rebuild_section(
        root.ensure_child("CHARACTERS"),
        "CHARACTER",
        &document.characters,
        |element, _, record, sort_order| {
            encode_character(element, record, &custom.character);
            element.set_child_text("SortOrder", sort_order.to_string());
        },
    );

    let owners: HashMap<&str, &EntityId> = document
        .chapters
        .iter()
        .flat_map(|(chapter_id, chapter)| {
            chapter.scenes.iter().map(move |scene_id| (scene_id.as_str(), chapter_id))
        })
        .collect();
    rebuild_section(
        root.ensure_child("SCENES"),
        "SCENE",
        &document.scenes,
        |element, id, record, _| {
            let owner = owners.get(id.as_str()).copied();
            encode_scene(element, record, owner, &custom.scene);
        },
    );
    rebuild_section(
        root.ensure_child("CHAPTERS"),
        "CHAPTER",
        &document.chapters,
        |element, _, record, sort_order| {
            element.set_child_text("SortOrder", sort_order.to_string());
            encode_chapter(element, record, &custom.chapter);
        },
    );

    root
}

/// Word and letter counts of scene text, ignoring inline markup tags.
pub fn text_counts(content: &str) -> (usize, usize) {
    let plain = MARKUP_RE.replace_all(content, "");
    let words = WHITESPACE_RE
        .split(plain.trim())
        .filter(|word| !word.is_empty())
        .count();
    let letters = plain.chars().filter(|ch| !ch.is_whitespace()).count();
    (words, letters)
}

fn invalid(message: String) -> ProjectFileError {
    ProjectFileError::InvalidProject(message)
}

fn entities<'a>(root: &'a Element, section: &str, tag: &'a str) -> impl Iterator<Item = &'a Element> {
    root.child(section)
        .into_iter()
        .flat_map(move |section| section.children_named(tag))
}

fn entity_id(element: &Element, kind: &str) -> ProjectFileResult<EntityId> {
    element
        .child_text("ID")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{kind} element without ID")))
}

fn insert_unique<T>(
    collection: &mut Collection<T>,
    kind: &str,
    id: EntityId,
    record: T,
) -> ProjectFileResult<()> {
    if collection.contains(&id) {
        return Err(invalid(format!("duplicate {kind} id {id}")));
    }
    collection.insert(id, record);
    Ok(())
}

fn text(element: &Element, name: &str) -> Option<String> {
    element.child_text(name).map(str::to_string)
}

fn number<T: FromStr>(element: &Element, name: &str, owner: &str) -> ProjectFileResult<Option<T>> {
    match element.child_text(name).map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| invalid(format!("{owner}: `{name}` is not a number: {value}"))),
    }
}

fn tags(element: &Element) -> Option<Vec<String>> {
    element.child_text("Tags").map(|value| {
        value
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn id_list(element: &Element, list: &str, entry: &str) -> Option<Vec<EntityId>> {
    element.child(list).map(|list| {
        list.children_named(entry)
            .map(|id| id.text.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    })
}

fn field_value<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element.child("Fields").and_then(|fields| fields.child_text(name))
}

fn read_custom(element: &Element, names: &[String]) -> CustomFields {
    names
        .iter()
        .filter_map(|name| field_value(element, name).map(|value| (name.clone(), value.to_string())))
        .collect()
}

fn decode_world_element(element: &Element, custom: &[String]) -> WorldElement {
    WorldElement {
        title: text(element, "Title"),
        desc: text(element, "Desc"),
        aka: text(element, "AKA"),
        tags: tags(element),
        custom: read_custom(element, custom),
    }
}

fn decode_scene(element: &Element, id: &str, custom: &[String]) -> ProjectFileResult<Scene> {
    let owner = format!("scene {id}");
    let status = match number::<u8>(element, "Status", &owner)? {
        Some(code) => Some(
            SceneStatus::from_code(code)
                .ok_or_else(|| invalid(format!("{owner}: unknown status {code}")))?,
        ),
        None => None,
    };
    let scene_type = field_value(element, "Field_SceneType").map(str::trim);

    Ok(Scene {
        title: text(element, "Title"),
        desc: text(element, "Desc"),
        content: text(element, "SceneContent"),
        notes: text(element, "Notes"),
        tags: tags(element),
        status,
        when: decode_time(element, &owner)?,
        lasts_days: number(element, "LastsDays", &owner)?,
        lasts_hours: number(element, "LastsHours", &owner)?,
        lasts_minutes: number(element, "LastsMinutes", &owner)?,
        is_notes_scene: Some(scene_type == Some("1")),
        is_todo_scene: Some(scene_type == Some("2")),
        is_unused: Some(element.child("Unused").is_some()),
        characters: id_list(element, "Characters", "CharID"),
        locations: id_list(element, "Locations", "LocID"),
        items: id_list(element, "Items", "ItemID"),
        custom: read_custom(element, custom),
    })
}

fn decode_time(element: &Element, owner: &str) -> ProjectFileResult<Option<SceneTime>> {
    if let Some(value) = element.child_text("SpecificDateTime") {
        let mut date = None;
        let mut time = None;
        for part in value.split_whitespace() {
            if part.contains('-') {
                date = Some(part.to_string());
            } else if part.contains(':') {
                time = Some(part.to_string());
            }
        }
        return Ok(date.map(|date| SceneTime::Specific {
            date,
            time: time.unwrap_or_else(|| "00:00:00".to_string()),
        }));
    }

    let day = number(element, "Day", owner)?;
    let hour = number(element, "Hour", owner)?;
    let minute = number(element, "Minute", owner)?;
    if day.is_none() && hour.is_none() && minute.is_none() {
        return Ok(None);
    }
    Ok(Some(SceneTime::Relative { day, hour, minute }))
}

fn decode_chapter(element: &Element, custom: &[String]) -> Chapter {
    let level = if element.child("SectionStart").is_some() {
        ChapterLevel::Part
    } else {
        ChapterLevel::Chapter
    };
    let type_code = element
        .child_text("ChapterType")
        .or_else(|| element.child_text("Type"))
        .map(str::trim);
    let kind = if field_value(element, "Field_IsTrash").map(str::trim) == Some("1") {
        ChapterKind::Trash
    } else {
        match type_code {
            Some("1") => ChapterKind::Notes,
            Some("2") => ChapterKind::Todo,
            _ => ChapterKind::Normal,
        }
    };

    Chapter {
        title: text(element, "Title"),
        desc: text(element, "Desc"),
        level: Some(level),
        kind: Some(kind),
        is_unused: Some(element.child("Unused").is_some()),
        scenes: id_list(element, "Scenes", "ScID").unwrap_or_default(),
        custom: read_custom(element, custom),
    }
}

/// Replaces the entity elements of `section` with one element per record,
/// reusing the previous element of the same `ID`.
fn rebuild_section<T>(
    section: &mut Element,
    tag: &str,
    collection: &Collection<T>,
    mut fill: impl FnMut(&mut Element, &EntityId, &T, usize),
) {
    let mut previous: HashMap<String, Element> = HashMap::new();
    let mut others = Vec::new();
    for child in std::mem::take(&mut section.children) {
        if child.name != tag {
            others.push(child);
            continue;
        }
        if let Some(id) = child.child_text("ID").map(|id| id.trim().to_string()) {
            previous.insert(id, child);
        }
    }
    section.children = others;

    for (index, (id, record)) in collection.iter().enumerate() {
        let mut element = previous.remove(id.as_str()).unwrap_or_else(|| {
            let mut element = Element::new(tag);
            element.set_child_text("ID", id.clone());
            element
        });
        fill(&mut element, id, record, index + 1);
        section.children.push(element);
    }
}

fn set_text(element: &mut Element, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        element.set_child_text(name, value.clone());
    }
}

fn set_number<T: ToString>(element: &mut Element, name: &str, value: Option<T>) {
    if let Some(value) = value {
        element.set_child_text(name, value.to_string());
    }
}

fn set_flag(element: &mut Element, name: &str, value: Option<bool>) {
    match value {
        Some(true) => {
            if element.child(name).is_none() {
                element.set_child_text(name, FLAG_SET);
            }
        }
        Some(false) => element.remove_children(name),
        None => {}
    }
}

fn set_tags(element: &mut Element, tags: &Option<Vec<String>>) {
    if let Some(tags) = tags {
        element.set_child_text("Tags", tags.join(";"));
    }
}

fn set_id_list(element: &mut Element, list: &str, entry: &str, ids: &Option<Vec<EntityId>>) {
    if let Some(ids) = ids {
        let list = element.ensure_child(list);
        list.text.clear();
        list.children = ids.iter().map(|id| Element::with_text(entry, id.clone())).collect();
    }
}

fn set_field(element: &mut Element, name: &str, value: Option<&str>) {
    match value {
        Some(value) => element.ensure_child("Fields").set_child_text(name, value),
        None => {
            if let Some(fields) = element.child_mut("Fields") {
                fields.remove_children(name);
            }
        }
    }
}

/// Writes configured custom fields; unconfigured ones are left alone.
fn write_custom(element: &mut Element, names: &[String], custom: &CustomFields) {
    for name in names {
        let value = custom
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty());
        set_field(element, name, value);
    }
}

fn encode_project(element: &mut Element, info: &ProjectInfo, custom: &[String]) {
    element.set_child_text("Ver", FORMAT_VERSION);
    set_text(element, "Title", &info.title);
    set_text(element, "Desc", &info.desc);
    set_text(element, "AuthorName", &info.author_name);
    write_custom(element, custom, &info.custom);
}

fn encode_world_element(element: &mut Element, record: &WorldElement, custom: &[String]) {
    set_text(element, "Title", &record.title);
    set_text(element, "Desc", &record.desc);
    set_text(element, "AKA", &record.aka);
    set_tags(element, &record.tags);
    write_custom(element, custom, &record.custom);
}

fn encode_character(element: &mut Element, record: &Character, custom: &[String]) {
    set_text(element, "Title", &record.title);
    set_text(element, "Desc", &record.desc);
    set_text(element, "Notes", &record.notes);
    set_text(element, "AKA", &record.aka);
    set_tags(element, &record.tags);
    set_text(element, "Bio", &record.bio);
    set_text(element, "Goals", &record.goals);
    set_text(element, "FullName", &record.full_name);
    set_flag(element, "Major", record.is_major);
    write_custom(element, custom, &record.custom);
}

fn encode_scene(element: &mut Element, scene: &Scene, owner: Option<&EntityId>, custom: &[String]) {
    set_text(element, "Title", &scene.title);
    set_text(element, "Desc", &scene.desc);
    if let Some(chapter_id) = owner {
        element.set_child_text("BelongsToChID", chapter_id.clone());
    }

    if let Some(content) = scene.content.as_deref() {
        let (words, letters) = text_counts(content);
        element.set_child_text("SceneContent", content);
        element.set_child_text("WordCount", words.to_string());
        element.set_child_text("LetterCount", letters.to_string());
    }

    set_flag(element, "Unused", scene.is_unused);
    let current_type = field_value(element, "Field_SceneType").map(|value| value.trim().to_string());
    match (scene.is_notes_scene, scene.is_todo_scene) {
        (Some(true), _) => set_field(element, "Field_SceneType", Some("1")),
        (_, Some(true)) => set_field(element, "Field_SceneType", Some("2")),
        (notes, todo) => {
            let stale = match current_type.as_deref() {
                Some("1") => notes == Some(false),
                Some("2") => todo == Some(false),
                _ => false,
            };
            if stale {
                set_field(element, "Field_SceneType", None);
            }
        }
    }
    write_custom(element, custom, &scene.custom);

    set_number(element, "Status", scene.status.map(SceneStatus::code));
    set_text(element, "Notes", &scene.notes);
    set_tags(element, &scene.tags);

    match &scene.when {
        Some(SceneTime::Specific { date, time }) => {
            element.set_child_text("SpecificDateTime", format!("{date} {time}"));
            element.set_child_text("SpecificDateMode", FLAG_SET);
            for name in ["Day", "Hour", "Minute"] {
                element.remove_children(name);
            }
        }
        Some(SceneTime::Relative { day, hour, minute }) => {
            element.remove_children("SpecificDateTime");
            element.remove_children("SpecificDateMode");
            set_number(element, "Day", *day);
            set_number(element, "Hour", *hour);
            set_number(element, "Minute", *minute);
        }
        None => {}
    }
    set_number(element, "LastsDays", scene.lasts_days);
    set_number(element, "LastsHours", scene.lasts_hours);
    set_number(element, "LastsMinutes", scene.lasts_minutes);

    set_id_list(element, "Characters", "CharID", &scene.characters);
    set_id_list(element, "Locations", "LocID", &scene.locations);
    set_id_list(element, "Items", "ItemID", &scene.items);
}

fn encode_chapter(element: &mut Element, chapter: &Chapter, custom: &[String]) {
    set_text(element, "Title", &chapter.title);
    set_text(element, "Desc", &chapter.desc);
    match chapter.level {
        Some(ChapterLevel::Part) => set_flag(element, "SectionStart", Some(true)),
        Some(ChapterLevel::Chapter) => set_flag(element, "SectionStart", Some(false)),
        None => {}
    }

    match chapter.kind {
        Some(ChapterKind::Trash) => set_field(element, "Field_IsTrash", Some("1")),
        Some(kind) => {
            let code = match kind {
                ChapterKind::Notes => "1",
                ChapterKind::Todo => "2",
                _ => "0",
            };
            element.set_child_text("Type", if code == "0" { "0" } else { "1" });
            element.set_child_text("ChapterType", code);
            set_field(element, "Field_IsTrash", None);
        }
        None => {}
    }
    set_flag(element, "Unused", chapter.is_unused);
    write_custom(element, custom, &chapter.custom);

    element.remove_children("Scenes");
    if !chapter.scenes.is_empty() {
        let mut scenes = Element::new("Scenes");
        scenes.children = chapter
            .scenes
            .iter()
            .map(|id| Element::with_text("ScID", id.clone()))
            .collect();
        element.children.push(scenes);
    }
}
