use std::fs;
use std::path::PathBuf;
use storyweave_core::model::project::{
    Chapter, ChapterKind, ChapterLevel, ProjectDocument, Scene, SceneStatus, SceneTime,
};
use storyweave_core::{ImportConfig, ProjectFileError, ProjectRepository, Yw7ProjectFile};
use tempfile::TempDir;

const EXISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<YWRITER7>
<PROJECT><Ver>7</Ver><Title>Harbour</Title><AuthorName>J. Doe</AuthorName><Fields><Field_Editor>M.</Field_Editor></Fields></PROJECT>
<LOCATIONS><LOCATION><ID>1</ID><Title>Lighthouse</Title><SortOrder>1</SortOrder></LOCATION></LOCATIONS>
<ITEMS/>
<CHARACTERS><CHARACTER><ID>1</ID><Title>Alice</Title><Major>-1</Major><ImageFile>alice.png</ImageFile></CHARACTER></CHARACTERS>
<SCENES>
<SCENE><ID>1</ID><Title>Arrival &amp; storm</Title><BelongsToChID>1</BelongsToChID><Status>2</Status><SceneContent><![CDATA[It was [i]dark[/i] & wet.]]></SceneContent><Goal>Get ashore</Goal><SpecificDateTime>1910-04-05 08:00:00</SpecificDateTime><SpecificDateMode>-1</SpecificDateMode><Fields><Field_Mood>grim</Field_Mood></Fields><Characters><CharID>1</CharID></Characters><Locations><LocID>1</LocID></Locations></SCENE>
<SCENE><ID>2</ID><Title>Letters</Title><BelongsToChID>2</BelongsToChID><Status>1</Status><Day>3</Day><Hour>14</Hour></SCENE>
</SCENES>
<CHAPTERS>
<CHAPTER><ID>1</ID><Title>Landfall</Title><SortOrder>1</SortOrder><Type>0</Type><ChapterType>0</ChapterType><Scenes><ScID>1</ScID></Scenes></CHAPTER>
<CHAPTER><ID>2</ID><Title>Research</Title><SortOrder>2</SortOrder><Type>1</Type><ChapterType>1</ChapterType><Unused>-1</Unused><Scenes><ScID>2</ScID></Scenes></CHAPTER>
</CHAPTERS>
<PROJECTNOTES><PROJECTNOTE><ID>1</ID><Title>Tide tables</Title></PROJECTNOTE></PROJECTNOTES>
</YWRITER7>
"#;

fn config() -> ImportConfig {
    let mut config = ImportConfig::default();
    config.custom_fields.scene = vec!["Field_Mood".to_string()];
    config
}

fn existing_project(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("harbour.yw7");
    fs::write(&path, EXISTING).unwrap();
    path
}

#[test]
fn read_decodes_every_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);

    assert!(repo.exists());
    let document = repo.read_project().unwrap();
    assert_eq!(document.info.title.as_deref(), Some("Harbour"));
    assert_eq!(document.locations.len(), 1);
    assert_eq!(document.characters.get("1").unwrap().is_major, Some(true));

    let arrival = document.scenes.get("1").unwrap();
    assert_eq!(arrival.title.as_deref(), Some("Arrival & storm"));
    assert_eq!(arrival.content.as_deref(), Some("It was [i]dark[/i] & wet."));
    assert_eq!(arrival.status, Some(SceneStatus::Draft));
    assert_eq!(arrival.custom.get("Field_Mood").map(String::as_str), Some("grim"));
    assert_eq!(
        arrival.when,
        Some(SceneTime::Specific {
            date: "1910-04-05".to_string(),
            time: "08:00:00".to_string(),
        })
    );

    let letters = document.scenes.get("2").unwrap();
    assert_eq!(
        letters.when,
        Some(SceneTime::Relative {
            day: Some(3),
            hour: Some(14),
            minute: None,
        })
    );
    // Scenes of an unused notes chapter inherit both flags.
    assert_eq!(letters.is_notes_scene, Some(true));
    assert_eq!(letters.is_unused, Some(true));
    assert_eq!(document.chapters.get("2").unwrap().kind, Some(ChapterKind::Notes));
}

#[test]
fn unchanged_write_round_trips_and_keeps_unknown_elements() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);

    let document = repo.read_project().unwrap();
    repo.write_project(&document).unwrap();
    let first_write = fs::read_to_string(&path).unwrap();

    let mut reread = Yw7ProjectFile::new(&path, &config);
    assert_eq!(reread.read_project().unwrap(), document);
    reread.write_project(&document).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), first_write);

    for kept in [
        "<Goal><![CDATA[Get ashore]]></Goal>",
        "<ImageFile><![CDATA[alice.png]]></ImageFile>",
        "<Field_Editor>M.</Field_Editor>",
        "<PROJECTNOTES>",
        "<Title><![CDATA[Tide tables]]></Title>",
    ] {
        assert!(first_write.contains(kept), "missing {kept}");
    }
}

#[test]
fn raw_text_is_written_as_cdata() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);

    let document = repo.read_project().unwrap();
    repo.write_project(&document).unwrap();
    let written = fs::read_to_string(&path).unwrap();

    assert!(written.contains("<Title><![CDATA[Arrival & storm]]></Title>"));
    assert!(written.contains("<SceneContent><![CDATA[It was [i]dark[/i] & wet.]]></SceneContent>"));
    assert!(written.contains("<WordCount>5</WordCount>"));
    assert!(!written.contains("&amp;"));
}

#[test]
fn write_keeps_previous_file_as_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);

    let mut document = repo.read_project().unwrap();
    document.scenes.get_mut("1").unwrap().title = Some("Landing".to_string());
    repo.write_project(&document).unwrap();

    assert_eq!(fs::read_to_string(repo.backup_path()).unwrap(), EXISTING);
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("<Title><![CDATA[Landing]]></Title>"));
}

#[test]
fn lock_marker_refuses_read_and_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);
    fs::write(repo.lock_path(), "").unwrap();

    assert!(repo.is_locked());
    assert_eq!(
        repo.read_project().unwrap_err(),
        ProjectFileError::TargetLocked(path.clone())
    );
    assert_eq!(
        repo.write_project(&ProjectDocument::default()).unwrap_err(),
        ProjectFileError::TargetLocked(path.clone())
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), EXISTING);
    assert!(!repo.backup_path().exists());
}

#[test]
fn new_project_is_created_without_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.yw7");
    let config = ImportConfig::default();
    let mut repo = Yw7ProjectFile::new(&path, &config);
    assert!(!repo.exists());

    let mut document = ProjectDocument::default();
    document.info.title = Some("Fresh".to_string());
    document.scenes.insert(
        "1",
        Scene {
            title: Some("Opening".to_string()),
            status: Some(SceneStatus::Outline),
            ..Scene::default()
        },
    );
    document.chapters.insert(
        "1",
        Chapter {
            title: Some("Part One".to_string()),
            level: Some(ChapterLevel::Part),
            kind: Some(ChapterKind::Normal),
            ..Chapter::default()
        },
    );
    document.chapters.insert(
        "2",
        Chapter {
            title: Some("Chapter 1".to_string()),
            level: Some(ChapterLevel::Chapter),
            kind: Some(ChapterKind::Normal),
            scenes: vec!["1".to_string()],
            ..Chapter::default()
        },
    );
    repo.write_project(&document).unwrap();

    assert!(path.is_file());
    assert!(!repo.backup_path().exists());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("<?xml"));
    assert!(written.contains("<SectionStart>-1</SectionStart>"));
    assert!(written.contains("<BelongsToChID>2</BelongsToChID>"));

    let reread = Yw7ProjectFile::new(&path, &config).read_project().unwrap();
    assert_eq!(reread.chapters.order(), ["1", "2"]);
    assert_eq!(reread.chapters.get("1").unwrap().level, Some(ChapterLevel::Part));
    assert_eq!(reread.chapter_of("1").map(String::as_str), Some("2"));
}

#[test]
fn foreign_documents_are_invalid_projects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.yw7");
    fs::write(&path, "<?xml version=\"1.0\"?><HTML><BODY/></HTML>").unwrap();
    let config = ImportConfig::default();

    let err = Yw7ProjectFile::new(&path, &config).read_project().unwrap_err();
    assert!(matches!(err, ProjectFileError::InvalidProject(_)));
}

#[test]
fn duplicate_scene_ids_are_invalid_projects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twice.yw7");
    fs::write(
        &path,
        "<YWRITER7><SCENES><SCENE><ID>1</ID></SCENE><SCENE><ID>1</ID></SCENE></SCENES></YWRITER7>",
    )
    .unwrap();
    let config = ImportConfig::default();

    let err = Yw7ProjectFile::new(&path, &config).read_project().unwrap_err();
    assert!(matches!(err, ProjectFileError::InvalidProject(message) if message.contains("duplicate")));
}

#[test]
fn markup_inside_raw_text_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);

    let mut document = repo.read_project().unwrap();
    {
        let arrival = document.scenes.get_mut("1").unwrap();
        arrival.desc = Some("Use <Notes>tags</Notes> here".to_string());
        arrival.notes = Some("A <Title> & a ]]> marker".to_string());
    }
    repo.write_project(&document).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("<Desc><![CDATA[Use <Notes>tags</Notes> here]]></Desc>"));

    let reread = Yw7ProjectFile::new(&path, &config).read_project().unwrap();
    let arrival = reread.scenes.get("1").unwrap();
    assert_eq!(arrival.desc.as_deref(), Some("Use <Notes>tags</Notes> here"));
    assert_eq!(arrival.notes.as_deref(), Some("A <Title> & a ]]> marker"));
}

#[test]
fn plain_field_whitespace_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("padded.yw7");
    fs::write(
        &path,
        EXISTING.replace(
            "<Field_Mood>grim</Field_Mood>",
            "<Field_Mood>  grim and grey </Field_Mood>",
        ),
    )
    .unwrap();
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);

    let document = repo.read_project().unwrap();
    let mood = |document: &ProjectDocument| {
        document.scenes.get("1").unwrap().custom.get("Field_Mood").cloned()
    };
    assert_eq!(mood(&document).as_deref(), Some("  grim and grey "));

    repo.write_project(&document).unwrap();
    let reread = Yw7ProjectFile::new(&path, &config).read_project().unwrap();
    assert_eq!(mood(&reread).as_deref(), Some("  grim and grey "));
}

#[test]
fn blocked_backup_reports_write_failure_and_keeps_project() {
    let dir = tempfile::tempdir().unwrap();
    let path = existing_project(&dir);
    let config = config();
    let mut repo = Yw7ProjectFile::new(&path, &config);
    let document = repo.read_project().unwrap();

    // A non-empty directory at the backup path cannot be replaced by the project file.
    fs::create_dir(repo.backup_path()).unwrap();
    fs::write(repo.backup_path().join("keep"), "").unwrap();

    let err = repo.write_project(&document).unwrap_err();
    assert!(matches!(err, ProjectFileError::TargetWriteFailure { path: ref failed, .. } if *failed == path));
    assert_eq!(fs::read_to_string(&path).unwrap(), EXISTING);
    assert!(repo.backup_path().is_dir());
}
