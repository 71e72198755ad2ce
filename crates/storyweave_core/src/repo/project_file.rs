//! Project repository contract and the yWriter 7 file implementation.
//!
//! # Responsibility
//! - Read and write whole project documents at one path.
//! - Refuse to touch a document its host application holds open.
//!
//! # Invariants
//! - A lock marker `<path>.lock` blocks both reads and writes.
//! - A write either leaves the complete new document at `path` or restores
//!   the previous one from `<path>.bak`.
//! - Raw-text fields are stored as CDATA blocks holding unescaped text.

use crate::config::ImportConfig;
use crate::model::project::ProjectDocument;
use crate::repo::xml_tree::Element;
use crate::repo::yw7_codec;
use log::{error, info, warn};
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

const LOCK_SUFFIX: &str = ".lock";
const BACKUP_SUFFIX: &str = ".bak";

/// Elements whose text is written as CDATA.
pub const RAW_TEXT_TAGS: [&str; 20] = [
    "Title",
    "AuthorName",
    "Bio",
    "Desc",
    "FieldTitle1",
    "FieldTitle2",
    "FieldTitle3",
    "FieldTitle4",
    "LaTeXHeaderFile",
    "Tags",
    "AKA",
    "ImageFile",
    "FullName",
    "Goals",
    "Notes",
    "RTFFile",
    "SceneContent",
    "Outcome",
    "Goal",
    "Conflict",
];

pub type ProjectFileResult<T> = Result<T, ProjectFileError>;

/// Project persistence failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectFileError {
    TargetLocked(PathBuf),
    TargetWriteFailure { path: PathBuf, message: String },
    ProjectUnreadable { path: PathBuf, message: String },
    InvalidProject(String),
}

impl Display for ProjectFileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetLocked(path) => write!(
                f,
                "project seems to be open in yWriter, please close it first: {}",
                path.display()
            ),
            Self::TargetWriteFailure { path, message } => {
                write!(f, "cannot write project {}: {message}", path.display())
            }
            Self::ProjectUnreadable { path, message } => {
                write!(f, "cannot read project {}: {message}", path.display())
            }
            Self::InvalidProject(message) => write!(f, "invalid project file: {message}"),
        }
    }
}

impl Error for ProjectFileError {}

/// Repository interface for whole-document project persistence.
pub trait ProjectRepository {
    /// Whether a project document already exists at the target.
    fn exists(&self) -> bool;
    fn read_project(&mut self) -> ProjectFileResult<ProjectDocument>;
    fn write_project(&mut self, document: &ProjectDocument) -> ProjectFileResult<()>;
}

/// `.yw7` file-backed project repository.
///
/// Keeps the tree of the last read so a write can patch it.
pub struct Yw7ProjectFile<'cfg> {
    path: PathBuf,
    config: &'cfg ImportConfig,
    tree: Option<Element>,
}

impl<'cfg> Yw7ProjectFile<'cfg> {
    pub fn new(path: impl Into<PathBuf>, config: &'cfg ImportConfig) -> Self {
        Self {
            path: path.into(),
            config,
            tree: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        with_suffix(&self.path, LOCK_SUFFIX)
    }

    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, BACKUP_SUFFIX)
    }

    pub fn is_locked(&self) -> bool {
        self.lock_path().exists()
    }

    fn ensure_unlocked(&self) -> ProjectFileResult<()> {
        if self.is_locked() {
            return Err(ProjectFileError::TargetLocked(self.path.clone()));
        }
        Ok(())
    }
}

impl ProjectRepository for Yw7ProjectFile<'_> {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read_project(&mut self) -> ProjectFileResult<ProjectDocument> {
        let started_at = Instant::now();
        info!(
            "event=project_read module=repo status=start path={}",
            self.path.display()
        );
        let result = self.ensure_unlocked().and_then(|()| {
            let text = fs::read_to_string(&self.path).map_err(|err| {
                ProjectFileError::ProjectUnreadable {
                    path: self.path.clone(),
                    message: err.to_string(),
                }
            })?;
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
            let root = Element::parse(text)
                .map_err(|err| ProjectFileError::InvalidProject(err.to_string()))?;
            let document = yw7_codec::decode(&root, self.config)?;
            Ok((root, document))
        });

        match result {
            Ok((root, document)) => {
                self.tree = Some(root);
                info!(
                    "event=project_read module=repo status=ok scenes={} chapters={} duration_ms={}",
                    document.scenes.len(),
                    document.chapters.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(document)
            }
            Err(err) => {
                error!(
                    "event=project_read module=repo status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn write_project(&mut self, document: &ProjectDocument) -> ProjectFileResult<()> {
        let started_at = Instant::now();
        info!(
            "event=project_write module=repo status=start path={}",
            self.path.display()
        );
        let result = self.ensure_unlocked().and_then(|()| {
            let root = yw7_codec::encode(document, self.tree.clone(), self.config);
            let xml = root
                .to_document(&RAW_TEXT_TAGS)
                .map_err(|err| ProjectFileError::InvalidProject(err.to_string()))?;
            replace_with_backup(&self.path, &self.backup_path(), |path| {
                write_file(path, xml.as_bytes())
            })?;
            Ok(root)
        });

        match result {
            Ok(root) => {
                self.tree = Some(root);
                info!(
                    "event=project_write module=repo status=ok scenes={} chapters={} duration_ms={}",
                    document.scenes.len(),
                    document.chapters.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=project_write module=repo status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Moves an existing `path` to `backup`, runs `write`, and restores the
/// backup when the write fails.
fn replace_with_backup<W>(path: &Path, backup: &Path, write: W) -> ProjectFileResult<()>
where
    W: FnOnce(&Path) -> io::Result<()>,
{
    let write_failure = |err: io::Error| ProjectFileError::TargetWriteFailure {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let backed_up = path.exists();
    if backed_up {
        fs::rename(path, backup).map_err(write_failure)?;
    }

    if let Err(err) = write(path) {
        if backed_up {
            if let Err(restore_err) = fs::rename(backup, path) {
                error!(
                    "event=project_restore module=repo status=error path={} error={}",
                    path.display(),
                    restore_err
                );
            }
        } else if let Err(cleanup_err) = fs::remove_file(path) {
            if cleanup_err.kind() != io::ErrorKind::NotFound {
                warn!(
                    "event=project_cleanup module=repo status=error path={} error={}",
                    path.display(),
                    cleanup_err
                );
            }
        }
        return Err(write_failure(err));
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
