//! Timeline import use case.
//!
//! # Responsibility
//! - Run one import: read the timeline, build the imported document, merge it
//!   into the existing project, and write the result.
//! - Turn every failure into one `ImportError` whose text is shown verbatim.
//!
//! # Invariants
//! - Nothing is written unless every earlier stage succeeded.
//! - An existing project is always read before it is overwritten.

use crate::config::{ConfigValidationError, ImportConfig};
use crate::merge::{merge, MergeError};
use crate::repo::{ProjectFileError, ProjectRepository, Yw7ProjectFile};
use crate::timeline::assemble::assemble;
use crate::timeline::classify::classify;
use crate::timeline::convert::build_document;
use crate::timeline::source::read_source;
use crate::timeline::SourceError;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Extension of the project file written next to the timeline source.
pub const PROJECT_EXTENSION: &str = "yw7";

pub type ImportResult<T> = Result<T, ImportError>;

/// Any failure of an import run.
#[derive(Debug)]
pub enum ImportError {
    Config(ConfigValidationError),
    Source(SourceError),
    Project(ProjectFileError),
    Merge(MergeError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "ERROR: invalid import configuration: {err}"),
            Self::Source(err) => write!(f, "ERROR: {err}"),
            Self::Project(err) => write!(f, "ERROR: {err}"),
            Self::Merge(err) => write!(f, "ERROR: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Source(err) => Some(err),
            Self::Project(err) => Some(err),
            Self::Merge(err) => Some(err),
        }
    }
}

impl From<ConfigValidationError> for ImportError {
    fn from(value: ConfigValidationError) -> Self {
        Self::Config(value)
    }
}

impl From<SourceError> for ImportError {
    fn from(value: SourceError) -> Self {
        Self::Source(value)
    }
}

impl From<ProjectFileError> for ImportError {
    fn from(value: ProjectFileError) -> Self {
        Self::Project(value)
    }
}

impl From<MergeError> for ImportError {
    fn from(value: MergeError) -> Self {
        Self::Merge(value)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub target: PathBuf,
    /// `false` when the project file was created by this run.
    pub updated: bool,
    pub scenes: usize,
    pub chapters: usize,
}

impl Display for ImportReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let verb = if self.updated { "updated" } else { "created" };
        write!(
            f,
            "SUCCESS: \"{}\" {verb} ({} scenes in {} chapters).",
            self.target.display(),
            self.scenes,
            self.chapters
        )
    }
}

/// Import use case over a project repository.
pub struct ImportService<'cfg, R: ProjectRepository> {
    repo: R,
    config: &'cfg ImportConfig,
    target: PathBuf,
}

impl<'cfg, R: ProjectRepository> ImportService<'cfg, R> {
    /// Creates a service writing through `repo`; `target` is only reported.
    pub fn new(repo: R, config: &'cfg ImportConfig, target: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            config,
            target: target.into(),
        }
    }

    /// Imports `source` into the repository's project.
    ///
    /// # Side effects
    /// - Reads the existing project, writes the merged one.
    /// - Emits `import_run` logging events.
    ///
    /// # Errors
    /// - Whatever stage fails first, wrapped in `ImportError`.
    pub fn run(&mut self, source: &Path) -> ImportResult<ImportReport> {
        let started_at = Instant::now();
        info!(
            "event=import_run module=service status=start source={} target={}",
            source.display(),
            self.target.display()
        );

        match self.import(source) {
            Ok(report) => {
                info!(
                    "event=import_run module=service status=ok updated={} scenes={} chapters={} duration_ms={}",
                    report.updated,
                    report.scenes,
                    report.chapters,
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=import_run module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn import(&mut self, source: &Path) -> ImportResult<ImportReport> {
        self.config.validate()?;

        let timeline = read_source(source, self.config)?;
        let classification = classify(&timeline);
        let assembly = assemble(&timeline, &classification, self.config);
        let mut imported = build_document(&classification, &assembly, self.config)?;

        let existing = if self.repo.exists() {
            Some(self.repo.read_project()?)
        } else {
            imported.info.title = source
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
            None
        };
        let updated = existing.is_some();

        let merged = merge(existing, &imported)?;
        self.repo.write_project(&merged)?;

        Ok(ImportReport {
            target: self.target.clone(),
            updated,
            scenes: merged.scenes.len(),
            chapters: merged.chapters.len(),
        })
    }
}

/// Project path for a timeline source: same directory and stem, `.yw7`.
pub fn target_path(source: &Path) -> PathBuf {
    source.with_extension(PROJECT_EXTENSION)
}

/// Imports `source` into the `.yw7` project next to it.
///
/// # Errors
/// - See `ImportService::run`.
pub fn import_timeline(source: &Path, config: &ImportConfig) -> ImportResult<ImportReport> {
    let target = target_path(source);
    let repo = Yw7ProjectFile::new(target.clone(), config);
    ImportService::new(repo, config, target).run(source)
}
