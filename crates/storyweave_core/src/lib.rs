//! Core domain logic for StoryWeave.
//! Imports Aeon Timeline 3 timelines into yWriter 7 projects without
//! discarding what the author already wrote.

pub mod config;
pub mod logging;
pub mod merge;
pub mod model;
pub mod repo;
pub mod service;
pub mod timeline;

pub use config::{ConfigValidationError, ImportConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use merge::{merge, MergeError, MergeResult};
pub use model::project::{IntegrityError, ProjectDocument};
pub use model::timeline::TimelineSource;
pub use repo::{ProjectFileError, ProjectFileResult, ProjectRepository, Yw7ProjectFile};
pub use service::import_service::{
    import_timeline, target_path, ImportError, ImportReport, ImportResult, ImportService,
};
pub use timeline::{SourceError, SourceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
