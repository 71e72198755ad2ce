//! Project persistence.
//!
//! # Responsibility
//! - Define the project repository contract used by import orchestration.
//! - Keep XML and file-system details out of merge and service code.
//!
//! # Invariants
//! - Reads and writes refuse a project whose lock marker exists.
//! - Writes go through the backup-then-replace discipline.

pub mod project_file;
pub mod xml_tree;
pub mod yw7_codec;

pub use project_file::{ProjectFileError, ProjectFileResult, ProjectRepository, Yw7ProjectFile};
