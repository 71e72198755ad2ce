//! Timeline import pipeline.
//!
//! # Responsibility
//! - Read timeline sources into the flat `TimelineSource` model.
//! - Classify entities, assemble the narrative structure, and build the
//!   imported project document.
//!
//! # Invariants
//! - Every stage returns `SourceResult`; nothing here panics on bad input.
//! - Id assignment is deterministic for a fixed source table order.

pub mod aeon_csv;
pub mod aeon_json;
pub mod assemble;
pub mod classify;
pub mod convert;
pub mod datetime;
pub mod source;

use crate::timeline::datetime::DateTimeError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while reading or interpreting a timeline source.
#[derive(Debug)]
pub enum SourceError {
    SourceNotFound(PathBuf),
    SourceUnreadable { path: PathBuf, message: String },
    /// Structural damage, e.g. unbalanced brackets around the embedded document.
    CorruptedData(String),
    MissingRequiredField(String),
    InvalidDateFormat(DateTimeError),
    /// The type dictionary matches no known schema.
    UnsupportedSourceVersion(String),
    InvalidData(String),
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotFound(path) => write!(f, "\"{}\" not found", path.display()),
            Self::SourceUnreadable { path, message } => {
                write!(f, "cannot read \"{}\": {message}", path.display())
            }
            Self::CorruptedData(message) => write!(f, "corrupted data: {message}"),
            Self::MissingRequiredField(name) => write!(f, "required field \"{name}\" is missing"),
            Self::InvalidDateFormat(err) => write!(f, "{err}"),
            Self::UnsupportedSourceVersion(message) => {
                write!(f, "unsupported timeline version: {message}")
            }
            Self::InvalidData(message) => write!(f, "invalid timeline data: {message}"),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDateFormat(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DateTimeError> for SourceError {
    fn from(value: DateTimeError) -> Self {
        Self::InvalidDateFormat(value)
    }
}
