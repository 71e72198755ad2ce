//! Domain model for timeline sources and project documents.
//!
//! # Responsibility
//! - Define the source-side records read from a timeline.
//! - Define the persisted project document shared by merge and codec.
//!
//! # Invariants
//! - Project entities refer to each other only by collection-local id.
//! - Ordering sequences, not map iteration, define display order.

pub mod project;
pub mod timeline;
