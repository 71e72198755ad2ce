//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate timeline reading, merging and project persistence into
//!   use-case level APIs.
//! - Keep the CLI decoupled from pipeline and storage details.

pub mod import_service;
