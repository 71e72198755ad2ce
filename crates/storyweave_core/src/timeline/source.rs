//! Source file access and format detection.
//!
//! # Responsibility
//! - Load a timeline file and pick the reader by probing its content.
//! - Isolate the JSON document embedded in a binary project container.
//!
//! # Invariants
//! - Detection never depends on the file extension.

use crate::config::ImportConfig;
use crate::model::timeline::TimelineSource;
use crate::timeline::{aeon_csv, aeon_json, SourceError, SourceResult};
use csv::ReaderBuilder;
use log::{error, info};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

const UTF8_BOM: &str = "\u{feff}";

/// Reads and parses one timeline source.
///
/// # Side effects
/// - Emits `source_read` logging events with duration and status.
///
/// # Errors
/// - `SourceNotFound` / `SourceUnreadable` for I/O failures.
/// - Reader errors (`CorruptedData`, `MissingRequiredField`, ...) unchanged.
pub fn read_source(path: &Path, config: &ImportConfig) -> SourceResult<TimelineSource> {
    let started_at = Instant::now();
    info!("event=source_read module=timeline status=start");

    let result = load_bytes(path).and_then(|bytes| parse_source(path, &bytes, config));
    match &result {
        Ok(source) => info!(
            "event=source_read module=timeline status=ok format={:?} entities={} roots={} duration_ms={}",
            source.format,
            source.entities.len(),
            source.narrative.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=source_read module=timeline status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn load_bytes(path: &Path) -> SourceResult<Vec<u8>> {
    std::fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => SourceError::SourceNotFound(path.to_path_buf()),
        _ => SourceError::SourceUnreadable {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    })
}

fn parse_source(path: &Path, bytes: &[u8], config: &ImportConfig) -> SourceResult<TimelineSource> {
    if is_table(bytes, config) {
        let text = std::str::from_utf8(bytes).map_err(|err| SourceError::SourceUnreadable {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        return aeon_csv::parse_table(text.trim_start_matches(UTF8_BOM), config);
    }

    let embedded = extract_embedded_json(bytes)?;
    let text = std::str::from_utf8(embedded).map_err(|err| SourceError::SourceUnreadable {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    aeon_json::parse_project(text, config)
}

/// Probes the first line for a CSV header holding the configured type and
/// label columns.
///
/// A first line carrying container bytes or an embedded JSON object is never
/// a table header, whatever text its JSON values contain.
pub fn is_table(bytes: &[u8], config: &ImportConfig) -> bool {
    let first_line = bytes
        .split(|byte| *byte == b'\n')
        .next()
        .unwrap_or_default();
    let Ok(line) = std::str::from_utf8(first_line) else {
        return false;
    };
    let line = line.trim_start_matches(UTF8_BOM);
    if line.contains(['\0', '{']) {
        return false;
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let Some(Ok(header)) = reader.records().next() else {
        return false;
    };
    let has_column = |name: &str| header.iter().any(|cell| cell.trim() == name);
    has_column(&config.table_fields.kind) && has_column(&config.table_fields.label)
}

/// Returns every byte from the first `{` through its matching `}`.
///
/// # Errors
/// - `CorruptedData` when there is no opening bracket or brackets never balance.
pub fn extract_embedded_json(bytes: &[u8]) -> SourceResult<&[u8]> {
    let start = bytes
        .iter()
        .position(|byte| *byte == b'{')
        .ok_or_else(|| SourceError::CorruptedData("no embedded JSON document".to_string()))?;

    let mut depth = 0usize;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&bytes[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    Err(SourceError::CorruptedData(
        "unbalanced brackets in embedded JSON document".to_string(),
    ))
}
