//! Import configuration.
//!
//! # Responsibility
//! - Enumerate every recognized import option with its default.
//! - Validate options once before a run starts.
//!
//! # Invariants
//! - A validated config has non-blank titles, prefixes and labels.
//! - Custom field names are XML element names, unique per entity kind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Options for one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Title prefix for part-level chapters built from dotted positions.
    pub part_heading_prefix: String,
    /// Title prefix for chapters built from dotted positions.
    pub chapter_heading_prefix: String,
    pub unassigned_chapter_title: String,
    pub unassigned_chapter_desc: String,
    /// Title of the chapter synthesized when a source has no structure.
    pub default_chapter_title: String,
    pub type_labels: TypeLabels,
    pub reference_labels: ReferenceLabels,
    pub table_fields: TableFields,
    pub custom_fields: CustomFieldNames,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            part_heading_prefix: "Part".to_string(),
            chapter_heading_prefix: "Chapter".to_string(),
            unassigned_chapter_title: "Other events".to_string(),
            unassigned_chapter_desc:
                "Scenes generated from events that are not assigned to the narrative structure."
                    .to_string(),
            default_chapter_title: "Chapter 1".to_string(),
            type_labels: TypeLabels::default(),
            reference_labels: ReferenceLabels::default(),
            table_fields: TableFields::default(),
            custom_fields: CustomFieldNames::default(),
        }
    }
}

/// Type labels matched against the source type dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeLabels {
    pub event: String,
    pub narrative: String,
    pub character: String,
    pub location: String,
    pub item: String,
}

impl Default for TypeLabels {
    fn default() -> Self {
        Self {
            event: "Event".to_string(),
            narrative: "Narrative Folder".to_string(),
            character: "Character".to_string(),
            location: "Location".to_string(),
            item: "Item".to_string(),
        }
    }
}

/// Relationship labels linking events to other entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceLabels {
    pub participant: String,
    pub location: String,
    pub item: String,
}

impl Default for ReferenceLabels {
    fn default() -> Self {
        Self {
            participant: "Participant".to_string(),
            location: "Location".to_string(),
            item: "Item".to_string(),
        }
    }
}

/// Column labels of the tabular source variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFields {
    pub label: String,
    pub kind: String,
    pub narrative_position: String,
    pub start_date: String,
    pub end_date: String,
    pub summary: String,
    pub notes: String,
    pub tags: String,
    pub characters: String,
    pub viewpoint: String,
    pub locations: String,
    pub items: String,
    pub character_bio: String,
    pub character_aka: String,
}

impl Default for TableFields {
    fn default() -> Self {
        Self {
            label: "Label".to_string(),
            kind: "Type".to_string(),
            narrative_position: "Narrative Position".to_string(),
            start_date: "Start Date".to_string(),
            end_date: "End Date".to_string(),
            summary: "Summary".to_string(),
            notes: "Notes".to_string(),
            tags: "Tags".to_string(),
            characters: "Characters".to_string(),
            viewpoint: "Viewpoint".to_string(),
            locations: "Locations".to_string(),
            items: "Items".to_string(),
            character_bio: "bio".to_string(),
            character_aka: "aka".to_string(),
        }
    }
}

impl TableFields {
    fn labels(&self) -> [(&'static str, &str); 14] {
        [
            ("label", &self.label),
            ("kind", &self.kind),
            ("narrative_position", &self.narrative_position),
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
            ("summary", &self.summary),
            ("notes", &self.notes),
            ("tags", &self.tags),
            ("characters", &self.characters),
            ("viewpoint", &self.viewpoint),
            ("locations", &self.locations),
            ("items", &self.items),
            ("character_bio", &self.character_bio),
            ("character_aka", &self.character_aka),
        ]
    }
}

/// Recognized custom field names per entity kind.
///
/// Names are used verbatim as element names below `Fields` in the project
/// file. Fields present on disk but not listed here are passed through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldNames {
    pub project: Vec<String>,
    pub chapter: Vec<String>,
    pub scene: Vec<String>,
    pub character: Vec<String>,
    pub location: Vec<String>,
    pub item: Vec<String>,
}

impl CustomFieldNames {
    fn groups(&self) -> [(&'static str, &[String]); 6] {
        [
            ("project", &self.project),
            ("chapter", &self.chapter),
            ("scene", &self.scene),
            ("character", &self.character),
            ("location", &self.location),
            ("item", &self.item),
        ]
    }
}

impl ImportConfig {
    /// Validates all options.
    ///
    /// # Errors
    /// - `BlankOption` for an empty title, prefix or label.
    /// - `InvalidCustomField` for a name that is not an XML element name.
    /// - `DuplicateCustomField` for a name listed twice for one kind.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        require_text(&self.part_heading_prefix, "part_heading_prefix")?;
        require_text(&self.chapter_heading_prefix, "chapter_heading_prefix")?;
        require_text(&self.unassigned_chapter_title, "unassigned_chapter_title")?;
        require_text(&self.default_chapter_title, "default_chapter_title")?;

        require_text(&self.type_labels.event, "type_labels.event")?;
        require_text(&self.type_labels.narrative, "type_labels.narrative")?;
        require_text(&self.type_labels.character, "type_labels.character")?;
        require_text(&self.type_labels.location, "type_labels.location")?;
        require_text(&self.type_labels.item, "type_labels.item")?;

        require_text(&self.reference_labels.participant, "reference_labels.participant")?;
        require_text(&self.reference_labels.location, "reference_labels.location")?;
        require_text(&self.reference_labels.item, "reference_labels.item")?;

        for (name, value) in self.table_fields.labels() {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::BlankOption(format!("table_fields.{name}")));
            }
        }

        for (kind, names) in self.custom_fields.groups() {
            let mut dedup = BTreeSet::new();
            for name in names {
                if !is_element_name(name) {
                    return Err(ConfigValidationError::InvalidCustomField {
                        kind,
                        name: name.clone(),
                    });
                }
                if !dedup.insert(name.as_str()) {
                    return Err(ConfigValidationError::DuplicateCustomField {
                        kind,
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn require_text(value: &str, option: &str) -> Result<(), ConfigValidationError> {
    if value.trim().is_empty() {
        return Err(ConfigValidationError::BlankOption(option.to_string()));
    }
    Ok(())
}

fn is_element_name(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if value
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"))
    {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    BlankOption(String),
    InvalidCustomField { kind: &'static str, name: String },
    DuplicateCustomField { kind: &'static str, name: String },
}

impl Display for ConfigValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankOption(option) => write!(f, "option `{option}` must not be blank"),
            Self::InvalidCustomField { kind, name } => {
                write!(f, "invalid {kind} custom field name `{name}`")
            }
            Self::DuplicateCustomField { kind, name } => {
                write!(f, "duplicate {kind} custom field name `{name}`")
            }
        }
    }
}

impl Error for ConfigValidationError {}
