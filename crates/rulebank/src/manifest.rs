//! The bank manifest (`config.json`).
//!
//! The manifest is the metadata index for the bank: which rules exist, whether
//! they shipped with the tool, and whether their content has been touched.
//! Rule content itself lives in files next to the manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::{Result, RuleError};

/// Version string written into freshly synthesized manifests
pub const MANIFEST_VERSION: &str = "1.0.0";

/// One rule tracked by the bank manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    /// Slug derived from the name, unique within the manifest
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Shipped with the tool. Never changes after creation.
    #[serde(default)]
    pub is_builtin: bool,
    /// Content has been opened for editing at least once
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,
    /// Fields written by other versions of the tool, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuleEntry {
    /// A pristine builtin entry.
    pub fn builtin(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_builtin: true,
            is_modified: false,
            last_modified: Utc::now(),
            extra: Map::new(),
        }
    }

    /// A user-authored entry. Custom rules start out modified.
    pub fn custom(id: String, name: String, description: String) -> Self {
        Self {
            id,
            name,
            description,
            is_builtin: false,
            is_modified: true,
            last_modified: Utc::now(),
            extra: Map::new(),
        }
    }

    /// Builtin whose content still lives in the template set
    pub fn is_pristine(&self) -> bool {
        self.is_builtin && !self.is_modified
    }

    /// Flip `is_modified` on. Returns true if the flag changed.
    pub fn mark_modified(&mut self) -> bool {
        if self.is_modified {
            return false;
        }
        self.is_modified = true;
        self.last_modified = Utc::now();
        true
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleBankManifest {
    pub version: String,
    #[serde(default = "Utc::now")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<RuleEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuleBankManifest {
    pub fn new(categories: Vec<RuleEntry>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            last_update: Utc::now(),
            categories,
            extra: Map::new(),
        }
    }

    /// Load and parse a manifest file.
    ///
    /// A file that exists but does not parse is reported as
    /// [`RuleError::CorruptManifest`] rather than replaced.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| RuleError::CorruptManifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the manifest as JSON pretty-printed with 4-space indentation.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        fs::write(path, buf)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RuleEntry> {
        self.categories.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut RuleEntry> {
        self.categories.iter_mut().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Remove an entry, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<RuleEntry> {
        let pos = self.categories.iter().position(|e| e.id == id)?;
        Some(self.categories.remove(pos))
    }
}

/// Derive a rule id from its display name.
///
/// Lower-cases the name and collapses every run of characters outside
/// `[a-z0-9]` into a single `-`. Leading and trailing separators are kept.
pub fn rule_id_from_name(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            id.push(c);
            in_separator = false;
        } else if !in_separator {
            id.push('-');
            in_separator = true;
        }
    }

    id
}
