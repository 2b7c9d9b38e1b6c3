//! rulebank: a shared catalog of coding-convention rules and the logic that
//! copies them into projects.
//!
//! This crate provides the two pieces a front end needs:
//! - [`RuleBank`]: the persistent bank directory and its `config.json` manifest
//!   (builtin vs. custom entries, pristine vs. modified)
//! - [`ProjectRules`]: detection of a project's rule layout (a `rules/`
//!   directory, a single legacy `.clinerules` file, or nothing yet) and CRUD
//!   scoped to that layout, plus import from the bank
//!
//! Neither component formats user-facing text. Failures are reported as
//! [`RuleError`] values for the caller to render.

use std::path::PathBuf;

pub mod bank;
pub mod config;
pub mod lock;
pub mod manifest;
pub mod project;
pub mod templates;

// Re-export main types
pub use bank::{RuleBank, RuleSource};
pub use config::Config;
pub use manifest::{rule_id_from_name, RuleBankManifest, RuleEntry};
pub use project::{ProjectMode, ProjectRuleConfig, ProjectRuleEntry, ProjectRules};
pub use templates::Templates;

/// Manifest file at the root of the bank
pub const MANIFEST_FILE_NAME: &str = "config.json";

/// Content file inside a directory-stored rule (bank rules and builtin templates)
pub const RULE_CONTENT_FILE_NAME: &str = ".clinerules";

/// Skeleton written when no best-practices template is available
pub const SKELETON_CONTENT: &str = "# Role\n# Goal\n";

/// Errors surfaced by the bank and the project resolver
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("No workspace folder is open")]
    NoWorkspace,

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("A rule with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Target already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("No project rule found")]
    NoProjectRule,

    #[error("The legacy .clinerules file cannot be deleted rule by rule")]
    LegacyFileDelete,

    #[error("Rule '{0}' is not a builtin rule")]
    NotBuiltin(String),

    #[error("Invalid rule name: {0:?}")]
    InvalidName(String),

    #[error("Rule bank manifest is corrupt: {}", path.display())]
    CorruptManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Rule bank is locked by another process (pid {0})")]
    BankLocked(u32),

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
