//! Rules that live inside a project.
//!
//! A project keeps its rules in one of three shapes, detected fresh on every
//! call:
//!
//! - `directory`: `<root>/.clinerules/rules/*.md`, or the older
//!   `<root>/.roo/rules/*.md`
//! - `singleFile`: one merged `<root>/.clinerules` file
//! - `none`: nothing yet; the first create or import writes `.clinerules`
//!
//! Bank content is only ever read through [`RuleBank`], never written.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::bank::{RuleBank, RuleSource};
use crate::templates::Templates;
use crate::{Result, RuleError, SKELETON_CONTENT};

/// Directory name of the current project rule layout
pub const PROJECT_DIR_NAME: &str = ".clinerules";
/// Directory name of the older project rule layout
pub const LEGACY_PROJECT_DIR_NAME: &str = ".roo";
/// Single merged rule file at the project root
pub const LEGACY_FILE_NAME: &str = ".clinerules";
/// Subfolder holding one markdown file per rule
pub const RULES_DIR_NAME: &str = "rules";
/// Id of the placeholder entry listed for a single-file project
pub const LEGACY_RULE_ID: &str = "legacy_rule";

/// How a project stores its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectMode {
    Directory,
    SingleFile,
    None,
}

impl std::fmt::Display for ProjectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectMode::Directory => "directory",
            ProjectMode::SingleFile => "singleFile",
            ProjectMode::None => "none",
        };
        f.write_str(s)
    }
}

/// Detected storage mode and the path it is rooted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRuleConfig {
    pub mode: ProjectMode,
    /// Rules directory parent, legacy file, or workspace root for `none`
    pub path: PathBuf,
}

/// One rule as listed for a project. Recomputed on every listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRuleEntry {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Project-scoped rule operations over an optional workspace root.
#[derive(Debug, Clone)]
pub struct ProjectRules {
    root: Option<PathBuf>,
    templates: Templates,
}

impl ProjectRules {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            templates: Templates::Embedded,
        }
    }

    /// Use a specific template set for seeding new directory-mode rules.
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn require_root(&self) -> Result<&Path> {
        self.root.as_deref().ok_or(RuleError::NoWorkspace)
    }

    /// Probe the project root. First match wins:
    /// `.clinerules/` dir, `.roo/` dir, `.clinerules` file, else `none`.
    pub fn detect_mode(&self) -> ProjectRuleConfig {
        let Some(root) = self.root.as_deref() else {
            return ProjectRuleConfig {
                mode: ProjectMode::None,
                path: PathBuf::new(),
            };
        };

        let modern = root.join(PROJECT_DIR_NAME);
        if modern.is_dir() {
            return ProjectRuleConfig {
                mode: ProjectMode::Directory,
                path: modern,
            };
        }

        let legacy_dir = root.join(LEGACY_PROJECT_DIR_NAME);
        if legacy_dir.is_dir() {
            return ProjectRuleConfig {
                mode: ProjectMode::Directory,
                path: legacy_dir,
            };
        }

        let legacy_file = root.join(LEGACY_FILE_NAME);
        if legacy_file.is_file() {
            return ProjectRuleConfig {
                mode: ProjectMode::SingleFile,
                path: legacy_file,
            };
        }

        ProjectRuleConfig {
            mode: ProjectMode::None,
            path: root.to_path_buf(),
        }
    }

    /// Rules visible in the current mode.
    pub fn list(&self) -> Result<Vec<ProjectRuleEntry>> {
        let config = self.detect_mode();
        match config.mode {
            ProjectMode::Directory => {
                let rules_dir = config.path.join(RULES_DIR_NAME);
                if !rules_dir.is_dir() {
                    return Ok(Vec::new());
                }

                let mut stems = Vec::new();
                for entry in fs::read_dir(&rules_dir)? {
                    let path = entry?.path();
                    if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                        if let Some(stem) = path.file_stem() {
                            stems.push(stem.to_string_lossy().into_owned());
                        }
                    }
                }
                stems.sort();

                Ok(stems
                    .into_iter()
                    .map(|stem| ProjectRuleEntry {
                        description: format!("Project Rule: {stem}"),
                        name: stem.clone(),
                        id: stem,
                    })
                    .collect())
            }
            ProjectMode::SingleFile => Ok(vec![ProjectRuleEntry {
                id: LEGACY_RULE_ID.to_string(),
                name: ".clinerules file".to_string(),
                description: "Legacy single rule file.".to_string(),
            }]),
            ProjectMode::None => Ok(Vec::new()),
        }
    }

    /// Create a project rule and return the path written.
    pub fn create(&self, name: &str, description: &str) -> Result<PathBuf> {
        let root = self.require_root()?;
        validate_file_name(name)?;

        let config = self.detect_mode();
        match config.mode {
            ProjectMode::Directory => {
                let rules_dir = config.path.join(RULES_DIR_NAME);
                fs::create_dir_all(&rules_dir)?;

                let path = rules_dir.join(format!("{name}.md"));
                let content = self
                    .templates
                    .best_practices()?
                    .unwrap_or_else(|| SKELETON_CONTENT.to_string());
                write_new(&path, content.as_bytes())?;

                tracing::info!("Created project rule {:?}", path);
                Ok(path)
            }
            ProjectMode::SingleFile | ProjectMode::None => {
                let path = root.join(LEGACY_FILE_NAME);
                let section = format!(
                    "\n\n# Rule: {name}\n# Description: {description}\n\n# Role\n\n# Goal\n\n---"
                );

                if path.exists() {
                    append(&path, section.as_bytes())?;
                } else {
                    fs::write(&path, section.trim())?;
                }

                tracing::info!("Added rule section '{}' to {:?}", name, path);
                Ok(path)
            }
        }
    }

    /// Path of the file to open for editing `id`.
    pub fn edit(&self, id: &str) -> Result<PathBuf> {
        let config = self.detect_mode();
        match config.mode {
            ProjectMode::Directory => {
                validate_file_name(id).map_err(|_| RuleError::RuleNotFound(id.to_string()))?;
                let path = config.path.join(RULES_DIR_NAME).join(format!("{id}.md"));
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(RuleError::RuleNotFound(id.to_string()))
                }
            }
            ProjectMode::SingleFile => Ok(config.path),
            ProjectMode::None => Err(RuleError::NoProjectRule),
        }
    }

    /// Delete a directory-mode rule file.
    pub fn delete(&self, id: &str) -> Result<()> {
        let config = self.detect_mode();
        match config.mode {
            ProjectMode::Directory => {
                validate_file_name(id).map_err(|_| RuleError::RuleNotFound(id.to_string()))?;
                let path = config.path.join(RULES_DIR_NAME).join(format!("{id}.md"));
                if !path.is_file() {
                    return Err(RuleError::RuleNotFound(id.to_string()));
                }
                fs::remove_file(&path)?;
                tracing::info!("Deleted project rule {:?}", path);
                Ok(())
            }
            ProjectMode::SingleFile => Err(RuleError::LegacyFileDelete),
            ProjectMode::None => Err(RuleError::NoProjectRule),
        }
    }

    /// Copy a bank rule into the project and return the path written.
    ///
    /// In directory mode the rule becomes `rules/<id>.md`; an existing file is
    /// never overwritten. Otherwise the content is appended to the legacy
    /// file under a `# From Rule Bank: <name>` header.
    pub fn import_from_bank(&self, bank: &RuleBank, id: &str) -> Result<PathBuf> {
        let root = self.require_root()?;
        let entry = bank.get(id)?;
        let source = bank.resolve_content(id)?;

        let config = self.detect_mode();
        match config.mode {
            ProjectMode::Directory => {
                // Bank files are copied byte for byte
                let content = match &source {
                    RuleSource::Bank(path) => fs::read(path)?,
                    RuleSource::Template { .. } => bank.read_content(&source)?.into_bytes(),
                };

                let rules_dir = config.path.join(RULES_DIR_NAME);
                fs::create_dir_all(&rules_dir)?;

                let path = rules_dir.join(format!("{}.md", import_file_stem(id)));
                write_new(&path, &content)?;

                tracing::info!("Imported bank rule '{}' to {:?}", id, path);
                Ok(path)
            }
            ProjectMode::SingleFile | ProjectMode::None => {
                let content = bank.read_content(&source)?;
                let path = root.join(LEGACY_FILE_NAME);

                if path.exists() {
                    let section = format!("\n\n---\n\n# From Rule Bank: {}\n\n{}", entry.name, content);
                    append(&path, section.as_bytes())?;
                } else {
                    fs::write(&path, format!("# From Rule Bank: {}\n\n{}", entry.name, content))?;
                }

                tracing::info!("Merged bank rule '{}' into {:?}", id, path);
                Ok(path)
            }
        }
    }

    /// Switch a project with no rules to the directory layout by creating
    /// `.clinerules/rules/`. Returns the rules directory.
    pub fn init_directory(&self) -> Result<PathBuf> {
        let root = self.require_root()?;
        let config = self.detect_mode();
        match config.mode {
            ProjectMode::Directory => Ok(config.path.join(RULES_DIR_NAME)),
            ProjectMode::SingleFile => Err(RuleError::AlreadyExists(config.path)),
            ProjectMode::None => {
                let rules_dir = root.join(PROJECT_DIR_NAME).join(RULES_DIR_NAME);
                fs::create_dir_all(&rules_dir)?;
                tracing::info!("Initialized project rules directory {:?}", rules_dir);
                Ok(rules_dir)
            }
        }
    }
}

/// File stem used when importing a bank rule; nested ids are flattened
fn import_file_stem(id: &str) -> String {
    id.replace(['/', '\\'], "-")
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(RuleError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Write a file that must not exist yet
fn write_new(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(RuleError::AlreadyExists(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(content)?;
    Ok(())
}

fn append(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::BEST_PRACTICES_TEMPLATE;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectRules) {
        let temp = TempDir::new().unwrap();
        let rules = ProjectRules::new(Some(temp.path().to_path_buf()));
        (temp, rules)
    }

    fn bank_in(temp: &TempDir) -> RuleBank {
        RuleBank::open(temp.path().join("bank"), Templates::Embedded).unwrap()
    }

    #[test]
    fn test_detect_none_without_root() {
        let rules = ProjectRules::new(None);
        let config = rules.detect_mode();
        assert_eq!(config.mode, ProjectMode::None);
        assert_eq!(config.path, PathBuf::new());
        assert!(rules.list().unwrap().is_empty());
    }

    #[test]
    fn test_detect_none_is_rooted_at_workspace() {
        let (temp, rules) = project();
        let config = rules.detect_mode();
        assert_eq!(config.mode, ProjectMode::None);
        assert_eq!(config.path, temp.path());
    }

    #[test]
    fn test_detect_legacy_directory_is_stable() {
        let (temp, rules) = project();
        fs::create_dir_all(temp.path().join(".roo")).unwrap();

        for _ in 0..3 {
            let config = rules.detect_mode();
            assert_eq!(config.mode, ProjectMode::Directory);
            assert_eq!(config.path, temp.path().join(".roo"));
        }
    }

    #[test]
    fn test_modern_directory_wins_over_legacy() {
        let (temp, rules) = project();
        fs::create_dir_all(temp.path().join(".roo")).unwrap();
        fs::create_dir_all(temp.path().join(".clinerules")).unwrap();

        let config = rules.detect_mode();
        assert_eq!(config.path, temp.path().join(".clinerules"));
    }

    #[test]
    fn test_detect_single_file() {
        let (temp, rules) = project();
        fs::write(temp.path().join(".clinerules"), "# Rules").unwrap();

        let config = rules.detect_mode();
        assert_eq!(config.mode, ProjectMode::SingleFile);
        assert_eq!(config.path, temp.path().join(".clinerules"));

        let entries = rules.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, LEGACY_RULE_ID);
        assert_eq!(entries[0].name, ".clinerules file");
    }

    #[test]
    fn test_detection_follows_external_changes() {
        let (temp, rules) = project();
        assert_eq!(rules.detect_mode().mode, ProjectMode::None);

        fs::create_dir_all(temp.path().join(".clinerules").join("rules")).unwrap();
        assert_eq!(rules.detect_mode().mode, ProjectMode::Directory);

        fs::remove_dir_all(temp.path().join(".clinerules")).unwrap();
        assert_eq!(rules.detect_mode().mode, ProjectMode::None);
    }

    #[test]
    fn test_directory_list_only_markdown() {
        let (temp, rules) = project();
        let rules_dir = temp.path().join(".clinerules").join("rules");
        fs::create_dir_all(rules_dir.join("nested")).unwrap();
        fs::write(rules_dir.join("testing.md"), "").unwrap();
        fs::write(rules_dir.join("api.md"), "").unwrap();
        fs::write(rules_dir.join("notes.txt"), "").unwrap();

        let entries = rules.list().unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["api", "testing"]);
        assert_eq!(entries[0].name, "api");
        assert_eq!(entries[0].description, "Project Rule: api");
    }

    #[test]
    fn test_directory_without_rules_folder_lists_nothing() {
        let (temp, rules) = project();
        fs::create_dir_all(temp.path().join(".roo")).unwrap();
        assert!(rules.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_requires_workspace() {
        let rules = ProjectRules::new(None);
        assert!(matches!(
            rules.create("foo", "bar"),
            Err(RuleError::NoWorkspace)
        ));
    }

    #[test]
    fn test_create_in_none_mode_builds_legacy_file() {
        let (temp, rules) = project();

        let path = rules.create("foo", "bar").unwrap();
        assert_eq!(path, temp.path().join(".clinerules"));
        let first = fs::read_to_string(&path).unwrap();
        assert_eq!(
            first,
            "# Rule: foo\n# Description: bar\n\n# Role\n\n# Goal\n\n---"
        );
        assert_eq!(rules.detect_mode().mode, ProjectMode::SingleFile);

        rules.create("baz", "qux").unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert!(second.starts_with(&first));
        assert!(second.ends_with("\n\n# Rule: baz\n# Description: qux\n\n# Role\n\n# Goal\n\n---"));
    }

    #[test]
    fn test_create_in_directory_mode() {
        let (temp, rules) = project();
        fs::create_dir_all(temp.path().join(".roo")).unwrap();

        let path = rules.create("testing", "ignored").unwrap();
        assert_eq!(path, temp.path().join(".roo").join("rules").join("testing.md"));
        assert_eq!(fs::read_to_string(&path).unwrap(), BEST_PRACTICES_TEMPLATE);

        assert!(matches!(
            rules.create("testing", "again"),
            Err(RuleError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_with_skeleton_templates() {
        let temp = TempDir::new().unwrap();
        let templates_dir = temp.path().join("templates");
        fs::create_dir_all(&templates_dir).unwrap();
        let root = temp.path().join("project");
        fs::create_dir_all(root.join(".clinerules")).unwrap();

        let rules = ProjectRules::new(Some(root)).with_templates(Templates::from_dir(templates_dir));
        let path = rules.create("api", "").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), SKELETON_CONTENT);
    }

    #[test]
    fn test_create_rejects_path_names() {
        let (temp, rules) = project();
        fs::create_dir_all(temp.path().join(".clinerules")).unwrap();

        assert!(matches!(
            rules.create("../escape", ""),
            Err(RuleError::InvalidName(_))
        ));
        assert!(matches!(rules.create("  ", ""), Err(RuleError::InvalidName(_))));
    }

    #[test]
    fn test_edit_by_mode() {
        let (temp, rules) = project();
        assert!(matches!(rules.edit("x"), Err(RuleError::NoProjectRule)));

        fs::write(temp.path().join(".clinerules"), "# Rules").unwrap();
        assert_eq!(
            rules.edit(LEGACY_RULE_ID).unwrap(),
            temp.path().join(".clinerules")
        );

        fs::remove_file(temp.path().join(".clinerules")).unwrap();
        fs::create_dir_all(temp.path().join(".clinerules").join("rules")).unwrap();
        assert!(matches!(rules.edit("missing"), Err(RuleError::RuleNotFound(_))));

        let path = rules.create("present", "").unwrap();
        assert_eq!(rules.edit("present").unwrap(), path);
    }

    #[test]
    fn test_delete_by_mode() {
        let (temp, rules) = project();
        assert!(matches!(rules.delete("x"), Err(RuleError::NoProjectRule)));

        fs::write(temp.path().join(".clinerules"), "# Rules").unwrap();
        assert!(matches!(
            rules.delete(LEGACY_RULE_ID),
            Err(RuleError::LegacyFileDelete)
        ));
        assert!(temp.path().join(".clinerules").exists());

        fs::remove_file(temp.path().join(".clinerules")).unwrap();
        fs::create_dir_all(temp.path().join(".clinerules")).unwrap();
        let path = rules.create("gone", "").unwrap();
        rules.delete("gone").unwrap();
        assert!(!path.exists());
        assert!(matches!(rules.delete("gone"), Err(RuleError::RuleNotFound(_))));
    }

    #[test]
    fn test_import_into_directory() {
        let (temp, rules) = project();
        let bank = bank_in(&temp);
        fs::create_dir_all(temp.path().join(".clinerules")).unwrap();

        let path = rules.import_from_bank(&bank, "web-react").unwrap();
        assert_eq!(
            path,
            temp.path().join(".clinerules").join("rules").join("web-react.md")
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            bank.read_rule("web-react").unwrap()
        );
    }

    #[test]
    fn test_import_never_overwrites() {
        let (temp, rules) = project();
        let bank = bank_in(&temp);
        let rules_dir = temp.path().join(".clinerules").join("rules");
        fs::create_dir_all(&rules_dir).unwrap();
        fs::write(rules_dir.join("general.md"), "local edits").unwrap();

        let result = rules.import_from_bank(&bank, "general");
        assert!(matches!(result, Err(RuleError::AlreadyExists(_))));
        assert_eq!(
            fs::read_to_string(rules_dir.join("general.md")).unwrap(),
            "local edits"
        );
    }

    #[test]
    fn test_import_copies_non_utf8_bank_file() {
        let (temp, rules) = project();
        let bank_root = temp.path().join("bank");
        let mut bank = RuleBank::open(&bank_root, Templates::Embedded).unwrap();
        let bytes = [b'#', b' ', 0xff, 0xfe, b'\n'];
        fs::write(bank_root.join("latin.md"), bytes).unwrap();
        bank.reconcile().unwrap();
        fs::create_dir_all(temp.path().join(".clinerules")).unwrap();

        let path = rules.import_from_bank(&bank, "latin").unwrap();
        assert_eq!(fs::read(path).unwrap(), bytes);
    }

    #[test]
    fn test_import_nested_bank_id_is_flattened() {
        let (temp, rules) = project();
        let bank_root = temp.path().join("bank");
        let mut bank = RuleBank::open(&bank_root, Templates::Embedded).unwrap();
        fs::create_dir_all(bank_root.join("team")).unwrap();
        fs::write(bank_root.join("team").join("style.md"), "# Team style").unwrap();
        bank.reconcile().unwrap();
        fs::create_dir_all(temp.path().join(".roo")).unwrap();

        let path = rules.import_from_bank(&bank, "team/style").unwrap();
        assert!(path.ends_with("team-style.md"));
        assert_eq!(fs::read_to_string(path).unwrap(), "# Team style");
    }

    #[test]
    fn test_import_appends_to_legacy_file() {
        let (temp, rules) = project();
        let bank = bank_in(&temp);
        let legacy = temp.path().join(".clinerules");
        let original = "# Existing\n\nkeep me  \r\n";
        fs::write(&legacy, original).unwrap();

        rules.import_from_bank(&bank, "general").unwrap();

        let merged = fs::read_to_string(&legacy).unwrap();
        assert!(merged.starts_with(original));
        let tail = &merged[original.len()..];
        assert!(tail.starts_with("\n\n---\n\n# From Rule Bank: General\n\n"));
        assert!(tail.ends_with(&bank.read_rule("general").unwrap()));
    }

    #[test]
    fn test_import_into_none_creates_legacy_file() {
        let (temp, rules) = project();
        let bank = bank_in(&temp);

        let path = rules.import_from_bank(&bank, "web-vue").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# From Rule Bank: Website - Vue\n\n"));
        assert_eq!(rules.detect_mode().mode, ProjectMode::SingleFile);
    }

    #[test]
    fn test_import_unknown_bank_rule() {
        let (temp, rules) = project();
        let bank = bank_in(&temp);
        assert!(matches!(
            rules.import_from_bank(&bank, "nope"),
            Err(RuleError::RuleNotFound(_))
        ));
        assert!(!temp.path().join(".clinerules").exists());
    }

    #[test]
    fn test_import_requires_workspace() {
        let temp = TempDir::new().unwrap();
        let bank = bank_in(&temp);
        let rules = ProjectRules::new(None);
        assert!(matches!(
            rules.import_from_bank(&bank, "general"),
            Err(RuleError::NoWorkspace)
        ));
    }

    #[test]
    fn test_import_does_not_touch_bank() {
        let (temp, rules) = project();
        let bank = bank_in(&temp);
        let manifest = fs::read_to_string(bank.root().join("config.json")).unwrap();

        rules.import_from_bank(&bank, "general").unwrap();
        assert_eq!(
            fs::read_to_string(bank.root().join("config.json")).unwrap(),
            manifest
        );
    }

    #[test]
    fn test_init_directory() {
        let (temp, rules) = project();

        let dir = rules.init_directory().unwrap();
        assert_eq!(dir, temp.path().join(".clinerules").join("rules"));
        assert!(dir.is_dir());
        assert_eq!(rules.detect_mode().mode, ProjectMode::Directory);

        // Repeating is harmless
        assert_eq!(rules.init_directory().unwrap(), dir);
    }

    #[test]
    fn test_init_directory_blocked_by_legacy_file() {
        let (temp, rules) = project();
        fs::write(temp.path().join(".clinerules"), "# Rules").unwrap();
        assert!(matches!(
            rules.init_directory(),
            Err(RuleError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(ProjectMode::SingleFile.to_string(), "singleFile");
        assert_eq!(
            serde_json::to_string(&ProjectMode::Directory).unwrap(),
            "\"directory\""
        );
    }
}
