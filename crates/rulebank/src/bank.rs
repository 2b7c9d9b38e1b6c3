//! The rule bank: a directory of rules plus its `config.json` manifest.
//!
//! Layout:
//!
//! ```text
//! ~/.cline-rules/
//! ├── config.json            # manifest (metadata only)
//! ├── general/.clinerules    # directory-stored rule
//! ├── web-react/.clinerules
//! └── my-notes.md            # top-level markdown rule
//! ```
//!
//! Files are the source of truth for content; the manifest is the index.
//! Whenever the two disagree, [`RuleBank::reconcile`] appends entries for
//! untracked files. It never deletes anything.
//!
//! Builtin rules are copy-on-write: a pristine builtin entry may have no bank
//! file at all, in which case its content is read from the template set until
//! the first [`RuleBank::edit`] materializes it.

use chrono::Utc;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::lock::{acquire_bank_lock, BankLock};
use crate::manifest::{rule_id_from_name, RuleBankManifest, RuleEntry};
use crate::templates::Templates;
use crate::{Result, RuleError, MANIFEST_FILE_NAME, RULE_CONTENT_FILE_NAME, SKELETON_CONTENT};

/// Where a bank rule's content currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// A content file inside the bank directory
    Bank(PathBuf),
    /// A pristine builtin not yet materialized into the bank
    Template {
        id: String,
        /// Location of the template file when templates are on disk
        path: Option<PathBuf>,
    },
}

impl RuleSource {
    /// Filesystem path of the content, if it has one
    pub fn path(&self) -> Option<&Path> {
        match self {
            RuleSource::Bank(path) => Some(path),
            RuleSource::Template { path, .. } => path.as_deref(),
        }
    }
}

/// Handle on an initialized rule bank.
///
/// Mutating methods take `&mut self` and hold the on-disk bank lock for their
/// duration, re-reading the manifest first so that changes made by another
/// process are not overwritten.
#[derive(Debug)]
pub struct RuleBank {
    root: PathBuf,
    manifest_path: PathBuf,
    manifest: RuleBankManifest,
    templates: Templates,
}

impl RuleBank {
    /// Open the bank at `root`, initializing it on first use.
    ///
    /// - A missing root is created and seeded with the builtin template tree.
    /// - An existing `config.json` is loaded; if it does not parse the bank is
    ///   not touched and [`RuleError::CorruptManifest`] is returned.
    /// - A missing manifest is synthesized from the builtin catalog.
    ///
    /// Untracked rule files are then reconciled into the manifest. Opening is
    /// idempotent.
    pub fn open(root: impl Into<PathBuf>, templates: Templates) -> Result<Self> {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_FILE_NAME);
        let fresh = !root.exists();

        // Reading an initialized bank needs no lock
        if fresh || !manifest_path.exists() {
            let _lock = acquire_bank_lock(&root)?;

            if fresh {
                tracing::info!("Creating rule bank at {:?}", root);
                templates.install_into(&root)?;
            }
            if !manifest_path.exists() {
                tracing::info!("Writing initial manifest to {:?}", manifest_path);
                RuleBankManifest::new(templates.catalog()).save(&manifest_path)?;
            }
        }

        let manifest = RuleBankManifest::load(&manifest_path)?;
        let mut bank = Self {
            root,
            manifest_path,
            manifest,
            templates,
        };

        if bank.reconcile()? {
            let _lock = bank.begin_mutation()?;
        }

        Ok(bank)
    }

    /// Bank root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &RuleBankManifest {
        &self.manifest
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Append manifest entries for rule files that are on disk but untracked.
    ///
    /// Returns true if any entry was added. The manifest is not written; the
    /// caller persists it when needed.
    pub fn reconcile(&mut self) -> Result<bool> {
        let mut added = false;

        for id in discover_rules(&self.root)? {
            if self.manifest.contains(&id) {
                continue;
            }
            tracing::info!("Found untracked rule '{}' in bank", id);
            self.manifest
                .categories
                .push(RuleEntry::custom(id.clone(), id, String::new()));
            added = true;
        }

        Ok(added)
    }

    /// All bank entries, after reconciling with the bank directory.
    pub fn list(&mut self) -> Result<&[RuleEntry]> {
        if self.reconcile()? {
            // Persist on top of the current file, not the copy loaded at open
            let _lock = self.begin_mutation()?;
        }
        Ok(&self.manifest.categories)
    }

    /// Look up a single entry.
    pub fn get(&self, id: &str) -> Result<&RuleEntry> {
        self.manifest
            .get(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))
    }

    /// Create a custom rule.
    ///
    /// The id is derived from `name`. The rule is stored as
    /// `<bank>/<id>/.clinerules`, seeded from the best-practices template.
    pub fn create(&mut self, name: &str, description: &str) -> Result<RuleEntry> {
        let id = rule_id_from_name(name);
        if !id.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(RuleError::InvalidName(name.to_string()));
        }

        let _lock = self.begin_mutation()?;

        if self.manifest.contains(&id)
            || self.root.join(&id).exists()
            || self.root.join(format!("{id}.md")).exists()
        {
            return Err(RuleError::DuplicateId(id));
        }

        let content = self
            .templates
            .best_practices()?
            .unwrap_or_else(|| SKELETON_CONTENT.to_string());

        let rule_dir = self.root.join(&id);
        fs::create_dir_all(&rule_dir)?;
        fs::write(rule_dir.join(RULE_CONTENT_FILE_NAME), content)?;

        let entry = RuleEntry::custom(id, name.to_string(), description.to_string());
        self.manifest.categories.push(entry.clone());
        self.persist()?;

        tracing::info!("Created rule '{}'", entry.id);
        Ok(entry)
    }

    /// Locate a rule's content.
    ///
    /// Probes `<bank>/<id>/.clinerules`, then `<bank>/<id>.md`. Only a
    /// pristine builtin falls back to its template.
    pub fn resolve_content(&self, id: &str) -> Result<RuleSource> {
        let entry = self.get(id)?;
        let not_found = || RuleError::RuleNotFound(id.to_string());

        if !is_safe_id(id) {
            return Err(not_found());
        }

        let dir_form = self.root.join(id).join(RULE_CONTENT_FILE_NAME);
        if dir_form.is_file() {
            return Ok(RuleSource::Bank(dir_form));
        }

        let file_form = self.root.join(format!("{id}.md"));
        if file_form.is_file() {
            return Ok(RuleSource::Bank(file_form));
        }

        if entry.is_pristine() && self.templates.rule_content(id)?.is_some() {
            tracing::debug!("Rule '{}' resolved to its builtin template", id);
            return Ok(RuleSource::Template {
                id: id.to_string(),
                path: self.templates.rule_path(id),
            });
        }

        Err(not_found())
    }

    /// Read the text of a resolved rule source.
    pub fn read_content(&self, source: &RuleSource) -> Result<String> {
        match source {
            RuleSource::Bank(path) => Ok(fs::read_to_string(path)?),
            RuleSource::Template { id, .. } => self
                .templates
                .rule_content(id)?
                .ok_or_else(|| RuleError::RuleNotFound(id.clone())),
        }
    }

    /// Resolve and read a rule's content in one step.
    pub fn read_rule(&self, id: &str) -> Result<String> {
        let source = self.resolve_content(id)?;
        self.read_content(&source)
    }

    /// Prepare a rule for editing and return the path of its content file.
    ///
    /// A pristine builtin without a bank copy is materialized from its
    /// template first. The entry is marked modified.
    pub fn edit(&mut self, id: &str) -> Result<PathBuf> {
        let _lock = self.begin_mutation()?;

        let path = match self.resolve_content(id)? {
            RuleSource::Bank(path) => path,
            RuleSource::Template { .. } => self.materialize(id)?,
        };

        let changed = self
            .manifest
            .get_mut(id)
            .map(RuleEntry::mark_modified)
            .unwrap_or(false);
        if changed {
            self.persist()?;
        }

        Ok(path)
    }

    /// Remove a rule from the manifest and delete its files.
    ///
    /// There is no confirmation step here; callers ask the user first.
    pub fn delete(&mut self, id: &str) -> Result<RuleEntry> {
        let _lock = self.begin_mutation()?;

        self.get(id)?;
        self.remove_rule_files(id)?;

        let entry = self
            .manifest
            .remove(id)
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))?;
        self.persist()?;

        tracing::info!("Deleted rule '{}'", id);
        Ok(entry)
    }

    /// Discard the bank copy of a builtin rule and mark it pristine again.
    pub fn reset_builtin(&mut self, id: &str) -> Result<()> {
        let _lock = self.begin_mutation()?;

        if !self.get(id)?.is_builtin {
            return Err(RuleError::NotBuiltin(id.to_string()));
        }
        if self.templates.rule_content(id)?.is_none() {
            return Err(RuleError::RuleNotFound(id.to_string()));
        }

        self.remove_rule_files(id)?;

        if let Some(entry) = self.manifest.get_mut(id) {
            entry.is_modified = false;
            entry.last_modified = Utc::now();
        }
        self.persist()?;

        tracing::info!("Reset builtin rule '{}'", id);
        Ok(())
    }

    fn materialize(&self, id: &str) -> Result<PathBuf> {
        let content = self
            .templates
            .rule_content(id)?
            .ok_or_else(|| RuleError::RuleNotFound(id.to_string()))?;

        let rule_dir = self.root.join(id);
        fs::create_dir_all(&rule_dir)?;
        let path = rule_dir.join(RULE_CONTENT_FILE_NAME);
        fs::write(&path, content)?;

        tracing::info!("Materialized builtin rule '{}' into bank", id);
        Ok(path)
    }

    fn remove_rule_files(&self, id: &str) -> Result<()> {
        if !is_safe_id(id) {
            tracing::warn!("Refusing to remove files for rule id {:?}", id);
            return Ok(());
        }

        // A directory without a content file is only a parent of other rules
        let dir = self.root.join(id);
        if dir.join(RULE_CONTENT_FILE_NAME).is_file() {
            fs::remove_dir_all(&dir)?;
        }
        let file = self.root.join(format!("{id}.md"));
        if file.is_file() {
            fs::remove_file(&file)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<BankLock> {
        acquire_bank_lock(&self.root)
    }

    /// Take the bank lock and bring the in-memory manifest up to date with
    /// what is on disk.
    fn begin_mutation(&mut self) -> Result<BankLock> {
        let lock = self.lock()?;

        if self.manifest_path.exists() {
            self.manifest = RuleBankManifest::load(&self.manifest_path)?;
        }
        if self.reconcile()? {
            self.persist()?;
        }

        Ok(lock)
    }

    fn persist(&mut self) -> Result<()> {
        self.manifest.last_update = Utc::now();
        self.manifest.save(&self.manifest_path)
    }
}

/// Rule ids found on disk, in a stable order.
///
/// A directory containing `.clinerules` is one rule; any other directory is
/// searched recursively. Every `*.md` file is one rule. Hidden entries and
/// `config.json` are skipped. Ids are paths relative to `root`, joined with `/`.
pub fn discover_rules(root: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    walk_rules(root, root, &mut ids)?;
    Ok(ids)
}

fn walk_rules(root: &Path, dir: &Path, ids: &mut Vec<String>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if name == MANIFEST_FILE_NAME || name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if path.join(RULE_CONTENT_FILE_NAME).exists() {
                ids.push(relative_id(root, &path));
            } else {
                walk_rules(root, &path, ids)?;
            }
        } else if file_type.is_file() && name.ends_with(".md") {
            ids.push(relative_id(root, &path.with_extension("")));
        }
    }

    Ok(())
}

fn relative_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Ids are joined onto the bank root, so they must stay inside it
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && Path::new(id)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
