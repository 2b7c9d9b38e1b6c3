//! Configuration for rulebank.
//!
//! Loads settings from `~/.config/rulebank/config.toml` and `RULEBANK_*`
//! environment variables. Uses figment for layered configuration with
//! provenance tracking.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::templates::Templates;

/// Bank directory name under the home directory when none is configured
pub const DEFAULT_BANK_DIR_NAME: &str = ".cline-rules";

/// rulebank configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Rule bank directory. `~` is expanded to the home directory.
    #[serde(default)]
    pub rule_bank_path: Option<PathBuf>,

    /// Builtin template tree to use instead of the embedded templates.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

impl Config {
    /// Path of the user configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rulebank")
            .join("config.toml")
    }

    /// Load configuration from the user config file and the environment.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific TOML file plus the environment.
    ///
    /// Returns default config if the file doesn't exist.
    /// Reports parse errors with file, line, and key information.
    pub fn load_from(config_path: &Path) -> Self {
        // Build layered config: defaults <- toml file <- env
        let figment = Figment::from(Serialized::defaults(Config::default()));

        let figment = if config_path.exists() {
            figment.merge(Toml::file(config_path))
        } else {
            figment
        };
        let figment = figment.merge(Env::prefixed("RULEBANK_"));

        match figment.extract() {
            Ok(config) => {
                if config_path.exists() {
                    tracing::info!("Loaded config from {:?}", config_path);
                }
                config
            }
            Err(e) => {
                tracing::warn!("Config error: {}", e);
                Self::default()
            }
        }
    }

    /// Resolved bank directory: the configured path with `~` expanded, or
    /// `~/.cline-rules`.
    pub fn bank_path(&self) -> PathBuf {
        match &self.rule_bank_path {
            Some(path) => expand_home(path),
            None => home_dir().join(DEFAULT_BANK_DIR_NAME),
        }
    }

    /// Template source selected by this configuration.
    pub fn templates(&self) -> Templates {
        match &self.templates_dir {
            Some(dir) => Templates::from_dir(expand_home(dir)),
            None => Templates::Embedded,
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Replace a leading `~` component with the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_bank_path() {
        let config = Config::default();
        assert!(config.bank_path().ends_with(DEFAULT_BANK_DIR_NAME));
        assert_eq!(config.templates(), Templates::Embedded);
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = Config {
            rule_bank_path: Some(PathBuf::from("~/rules/bank")),
            templates_dir: None,
        };
        assert_eq!(config.bank_path(), home_dir().join("rules").join("bank"));
    }

    #[test]
    fn test_absolute_path_is_kept() {
        let config = Config {
            rule_bank_path: Some(PathBuf::from("/srv/bank")),
            templates_dir: Some(PathBuf::from("/srv/templates")),
        };
        assert_eq!(config.bank_path(), PathBuf::from("/srv/bank"));
        assert_eq!(config.templates(), Templates::from_dir("/srv/templates"));
    }

    #[test]
    fn test_load_missing_config() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("config.toml"));
        assert_eq!(config.templates_dir, None);
    }

    #[test]
    fn test_load_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
rule_bank_path = "/tmp/my-bank"
templates_dir = "/tmp/templates"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.rule_bank_path, Some(PathBuf::from("/tmp/my-bank")));
        assert_eq!(config.templates_dir, Some(PathBuf::from("/tmp/templates")));
    }

    #[test]
    fn test_invalid_config_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        // Invalid: rule_bank_path should be a string, not a table
        std::fs::write(&path, "[rule_bank_path]\nnested = 1\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.templates_dir, None);
    }
}
