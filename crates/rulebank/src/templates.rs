//! Builtin rule templates.
//!
//! The tool ships one template per builtin rule plus a best-practices skeleton
//! used to seed every newly created rule. Templates are embedded at compile
//! time; a directory laid out the same way (`<id>/.clinerules` and
//! `Preset/.clinerules-best-practices.md`) can be configured instead.

use std::fs;
use std::path::{Path, PathBuf};

use crate::manifest::RuleEntry;
use crate::{Result, RULE_CONTENT_FILE_NAME};

/// Directory holding the best-practices template inside a template tree
pub const PRESET_DIR_NAME: &str = "Preset";

/// Best-practices template file name inside [`PRESET_DIR_NAME`]
pub const BEST_PRACTICES_FILE_NAME: &str = ".clinerules-best-practices.md";

/// A rule template shipped with the tool
pub struct BuiltinRule {
    /// Directory name and manifest id (e.g., "web-react")
    pub id: &'static str,
    /// Display name (e.g., "Website - React")
    pub name: &'static str,
    /// Brief description shown in listings
    pub description: &'static str,
    /// Full rule content
    pub content: &'static str,
}

/// Where builtin templates are read from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Templates {
    /// Templates compiled into the binary
    #[default]
    Embedded,
    /// An on-disk template tree
    Directory(PathBuf),
}

impl Templates {
    pub fn from_dir(path: impl Into<PathBuf>) -> Self {
        Templates::Directory(path.into())
    }

    /// Manifest entries for the fixed builtin catalog, all pristine.
    pub fn catalog(&self) -> Vec<RuleEntry> {
        BUILTIN_RULES
            .iter()
            .map(|r| RuleEntry::builtin(r.id, r.name, r.description))
            .collect()
    }

    /// On-disk location of a builtin template, if templates live on disk.
    pub fn rule_path(&self, id: &str) -> Option<PathBuf> {
        match self {
            Templates::Embedded => None,
            Templates::Directory(root) => {
                let path = root.join(id).join(RULE_CONTENT_FILE_NAME);
                path.is_file().then_some(path)
            }
        }
    }

    /// Content of a builtin template, or `None` if there is no such template.
    pub fn rule_content(&self, id: &str) -> Result<Option<String>> {
        match self {
            Templates::Embedded => Ok(BUILTIN_RULES
                .iter()
                .find(|r| r.id == id)
                .map(|r| r.content.to_string())),
            Templates::Directory(_) => match self.rule_path(id) {
                Some(path) => Ok(Some(fs::read_to_string(path)?)),
                None => Ok(None),
            },
        }
    }

    /// The best-practices skeleton for new rules, if available.
    pub fn best_practices(&self) -> Result<Option<String>> {
        match self {
            Templates::Embedded => Ok(Some(BEST_PRACTICES_TEMPLATE.to_string())),
            Templates::Directory(root) => {
                let path = root.join(PRESET_DIR_NAME).join(BEST_PRACTICES_FILE_NAME);
                if path.is_file() {
                    Ok(Some(fs::read_to_string(path)?))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Copy the whole template tree into `dest`.
    ///
    /// Files already present in `dest` are overwritten. A failure part way
    /// through leaves the files copied so far in place.
    pub fn install_into(&self, dest: &Path) -> Result<()> {
        match self {
            Templates::Embedded => {
                for rule in BUILTIN_RULES {
                    let dir = dest.join(rule.id);
                    fs::create_dir_all(&dir)?;
                    fs::write(dir.join(RULE_CONTENT_FILE_NAME), rule.content)?;
                }
                Ok(())
            }
            Templates::Directory(root) => {
                if root.is_dir() {
                    copy_dir_recursive(root, dest)?;
                } else {
                    tracing::warn!("Template directory {:?} does not exist", root);
                }
                Ok(())
            }
        }
    }
}

/// Recursively copy `src` into `dest`, creating directories as needed
pub(crate) fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Seed content for every newly created rule
pub const BEST_PRACTICES_TEMPLATE: &str = r#"# Role
You are an experienced engineer working in this codebase. Describe the
expertise the assistant should bring (language, framework, domain).

# Goal
State what this rule set is for and what a good result looks like.

## Conventions
- Project layout and where new code belongs
- Naming and formatting rules
- Error handling and logging expectations

## Workflow
1. Read the relevant code before changing it
2. Make the smallest change that solves the problem
3. Add or update tests alongside the change
4. Explain non-obvious decisions in the commit message

## Constraints
- Things that must never happen (secrets in code, breaking public APIs, ...)
- Dependencies that are allowed or forbidden
"#;

/// The fixed catalog of builtin rules, in display order
pub const BUILTIN_RULES: &[BuiltinRule] = &[
    BuiltinRule {
        id: "app-reactnative",
        name: "App Development - React Native",
        description: "React Native cross-platform application development rules",
        content: r#"# Role
You are a senior React Native engineer shipping to both iOS and Android.

# Goal
Build a cross-platform app that feels native on each platform and stays maintainable.

## Conventions
- TypeScript everywhere, strict mode on
- Function components and hooks; no class components
- Feature folders: `src/features/<feature>/{screens,components,hooks}`
- Styles via `StyleSheet.create`, no inline style objects in render

## Platform
- Use `Platform.select` for small differences, `.ios.tsx`/`.android.tsx` files for large ones
- Test on a physical device of each platform before release
- Keep native modules behind a typed JS facade

## Performance
- `FlatList` for any list longer than a screen
- Memoize expensive children with `React.memo` and stable callbacks
"#,
    },
    BuiltinRule {
        id: "app-flutter",
        name: "App Development - Flutter",
        description: "Flutter cross-platform application development rules",
        content: r#"# Role
You are a senior Flutter engineer.

# Goal
Deliver a Flutter app with predictable state management and a consistent widget tree.

## Conventions
- Null safety everywhere; avoid `!` unless the invariant is local and obvious
- Prefer `const` constructors for widgets
- One public widget per file, file named after the widget in snake_case
- State management with a single approach per app (Riverpod or Bloc), not both

## Structure
- `lib/src/features/<feature>/` for presentation, domain and data layers
- Keep business logic out of widgets

## Quality
- `flutter analyze` must be clean
- Widget tests for every screen, golden tests for custom painting
"#,
    },
    BuiltinRule {
        id: "app-ios",
        name: "App Development - iOS",
        description: "iOS native application development rules",
        content: r#"# Role
You are a senior iOS engineer writing Swift.

# Goal
Ship a native iOS app that follows Apple's Human Interface Guidelines.

## Conventions
- Swift only; SwiftUI for new screens, UIKit only when SwiftUI cannot do it
- Value types by default, classes for identity and shared mutable state
- `async`/`await` for concurrency, `@MainActor` for UI state
- No force unwraps outside tests

## Structure
- One feature per module or folder with its views, view models and services
- Dependencies injected through initializers

## Quality
- XCTest unit tests for view models and services
- Support Dynamic Type and VoiceOver on every screen
"#,
    },
    BuiltinRule {
        id: "app-android",
        name: "App Development - Android",
        description: "Android native application development rules",
        content: r#"# Role
You are a senior Android engineer writing Kotlin.

# Goal
Ship a native Android app built on modern Jetpack libraries.

## Conventions
- Kotlin only; Jetpack Compose for UI
- Coroutines and Flow for async work, no callbacks or RxJava in new code
- ViewModels expose immutable `StateFlow` UI state
- Hilt for dependency injection

## Structure
- Layers: `ui`, `domain`, `data`; the domain layer has no Android imports
- Repositories are the single source of truth for their data

## Quality
- Unit tests for ViewModels and use cases
- Compose UI tests for critical flows
"#,
    },
    BuiltinRule {
        id: "web-html",
        name: "Website - HTML",
        description: "HTML/CSS/JavaScript website development rules",
        content: r#"# Role
You are a front-end developer building plain HTML/CSS/JavaScript sites.

# Goal
Produce fast, accessible pages without a framework.

## Conventions
- Semantic HTML5 elements (`header`, `main`, `nav`, `article`, `footer`)
- Mobile-first CSS with custom properties for colors and spacing
- Vanilla ES modules; no global variables
- Images have `alt` text and explicit dimensions

## Quality
- Pages validate with the W3C validator
- Lighthouse accessibility and performance scores of 90 or better
"#,
    },
    BuiltinRule {
        id: "web-react",
        name: "Website - React",
        description: "React website development rules",
        content: r#"# Role
You are a senior React developer.

# Goal
Build a React web application with clear component boundaries.

## Conventions
- TypeScript, function components and hooks
- Components are PascalCase files; hooks start with `use`
- Server state with a data-fetching library, UI state local or in a small store
- No prop drilling deeper than two levels; lift into context or a store

## Quality
- Components tested with Testing Library by behavior, not implementation
- ESLint with the react-hooks plugin must pass
"#,
    },
    BuiltinRule {
        id: "web-vue",
        name: "Website - Vue",
        description: "Vue.js website development rules",
        content: r#"# Role
You are a senior Vue.js developer.

# Goal
Build a Vue 3 application using the Composition API.

## Conventions
- `<script setup lang="ts">` single-file components
- Composables in `src/composables/`, named `useXxx`
- Pinia for shared state
- Props are typed and never mutated

## Quality
- Vitest for unit tests, Vue Test Utils for components
- `vue-tsc --noEmit` must pass
"#,
    },
    BuiltinRule {
        id: "web-nextjs",
        name: "Website - Nextjs",
        description: "Next.js 14 full-stack development rules",
        content: r#"# Role
You are a senior full-stack engineer working with Next.js 14.

# Goal
Build a Next.js application on the App Router with server-first rendering.

## Conventions
- App Router only; `app/` directory with route segments
- Server Components by default, `"use client"` only where interactivity is needed
- Data mutations through Server Actions or route handlers
- Environment variables validated at startup

## Quality
- Type-safe data access; no `any` in API boundaries
- Playwright tests for critical user journeys
"#,
    },
    BuiltinRule {
        id: "chrome-extension",
        name: "Chrome Extension",
        description: "Chrome browser extension development rules",
        content: r#"# Role
You are an engineer building Chrome extensions.

# Goal
Ship a Manifest V3 extension that requests the least privilege it needs.

## Conventions
- Manifest V3; background logic in a service worker
- Request only the permissions in active use; prefer `activeTab`
- Message passing between content scripts and the worker is typed
- No remote code execution; all scripts bundled

## Quality
- Test in a fresh profile before every release
- Handle the service worker being suspended at any time
"#,
    },
    BuiltinRule {
        id: "wechat-miniprogram",
        name: "WeChat Mini Program",
        description: "WeChat Mini Program development rules",
        content: r#"# Role
You are an engineer building WeChat Mini Programs.

# Goal
Deliver a responsive Mini Program within the platform's package size limits.

## Conventions
- Pages under `pages/<name>/` with `.wxml`, `.wxss`, `.js`/`.ts`, `.json`
- Reusable UI as custom components
- Use subpackages to stay under the main package size limit
- Network calls go through a single request wrapper with error handling

## Quality
- Test on real devices for both iOS and Android WeChat clients
- Keep `setData` payloads small
"#,
    },
    BuiltinRule {
        id: "local-python",
        name: "Local - Python",
        description: "Python development rules",
        content: r#"# Role
You are a senior Python developer.

# Goal
Write clear, typed Python that is easy to run locally.

## Conventions
- Python 3.11+, type hints on all public functions
- Dependencies managed in `pyproject.toml` inside a virtual environment
- `pathlib` for paths, f-strings for formatting
- Raise specific exceptions; never `except:` without a type

## Quality
- `ruff` and `mypy` clean
- pytest tests next to the code they cover
"#,
    },
    BuiltinRule {
        id: "backend-springboot",
        name: "Backend - Spring Boot",
        description: "Spring Boot application development rules",
        content: r#"# Role
You are a senior Java backend engineer using Spring Boot.

# Goal
Build REST services with clear layering and predictable configuration.

## Conventions
- Controller -> Service -> Repository layering
- Constructor injection only, no field injection
- DTOs at the API boundary, entities never leave the service layer
- Configuration through `@ConfigurationProperties` classes

## Quality
- Unit tests with JUnit 5 and Mockito, slice tests for controllers
- Database migrations with Flyway or Liquibase
"#,
    },
    BuiltinRule {
        id: "backend-django",
        name: "Backend - Django",
        description: "Django web framework development rules",
        content: r#"# Role
You are a senior Django developer.

# Goal
Build Django applications that follow the framework's conventions.

## Conventions
- One Django app per bounded concern
- Fat models, thin views; complex logic in service functions
- Class-based views or Django REST Framework viewsets for APIs
- Every model change ships with a migration

## Quality
- `select_related`/`prefetch_related` to avoid N+1 queries
- Tests with pytest-django and factories
"#,
    },
    BuiltinRule {
        id: "backend-rails",
        name: "Backend - Ruby on Rails",
        description: "Ruby on Rails web application development rules",
        content: r#"# Role
You are a senior Ruby on Rails developer.

# Goal
Build Rails applications that stay close to Rails conventions.

## Conventions
- Skinny controllers; extract service objects when models grow
- Strong parameters for all user input
- Scopes for reusable queries
- Background work in Active Job

## Quality
- RSpec or Minitest following the project's existing choice
- RuboCop clean
"#,
    },
    BuiltinRule {
        id: "backend-laravel",
        name: "Backend - Laravel",
        description: "Laravel PHP web framework development rules",
        content: r#"# Role
You are a senior Laravel developer.

# Goal
Build Laravel applications using the framework's built-in tools.

## Conventions
- Form Request classes for validation
- Eloquent relationships over manual joins
- Jobs and queues for slow work
- Configuration read through `config()`, never `env()` outside config files

## Quality
- Feature tests with Pest or PHPUnit
- Migrations are reversible
"#,
    },
    BuiltinRule {
        id: "backend-express",
        name: "Backend - Express.js",
        description: "Express.js Node.js web framework development rules",
        content: r#"# Role
You are a senior Node.js engineer using Express.

# Goal
Build Express APIs with consistent routing, validation and error handling.

## Conventions
- TypeScript; routers per resource under `src/routes/`
- Request validation at the edge with a schema library
- A single error-handling middleware; handlers pass errors to `next`
- Configuration from environment variables validated at startup

## Quality
- Integration tests with supertest
- Structured JSON logging with request ids
"#,
    },
    BuiltinRule {
        id: "general",
        name: "General",
        description: "General development rules, applicable to all projects",
        content: r#"# Role
You are a careful software engineer.

# Goal
Make correct, minimal changes that fit the existing codebase.

## Principles
- Read before writing: understand the surrounding code first
- Implement only what was asked
- Match the existing style, naming and structure
- Prefer simple, explicit code over clever code

## Workflow
1. Restate the task and list the files involved
2. Make the change in small steps
3. Run the tests and linters
4. Summarize what changed and why
"#,
    },
    BuiltinRule {
        id: "mcp-chat-history",
        name: "MCP - Chat History Recorder",
        description: "Enforces the mandatory use of the `record_chat_history` tool before completing any task to ensure all interactions are logged.",
        content: r#"# Role
You are an assistant whose interactions must be recorded.

# Goal
Every task ends with a call to the `record_chat_history` MCP tool.

## Rules
- Before completing any task, call `record_chat_history` with the full exchange
- Do not mark a task complete if the call failed; retry or report the failure
- Never omit user messages or tool results from the record
"#,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::rule_id_from_name;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_ids_are_unique() {
        let mut ids: Vec<_> = BUILTIN_RULES.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BUILTIN_RULES.len());
    }

    #[test]
    fn test_catalog_entries_are_pristine() {
        let catalog = Templates::Embedded.catalog();
        assert_eq!(catalog.len(), BUILTIN_RULES.len());
        assert!(catalog.iter().all(RuleEntry::is_pristine));
        assert_eq!(catalog[0].id, "app-reactnative");
    }

    #[test]
    fn test_builtin_ids_are_already_slugs() {
        for rule in BUILTIN_RULES {
            assert_eq!(rule_id_from_name(rule.id), rule.id);
        }
    }

    #[test]
    fn test_embedded_content_lookup() {
        let templates = Templates::Embedded;
        let general = templates.rule_content("general").unwrap().unwrap();
        assert!(general.starts_with("# Role"));
        assert!(templates.rule_content("missing").unwrap().is_none());
        assert!(templates.rule_path("general").is_none());
    }

    #[test]
    fn test_embedded_install_writes_every_rule() {
        let temp = TempDir::new().unwrap();
        Templates::Embedded.install_into(temp.path()).unwrap();
        for rule in BUILTIN_RULES {
            let path = temp.path().join(rule.id).join(RULE_CONTENT_FILE_NAME);
            assert_eq!(fs::read_to_string(path).unwrap(), rule.content);
        }
    }

    #[test]
    fn test_directory_templates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("rules");
        fs::create_dir_all(root.join("general")).unwrap();
        fs::write(root.join("general").join(RULE_CONTENT_FILE_NAME), "custom general").unwrap();

        let templates = Templates::from_dir(&root);
        assert_eq!(
            templates.rule_content("general").unwrap().as_deref(),
            Some("custom general")
        );
        assert!(templates.rule_path("general").is_some());
        // No Preset directory: callers fall back to the skeleton
        assert!(templates.best_practices().unwrap().is_none());

        fs::create_dir_all(root.join(PRESET_DIR_NAME)).unwrap();
        fs::write(root.join(PRESET_DIR_NAME).join(BEST_PRACTICES_FILE_NAME), "# Preset").unwrap();
        assert_eq!(templates.best_practices().unwrap().as_deref(), Some("# Preset"));
    }

    #[test]
    fn test_directory_install_copies_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("rules");
        fs::create_dir_all(root.join("web-react")).unwrap();
        fs::write(root.join("web-react").join(RULE_CONTENT_FILE_NAME), "react").unwrap();
        fs::create_dir_all(root.join(PRESET_DIR_NAME)).unwrap();
        fs::write(root.join(PRESET_DIR_NAME).join(BEST_PRACTICES_FILE_NAME), "preset").unwrap();

        let dest = temp.path().join("bank");
        Templates::from_dir(&root).install_into(&dest).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("web-react").join(RULE_CONTENT_FILE_NAME)).unwrap(),
            "react"
        );
        assert!(dest.join(PRESET_DIR_NAME).join(BEST_PRACTICES_FILE_NAME).exists());
    }
}
