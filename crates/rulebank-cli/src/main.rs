//! rulebank: manage a shared bank of coding-convention rules and copy them
//! into projects.
//!
//! This CLI is a thin front end over the `rulebank` crate:
//! - `bank` commands list, create, edit and delete rules in the rule bank
//! - `project` commands detect a project's rule layout and manage its rules,
//!   including importing rules from the bank

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rulebank::{
    Config, ProjectMode, ProjectRules, RuleBank, RuleEntry, RuleError, RuleSource,
};

/// Exit codes for the CLI
///
/// - 0: Success
/// - 1: Not found (unknown rule id, no project rule)
/// - 2: Error (invalid input, I/O failure, corrupt manifest, etc.)
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const NOT_FOUND: u8 = 1;
    pub const ERROR: u8 = 2;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Shared bank of coding-convention rules for your projects
#[derive(Parser)]
#[command(name = "rulebank")]
#[command(author, version = env!("RULEBANK_VERSION"), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Rule bank directory (defaults to the configured path or ~/.cline-rules)
    #[arg(long, global = true)]
    bank: Option<PathBuf>,

    /// Project root (defaults to current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Suppress informational output and interactive prompts
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage rules in the rule bank
    Bank {
        #[command(subcommand)]
        command: BankCommand,
    },

    /// Manage the current project's rules
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
}

#[derive(Subcommand)]
enum BankCommand {
    /// List all rules in the bank
    List,

    /// Create a custom rule
    Create {
        /// Display name; the rule id is derived from it
        name: String,

        /// Short description
        description: String,
    },

    /// Prepare a rule for editing and print the file to open
    Edit {
        /// Rule id
        id: String,
    },

    /// Show where a rule's content currently lives
    Path {
        /// Rule id
        id: String,
    },

    /// Print a rule's content
    Show {
        /// Rule id
        id: String,
    },

    /// Delete a rule and its files
    Delete {
        /// Rule id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Discard local changes to a builtin rule
    Reset {
        /// Rule id
        id: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Show the detected rule layout
    Mode,

    /// List the project's rules
    List,

    /// Create a project rule
    Create {
        /// Rule name (file name in directory mode)
        name: String,

        /// Short description
        description: String,
    },

    /// Print the file to open for editing a project rule
    Edit {
        /// Rule id
        id: String,
    },

    /// Delete a project rule
    Delete {
        /// Rule id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Copy a rule from the bank into the project
    Import {
        /// Bank rule id (prompts for one when omitted)
        id: Option<String>,
    },

    /// Switch a project without rules to the `.clinerules/rules/` layout
    Init,
}

/// Settings shared by every command
struct Session {
    config: Config,
    bank_path: PathBuf,
    root: PathBuf,
    format: OutputFormat,
    quiet: bool,
}

impl Session {
    fn open_bank(&self) -> Result<RuleBank> {
        RuleBank::open(&self.bank_path, self.config.templates())
            .with_context(|| format!("Failed to open rule bank at {}", self.bank_path.display()))
    }

    fn project(&self) -> ProjectRules {
        ProjectRules::new(Some(self.root.clone())).with_templates(self.config.templates())
    }

    fn interactive(&self) -> bool {
        !self.quiet && dialoguer::console::Term::stderr().is_term()
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match build_session(&cli).and_then(|ctx| run(cli.command, &ctx)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let rule_error = e.downcast_ref::<RuleError>();
            if format == OutputFormat::Json {
                let error_json = serde_json::json!({
                    "error": rule_error.map(error_kind).unwrap_or("CommandFailed"),
                    "message": format!("{:#}", e),
                });
                eprintln!("{}", error_json);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(exit_code_for(rule_error))
        }
    }
}

fn build_session(cli: &Cli) -> Result<Session> {
    let config = Config::load();
    let bank_path = match &cli.bank {
        Some(path) => path.clone(),
        None => config.bank_path(),
    };
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    Ok(Session {
        config,
        bank_path,
        root,
        format: cli.format,
        quiet: cli.quiet,
    })
}

fn run(command: Commands, ctx: &Session) -> Result<u8> {
    match command {
        Commands::Bank { command } => match command {
            BankCommand::List => cmd_bank_list(ctx),
            BankCommand::Create { name, description } => {
                cmd_bank_create(&name, &description, ctx)
            }
            BankCommand::Edit { id } => cmd_bank_edit(&id, ctx),
            BankCommand::Path { id } => cmd_bank_path(&id, ctx),
            BankCommand::Show { id } => cmd_bank_show(&id, ctx),
            BankCommand::Delete { id, yes } => cmd_bank_delete(&id, yes, ctx),
            BankCommand::Reset { id } => cmd_bank_reset(&id, ctx),
        },
        Commands::Project { command } => match command {
            ProjectCommand::Mode => cmd_project_mode(ctx),
            ProjectCommand::List => cmd_project_list(ctx),
            ProjectCommand::Create { name, description } => {
                cmd_project_create(&name, &description, ctx)
            }
            ProjectCommand::Edit { id } => cmd_project_edit(&id, ctx),
            ProjectCommand::Delete { id, yes } => cmd_project_delete(&id, yes, ctx),
            ProjectCommand::Import { id } => cmd_project_import(id, ctx),
            ProjectCommand::Init => cmd_project_init(ctx),
        },
    }
}

/// Stable machine-readable name for a core error
fn error_kind(e: &RuleError) -> &'static str {
    match e {
        RuleError::NoWorkspace => "NoWorkspace",
        RuleError::RuleNotFound(_) => "RuleNotFound",
        RuleError::DuplicateId(_) => "DuplicateId",
        RuleError::AlreadyExists(_) => "AlreadyExists",
        RuleError::NoProjectRule => "NoProjectRule",
        RuleError::LegacyFileDelete => "LegacyFileDelete",
        RuleError::NotBuiltin(_) => "NotBuiltin",
        RuleError::InvalidName(_) => "InvalidName",
        RuleError::CorruptManifest { .. } => "CorruptManifest",
        RuleError::BankLocked(_) => "BankLocked",
        RuleError::Serialize(_) => "Serialize",
        RuleError::Io(_) => "Io",
    }
}

fn exit_code_for(e: Option<&RuleError>) -> u8 {
    match e {
        Some(RuleError::RuleNotFound(_) | RuleError::NoProjectRule) => exit_codes::NOT_FOUND,
        _ => exit_codes::ERROR,
    }
}

/// Print a path as `{"<key>": path}` or plain text
fn print_path(key: &str, path: &Path, ctx: &Session) {
    if ctx.format == OutputFormat::Json {
        let mut obj = serde_json::Map::new();
        obj.insert(key.to_string(), serde_json::json!(path));
        println!("{}", serde_json::Value::Object(obj));
    } else {
        println!("{}", path.display());
    }
}

/// Ask before deleting, unless `--yes` was passed.
///
/// Returns false if the user declined. Without a terminal to ask on, `--yes`
/// is required.
fn confirm_delete(what: &str, yes: bool, ctx: &Session) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !ctx.interactive() {
        anyhow::bail!("Refusing to delete {} without --yes", what);
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Delete {}?", what))
        .default(false)
        .interact_opt()?;

    Ok(confirmed == Some(true))
}

fn entry_marker(entry: &RuleEntry) -> &'static str {
    match (entry.is_builtin, entry.is_modified) {
        (true, false) => "builtin",
        (true, true) => "builtin, modified",
        (false, _) => "custom",
    }
}

fn cmd_bank_list(ctx: &Session) -> Result<u8> {
    let mut bank = ctx.open_bank()?;
    let entries = bank.list()?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string(entries)?);
    } else if entries.is_empty() {
        if !ctx.quiet {
            println!("The rule bank is empty.");
        }
    } else {
        for entry in entries {
            println!("{:<24} {} ({})", entry.id, entry.name, entry_marker(entry));
            if !ctx.quiet && !entry.description.is_empty() {
                println!("{:<24} {}", "", entry.description);
            }
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_bank_create(name: &str, description: &str, ctx: &Session) -> Result<u8> {
    let mut bank = ctx.open_bank()?;
    let entry = bank.create(name, description)?;
    let source = bank.resolve_content(&entry.id)?;

    if ctx.format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::json!({
                "created": entry,
                "path": source.path(),
            })
        );
    } else if !ctx.quiet {
        println!("Created rule '{}'", entry.id);
        if let Some(path) = source.path() {
            println!("  {}", path.display());
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_bank_edit(id: &str, ctx: &Session) -> Result<u8> {
    let mut bank = ctx.open_bank()?;
    let path = bank.edit(id)?;
    print_path("path", &path, ctx);
    Ok(exit_codes::SUCCESS)
}

fn cmd_bank_path(id: &str, ctx: &Session) -> Result<u8> {
    let bank = ctx.open_bank()?;
    let source = bank.resolve_content(id)?;

    if ctx.format == OutputFormat::Json {
        let (kind, path) = match &source {
            RuleSource::Bank(path) => ("bank", Some(path.as_path())),
            RuleSource::Template { path, .. } => ("template", path.as_deref()),
        };
        println!(
            "{}",
            serde_json::json!({
                "id": id,
                "source": kind,
                "path": path,
            })
        );
    } else {
        match &source {
            RuleSource::Bank(path) => println!("{}", path.display()),
            RuleSource::Template { path: Some(path), .. } => {
                println!("{} (builtin template)", path.display())
            }
            RuleSource::Template { path: None, .. } => println!("(embedded builtin template)"),
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_bank_show(id: &str, ctx: &Session) -> Result<u8> {
    let bank = ctx.open_bank()?;
    let content = bank.read_rule(id)?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "id": id, "content": content }));
    } else {
        print!("{}", content);
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_bank_delete(id: &str, yes: bool, ctx: &Session) -> Result<u8> {
    let mut bank = ctx.open_bank()?;
    // Fail on unknown ids before prompting
    bank.get(id)?;

    if !confirm_delete(&format!("bank rule '{}'", id), yes, ctx)? {
        if !ctx.quiet {
            eprintln!("Cancelled.");
        }
        return Ok(exit_codes::SUCCESS);
    }

    let entry = bank.delete(id)?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "deleted": entry.id }));
    } else if !ctx.quiet {
        println!("Deleted rule '{}'", entry.id);
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_bank_reset(id: &str, ctx: &Session) -> Result<u8> {
    let mut bank = ctx.open_bank()?;
    bank.reset_builtin(id)?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "reset": id }));
    } else if !ctx.quiet {
        println!("Reset rule '{}' to its builtin template", id);
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_project_mode(ctx: &Session) -> Result<u8> {
    let config = ctx.project().detect_mode();

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string(&config)?);
    } else {
        println!("{} {}", config.mode, config.path.display());
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_project_list(ctx: &Session) -> Result<u8> {
    let project = ctx.project();
    let entries = project.list()?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string(&entries)?);
    } else if entries.is_empty() {
        if !ctx.quiet {
            println!("No project rules.");
        }
    } else {
        for entry in &entries {
            println!("{:<24} {}", entry.id, entry.description);
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_project_create(name: &str, description: &str, ctx: &Session) -> Result<u8> {
    let path = ctx.project().create(name, description)?;
    print_path("created", &path, ctx);
    Ok(exit_codes::SUCCESS)
}

fn cmd_project_edit(id: &str, ctx: &Session) -> Result<u8> {
    let path = ctx.project().edit(id)?;
    print_path("path", &path, ctx);
    Ok(exit_codes::SUCCESS)
}

fn cmd_project_delete(id: &str, yes: bool, ctx: &Session) -> Result<u8> {
    let project = ctx.project();

    // Report unknown ids and mode errors before prompting. Outside directory
    // mode `delete` always fails.
    match project.detect_mode().mode {
        ProjectMode::Directory => {
            project.edit(id)?;
        }
        ProjectMode::SingleFile | ProjectMode::None => {
            project.delete(id)?;
        }
    }

    if !confirm_delete(&format!("project rule '{}'", id), yes, ctx)? {
        if !ctx.quiet {
            eprintln!("Cancelled.");
        }
        return Ok(exit_codes::SUCCESS);
    }

    project.delete(id)?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else if !ctx.quiet {
        println!("Deleted project rule '{}'", id);
    }

    Ok(exit_codes::SUCCESS)
}

fn cmd_project_import(id: Option<String>, ctx: &Session) -> Result<u8> {
    let mut bank = ctx.open_bank()?;

    let id = match id {
        Some(id) => id,
        None => match pick_bank_rule(&mut bank, ctx)? {
            Some(id) => id,
            None => {
                if !ctx.quiet {
                    eprintln!("Cancelled.");
                }
                return Ok(exit_codes::SUCCESS);
            }
        },
    };

    let path = ctx.project().import_from_bank(&bank, &id)?;
    print_path("imported", &path, ctx);
    Ok(exit_codes::SUCCESS)
}

/// Interactive picker over bank rules. `None` if the user backed out.
fn pick_bank_rule(bank: &mut RuleBank, ctx: &Session) -> Result<Option<String>> {
    if !ctx.interactive() {
        anyhow::bail!("No rule id given and no terminal to choose one on");
    }

    let entries = bank.list()?;
    if entries.is_empty() {
        anyhow::bail!("The rule bank is empty");
    }

    let items: Vec<String> = entries
        .iter()
        .map(|e| {
            if e.description.is_empty() {
                e.name.clone()
            } else {
                format!("{} - {}", e.name, e.description)
            }
        })
        .collect();

    let selection = dialoguer::Select::new()
        .with_prompt("Select a rule to import")
        .items(&items)
        .default(0)
        .interact_opt()?;

    Ok(selection.map(|i| entries[i].id.clone()))
}

fn cmd_project_init(ctx: &Session) -> Result<u8> {
    let path = ctx.project().init_directory()?;
    print_path("rules_dir", &path, ctx);
    Ok(exit_codes::SUCCESS)
}
