use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use forge_negotiate::logging::{LogFormat, init_logging};
use forge_negotiate::render::SkippedMode;

mod cmd;

#[derive(Parser)]
#[command(name = "forge-negotiate")]
#[command(version, about = "Negotiate audit phases before execution")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub log_format: LogFormat,

    /// Answer yes to every confirmation prompt
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Audit document to negotiate (markdown or phases JSON). If not provided,
    /// uses .forge/audit.md or the newest docs/plans/*audit*.md
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// Directory holding session records. Overrides negotiate.toml and
    /// FORGE_NEGOTIATE_SESSION_DIR.
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the current phases
    List,
    /// Show one phase in full
    Show { phase: String },
    /// Split a phase into parts by file
    Split {
        phase: String,
        /// File indices each new part starts at (e.g. --at 2,4). Default: one part per file
        #[arg(long, value_delimiter = ',')]
        at: Vec<usize>,
    },
    /// Merge two or more phases into one
    Merge {
        #[arg(required = true)]
        phases: Vec<String>,
        /// Merge even if the phases are not consecutive
        #[arg(long)]
        force: bool,
    },
    /// Move a phase to a new 1-based position
    Reorder { phase: String, position: usize },
    /// Exclude a phase from execution and export
    Skip { phase: String },
    /// Include a previously skipped phase again
    Unskip { phase: String },
    /// Overwrite one field of a phase
    Modify {
        phase: String,
        /// title, context, goal, plan, verification, acceptance_criteria or rollback
        field: String,
        /// New value; list fields take items separated by ';' or newlines
        value: String,
    },
    /// Show the operation log
    History,
    /// Compare current phases with the original list
    Diff,
    /// Reset everything ("all") or restore one original phase
    Reset {
        scope: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Write the negotiated phases as a markdown document
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// How to render skipped phases: omit or comment
        #[arg(long)]
        skipped: Option<SkippedMode>,
    },
    /// Apply operations from a YAML or JSON file
    Batch { file: PathBuf },
    /// Show session metadata
    Status,
    /// Delete the saved session for the source document
    Discard {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default negotiate.toml file
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::List => cmd::cmd_list(&project_dir, &cli)?,
        Commands::Show { phase } => cmd::cmd_show(&project_dir, &cli, phase)?,
        Commands::Split { phase, at } => cmd::cmd_split(&project_dir, &cli, phase, at)?,
        Commands::Merge { phases, force } => cmd::cmd_merge(&project_dir, &cli, phases, *force)?,
        Commands::Reorder { phase, position } => {
            cmd::cmd_reorder(&project_dir, &cli, phase, *position)?
        }
        Commands::Skip { phase } => cmd::cmd_skip(&project_dir, &cli, phase)?,
        Commands::Unskip { phase } => cmd::cmd_unskip(&project_dir, &cli, phase)?,
        Commands::Modify {
            phase,
            field,
            value,
        } => cmd::cmd_modify(&project_dir, &cli, phase, field, value)?,
        Commands::History => cmd::cmd_history(&project_dir, &cli)?,
        Commands::Diff => cmd::cmd_diff(&project_dir, &cli)?,
        Commands::Reset { scope, force } => cmd::cmd_reset(&project_dir, &cli, scope, *force)?,
        Commands::Export { output, skipped } => {
            cmd::cmd_export(&project_dir, &cli, output.as_deref(), *skipped)?
        }
        Commands::Batch { file } => cmd::cmd_batch(&project_dir, &cli, file)?,
        Commands::Status => cmd::cmd_status(&project_dir, &cli)?,
        Commands::Discard { force } => cmd::cmd_discard(&project_dir, &cli, *force)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
