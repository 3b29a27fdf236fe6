//! Configuration view and validation commands: `forge-negotiate config`.

use anyhow::{Context, Result};
use std::path::Path;

use forge_negotiate::config::{NegotiateConfig, NegotiateToml, SESSION_DIR_ENV};

use super::super::ConfigCommands;

fn print_toml(toml: &NegotiateToml) {
    println!("[session]");
    match &toml.session.dir {
        Some(dir) => println!("  dir = \"{}\"", dir.display()),
        None => println!("  dir = (default)"),
    }
    println!();
    println!("[log]");
    println!("  old_value_max_chars = {}", toml.log.old_value_max_chars);
    println!();
    println!("[export]");
    println!("  skipped = \"{}\"", toml.export.skipped);
    println!();
    println!("[merge]");
    println!(
        "  confirm_non_consecutive = {}",
        toml.merge.confirm_non_consecutive
    );
    println!();
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config = NegotiateConfig::new(project_dir.to_path_buf())?;
    let config_path = config.forge_dir.join("negotiate.toml");

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Negotiation Configuration");
            println!("=========================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No negotiate.toml found at {}", config_path.display());
                println!("Using default configuration:");
            }
            println!();
            print_toml(&config.toml);

            println!("Effective values (with env overrides):");
            println!("  session dir = {}", config.session_dir().display());
            if std::env::var_os(SESSION_DIR_ENV).is_some() {
                println!("  ({} is set)", SESSION_DIR_ENV);
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No negotiate.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("negotiate.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.forge_dir).with_context(|| {
                format!("Failed to create directory: {}", config.forge_dir.display())
            })?;
            NegotiateToml::default().save(&config_path)?;

            println!("Created negotiate.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [session] dir");
            println!("  - [export] skipped = \"omit\" | \"comment\"");
            println!("  - [merge] confirm_non_consecutive");
            println!();
        }
    }

    Ok(())
}
