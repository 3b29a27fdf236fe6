//! Read-only commands. None of these write the session record.

use anyhow::{Context, Result};
use std::path::Path;

use forge_negotiate::render::{
    SkippedMode, export_document, render_diff, render_history, render_list, render_phase,
    render_status,
};

use super::super::Cli;
use super::Session;

pub fn cmd_list(project_dir: &Path, cli: &Cli) -> Result<()> {
    let session = Session::open(project_dir, cli)?;
    println!();
    println!("Phases from: {}", session.source_path.display());
    println!();
    print!("{}", render_list(&session.state));
    println!();
    Ok(())
}

pub fn cmd_show(project_dir: &Path, cli: &Cli, phase: &str) -> Result<()> {
    let session = Session::open(project_dir, cli)?;
    let phase = session.state.find_phase(phase)?;
    println!();
    print!("{}", render_phase(&session.state, phase));
    println!();
    Ok(())
}

pub fn cmd_history(project_dir: &Path, cli: &Cli) -> Result<()> {
    let session = Session::open(project_dir, cli)?;
    print!("{}", render_history(&session.state));
    Ok(())
}

pub fn cmd_diff(project_dir: &Path, cli: &Cli) -> Result<()> {
    let session = Session::open(project_dir, cli)?;
    print!("{}", render_diff(&session.state));
    Ok(())
}

pub fn cmd_status(project_dir: &Path, cli: &Cli) -> Result<()> {
    let session = Session::open(project_dir, cli)?;

    println!();
    println!("Negotiation Status");
    println!("==================");
    println!();
    print!("{}", render_status(&session.state));
    if session.resumed {
        println!(
            "Record:     {}",
            session.store.record_path(session.state.source_hash()).display()
        );
    } else {
        println!("Record:     not saved yet (no operations applied)");
    }
    println!();
    Ok(())
}

pub fn cmd_export(
    project_dir: &Path,
    cli: &Cli,
    output: Option<&Path>,
    skipped: Option<SkippedMode>,
) -> Result<()> {
    let session = Session::open(project_dir, cli)?;
    let mode = skipped.unwrap_or_else(|| session.config.skipped_mode());
    let document = export_document(&session.state, mode);

    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            std::fs::write(path, &document)
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            tracing::info!(path = %path.display(), %mode, "Exported negotiated phases");
            println!(
                "Exported {} phase(s) to {}",
                session.state.active_count(),
                path.display()
            );
        }
        None => print!("{}", document),
    }
    Ok(())
}
