//! Commands that change the session. Each one opens the session, applies a
//! single operation, and saves the record only when the operation succeeded.

use anyhow::{Result, bail};
use console::style;
use dialoguer::Confirm;
use std::path::Path;

use forge_negotiate::errors::NegotiationError;
use forge_negotiate::negotiate::{ResetScope, apply_batch, load_batch};
use forge_negotiate::ui::icons::{CROSS, WARN};

use super::super::Cli;
use super::{Session, SessionLocation, report};

fn confirm(prompt: &str) -> bool {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

pub fn cmd_split(project_dir: &Path, cli: &Cli, phase: &str, at: &[usize]) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let split_at = if at.is_empty() { None } else { Some(at) };
    let outcome = session.state.split(phase, split_at)?;
    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_merge(project_dir: &Path, cli: &Cli, phases: &[String], force: bool) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let force = force || !session.config.confirm_non_consecutive();

    let outcome = match session.state.merge(phases, force) {
        Ok(outcome) => outcome,
        Err(err @ NegotiationError::NonConsecutiveMerge { .. }) => {
            println!("{}{}", WARN, style(&err).yellow());
            if !confirm("Merge these phases anyway?") {
                println!("Merge cancelled");
                return Ok(());
            }
            session.state.merge(phases, true)?
        }
        Err(err) => return Err(err.into()),
    };

    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_reorder(project_dir: &Path, cli: &Cli, phase: &str, position: usize) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let outcome = session.state.reorder(phase, position)?;
    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_skip(project_dir: &Path, cli: &Cli, phase: &str) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let outcome = session.state.skip(phase)?;
    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_unskip(project_dir: &Path, cli: &Cli, phase: &str) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let outcome = session.state.unskip(phase)?;
    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_modify(
    project_dir: &Path,
    cli: &Cli,
    phase: &str,
    field: &str,
    value: &str,
) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let outcome = session.state.modify_named(phase, field, value)?;
    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_reset(project_dir: &Path, cli: &Cli, scope: &str, force: bool) -> Result<()> {
    let mut session = Session::open(project_dir, cli)?;
    let Ok(scope) = scope.parse::<ResetScope>();

    if scope == ResetScope::All && !force && !cli.yes {
        let prompt = format!(
            "This discards {} operation(s) and starts a new session. Are you sure?",
            session.state.operations().len()
        );
        if !confirm(&prompt) {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let outcome = session.state.reset(&scope)?;
    session.save()?;
    report(&outcome);
    Ok(())
}

pub fn cmd_batch(project_dir: &Path, cli: &Cli, file: &Path) -> Result<()> {
    let descriptors = load_batch(file)?;
    let mut session = Session::open(project_dir, cli)?;
    let batch = apply_batch(&mut session.state, &descriptors);

    for entry in &batch.entries {
        match &entry.result {
            Ok(outcome) => report(outcome),
            Err(e) => println!(
                "{}{} #{} ({}): {}",
                CROSS,
                style("failed").red(),
                entry.index + 1,
                entry.op_type,
                e
            ),
        }
    }
    if batch.applied() > 0 {
        session.save()?;
    }

    println!();
    println!(
        "{} applied, {} failed",
        batch.applied(),
        batch.failed()
    );
    if batch.failed() > 0 {
        bail!(
            "{} of {} batch operation(s) failed",
            batch.failed(),
            batch.entries.len()
        );
    }
    Ok(())
}

pub fn cmd_discard(project_dir: &Path, cli: &Cli, force: bool) -> Result<()> {
    // the record is never parsed here, so a corrupt one can still be removed
    let location = SessionLocation::resolve(project_dir, cli)?;
    let hash = location.source_hash()?;
    let record = location.store.record_path(&hash);
    if !record.exists() {
        println!("No saved session for {}", location.source_path.display());
        return Ok(());
    }

    if !force && !cli.yes {
        let prompt = format!("Delete the saved session at {}?", record.display());
        if !confirm(&prompt) {
            println!("Discard cancelled");
            return Ok(());
        }
    }

    location.store.delete(&hash)?;
    println!("Discarded session for {}", location.source_path.display());
    Ok(())
}
