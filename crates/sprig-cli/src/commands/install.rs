//! `sprig install`: compute the install plan from sprig.lock
//!
//! A fresh lock is used as is after its fingerprints are checked against the
//! sources. A missing or stale lock is re-resolved and rewritten, unless
//! `--frozen` forbids that or `--dry-run` asks for the plan only.

use sprig_core::error::{SprigError, SprigResult};
use sprig_lockfile::Lockfile;

use super::{CommandContext, Workspace};

pub async fn execute(frozen: bool, dry_run: bool, ctx: &CommandContext) -> SprigResult<()> {
    let workspace = Workspace::load(ctx).await?;
    let lock = current_lock(&workspace, frozen, dry_run, ctx).await?;

    let lines = plan_lines(&lock);
    if dry_run {
        ctx.output.step("Would install", &format!("{} packages", lines.len()));
    } else {
        ctx.output.step("Planned", &format!("{} packages", lines.len()));
    }
    for line in &lines {
        ctx.output.line(line);
    }
    Ok(())
}

async fn current_lock(
    workspace: &Workspace,
    frozen: bool,
    dry_run: bool,
    ctx: &CommandContext,
) -> SprigResult<Lockfile> {
    let existing = workspace.read_lockfile()?;
    let sources = workspace.sources.as_ref();

    match (existing, frozen) {
        (None, true) => Err(SprigError::validation(
            "lockfile",
            format!("--frozen requires an existing {}", workspace.lockfile_path()),
        )),
        (Some(lock), true) => {
            lock.ensure_fresh(&workspace.content_hash)?;
            lock.verify(sources)?;
            Ok(lock)
        },
        (Some(lock), false) if lock.is_fresh(&workspace.content_hash) => {
            lock.verify(sources)?;
            Ok(lock)
        },
        (previous, false) => {
            if previous.is_some() {
                ctx.output.warn("sprig.lock is out of date, re-resolving");
            }
            ctx.output.step(
                "Resolving",
                &format!("{} root requirements", workspace.root.len()),
            );
            let (_, lock) = workspace.relock(previous.as_ref()).await?;
            if !dry_run {
                lock.write(&workspace.lockfile_path())?;
            }
            Ok(lock)
        },
    }
}

/// Numbered plan lines, dependencies before their dependents
pub fn plan_lines(lock: &Lockfile) -> Vec<String> {
    lock.install_plan()
        .iter()
        .enumerate()
        .map(|(i, package)| format!("{:>4}. {} {}", i + 1, package.selector(), package.version))
        .collect()
}
