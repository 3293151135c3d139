//! `sprig check`: validate the manifest, settings and lock file without resolving

use sprig_core::error::SprigResult;

use super::{CommandContext, Workspace};

/// State of sprig.lock against the current resolution inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Missing,
    Fresh,
    Stale,
}

pub async fn execute(ctx: &CommandContext) -> SprigResult<()> {
    let workspace = Workspace::load(ctx).await?;
    ctx.output.success(&format!("{} is valid", workspace.project.manifest_path));
    ctx.output.info(&format!(
        "{} root requirements, {} feature groups active",
        workspace.root.len(),
        workspace.activation.groups().count()
    ));

    if let Some(index) = &workspace.settings.index {
        if !index.is_dir() {
            ctx.output.warn(&format!("package index {} does not exist", index));
        }
    }

    match lock_status(&workspace)? {
        LockStatus::Missing => ctx.output.warn("No sprig.lock; run 'sprig lock' to create it"),
        LockStatus::Stale => ctx.output.warn("sprig.lock is out of date; run 'sprig lock'"),
        LockStatus::Fresh => ctx.output.success("sprig.lock is up to date"),
    }
    Ok(())
}

/// Freshness of the lock; a fresh lock must also match the sources' fingerprints
pub fn lock_status(workspace: &Workspace) -> SprigResult<LockStatus> {
    match workspace.read_lockfile()? {
        None => Ok(LockStatus::Missing),
        Some(lock) if lock.is_fresh(&workspace.content_hash) => {
            lock.verify(workspace.sources.as_ref())?;
            Ok(LockStatus::Fresh)
        },
        Some(_) => Ok(LockStatus::Stale),
    }
}
