//! `sprig lock`: resolve and write sprig.lock

use std::time::Instant;

use sprig_core::error::SprigResult;
use sprig_lockfile::Lockfile;

use super::{CommandContext, Workspace};

pub async fn execute(ctx: &CommandContext) -> SprigResult<()> {
    let start = Instant::now();
    let workspace = Workspace::load(ctx).await?;
    let previous = workspace.read_lockfile()?;

    ctx.output.step(
        "Resolving",
        &format!("{} root requirements", workspace.root.len()),
    );
    let (_, lock) = workspace.relock(previous.as_ref()).await?;

    for change in changes(previous.as_ref(), &lock) {
        ctx.output.step(change.verb, &change.detail);
    }

    let path = workspace.lockfile_path();
    if lock.write(&path)? {
        ctx.output.success(&format!(
            "Locked {} packages in {:.2}s",
            lock.packages.len(),
            start.elapsed().as_secs_f64()
        ));
    } else {
        ctx.output.success(&format!("{} is up to date", path));
    }
    Ok(())
}

/// One line of the difference between two locks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockChange {
    pub verb: &'static str,
    pub detail: String,
}

/// Packages added, updated or removed relative to the previous lock
pub fn changes(previous: Option<&Lockfile>, current: &Lockfile) -> Vec<LockChange> {
    let before = previous.map(Lockfile::preferences).unwrap_or_default();
    let after = current.preferences();

    let mut changes = Vec::new();
    for (selector, version) in &after {
        match before.get(selector) {
            None => changes.push(LockChange {
                verb: "Adding",
                detail: format!("{} {}", selector, version),
            }),
            Some(old) if old != version => changes.push(LockChange {
                verb: "Updating",
                detail: format!("{} {} -> {}", selector, old, version),
            }),
            Some(_) => {},
        }
    }
    for (selector, version) in before.iter().filter(|(s, _)| !after.contains_key(*s)) {
        changes.push(LockChange {
            verb: "Removing",
            detail: format!("{} {}", selector, version),
        });
    }
    changes
}
