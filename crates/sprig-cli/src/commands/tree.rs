//! `sprig tree`: print the resolved dependency graph

use sprig_core::error::SprigResult;
use sprig_lockfile::Lockfile;
use sprig_resolver::DependencyGraph;

use super::{CommandContext, Workspace};

pub async fn execute(ctx: &CommandContext) -> SprigResult<()> {
    for line in render(ctx).await? {
        ctx.output.line(&line);
    }
    Ok(())
}

/// Tree lines, resolved with the locked versions as preferences
pub async fn render(ctx: &CommandContext) -> SprigResult<Vec<String>> {
    let workspace = Workspace::load(ctx).await?;
    let preferences = workspace
        .read_lockfile()?
        .as_ref()
        .map(Lockfile::preferences)
        .unwrap_or_default();
    let resolution = workspace.resolve(preferences).await?;
    let graph = DependencyGraph::from_resolution(&resolution, workspace.root.selectors());
    Ok(graph.render_tree())
}
