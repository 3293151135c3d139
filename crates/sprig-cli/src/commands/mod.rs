//! Command handlers and the resolution pipeline they share.
//!
//! Every resolving command goes through [`Workspace::load`]: find and parse
//! the manifest, layer the settings, expand the declarations for the
//! requested features, and set up the sources. Resolution itself runs on a
//! blocking thread so Ctrl-C can cancel it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use camino::Utf8PathBuf;
use sprig_config::{ConfigLayering, ConfigLoader, Project, Settings};
use sprig_core::error::{SprigError, SprigResult};
use sprig_core::utils::blake3_hash;
use sprig_core::{PackageSelector, TargetEnvironment, Version};
use sprig_lockfile::{Lockfile, LOCKFILE_NAME};
use sprig_registry::SourceSet;
use sprig_resolver::{
    expand, CancellationToken, FeatureActivation, Resolution, Resolver, ResolverOptions,
    RootRequirements,
};
use tracing::{debug, info, warn};

pub mod check;
pub mod install;
pub mod lock;
pub mod tree;


use crate::output::OutputHandler;
use crate::{Commands, ResolveArgs};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub output: OutputHandler,
    pub args: ResolveArgs,
    /// Global config directory; `None` means `~/.sprig`
    pub global_dir: Option<Utf8PathBuf>,
    /// `SPRIG_*` variables captured at startup
    pub env_overrides: HashMap<String, String>,
}

impl CommandContext {
    pub fn new(args: ResolveArgs) -> SprigResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| SprigError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|e| SprigError::validation("cwd", e.to_string()))?;

        Ok(Self {
            cwd,
            output: OutputHandler::new(),
            args,
            global_dir: None,
            env_overrides: ConfigLayering::collect_env_overrides(),
        })
    }

    /// Command-line flags in the key form the settings layering expects
    fn cli_overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(index) = &self.args.index {
            overrides.insert("index".to_string(), self.cwd.join(index).to_string());
        }
        if self.args.allow_prereleases {
            overrides.insert("allow-prereleases".to_string(), "true".to_string());
        }
        for (key, value) in &self.args.environment {
            overrides.insert(format!("env.{}", key), value.clone());
        }
        overrides
    }
}

/// Everything one resolving command needs
pub struct Workspace {
    pub project: Project,
    pub settings: Settings,
    pub environment: TargetEnvironment,
    pub activation: FeatureActivation,
    pub root: RootRequirements,
    pub sources: Arc<SourceSet>,
    /// Identifies the resolution inputs; stored in and compared with sprig.lock
    pub content_hash: String,
}

impl Workspace {
    pub async fn load(ctx: &CommandContext) -> SprigResult<Self> {
        let mut loader = ConfigLoader::new(ctx.cwd.clone());
        if let Some(dir) = &ctx.global_dir {
            loader = loader.with_global_dir(dir.clone());
        }
        let project = loader.load_project().await?;
        let global = loader.load_global_config().await?;

        let settings = ConfigLayering::new()
            .with_global(global)
            .with_env_overrides(ctx.env_overrides.clone())
            .with_cli_overrides(ctx.cli_overrides())
            .merge(&project)?;
        if let Some(origin) = &settings.index_origin {
            debug!("package index from {}", origin);
        }

        let environment = settings.target_environment();
        let activation = FeatureActivation::select(
            project.manifest.feature_names(),
            &ctx.args.features,
            ctx.args.all_features,
        )?
        .with_dev(!ctx.args.no_dev);
        let root = expand(&project.manifest.declarations(), &activation, &environment)?;

        let sources = SourceSet::from_settings(&settings, &project.root)?;
        let content_hash = inputs_hash(
            &project.manifest.content_hash()?,
            &activation,
            &environment,
        );

        Ok(Self {
            project,
            settings,
            environment,
            activation,
            root,
            sources: Arc::new(sources),
            content_hash,
        })
    }

    pub fn lockfile_path(&self) -> Utf8PathBuf {
        self.project.root.join(LOCKFILE_NAME)
    }

    pub fn read_lockfile(&self) -> SprigResult<Option<Lockfile>> {
        Lockfile::read(&self.lockfile_path())
    }

    /// Run the resolver on a blocking thread. Ctrl-C cancels the search
    /// and surfaces as [`SprigError::Cancelled`].
    pub async fn resolve(
        &self,
        preferences: BTreeMap<PackageSelector, Version>,
    ) -> SprigResult<Resolution> {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let sources = Arc::clone(&self.sources);
        let root = self.root.clone();
        let environment = self.environment.clone();
        let options = ResolverOptions {
            prefetch: self.settings.prefetch,
            allow_prereleases: self.settings.allow_prereleases,
        };

        let mut task = tokio::task::spawn_blocking(move || {
            Resolver::new(sources.as_ref(), &environment)
                .with_options(options)
                .with_preferences(preferences)
                .with_cancellation(worker_token)
                .resolve(&root)
        });

        let joined = tokio::select! {
            joined = &mut task => joined,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, cancelling resolution");
                token.cancel();
                task.await
            }
        };
        let resolution = joined.map_err(|e| {
            SprigError::io("Resolution task failed".to_string(), std::io::Error::other(e))
        })??;

        info!(
            "resolved {} packages ({} decisions, {} conflicts) in {}ms",
            resolution.len(),
            resolution.stats.decisions,
            resolution.stats.conflicts,
            resolution.stats.resolution_time_ms
        );
        Ok(resolution)
    }

    /// Resolve and build a lock, preferring the versions of `previous`
    pub async fn relock(&self, previous: Option<&Lockfile>) -> SprigResult<(Resolution, Lockfile)> {
        let preferences = previous.map(Lockfile::preferences).unwrap_or_default();
        let resolution = self.resolve(preferences).await?;
        let lock = Lockfile::from_resolution(&resolution, self.sources.as_ref(), self.content_hash.clone())?;
        Ok((resolution, lock))
    }
}

/// Hash of the manifest inputs, the activated features and the target
/// environment. A lock is only reused when all three match.
pub fn inputs_hash(
    manifest_hash: &str,
    activation: &FeatureActivation,
    environment: &TargetEnvironment,
) -> String {
    let mut inputs = format!("manifest={}\ndev={}\n", manifest_hash, activation.includes_dev());
    for group in activation.groups() {
        inputs.push_str(&format!("feature={}\n", group));
    }
    for (key, value) in environment.iter() {
        inputs.push_str(&format!("env.{}={}\n", key, value));
    }
    format!("blake3:{}", blake3_hash(inputs.as_bytes()))
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> SprigResult<()> {
    match command {
        Commands::Lock => {
            info!("Locking dependencies");
            lock::execute(ctx).await
        },
        Commands::Install { frozen, dry_run } => {
            info!("Computing install plan (frozen: {}, dry_run: {})", frozen, dry_run);
            install::execute(frozen, dry_run, ctx).await
        },
        Commands::Tree => tree::execute(ctx).await,
        Commands::Check => {
            info!("Checking configuration");
            check::execute(ctx).await
        },
        Commands::Version => show_version(ctx),
    }
}

fn show_version(ctx: &CommandContext) -> SprigResult<()> {
    ctx.output.line(&format!("sprig {}", env!("CARGO_PKG_VERSION")));
    ctx.output.info(&format!("target: {}", env!("SPRIG_BUILD_TARGET")));
    ctx.output.info(&format!("rustc: {}", env!("RUSTC_VERSION")));
    Ok(())
}
