//! Configuration layering, manifest discovery, and environment overrides

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use sprig_core::error::SprigError;
use sprig_core::TargetEnvironment;
use tracing::debug;

use crate::toml::{RegistrySection, ResolverSection, SourceSpec, SprigToml, MANIFEST_FILE};
use crate::ConfigResult;

const GLOBAL_DIR: &str = ".sprig";
const GLOBAL_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "SPRIG_";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
    /// Directory holding the global config file
    global_dir: Option<Utf8PathBuf>,
}

/// Where a setting came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project sprig.toml file
    Project(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

/// A project manifest and the directory it lives in
#[derive(Debug, Clone)]
pub struct Project {
    pub manifest: SprigToml,
    pub manifest_path: Utf8PathBuf,
    pub root: Utf8PathBuf,
}

/// `~/.sprig/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,
    /// File the config was read from; relative paths are resolved against it
    #[serde(skip)]
    pub path: Option<Utf8PathBuf>,
}

/// Effective settings after every layer has been applied
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Default package index directory
    pub index: Option<Utf8PathBuf>,
    pub index_origin: Option<ConfigSource>,
    /// Alternate index directories by source name
    pub sources: BTreeMap<String, Utf8PathBuf>,
    pub allow_prereleases: bool,
    pub prefetch: bool,
    /// Target environment overrides
    pub environment: BTreeMap<String, String>,
}

/// Configuration layering and merging
#[derive(Debug, Default)]
pub struct ConfigLayering {
    /// Global configuration
    global_config: Option<GlobalConfig>,
    /// Environment overrides
    env_overrides: HashMap<String, String>,
    /// CLI flag overrides
    cli_overrides: HashMap<String, String>,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Global(path) => write!(f, "global config {}", path),
            ConfigSource::Project(path) => write!(f, "{}", path),
            ConfigSource::Environment(var) => write!(f, "${}", var),
            ConfigSource::CommandLine => write!(f, "command line"),
        }
    }
}

impl Project {
    pub fn new(manifest: SprigToml, manifest_path: Utf8PathBuf) -> Self {
        let root = manifest_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Self {
            manifest,
            manifest_path,
            root,
        }
    }
}

impl GlobalConfig {
    pub fn parse(content: &str, path: &Utf8Path) -> ConfigResult<Self> {
        let mut config: GlobalConfig = toml::from_str(content).map_err(|e| SprigError::TomlParse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index: None,
            index_origin: None,
            sources: BTreeMap::new(),
            allow_prereleases: false,
            prefetch: true,
            environment: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// The host environment with the configured overrides applied
    pub fn target_environment(&self) -> TargetEnvironment {
        let mut env = TargetEnvironment::current();
        env.extend(self.environment.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let global_dir = dirs::home_dir()
            .and_then(|home| Utf8PathBuf::try_from(home).ok())
            .map(|home| home.join(GLOBAL_DIR));
        Self { cwd, global_dir }
    }

    /// Read the global config from `dir` instead of `~/.sprig`
    pub fn with_global_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.global_dir = Some(dir.into());
        self
    }

    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> Utf8PathBuf {
        let mut current = Some(self.cwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(filename);
            if candidate.exists() {
                return candidate;
            }
            current = dir.parent();
        }

        // Path in current directory even if it doesn't exist
        self.cwd.join(filename)
    }

    /// Load the nearest sprig.toml
    pub async fn load_project(&self) -> ConfigResult<Project> {
        let path = self.resolve_config_path(MANIFEST_FILE);
        if !path.exists() {
            return Err(SprigError::validation(
                "manifest",
                format!(
                    "No {} found in {} or any parent directory",
                    MANIFEST_FILE, self.cwd
                ),
            ));
        }

        let manifest = crate::toml::load_from_file(&path).await?;
        debug!("loaded manifest {}", path);
        Ok(Project::new(manifest, path))
    }

    /// Load global configuration, if there is one
    pub async fn load_global_config(&self) -> ConfigResult<Option<GlobalConfig>> {
        let Some(dir) = &self.global_dir else {
            return Ok(None);
        };
        let path = dir.join(GLOBAL_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;
        let config = GlobalConfig::parse(&content, &path)?;
        debug!("loaded global config {}", path);
        Ok(Some(config))
    }
}

impl ConfigLayering {
    /// Create a new configuration layering system
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global(mut self, global: Option<GlobalConfig>) -> Self {
        self.global_config = global;
        self
    }

    pub fn with_env_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.env_overrides = overrides;
        self
    }

    /// CLI overrides use the keys `index`, `allow-prereleases`, `prefetch`
    /// and `env.<key>`.
    pub fn with_cli_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.cli_overrides = overrides;
        self
    }

    /// Merge the layers: global, project, environment, then CLI
    pub fn merge(&self, project: &Project) -> ConfigResult<Settings> {
        let mut settings = Settings::default();

        if let Some(global) = &self.global_config {
            let origin = ConfigSource::Global(global.path.clone().unwrap_or_default());
            let base = global
                .path
                .as_deref()
                .and_then(Utf8Path::parent)
                .unwrap_or_else(|| Utf8Path::new("."));
            Self::apply_sections(
                &mut settings,
                &global.registry,
                &global.resolver,
                &global.sources,
                base,
                origin,
            );
        }

        let manifest = &project.manifest;
        Self::apply_sections(
            &mut settings,
            &manifest.registry,
            &manifest.resolver,
            &manifest.sources,
            &project.root,
            ConfigSource::Project(project.manifest_path.clone()),
        );
        settings.environment.extend(
            manifest
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Self::apply_env_overrides(&mut settings, &self.env_overrides)?;
        Self::apply_cli_overrides(&mut settings, &self.cli_overrides)?;

        Ok(settings)
    }

    fn apply_sections(
        settings: &mut Settings,
        registry: &RegistrySection,
        resolver: &ResolverSection,
        sources: &BTreeMap<String, SourceSpec>,
        base: &Utf8Path,
        origin: ConfigSource,
    ) {
        if let Some(index) = &registry.index {
            settings.index = Some(base.join(index));
            settings.index_origin = Some(origin);
        }
        if let Some(allow) = resolver.allow_prereleases {
            settings.allow_prereleases = allow;
        }
        if let Some(prefetch) = resolver.prefetch {
            settings.prefetch = prefetch;
        }
        for (name, source) in sources {
            settings.sources.insert(name.clone(), base.join(&source.index));
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(settings: &mut Settings, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "SPRIG_INDEX" => {
                    settings.index = Some(Utf8PathBuf::from(value));
                    settings.index_origin = Some(ConfigSource::Environment(key.clone()));
                },
                "SPRIG_ALLOW_PRERELEASES" => {
                    settings.allow_prereleases = parse_bool(key, value)?;
                },
                "SPRIG_PREFETCH" => {
                    settings.prefetch = parse_bool(key, value)?;
                },
                _ => {
                    // Unknown environment variable, ignore
                },
            }
        }
        Ok(())
    }

    /// Apply CLI flag overrides
    fn apply_cli_overrides(settings: &mut Settings, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "index" => {
                    settings.index = Some(Utf8PathBuf::from(value));
                    settings.index_origin = Some(ConfigSource::CommandLine);
                },
                "allow-prereleases" => {
                    settings.allow_prereleases = parse_bool(key, value)?;
                },
                "prefetch" => {
                    settings.prefetch = parse_bool(key, value)?;
                },
                other => {
                    if let Some(env_key) = other.strip_prefix("env.") {
                        settings.environment.insert(env_key.to_string(), value.clone());
                    }
                },
            }
        }
        Ok(())
    }

    /// Collect `SPRIG_*` environment variables
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SprigError::validation(
            field,
            format!("expected a boolean, got '{}'", value),
        )),
    }
}
