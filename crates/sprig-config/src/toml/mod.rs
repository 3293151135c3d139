//! sprig.toml manifest parsing and serialization

use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use sprig_core::error::SprigError;
use sprig_core::utils::blake3_hash;
use sprig_core::{Declaration, DependencyKind, Version};

use crate::ConfigResult;

/// File name of the project manifest
pub const MANIFEST_FILE: &str = "sprig.toml";

/// Source discriminator prefix for path dependencies
pub const PATH_SOURCE_PREFIX: &str = "path:";

/// Complete sprig.toml manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprigToml {
    /// Package metadata section
    pub package: PackageSection,

    /// Runtime dependencies
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,

    /// Development dependencies
    #[serde(default, rename = "dev-dependencies")]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,

    /// Feature groups, each listing the optional dependencies it enables
    #[serde(default)]
    pub features: BTreeMap<String, Vec<String>>,

    /// Alternate package indexes by name
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSpec>,

    /// Overrides for the target environment markers are evaluated against
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "RegistrySection::is_empty")]
    pub registry: RegistrySection,

    #[serde(default, skip_serializing_if = "ResolverSection::is_empty")]
    pub resolver: ResolverSection,
}

/// Package metadata section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name (required)
    pub name: String,

    /// Package version (required)
    pub version: Version,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Dependency specification (simple string or detailed table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Simple version requirement string
    Simple(String),

    /// Detailed dependency specification
    Detailed {
        /// Version requirement
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,

        /// Local directory holding another sprig.toml
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,

        /// Name of an entry in `[sources]`
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,

        /// Environment condition, e.g. `os == 'windows'`
        #[serde(skip_serializing_if = "Option::is_none")]
        markers: Option<String>,

        /// Only installed when a feature lists it
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
    },
}

/// An alternate index directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub index: String,
}

/// Default registry settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

/// Resolver settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_prereleases: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<bool>,
}

impl RegistrySection {
    pub fn is_empty(&self) -> bool {
        self.index.is_none()
    }
}

impl ResolverSection {
    pub fn is_empty(&self) -> bool {
        self.allow_prereleases.is_none() && self.prefetch.is_none()
    }
}

impl DependencySpec {
    /// The constraint text; empty when only a path or source is given
    pub fn constraint(&self) -> &str {
        match self {
            DependencySpec::Simple(version) => version,
            DependencySpec::Detailed { version, .. } => version.as_deref().unwrap_or(""),
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            DependencySpec::Detailed { path, .. } => path.as_deref(),
            DependencySpec::Simple(_) => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            DependencySpec::Detailed { source, .. } => source.as_deref(),
            DependencySpec::Simple(_) => None,
        }
    }

    pub fn markers(&self) -> Option<&str> {
        match self {
            DependencySpec::Detailed { markers, .. } => markers.as_deref(),
            DependencySpec::Simple(_) => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, DependencySpec::Detailed { optional: true, .. })
    }

    /// Check if this is a path dependency
    pub fn is_path(&self) -> bool {
        self.path().is_some()
    }

    /// The selector source this dependency resolves against
    pub fn source_discriminator(&self) -> Option<String> {
        match (self.path(), self.source()) {
            (Some(path), _) => Some(format!("{}{}", PATH_SOURCE_PREFIX, path)),
            (None, Some(source)) => Some(source.to_string()),
            (None, None) => None,
        }
    }
}

/// The parts of a manifest that affect resolution
#[derive(Serialize)]
struct ResolutionInputs<'a> {
    dependencies: &'a BTreeMap<String, DependencySpec>,
    #[serde(rename = "dev-dependencies")]
    dev_dependencies: &'a BTreeMap<String, DependencySpec>,
    features: &'a BTreeMap<String, Vec<String>>,
    sources: &'a BTreeMap<String, SourceSpec>,
}

impl SprigToml {
    /// Direct requirements, normal dependencies first, each sorted by name
    pub fn declarations(&self) -> Vec<Declaration> {
        let normal = self
            .dependencies
            .iter()
            .map(|(name, spec)| (name, spec, DependencyKind::Normal));
        let dev = self
            .dev_dependencies
            .iter()
            .map(|(name, spec)| (name, spec, DependencyKind::Dev));

        normal
            .chain(dev)
            .map(|(name, spec, kind)| {
                let mut declaration = Declaration::new(name.as_str(), spec.constraint());
                declaration.kind = kind;
                declaration.source = spec.source_discriminator();
                declaration.marker = spec.markers().map(str::to_string);
                if spec.is_optional() {
                    declaration.groups = self.groups_of(name);
                }
                declaration
            })
            .collect()
    }

    /// Names of the feature groups this manifest defines
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    fn groups_of(&self, dependency: &str) -> Vec<String> {
        self.features
            .iter()
            .filter(|(_, members)| members.iter().any(|m| m == dependency))
            .map(|(group, _)| group.clone())
            .collect()
    }

    /// Hash of everything that affects resolution.
    ///
    /// Package metadata and settings are left out, so editing a description
    /// does not make the lock file stale.
    pub fn content_hash(&self) -> ConfigResult<String> {
        let inputs = ResolutionInputs {
            dependencies: &self.dependencies,
            dev_dependencies: &self.dev_dependencies,
            features: &self.features,
            sources: &self.sources,
        };
        let canonical = toml::to_string(&inputs).map_err(|e| SprigError::TomlParse {
            path: MANIFEST_FILE.to_string(),
            message: format!("cannot serialize resolution inputs: {}", e),
        })?;
        Ok(blake3_hash(canonical.as_bytes()))
    }
}

/// Parse TOML string to a SprigToml manifest
pub fn parse_sprig_toml(content: &str) -> ConfigResult<SprigToml> {
    parse_with_path(content, MANIFEST_FILE)
}

fn parse_with_path(content: &str, path: &str) -> ConfigResult<SprigToml> {
    // toml_edit reports syntax errors with line and column
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| SprigError::TomlParse {
            path: path.to_string(),
            message: format!("TOML syntax error: {}", e),
        })?;

    let config: SprigToml = toml::from_str(content).map_err(|e| SprigError::TomlParse {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Serialize a manifest back to TOML
pub fn serialize_sprig_toml(config: &SprigToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| SprigError::TomlParse {
        path: MANIFEST_FILE.to_string(),
        message: format!("TOML serialization error: {}", e),
    })
}

/// Validate manifest structure. Constraint and marker syntax is checked later,
/// when declarations are expanded.
pub fn validate_config(config: &SprigToml) -> ConfigResult<()> {
    if config.package.name.is_empty() {
        return Err(SprigError::validation(
            "package.name",
            "Package name is required in [package] section",
        ));
    }
    if !is_valid_package_name(&config.package.name) {
        return Err(SprigError::validation(
            "package.name",
            format!(
                "Invalid package name '{}'. Package names must start with a letter or digit and may contain '-', '_' or '.'",
                config.package.name
            ),
        ));
    }

    for (name, spec) in config.dependencies.iter().chain(&config.dev_dependencies) {
        validate_dependency_spec(config, name, spec)?;
    }

    for (group, members) in &config.features {
        for member in members {
            let optional = config
                .dependencies
                .get(member)
                .map_or(false, DependencySpec::is_optional);
            if !optional {
                return Err(SprigError::validation(
                    format!("features.{}", group),
                    format!("'{}' is not an optional dependency", member),
                ));
            }
        }
    }

    for (name, source) in &config.sources {
        if source.index.trim().is_empty() {
            return Err(SprigError::validation(
                format!("sources.{}", name),
                "index must not be empty",
            ));
        }
    }

    Ok(())
}

/// Load and parse sprig.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<SprigToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;
    parse_with_path(&content, path.as_str())
}

fn validate_dependency_spec(config: &SprigToml, name: &str, spec: &DependencySpec) -> ConfigResult<()> {
    let field = format!("dependencies.{}", name);
    if !is_valid_package_name(name) {
        return Err(SprigError::validation(
            field,
            format!("Invalid dependency name '{}'", name),
        ));
    }

    if let DependencySpec::Detailed {
        version,
        path,
        source,
        optional,
        ..
    } = spec
    {
        if version.is_none() && path.is_none() {
            return Err(SprigError::validation(
                field,
                format!("Dependency '{}' must specify a version or a path", name),
            ));
        }
        if path.is_some() && source.is_some() {
            return Err(SprigError::validation(
                field,
                format!("Dependency '{}' can only specify one of path or source", name),
            ));
        }
        if let Some(source) = source {
            if !config.sources.contains_key(source) {
                return Err(SprigError::validation(
                    field,
                    format!("Source '{}' is not defined in [sources]", source),
                ));
            }
        }
        if *optional && config.groups_of(name).is_empty() {
            return Err(SprigError::validation(
                field,
                format!("Optional dependency '{}' is not part of any feature", name),
            ));
        }
    }

    Ok(())
}

fn is_valid_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
