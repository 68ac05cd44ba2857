//! Configuration for dockpipe.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DOCKPIPE_TEMPLATES)
//! 2. Config file (.dockpipe/config.yaml)
//! 3. Defaults (./assets with the stock template file names)
//!
//! Config file discovery:
//! - Searches current directory and parents for .dockpipe/config.yaml
//! - Falls back to ~/.dockpipe/config.yaml
//! - Paths in config file are relative to the project root (parent of .dockpipe/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const TEMPLATES_ENV: &str = "DOCKPIPE_TEMPLATES";

const DEFAULT_TEMPLATES_DIR: &str = "assets";
const DEFAULT_CHANGE_TEMPLATE: &str = "CodeBuildECRChangePolicyStatement.json";
const DEFAULT_AUTHORIZATION_TEMPLATE: &str = "CodeBuildECRGetAuthorizationPolicyStatement.json";
const DEFAULT_PULL_TEMPLATE: &str = "CodeBuildECRPullImagesPolicyStatement.json";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Template directory (relative to project root)
    pub dir: Option<String>,
    pub change: Option<String>,
    pub authorization: Option<String>,
    pub pull_images: Option<String>,
}

/// Where the three policy templates live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSettings {
    pub dir: PathBuf,
    pub change: String,
    pub authorization: String,
    pub pull_images: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_TEMPLATES_DIR),
            change: DEFAULT_CHANGE_TEMPLATE.to_string(),
            authorization: DEFAULT_AUTHORIZATION_TEMPLATE.to_string(),
            pull_images: DEFAULT_PULL_TEMPLATE.to_string(),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub templates: TemplateSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let start = std::env::current_dir().ok()?;
    find_config_file_from(&start, dirs::home_dir().as_deref())
}

/// Search `start` and its parents, then fall back to `home`
fn find_config_file_from(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".dockpipe").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = home?.join(".dockpipe").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file over the defaults
fn apply_config_file(config: ConfigFile, config_path: &Path) -> TemplateSettings {
    // Project root is the parent of .dockpipe/
    let base_dir = config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."));

    let defaults = TemplateSettings::default();
    let templates = config.templates;

    TemplateSettings {
        dir: templates
            .dir
            .map(|dir| resolve_path(base_dir, &dir))
            .unwrap_or_else(|| base_dir.join(DEFAULT_TEMPLATES_DIR)),
        change: templates.change.unwrap_or(defaults.change),
        authorization: templates.authorization.unwrap_or(defaults.authorization),
        pull_images: templates.pull_images.unwrap_or(defaults.pull_images),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    resolve_config(find_config_file(), std::env::var(TEMPLATES_ENV).ok())
}

/// Layer the env override over the config file over the defaults
fn resolve_config(
    config_file: Option<PathBuf>,
    templates_env: Option<String>,
) -> Result<ResolvedConfig> {
    let mut templates = match config_file {
        Some(ref config_path) => apply_config_file(load_config_file(config_path)?, config_path),
        None => TemplateSettings::default(),
    };

    if let Some(dir) = templates_env {
        templates.dir = PathBuf::from(dir);
    }

    Ok(ResolvedConfig {
        templates,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
