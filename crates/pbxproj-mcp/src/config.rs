use crate::api::RewriteRule;
use crate::filetype::{FileTypeOverride, FileTypes};
use crate::scan::build_globset;
use crate::store::{StoreError, resolve_project_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "pbxproj.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Project path relative to the repo root.
    pub project: Option<String>,
    pub default_target: Option<String>,
    pub backup: Option<bool>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub file_types: BTreeMap<String, FileTypeOverride>,
    /// Rules `rewrite-paths` applies when called without any.
    #[serde(default)]
    pub rewrite: Vec<RewriteRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    InvalidGlob(String),
    #[error("invalid rewrite rule: {0}")]
    InvalidRule(String),
    #[error("invalid value for {var}: {value:?} (expected 0 or 1)")]
    InvalidEnv { var: String, value: String },
    #[error(transparent)]
    Project(#[from] StoreError),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config.read_failed",
            ConfigError::Parse { .. } => "config.parse_failed",
            ConfigError::InvalidGlob(_) => "config.invalid_glob",
            ConfigError::InvalidRule(_) => "config.invalid_rule",
            ConfigError::InvalidEnv { .. } => "config.invalid_env",
            ConfigError::Project(e) => e.code(),
        }
    }
}

/// `<repo_root>/pbxproj.toml`, or defaults when absent.
pub fn load_config(repo_root: &Path) -> Result<ToolConfig, ConfigError> {
    let path = repo_root.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(ToolConfig::default());
    }
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let cfg: ToolConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        message: e.to_string(),
    })?;

    build_globset(&cfg.scan.include_globs).map_err(ConfigError::InvalidGlob)?;
    build_globset(&cfg.scan.exclude_globs).map_err(ConfigError::InvalidGlob)?;
    for rule in &cfg.rewrite {
        check_rule(rule)?;
    }
    Ok(cfg)
}

fn check_rule(rule: &RewriteRule) -> Result<(), ConfigError> {
    match rule {
        RewriteRule::StripPrefix(p) if p.is_empty() => Err(ConfigError::InvalidRule(
            "strip_prefix must not be empty".to_string(),
        )),
        RewriteRule::ReplacePrefix { from, .. } if from.is_empty() => Err(
            ConfigError::InvalidRule("replace_prefix.from must not be empty".to_string()),
        ),
        RewriteRule::Regex { pattern, .. } => regex::Regex::new(pattern)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidRule(format!("{pattern}: {e}"))),
        _ => Ok(()),
    }
}

pub fn default_repo_root() -> PathBuf {
    if let Ok(v) = std::env::var("PBXPROJ_REPO_ROOT") {
        return PathBuf::from(v);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Explicit arguments from a CLI flag or an MCP request.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub repo_root: Option<String>,
    pub project: Option<String>,
    pub target: Option<String>,
    pub backup: Option<bool>,
}

/// Everything one operation needs, after overlaying arguments, environment
/// and `pbxproj.toml`, in that precedence.
#[derive(Debug, Clone)]
pub struct Settings {
    pub repo_root: PathBuf,
    pub project_path: PathBuf,
    pub target: Option<String>,
    pub backup: bool,
    pub scan: ScanConfig,
    pub file_types: FileTypes,
    pub rewrite: Vec<RewriteRule>,
}

impl Settings {
    pub fn resolve(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::resolve_with_env(overrides, |k| std::env::var(k).ok())
    }

    pub fn resolve_with_env<F>(overrides: &Overrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let repo_root = overrides
            .repo_root
            .clone()
            .or_else(|| env("PBXPROJ_REPO_ROOT"))
            .map(PathBuf::from)
            .unwrap_or_else(default_repo_root);
        let cfg = load_config(&repo_root)?;

        let project_arg = overrides
            .project
            .clone()
            .or_else(|| env("PBXPROJ_PROJECT"))
            .or(cfg.project.clone());
        let project_path = match project_arg {
            Some(p) => resolve_project_path(&repo_root.join(p))?,
            None => resolve_project_path(&repo_root)?,
        };

        let env_backup = match env("PBXPROJ_BACKUP") {
            Some(v) => Some(parse_flag("PBXPROJ_BACKUP", &v)?),
            None => None,
        };
        let backup = overrides
            .backup
            .or(env_backup)
            .or(cfg.backup)
            .unwrap_or(true);

        let target = overrides
            .target
            .clone()
            .or_else(|| env("PBXPROJ_TARGET"))
            .or(cfg.default_target);

        tracing::debug!(
            repo_root = %repo_root.display(),
            project = %project_path.display(),
            backup,
            "resolved settings"
        );
        Ok(Self {
            repo_root,
            project_path,
            target,
            backup,
            scan: cfg.scan,
            file_types: FileTypes::new(cfg.file_types),
            rewrite: cfg.rewrite,
        })
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
