//! Configuration for assetline paths, pipeline and import settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ASSETLINE_HOME, ASSETLINE_PIPELINE)
//! 2. Config file (.assetline/config.yaml)
//! 3. Defaults (~/.assetline, built-in pipeline)
//!
//! Config file discovery:
//! - Searches current directory and parents for .assetline/config.yaml
//! - Paths in the config file are relative to the .assetline/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::PipelineDefinition;
use crate::ingest::ScanConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".assetline";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Custom pipeline definition file
    #[serde(default)]
    pub pipeline: Option<String>,
    #[serde(default)]
    pub import: Option<ImportConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Application home (relative to config file)
    pub home: Option<String>,
    /// Where pipeline data is stored (relative to config file)
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to the assetline home
    pub home: PathBuf,
    /// Directory holding the persisted pipeline data
    pub data_dir: PathBuf,
    /// Custom pipeline definition, if any
    pub pipeline_file: Option<PathBuf>,
    /// Folder import settings
    pub import: ScanConfig,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Load the configured pipeline definition, or the built-in one
    pub fn load_pipeline(&self) -> Result<PipelineDefinition> {
        match self.pipeline_file {
            Some(ref path) => PipelineDefinition::from_file(path),
            None => PipelineDefinition::builtin(),
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
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

/// Environment overrides, read once per load
#[derive(Debug, Default)]
struct EnvOverrides {
    home: Option<PathBuf>,
    pipeline: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var_os("ASSETLINE_HOME").map(PathBuf::from),
            pipeline: std::env::var_os("ASSETLINE_PIPELINE").map(PathBuf::from),
        }
    }
}

/// Combine the config file, environment and defaults
fn resolve(
    config_path: Option<PathBuf>,
    env: EnvOverrides,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let Some(config_path) = config_path else {
        let home = env.home.unwrap_or(default_home);
        return Ok(ResolvedConfig {
            data_dir: home.join("data"),
            home,
            pipeline_file: env.pipeline,
            import: ScanConfig::default(),
            config_file: None,
        });
    };

    let config = load_config_file(&config_path)?;
    let config_dir = config_path.parent().unwrap_or(Path::new("."));

    let home = match (env.home, config.paths.home.as_deref()) {
        (Some(home), _) => home,
        (None, Some(home)) => resolve_path(config_dir, home),
        (None, None) => default_home,
    };

    let data_dir = match config.paths.data_dir.as_deref() {
        Some(dir) => resolve_path(config_dir, dir),
        None => home.join("data"),
    };

    let pipeline_file = env
        .pipeline
        .or_else(|| config.pipeline.as_deref().map(|p| resolve_path(config_dir, p)));

    let import = match config.import {
        Some(import) => ScanConfig {
            extensions: import
                .extensions
                .unwrap_or_else(|| ScanConfig::default().extensions),
            ignore: import.ignore,
        },
        None => ScanConfig::default(),
    };

    Ok(ResolvedConfig {
        home,
        data_dir,
        pipeline_file,
        import,
        config_file: Some(config_path),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file(&cwd));

    resolve(config_file, EnvOverrides::from_env(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the directory holding pipeline data
pub fn data_dir() -> Result<PathBuf> {
    Ok(config()?.data_dir.clone())
}
