//! Configuration for vidport.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VIDPORT_CACHE, SOURCE_URL, DEST_URL)
//! 2. Config file (.vidport/config.yaml)
//! 3. Defaults (cache under ~/.vidport)
//!
//! Credentials come from the environment only: SOURCE_PASSWORD and
//! DEST_PASSWORD are never read from the config file.
//!
//! Config file discovery walks the current directory and its parents;
//! relative paths in the file resolve against the config file's project
//! root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_CATEGORY: u16 = 13;

/// Raw config file schema (matches the YAML structure).
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub source: SourceSection,
    pub destination: DestinationSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    pub url: String,
    pub bucket: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationSection {
    /// Site root, e.g. `https://tube.example`; the API path is appended.
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub category: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSection {
    /// Cache root directory (relative to the config file's project root).
    pub root: Option<String>,
}

/// Resolved configuration with absolute paths and credentials attached.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_root: PathBuf,
    pub source_url: String,
    pub source_bucket: String,
    pub source_username: String,
    pub source_password: String,
    pub destination_url: String,
    pub destination_username: String,
    pub destination_password: String,
    pub category: u16,
    pub page_size: usize,
    /// Path to the config file (if found).
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Versioned API root on the destination.
    pub fn destination_api_url(&self) -> String {
        format!("{}/api/v1", self.destination_url.trim_end_matches('/'))
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.cache_root.join("videos")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.cache_root.join("profiles")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.cache_root.join("attachments")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.cache_root.join("thumbnails")
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.cache_root.join("mapping.json")
    }

    pub fn ownership_path(&self) -> PathBuf {
        self.cache_root.join(crate::engine::ownership::TABLE_FILE)
    }
}

/// Find config file by searching current directory and parents.
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".vidport").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file.
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root.
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load configuration from all sources.
pub fn load() -> Result<Config> {
    let config_path = find_config_file().context(
        "No .vidport/config.yaml found in this directory or any parent; \
         vidport needs the source and destination endpoints",
    )?;
    let file = load_config_file(&config_path)?;

    // Project root is the parent of .vidport/.
    let base_dir = config_path
        .parent()
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let cache_root = if let Ok(env_cache) = std::env::var("VIDPORT_CACHE") {
        PathBuf::from(env_cache)
    } else if let Some(root) = &file.cache.root {
        resolve_path(&base_dir, root)
    } else {
        dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".vidport")
            .join("cache")
    };

    let source_url = std::env::var("SOURCE_URL").unwrap_or_else(|_| file.source.url.clone());
    let destination_url =
        std::env::var("DEST_URL").unwrap_or_else(|_| file.destination.url.clone());

    Ok(Config {
        cache_root,
        source_url: source_url.trim_end_matches('/').to_string(),
        source_bucket: file.source.bucket,
        source_username: file.source.username,
        source_password: std::env::var("SOURCE_PASSWORD").unwrap_or_default(),
        destination_url: destination_url.trim_end_matches('/').to_string(),
        destination_username: file.destination.username,
        destination_password: std::env::var("DEST_PASSWORD").unwrap_or_default(),
        category: file.destination.category.unwrap_or(DEFAULT_CATEGORY),
        page_size: file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        config_file: Some(config_path),
    })
}
