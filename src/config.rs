//! Configuration for vidnotes.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VIDNOTES_HOME, VIDNOTES_STORE, VIDNOTES_BACKEND)
//! 2. Config file (.vidnotes/config.yaml)
//! 3. Defaults (~/.vidnotes, json backend)
//!
//! Config file discovery:
//! - Searches current directory and parents for .vidnotes/config.yaml
//! - Paths in config file are relative to the directory holding .vidnotes/

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bridge::DEFAULT_THUMBNAIL_URL;
use crate::controller::ControllerSettings;
use crate::library::SortKey;
use crate::store::StoreBackend;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".vidnotes";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
    /// Store file (relative to the project root)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    /// Sort order used when the library command gets no --sort
    pub default_sort: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoConfig {
    /// URL fragments of supported video pages
    pub hosts: Option<Vec<String>>,
    /// Fallback thumbnail template with a `{video_id}` placeholder
    pub thumbnail_url: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    pub backend: StoreBackend,
    /// Store file or database
    pub store_path: PathBuf,
    pub default_sort: SortKey,
    pub hosts: Vec<String>,
    pub thumbnail_url: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Settings handed to the controller
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            hosts: self.hosts.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
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

/// Resolve a path that may be relative to the project root
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

/// Merge defaults, an optional config file and environment lookups
fn resolve(
    default_home: PathBuf,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    // Project root is the parent of .vidnotes/
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."));

    let home = env("VIDNOTES_HOME")
        .map(PathBuf::from)
        .unwrap_or(default_home);

    let backend = match env("VIDNOTES_BACKEND") {
        Some(name) => name
            .parse::<StoreBackend>()
            .context("Invalid VIDNOTES_BACKEND")?,
        None => file.store.backend.unwrap_or_default(),
    };

    let store_path = if let Some(path) = env("VIDNOTES_STORE") {
        PathBuf::from(path)
    } else if let Some(ref path) = file.store.path {
        resolve_path(base_dir, path)
    } else {
        home.join(backend.default_file_name())
    };

    let default_sort = file
        .library
        .default_sort
        .as_deref()
        .map(SortKey::parse)
        .unwrap_or_default();

    let defaults = ControllerSettings::default();

    Ok(ResolvedConfig {
        home,
        backend,
        store_path,
        default_sort,
        hosts: file.video.hosts.unwrap_or(defaults.hosts),
        thumbnail_url: file
            .video
            .thumbnail_url
            .unwrap_or_else(|| DEFAULT_THUMBNAIL_URL.to_string()),
        config_file,
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

    resolve(default_home, config_file, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(root: &Path, yaml: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", yaml).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(PathBuf::from("/home/u/.vidnotes"), None, no_env).unwrap();

        assert_eq!(config.backend, StoreBackend::Json);
        assert_eq!(config.store_path, PathBuf::from("/home/u/.vidnotes/store.json"));
        assert_eq!(config.default_sort, SortKey::Recent);
        assert_eq!(config.hosts, vec!["youtube.com", "youtu.be"]);
        assert_eq!(config.thumbnail_url, DEFAULT_THUMBNAIL_URL);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
store:
  backend: sqlite
  path: ./data/notes.sqlite
library:
  default_sort: title
video:
  hosts: ["example.com"]
  thumbnail_url: "https://img.example.com/{video_id}.jpg"
"#,
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.version.as_deref(), Some("1.0"));
        assert_eq!(file.store.backend, Some(StoreBackend::Sqlite));

        let config = resolve(PathBuf::from("/unused"), Some(path), no_env).unwrap();
        assert_eq!(config.backend, StoreBackend::Sqlite);
        assert!(config.store_path.ends_with("data/notes.sqlite"));
        assert!(config.store_path.starts_with(temp.path()));
        assert_eq!(config.default_sort, SortKey::Title);
        assert_eq!(config.hosts, vec!["example.com"]);
        assert_eq!(
            config.controller_settings().thumbnail_url,
            "https://img.example.com/{video_id}.jpg"
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "store:\n  backend: json\n  path: ./notes.json");

        let env: HashMap<&str, &str> = [
            ("VIDNOTES_HOME", "/tmp/vn-home"),
            ("VIDNOTES_BACKEND", "sqlite"),
        ]
        .into_iter()
        .collect();
        let config = resolve(PathBuf::from("/unused"), Some(path), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/tmp/vn-home"));
        assert_eq!(config.backend, StoreBackend::Sqlite);
        // Explicit store path in the file still wins over the home default
        assert!(config.store_path.ends_with("notes.json"));
    }

    #[test]
    fn test_invalid_backend_env() {
        let result = resolve(PathBuf::from("/h"), None, |k| {
            (k == "VIDNOTES_BACKEND").then(|| "redis".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "version: \"1.0\"");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert!(found.starts_with(temp.path()));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
