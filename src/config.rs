//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `--config <FILE>` on the command line
//! 2. `$MAILSHELF_CONFIG` (environment variable)
//! 3. `~/.config/mailshelf/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailshelf\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MailshelfError, Result};
use crate::model::format::FormatSet;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// The calibre library books are delivered to.
    pub library: LibraryConfig,
    /// External executables.
    pub tools: ToolsConfig,
    /// Catalog tool output handling.
    pub catalog: CatalogConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the log file location.
    pub log_file: Option<PathBuf>,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Directory for extracted and converted books (system temp dir if unset).
    pub temp_dir: Option<PathBuf>,
    /// Exit with status 0 even when ingestion fails (failures are only logged).
    pub exit_zero_on_failure: bool,
}

/// Library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directory of the calibre library.
    pub path: PathBuf,
    /// Accepted book suffixes. Every accepted book ends up in all of them.
    pub formats: Vec<String>,
}

/// Names or paths of the external executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Catalog tool (`calibredb`).
    pub catalog: String,
    /// Format converter (`ebook-convert`).
    pub converter: String,
    /// Metadata reader (`ebook-meta`).
    pub metadata: String,
}

/// Catalog tool output handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Column width passed to `list -w` so rows never wrap.
    pub list_width: u32,
    /// Phrases on the first line of `add` output that mean "already in the library".
    pub duplicate_markers: Vec<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            cache_dir: None,
            temp_dir: None,
            exit_zero_on_failure: false,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/calibre-library"),
            formats: vec!["mobi".to_string(), "epub".to_string()],
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            catalog: "calibredb".to_string(),
            converter: "ebook-convert".to_string(),
            metadata: "ebook-meta".to_string(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            list_width: 9000,
            duplicate_markers: vec!["following books were not added".to_string()],
        }
    }
}

impl Config {
    /// Check the settings that cannot be expressed by the types alone.
    pub fn validate(&self) -> Result<()> {
        self.format_set()?;
        for (name, value) in [
            ("tools.catalog", &self.tools.catalog),
            ("tools.converter", &self.tools.converter),
            ("tools.metadata", &self.tools.metadata),
        ] {
            if value.trim().is_empty() {
                return Err(MailshelfError::Config(format!("{name} must not be empty")));
            }
        }
        if self.library.path.as_os_str().is_empty() {
            return Err(MailshelfError::Config("library.path must not be empty".into()));
        }
        Ok(())
    }

    /// Build the accepted format set from `library.formats`.
    pub fn format_set(&self) -> Result<FormatSet> {
        FormatSet::new(self.library.formats.iter().map(String::as_str))
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Result of loading the configuration, kept until logging is set up.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the configuration was read from, `None` for built-in defaults.
    pub source: Option<PathBuf>,
    /// An existing file that was ignored, with the reason.
    pub ignored: Option<(PathBuf, MailshelfError)>,
}

impl LoadedConfig {
    /// Report where the configuration came from. Call once a subscriber is installed.
    pub fn log(&self) {
        if let Some((path, e)) = &self.ignored {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
        }
        match &self.source {
            Some(path) => tracing::info!(path = %path.display(), "Loaded config"),
            None => tracing::debug!("Using default config"),
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error;
/// the error is kept in [`LoadedConfig::ignored`].
pub fn load_config() -> LoadedConfig {
    load_config_at(config_file_path())
}

fn load_config_at(path: Option<PathBuf>) -> LoadedConfig {
    let mut loaded = LoadedConfig {
        config: Config::default(),
        source: None,
        ignored: None,
    };
    if let Some(path) = path.filter(|p| p.exists()) {
        match load_config_from(&path) {
            Ok(cfg) => {
                loaded.config = cfg;
                loaded.source = Some(path);
            }
            Err(e) => loaded.ignored = Some((path, e)),
        }
    }
    loaded
}

/// Load configuration from an explicit file. Errors are not masked.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| MailshelfError::io(path, e))?;
    toml::from_str::<Config>(&contents)
        .map_err(|e| MailshelfError::Config(format!("{}: {e}", path.display())))
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSHELF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailshelf").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailshelf")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    config
        .general
        .log_file
        .clone()
        .unwrap_or_else(|| cache_dir(config).join("mailshelf.log"))
}
