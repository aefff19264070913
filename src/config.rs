//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the state directory
//! 3. `FILEORG_*` environment variables
//!
//! The resolved [`Config`] is handed to each component explicitly; nothing
//! reads it from a global.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::KeepStrategy;
use crate::scanner::DEFAULT_EXCLUDE_DIRS;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "FILEORG_";

/// Name of the configuration file inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the scan caches and the operation log.
    pub state_dir: PathBuf,
    /// Directory names skipped during scans.
    pub exclude_dirs: Vec<String>,
    /// Include dotfiles and dot-directories in scans.
    pub include_hidden: bool,
    /// Reuse and refresh the scan cache.
    pub use_cache: bool,
    /// Default rule for choosing which duplicate to keep.
    pub keep_strategy: KeepStrategy,
    /// Worker threads for content hashing.
    pub hash_threads: usize,
    /// Hash destinations when recording operations, so undo also detects
    /// content edits made under a preserved modification time.
    pub verify_content_on_undo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| (*s).to_string()).collect(),
            include_hidden: false,
            use_cache: true,
            keep_strategy: KeepStrategy::default(),
            hash_threads: 4,
            verify_content_on_undo: false,
        }
    }
}

impl Config {
    /// Platform-specific default state directory.
    ///
    /// Falls back to `.fileorg` in the working directory when no home
    /// directory can be determined.
    #[must_use]
    pub fn default_state_dir() -> PathBuf {
        ProjectDirs::from("org", "fileorg", "fileorg")
            .map_or_else(|| PathBuf::from(".fileorg"), |dirs| dirs.data_dir().to_path_buf())
    }

    /// Layered configuration sources rooted at `state_dir`.
    #[must_use]
    pub fn figment(state_dir: &Path) -> Figment {
        let defaults = Self {
            state_dir: state_dir.to_path_buf(),
            ..Self::default()
        };
        Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(state_dir.join(CONFIG_FILE)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration, using the default state directory unless one is given.
    ///
    /// Invalid files or variables are logged and the defaults are used.
    #[must_use]
    pub fn load(state_dir: Option<&Path>) -> Self {
        let dir = state_dir.map_or_else(Self::default_state_dir, Path::to_path_buf);
        match Self::try_load(&dir) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {}", e);
                Self {
                    state_dir: dir,
                    ..Self::default()
                }
            }
        }
    }

    /// Load the configuration rooted at `state_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file or an environment variable is invalid.
    pub fn try_load(state_dir: &Path) -> Result<Self> {
        let mut config: Self = Self::figment(state_dir)
            .extract()
            .context("invalid configuration")?;
        config.hash_threads = config.hash_threads.max(1);
        Ok(config)
    }

    /// Save the configuration as TOML to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE)
    }

    /// Directory holding per-root scan caches.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir.join("cache")
    }

    /// Path of the operation log database.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("operations.db")
    }
}
