//! TOML configuration of the `settings` command.
//!
//! The config file lists the settings files to mount and how they are
//! flushed:
//!
//! ```toml
//! log_level = "warn"
//! flush = "on_request"
//!
//! [[mounts]]
//! name = ""                      # root: every name no other mount claims
//! path = "/etc/myapp/base.conf"
//! read_only = true
//!
//! [[mounts]]
//! name = "user"
//! path = "/home/me/.config/myapp/user.conf"
//! ```
//!
//! Default location:
//! - Windows:  `%APPDATA%\settings-cli\config.toml`
//! - Linux:    `~/.config/settings-cli/config.toml`
//! - macOS:    `~/Library/Application Support/settings-cli/config.toml`
//!
//! Every field has a serde default, so a missing file or a partial file is
//! fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use settings_core::{FileStorageOptions, FlushPolicy, OpenMode};
use thiserror::Error;

/// Error type for configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `--mount` argument was not of the form `NAME=PATH`.
    #[error("invalid mount {0:?}: expected NAME=PATH")]
    InvalidMount(String),
}

/// When mounted files are written back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// At the end of every command.
    #[default]
    OnRequest,
    /// After every modification.
    EachModify,
    /// From a background thread every `flush_interval_ms`.
    Periodic,
}

/// One settings file attached under a name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mount {
    /// Name prefix the file is attached under; empty for the root.
    #[serde(default)]
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub read_only: bool,
}

impl Mount {
    /// Parses `NAME=PATH`.  `=PATH` mounts the file as root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMount`] when there is no `=` or the path
    /// is empty.
    pub fn parse(arg: &str) -> Result<Self, ConfigError> {
        let (name, path) = arg
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidMount(arg.to_string()))?;
        let path = path.trim();
        if path.is_empty() {
            return Err(ConfigError::InvalidMount(arg.to_string()));
        }
        Ok(Self {
            name: name.trim().to_string(),
            path: PathBuf::from(path),
            read_only: false,
        })
    }
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub flush: FlushMode,
    /// Interval of [`FlushMode::Periodic`].
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default)]
    pub mounts: Vec<Mount>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            flush: FlushMode::default(),
            flush_interval_ms: default_flush_interval_ms(),
            mounts: Vec::new(),
        }
    }
}

impl CliConfig {
    /// Storage options for `mount`.
    pub fn storage_options(&self, mount: &Mount) -> FileStorageOptions {
        let flush_policy = match self.flush {
            FlushMode::OnRequest => FlushPolicy::OnRequest,
            FlushMode::EachModify => FlushPolicy::EachModify,
            FlushMode::Periodic => FlushPolicy::Periodic(Duration::from_millis(self.flush_interval_ms)),
        };
        FileStorageOptions {
            mode: if mount.read_only {
                OpenMode::ReadOnly
            } else {
                OpenMode::Writable
            },
            flush_policy,
        }
    }
}

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration.
///
/// With an explicit `path` the file must exist.  Without one the default
/// location is used and a missing file yields [`CliConfig::default`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    let (path, must_exist) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match config_file_path() {
            Ok(path) => (path, false),
            Err(ConfigError::NoPlatformConfigDir) => return Ok(CliConfig::default()),
            Err(e) => return Err(e),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !must_exist => Ok(CliConfig::default()),
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("settings-cli"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("settings-cli")
        })
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("settings-cli"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        // Unsupported platforms have no default location; `--config` still works.
        None
    }
}
