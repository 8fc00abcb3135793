//! Configuration loading and root folder resolution

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Compiled platform defaults used when no other configuration is present
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("simon"))
            .unwrap_or_else(|| PathBuf::from("./simon_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
        }
    }
}

/// Broker connection settings from the `[broker]` config section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Keepalive interval, used by the transport for liveness detection
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// First delay before a reconnect attempt after a transport error
    #[serde(default = "default_reconnect_initial_secs")]
    pub reconnect_initial_secs: u64,
    /// Ceiling for the reconnect backoff
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

fn default_broker_host() -> String {
    "127.0.0.1".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_reconnect_initial_secs() -> u64 {
    1
}

fn default_reconnect_max_secs() -> u64 {
    60
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            keepalive_secs: default_keepalive_secs(),
            reconnect_initial_secs: default_reconnect_initial_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

/// TOML configuration file schema
///
/// Every field is optional; missing fields fall back to defaults so old
/// config files keep working as new fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub broker: BrokerConfig,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `SIMON_ROOT_FOLDER`, then `SIMON_ROOT` environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Resolver that also honors an explicit command-line override
    pub fn with_cli_arg(module_name: &str, cli_arg: Option<PathBuf>) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg,
        }
    }

    /// Resolve the root folder. Never fails: the compiled default is the
    /// final fallback.
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var("SIMON_ROOT_FOLDER") {
            return PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("SIMON_ROOT") {
            return PathBuf::from(path);
        }

        if let Some(root_folder) = self.load_config().root_folder {
            return root_folder;
        }

        CompiledDefaults::for_current_platform().root_folder
    }

    /// Load this module's TOML config file.
    ///
    /// A missing or unreadable config file never terminates startup; it
    /// degrades to defaults with a warning.
    pub fn load_config(&self) -> TomlConfig {
        let Some(path) = self.config_file_path() else {
            return TomlConfig::default();
        };
        if !path.exists() {
            return TomlConfig::default();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                return TomlConfig::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring unparsable config file {}: {}",
                    path.display(),
                    e
                );
                TomlConfig::default()
            }
        }
    }

    /// Per-module config file path, e.g. `~/.config/simon/simon-sc.toml`
    fn config_file_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("simon").join(format!("{}.toml", self.module_name)))
    }
}

/// Prepares a resolved root folder for use
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and any parents) if absent. Idempotent.
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    /// Path of the append-only score log inside the root folder
    pub fn score_log_path(&self) -> PathBuf {
        self.root_folder.join("scores.jsonl")
    }

    pub fn score_log_exists(&self) -> bool {
        self.score_log_path().exists()
    }
}
