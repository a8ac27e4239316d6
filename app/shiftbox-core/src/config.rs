//! Configuration management.
//!
//! Shiftbox configuration is loaded from multiple sources with the following
//! priority:
//!
//! 1. Environment variables (SHIFTBOX_*)
//! 2. User configuration file (~/.config/shiftbox/config.toml)
//! 3. System configuration file (/etc/shiftbox/config.toml)
//! 4. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! # shiftbox configuration file
//! data_dir = "~/.shiftbox"
//!
//! [machine]
//! name = "shiftbox"
//! cpus = 4
//! memory_mib = 10752
//! disk_size_gib = 31
//! preset = "openshift"
//!
//! [api]
//! socket_path = "~/.shiftbox/api.sock"
//!
//! [logging]
//! level = "info"
//! ```

use crate::machine::Preset;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shiftbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Default machine configuration.
    pub machine: MachineDefaults,
    /// Daemon API configuration.
    pub api: ApiConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            machine: MachineDefaults::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from files and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(system_config_path()))
            .merge(Toml::file(user_config_path()))
            .merge(Env::prefixed(shiftbox_constants::ENV_PREFIX).split("_"))
            .extract()
    }

    /// Loads configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(shiftbox_constants::ENV_PREFIX).split("_"))
            .extract()
    }

    /// Returns the path to the machines directory.
    #[must_use]
    pub fn machines_dir(&self) -> PathBuf {
        self.data_dir.join("machines")
    }

    /// Returns the path to the bundles directory.
    #[must_use]
    pub fn bundles_dir(&self) -> PathBuf {
        self.data_dir.join("bundles")
    }

    /// Returns the path of the daemon API unix socket.
    #[must_use]
    pub fn api_socket_path(&self) -> PathBuf {
        self.api
            .socket_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(shiftbox_constants::API_SOCKET_NAME))
    }

    /// Returns the path of the daemon PID file.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join(shiftbox_constants::DAEMON_PID_NAME)
    }
}

/// Default machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineDefaults {
    /// Machine name.
    pub name: String,
    /// Number of vCPUs.
    pub cpus: u32,
    /// Memory in MiB.
    pub memory_mib: u64,
    /// Disk size in GiB.
    pub disk_size_gib: u64,
    /// Cluster preset shipped in the bundle.
    pub preset: Preset,
    /// Path to the cluster bundle disk image.
    pub bundle_path: Option<PathBuf>,
    /// Nameserver pushed into the VM (host resolver when unset).
    pub nameserver: Option<String>,
}

impl Default for MachineDefaults {
    fn default() -> Self {
        Self {
            name: shiftbox_constants::DEFAULT_MACHINE_NAME.to_string(),
            cpus: 4,
            memory_mib: 10752,
            disk_size_gib: 31,
            preset: Preset::OpenShift,
            bundle_path: None,
            nameserver: None,
        }
    }
}

/// Daemon API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Unix socket path for the daemon API (data_dir/api.sock when unset).
    pub socket_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (text, json).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join(".shiftbox")
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("shiftbox")
        .join("config.toml")
}

fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/shiftbox/config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.machine.cpus, 4);
        assert_eq!(config.machine.memory_mib, 10752);
        assert_eq!(config.machine.disk_size_gib, 31);
        assert_eq!(config.machine.preset, Preset::OpenShift);
        assert_eq!(
            config.machine.name,
            shiftbox_constants::DEFAULT_MACHINE_NAME
        );
    }

    #[test]
    fn test_config_paths() {
        let config = Config::default();
        assert!(config.machines_dir().ends_with("machines"));
        assert!(config.bundles_dir().ends_with("bundles"));
        assert!(config.api_socket_path().ends_with("api.sock"));
        assert!(config.pid_file().ends_with("daemon.pid"));
    }

    #[test]
    fn test_load_from_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "data_dir = \"/tmp/shiftbox-test\"\n\n[machine]\ncpus = 8\npreset = \"microshift\""
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/shiftbox-test"));
        assert_eq!(config.machine.cpus, 8);
        assert_eq!(config.machine.preset, Preset::MicroShift);
        // Untouched keys keep their defaults.
        assert_eq!(config.machine.memory_mib, 10752);
    }

    #[test]
    fn test_explicit_socket_path_wins() {
        let config = Config {
            api: ApiConfig {
                socket_path: Some(PathBuf::from("/run/shiftbox.sock")),
            },
            ..Default::default()
        };
        assert_eq!(
            config.api_socket_path(),
            PathBuf::from("/run/shiftbox.sock")
        );
    }
}
