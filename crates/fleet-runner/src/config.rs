use anyhow::Context;
use device_session::device::{DEFAULT_PORT, DEFAULT_SSH_OPTIONS};
use device_session::ssh::SessionOptions;
use device_session::{ConnectionProfile, Platform};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;

const DEFAULT_MAX_CONNECTIONS: usize = 10;
const DEFAULT_LOGS_DIR: &str = "logs";
const DEFAULT_VALIDATE_COMMAND: &str = "show version";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Settings {
    #[serde(default = "default_max_connections")]
    pub(crate) max_connections: usize,
    #[serde(default = "default_logs_dir")]
    pub(crate) logs_dir: PathBuf,
    #[serde(default = "default_validate_command")]
    pub(crate) validate_command: String,
    #[serde(default)]
    pub(crate) device: DeviceSettings,
    #[serde(default)]
    pub(crate) timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DeviceSettings {
    #[serde(default = "default_platform")]
    pub(crate) platform: String,
    #[serde(default = "default_port")]
    pub(crate) port: u16,
    #[serde(default)]
    pub(crate) strict_host_key: bool,
    #[serde(default = "default_ssh_options")]
    pub(crate) ssh_options: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TimeoutSettings {
    #[serde(default = "default_connect_secs")]
    pub(crate) connect_secs: u64,
    #[serde(default = "default_command_secs")]
    pub(crate) command_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            logs_dir: default_logs_dir(),
            validate_command: default_validate_command(),
            device: DeviceSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            port: default_port(),
            strict_host_key: false,
            ssh_options: default_ssh_options(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            command_secs: default_command_secs(),
        }
    }
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOGS_DIR)
}

fn default_validate_command() -> String {
    DEFAULT_VALIDATE_COMMAND.to_string()
}

fn default_platform() -> String {
    Platform::CiscoIosxe.name().to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ssh_options() -> String {
    shell_words::join(DEFAULT_SSH_OPTIONS)
}

fn default_connect_secs() -> u64 {
    15
}

fn default_command_secs() -> u64 {
    60
}

/// Settings after validation, in the shapes the session layer takes.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub(crate) max_connections: usize,
    pub(crate) logs_dir: PathBuf,
    pub(crate) validate_command: String,
    pub(crate) profile: ConnectionProfile,
    pub(crate) session: SessionOptions,
}

impl Settings {
    /// Loads `path` when given, otherwise the built-in defaults.
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse settings {}", path.display()))
    }

    /// Lets command-line flags win over the file.
    pub(crate) fn apply_args(&mut self, args: &Args) {
        if let Some(max_connections) = args.max_connections {
            self.max_connections = max_connections;
        }
        if let Some(logs_dir) = &args.logs_dir {
            self.logs_dir = logs_dir.clone();
        }
    }

    pub(crate) fn resolve(self) -> anyhow::Result<Resolved> {
        if self.max_connections == 0 {
            anyhow::bail!("max_connections must be at least 1");
        }
        let validate_command = self.validate_command.trim().to_string();
        if validate_command.is_empty() {
            anyhow::bail!("validate_command must not be empty");
        }
        if self.device.port == 0 {
            anyhow::bail!("device.port must be non-zero");
        }
        let platform = Platform::parse(self.device.platform.trim())
            .ok_or_else(|| anyhow::anyhow!("unsupported platform {:?}", self.device.platform))?;
        let ssh_options = shell_words::split(&self.device.ssh_options)
            .with_context(|| format!("invalid device.ssh_options {:?}", self.device.ssh_options))?;
        if self.timeouts.connect_secs == 0 || self.timeouts.command_secs == 0 {
            anyhow::bail!("timeouts must be non-zero");
        }

        Ok(Resolved {
            max_connections: self.max_connections,
            logs_dir: system_utils::path::expand_tilde(&self.logs_dir),
            validate_command,
            profile: ConnectionProfile {
                port: self.device.port,
                platform,
                strict_host_key: self.device.strict_host_key,
                ssh_options,
            },
            session: SessionOptions {
                connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
                command_timeout: Duration::from_secs(self.timeouts.command_secs),
            },
        })
    }
}
