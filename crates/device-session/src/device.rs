use crate::platform::Platform;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_SSH_OPTIONS: &[&str] = &["-o", "KexAlgorithms=+diffie-hellman-group14-sha1"];

/// Connection parameters shared by every device in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub port: u16,
    pub platform: Platform,
    pub strict_host_key: bool,
    /// Extra arguments handed to the ssh client before the host.
    pub ssh_options: Vec<String>,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            platform: Platform::CiscoIosxe,
            strict_host_key: false,
            ssh_options: DEFAULT_SSH_OPTIONS
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub host: String,
    pub profile: ConnectionProfile,
}

impl DeviceDescriptor {
    pub fn new(host: impl Into<String>, profile: ConnectionProfile) -> Self {
        Self {
            host: host.into(),
            profile,
        }
    }
}
