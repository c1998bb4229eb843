//! Authenticated CLI sessions against network devices.
//!
//! The fleet runner only talks to [`DeviceSession`] and [`SessionFactory`];
//! [`ssh::SshSessionFactory`] is the production implementation that drives
//! the system `ssh` client.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

mod channel;
pub mod credentials;
pub mod device;
pub mod platform;
pub mod reply;
pub mod ssh;

pub use credentials::Credentials;
pub use device::{ConnectionProfile, DeviceDescriptor};
pub use platform::Platform;
pub use reply::{BatchReply, Reply};

/// Why `open` did not produce a usable session.
#[derive(Debug)]
pub enum OpenError {
    /// The device refused the offered credentials.
    Auth(String),
    /// Anything else: unreachable host, transport error, missing prompt.
    Connect(anyhow::Error),
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::Auth(detail) if detail.is_empty() => write!(f, "authentication failed"),
            OpenError::Auth(detail) => write!(f, "authentication failed: {detail}"),
            OpenError::Connect(err) => write!(f, "connection failed: {err:#}"),
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenError::Auth(_) => None,
            OpenError::Connect(err) => Some(err.as_ref()),
        }
    }
}

/// One connection to one device. `close` is only valid after `open` succeeded.
#[async_trait]
pub trait DeviceSession: Send {
    fn host(&self) -> &str;

    async fn open(&mut self) -> Result<(), OpenError>;

    /// Applies `lines` in config mode, stopping after the first failing line.
    async fn send_config_batch(&mut self, lines: &[String]) -> anyhow::Result<BatchReply>;

    async fn send_command(&mut self, command: &str) -> anyhow::Result<Reply>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

pub trait SessionFactory: Send + Sync {
    fn build(
        &self,
        device: &DeviceDescriptor,
        credentials: Arc<Credentials>,
    ) -> Box<dyn DeviceSession>;
}
