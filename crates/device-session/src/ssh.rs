use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use system_utils::process::terminate_child;
use system_utils::ssh::{apply_askpass_env, auth_rejected};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelError};
use crate::platform::{clean_output, PromptLevel};
use crate::{
    BatchReply, Credentials, DeviceDescriptor, DeviceSession, OpenError, Reply, SessionFactory,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

pub struct SshSessionFactory {
    options: SessionOptions,
}

impl SshSessionFactory {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }
}

impl SessionFactory for SshSessionFactory {
    fn build(
        &self,
        device: &DeviceDescriptor,
        credentials: Arc<Credentials>,
    ) -> Box<dyn DeviceSession> {
        Box::new(SshCliSession::new(
            device.clone(),
            credentials,
            self.options.clone(),
        ))
    }
}

type ChildChannel = Channel<ChildStdout, ChildStdin>;

/// Interactive CLI session over a `ssh -tt` child process.
pub struct SshCliSession {
    device: DeviceDescriptor,
    credentials: Arc<Credentials>,
    options: SessionOptions,
    child: Option<Child>,
    channel: Option<ChildChannel>,
    stderr: Option<JoinHandle<String>>,
}

impl SshCliSession {
    pub fn new(
        device: DeviceDescriptor,
        credentials: Arc<Credentials>,
        options: SessionOptions,
    ) -> Self {
        Self {
            device,
            credentials,
            options,
            child: None,
            channel: None,
            stderr: None,
        }
    }

    fn build_command(&self) -> anyhow::Result<Command> {
        let mut cmd = Command::new("ssh");
        apply_askpass_env(&mut cmd, self.credentials.password())?;
        cmd.args(ssh_args(
            &self.device,
            &self.credentials.username,
            self.options.connect_timeout,
        ));
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    fn channel(&mut self) -> anyhow::Result<&mut ChildChannel> {
        self.channel
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("session to {} is not open", self.device.host))
    }

    async fn exchange(&mut self, command: &str) -> anyhow::Result<Reply> {
        let platform = self.device.profile.platform;
        let limit = self.options.command_timeout;
        let host = self.device.host.clone();
        let channel = self.channel()?;
        channel
            .send_line(command)
            .await
            .with_context(|| format!("failed to send `{command}` to {host}"))?;
        let capture = channel
            .read_until(&[platform.prompt_pattern()], limit)
            .await
            .with_context(|| format!("no prompt from {host} after `{command}`"))?;
        let result = clean_output(&capture.text, command);
        let failed = platform.is_failure(&result);
        debug!(host = %host, command = %command, failed, "command finished");
        Ok(Reply::new(command, result, failed))
    }

    async fn escalate(&mut self, prompt: &str) -> anyhow::Result<()> {
        let platform = self.device.profile.platform;
        if platform.prompt_level(prompt) != PromptLevel::Exec {
            return Ok(());
        }
        let limit = self.options.command_timeout;
        let secondary = self.credentials.secondary().unwrap_or_default().to_string();
        let channel = self.channel()?;
        channel.send_line(platform.escalate_command()).await?;
        let mut capture = channel
            .read_until(
                &[platform.prompt_pattern(), platform.password_pattern()],
                limit,
            )
            .await?;
        if capture.pattern == 1 {
            channel.send_line(&secondary).await?;
            capture = channel
                .read_until(
                    &[platform.prompt_pattern(), platform.password_pattern()],
                    limit,
                )
                .await?;
        }
        if capture.pattern != 0 || platform.prompt_level(&capture.tail) == PromptLevel::Exec {
            anyhow::bail!("enable secret rejected, still at `{}`", capture.tail);
        }
        Ok(())
    }

    async fn prepare(&mut self, prompt: &str) -> anyhow::Result<()> {
        self.escalate(prompt)
            .await
            .with_context(|| format!("failed to acquire privileged exec on {}", self.device.host))?;
        for command in self.device.profile.platform.on_open_commands() {
            self.exchange(command).await?;
        }
        Ok(())
    }

    /// Tears down a child that never reached a prompt and returns its stderr.
    async fn abandon(mut child: Child, stderr: JoinHandle<String>) -> String {
        terminate_child(&mut child, CLOSE_GRACE).await;
        stderr.await.unwrap_or_default().trim().to_string()
    }

    async fn shutdown(&mut self) {
        self.channel = None;
        if let Some(mut child) = self.child.take() {
            terminate_child(&mut child, CLOSE_GRACE).await;
        }
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
    }
}

#[async_trait]
impl DeviceSession for SshCliSession {
    fn host(&self) -> &str {
        &self.device.host
    }

    async fn open(&mut self) -> Result<(), OpenError> {
        let mut cmd = self.build_command().map_err(OpenError::Connect)?;
        let mut child = cmd
            .spawn()
            .map_err(|err| OpenError::Connect(anyhow::anyhow!("failed to spawn ssh: {err}")))?;
        let (Some(stdin), Some(stdout), Some(stderr_pipe)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill().await;
            return Err(OpenError::Connect(anyhow::anyhow!(
                "ssh child is missing stdio pipes"
            )));
        };
        let stderr = tokio::spawn(async move {
            let mut pipe = stderr_pipe;
            let mut raw = Vec::new();
            let _ = pipe.read_to_end(&mut raw).await;
            String::from_utf8_lossy(&raw).to_string()
        });
        let mut channel = Channel::new(stdout, stdin);
        let platform = self.device.profile.platform;
        let first = channel
            .read_until(&[platform.prompt_pattern()], self.options.connect_timeout)
            .await;
        let capture = match first {
            Ok(capture) => capture,
            Err(err) => {
                drop(channel);
                let partial = match &err {
                    ChannelError::Timeout { partial } | ChannelError::Closed { partial } => {
                        partial.trim().to_string()
                    }
                    ChannelError::Io(_) => String::new(),
                };
                let stderr = Self::abandon(child, stderr).await;
                let detail = [stderr.as_str(), partial.as_str()]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .copied()
                    .collect::<Vec<_>>()
                    .join("\n");
                if auth_rejected(&detail) {
                    info!(host = %self.device.host, event = "ssh.auth.rejected", "authentication rejected");
                    return Err(OpenError::Auth(detail));
                }
                return Err(OpenError::Connect(anyhow::anyhow!(
                    "{err}{}",
                    if detail.is_empty() {
                        String::new()
                    } else {
                        format!(": {detail}")
                    }
                )));
            }
        };
        self.child = Some(child);
        self.channel = Some(channel);
        self.stderr = Some(stderr);
        if let Err(err) = self.prepare(&capture.tail).await {
            self.shutdown().await;
            return Err(OpenError::Connect(err));
        }
        info!(host = %self.device.host, prompt = %capture.tail, "session open");
        Ok(())
    }

    async fn send_config_batch(&mut self, lines: &[String]) -> anyhow::Result<BatchReply> {
        let platform = self.device.profile.platform;
        let enter = self.exchange(platform.enter_config_command()).await?;
        if enter.failed {
            return Ok(BatchReply::from_replies(vec![enter]));
        }
        let mut replies = Vec::with_capacity(lines.len());
        for line in lines {
            let reply = self.exchange(line).await?;
            let failed = reply.failed;
            replies.push(reply);
            if failed {
                warn!(host = %self.device.host, line = %line, "config line rejected, stopping batch");
                break;
            }
        }
        self.exchange(platform.exit_config_command()).await?;
        Ok(BatchReply::from_replies(replies))
    }

    async fn send_command(&mut self, command: &str) -> anyhow::Result<Reply> {
        self.exchange(command).await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let logout = self.device.profile.platform.logout_command();
        if let Some(channel) = self.channel.as_mut() {
            if let Err(err) = channel.send_line(logout).await {
                debug!(host = %self.device.host, error = %err, "logout not delivered");
            }
        }
        self.shutdown().await;
        Ok(())
    }
}

pub(crate) fn ssh_args(
    device: &DeviceDescriptor,
    username: &str,
    connect_timeout: Duration,
) -> Vec<String> {
    let mut args = vec![
        "-tt".to_string(),
        "-p".to_string(),
        device.profile.port.to_string(),
        "-l".to_string(),
        username.to_string(),
    ];
    let mut option = |value: String| {
        args.push("-o".to_string());
        args.push(value);
    };
    if device.profile.strict_host_key {
        option("StrictHostKeyChecking=yes".to_string());
    } else {
        option("StrictHostKeyChecking=no".to_string());
        option("UserKnownHostsFile=/dev/null".to_string());
    }
    option(format!("ConnectTimeout={}", connect_timeout.as_secs().max(1)));
    option("NumberOfPasswordPrompts=1".to_string());
    option("PreferredAuthentications=keyboard-interactive,password".to_string());
    args.extend(device.profile.ssh_options.iter().cloned());
    // Everything after `--` is the destination, never an option.
    args.push("--".to_string());
    args.push(device.host.clone());
    args
}
