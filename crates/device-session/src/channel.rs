use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_CHUNK: usize = 4096;

/// Text read up to a matching line.
#[derive(Debug)]
pub(crate) struct Capture {
    /// Everything before the matching line.
    pub(crate) text: String,
    /// The matching line itself, e.g. the prompt.
    pub(crate) tail: String,
    /// Index into the pattern slice that matched.
    pub(crate) pattern: usize,
}

#[derive(Debug)]
pub(crate) enum ChannelError {
    Timeout { partial: String },
    Closed { partial: String },
    Io(std::io::Error),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Timeout { .. } => write!(f, "timed out waiting for device prompt"),
            ChannelError::Closed { .. } => write!(f, "channel closed before device prompt"),
            ChannelError::Io(err) => write!(f, "channel i/o failed: {err}"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Line-oriented view over an interactive CLI stream.
pub(crate) struct Channel<R, W> {
    reader: R,
    writer: W,
    buffer: String,
    /// Raw bytes held back until a split UTF-8 char or escape sequence completes.
    pending: Vec<u8>,
}

impl<R, W> Channel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buffer: String::new(),
            pending: Vec::new(),
        }
    }

    pub(crate) async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Reads until the last line of output matches one of `patterns`.
    pub(crate) async fn read_until(
        &mut self,
        patterns: &[&Regex],
        limit: Duration,
    ) -> Result<Capture, ChannelError> {
        let result = tokio::time::timeout(limit, self.fill_until(patterns)).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                self.flush_pending();
                Err(ChannelError::Timeout {
                    partial: std::mem::take(&mut self.buffer),
                })
            }
        }
    }

    async fn fill_until(&mut self, patterns: &[&Regex]) -> Result<Capture, ChannelError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(capture) = self.take_match(patterns) {
                return Ok(capture);
            }
            let n = self
                .reader
                .read(&mut chunk)
                .await
                .map_err(ChannelError::Io)?;
            if n == 0 {
                self.flush_pending();
                return Err(ChannelError::Closed {
                    partial: std::mem::take(&mut self.buffer),
                });
            }
            self.pending.extend_from_slice(&chunk[..n]);
            let ready = ready_len(&self.pending);
            let text: Vec<u8> = self.pending.drain(..ready).collect();
            self.buffer
                .push_str(&normalize(&String::from_utf8_lossy(&text)));
        }
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        self.buffer
            .push_str(&normalize(&String::from_utf8_lossy(&text)));
    }

    fn take_match(&mut self, patterns: &[&Regex]) -> Option<Capture> {
        let trimmed = self.buffer.trim_end_matches([' ', '\t']);
        let (head, last) = match trimmed.rfind('\n') {
            Some(index) => (&trimmed[..index + 1], &trimmed[index + 1..]),
            None => ("", trimmed),
        };
        if last.is_empty() {
            return None;
        }
        let pattern = patterns.iter().position(|pattern| pattern.is_match(last))?;
        let capture = Capture {
            text: head.to_string(),
            tail: last.to_string(),
            pattern,
        };
        self.buffer.clear();
        Some(capture)
    }
}

/// Length of the prefix of `raw` that can be decoded now. A trailing
/// incomplete UTF-8 char or unfinished escape sequence waits for more input.
fn ready_len(raw: &[u8]) -> usize {
    static PARTIAL: OnceLock<Regex> = OnceLock::new();
    let partial = PARTIAL.get_or_init(|| {
        Regex::new(r"^\x1b(\[[0-9;?]*|[()])?$").expect("partial escape pattern compiles")
    });
    let mut end = raw.len();
    if let Err(err) = std::str::from_utf8(raw) {
        if err.error_len().is_none() {
            end = err.valid_up_to();
        }
    }
    if let Some(start) = raw[..end].iter().rposition(|byte| *byte == 0x1b) {
        if partial.is_match(&String::from_utf8_lossy(&raw[start..end])) {
            end = start;
        }
    }
    end
}

/// Strips carriage returns, backspaces, and ANSI escape sequences.
fn normalize(raw: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let ansi = ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b[()][A-Za-z0-9]").expect("ansi pattern compiles")
    });
    ansi.replace_all(raw, "")
        .chars()
        .filter(|ch| *ch != '\r' && *ch != '\u{8}')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use tokio::io::{duplex, split, AsyncWriteExt};

    #[tokio::test]
    async fn reads_until_prompt_and_splits_tail() {
        let (client, mut device) = duplex(1024);
        let (reader, writer) = split(client);
        let mut channel = Channel::new(reader, writer);
        device
            .write_all(b"show clock\r\n*10:01:02.123 UTC Sat Oct 17 2026\r\nsw1#")
            .await
            .expect("write");
        let prompt = Platform::CiscoIosxe.prompt_pattern();
        let capture = channel
            .read_until(&[prompt], Duration::from_secs(1))
            .await
            .expect("capture");
        assert_eq!(capture.tail, "sw1#");
        assert_eq!(capture.pattern, 0);
        assert_eq!(capture.text, "show clock\n*10:01:02.123 UTC Sat Oct 17 2026\n");
    }

    #[tokio::test]
    async fn reports_which_pattern_matched() {
        let (client, mut device) = duplex(1024);
        let (reader, writer) = split(client);
        let mut channel = Channel::new(reader, writer);
        device.write_all(b"enable\r\nPassword: ").await.expect("write");
        let platform = Platform::CiscoIosxe;
        let capture = channel
            .read_until(
                &[platform.prompt_pattern(), platform.password_pattern()],
                Duration::from_secs(1),
            )
            .await
            .expect("capture");
        assert_eq!(capture.pattern, 1);
    }

    #[tokio::test]
    async fn closed_stream_returns_partial_output() {
        let (client, mut device) = duplex(1024);
        let (reader, writer) = split(client);
        let mut channel = Channel::new(reader, writer);
        device.write_all(b"Connection closed by remote host\n").await.expect("write");
        drop(device);
        let err = channel
            .read_until(&[Platform::CiscoIosxe.prompt_pattern()], Duration::from_secs(1))
            .await
            .expect_err("closed");
        match err {
            ChannelError::Closed { partial } => assert!(partial.contains("Connection closed")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let (client, _device) = duplex(1024);
        let (reader, writer) = split(client);
        let mut channel = Channel::new(reader, writer);
        let err = channel
            .read_until(&[Platform::CiscoIosxe.prompt_pattern()], Duration::from_millis(50))
            .await
            .expect_err("timeout");
        assert!(matches!(err, ChannelError::Timeout { .. }));
    }

    #[tokio::test]
    async fn escape_split_across_reads_is_still_stripped() {
        let (client, mut device) = duplex(1024);
        let (reader, writer) = split(client);
        let mut channel = Channel::new(reader, writer);
        device.write_all(b"show clock\r\n\x1b[2").await.expect("write head");
        let prompt = Platform::CiscoIosxe.prompt_pattern();
        let prompts = [prompt];
        let (capture, _) = tokio::join!(
            channel.read_until(&prompts, Duration::from_secs(1)),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                device.write_all(b"Ksw1#").await.expect("write tail");
            }
        );
        let capture = capture.expect("capture");
        assert_eq!(capture.tail, "sw1#");
        assert_eq!(capture.text, "show clock\n");
    }

    #[test]
    fn unfinished_sequences_are_held_back() {
        assert_eq!(ready_len(b"sw1#"), 4);
        assert_eq!(ready_len(b"abc\x1b"), 3);
        assert_eq!(ready_len(b"abc\x1b[2;3"), 3);
        assert_eq!(ready_len(b"abc\x1b[2K"), 7);
        assert_eq!(ready_len(b"abc\x1b("), 3);
        // First two bytes of a three-byte char.
        assert_eq!(ready_len(&[b'a', 0xe2, 0x82]), 1);
    }

    #[test]
    fn normalize_strips_terminal_noise() {
        assert_eq!(normalize("\x1b[2Ksw1#\r\n"), "sw1#\n");
        assert_eq!(normalize("abc\u{8}d"), "abcd");
    }
}
