use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use device_session::{
    BatchReply, Credentials, DeviceDescriptor, DeviceSession, OpenError, Reply, SessionFactory,
};

use crate::artifacts::StatusSink;

pub(crate) fn temp_dir(prefix: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("fleetcheck-{prefix}-{nanos}-{seq}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EventKind {
    OpenStarted,
    Opened,
    OpenFailed,
    ConfigSent,
    CommandSent(String),
    Closed,
    Status(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Event {
    pub(crate) seq: usize,
    pub(crate) host: String,
    pub(crate) user: String,
    pub(crate) kind: EventKind,
}

/// Shared recorder for session activity and status lines, in one global order.
#[derive(Default)]
pub(crate) struct Recorder {
    seq: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn push(&self, host: &str, user: &str, kind: EventKind) {
        let mut events = self.events.lock().expect("events lock");
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        events.push(Event {
            seq,
            host: host.to_string(),
            user: user.to_string(),
            kind,
        });
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    pub(crate) fn events_for(&self, host: &str) -> Vec<EventKind> {
        self.events()
            .into_iter()
            .filter(|event| event.host == host)
            .map(|event| event.kind)
            .collect()
    }

    pub(crate) fn status_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event.kind {
                EventKind::Status(line) => Some(line),
                _ => None,
            })
            .collect()
    }
}

impl StatusSink for Recorder {
    fn emit(&self, line: &str) {
        self.push("", "", EventKind::Status(line.to_string()));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum MockOpen {
    #[default]
    Accept,
    RejectAuth,
    Unreachable,
}

/// Scripted behaviour of one (host, username) pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct Behavior {
    pub(crate) open: MockOpen,
    pub(crate) latency: Duration,
    pub(crate) reply_failed: bool,
    pub(crate) output: Option<String>,
    pub(crate) broken: bool,
    pub(crate) panic: bool,
}

impl Behavior {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn opening(open: MockOpen) -> Self {
        Self {
            open,
            ..Self::default()
        }
    }
}

pub(crate) struct MockFactory {
    recorder: Arc<Recorder>,
    fallback: Behavior,
    scripted: HashMap<(String, String), Behavior>,
}

impl MockFactory {
    pub(crate) fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            fallback: Behavior::default(),
            scripted: HashMap::new(),
        }
    }

    pub(crate) fn fallback(mut self, behavior: Behavior) -> Self {
        self.fallback = behavior;
        self
    }

    pub(crate) fn script(mut self, host: &str, user: &str, behavior: Behavior) -> Self {
        self.scripted
            .insert((host.to_string(), user.to_string()), behavior);
        self
    }
}

impl SessionFactory for MockFactory {
    fn build(
        &self,
        device: &DeviceDescriptor,
        credentials: Arc<Credentials>,
    ) -> Box<dyn DeviceSession> {
        let key = (device.host.clone(), credentials.username.clone());
        let behavior = self
            .scripted
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        Box::new(MockSession {
            host: device.host.clone(),
            user: credentials.username.clone(),
            behavior,
            recorder: Arc::clone(&self.recorder),
        })
    }
}

struct MockSession {
    host: String,
    user: String,
    behavior: Behavior,
    recorder: Arc<Recorder>,
}

impl MockSession {
    fn output(&self) -> String {
        self.behavior
            .output
            .clone()
            .unwrap_or_else(|| format!("output from {}", self.host))
    }

    async fn interact(&self, kind: EventKind) -> anyhow::Result<()> {
        self.recorder.push(&self.host, &self.user, kind);
        tokio::time::sleep(self.behavior.latency).await;
        if self.behavior.panic {
            panic!("scripted panic on {}", self.host);
        }
        if self.behavior.broken {
            anyhow::bail!("channel closed by {}", self.host);
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn open(&mut self) -> Result<(), OpenError> {
        self.recorder.enter();
        self.recorder.push(&self.host, &self.user, EventKind::OpenStarted);
        tokio::task::yield_now().await;
        let result = match self.behavior.open {
            MockOpen::Accept => Ok(()),
            MockOpen::RejectAuth => Err(OpenError::Auth("Permission denied".to_string())),
            MockOpen::Unreachable => Err(OpenError::Connect(anyhow::anyhow!(
                "ssh: connect to host {} port 22: Connection refused",
                self.host
            ))),
        };
        if result.is_ok() {
            self.recorder.push(&self.host, &self.user, EventKind::Opened);
        } else {
            self.recorder.push(&self.host, &self.user, EventKind::OpenFailed);
            self.recorder.leave();
        }
        result
    }

    async fn send_config_batch(&mut self, lines: &[String]) -> anyhow::Result<BatchReply> {
        self.interact(EventKind::ConfigSent).await?;
        let mut replies: Vec<Reply> = lines
            .iter()
            .map(|line| Reply::new(line.clone(), "", false))
            .collect();
        match replies.last_mut() {
            Some(last) => {
                last.result = self.output();
                last.failed = self.behavior.reply_failed;
            }
            None => replies.push(Reply::new("", self.output(), self.behavior.reply_failed)),
        }
        Ok(BatchReply::from_replies(replies))
    }

    async fn send_command(&mut self, command: &str) -> anyhow::Result<Reply> {
        self.interact(EventKind::CommandSent(command.to_string()))
            .await?;
        Ok(Reply::new(command, self.output(), self.behavior.reply_failed))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.recorder.push(&self.host, &self.user, EventKind::Closed);
        self.recorder.leave();
        Ok(())
    }
}
