use anyhow::Context;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classify::Outcome;
use crate::phase::{Category, Phase};

/// Operator-facing output, kept apart from tracing logs.
pub(crate) trait StatusSink: Send + Sync {
    fn emit(&self, line: &str);
}

pub(crate) struct StdoutSink;

impl StatusSink for StdoutSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

/// Persists one artifact per (phase, host) under `<root>/<phase>/<CATEGORY>/<host>`.
pub(crate) struct ArtifactWriter {
    root: PathBuf,
    sink: Arc<dyn StatusSink>,
}

impl ArtifactWriter {
    pub(crate) fn new(root: PathBuf, sink: Arc<dyn StatusSink>) -> Self {
        Self { root, sink }
    }

    pub(crate) fn artifact_path(&self, phase: Phase, category: Category, host: &str) -> PathBuf {
        self.root
            .join(phase.as_str())
            .join(category.as_str())
            .join(artifact_file_name(host))
    }

    pub(crate) async fn write(&self, outcome: &Outcome) -> anyhow::Result<PathBuf> {
        self.sink.emit(&outcome.status_line);
        let path = self.artifact_path(outcome.phase, outcome.category, &outcome.host);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, outcome.artifact_body.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        for other in outcome.phase.categories() {
            if *other == outcome.category {
                continue;
            }
            let stale = self.artifact_path(outcome.phase, *other, &outcome.host);
            remove_stale(&stale).await?;
        }
        tracing::debug!(
            host = %outcome.host,
            phase = %outcome.phase,
            category = %outcome.category,
            path = %path.display(),
            "artifact written"
        );
        Ok(path)
    }
}

async fn remove_stale(path: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed stale artifact");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Maps a host identifier onto a single path component, one-to-one.
///
/// Bytes outside `[A-Za-z0-9._:-]` become `%XX`, so distinct hosts never
/// share an artifact. Dot-only names are escaped entirely to stay clear of
/// `.` and `..`.
pub(crate) fn artifact_file_name(host: &str) -> String {
    if host.is_empty() {
        return "%".to_string();
    }
    let dots_only = host.bytes().all(|byte| byte == b'.');
    let mut name = String::with_capacity(host.len());
    for byte in host.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b':')
            || (byte == b'.' && !dots_only);
        if keep {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name
}
