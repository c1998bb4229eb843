use anyhow::Context;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Reads a newline-delimited host list.
pub(crate) fn load_inventory(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory {}", path.display()))?;
    parse_inventory(&raw).with_context(|| format!("invalid inventory {}", path.display()))
}

pub(crate) fn parse_inventory(raw: &str) -> anyhow::Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let host = line.trim();
        if host.is_empty() || host.starts_with('#') {
            continue;
        }
        if host.chars().any(char::is_whitespace) {
            anyhow::bail!("line {}: host must not contain whitespace: {host:?}", index + 1);
        }
        if host.starts_with('-') {
            anyhow::bail!("line {}: host must not start with '-': {host:?}", index + 1);
        }
        if !seen.insert(host.to_string()) {
            warn!(event = "inventory.duplicate", host, line = index + 1, "duplicate host ignored");
            continue;
        }
        hosts.push(host.to_string());
    }
    if hosts.is_empty() {
        anyhow::bail!("inventory lists no hosts");
    }
    Ok(hosts)
}
