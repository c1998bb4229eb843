use anyhow::Context;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::time::Duration;

use crate::path::home_dir;
use crate::process::run_with_timeout;

const ASKPASS_ENV: &str = "FLEETCHECK_SSH_PASS";
const ASKPASS_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$FLEETCHECK_SSH_PASS\"\n";
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

const AUTH_REJECTION_MARKERS: &[&str] = &[
    "permission denied",
    "authentication failed",
    "no supported authentication methods available",
    "too many authentication failures",
];

pub fn askpass_env(password: &str) -> anyhow::Result<Vec<(String, String)>> {
    let script = ensure_askpass_script()?;
    Ok(vec![
        (ASKPASS_ENV.to_string(), password.to_string()),
        ("SSH_ASKPASS".to_string(), script.to_string_lossy().to_string()),
        ("SSH_ASKPASS_REQUIRE".to_string(), "force".to_string()),
        ("DISPLAY".to_string(), "1".to_string()),
    ])
}

pub fn apply_askpass_env(cmd: &mut Command, password: &str) -> anyhow::Result<()> {
    for (key, value) in askpass_env(password)? {
        cmd.env(key, value);
    }
    Ok(())
}

/// Writes the askpass helper under `~/.fleetcheck` unless an identical copy exists.
pub fn ensure_askpass_script() -> anyhow::Result<PathBuf> {
    let dir = home_dir()
        .context("failed to resolve HOME for askpass")?
        .join(".fleetcheck");
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("ssh-askpass.sh");
    let up_to_date = std::fs::read(&path)
        .map(|existing| existing == ASKPASS_SCRIPT.as_bytes())
        .unwrap_or(false);
    if !up_to_date {
        std::fs::write(&path, ASKPASS_SCRIPT)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o700);
        std::fs::set_permissions(&path, perms)?;
    }
    Ok(path)
}

/// True when ssh diagnostics show the server refused the offered credentials.
pub fn auth_rejected(detail: &str) -> bool {
    let detail = detail.to_lowercase();
    AUTH_REJECTION_MARKERS
        .iter()
        .any(|marker| detail.contains(marker))
}

/// Confirms an OpenSSH client is on PATH and returns its version banner.
pub async fn client_version() -> anyhow::Result<String> {
    let mut cmd = Command::new("ssh");
    cmd.arg("-V");
    let output = run_with_timeout(&mut cmd, VERSION_TIMEOUT, "ssh -V").await?;
    // OpenSSH prints its banner on stderr.
    let banner = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
    .trim()
    .to_string();
    if !output.status.success() {
        anyhow::bail!("ssh -V failed: {banner}");
    }
    Ok(banner)
}
