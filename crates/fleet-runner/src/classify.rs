use crate::phase::{Category, Phase};

const SKIP_BODY: &str = "skipping due to auth failure";

/// What happened on the wire for one device in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionRun {
    /// `open` was refused with the phase's credentials.
    AuthRejected(String),
    /// `open` failed for any other reason.
    Unreachable(String),
    /// The session opened but the transport broke mid-interaction.
    Interrupted(String),
    /// The config batch or command ran to completion.
    Replied { failed: bool, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub(crate) phase: Phase,
    pub(crate) host: String,
    pub(crate) category: Category,
    pub(crate) status_line: String,
    pub(crate) artifact_body: String,
}

pub(crate) fn classify(phase: Phase, host: &str, run: &SessionRun) -> Outcome {
    let (category, status_line, artifact_body) = match (phase, run) {
        (_, SessionRun::Unreachable(detail)) => (
            Category::ConnectFailed,
            format!("Connection to {host} failed: {detail}"),
            detail.clone(),
        ),
        (_, SessionRun::Interrupted(detail)) => (
            Category::ConnectFailed,
            format!("Session with {host} failed: {detail}"),
            detail.clone(),
        ),
        (Phase::Deploy, SessionRun::AuthRejected(_)) => (
            Category::Skipped,
            format!(
                "Auth failure on {host}, it's possible this is already configured for AAA...skipping device"
            ),
            SKIP_BODY.to_string(),
        ),
        (Phase::Deploy, SessionRun::Replied { failed: true, text }) => (
            Category::Failed,
            format!("Config failed on {host}. Please check logs file."),
            text.clone(),
        ),
        (Phase::Deploy, SessionRun::Replied { failed: false, text }) => (
            Category::Success,
            format!("Config succeeded on {host}"),
            text.clone(),
        ),
        (Phase::Validate, SessionRun::AuthRejected(_)) => {
            let message = format!("failed logging back into {host}, auth may have failed");
            (Category::ValidateFailed, message.clone(), message)
        }
        (Phase::Validate, SessionRun::Replied { failed: true, text }) => (
            Category::ValidateFailed,
            format!("failed executing show command on {host}, auth may have failed"),
            text.clone(),
        ),
        (Phase::Validate, SessionRun::Replied { failed: false, text }) => (
            Category::ValidateSuccess,
            format!("validation succeeded on {host}"),
            text.clone(),
        ),
    };
    Outcome {
        phase,
        host: host.to_string(),
        category,
        status_line,
        artifact_body,
    }
}
