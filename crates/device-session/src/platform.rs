use std::sync::OnceLock;

use regex::Regex;

const IOSXE_FAILURE_MARKERS: &[&str] = &[
    "% Ambiguous command",
    "% Incomplete command",
    "% Invalid input detected",
    "% Unknown command",
    "% Bad mask",
    "% Error",
];

const IOSXE_ON_OPEN: &[&str] = &["terminal length 0", "terminal width 512"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    CiscoIosxe,
}

/// Privilege level implied by a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLevel {
    Exec,
    Privileged,
    Configuration,
}

impl Platform {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cisco_iosxe" | "iosxe" => Some(Platform::CiscoIosxe),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::CiscoIosxe => "cisco_iosxe",
        }
    }

    pub fn prompt_pattern(&self) -> &'static Regex {
        static PROMPT: OnceLock<Regex> = OnceLock::new();
        PROMPT.get_or_init(|| {
            Regex::new(r"^[\w.\-@/:]{1,63}(\(config[\w.\-@/:+]{0,32}\))?[>#]\s*$")
                .expect("prompt pattern compiles")
        })
    }

    pub fn password_pattern(&self) -> &'static Regex {
        static PASSWORD: OnceLock<Regex> = OnceLock::new();
        PASSWORD.get_or_init(|| {
            Regex::new(r"(?i)^.*password:\s*$")
                .expect("password pattern compiles")
        })
    }

    pub fn prompt_level(&self, prompt: &str) -> PromptLevel {
        let prompt = prompt.trim_end();
        if prompt.contains("(config") {
            PromptLevel::Configuration
        } else if prompt.ends_with('#') {
            PromptLevel::Privileged
        } else {
            PromptLevel::Exec
        }
    }

    pub fn is_failure(&self, output: &str) -> bool {
        match self {
            Platform::CiscoIosxe => IOSXE_FAILURE_MARKERS
                .iter()
                .any(|marker| output.contains(marker)),
        }
    }

    pub fn on_open_commands(&self) -> &'static [&'static str] {
        match self {
            Platform::CiscoIosxe => IOSXE_ON_OPEN,
        }
    }

    pub fn escalate_command(&self) -> &'static str {
        "enable"
    }

    pub fn enter_config_command(&self) -> &'static str {
        "configure terminal"
    }

    pub fn exit_config_command(&self) -> &'static str {
        "end"
    }

    pub fn logout_command(&self) -> &'static str {
        "exit"
    }
}

/// Drops the echoed command from the head of `raw` and trims surrounding blank lines.
pub(crate) fn clean_output(raw: &str, command: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    if let Some(first) = lines.first() {
        let command = command.trim();
        if !command.is_empty() && first.trim_end().ends_with(command) {
            lines.remove(0);
        }
    }
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
