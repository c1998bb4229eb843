use anyhow::Context;
use std::path::Path;

/// Reads the configuration lines pushed in the deploy phase.
pub(crate) fn load_script(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config script {}", path.display()))?;
    parse_script(&raw).with_context(|| format!("invalid config script {}", path.display()))
}

pub(crate) fn parse_script(raw: &str) -> anyhow::Result<Vec<String>> {
    let lines: Vec<String> = raw
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let body = line.trim_start();
            !body.is_empty() && !body.starts_with('!')
        })
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        anyhow::bail!("config script has no commands");
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_indentation_and_drops_comments() {
        let raw = "!\naaa new-model\n!\ninterface Gi1/0/1 \r\n description uplink\n\n";
        assert_eq!(
            parse_script(raw).expect("parse"),
            vec!["aaa new-model", "interface Gi1/0/1", " description uplink"]
        );
    }

    #[test]
    fn comment_only_script_is_rejected() {
        let err = parse_script("! nothing\n!\n   \n").expect_err("empty");
        assert_eq!(err.to_string(), "config script has no commands");
    }
}
