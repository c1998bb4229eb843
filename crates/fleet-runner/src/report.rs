use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::phase::{Category, Phase};

const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct DeviceResult {
    pub(crate) host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) category: Option<Category>,
    /// Set when the device task died before recording an outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) fault: Option<String>,
}

impl DeviceResult {
    pub(crate) fn is_clean(&self) -> bool {
        self.category.is_some_and(|category| category.is_clean())
    }

    fn label(&self) -> &'static str {
        self.category.map(|category| category.as_str()).unwrap_or("FAULT")
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PhaseReport {
    pub(crate) phase: Phase,
    pub(crate) devices: Vec<DeviceResult>,
}

impl PhaseReport {
    pub(crate) fn new(phase: Phase) -> Self {
        Self {
            phase,
            devices: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, host: String, category: Category) {
        self.devices.push(DeviceResult {
            host,
            category: Some(category),
            fault: None,
        });
    }

    pub(crate) fn record_fault(&mut self, host: String, fault: String) {
        self.devices.push(DeviceResult {
            host,
            category: None,
            fault: Some(fault),
        });
    }

    pub(crate) fn result_for(&self, host: &str) -> Option<&DeviceResult> {
        self.devices.iter().find(|device| device.host == host)
    }

    /// Counts per category label, faults included as `FAULT`.
    pub(crate) fn tally(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for device in &self.devices {
            *counts.entry(device.label()).or_insert(0) += 1;
        }
        counts
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.devices.iter().all(DeviceResult::is_clean)
    }

    fn summary_line(&self) -> String {
        let tally = self.tally();
        if tally.is_empty() {
            return format!("{}: no devices", self.phase);
        }
        let parts = tally
            .iter()
            .map(|(label, count)| format!("{count} {label}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: {parts}", self.phase)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RunReport {
    pub(crate) run_id: String,
    pub(crate) started_at: String,
    pub(crate) finished_at: String,
    pub(crate) deploy: PhaseReport,
    pub(crate) validate: PhaseReport,
}

impl RunReport {
    pub(crate) fn new(
        run_id: String,
        started: SystemTime,
        deploy: PhaseReport,
        validate: PhaseReport,
    ) -> Self {
        Self {
            run_id,
            started_at: humantime::format_rfc3339_seconds(started).to_string(),
            finished_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            deploy,
            validate,
        }
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.deploy.is_clean() && self.validate.is_clean()
    }

    /// Operator summary: per-phase tallies, then every device that needs a look.
    pub(crate) fn render(&self) -> Vec<String> {
        let mut lines = vec![self.deploy.summary_line(), self.validate.summary_line()];
        let attention: Vec<String> = [&self.deploy, &self.validate]
            .iter()
            .flat_map(|report| {
                report
                    .devices
                    .iter()
                    .filter(|device| !device.is_clean())
                    .map(move |device| {
                        let line = format!("  {} {} {}", report.phase, device.label(), device.host);
                        match device.fault.as_deref() {
                            Some(fault) => format!("{line}: {fault}"),
                            None => line,
                        }
                    })
            })
            .collect();
        if attention.is_empty() {
            lines.push("all devices deployed and validated".to_string());
        } else {
            lines.push("devices needing attention:".to_string());
            lines.extend(attention);
        }
        lines
    }

    pub(crate) async fn persist(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(SUMMARY_FILE);
        let payload = serde_json::to_vec_pretty(self).context("failed to encode run summary")?;
        tokio::fs::write(&path, payload)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
