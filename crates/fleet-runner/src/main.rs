mod artifacts;
mod classify;
mod cli;
mod config;
mod credentials;
mod dispatch;
mod inventory;
mod logging;
mod orchestrator;
mod phase;
mod report;
mod script;
#[cfg(test)]
mod test_utils;

use crate::artifacts::{StatusSink, StdoutSink};
use crate::cli::Args;
use crate::config::Settings;
use crate::credentials::prompt_credentials;
use crate::inventory::load_inventory;
use crate::logging::{init_tracing, run_span};
use crate::orchestrator::{Orchestrator, RunPlan};
use crate::script::load_script;
use anyhow::Context;
use clap::Parser;
use device_session::ssh::SshSessionFactory;
use device_session::{DeviceDescriptor, SessionFactory};
use dialoguer::Input;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut settings = Settings::load(args.settings.as_deref())?;
    settings.apply_args(&args);
    let resolved = settings.resolve().context("invalid settings")?;

    let _file_guard = init_tracing(&resolved.logs_dir, args.log_to_stderr)?;

    let banner = system_utils::ssh::client_version()
        .await
        .context("an OpenSSH client is required on PATH")?;
    info!(event = "ssh.client", version = %banner, "ssh client found");

    let inventory_path = path_or_prompt(args.inventory, "Inventory file")?;
    let script_path = path_or_prompt(args.script, "Config script file")?;
    let hosts = load_inventory(&inventory_path)?;
    let config_lines = load_script(&script_path)?;
    let credentials = prompt_credentials()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    info!(
        event = "run.plan",
        run_id = %run_id,
        inventory = %inventory_path.display(),
        script = %script_path.display(),
        hosts = hosts.len(),
        config_lines = config_lines.len(),
        "run planned"
    );
    let plan = RunPlan {
        run_id,
        devices: hosts
            .into_iter()
            .map(|host| DeviceDescriptor::new(host, resolved.profile.clone()))
            .collect(),
        config_lines,
        validate_command: resolved.validate_command.clone(),
        credentials,
        max_connections: resolved.max_connections,
        logs_dir: resolved.logs_dir.clone(),
    };

    let factory: Arc<dyn SessionFactory> = Arc::new(SshSessionFactory::new(resolved.session));
    let sink: Arc<dyn StatusSink> = Arc::new(StdoutSink);
    let span = run_span(&plan.run_id);
    let report = Orchestrator::new(factory, Arc::clone(&sink))
        .run(plan)
        .instrument(span)
        .await;

    for line in report.render() {
        sink.emit(&line);
    }
    match report.persist(&resolved.logs_dir).await {
        Ok(path) => info!(event = "run.summary", path = %path.display(), "run summary written"),
        Err(err) => warn!(event = "run.summary_failed", error = %format!("{err:#}"), "run summary not written"),
    }

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn path_or_prompt(given: Option<PathBuf>, prompt: &str) -> anyhow::Result<PathBuf> {
    if let Some(path) = given {
        return Ok(system_utils::path::expand_tilde(&path));
    }
    let answer: String = Input::new()
        .with_prompt(prompt)
        .interact_text()
        .with_context(|| format!("failed to read {}", prompt.to_lowercase()))?;
    Ok(system_utils::path::expand_tilde(&PathBuf::from(answer.trim())))
}
