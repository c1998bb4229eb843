use device_session::{DeviceDescriptor, SessionFactory};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Semaphore;
use tracing::info;

use crate::artifacts::{ArtifactWriter, StatusSink};
use crate::credentials::CredentialBook;
use crate::dispatch::{Dispatcher, Workload};
use crate::phase::Phase;
use crate::report::RunReport;

const DEPLOY_BANNER: &str = "First we are going to deploy stuff.";
const VALIDATE_BANNER: &str = "Next we are going to validate login with directory credentials.";
const DONE_BANNER: &str = "All done!";

/// Everything a run needs, assembled once before any device is touched.
pub(crate) struct RunPlan {
    pub(crate) run_id: String,
    pub(crate) devices: Vec<DeviceDescriptor>,
    pub(crate) config_lines: Vec<String>,
    pub(crate) validate_command: String,
    pub(crate) credentials: CredentialBook,
    pub(crate) max_connections: usize,
    pub(crate) logs_dir: PathBuf,
}

pub(crate) struct Orchestrator {
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn StatusSink>,
}

impl Orchestrator {
    pub(crate) fn new(factory: Arc<dyn SessionFactory>, sink: Arc<dyn StatusSink>) -> Self {
        Self { factory, sink }
    }

    /// Deploys with the local credentials, waits for every device, then
    /// validates with the directory credentials through the same pool.
    pub(crate) async fn run(&self, plan: RunPlan) -> RunReport {
        let started = SystemTime::now();
        let RunPlan {
            run_id,
            devices,
            config_lines,
            validate_command,
            credentials,
            max_connections,
            logs_dir,
        } = plan;

        let writer = Arc::new(ArtifactWriter::new(logs_dir, Arc::clone(&self.sink)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.factory),
            Arc::new(Semaphore::new(max_connections.max(1))),
            writer,
            Arc::new(Workload {
                config_lines,
                validate_command,
            }),
        );

        info!(
            event = "run.start",
            run_id = %run_id,
            devices = devices.len(),
            max_connections,
            "run starting"
        );

        self.sink.emit(DEPLOY_BANNER);
        let deploy = dispatcher
            .run_phase(&devices, Phase::Deploy, credentials.local)
            .await;
        info!(event = "phase.done", phase = %Phase::Deploy, clean = deploy.is_clean(), "phase finished");

        self.sink.emit(VALIDATE_BANNER);
        let validate = dispatcher
            .run_phase(&devices, Phase::Validate, credentials.directory)
            .await;
        info!(event = "phase.done", phase = %Phase::Validate, clean = validate.is_clean(), "phase finished");

        self.sink.emit(DONE_BANNER);
        RunReport::new(run_id, started, deploy, validate)
    }
}
