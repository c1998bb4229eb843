use anyhow::Context;
use device_session::{Credentials, DeviceDescriptor, DeviceSession, OpenError, SessionFactory};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};

use crate::artifacts::ArtifactWriter;
use crate::classify::{classify, SessionRun};
use crate::logging::device_span;
use crate::phase::{Category, Phase};
use crate::report::PhaseReport;

/// What each phase does once a session is open.
pub(crate) struct Workload {
    pub(crate) config_lines: Vec<String>,
    pub(crate) validate_command: String,
}

/// Fans device tasks out under a shared connection permit pool.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    factory: Arc<dyn SessionFactory>,
    permits: Arc<Semaphore>,
    writer: Arc<ArtifactWriter>,
    workload: Arc<Workload>,
}

impl Dispatcher {
    pub(crate) fn new(
        factory: Arc<dyn SessionFactory>,
        permits: Arc<Semaphore>,
        writer: Arc<ArtifactWriter>,
        workload: Arc<Workload>,
    ) -> Self {
        Self {
            factory,
            permits,
            writer,
            workload,
        }
    }

    /// Runs `phase` on every device and returns once all device tasks are done.
    pub(crate) async fn run_phase(
        &self,
        devices: &[DeviceDescriptor],
        phase: Phase,
        credentials: Arc<Credentials>,
    ) -> PhaseReport {
        let mut hosts = Vec::with_capacity(devices.len());
        let mut handles = Vec::with_capacity(devices.len());
        for device in devices {
            let dispatcher = self.clone();
            let device = device.clone();
            let credentials = Arc::clone(&credentials);
            let span = device_span(&device.host, phase);
            hosts.push(device.host.clone());
            handles.push(tokio::spawn(
                async move { dispatcher.run_device(device, phase, credentials).await }
                    .instrument(span),
            ));
        }

        let mut report = PhaseReport::new(phase);
        for (host, joined) in hosts.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(category)) => report.record(host, category),
                Ok(Err(err)) => {
                    error!(host = %host, phase = %phase, error = %format!("{err:#}"), "device task failed");
                    report.record_fault(host, format!("{err:#}"));
                }
                Err(err) => {
                    let fault = if err.is_panic() {
                        "device task panicked"
                    } else {
                        "device task cancelled"
                    };
                    error!(host = %host, phase = %phase, error = %err, "{fault}");
                    report.record_fault(host, fault.to_string());
                }
            }
        }
        report
    }

    async fn run_device(
        &self,
        device: DeviceDescriptor,
        phase: Phase,
        credentials: Arc<Credentials>,
    ) -> anyhow::Result<Category> {
        let outcome = {
            let _permit = self
                .permits
                .acquire()
                .await
                .context("connection permit pool closed")?;
            info!(host = %device.host, phase = %phase, user = %credentials.username, "session starting");
            let mut session = self.factory.build(&device, credentials);
            let run = self.drive(session.as_mut(), phase).await;
            classify(phase, &device.host, &run)
        };
        self.writer
            .write(&outcome)
            .await
            .with_context(|| format!("failed to record {phase} outcome for {}", device.host))?;
        info!(host = %device.host, phase = %phase, category = %outcome.category, "device finished");
        Ok(outcome.category)
    }

    async fn drive(&self, session: &mut dyn DeviceSession, phase: Phase) -> SessionRun {
        match session.open().await {
            Ok(()) => {}
            Err(OpenError::Auth(detail)) => {
                warn!(host = %session.host(), phase = %phase, detail = %detail, "authentication rejected");
                return SessionRun::AuthRejected(detail);
            }
            Err(OpenError::Connect(err)) => {
                warn!(host = %session.host(), phase = %phase, error = %format!("{err:#}"), "connect failed");
                return SessionRun::Unreachable(format!("{err:#}"));
            }
        }

        let run = match phase {
            Phase::Deploy => match session
                .send_config_batch(&self.workload.config_lines)
                .await
            {
                Ok(batch) => SessionRun::Replied {
                    failed: batch.failed,
                    text: batch.result,
                },
                Err(err) => SessionRun::Interrupted(format!("{err:#}")),
            },
            Phase::Validate => match session
                .send_command(&self.workload.validate_command)
                .await
            {
                Ok(reply) => SessionRun::Replied {
                    failed: reply.failed,
                    text: reply.result,
                },
                Err(err) => SessionRun::Interrupted(format!("{err:#}")),
            },
        };

        if let Err(err) = session.close().await {
            warn!(host = %session.host(), error = %err, "session close failed");
        }
        run
    }
}
