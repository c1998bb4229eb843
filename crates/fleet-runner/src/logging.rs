use anyhow::Context;
use std::io;
use std::path::Path;
use tracing::{info_span, Span, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use crate::phase::Phase;

const LOG_FILE: &str = "fleetcheck.log";

/// JSON logs go to `<logs_dir>/fleetcheck.log`; stderr gets a compact copy on request.
pub(crate) fn init_tracing(
    logs_dir: &Path,
    log_to_stderr: bool,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs dir {}", logs_dir.display()))?;
    let (file_writer, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(logs_dir, LOG_FILE));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = log_to_stderr.then(|| {
        // Status lines own stdout; keep the stderr copy short.
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer(file_writer))
        .with(stderr_layer)
        .init();

    Ok(file_guard)
}

/// Records carry the run and device spans they were emitted under.
fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .json()
        .with_current_span(false)
        .with_span_list(true)
}

pub(crate) fn run_span(run_id: &str) -> Span {
    info_span!("run", run_id = %run_id)
}

pub(crate) fn device_span(host: &str, phase: Phase) -> Span {
    info_span!("device", host = %host, phase = %phase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn records_carry_run_and_device_context() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber =
            tracing_subscriber::registry().with(json_layer(move || writer.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let _run = run_span("run-42").entered();
            let _device = device_span("sw1", Phase::Validate).entered();
            tracing::info!(event = "device.finished", "device finished");
        });

        let raw = String::from_utf8(captured.0.lock().expect("capture lock").clone())
            .expect("utf8 log");
        let record: serde_json::Value =
            serde_json::from_str(raw.lines().next().expect("one record")).expect("json record");
        assert_eq!(record["fields"]["event"], "device.finished");
        assert_eq!(record["spans"][0]["name"], "run");
        assert_eq!(record["spans"][0]["run_id"], "run-42");
        assert_eq!(record["spans"][1]["host"], "sw1");
        assert_eq!(record["spans"][1]["phase"], "validate");
    }
}
