use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fleetcheck",
    version,
    about = "Push a config script to a device fleet, then confirm directory logins still work"
)]
pub(crate) struct Args {
    /// Newline-delimited host list. Prompted for when omitted.
    #[arg(long)]
    pub(crate) inventory: Option<PathBuf>,
    /// Configuration lines applied in the deploy phase. Prompted for when omitted.
    #[arg(long)]
    pub(crate) script: Option<PathBuf>,
    #[arg(long)]
    pub(crate) settings: Option<PathBuf>,
    #[arg(long)]
    pub(crate) logs_dir: Option<PathBuf>,
    #[arg(long)]
    pub(crate) max_connections: Option<usize>,
    #[arg(long, default_value_t = false)]
    pub(crate) log_to_stderr: bool,
}
