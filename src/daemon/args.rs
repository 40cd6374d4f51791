use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::reporting::sink::DEFAULT_SERVER;

#[derive(Parser, Debug)]
pub struct DaemonArgs {
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    /// Base url of the collector statistics are sent to when remote storage is enabled.
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,
    /// Seconds between forced counter updates.
    #[arg(long = "tick-seconds", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_seconds: u64,
    /// This option is for debugging purposes only. Logs are mirrored to stderr.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Browsers pass the caller's origin to native hosts as a positional argument.
    #[arg(hide = true)]
    pub origin: Vec<String>,
    #[arg(long = "parent-window", hide = true)]
    pub parent_window: Option<i64>,
}
