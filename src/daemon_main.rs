// This runs daemon on windows without creating a console. The host talks to it through pipes.
#![windows_subsystem = "windows"]

use std::{env::args, time::Duration};

use anyhow::Result;
use clap::Parser;
use sitetally::{
    daemon::{args::DaemonArgs, start_daemon, DaemonSettings},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

/// Reading stdin occupies a blocking thread that can't be interrupted, so the runtime is not
/// waited on forever after the host leaves.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let args = DaemonArgs::parse_from(args());
    run(args).inspect_err(|e| error!("Daemon failed {e:?}"))
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;

    let settings = DaemonSettings::from_args(&args, app_dir);
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(start_daemon(settings));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}
