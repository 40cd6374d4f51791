pub mod analysis;
pub mod settings;
pub mod stats;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use settings::{process_config_command, ConfigCommand};
use stats::{process_stats_command, StatsCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        collection::idle::PauseState,
        reporting::sink::{HttpSink, RemoteSink, DEFAULT_SERVER},
        start_daemon,
        storage::{accounting::AccountingStore, entities::StorageType, kv_store::FileStore},
        DaemonSettings,
    },
    utils::{
        dir::{create_application_default_path, store_path},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Sitetally", version, long_about = None)]
#[command(about = "Tallies active time spent on websites", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Run the host process directly in current console. Browsers launch sitetally-daemon instead"
    )]
    Serve {
        #[arg(long, default_value = DEFAULT_SERVER, help = "Collector statistics are sent to when remote storage is enabled")]
        server: String,
        #[arg(long = "tick-seconds", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..), help = "Seconds between forced counter updates")]
        tick_seconds: u64,
    },
    #[command(about = "Display time spent on every site")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Stop tracking a site and drop its accumulated time")]
    Ignore {
        #[arg(help = "Any url of the site, for example https://example.com/page")]
        url: String,
    },
    #[command(about = "Drop all accumulated statistics")]
    Clear {
        #[arg(long, default_value = DEFAULT_SERVER, help = "Collector to clear when remote storage is enabled")]
        server: String,
    },
    #[command(about = "Pause tracking until resumed")]
    Pause {},
    #[command(about = "Resume tracking")]
    Resume {},
    #[command(about = "Show or change configuration")]
    Config {
        #[command(flatten)]
        command: ConfigCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let store = || -> Result<AccountingStore<FileStore>> {
        Ok(AccountingStore::new(FileStore::new(store_path(&app_dir))?))
    };

    match args.commands {
        Commands::Serve {
            server,
            tick_seconds,
        } => {
            start_daemon(DaemonSettings {
                dir: app_dir.clone(),
                server,
                tick_interval: Duration::from_secs(tick_seconds),
            })
            .await
        }
        Commands::Stats { command } => process_stats_command(&store()?, command).await,
        Commands::Ignore { url } => match store()?.ignore_url(&url).await? {
            Some(site) => {
                println!("Ignoring {site}");
                Ok(())
            }
            None => Err(anyhow::anyhow!("Can't extract a site from {url}")),
        },
        Commands::Clear { server } => {
            let store = store()?;
            if store.storage_type().await? == StorageType::Remote {
                HttpSink::new(server)?.clear().await?;
            }
            store.clear_sites().await?;
            println!("Statistics cleared");
            Ok(())
        }
        Commands::Pause {} => {
            store()?
                .update_pause_state(PauseState::paused_by_user)
                .await?;
            println!("Paused");
            Ok(())
        }
        Commands::Resume {} => {
            store()?
                .update_pause_state(PauseState::resumed_by_user)
                .await?;
            println!("Resumed");
            Ok(())
        }
        Commands::Config { command } => process_config_command(&store()?, command).await,
    }
}
