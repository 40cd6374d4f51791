use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use crate::daemon::{
    processing::clear::MIN_CLEAR_INTERVAL,
    storage::{accounting::AccountingStore, entities::StorageType, kv_store::KeyValueStore},
};

#[derive(Debug, Parser)]
pub struct ConfigCommand {
    #[arg(
        long = "clear-interval",
        help = "Seconds between automatic clears of statistics. Values under 3600 disable clearing"
    )]
    clear_interval: Option<u64>,
    #[arg(
        long = "send-interval",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between reports to the collector. Applied on the next daemon start"
    )]
    send_interval: Option<u64>,
    #[arg(long, help = "Where statistics are kept")]
    storage: Option<StorageType>,
    #[arg(long = "idle-detection", help = "Pause tracking while the system is idle or locked")]
    idle_detection: Option<bool>,
}

/// Applies requested changes and prints the resulting configuration.
pub async fn process_config_command<S: KeyValueStore>(
    store: &AccountingStore<S>,
    ConfigCommand {
        clear_interval,
        send_interval,
        storage,
        idle_detection,
    }: ConfigCommand,
) -> Result<()> {
    if let Some(clear_interval) = clear_interval {
        store.set_clear_interval(clear_interval).await?;
    }
    if let Some(send_interval) = send_interval {
        store
            .set_send_interval(Duration::from_secs(send_interval))
            .await?;
    }
    if let Some(storage) = storage {
        store.set_storage_type(storage).await?;
    }
    if let Some(idle_detection) = idle_detection {
        store.set_idle_detection(idle_detection).await?;
    }

    let clear_interval = store.clear_interval().await?;
    if clear_interval < MIN_CLEAR_INTERVAL {
        println!("clear interval\tdisabled");
    } else {
        println!("clear interval\t{clear_interval}s");
    }
    if let Some(next_clear) = store.next_clear().await? {
        println!("next clear\t{}", next_clear.with_timezone(&chrono::Local));
    }
    println!("send interval\t{}s", store.send_interval().await?.as_secs());
    println!("storage\t\t{}", store.storage_type().await?);
    println!("idle detection\t{}", store.idle_detection().await?);
    println!("paused\t\t{}", store.pause_state().await?.is_paused());
    Ok(())
}
