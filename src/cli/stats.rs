use anyhow::Result;
use chrono::Duration;
use clap::Parser;

use crate::{
    daemon::storage::{accounting::AccountingStore, kv_store::KeyValueStore},
    utils::{percentage::Percentage, time::seconds_to_duration},
};

use super::analysis::analyze_sites;

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[arg(short = 'p', long = "percentage", help = "Filter sites to have at least specified percentage", default_value_t = Percentage::new_opt(0.).unwrap())]
    min_percentage: Percentage,
}

/// Command to process `stats` command. Prints the accumulated time of every site since the last
/// clear or successful report.
pub async fn process_stats_command<S: KeyValueStore>(
    store: &AccountingStore<S>,
    StatsCommand { min_percentage }: StatsCommand,
) -> Result<()> {
    let counters = store.sites().await?;
    let (usages, total) = analyze_sites(&counters, min_percentage);

    if store.pause_state().await?.is_paused() {
        println!("Tracking is paused");
    }

    if usages.is_empty() {
        println!("No statistics recorded");
        return Ok(());
    }

    for usage in usages {
        println!(
            "{}%\t{}\t{}",
            *usage.percentage as i32,
            format_duration(seconds_to_duration(usage.seconds)),
            usage.site
        );
    }
    println!();
    println!("Total\t{}", format_duration(seconds_to_duration(total)));
    Ok(())
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
