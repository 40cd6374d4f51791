use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, TimeZone, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::daemon::storage::{accounting::AccountingStore, kv_store::KeyValueStore};

/// How often the clear schedule is evaluated.
pub const CLEAR_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval allowed between scheduled clears. Anything below disables clearing.
pub const MIN_CLEAR_INTERVAL: u64 = 3600;

const DAILY_INTERVAL: u64 = 86400;

fn interval_delta(interval_secs: u64) -> Option<TimeDelta> {
    i64::try_from(interval_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
}

/// First clear moment for an interval: `now + interval` rounded down to the top of the hour, or
/// to midnight for daily clears. Rounding happens in the timezone of `now`. `None` when the
/// moment is out of the representable range.
pub fn first_clear_time<Tz: TimeZone>(
    now: &DateTime<Tz>,
    interval_secs: u64,
) -> Option<DateTime<Utc>> {
    let target = now
        .clone()
        .checked_add_signed(interval_delta(interval_secs)?)?;
    let local = target.naive_local();
    let hour = if interval_secs == DAILY_INTERVAL {
        0
    } else {
        local.hour()
    };

    let rounded = local
        .date()
        .and_hms_opt(hour, 0, 0)
        .and_then(|rounded| target.timezone().from_local_datetime(&rounded).earliest())
        .unwrap_or(target);
    Some(rounded.with_timezone(&Utc))
}

/// Evaluates the clear schedule and persists its progress. Returns whether statistics have to be
/// cleared now; the schedule has already been moved one interval forward in that case.
pub async fn evaluate_clear<S: KeyValueStore, Tz: TimeZone>(
    store: &AccountingStore<S>,
    now: &DateTime<Tz>,
) -> Result<bool> {
    let interval = store.clear_interval().await?;
    debug!("Clear interval of {interval}");
    if interval < MIN_CLEAR_INTERVAL {
        if store.next_clear().await?.is_some() {
            debug!("Invalid interval period, minimum is {MIN_CLEAR_INTERVAL}");
            store.set_next_clear(None).await?;
        }
        return Ok(false);
    }

    let next_clear = match store.next_clear().await? {
        Some(next_clear) => next_clear,
        None => {
            let Some(next_clear) = first_clear_time(now, interval) else {
                warn!("Clear interval {interval} is out of range, clearing is disabled");
                return Ok(false);
            };
            info!("Next time to clear is {next_clear}");
            store.set_next_clear(Some(next_clear)).await?;
            next_clear
        }
    };

    if now.with_timezone(&Utc) > next_clear {
        let Some(following) = interval_delta(interval)
            .and_then(|delta| next_clear.checked_add_signed(delta))
        else {
            warn!("Clear interval {interval} is out of range, clearing is disabled");
            store.set_next_clear(None).await?;
            return Ok(false);
        };
        info!("Time to clear stats, next time to clear is {following}");
        store.set_next_clear(Some(following)).await?;
        return Ok(true);
    }

    Ok(false)
}
