use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::daemon::{
    collection::idle::PauseState,
    processing::site::{extract_site, IgnoreList, Site},
};

use super::{
    entities::{
        ClearMoment, ClearStatsIntervalKey, IdleDetectionKey, IgnoredSitesKey, NextTimeToClearKey,
        PausedKey, SendStatsIntervalKey, SiteCounters, SitesKey, StorageType, StorageTypeKey,
    },
    kv_store::KeyValueStore,
};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(3600);

/// Counters smaller than this are considered fully reported.
const REPORTED_EPSILON: f64 = 1e-6;

/// Bridges the key-value store and the rest of the daemon. Holds the per-site counters together
/// with configuration and schedule state, and fills in defaults for keys that were never written.
pub struct AccountingStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> AccountingStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes defaults for the keys the daemon expects to exist.
    pub async fn initialize(&self) -> Result<()> {
        if self.store.get::<SitesKey>().await?.is_none() {
            self.store.set::<SitesKey>(&SiteCounters::new()).await?;
        }
        if self.store.get::<PausedKey>().await?.is_none() {
            self.store.set::<PausedKey>(&PauseState::default()).await?;
        }
        if self.store.get::<IdleDetectionKey>().await?.is_none() {
            self.store.set::<IdleDetectionKey>(&true).await?;
        }
        if self.store.get::<SendStatsIntervalKey>().await?.is_none() {
            self.store
                .set::<SendStatsIntervalKey>(&(DEFAULT_SEND_INTERVAL.as_millis() as u64))
                .await?;
        }
        Ok(())
    }

    pub async fn sites(&self) -> Result<SiteCounters> {
        Ok(self.store.get::<SitesKey>().await?.unwrap_or_default())
    }

    /// Adds time to a site's counter. Ignored sites are never recorded.
    pub async fn add_time(&self, site: &Site, seconds: f64) -> Result<()> {
        if self.ignored_sites().await?.contains(site) {
            return Ok(());
        }
        self.store
            .update::<SitesKey, _, _>(|sites| {
                let mut sites = sites.unwrap_or_default();
                *sites.entry(site.clone()).or_insert(0.) += seconds;
                (sites, ())
            })
            .await?;

        // `ignore_url` may have run in another process since the check above.
        if self.ignored_sites().await?.contains(site) {
            self.remove_site(site).await?;
        }
        Ok(())
    }

    async fn remove_site(&self, site: &Site) -> Result<()> {
        self.store
            .update::<SitesKey, _, _>(|sites| {
                let mut sites = sites.unwrap_or_default();
                sites.remove(site);
                (sites, ())
            })
            .await
    }

    pub async fn clear_sites(&self) -> Result<()> {
        self.store.set::<SitesKey>(&SiteCounters::new()).await
    }

    /// Removes time that was acknowledged by the collector. Whatever accrued after the snapshot
    /// was taken stays.
    pub async fn subtract_reported(&self, reported: &SiteCounters) -> Result<()> {
        self.store
            .update::<SitesKey, _, _>(|sites| {
                let mut sites = sites.unwrap_or_default();
                for (site, seconds) in reported {
                    if let Some(current) = sites.get_mut(site) {
                        *current -= seconds;
                    }
                }
                sites.retain(|_, seconds| *seconds > REPORTED_EPSILON);
                (sites, ())
            })
            .await
    }

    pub async fn ignored_sites(&self) -> Result<IgnoreList> {
        Ok(self.store.get::<IgnoredSitesKey>().await?.unwrap_or_default())
    }

    /// Puts the site of `url` on the ignore list and drops its accumulated time. Returns the
    /// ignored site, `None` if the url is malformed.
    pub async fn ignore_url(&self, url: &str) -> Result<Option<Site>> {
        info!("Removing {url}");
        let Some(site) = extract_site(url) else {
            debug!("Can't ignore malformed url {url}");
            return Ok(None);
        };

        self.store
            .update::<IgnoredSitesKey, _, _>(|ignored| {
                let mut ignored = ignored.unwrap_or_default();
                ignored.push(site.clone());
                (ignored, ())
            })
            .await?;

        self.remove_site(&site).await?;
        Ok(Some(site))
    }

    pub async fn pause_state(&self) -> Result<PauseState> {
        Ok(self.store.get::<PausedKey>().await?.unwrap_or_default())
    }

    /// Applies `update` to the stored pause state atomically and returns the new state.
    pub async fn update_pause_state(
        &self,
        update: impl FnOnce(PauseState) -> PauseState + Send,
    ) -> Result<PauseState> {
        self.store
            .update::<PausedKey, _, _>(|state| {
                let state = update(state.unwrap_or_default());
                (state, state)
            })
            .await
    }

    pub async fn idle_detection(&self) -> Result<bool> {
        Ok(self.store.get::<IdleDetectionKey>().await?.unwrap_or(true))
    }

    pub async fn set_idle_detection(&self, enabled: bool) -> Result<()> {
        self.store.set::<IdleDetectionKey>(&enabled).await
    }

    /// Seconds between scheduled clears. A missing value is persisted as 0 (disabled).
    pub async fn clear_interval(&self) -> Result<u64> {
        match self.store.get::<ClearStatsIntervalKey>().await? {
            Some(interval) => Ok(interval),
            None => {
                self.store.set::<ClearStatsIntervalKey>(&0).await?;
                Ok(0)
            }
        }
    }

    /// Changing the interval also drops the scheduled clear, so it gets recomputed.
    pub async fn set_clear_interval(&self, seconds: u64) -> Result<()> {
        self.store.set::<ClearStatsIntervalKey>(&seconds).await?;
        self.set_next_clear(None).await
    }

    pub async fn next_clear(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get::<NextTimeToClearKey>()
            .await?
            .map(|ClearMoment(moment)| moment))
    }

    pub async fn set_next_clear(&self, moment: Option<DateTime<Utc>>) -> Result<()> {
        match moment {
            Some(moment) => {
                self.store
                    .set::<NextTimeToClearKey>(&ClearMoment(moment))
                    .await
            }
            None => self.store.remove::<NextTimeToClearKey>().await,
        }
    }

    pub async fn send_interval(&self) -> Result<Duration> {
        Ok(self
            .store
            .get::<SendStatsIntervalKey>()
            .await?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEND_INTERVAL))
    }

    pub async fn set_send_interval(&self, interval: Duration) -> Result<()> {
        self.store
            .set::<SendStatsIntervalKey>(&(interval.as_millis() as u64))
            .await
    }

    pub async fn storage_type(&self) -> Result<StorageType> {
        Ok(self.store.get::<StorageTypeKey>().await?.unwrap_or_default())
    }

    pub async fn set_storage_type(&self, storage_type: StorageType) -> Result<()> {
        self.store.set::<StorageTypeKey>(&storage_type).await
    }
}
