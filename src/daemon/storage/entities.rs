use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::daemon::{
    collection::idle::PauseState,
    processing::site::{IgnoreList, Site},
};

/// Accumulated seconds per site.
pub type SiteCounters = BTreeMap<Site, f64>;

/// A typed entry of the key-value store. Every key is read and written as a whole, which is the
/// unit of atomicity the store guarantees.
pub trait StoreKey {
    const NAME: &'static str;
    type Value: Serialize + DeserializeOwned + Send + Sync;
}

macro_rules! store_key {
    ($(#[$meta:meta])* $key:ident, $name:literal, $value:ty) => {
        $(#[$meta])*
        pub struct $key;

        impl StoreKey for $key {
            const NAME: &'static str = $name;
            type Value = $value;
        }
    };
}

store_key!(SitesKey, "sites", SiteCounters);
store_key!(IgnoredSitesKey, "ignoredSites", IgnoreList);
store_key!(
    /// Both pause sources are kept under one key, so they are always updated together.
    PausedKey,
    "paused",
    PauseState
);
store_key!(IdleDetectionKey, "idleDetection", bool);
store_key!(
    /// Seconds between scheduled clears. Anything under an hour disables clearing.
    ClearStatsIntervalKey,
    "clearStatsInterval",
    u64
);
store_key!(NextTimeToClearKey, "nextTimeToClear", ClearMoment);
store_key!(
    /// Milliseconds between reports to the collector.
    SendStatsIntervalKey,
    "sendStatsInterval",
    u64
);
store_key!(StorageTypeKey, "storageType", StorageType);

/// Moment of the next scheduled clear, stored as unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClearMoment(#[serde(with = "chrono::serde::ts_milliseconds")] pub DateTime<Utc>);

/// Where statistics end up. Only `Remote` talks to the collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Local,
    Remote,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Local => write!(f, "local"),
            StorageType::Remote => write!(f, "remote"),
        }
    }
}
