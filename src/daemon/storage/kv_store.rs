use std::{future::Future, path::PathBuf};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tracing::{debug, warn};

use crate::fs::operations::{read_if_exists, remove_if_exists, write_atomically};

use super::entities::StoreKey;

/// Version written into every document. Documents with another version are ignored.
pub const STORE_VERSION: u32 = 1;

/// Interface for abstracting persistence of typed keys.
pub trait KeyValueStore {
    /// Retrieves the value of a key, `None` if it was never written.
    fn get<K: StoreKey>(&self) -> impl Future<Output = Result<Option<K::Value>>> + Send;

    /// Replaces the value of a key atomically.
    fn set<K: StoreKey>(&self, value: &K::Value) -> impl Future<Output = Result<()>> + Send;

    fn remove<K: StoreKey>(&self) -> impl Future<Output = Result<()>> + Send;

    /// Reads, modifies and writes back a key without letting anyone else write in between.
    /// `update` gets the current value and returns the new one together with a result.
    fn update<K, R, F>(&self, update: F) -> impl Future<Output = Result<R>> + Send
    where
        K: StoreKey,
        R: Send,
        F: FnOnce(Option<K::Value>) -> (K::Value, R) + Send;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    value: T,
}

/// The main realization of [KeyValueStore]. Every key is a separate JSON document guarded by its
/// own lock file, so other processes (the cli for example) can safely work on the same directory.
pub struct FileStore {
    store_dir: PathBuf,
}

impl FileStore {
    pub fn new(store_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&store_dir)?;

        Ok(Self { store_dir })
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.store_dir.join(format!("{name}.json"))
    }

    /// Decodes a stored document. Corrupted documents and other versions are treated as missing,
    /// the next write replaces them.
    fn decode<K: StoreKey>(contents: Option<Vec<u8>>) -> Option<K::Value> {
        let contents = contents?;
        match serde_json::from_slice::<Envelope<K::Value>>(&contents) {
            Ok(Envelope { version, value }) if version == STORE_VERSION => Some(value),
            Ok(Envelope { version, .. }) => {
                warn!("Key {} has unsupported version {version}, ignoring it", K::NAME);
                None
            }
            Err(e) => {
                warn!("Key {} holds an illegal document: {e}", K::NAME);
                None
            }
        }
    }

    fn encode<K: StoreKey>(value: &K::Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&EnvelopeRef {
            version: STORE_VERSION,
            value,
        })?)
    }

    async fn open_lock(&self, name: &str) -> Result<File, std::io::Error> {
        File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.store_dir.join(format!("{name}.lock")))
            .await
    }
}

impl KeyValueStore for FileStore {
    async fn get<K: StoreKey>(&self) -> Result<Option<K::Value>> {
        let lock = self.open_lock(K::NAME).await?;
        lock.lock_shared()?;
        let contents = read_if_exists(&self.document_path(K::NAME)).await;
        lock.unlock_async().await?;

        Ok(Self::decode::<K>(contents?))
    }

    async fn set<K: StoreKey>(&self, value: &K::Value) -> Result<()> {
        let contents = Self::encode::<K>(value)?;

        let lock = self.open_lock(K::NAME).await?;
        lock.lock_exclusive()?;
        let result = write_atomically(&self.document_path(K::NAME), &contents).await;
        lock.unlock_async().await?;
        debug!("Stored key {}", K::NAME);
        Ok(result?)
    }

    async fn remove<K: StoreKey>(&self) -> Result<()> {
        let lock = self.open_lock(K::NAME).await?;
        lock.lock_exclusive()?;
        let result = remove_if_exists(&self.document_path(K::NAME)).await;
        lock.unlock_async().await?;
        Ok(result?)
    }

    async fn update<K, R, F>(&self, update: F) -> Result<R>
    where
        K: StoreKey,
        R: Send,
        F: FnOnce(Option<K::Value>) -> (K::Value, R) + Send,
    {
        let path = self.document_path(K::NAME);
        let lock = self.open_lock(K::NAME).await?;
        lock.lock_exclusive()?;
        let result = async {
            let current = Self::decode::<K>(read_if_exists(&path).await?);
            let (value, output) = update(current);
            write_atomically(&path, &Self::encode::<K>(&value)?).await?;
            anyhow::Ok(output)
        }
        .await;
        lock.unlock_async().await?;
        debug!("Updated key {}", K::NAME);
        result
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::daemon::storage::entities::{
        ClearStatsIntervalKey, IdleDetectionKey, SendStatsIntervalKey,
    };

    use super::{FileStore, KeyValueStore};

    #[tokio::test]
    async fn test_file_store_update() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;

        let seen = store
            .update::<ClearStatsIntervalKey, _, _>(|current| (current.unwrap_or(3600) * 2, current))
            .await?;
        assert_eq!(seen, None);
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, Some(7200));

        let seen = store
            .update::<ClearStatsIntervalKey, _, _>(|current| (current.unwrap_or(0) + 1, current))
            .await?;
        assert_eq!(seen, Some(7200));
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, Some(7201));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() -> Result<()> {
        let dir = tempdir()?;
        let tasks = (0..2)
            .map(|_| {
                let store_dir = dir.path().to_owned();
                tokio::spawn(async move {
                    let store = FileStore::new(store_dir)?;
                    for _ in 0..25 {
                        store
                            .update::<ClearStatsIntervalKey, _, _>(|current| {
                                (current.unwrap_or(0) + 1, ())
                            })
                            .await?;
                    }
                    anyhow::Ok(())
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await??;
        }

        let store = FileStore::new(dir.path().to_owned())?;
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, Some(50));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_basic() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;

        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, None);

        store.set::<ClearStatsIntervalKey>(&7200).await?;
        store.set::<IdleDetectionKey>(&false).await?;

        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, Some(7200));
        assert_eq!(store.get::<IdleDetectionKey>().await?, Some(false));

        store.remove::<ClearStatsIntervalKey>().await?;
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() -> Result<()> {
        let dir = tempdir()?;
        FileStore::new(dir.path().to_owned())?
            .set::<SendStatsIntervalKey>(&60_000)
            .await?;

        let store = FileStore::new(dir.path().to_owned())?;
        assert_eq!(store.get::<SendStatsIntervalKey>().await?, Some(60_000));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_ignores_corrupted_and_foreign_documents() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().to_owned())?;

        std::fs::write(dir.path().join("clearStatsInterval.json"), "{\"version\":1,")?;
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, None);

        std::fs::write(
            dir.path().join("clearStatsInterval.json"),
            "{\"version\":7,\"value\":3600}",
        )?;
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, None);

        std::fs::write(
            dir.path().join("clearStatsInterval.json"),
            "{\"version\":1,\"value\":3600}",
        )?;
        assert_eq!(store.get::<ClearStatsIntervalKey>().await?, Some(3600));
        Ok(())
    }
}
