use anyhow::{Result, anyhow};
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    stored_at: u64,  // Unix timestamp (seconds)
    expires_at: u64, // Unix timestamp (seconds)
}

/// Whether a value came from a live entry or an expired one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale { age_seconds: u64 },
}

impl Freshness {
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }

    /// The staler of two freshness values
    #[must_use]
    pub fn combine(self, other: Freshness) -> Freshness {
        match (self, other) {
            (Freshness::Fresh, other) => other,
            (this, Freshness::Fresh) => this,
            (Freshness::Stale { age_seconds: a }, Freshness::Stale { age_seconds: b }) => {
                Freshness::Stale {
                    age_seconds: a.max(b),
                }
            }
        }
    }
}

/// A value together with where it came from
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub freshness: Freshness,
}

impl<T> Cached<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Fresh,
        }
    }
}

pub struct PersistentCache {
    store: Keyspace,
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> anyhow::Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl PersistentCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open().map_err(|e| {
            anyhow!(
                "Failed to open cache database at {}: {e}",
                path.as_ref().display()
            )
        })?;
        let items = db.keyspace("cache", fjall::KeyspaceCreateOptions::default)?;
        Ok(PersistentCache { store: items })
    }

    /// Stores a serializable value with a time-to-live (TTL).
    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let stored_at = now_secs()?;
        let expires_at = stored_at
            .checked_add(ttl.as_secs())
            .ok_or(anyhow!("TTL overflow"))?;
        self.store_entry(
            key,
            &StoredEntry {
                value,
                stored_at,
                expires_at,
            },
        )
        .await
    }

    async fn store_entry<T: Serialize>(&self, key: &str, entry: &StoredEntry<T>) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let bytes = postcard::to_stdvec(entry)?;

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }

    async fn load_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<StoredEntry<T>>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || get_from_store(store, key_bytes)).await??;

        match maybe_bytes {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Retrieves a value if it exists and has not expired.
    /// Returns `None` for cache misses or expired entries.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_any(key).await? {
            Some((value, Freshness::Fresh)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Retrieves a value whether or not it has expired, tagged with its freshness.
    pub async fn get_any<T: DeserializeOwned>(&self, key: &str) -> Result<Option<(T, Freshness)>> {
        let Some(entry) = self.load_entry::<T>(key).await? else {
            debug!("Key not found");
            return Ok(None);
        };

        let now = now_secs()?;
        if now < entry.expires_at {
            debug!("Key found and still fresh");
            Ok(Some((entry.value, Freshness::Fresh)))
        } else {
            debug!("Key found but expired");
            let age_seconds = now.saturating_sub(entry.stored_at);
            Ok(Some((entry.value, Freshness::Stale { age_seconds })))
        }
    }

    /// Stores an already expired entry written `age` ago.
    #[cfg(test)]
    pub(crate) async fn put_expired<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        age: Duration,
    ) -> Result<()> {
        let stored_at = now_secs()? - age.as_secs();
        self.store_entry(
            key,
            &StoredEntry {
                value,
                stored_at,
                expires_at: stored_at,
            },
        )
        .await
    }

    /// Manually removes a key from the cache.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

/// Deletes the on-disk cache. Must not be called while a cache is open on `path`.
pub fn clear_directory(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path)?;
    Ok(true)
}

/// Serves `key` from the cache while fresh, otherwise calls `fetch`.
///
/// A successful fetch is stored for `ttl`. A failed fetch falls back to the
/// expired entry when it is at most `max_stale` old; otherwise the fetch
/// error is returned.
pub async fn cached_or_stale<T, F, Fut>(
    cache: &PersistentCache,
    key: &str,
    ttl: Duration,
    max_stale: Duration,
    fetch: F,
) -> Result<Cached<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut stale = None;
    match cache.get_any::<T>(key).await {
        Ok(Some((value, Freshness::Fresh))) => return Ok(Cached::fresh(value)),
        Ok(Some((value, Freshness::Stale { age_seconds }))) => stale = Some((value, age_seconds)),
        Ok(None) => {}
        Err(e) => warn!("Ignoring unreadable cache entry '{}': {}", key, e),
    }

    match fetch().await {
        Ok(value) => {
            if let Err(e) = cache.put(key, &value, ttl).await {
                warn!("Failed to cache '{}': {}", key, e);
            }
            Ok(Cached::fresh(value))
        }
        Err(err) => match stale {
            Some((value, age_seconds)) if age_seconds <= max_stale.as_secs() => {
                warn!(
                    "Fetch for '{}' failed ({:#}), serving cached data from {}s ago",
                    key, err, age_seconds
                );
                Ok(Cached {
                    value,
                    freshness: Freshness::Stale { age_seconds },
                })
            }
            _ => Err(err),
        },
    }
}
