use std::{fs, marker::PhantomData, path::PathBuf, time::Duration};

use eyre::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct CachePath {
    root: Option<PathBuf>,
}

impl CachePath {
    /// New cache path.
    pub fn new(root: Option<impl Into<PathBuf>>) -> Self {
        Self { root: root.map(Into::into) }
    }

    /// Returns the path to sdb's cache dir: `~/.sdb/cache` by default.
    pub fn sdb_cache_dir(&self) -> Option<PathBuf> {
        self.root.clone().or_else(|| dirs_next::home_dir().map(|p| p.join(".sdb").join("cache")))
    }

    /// Returns the path to sdb rpc cache dir: `<cache_root>/rpc`.
    pub fn sdb_rpc_cache_dir(&self) -> Option<PathBuf> {
        Some(self.sdb_cache_dir()?.join("rpc"))
    }

    /// Returns the path to the cache dir of transaction traces: `<cache_root>/rpc/traces`.
    pub fn sdb_trace_cache_dir(&self) -> Option<PathBuf> {
        Some(self.sdb_rpc_cache_dir()?.join("traces"))
    }

    /// Returns the path to the cache dir of transactions: `<cache_root>/rpc/txs`.
    pub fn sdb_tx_cache_dir(&self) -> Option<PathBuf> {
        Some(self.sdb_rpc_cache_dir()?.join("txs"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheWrapper<T> {
    pub data: T,
    pub expires_at: u64,
}

impl<T> CacheWrapper<T> {
    pub fn new(data: T, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl
                .map(|ttl| ttl.as_secs().saturating_add(chrono::Utc::now().timestamp() as u64))
                .unwrap_or(u64::MAX),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < chrono::Utc::now().timestamp() as u64
    }
}

/// A cache manager that stores data in the file system.
///  - `T` is the type of the data to be cached.
///  - `cache_dir` is the directory where the cache files are stored.
///  - `cache_ttl` is the time-to-live of the cache files. If it is `None`, the cache files will
///    never expire.
#[derive(Debug, Clone)]
pub struct Cache<T> {
    cache_dir: Option<PathBuf>,
    cache_ttl: Option<Duration>,
    phantom: PhantomData<T>,
}

impl<T> Cache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(cache_dir: Option<impl Into<PathBuf>>, cache_ttl: Option<Duration>) -> Result<Self> {
        let cache_dir = cache_dir
            .map(|p| {
                let p = p.into();
                fs::create_dir_all(&p)?;
                Ok::<_, std::io::Error>(p)
            })
            .transpose()?;

        Ok(Self { cache_dir, cache_ttl, phantom: PhantomData })
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self { cache_dir: None, cache_ttl: None, phantom: PhantomData }
    }

    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }

    pub fn load_cache(&self, label: impl Into<String>) -> Option<T> {
        let cache_dir = self.cache_dir()?;
        let cache_file = cache_dir.join(format!("{}.json", label.into()));
        trace!("loading cache: {:?}", cache_file);
        if !cache_file.exists() {
            return None;
        }

        let content = fs::read_to_string(&cache_file).ok()?;
        let cache: CacheWrapper<_> = if let Ok(cache) = serde_json::from_str(&content) {
            cache
        } else {
            warn!("the cache file has been corrupted: {:?}", cache_file);
            let _ = fs::remove_file(&cache_file); // we do not care about the result
            return None;
        };

        if cache.is_expired() {
            trace!("the cache file has expired: {:?}", cache_file);
            let _ = fs::remove_file(&cache_file); // we do not care about the result
            None
        } else {
            trace!("hit the cache: {:?}", cache_file);
            Some(cache.data)
        }
    }

    pub fn save_cache(&self, label: impl Into<String>, data: &T) -> Result<()> {
        if let Some(cache_dir) = self.cache_dir() {
            let cache_file = cache_dir.join(format!("{}.json", label.into()));
            trace!("saving cache: {:?}", cache_file);

            let cache = CacheWrapper::new(data, self.cache_ttl);
            let content = serde_json::to_string(&cache)?;
            fs::write(&cache_file, content)?;
            Ok(())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::<Vec<u64>>::new(Some(dir.path().join("traces")), None).unwrap();

        assert!(cache.load_cache("0xabc").is_none());
        cache.save_cache("0xabc", &vec![1, 2, 3]).unwrap();
        assert_eq!(cache.load_cache("0xabc"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_corrupted_cache_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::<u64>::new(Some(dir.path()), None).unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, "not json").unwrap();

        assert!(cache.load_cache("bad").is_none());
        assert!(!file.exists());
    }

    #[test]
    fn test_disabled_cache() {
        let cache = Cache::<u64>::disabled();
        cache.save_cache("x", &1).unwrap();
        assert!(cache.load_cache("x").is_none());
    }

    #[test]
    fn test_cache_paths() {
        let path = CachePath::new(Some("/tmp/sdb"));
        assert_eq!(path.sdb_trace_cache_dir(), Some(PathBuf::from("/tmp/sdb/rpc/traces")));
        assert_eq!(path.sdb_tx_cache_dir(), Some(PathBuf::from("/tmp/sdb/rpc/txs")));
    }
}
