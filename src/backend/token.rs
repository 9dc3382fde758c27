//! Bearer-token persistence.
//!
//! [`SecureStore`] abstracts the platform credential store. Two stores ship
//! with the crate:
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral sessions.
//! - [`FileStore`]: JSON file readable only by the owner (0600 on Unix).
//!
//! [`TokenManager`] fronts a store with a short-lived in-memory cache so
//! the store is not consulted on every request.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::{MealgateError, Result};

/// Store key of the backend access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// How long a loaded token is served from memory. Default: 1 hour.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Secret key/value storage.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// JSON file store, created with owner-only permissions.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `~/.mealgate/credentials.json`
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            MealgateError::Storage("cannot locate home directory".to_string())
        })?;
        Ok(Self::new(home.join(".mealgate").join("credentials.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                MealgateError::Storage(format!("corrupt credential file {:?}: {e}", self.path))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(MealgateError::Storage(format!(
                "failed to read {:?}: {e}",
                self.path
            ))),
        }
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> Result<()> {
        let io_err = |e: std::io::Error| {
            MealgateError::Storage(format!("failed to write {:?}: {e}", self.path))
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let content = serde_json::to_vec_pretty(values)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await.map_err(io_err)?;
        file.write_all(&content).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        // A pre-existing file keeps its old mode through `open`.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_some() {
            self.write_all(&values).await?;
        }
        Ok(())
    }
}

/// Access-token cache in front of a [`SecureStore`].
///
/// Cheap to clone; clones share the cache and the store.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn SecureStore>,
    cache: moka::sync::Cache<String, String>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self::with_ttl(store, DEFAULT_TOKEN_TTL)
    }

    pub fn with_ttl(store: Arc<dyn SecureStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: moka::sync::Cache::builder()
                .max_capacity(1)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Current token, from memory or the store.
    pub async fn token(&self) -> Result<Option<String>> {
        if let Some(token) = self.cache.get(ACCESS_TOKEN_KEY) {
            return Ok(Some(token));
        }
        let loaded = self.store.load(ACCESS_TOKEN_KEY).await?;
        if let Some(token) = &loaded {
            debug!("loaded access token from secure store");
            self.cache.insert(ACCESS_TOKEN_KEY.to_string(), token.clone());
        }
        Ok(loaded)
    }

    /// Persist a new token and serve it from memory.
    pub async fn set_token(&self, token: &str) -> Result<()> {
        self.store.save(ACCESS_TOKEN_KEY, token).await?;
        self.cache
            .insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        Ok(())
    }

    /// Forget the token in memory and in the store.
    pub async fn clear(&self) -> Result<()> {
        self.cache.invalidate(ACCESS_TOKEN_KEY);
        self.store.delete(ACCESS_TOKEN_KEY).await
    }
}
