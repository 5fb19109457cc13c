use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cnidarium::{StateDelta, StateRead, StateWrite, Storage};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

// Key prefixes (no trailing slashes, cnidarium convention)
const SESSION_PREFIX: &str = "session";
const TOKEN_PREFIX: &str = "session/token";

fn token_key(key: &str) -> String {
    format!("{}/{}", TOKEN_PREFIX, key)
}

/// Durable cell holding one raw access token per session key.
/// A missing entry means the session is unauthenticated.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, token: &str) -> Result<()>;

    /// Remove the entry. Removing a missing entry is not an error.
    async fn clear(&self, key: &str) -> Result<()>;

    /// Every key that currently holds a token.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Process-local store, lost on exit.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.tokens.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, token: &str) -> Result<()> {
        self.tokens
            .write()
            .await
            .insert(key.to_string(), token.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.tokens.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.tokens.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// On-disk store backed by a cnidarium substore.
///
/// Writes are serialised: cnidarium rejects a commit whose snapshot is no
/// longer the latest version.
pub struct CnidariumTokenStore {
    storage: Storage,
    write_lock: Mutex<()>,
}

impl CnidariumTokenStore {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let storage = Storage::load(data_dir.to_path_buf(), vec![SESSION_PREFIX.to_string()])
            .await
            .context("Failed to init cnidarium storage")?;
        Ok(Self {
            storage,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl TokenStore for CnidariumTokenStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let snapshot = self.storage.latest_snapshot();
        let raw = snapshot.get_raw(&token_key(key)).await?;
        raw.map(String::from_utf8)
            .transpose()
            .context("stored token is not valid UTF-8")
    }

    async fn save(&self, key: &str, token: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.storage.latest_snapshot();
        let mut delta = StateDelta::new(snapshot);
        delta.put_raw(token_key(key), token.as_bytes().to_vec());
        self.storage.commit(delta).await?;
        debug!(key, "token stored");
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.storage.latest_snapshot();
        let mut delta = StateDelta::new(snapshot);
        delta.delete(token_key(key));
        self.storage.commit(delta).await?;
        debug!(key, "token cleared");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let snapshot = self.storage.latest_snapshot();
        let prefix = format!("{}/", TOKEN_PREFIX);
        let mut stream = snapshot.prefix_raw(&prefix);
        let mut keys = Vec::new();

        while let Some(entry) = stream.next().await {
            match entry {
                Ok((key, _)) => {
                    if let Some(session_key) = key.strip_prefix(&prefix) {
                        keys.push(session_key.to_string());
                    }
                }
                Err(e) => {
                    warn!("Error reading token index: {}", e);
                }
            }
        }

        Ok(keys)
    }
}
