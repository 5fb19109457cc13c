use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::SessionStore;
use crate::api::{AuthBackend, DocumentBackend};
use crate::dashboard::Dashboard;
use crate::storage::TokenStore;

/// Everything the bot keeps for one Discord user.
pub struct UserSession<A, S, D> {
    pub session: SessionStore<A, S>,
    pub dashboard: Dashboard<D>,
}

impl<A: AuthBackend, S: TokenStore, D: DocumentBackend> UserSession<A, S, D> {
    /// Log out and drop the cached document list.
    pub async fn logout(&self) -> Result<(), crate::error::SessionError> {
        self.dashboard.invalidate().await;
        self.session.logout().await
    }
}

/// Per-user sessions, created on first use.
pub struct SessionRegistry<A, S, D> {
    auth: Arc<A>,
    storage: Arc<S>,
    documents: Arc<D>,
    entries: RwLock<HashMap<u64, Arc<UserSession<A, S, D>>>>,
}

impl<A: AuthBackend, S: TokenStore, D: DocumentBackend> SessionRegistry<A, S, D> {
    pub fn new(auth: Arc<A>, storage: Arc<S>, documents: Arc<D>) -> Self {
        Self {
            auth,
            storage,
            documents,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The session for `user_id`, created empty if this user has none yet.
    pub async fn get(&self, user_id: u64) -> Arc<UserSession<A, S, D>> {
        if let Some(entry) = self.entries.read().await.get(&user_id) {
            return entry.clone();
        }

        let mut entries = self.entries.write().await;
        entries
            .entry(user_id)
            .or_insert_with(|| {
                Arc::new(UserSession {
                    session: SessionStore::new(
                        self.auth.clone(),
                        self.storage.clone(),
                        user_id.to_string(),
                    ),
                    dashboard: Dashboard::new(self.documents.clone()),
                })
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Restore every stored token. Call once at startup.
    ///
    /// Returns how many sessions came back authenticated.
    pub async fn hydrate_all(&self) -> Result<usize> {
        let keys = self.storage.keys().await?;

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            match key.parse::<u64>() {
                Ok(user_id) => sessions.push(self.get(user_id).await),
                Err(_) => warn!(key = %key, "ignoring stored token with non-numeric key"),
            }
        }

        let results = join_all(sessions.iter().map(|entry| entry.session.hydrate())).await;

        let mut restored = 0;
        for (entry, result) in sessions.iter().zip(results) {
            match result {
                Ok(Some(_)) => restored += 1,
                Ok(None) => {}
                Err(e) => warn!(key = entry.session.key(), error = %e, "hydration failed"),
            }
        }

        info!(
            stored = sessions.len(),
            restored, "sessions hydrated"
        );
        Ok(restored)
    }
}
