//! Per-chat admin set cache
//!
//! Filled from a live [`PrivilegeFetcher`] on miss and rebuilt whenever an
//! admin-status change is observed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::membership::AdminEffect;
use crate::error::Result;

/// Live source of chat administrator ids
#[async_trait]
pub trait PrivilegeFetcher: Send + Sync {
    async fn fetch_admins(&self, chat_id: i64) -> Result<HashSet<i64>>;
}

/// Fixed admin sets, for offline use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticPrivileges {
    admins: HashMap<i64, HashSet<i64>>,
}

impl StaticPrivileges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, chat_id: i64, user_id: i64) -> Self {
        self.admins.entry(chat_id).or_default().insert(user_id);
        self
    }
}

#[async_trait]
impl PrivilegeFetcher for StaticPrivileges {
    async fn fetch_admins(&self, chat_id: i64) -> Result<HashSet<i64>> {
        Ok(self.admins.get(&chat_id).cloned().unwrap_or_default())
    }
}

/// Cache of admin sets keyed by chat
#[derive(Clone)]
pub struct AdminCache {
    fetcher: Arc<dyn PrivilegeFetcher>,
    entries: Arc<RwLock<HashMap<i64, HashSet<i64>>>>,
}

impl std::fmt::Debug for AdminCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCache").finish_non_exhaustive()
    }
}

impl AdminCache {
    pub fn new(fetcher: Arc<dyn PrivilegeFetcher>) -> Self {
        Self {
            fetcher,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Admin set of a chat, fetched live on a cache miss
    pub async fn admins(&self, chat_id: i64) -> Result<HashSet<i64>> {
        if let Some(admins) = self.entries.read().await.get(&chat_id) {
            return Ok(admins.clone());
        }

        let admins = self.fetcher.fetch_admins(chat_id).await?;
        debug!(chat_id, count = admins.len(), "Admin set fetched");
        self.entries.write().await.insert(chat_id, admins.clone());
        Ok(admins)
    }

    pub async fn is_admin(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.admins(chat_id).await?.contains(&user_id))
    }

    /// Rebuild a chat's entry after `user_id` was promoted or demoted.
    ///
    /// The live list may not reflect the change yet, so the user is applied on
    /// top of it. A failed fetch drops the entry so the next lookup goes live.
    pub async fn rebuild(&self, chat_id: i64, user_id: i64, effect: AdminEffect) {
        match self.fetcher.fetch_admins(chat_id).await {
            Ok(mut admins) => {
                match effect {
                    AdminEffect::Promoted => admins.insert(user_id),
                    AdminEffect::Demoted => admins.remove(&user_id),
                };
                debug!(chat_id, user_id, ?effect, "Admin set rebuilt");
                self.entries.write().await.insert(chat_id, admins);
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Admin fetch failed, invalidating cache entry");
                self.invalidate(chat_id).await;
            }
        }
    }

    pub async fn invalidate(&self, chat_id: i64) {
        self.entries.write().await.remove(&chat_id);
    }

    pub async fn is_cached(&self, chat_id: i64) -> bool {
        self.entries.read().await.contains_key(&chat_id)
    }
}
