use std::{collections::BTreeMap, future::Future};

use tokio::sync::Mutex;
use tonpass_shared::BotResult;

/// user id -> address that sent the qualifying payment
pub type PaidUsers = BTreeMap<String, String>;

/// Whole-document persistence of the paid-user map.
pub trait PaidUserStore: Send + Sync {
    /// An absent backing document reads as an empty map.
    fn load(&self) -> impl Future<Output = BotResult<PaidUsers>> + Send;

    fn save(&self, users: &PaidUsers) -> impl Future<Output = BotResult<()>> + Send;
}

/// Volatile store, handy for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<PaidUsers>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: PaidUsers) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }
}

impl PaidUserStore for MemoryStore {
    async fn load(&self) -> BotResult<PaidUsers> {
        Ok(self.users.lock().await.clone())
    }

    async fn save(&self, users: &PaidUsers) -> BotResult<()> {
        *self.users.lock().await = users.clone();
        Ok(())
    }
}

/// Serializes every load/mutate/save cycle over a [`PaidUserStore`] so two
/// updates can never overwrite each other's changes.
pub struct PaidUsersLedger<S> {
    store: S,
    gate: Mutex<()>,
}

impl<S: PaidUserStore> PaidUsersLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn all(&self) -> BotResult<PaidUsers> {
        let _gate = self.gate.lock().await;
        self.store.load().await
    }

    pub async fn contains(&self, user_id: &str) -> BotResult<bool> {
        Ok(self.sender(user_id).await?.is_some())
    }

    pub async fn sender(&self, user_id: &str) -> BotResult<Option<String>> {
        let _gate = self.gate.lock().await;
        Ok(self.store.load().await?.get(user_id).cloned())
    }

    pub async fn mark_paid(&self, user_id: &str, sender: &str) -> BotResult<()> {
        let _gate = self.gate.lock().await;
        let mut users = self.store.load().await?;
        users.insert(user_id.to_string(), sender.to_string());
        self.store.save(&users).await
    }

    /// Removes the user's paid record. Returns whether one existed.
    pub async fn evict(&self, user_id: &str) -> BotResult<bool> {
        let _gate = self.gate.lock().await;
        let mut users = self.store.load().await?;
        let existed = users.remove(user_id).is_some();
        if existed {
            self.store.save(&users).await?;
        }
        Ok(existed)
    }
}
