use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Coefficient draws allowed per successful payment.
pub const MAX_COEFFICIENTS: usize = 25;

/// Process-lifetime state of one user. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSession {
    pub issued: Vec<f64>,
    pub casino_id: Option<String>,
}

impl UserSession {
    pub fn quota_exhausted(&self) -> bool {
        self.issued.len() >= MAX_COEFFICIENTS
    }

    pub fn remaining(&self) -> usize {
        MAX_COEFFICIENTS.saturating_sub(self.issued.len())
    }

    /// Appends a coefficient unless the quota is used up.
    pub fn issue(&mut self, coefficient: f64) -> bool {
        if self.quota_exhausted() {
            return false;
        }
        self.issued.push(coefficient);
        true
    }

    /// Forget everything tied to the current paid period.
    pub fn begin_period(&mut self) {
        self.issued.clear();
        self.casino_id = None;
    }
}

/// Per-user sessions. Holding the guard returned by [`Sessions::lock`]
/// serializes every update of that user; other users are not blocked.
#[derive(Default)]
pub struct Sessions {
    users: Mutex<HashMap<String, Arc<Mutex<UserSession>>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<UserSession> {
        let entry = {
            let mut users = self.users.lock().await;
            users.entry(user_id.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }

    pub async fn snapshot(&self, user_id: &str) -> Option<UserSession> {
        let entry = self.users.lock().await.get(user_id).cloned()?;
        let session = entry.lock().await;
        Some(session.clone())
    }
}
