use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tonpass_core::{PaidUserStore, PaidUsers};
use tonpass_shared::{BotError, BotResult};

pub const DEFAULT_PAID_USERS_FILE: &str = "paid_users.json";

fn store_err(e: impl std::fmt::Display) -> BotError {
    BotError::Store(e.to_string())
}

/// Flat JSON document `{"<user id>": "<sender address>"}`, read and rewritten
/// whole on every call.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PaidUserStore for JsonFileStore {
    async fn load(&self) -> BotResult<PaidUsers> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PaidUsers::new()),
            Err(e) => return Err(store_err(format!("read {}: {e}", self.path.display()))),
        };
        serde_json::from_slice(&bytes).map_err(|e| store_err(format!("parse {}: {e}", self.path.display())))
    }

    async fn save(&self, users: &PaidUsers) -> BotResult<()> {
        let bytes = serde_json::to_vec(users).map_err(store_err)?;
        // write next to the target then rename, so readers never see half a file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| store_err(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| store_err(format!("replace {}: {e}", self.path.display())))
    }
}

/// Same document kept in a SQLite table.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let db = SqlitePoolOptions::new().max_connections(5).connect(url).await?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: SqlitePool) -> anyhow::Result<Self> {
        sqlx::migrate!("./migrations").run(&db).await?;
        Ok(Self { db })
    }
}

impl PaidUserStore for SqliteStore {
    async fn load(&self) -> BotResult<PaidUsers> {
        let rows = sqlx::query("SELECT user_id, sender FROM paid_users")
            .fetch_all(&self.db)
            .await
            .map_err(store_err)?;
        let mut users = PaidUsers::new();
        for row in rows {
            let user_id: String = row.try_get("user_id").map_err(store_err)?;
            let sender: String = row.try_get("sender").map_err(store_err)?;
            users.insert(user_id, sender);
        }
        Ok(users)
    }

    async fn save(&self, users: &PaidUsers) -> BotResult<()> {
        let mut tx = self.db.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM paid_users")
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        for (user_id, sender) in users {
            sqlx::query("INSERT INTO paid_users (user_id, sender) VALUES (?, ?)")
                .bind(user_id)
                .bind(sender)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)
    }
}

/// Backend picked from configuration at startup.
#[derive(Clone)]
pub enum AnyStore {
    Json(JsonFileStore),
    Sqlite(SqliteStore),
}

impl AnyStore {
    pub async fn open(database_url: Option<&str>, file: &Path) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => {
                tracing::info!("paid users kept in sqlite at {url}");
                Ok(AnyStore::Sqlite(SqliteStore::connect(url).await?))
            }
            None => {
                tracing::info!("paid users kept in {}", file.display());
                Ok(AnyStore::Json(JsonFileStore::new(file)))
            }
        }
    }
}

impl PaidUserStore for AnyStore {
    async fn load(&self) -> BotResult<PaidUsers> {
        match self {
            AnyStore::Json(s) => s.load().await,
            AnyStore::Sqlite(s) => s.load().await,
        }
    }

    async fn save(&self, users: &PaidUsers) -> BotResult<()> {
        match self {
            AnyStore::Json(s) => s.save(users).await,
            AnyStore::Sqlite(s) => s.save(users).await,
        }
    }
}
