use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Context};

use crate::{store::DEFAULT_PAID_USERS_FILE, telegram::DEFAULT_TELEGRAM_URL, toncenter::DEFAULT_TONCENTER_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Polling,
    Webhook,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub wallet_address: String,
    pub toncenter_api_key: String,
    pub toncenter_url: String,
    pub telegram_url: String,
    pub paid_users_file: PathBuf,
    pub database_url: Option<String>,
    pub font_path: Option<PathBuf>,
    pub registration_url: String,
    pub mode: UpdateMode,
    pub bind: String,
    pub webhook_secret: Option<String>,
    pub oracle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };
        let mode = match get("UPDATE_MODE").as_deref() {
            None | Some("polling") => UpdateMode::Polling,
            Some("webhook") => UpdateMode::Webhook,
            Some(other) => bail!("UPDATE_MODE must be polling or webhook, got {other}"),
        };
        let oracle_timeout = match get("ORACLE_TIMEOUT_SECS") {
            Some(raw) => raw.parse().context("ORACLE_TIMEOUT_SECS must be a whole number of seconds")?,
            None => 10,
        };
        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            wallet_address: required("TON_WALLET")?,
            toncenter_api_key: required("TONCENTER_API_KEY")?,
            toncenter_url: get("TONCENTER_URL").unwrap_or_else(|| DEFAULT_TONCENTER_URL.to_string()),
            telegram_url: get("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_TELEGRAM_URL.to_string()),
            paid_users_file: get("PAID_USERS_FILE")
                .unwrap_or_else(|| DEFAULT_PAID_USERS_FILE.to_string())
                .into(),
            database_url: get("DATABASE_URL"),
            font_path: get("FONT_PATH").map(PathBuf::from),
            registration_url: get("REGISTRATION_URL").unwrap_or_default(),
            mode,
            bind: get("BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            webhook_secret: get("WEBHOOK_SECRET"),
            oracle_timeout: Duration::from_secs(oracle_timeout),
        })
    }
}
