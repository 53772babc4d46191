use std::sync::Arc;

use anyhow::Context;
use tonpass_server::{
    bot::{run_polling, run_webhook, Bot},
    config::{Config, UpdateMode},
    init_tracing,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env().context("reading configuration")?;
    let bot = Arc::new(Bot::from_config(&config).await.context("starting bot")?);

    info!(wallet = %config.wallet_address, mode = ?config.mode, "tonpass starting");
    match config.mode {
        UpdateMode::Polling => run_polling(bot).await,
        UpdateMode::Webhook => run_webhook(bot, &config.bind).await,
    }
}
