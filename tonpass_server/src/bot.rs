use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tonpass_core::{route, Action, Controller, FlowConfig};
use tonpass_shared::Update;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    render::{FontLocator, PngRenderer},
    store::AnyStore,
    telegram::TelegramClient,
    toncenter::ToncenterClient,
};

pub const SOMETHING_WENT_WRONG: &str = "⚠️ Something went wrong. Please try again later.";
const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub type BotController = Controller<ToncenterClient, AnyStore, PngRenderer>;

pub struct Bot {
    pub controller: BotController,
    pub telegram: TelegramClient,
    pub webhook_secret: Option<String>,
}

impl Bot {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let oracle = ToncenterClient::new(&config.toncenter_url, &config.toncenter_api_key, config.oracle_timeout)?;
        let store = AnyStore::open(config.database_url.as_deref(), &config.paid_users_file).await?;
        let renderer = PngRenderer::new(&FontLocator::new(config.font_path.clone()));
        let flow = FlowConfig {
            wallet_address: config.wallet_address.clone(),
            registration_url: config.registration_url.clone(),
        };
        if flow.registration_url.is_empty() {
            warn!("REGISTRATION_URL is not set; the post-payment link will be empty");
        }
        Ok(Self {
            controller: Controller::new(flow, oracle, store, renderer),
            telegram: TelegramClient::new(&config.telegram_url, &config.bot_token)?,
            webhook_secret: config.webhook_secret.clone(),
        })
    }
}

/// Runs one update to completion. Failures end this update only.
pub async fn process_update(bot: Arc<Bot>, update: Update) {
    let Some(incoming) = route(&update) else {
        return;
    };
    let chat_id = incoming.chat_id;
    let callback_id = match &incoming.action {
        Action::Continue { callback_id } | Action::Stop { callback_id } => Some(callback_id.clone()),
        _ => None,
    };

    match bot.controller.handle(incoming).await {
        Ok(replies) => {
            for reply in replies {
                if let Err(e) = bot.telegram.deliver(reply).await {
                    warn!(update_id = update.update_id, error = %e, "reply not delivered");
                }
            }
        }
        Err(e) => {
            error!(update_id = update.update_id, error = %e, "update failed");
            if let Err(e) = bot.telegram.send_message(chat_id, SOMETHING_WENT_WRONG, None, false).await {
                warn!(error = %e, "failure notice not delivered");
            }
            if let Some(id) = callback_id {
                let _ = bot.telegram.answer_callback(&id).await;
            }
        }
    }
}

pub async fn run_polling(bot: Arc<Bot>) -> anyhow::Result<()> {
    info!("polling for updates");
    let mut offset = 0i64;
    loop {
        let updates = tokio::select! {
            res = bot.telegram.get_updates(offset) => res,
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, exiting");
                return Ok(());
            }
        };
        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    tokio::spawn(process_update(bot.clone(), update));
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}

pub fn secret_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    match expected {
        None => true,
        Some(secret) => headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == secret),
    }
}

async fn route_webhook(State(bot): State<Arc<Bot>>, headers: HeaderMap, Json(update): Json<Update>) -> StatusCode {
    if !secret_matches(bot.webhook_secret.as_deref(), &headers) {
        return StatusCode::UNAUTHORIZED;
    }
    tokio::spawn(process_update(bot, update));
    StatusCode::OK
}

async fn route_health() -> &'static str {
    "ok"
}

pub fn webhook_router(bot: Arc<Bot>) -> Router {
    Router::new()
        .route("/telegram/webhook", post(route_webhook))
        .route("/healthz", get(route_health))
        .with_state(bot)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_webhook(bot: Arc<Bot>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, webhook_router(bot))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
