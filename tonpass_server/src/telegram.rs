use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tonpass_core::Reply;
use tonpass_shared::{BotError, BotResult, InlineKeyboardMarkup, TelegramResponse, Update};

pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";
pub const LONG_POLL_SECS: u64 = 30;

fn transport_err(e: impl std::fmt::Display) -> BotError {
    BotError::Transport(e.to_string())
}

/// Thin Bot API client: long polling plus the three outbound calls the flow
/// needs.
#[derive(Clone)]
pub struct TelegramClient {
    base_url: String,
    http: reqwest::Client,
}

pub fn message_body(chat_id: i64, text: &str, keyboard: Option<&InlineKeyboardMarkup>, disable_preview: bool) -> Value {
    let mut body = json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "HTML",
    });
    if disable_preview {
        body["link_preview_options"] = json!({ "is_disabled": true });
    }
    if let Some(keyboard) = keyboard {
        body["reply_markup"] = json!(keyboard);
    }
    body
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> BotResult<Self> {
        let base_url = format!("{}/bot{}", api_url.trim_end_matches('/'), token);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 15))
            .build()
            .map_err(transport_err)?;
        Ok(Self { base_url, http })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn decode<T: serde::de::DeserializeOwned + Default>(res: reqwest::Response, method: &str) -> BotResult<T> {
        let parsed: TelegramResponse<T> = res.json().await.map_err(transport_err)?;
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Transport(format!(
                "{method} rejected: {}",
                parsed.description.unwrap_or_else(|| "no description".into())
            ))),
        }
    }

    async fn call(&self, method: &str, body: &Value) -> BotResult<Value> {
        let res = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(transport_err)?;
        Self::decode(res, method).await
    }

    pub async fn get_updates(&self, offset: i64) -> BotResult<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": LONG_POLL_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        let res = self
            .http
            .post(self.method_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .map_err(transport_err)?;
        Self::decode(res, "getUpdates").await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        disable_preview: bool,
    ) -> BotResult<()> {
        self.call("sendMessage", &message_body(chat_id, text, keyboard, disable_preview))
            .await
            .map(drop)
    }

    /// Uploads the PNG straight from memory; nothing touches the disk.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        png: Vec<u8>,
        caption: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> BotResult<()> {
        let photo = Part::bytes(png)
            .file_name(format!("coefficient_{chat_id}.png"))
            .mime_str("image/png")
            .map_err(transport_err)?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("photo", photo);
        if let Some(keyboard) = keyboard {
            form = form.text("reply_markup", serde_json::to_string(keyboard).map_err(transport_err)?);
        }
        let res = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_err)?;
        Self::decode::<Value>(res, "sendPhoto").await.map(drop)
    }

    pub async fn answer_callback(&self, callback_id: &str) -> BotResult<()> {
        self.call("answerCallbackQuery", &json!({ "callback_query_id": callback_id }))
            .await
            .map(drop)
    }

    pub async fn deliver(&self, reply: Reply) -> BotResult<()> {
        match reply {
            Reply::Text {
                chat_id,
                text,
                keyboard,
                disable_preview,
            } => self.send_message(chat_id, &text, keyboard.as_ref(), disable_preview).await,
            Reply::Photo {
                chat_id,
                png,
                caption,
                keyboard,
            } => self.send_photo(chat_id, png, &caption, keyboard.as_ref()).await,
            Reply::AnswerCallback { callback_id } => self.answer_callback(&callback_id).await,
        }
    }
}
