use serde::{Deserialize, Deserializer, Serialize};

// toncenter v2 getTransactions payload (only the fields the bot reads)

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TransactionsResponse {
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub result: Vec<Transaction>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transaction {
    #[serde(default)]
    pub utime: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub in_msg: InMessage,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct InMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    /// Amount in nanotons. toncenter sends it as a decimal string.
    #[serde(default, deserialize_with = "nano_value")]
    pub value: u64,
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

fn nano_value<'de, D>(de: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
        Null,
    }

    match Raw::deserialize(de)? {
        Raw::Int(v) => Ok(v),
        Raw::Str(s) if s.trim().is_empty() => Ok(0),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Raw::Null => Ok(0),
    }
}

// Telegram Bot API subset

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("payment oracle answered with status {0}")]
    OracleUnavailable(u16),
    #[error("payment oracle request failed: {0}")]
    OracleTransport(String),
    #[error("payment oracle payload is malformed: {0}")]
    OracleMalformed(String),
    #[error("paid-user store failure: {0}")]
    Store(String),
    #[error("coefficient rendering failed: {0}")]
    Render(String),
    #[error("chat transport failure: {0}")]
    Transport(String),
}

impl BotError {
    /// Failures the user can recover from by issuing /check again.
    pub fn is_oracle_outage(&self) -> bool {
        matches!(self, BotError::OracleUnavailable(_) | BotError::OracleTransport(_))
    }
}

pub type BotResult<T> = Result<T, BotError>;
