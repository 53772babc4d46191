use std::sync::Mutex;

use rand::{rngs::StdRng, SeedableRng};
use tonpass_shared::{BotResult, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{debug, info, warn};

use crate::{
    coefficient::{coefficient_label, draw_coefficient, CoefficientRenderer},
    command::{Action, Incoming, CONTINUE, STOP},
    ledger::{PaidUserStore, PaidUsersLedger},
    payment::{comment_token, find_payment, to_ton, PaymentCheck, PaymentOracle, TRANSACTION_LIMIT},
    session::{Sessions, UserSession},
};

#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Wallet the users pay into.
    pub wallet_address: String,
    /// Registration page shown once a payment is confirmed.
    pub registration_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
        disable_preview: bool,
    },
    Photo {
        chat_id: i64,
        png: Vec<u8>,
        caption: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    AnswerCallback {
        callback_id: String,
    },
}

impl Reply {
    fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Reply::Text {
            chat_id,
            text: text.into(),
            keyboard: None,
            disable_preview: false,
        }
    }
}

pub fn next_stop_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton {
                text: "🟢 Next".into(),
                callback_data: CONTINUE.into(),
            }],
            vec![InlineKeyboardButton {
                text: "🔴 Stop".into(),
                callback_data: STOP.into(),
            }],
        ],
    }
}

pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub const PAYMENT_NOT_FOUND: &str = "❌ Payment not found. Please make sure the comment is correct and the amount is <b>at least 3 TON</b>. Try /check again in 1-2 minutes.";
pub const ORACLE_UNAVAILABLE: &str = "❌ TonCenter API did not respond. Try /check again in 1-2 minutes.";
pub const PAYMENT_REQUIRED: &str = "❌ You need to make a payment first. Use /start to begin.";
pub const LIMIT_ENDED_ON_CHECK: &str = "🔄 Your limit has ended. Please make another payment to continue.";
pub const LIMIT_ENDED: &str =
    "✅ Your limit has ended. Please make another payment to continue.\nUse /start to begin again.";
pub const ID_REQUIRED: &str = "🆔 Send your account ID first.";
pub const STOPPED: &str = "⛔ Game stopped. Use /start to play again.";

/// Drives one user's path: pay, confirm, bind an account ID, draw
/// coefficients until the quota runs out.
pub struct Controller<O, S, R> {
    config: FlowConfig,
    oracle: O,
    ledger: PaidUsersLedger<S>,
    renderer: R,
    sessions: Sessions,
    rng: Mutex<StdRng>,
}

impl<O, S, R> Controller<O, S, R>
where
    O: PaymentOracle,
    S: PaidUserStore,
    R: CoefficientRenderer,
{
    pub fn new(config: FlowConfig, oracle: O, store: S, renderer: R) -> Self {
        Self::with_rng(config, oracle, store, renderer, StdRng::from_os_rng())
    }

    pub fn with_rng(config: FlowConfig, oracle: O, store: S, renderer: R, rng: StdRng) -> Self {
        Self {
            config,
            oracle,
            ledger: PaidUsersLedger::new(store),
            renderer,
            sessions: Sessions::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn ledger(&self) -> &PaidUsersLedger<S> {
        &self.ledger
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub async fn handle(&self, incoming: Incoming) -> BotResult<Vec<Reply>> {
        let Incoming {
            user_id,
            chat_id,
            action,
        } = incoming;
        let mut session = self.sessions.lock(&user_id).await;
        match action {
            Action::Start { full_name } => Ok(self.on_start(&user_id, chat_id, &full_name, &mut session)),
            Action::Check => self.on_check(&user_id, chat_id, &mut session).await,
            Action::CasinoId(casino_id) => self.on_casino_id(&user_id, chat_id, casino_id, &mut session).await,
            Action::Continue { callback_id } => {
                let mut replies = self.on_continue(&user_id, chat_id, &mut session).await?;
                replies.push(Reply::AnswerCallback { callback_id });
                Ok(replies)
            }
            Action::Stop { callback_id } => {
                session.casino_id = None;
                info!(user_id = %user_id, "session stopped");
                Ok(vec![Reply::text(chat_id, STOPPED), Reply::AnswerCallback { callback_id }])
            }
        }
    }

    fn on_start(&self, user_id: &str, chat_id: i64, full_name: &str, session: &mut UserSession) -> Vec<Reply> {
        session.issued.clear();
        let text = format!(
            "👋 Hello, {}!\n\n\
             💸 To unlock coefficient draws, please pay at least <b>3 TON</b>.\n\n\
             📥 TON Wallet Address:\n<code>{}</code>\n\n\
             📝 Comment (required):\n<code>{}</code>\n\n\
             ✅ After payment, type /check to continue.",
            escape_html(full_name),
            escape_html(&self.config.wallet_address),
            comment_token(user_id),
        );
        vec![Reply::Text {
            chat_id,
            text,
            keyboard: None,
            disable_preview: true,
        }]
    }

    /// Consults the paid-user ledger and, only if the user is not yet paid,
    /// the oracle. A match opens a new paid period.
    pub async fn check_payment(&self, user_id: &str, session: &mut UserSession) -> BotResult<PaymentCheck> {
        if self.ledger.contains(user_id).await? {
            return Ok(PaymentCheck::AlreadyPaid);
        }
        let transactions = match self
            .oracle
            .recent_transactions(&self.config.wallet_address, TRANSACTION_LIMIT)
            .await
        {
            Ok(txs) => txs,
            Err(e) if e.is_oracle_outage() => {
                warn!(user_id, error = %e, "payment oracle unavailable");
                return Ok(PaymentCheck::Unavailable);
            }
            Err(e) => return Err(e),
        };
        for tx in &transactions {
            debug!(
                comment = %tx.in_msg.message,
                sender = %tx.in_msg.source,
                value = to_ton(tx.in_msg.value),
                "scanned transaction"
            );
        }
        match find_payment(user_id, &transactions) {
            Some(found) => {
                self.ledger.mark_paid(user_id, &found.sender).await?;
                session.begin_period();
                info!(user_id, sender = %found.sender, value = found.value_ton(), "payment matched");
                Ok(PaymentCheck::Matched(found))
            }
            None => Ok(PaymentCheck::NotFound),
        }
    }

    async fn on_check(&self, user_id: &str, chat_id: i64, session: &mut UserSession) -> BotResult<Vec<Reply>> {
        let reply = match self.check_payment(user_id, session).await? {
            PaymentCheck::AlreadyPaid if session.quota_exhausted() => {
                self.end_period(user_id, session).await?;
                Reply::text(chat_id, LIMIT_ENDED_ON_CHECK)
            }
            PaymentCheck::AlreadyPaid | PaymentCheck::Matched(_) => self.ask_for_id(chat_id),
            PaymentCheck::NotFound => Reply::text(chat_id, PAYMENT_NOT_FOUND),
            PaymentCheck::Unavailable => Reply::text(chat_id, ORACLE_UNAVAILABLE),
        };
        Ok(vec![reply])
    }

    fn ask_for_id(&self, chat_id: i64) -> Reply {
        Reply::Text {
            chat_id,
            text: format!(
                "✅ Payment received successfully!\n\n\
                 🔗 <b><a href=\"{}\">Register here</a></b>\n\n\
                 🆔 After registering, send your account ID here.",
                escape_html(&self.config.registration_url)
            ),
            keyboard: None,
            disable_preview: true,
        }
    }

    async fn on_casino_id(
        &self,
        user_id: &str,
        chat_id: i64,
        casino_id: String,
        session: &mut UserSession,
    ) -> BotResult<Vec<Reply>> {
        if !self.ledger.contains(user_id).await? {
            return Ok(vec![Reply::text(chat_id, PAYMENT_REQUIRED)]);
        }
        let text = format!(
            "✅ ID received: <code>{casino_id}</code>\n\n🎮 You can now start receiving coefficients."
        );
        info!(user_id, casino_id = %casino_id, "account id bound");
        session.casino_id = Some(casino_id);
        Ok(vec![Reply::Text {
            chat_id,
            text,
            keyboard: Some(next_stop_keyboard()),
            disable_preview: false,
        }])
    }

    async fn on_continue(&self, user_id: &str, chat_id: i64, session: &mut UserSession) -> BotResult<Vec<Reply>> {
        if session.quota_exhausted() {
            self.end_period(user_id, session).await?;
            return Ok(vec![Reply::text(chat_id, LIMIT_ENDED)]);
        }
        if !self.ledger.contains(user_id).await? {
            return Ok(vec![Reply::text(chat_id, PAYMENT_REQUIRED)]);
        }
        if session.casino_id.is_none() {
            return Ok(vec![Reply::text(chat_id, ID_REQUIRED)]);
        }

        let coefficient = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            draw_coefficient(&mut *rng)
        };
        let png = self.renderer.render(coefficient)?;
        session.issue(coefficient);
        debug!(user_id, coefficient, remaining = session.remaining(), "coefficient issued");
        Ok(vec![Reply::Photo {
            chat_id,
            png,
            caption: format!(
                "🎲 Coefficient: <b>{}</b>\n<i>Random draw, not a prediction.</i>",
                coefficient_label(coefficient)
            ),
            keyboard: Some(next_stop_keyboard()),
        }])
    }

    async fn end_period(&self, user_id: &str, session: &mut UserSession) -> BotResult<()> {
        self.ledger.evict(user_id).await?;
        session.casino_id = None;
        info!(user_id, "quota exhausted, paid record evicted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
    }

    #[test]
    fn keyboard_carries_both_buttons() {
        let kb = next_stop_keyboard();
        let data: Vec<_> = kb.inline_keyboard.iter().flatten().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(data, vec![CONTINUE, STOP]);
    }
}
