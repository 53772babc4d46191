use std::future::Future;

use tonpass_shared::{BotResult, Transaction};

/// How many of the wallet's most recent transactions one check looks at.
pub const TRANSACTION_LIMIT: u32 = 5;
pub const NANO_PER_TON: u64 = 1_000_000_000;
pub const MIN_PAYMENT_NANO: u64 = 3 * NANO_PER_TON;

/// Source of recent incoming transfers for a wallet.
pub trait PaymentOracle: Send + Sync {
    fn recent_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> impl Future<Output = BotResult<Vec<Transaction>>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMatch {
    pub sender: String,
    pub value_nano: u64,
}

impl PaymentMatch {
    pub fn value_ton(&self) -> f64 {
        to_ton(self.value_nano)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCheck {
    /// The user already has a paid record; the oracle was not consulted.
    AlreadyPaid,
    Matched(PaymentMatch),
    NotFound,
    Unavailable,
}

pub fn comment_token(user_id: &str) -> String {
    format!("user_{user_id}")
}

pub fn to_ton(nano: u64) -> f64 {
    nano as f64 / NANO_PER_TON as f64
}

pub fn matches_user(tx: &Transaction, token: &str) -> bool {
    tx.in_msg.message.contains(token) && tx.in_msg.value >= MIN_PAYMENT_NANO
}

/// First transaction, in the order given, paying at least the minimum with the
/// user's comment token somewhere in its message.
pub fn find_payment(user_id: &str, transactions: &[Transaction]) -> Option<PaymentMatch> {
    let token = comment_token(user_id);
    transactions
        .iter()
        .find(|tx| matches_user(tx, &token))
        .map(|tx| PaymentMatch {
            sender: tx.in_msg.source.clone(),
            value_nano: tx.in_msg.value,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonpass_shared::InMessage;

    fn tx(message: &str, source: &str, value: u64) -> Transaction {
        Transaction {
            utime: None,
            in_msg: InMessage {
                message: message.into(),
                source: source.into(),
                value,
            },
        }
    }

    #[test]
    fn exactly_three_ton_matches() {
        let txs = [tx("user_42", "EQsender", 3_000_000_000)];
        let m = find_payment("42", &txs).unwrap();
        assert_eq!(m.sender, "EQsender");
        assert_eq!(m.value_ton(), 3.0);
    }

    #[test]
    fn just_under_three_ton_does_not_match() {
        let txs = [tx("user_42", "EQsender", 2_999_999_000)];
        assert_eq!(to_ton(2_999_999_000), 2.999999);
        assert!(find_payment("42", &txs).is_none());
    }

    #[test]
    fn token_may_sit_anywhere_in_comment() {
        let txs = [
            tx("hello", "EQa", 9_000_000_000),
            tx("user_42 hello", "EQb", 3_500_000_000),
            tx("user_42", "EQc", 5_000_000_000),
        ];
        let m = find_payment("42", &txs).unwrap();
        assert_eq!(m.sender, "EQb");
    }

    #[test]
    fn other_users_comment_is_ignored() {
        let txs = [tx("user_7", "EQa", 9_000_000_000)];
        assert!(find_payment("42", &txs).is_none());
    }
}
