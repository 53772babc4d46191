use std::time::Duration;

use reqwest::StatusCode;
use tonpass_core::PaymentOracle;
use tonpass_shared::{BotError, BotResult, Transaction, TransactionsResponse};

pub const DEFAULT_TONCENTER_URL: &str = "https://toncenter.com/api/v2";

/// toncenter `getTransactions` client.
#[derive(Clone)]
pub struct ToncenterClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl ToncenterClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> BotResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::OracleTransport(e.to_string()))?;
        Ok(Self {
            base_url,
            api_key: api_key.into(),
            http,
        })
    }

    pub fn transactions_url(&self) -> String {
        format!("{}/getTransactions", self.base_url)
    }
}

pub fn parse_transactions(status: StatusCode, body: &[u8]) -> BotResult<Vec<Transaction>> {
    if !status.is_success() {
        return Err(BotError::OracleUnavailable(status.as_u16()));
    }
    let parsed: TransactionsResponse =
        serde_json::from_slice(body).map_err(|e| BotError::OracleMalformed(e.to_string()))?;
    Ok(parsed.result)
}

impl PaymentOracle for ToncenterClient {
    async fn recent_transactions(&self, address: &str, limit: u32) -> BotResult<Vec<Transaction>> {
        let limit = limit.to_string();
        let res = self
            .http
            .get(self.transactions_url())
            .query(&[
                ("address", address),
                ("limit", limit.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::OracleTransport(e.to_string()))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| BotError::OracleTransport(e.to_string()))?;
        parse_transactions(status, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_status_is_an_outage() {
        let err = parse_transactions(StatusCode::BAD_GATEWAY, b"").unwrap_err();
        assert!(matches!(err, BotError::OracleUnavailable(502)));
        assert!(err.is_oracle_outage());
    }

    #[test]
    fn malformed_body_is_not_an_outage() {
        let err = parse_transactions(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, BotError::OracleMalformed(_)));
        assert!(!err.is_oracle_outage());
    }

    #[test]
    fn transactions_come_back_in_api_order() {
        let body = br#"{"ok":true,"result":[
            {"utime":2,"in_msg":{"message":"b","source":"EQb","value":"1"}},
            {"utime":1,"in_msg":{"message":"a","source":"EQa","value":"2"}}
        ]}"#;
        let txs = parse_transactions(StatusCode::OK, body).unwrap();
        let comments: Vec<_> = txs.iter().map(|t| t.in_msg.message.as_str()).collect();
        assert_eq!(comments, vec!["b", "a"]);
    }

    #[test]
    fn url_has_no_double_slash() {
        let client = ToncenterClient::new("https://toncenter.com/api/v2/", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.transactions_url(), "https://toncenter.com/api/v2/getTransactions");
    }
}
