use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use rand::{rngs::StdRng, SeedableRng};
use tonpass_core::{
    flow::{LIMIT_ENDED, LIMIT_ENDED_ON_CHECK, ORACLE_UNAVAILABLE, PAYMENT_NOT_FOUND, PAYMENT_REQUIRED, STOPPED},
    Action, CoefficientRenderer, Controller, FlowConfig, Incoming, MemoryStore, PaymentOracle, Reply, MAX_COEFFICIENTS,
};
use tonpass_shared::{BotError, BotResult, InMessage, Transaction};

#[derive(Default)]
struct FakeOracle {
    // None answers like an oracle returning a 502
    feed: Mutex<Option<Vec<Transaction>>>,
    calls: AtomicUsize,
}

impl FakeOracle {
    fn set(&self, feed: Option<Vec<Transaction>>) {
        *self.feed.lock().unwrap() = feed;
    }
}

impl PaymentOracle for FakeOracle {
    async fn recent_transactions(&self, address: &str, limit: u32) -> BotResult<Vec<Transaction>> {
        assert_eq!(address, "EQwallet");
        assert_eq!(limit, 5);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.feed.lock().unwrap().clone().ok_or(BotError::OracleUnavailable(502))
    }
}

struct FakeRenderer;

impl CoefficientRenderer for FakeRenderer {
    fn render(&self, coefficient: f64) -> BotResult<Vec<u8>> {
        Ok(format!("png:{coefficient:.2}").into_bytes())
    }
}

type TestController = Controller<FakeOracle, MemoryStore, FakeRenderer>;

fn controller() -> TestController {
    let config = FlowConfig {
        wallet_address: "EQwallet".into(),
        registration_url: "https://example.org/register".into(),
    };
    Controller::with_rng(
        config,
        FakeOracle::default(),
        MemoryStore::new(),
        FakeRenderer,
        StdRng::seed_from_u64(42),
    )
}

fn tx(message: &str, value: u64) -> Transaction {
    Transaction {
        utime: None,
        in_msg: InMessage {
            message: message.into(),
            source: "EQpayer".into(),
            value,
        },
    }
}

fn incoming(user: &str, action: Action) -> Incoming {
    Incoming {
        user_id: user.into(),
        chat_id: 1000,
        action,
    }
}

fn press_continue(user: &str) -> Incoming {
    incoming(
        user,
        Action::Continue {
            callback_id: "cb".into(),
        },
    )
}

fn first_text(replies: &[Reply]) -> &str {
    match &replies[0] {
        Reply::Text { text, .. } => text,
        other => panic!("expected text reply, got {other:?}"),
    }
}

async fn pay_and_bind(c: &TestController, user: &str) {
    c.oracle().set(Some(vec![tx(&format!("user_{user} hello"), 3_500_000_000)]));
    c.handle(incoming(user, Action::Check)).await.unwrap();
    c.handle(incoming(user, Action::CasinoId("99887766".into()))).await.unwrap();
}

#[tokio::test]
async fn full_paid_period() {
    let c = controller();

    let replies = c
        .handle(incoming(
            "42",
            Action::Start {
                full_name: "Ann".into(),
            },
        ))
        .await
        .unwrap();
    let text = first_text(&replies);
    assert!(text.contains("<code>EQwallet</code>"));
    assert!(text.contains("<code>user_42</code>"));

    // nothing on chain yet
    c.oracle().set(Some(vec![]));
    let replies = c.handle(incoming("42", Action::Check)).await.unwrap();
    assert_eq!(first_text(&replies), PAYMENT_NOT_FOUND);
    assert!(c.ledger().all().await.unwrap().is_empty());

    c.oracle().set(Some(vec![tx("user_42 hello", 3_500_000_000)]));
    let replies = c.handle(incoming("42", Action::Check)).await.unwrap();
    assert!(first_text(&replies).contains("send your account ID"));
    assert_eq!(c.ledger().sender("42").await.unwrap().as_deref(), Some("EQpayer"));

    let replies = c
        .handle(incoming("42", Action::CasinoId("99887766".into())))
        .await
        .unwrap();
    match &replies[0] {
        Reply::Text { text, keyboard, .. } => {
            assert!(text.contains("<code>99887766</code>"));
            assert_eq!(keyboard.as_ref().unwrap().inline_keyboard.len(), 2);
        }
        other => panic!("unexpected {other:?}"),
    }

    for _ in 0..MAX_COEFFICIENTS {
        let replies = c.handle(press_continue("42")).await.unwrap();
        assert!(matches!(&replies[0], Reply::Photo { keyboard: Some(_), .. }));
        assert!(matches!(&replies[1], Reply::AnswerCallback { .. }));
    }
    let session = c.sessions().snapshot("42").await.unwrap();
    assert_eq!(session.issued.len(), MAX_COEFFICIENTS);
    for value in &session.issued {
        assert!((1.0..=11.0).contains(value));
        assert_eq!(format!("{value:.2}").parse::<f64>().unwrap(), *value);
    }

    // 26th press evicts instead of drawing
    let replies = c.handle(press_continue("42")).await.unwrap();
    assert_eq!(first_text(&replies), LIMIT_ENDED);
    assert!(!c.ledger().contains("42").await.unwrap());
    assert_eq!(
        c.sessions().snapshot("42").await.unwrap().issued.len(),
        MAX_COEFFICIENTS
    );
}

#[tokio::test]
async fn photo_caption_shows_two_decimals() {
    let c = controller();
    pay_and_bind(&c, "42").await;
    let replies = c.handle(press_continue("42")).await.unwrap();
    let Reply::Photo { png, caption, .. } = &replies[0] else {
        panic!("expected a photo");
    };
    let issued = c.sessions().snapshot("42").await.unwrap().issued[0];
    assert_eq!(png, &format!("png:{issued:.2}").into_bytes());
    assert!(caption.contains(&format!("<b>{issued:.2}x</b>")));
    assert!(caption.contains("not a prediction"));
}

#[tokio::test]
async fn check_for_paid_user_skips_oracle() {
    let c = controller();
    pay_and_bind(&c, "42").await;
    assert_eq!(c.oracle().calls.load(Ordering::SeqCst), 1);

    c.oracle().set(None);
    let replies = c.handle(incoming("42", Action::Check)).await.unwrap();
    assert!(first_text(&replies).contains("send your account ID"));
    assert_eq!(c.oracle().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn check_after_exhausted_quota_evicts() {
    let c = controller();
    pay_and_bind(&c, "42").await;
    for _ in 0..MAX_COEFFICIENTS {
        c.handle(press_continue("42")).await.unwrap();
    }
    let replies = c.handle(incoming("42", Action::Check)).await.unwrap();
    assert_eq!(first_text(&replies), LIMIT_ENDED_ON_CHECK);
    assert!(!c.ledger().contains("42").await.unwrap());
}

#[tokio::test]
async fn new_payment_opens_a_fresh_period() {
    let c = controller();
    pay_and_bind(&c, "42").await;
    for _ in 0..=MAX_COEFFICIENTS {
        c.handle(press_continue("42")).await.unwrap();
    }
    assert!(!c.ledger().contains("42").await.unwrap());

    pay_and_bind(&c, "42").await;
    let session = c.sessions().snapshot("42").await.unwrap();
    assert!(session.issued.is_empty());
    assert_eq!(session.casino_id.as_deref(), Some("99887766"));
    let replies = c.handle(press_continue("42")).await.unwrap();
    assert!(matches!(&replies[0], Reply::Photo { .. }));
}

#[tokio::test]
async fn oracle_outage_is_reported_and_changes_nothing() {
    let c = controller();
    c.oracle().set(None);
    let replies = c.handle(incoming("42", Action::Check)).await.unwrap();
    assert_eq!(first_text(&replies), ORACLE_UNAVAILABLE);
    assert!(c.ledger().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn underpayment_and_foreign_comment_do_not_match() {
    let c = controller();
    c.oracle().set(Some(vec![tx("user_42", 2_999_999_000), tx("user_7", 9_000_000_000)]));
    let replies = c.handle(incoming("42", Action::Check)).await.unwrap();
    assert_eq!(first_text(&replies), PAYMENT_NOT_FOUND);
}

#[tokio::test]
async fn id_needs_payment_first() {
    let c = controller();
    let replies = c
        .handle(incoming("42", Action::CasinoId("1234".into())))
        .await
        .unwrap();
    assert_eq!(first_text(&replies), PAYMENT_REQUIRED);
    assert_eq!(c.sessions().snapshot("42").await.unwrap().casino_id, None);

    let replies = c.handle(press_continue("42")).await.unwrap();
    assert_eq!(first_text(&replies), PAYMENT_REQUIRED);
}

#[tokio::test]
async fn stop_ends_session_but_keeps_quota() {
    let c = controller();
    pay_and_bind(&c, "42").await;
    c.handle(press_continue("42")).await.unwrap();

    let replies = c
        .handle(incoming(
            "42",
            Action::Stop {
                callback_id: "cb".into(),
            },
        ))
        .await
        .unwrap();
    assert_eq!(first_text(&replies), STOPPED);

    let replies = c.handle(press_continue("42")).await.unwrap();
    assert!(first_text(&replies).contains("account ID"));

    // resume: /check short-circuits, then the id is sent again
    c.handle(incoming("42", Action::Check)).await.unwrap();
    c.handle(incoming("42", Action::CasinoId("99887766".into()))).await.unwrap();
    c.handle(press_continue("42")).await.unwrap();
    assert_eq!(c.sessions().snapshot("42").await.unwrap().issued.len(), 2);
    assert!(c.ledger().contains("42").await.unwrap());
}

#[tokio::test]
async fn start_resets_quota_but_not_paid_status() {
    let c = controller();
    pay_and_bind(&c, "42").await;
    c.handle(press_continue("42")).await.unwrap();
    c.handle(incoming(
        "42",
        Action::Start {
            full_name: "<Ann>".into(),
        },
    ))
    .await
    .unwrap();
    let session = c.sessions().snapshot("42").await.unwrap();
    assert!(session.issued.is_empty());
    assert!(c.ledger().contains("42").await.unwrap());
}
