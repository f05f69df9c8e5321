//! Webhook handler tests against a scripted ingestion service

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use parking_lot::Mutex;
use pressone_api::dto::WebhookAck;
use pressone_api::{configure_webhooks, json_config};
use pressone_core::models::{DtmfEvent, HangupEvent, PaymentEvent, ReconcileOutcome};
use pressone_core::{AppError, AppResult};
use pressone_services::EventIngestion;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Dtmf(DtmfEvent),
    Hangup(HangupEvent),
    Payment(PaymentEvent),
}

/// Records every event and answers with a fixed outcome
struct ScriptedIngestion {
    seen: Mutex<Vec<Seen>>,
    answer: fn() -> AppResult<ReconcileOutcome>,
}

impl ScriptedIngestion {
    fn answering(answer: fn() -> AppResult<ReconcileOutcome>) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            answer,
        })
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl EventIngestion for ScriptedIngestion {
    async fn ingest_dtmf(&self, event: DtmfEvent) -> AppResult<ReconcileOutcome> {
        self.seen.lock().push(Seen::Dtmf(event));
        (self.answer)()
    }

    async fn ingest_hangup(&self, event: HangupEvent) -> AppResult<ReconcileOutcome> {
        self.seen.lock().push(Seen::Hangup(event));
        (self.answer)()
    }

    async fn ingest_payment(&self, event: PaymentEvent) -> AppResult<ReconcileOutcome> {
        self.seen.lock().push(Seen::Payment(event));
        (self.answer)()
    }
}

macro_rules! webhook_app {
    ($ingestion:expr) => {{
        let ingestion: Arc<dyn EventIngestion> = $ingestion.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new(ingestion))
                .app_data(json_config())
                .configure(configure_webhooks),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_hangup_is_forwarded_and_acknowledged() {
    let ingestion = ScriptedIngestion::answering(|| Ok(ReconcileOutcome::Applied));
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/hangup")
        .set_json(json!({
            "call_id": "c-45",
            "duration": 45,
            "hangup_cause": "ANSWER",
            "campaign_id": 7
        }))
        .to_request();
    let ack: WebhookAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack, WebhookAck::ok());

    assert_eq!(
        ingestion.seen(),
        vec![Seen::Hangup(HangupEvent {
            call_id: "c-45".to_string(),
            duration_seconds: 45,
            hangup_cause: "ANSWER".to_string(),
            campaign_id: Some(7),
            campaign_item_id: None,
        })]
    );
}

#[actix_web::test]
async fn test_legacy_dtmf_payload() {
    let ingestion = ScriptedIngestion::answering(|| Ok(ReconcileOutcome::Applied));
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/dtmf")
        .set_json(json!({
            "call_id": "c-1",
            "dtmf_pressed": 1,
            "hangup_cause": "NORMAL_CLEARING",
            "duration": 12
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    match &ingestion.seen()[..] {
        [Seen::Dtmf(event)] => {
            assert!(event.pressed_one());
            assert_eq!(event.duration_seconds, Some(12));
            assert_eq!(event.hangup_cause.as_deref(), Some("NORMAL_CLEARING"));
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[actix_web::test]
async fn test_duplicate_answers_ok() {
    let ingestion = ScriptedIngestion::answering(|| Ok(ReconcileOutcome::Duplicate));
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/hangup")
        .set_json(json!({"call_id": "c-1", "duration": 3, "hangup_cause": "BUSY"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"status": "ok"}));
}

#[actix_web::test]
async fn test_unknown_key_is_ignored_not_retried() {
    let ingestion = ScriptedIngestion::answering(|| Ok(ReconcileOutcome::UnknownKey));
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/dtmf")
        .set_json(json!({"call_id": "nope", "digit": "1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "unknown key");
}

#[actix_web::test]
async fn test_contradicting_payload_is_ignored_with_reason() {
    let ingestion = ScriptedIngestion::answering(|| {
        Ok(ReconcileOutcome::Rejected("campaign_id does not match".to_string()))
    });
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/hangup")
        .set_json(json!({"call_id": "c-1", "duration": 3, "hangup_cause": "ANSWER", "campaign_id": 99}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "campaign_id does not match");
}

#[actix_web::test]
async fn test_malformed_bodies_are_bad_requests() {
    let ingestion = ScriptedIngestion::answering(|| Ok(ReconcileOutcome::Applied));
    let app = webhook_app!(ingestion);

    let cases = vec![
        ("/webhooks/hangup", json!({"duration": 10, "hangup_cause": "ANSWER"})),
        ("/webhooks/hangup", json!({"call_id": "c-1", "duration": -4, "hangup_cause": "ANSWER"})),
        ("/webhooks/dtmf", json!({"call_id": "c-1"})),
        ("/webhooks/dtmf", json!({"call_id": "", "digit": "1"})),
        ("/webhooks/oxapay", json!({"status": "Paid", "amount": 20})),
    ];

    for (uri, body) in cases {
        let req = test::TestRequest::post().uri(uri).set_json(&body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{} {}", uri, body);
    }

    let req = test::TestRequest::post()
        .uri("/webhooks/hangup")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_payload");

    assert!(ingestion.seen().is_empty());
}

#[actix_web::test]
async fn test_oxapay_aliases_reach_ingestion() {
    let ingestion = ScriptedIngestion::answering(|| Ok(ReconcileOutcome::Applied));
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/oxapay")
        .set_json(json!({"trackId": "T1", "status": "Paid", "amount": "20", "txID": "0xfeed"}))
        .to_request();
    let ack: WebhookAck = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack, WebhookAck::ok());

    let req = test::TestRequest::post()
        .uri("/webhooks/oxapay")
        .set_json(json!({"orderId": "T2", "status": "Waiting"}))
        .to_request();
    test::call_service(&app, req).await;

    assert_eq!(
        ingestion.seen(),
        vec![
            Seen::Payment(PaymentEvent {
                track_id: "T1".to_string(),
                status: "Paid".to_string(),
                amount: Some(dec!(20)),
                tx_hash: Some("0xfeed".to_string()),
            }),
            Seen::Payment(PaymentEvent {
                track_id: "T2".to_string(),
                status: "Waiting".to_string(),
                amount: None,
                tx_hash: None,
            }),
        ]
    );
}

#[actix_web::test]
async fn test_persistence_failure_is_a_server_error() {
    let ingestion = ScriptedIngestion::answering(|| {
        Err(AppError::Transaction("connection reset".to_string()))
    });
    let app = webhook_app!(ingestion);

    let req = test::TestRequest::post()
        .uri("/webhooks/hangup")
        .set_json(json!({"call_id": "c-1", "duration": 10, "hangup_cause": "ANSWER"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "transaction_error");
    assert_eq!(body["status"], 500);
}
