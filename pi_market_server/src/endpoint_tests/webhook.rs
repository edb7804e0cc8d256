use actix_web::{http::StatusCode, test, web, App};
use pi_market_engine::{
    db_types::PiPaymentStatus,
    events::EventProducers,
    traits::{CompletionOutcome, FulfilmentOutcome},
    PaymentFlowApi,
};
use pi_network_tools::{PiNetworkApi, PiNetworkConfig};
use pmg_common::Secret;

use crate::{
    endpoint_tests::mocks::{order, payment_record, MockPaymentDb},
    helpers::{calculate_signature, SIGNATURE_HEADER},
    middleware::HmacSignatureFactory,
    webhook_routes::pi_payment_webhook,
};

const WEBHOOK_SECRET: &str = "whsec-test";

/// A Pi client in mock mode: the webhook handler's best-effort network fetch is a logged no-op.
fn mock_pi() -> PiNetworkApi {
    PiNetworkApi::new(PiNetworkConfig::default()).unwrap()
}

async fn call_webhook(
    db: MockPaymentDb,
    secret: &str,
    body: &'static str,
    signature: Option<String>,
) -> StatusCode {
    let api = PaymentFlowApi::new(db, EventProducers::default());
    let app = test::init_service(
        App::new().app_data(web::Data::new(api)).app_data(web::Data::new(mock_pi())).service(
            web::resource("/pi/payments")
                .wrap(HmacSignatureFactory::new(Secret::new(secret.to_string())))
                .route(web::post().to(pi_payment_webhook::<MockPaymentDb>)),
        ),
    )
    .await;
    let mut req = test::TestRequest::post().uri("/pi/payments").set_payload(body);
    if let Some(sig) = signature {
        req = req.insert_header((SIGNATURE_HEADER, sig));
    }
    // The HMAC middleware rejects bad requests by returning an `Err(actix_web::Error)`, which the
    // real server pipeline renders into an HTTP response. `test::call_service` panics on that `Err`
    // instead of rendering it, so use `try_call_service` and read the status from either branch.
    match test::try_call_service(&app, req.to_request()).await {
        Ok(resp) => resp.status(),
        Err(e) => e.as_response_error().status_code(),
    }
}

#[actix_web::test]
async fn a_valid_delivery_completes_the_payment() {
    let mut db = MockPaymentDb::new();
    db.expect_mark_payment_completed()
        .withf(|id, txid| id.as_str() == "pay-1" && txid == "tx-1")
        .times(1)
        .returning(|id, txid| {
            let mut record = payment_record(id.as_str(), PiPaymentStatus::Completed);
            record.txid = Some(txid.to_string());
            Ok(CompletionOutcome::Completed(record))
        });
    db.expect_fulfil_payment()
        .times(1)
        .returning(|p| Ok(FulfilmentOutcome::Created(order("ord-1", p.payment_id.as_str()))));
    let body = r#"{"paymentId":"pay-1","txid":"tx-1"}"#;
    let signature = calculate_signature(WEBHOOK_SECRET, body.as_bytes());
    let status = call_webhook(db, WEBHOOK_SECRET, body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn an_invalid_signature_is_rejected_without_touching_the_database() {
    // No expectations are set: any call on the mock panics, so a 401 here proves the handler
    // never ran and no payment record was touched.
    let db = MockPaymentDb::new();
    let body = r#"{"paymentId":"pay-1","txid":"tx-1"}"#;
    let forged = calculate_signature("the-wrong-secret", body.as_bytes());
    let status = call_webhook(db, WEBHOOK_SECRET, body, Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn a_missing_signature_is_rejected() {
    let db = MockPaymentDb::new();
    let body = r#"{"paymentId":"pay-1"}"#;
    let status = call_webhook(db, WEBHOOK_SECRET, body, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn a_missing_payment_id_is_a_bad_request() {
    let db = MockPaymentDb::new();
    let body = r#"{"txid":"tx-9"}"#;
    let signature = calculate_signature(WEBHOOK_SECRET, body.as_bytes());
    let status = call_webhook(db, WEBHOOK_SECRET, body, Some(signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn a_duplicate_delivery_is_a_200_no_op() {
    let mut db = MockPaymentDb::new();
    db.expect_mark_payment_completed()
        .times(1)
        .returning(|id, _| Ok(CompletionOutcome::AlreadyCompleted(payment_record(id.as_str(), PiPaymentStatus::Completed))));
    db.expect_fulfil_payment()
        .times(1)
        .returning(|p| Ok(FulfilmentOutcome::AlreadyFulfilled(order("ord-1", p.payment_id.as_str()))));
    let body = r#"{"paymentId":"pay-1","txid":"tx-1"}"#;
    let signature = calculate_signature(WEBHOOK_SECRET, body.as_bytes());
    let status = call_webhook(db, WEBHOOK_SECRET, body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn development_mode_bypasses_the_signature_check() {
    let mut db = MockPaymentDb::new();
    db.expect_mark_payment_completed()
        .times(1)
        .returning(|id, _| Ok(CompletionOutcome::AlreadyCompleted(payment_record(id.as_str(), PiPaymentStatus::Completed))));
    db.expect_fulfil_payment()
        .times(1)
        .returning(|p| Ok(FulfilmentOutcome::AlreadyFulfilled(order("ord-1", p.payment_id.as_str()))));
    let body = r#"{"paymentId":"pay-1"}"#;
    // Empty secret = development mode; the unsigned request is allowed through.
    let status = call_webhook(db, "", body, None).await;
    assert_eq!(status, StatusCode::OK);
}
