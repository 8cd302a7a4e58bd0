//! End-to-end tests of the in-page checkout path against an HTTP order service.
//!
//! Tests cover:
//! - Card payment from intent creation to confirmation navigation
//! - Amount drift between the cart and the processor
//! - Order service failures before and after payment
//! - Validation failures that must not reach the network

mod common;

use assert_matches::assert_matches;
use common::{checkout_form, intent_json, order_json, paid_intent, TestCheckout};
use rstest::rstest;
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_checkout::models::{ConfirmPaymentResponse, PaymentIntentStatus, PaymentMethod};
use storefront_checkout::navigation::Route;
use storefront_checkout::{CartStore, CheckoutError, CheckoutResult, Severity};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn card_payment_creates_order_and_navigates_to_confirmation() {
    let app = TestCheckout::start().await;

    Mock::given(method("POST"))
        .and(path("/api/create-payment-intent"))
        .and(body_partial_json(json!({
            "customerEmail": "jane@x.com",
            "paymentMethod": "card_pay",
            "items": [{"productId": 7, "quantity": 2}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_json("pi_card", false)))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/confirm"))
        .and(body_partial_json(json!({"paymentIntentId": "pi_card"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("FL-1001", "200.00")))
        .expect(1)
        .mount(&app.server)
        .await;

    app.processor.push_confirm(Ok(ConfirmPaymentResponse::Completed(paid_intent(
        "pi_card",
        PaymentIntentStatus::Succeeded,
        20000,
    ))));

    let prepared = app.flow.begin(checkout_form(PaymentMethod::Card)).await.unwrap();
    assert_eq!(prepared.expected_total(), dec!(200.00));

    let result = app
        .flow
        .confirm(&prepared, Some("pm_card_visa".into()))
        .await
        .unwrap();

    let order = assert_matches!(result, CheckoutResult::Completed(order) => order);
    assert_eq!(order.order_number, "FL-1001");
    assert!(app.cart.items().is_empty());

    app.settle().await;
    assert_eq!(
        app.navigator.visited(),
        vec![Route::confirmation("FL-1001", "jane@x.com")]
    );
}

#[tokio::test]
async fn amount_drift_blocks_order_creation() {
    let app = TestCheckout::start().await;

    Mock::given(method("POST"))
        .and(path("/api/create-payment-intent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_json("pi_short", false)))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/confirm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("FL-1", "199.00")))
        .expect(0)
        .mount(&app.server)
        .await;

    app.processor.push_confirm(Ok(ConfirmPaymentResponse::Completed(paid_intent(
        "pi_short",
        PaymentIntentStatus::Succeeded,
        19900,
    ))));

    let prepared = app.flow.begin(checkout_form(PaymentMethod::Card)).await.unwrap();
    let err = app.flow.confirm(&prepared, None).await.unwrap_err();

    assert_matches!(
        &err,
        CheckoutError::AmountMismatch { expected, paid, payment_reference }
            if *expected == dec!(200.00) && *paid == dec!(199.00) && payment_reference == "pi_short"
    );
    assert_eq!(err.severity(), Severity::ContactSupport);
    assert_eq!(app.cart.items().len(), 1);
    app.settle().await;
    assert!(app.navigator.visited().is_empty());
}

#[rstest]
#[case(500, json!({"error": "database offline"}))]
#[case(400, json!({"error": "Delivery date unavailable"}))]
#[case(429, json!({"message": "Too many requests"}))]
#[tokio::test]
async fn intent_failures_map_to_pre_payment_errors(
    #[case] status: u16,
    #[case] body: serde_json::Value,
) {
    let app = TestCheckout::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create-payment-intent"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&app.server)
        .await;

    let err = app
        .flow
        .begin(checkout_form(PaymentMethod::Card))
        .await
        .unwrap_err();

    match status {
        500 => assert_matches!(err, CheckoutError::ServiceUnavailable(_)),
        400 => assert_matches!(err, CheckoutError::InvalidRequest(msg) if msg == "Delivery date unavailable"),
        429 => assert!(err.is_rate_limited()),
        _ => unreachable!(),
    }
    assert_eq!(app.processor.confirm_count(), 0);
}

#[tokio::test]
async fn invalid_form_never_reaches_order_service() {
    let app = TestCheckout::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create-payment-intent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_json("pi_x", false)))
        .expect(0)
        .mount(&app.server)
        .await;

    let mut form = checkout_form(PaymentMethod::Card);
    form.customer_email = "not-an-email".into();

    let errors = assert_matches!(
        app.flow.begin(form).await,
        Err(CheckoutError::Validation(errors)) => errors
    );
    assert!(errors.iter().any(|e| e.field == "customer_email"));
}

#[tokio::test]
async fn finalize_outage_after_payment_is_fatal_but_paid() {
    let app = TestCheckout::start().await;

    Mock::given(method("POST"))
        .and(path("/api/create-payment-intent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_json("pi_paid", false)))
        .mount(&app.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/confirm"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&app.server)
        .await;

    app.processor.push_confirm(Ok(ConfirmPaymentResponse::Completed(paid_intent(
        "pi_paid",
        PaymentIntentStatus::Succeeded,
        20000,
    ))));

    let prepared = app.flow.begin(checkout_form(PaymentMethod::Card)).await.unwrap();
    let err = app.flow.confirm(&prepared, None).await.unwrap_err();

    assert_matches!(err, CheckoutError::OrderSystemFailure { .. });
    assert_eq!(err.severity(), Severity::FatalButPaid);
    assert_eq!(err.payment_reference(), Some("pi_paid"));
    assert!(!err.is_dismissible());
    assert!(err.user_message().contains("pi_paid"));
    assert_eq!(app.cart.items().len(), 1);
}
