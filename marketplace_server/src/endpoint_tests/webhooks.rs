use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use marketplace_engine::{
    db_types::{DeliveryType, Order, OrderStatusType, PaymentMethod},
    WalletRepository,
};
use serde_json::{json, Value};

use super::helpers::{money, parse, standard_fees, TestMarketplace, WEBHOOK_SECRET};
use crate::{helpers::calculate_stripe_signature, middleware::STRIPE_SIGNATURE_HEADER};

fn payment_succeeded(intent_id: &str, order_id: &str, amount_received: i64) -> Value {
    json!({
        "id": format!("evt_{intent_id}"),
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": intent_id,
            "object": "payment_intent",
            "amount_received": amount_received,
            "currency": "usd",
            "metadata": { "order_id": order_id, "method": "card" }
        }}
    })
}

fn signed_request(event: &Value, timestamp: i64, secret: &str) -> TestRequest {
    let body = event.to_string();
    let signature = calculate_stripe_signature(secret, timestamp, body.as_bytes());
    TestRequest::post()
        .uri("/webhooks/stripe")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((STRIPE_SIGNATURE_HEADER, format!("t={timestamp},v1={signature}")))
        .set_payload(body)
}

async fn marketplace_with_order(order_id: &str) -> (TestMarketplace, Order) {
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    let order = mp.order_ready_for_payment(order_id, "corner", DeliveryType::Delivery, &[("Cheese", "40.00", 2)]).await;
    (mp, order)
}

#[actix_web::test]
async fn succeeded_payment_marks_the_order_paid() {
    let _ = env_logger::try_init().ok();
    let (mp, _) = marketplace_with_order("o-300").await;
    let event = payment_succeeded("pi_300", "o-300", 8500);
    let (status, body) = mp.call_webhook(signed_request(&event, Utc::now().timestamp(), WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = mp.get("/api/orders/o-300").await;
    let order: Order = parse(&body);
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_method, Some(PaymentMethod::Card));
    assert_eq!(order.payment_reference.as_deref(), Some("pi_300"));
    // Subtotal plus delivery. The service fee stays with the platform.
    let wallet = mp.db.fetch_wallet("sam").await.unwrap().unwrap();
    assert_eq!(wallet.balance, money("83.00"));

    // Stripe retries deliveries. A repeat is acknowledged and changes nothing.
    let (status, body) = mp.call_webhook(signed_request(&event, Utc::now().timestamp(), WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let wallet = mp.db.fetch_wallet("sam").await.unwrap().unwrap();
    assert_eq!(wallet.balance, money("83.00"));
}

#[actix_web::test]
async fn wrong_amount_is_refused() {
    let _ = env_logger::try_init().ok();
    let (mp, _) = marketplace_with_order("o-301").await;
    let event = payment_succeeded("pi_301", "o-301", 8000);
    let (status, body) = mp.call_webhook(signed_request(&event, Utc::now().timestamp(), WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("does not match the order total"), "{body}");
    let (_, body) = mp.get("/api/orders/o-301").await;
    let order: Order = parse(&body);
    assert_eq!(order.status, OrderStatusType::ReadyForPayment);
}

#[actix_web::test]
async fn other_events_are_ignored() {
    let _ = env_logger::try_init().ok();
    let (mp, _) = marketplace_with_order("o-302").await;
    let event = json!({ "id": "evt_1", "type": "charge.refunded", "data": { "object": { "id": "ch_1" } } });
    let (status, body) = mp.call_webhook(signed_request(&event, Utc::now().timestamp(), WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("ignored"), "{body}");
}

#[actix_web::test]
async fn unsigned_and_forged_deliveries_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (mp, _) = marketplace_with_order("o-303").await;
    let event = payment_succeeded("pi_303", "o-303", 8500);

    let unsigned = TestRequest::post()
        .uri("/webhooks/stripe")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(event.to_string());
    let (status, _) = mp.call_webhook(unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = mp.call_webhook(signed_request(&event, Utc::now().timestamp(), "whsec_forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let an_hour_ago = Utc::now().timestamp() - 3600;
    let (status, body) = mp.call_webhook(signed_request(&event, an_hour_ago, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("tolerance"), "{body}");

    let (_, body) = mp.get("/api/orders/o-303").await;
    let order: Order = parse(&body);
    assert_eq!(order.status, OrderStatusType::ReadyForPayment);
}
