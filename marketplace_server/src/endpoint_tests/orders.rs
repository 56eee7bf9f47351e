use std::net::SocketAddr;

use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_engine::{
    db_types::{
        DeliveryType,
        FeeSettings,
        Message,
        MessageKind,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentMethod,
    },
    order_objects::{OrderSession, WorkflowPhase},
    rules::{checkout::PaymentConfirmation, fees::FeeBreakdown, lifecycle::OrderAction},
};
use serde_json::{json, Value};

use super::helpers::{money, parse, standard_fees, TestMarketplace};

#[actix_web::test]
async fn health_check_is_not_part_of_the_api_scope() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let (status, _) = mp.get("/api/health").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fill_and_lock_a_cart() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    let new_order = NewOrder::new(OrderId::from("o-100"), "corner", "alice", DeliveryType::Delivery);
    let (status, body) = mp.post_json("/api/orders", &new_order).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order: Order = parse(&body);
    assert_eq!(order.status, OrderStatusType::Shopping);

    let (status, _) = mp.post_json("/api/orders", &new_order).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let item = json!({ "name": "Bread", "price": money("2.50"), "quantity": 2 });
    let (status, body) = mp.post_json("/api/orders/o-100/items", &item).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let item = json!({ "name": "Milk", "price": money("1.20"), "quantity": 1 });
    mp.post_json("/api/orders/o-100/items", &item).await;
    let (status, body) = mp.put_json("/api/orders/o-100/items/Bread", &json!({ "quantity": 3 })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = mp.delete("/api/orders/o-100/items/Milk").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = parse(&body);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.subtotal(), money("7.50"));

    let (status, _) = mp.post("/api/orders/o-100/done_adding").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = mp.post_json("/api/orders/o-100/items", &item).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("locked"), "{body}");
}

#[actix_web::test]
async fn session_shows_phase_quote_and_actions() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    mp.order_ready_for_payment("o-101", "corner", DeliveryType::Delivery, &[("Cheese", "40.00", 2)]).await;

    let (status, body) = mp.get("/api/orders/o-101/session").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let session: OrderSession = parse(&body);
    assert!(matches!(session.phase, WorkflowPhase::AwaitingPayment { .. }));
    assert!(session.allowed_actions.contains(&OrderAction::RecordPayment));
    assert!(!session.allowed_actions.contains(&OrderAction::AddItem));
    assert_eq!(session.quote.delivery_fee, money("3.00"));
    // 2.5% of 80.00 is 2.00, under the cap
    assert_eq!(session.quote.service_fee, money("2.00"));
    assert_eq!(session.quote.total, money("85.00"));

    let (_, body) = mp.get("/api/orders/o-101/quote").await;
    let quote: FeeBreakdown = parse(&body);
    assert_eq!(quote, session.quote);
}

#[actix_web::test]
async fn steps_out_of_order_are_refused() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    let new_order = NewOrder::new(OrderId::from("o-102"), "corner", "alice", DeliveryType::Delivery);
    mp.post_json("/api/orders", &new_order).await;
    let (status, _) = mp.post("/api/orders/o-102/bagging").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = mp.post("/api/orders/o-102/done_adding").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "An empty cart cannot be finished. {body}");
    let (status, _) = mp.post("/api/orders/nope/done_adding").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn bank_transfer_then_pickup_code_handoff() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", FeeSettings::default()).await;
    let order = mp.order_ready_for_payment("o-103", "corner", DeliveryType::Collection, &[("Soap", "4.00", 1)]).await;

    let underpaid = PaymentConfirmation { method: PaymentMethod::BankTransfer, amount: money("3.00"), reference: None };
    let (status, body) = mp.post_json("/api/orders/o-103/payment", &underpaid).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details: Value = parse(&body);
    assert!(details["details"].as_array().is_some_and(|d| !d.is_empty()), "{body}");

    let payment =
        PaymentConfirmation { method: PaymentMethod::BankTransfer, amount: order.amount_due(), reference: None };
    let (status, body) = mp.post_json("/api/orders/o-103/payment", &payment).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = mp.post("/api/orders/o-103/pickup_code").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = parse(&body);
    let code = order.pickup_code.expect("A pickup code should have been issued");

    let (status, _) = mp.post_json("/api/orders/o-103/pickup_code/verify", &json!({ "code": "ZZZZZZ" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let verify = json!({ "code": code.as_str().to_lowercase() });
    let (status, body) = mp.post_json("/api/orders/o-103/pickup_code/verify", &verify).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = parse(&body);
    assert_eq!(order.status, OrderStatusType::Collected);
    let (status, body) = mp.post_json("/api/orders/o-103/pickup_code/verify", &verify).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("already used"), "{body}");
}

#[actix_web::test]
async fn cancelling_is_final() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    mp.order_ready_for_payment("o-104", "corner", DeliveryType::Delivery, &[("Tea", "5.00", 1)]).await;
    let (status, body) = mp.post_json("/api/orders/o-104/cancel", &json!({ "reason": "Out of stock" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = mp.post_json("/api/orders/o-104/cancel", &json!({ "reason": "Again" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = mp.get("/api/customers/alice/orders").await;
    let orders: Vec<Order> = parse(&body);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatusType::Cancelled);
    let (_, body) = mp.get("/api/stores/corner/orders").await;
    let orders: Vec<Order> = parse(&body);
    assert_eq!(orders.len(), 1);
}

#[actix_web::test]
async fn payment_options_follow_the_visitor_country() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await.with_visitor_country("NG");
    mp.store("sam", "corner", standard_fees()).await;
    mp.order_ready_for_payment("o-105", "corner", DeliveryType::Delivery, &[("Rice", "9.00", 1)]).await;

    let req = TestRequest::get().uri("/api/orders/o-105/payment_options").peer_addr(visitor());
    let (status, body) = mp.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let methods: Vec<PaymentMethod> = parse(&body);
    assert!(methods.contains(&PaymentMethod::Card));
    assert!(!methods.contains(&PaymentMethod::Klarna));
    assert!(!methods.contains(&PaymentMethod::Cash));

    let (_, body) = mp.get("/api/orders/o-105/payment_options?country=de").await;
    let methods: Vec<PaymentMethod> = parse(&body);
    assert!(methods.contains(&PaymentMethod::Klarna));
}

#[actix_web::test]
async fn failed_geo_lookup_falls_back_to_the_default_country() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    mp.order_ready_for_payment("o-106", "corner", DeliveryType::Delivery, &[("Rice", "9.00", 1)]).await;
    let req = TestRequest::get().uri("/api/orders/o-106/payment_options").peer_addr(visitor());
    let (status, body) = mp.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let methods: Vec<PaymentMethod> = parse(&body);
    // The default country is the US, where Klarna is offered
    assert!(methods.contains(&PaymentMethod::Klarna));
}

#[actix_web::test]
async fn payment_intent_charges_the_frozen_total() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    mp.order_ready_for_payment("o-107", "corner", DeliveryType::Delivery, &[("Cheese", "40.00", 2)]).await;
    let (status, body) = mp.post_json("/api/orders/o-107/payment_intent", &json!({ "method": "card" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let intents = mp.processor.intents.lock().unwrap().clone();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].amount_minor, 8500);
    assert_eq!(intents[0].order_id.as_str(), "o-107");

    let (status, _) = mp.post_json("/api/orders/o-107/payment_intent", &json!({ "method": "bank_transfer" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    mp.processor.set_down(true);
    let (status, _) = mp.post_json("/api/orders/o-107/payment_intent", &json!({ "method": "card" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn conversation_carries_people_and_the_order_flow() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.store("sam", "corner", standard_fees()).await;
    mp.order_ready_for_payment("o-108", "corner", DeliveryType::Delivery, &[("Tea", "5.00", 1)]).await;
    let hello = json!({ "sender": "alice", "kind": { "type": "text", "body": "Is the tea loose leaf?" } });
    let (status, body) = mp.post_json("/api/conversations/o-108/messages", &hello).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let spoof = json!({ "sender": "alice", "kind": { "type": "done_adding" } });
    let (status, _) = mp.post_json("/api/conversations/o-108/messages", &spoof).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = mp.get("/api/conversations/o-108/messages").await;
    let messages: Vec<Message> = parse(&body);
    assert!(messages.iter().any(|m| matches!(m.kind, MessageKind::PaymentRequest { .. })));
    assert!(messages.iter().any(|m| m.sender == "alice"));
}

#[actix_web::test]
async fn card_numbers_are_checked_before_payment() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let (status, body) = mp.post_json("/api/cards/check", &json!({ "number": "4242 4242 4242 4242" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = mp.post_json("/api/cards/check", &json!({ "number": "4242 4242 4242 4241" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = mp.post_json("/api/cards/check", &json!({ "number": "4242" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn visitor() -> SocketAddr {
    "203.0.113.5:5000".parse().unwrap()
}
