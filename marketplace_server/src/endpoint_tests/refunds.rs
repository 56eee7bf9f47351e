use actix_web::http::StatusCode;
use marketplace_engine::{
    db_types::{DeliveryType, FeeSettings, NewRefund, Order, PaymentMethod, Refund, RefundInitiator, RefundStatus},
    rules::checkout::PaymentConfirmation,
    WalletRepository,
};
use serde_json::json;

use super::helpers::{money, parse, TestMarketplace};

async fn paid_order(mp: &TestMarketplace, order_id: &str, method: PaymentMethod) -> Order {
    mp.store("sam", "corner", FeeSettings::default()).await;
    let order = mp.order_ready_for_payment(order_id, "corner", DeliveryType::Delivery, &[("Lamp", "20.00", 1)]).await;
    let reference = method.is_processor_settled().then(|| format!("pi_{order_id}"));
    let payment = PaymentConfirmation { method, amount: order.amount_due(), reference };
    let (status, body) = mp.post_json(&format!("/api/orders/{order_id}/payment"), &payment).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    parse(&body)
}

fn refund_for(order: &Order, amount: &str, initiator: RefundInitiator) -> NewRefund {
    NewRefund {
        order_id: order.order_id.clone(),
        amount: money(amount),
        currency: order.currency.clone(),
        reason: "Arrived broken".to_string(),
        payment_method: order.payment_method.unwrap_or(PaymentMethod::Card),
        charge_reference: order.payment_reference.clone(),
        initiator,
    }
}

#[actix_web::test]
async fn card_refund_goes_through_the_processor() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let order = paid_order(&mp, "o-200", PaymentMethod::Card).await;
    let wallet = mp.db.fetch_wallet("sam").await.unwrap().unwrap();
    assert_eq!(wallet.balance, money("20.00"));

    let (status, body) = mp.post_json("/api/refunds", &refund_for(&order, "5.00", RefundInitiator::Customer)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let refund: Refund = parse(&body);
    assert_eq!(refund.status, RefundStatus::Requested);
    assert!(mp.processor.refunds.lock().unwrap().is_empty());

    let (status, body) = mp.post(&format!("/api/refunds/{}/approve", refund.id)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let refund: Refund = parse(&body);
    assert_eq!(refund.status, RefundStatus::Completed);
    {
        let sent = mp.processor.refunds.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].amount_minor, 500);
        assert_eq!(sent[0].charge_reference, "pi_o-200");
    }
    let wallet = mp.db.fetch_wallet("sam").await.unwrap().unwrap();
    assert_eq!(wallet.balance, money("15.00"));

    let (status, _) = mp.post(&format!("/api/refunds/{}/approve", refund.id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(mp.processor.refunds.lock().unwrap().len(), 1);

    let (_, body) = mp.get("/api/orders/o-200/refunds").await;
    let refunds: Vec<Refund> = parse(&body);
    assert_eq!(refunds.len(), 1);
}

#[actix_web::test]
async fn processor_outage_leaves_the_refund_requested() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let order = paid_order(&mp, "o-201", PaymentMethod::Card).await;
    let (_, body) = mp.post_json("/api/refunds", &refund_for(&order, "20.00", RefundInitiator::Customer)).await;
    let refund: Refund = parse(&body);
    mp.processor.set_down(true);
    let (status, _) = mp.post(&format!("/api/refunds/{}/approve", refund.id)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let (_, body) = mp.get(&format!("/api/refunds/{}", refund.id)).await;
    let refund: Refund = parse(&body);
    assert_eq!(refund.status, RefundStatus::Requested);
    let wallet = mp.db.fetch_wallet("sam").await.unwrap().unwrap();
    assert_eq!(wallet.balance, money("20.00"));
}

#[actix_web::test]
async fn manual_refund_with_proof_and_dispute() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let order = paid_order(&mp, "o-202", PaymentMethod::BankTransfer).await;
    // Seller-initiated refunds are approved on the spot
    let (status, body) = mp.post_json("/api/refunds", &refund_for(&order, "20.00", RefundInitiator::Seller)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let refund: Refund = parse(&body);
    assert_eq!(refund.status, RefundStatus::AwaitingTransfer);
    let id = refund.id;

    let (status, _) = mp.post_json(&format!("/api/refunds/{id}/proof"), &json!({ "url": "not a link" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let proof = json!({ "url": "https://files.example.com/receipt.png" });
    let (status, body) = mp.post_json(&format!("/api/refunds/{id}/proof"), &proof).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let dispute = json!({ "reason": "Nothing arrived" });
    let (status, body) = mp.post_json(&format!("/api/refunds/{id}/dispute"), &dispute).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let refund: Refund = parse(&body);
    assert_eq!(refund.status, RefundStatus::Disputed);
    assert_eq!(refund.dispute_reason.as_deref(), Some("Nothing arrived"));
    let (status, _) = mp.post(&format!("/api/refunds/{id}/received")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(mp.processor.refunds.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn invalid_refund_requests() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let order = paid_order(&mp, "o-203", PaymentMethod::Card).await;
    let (status, _) = mp.post_json("/api/refunds", &refund_for(&order, "25.00", RefundInitiator::Customer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = mp.post_json("/api/refunds", &refund_for(&order, "5.00", RefundInitiator::Customer)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = mp.post_json("/api/refunds", &refund_for(&order, "5.00", RefundInitiator::Customer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("already been requested"), "{body}");
    let (status, _) = mp.get("/api/refunds/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn rejected_refunds_can_be_requested_again() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let order = paid_order(&mp, "o-204", PaymentMethod::Card).await;
    let (_, body) = mp.post_json("/api/refunds", &refund_for(&order, "5.00", RefundInitiator::Customer)).await;
    let refund: Refund = parse(&body);
    let (status, body) = mp.post(&format!("/api/refunds/{}/reject", refund.id)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = mp.post_json("/api/refunds", &refund_for(&order, "4.00", RefundInitiator::Customer)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}
