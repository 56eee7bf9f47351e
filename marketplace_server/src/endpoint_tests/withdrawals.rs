use actix_web::http::StatusCode;
use marketplace_engine::{
    db_types::{Seller, Wallet, Withdrawal},
    mp_api::withdrawal_api::WithdrawalEligibility,
    traits::ProcessorBalance,
};
use serde_json::{json, Value};

use super::helpers::{money, parse, TestMarketplace};

#[actix_web::test]
async fn register_a_seller_and_open_a_store() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    let (status, body) = mp.post_json("/api/sellers", &json!({ "seller_id": "sam", "country": "za" })).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let seller: Seller = parse(&body);
    assert_eq!(seller.country, "ZA");
    let (status, _) = mp.post_json("/api/sellers", &json!({ "seller_id": "sam", "country": "ZA" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let store = json!({
        "store_id": "corner",
        "seller_id": "sam",
        "name": "Corner shop",
        "fee_settings": { "delivery_enabled": true, "delivery_fee": "3.00" }
    });
    let (status, body) = mp.put_json("/api/stores", &store).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let fees = json!({ "service_fee_enabled": true, "service_fee_type": "fixed", "service_fee_amount": "1.50" });
    let (status, body) = mp.put_json("/api/stores/corner/fees", &fees).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, body) = mp.get("/api/stores/corner").await;
    let store: Value = parse(&body);
    assert_eq!(store["fee_settings"]["service_fee_enabled"], json!(true));
    let (status, _) = mp.get("/api/stores/elsewhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn taxed_withdrawal_without_a_processor_account() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.seller("thandi", "ZA", 30).await;
    mp.credit("thandi", "1000.00", "ZAR").await;
    let (status, body) = mp.post_json("/api/sellers/thandi/withdrawals", &json!({ "amount": "200.00" })).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let withdrawal: Withdrawal = parse(&body);
    assert_eq!(withdrawal.tax, money("30.00"));
    assert_eq!(withdrawal.net_amount, money("170.00"));
    assert!(withdrawal.payout_reference.is_none());
    assert!(mp.processor.payouts.lock().unwrap().is_empty());

    let (_, body) = mp.get("/api/sellers/thandi/wallet").await;
    let wallet: Wallet = parse(&body);
    assert_eq!(wallet.balance, money("800.00"));
    let (_, body) = mp.get("/api/sellers/thandi/eligibility").await;
    let eligibility: WithdrawalEligibility = parse(&body);
    assert_eq!(eligibility.withdrawals_this_month, 1);
    assert_eq!(eligibility.remaining_this_month, 2);
    let (_, body) = mp.get("/api/sellers/thandi/withdrawals").await;
    let withdrawals: Vec<Withdrawal> = parse(&body);
    assert_eq!(withdrawals.len(), 1);
}

#[actix_web::test]
async fn withdrawals_pay_out_to_a_linked_account() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.seller("sam", "US", 60).await;
    mp.credit("sam", "100.00", "USD").await;
    let (status, _) = mp.get("/api/sellers/sam/processor_balance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = mp.put_json("/api/sellers/sam/processor_account", &json!({ "account": "acct_123" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = mp.post_json("/api/sellers/sam/withdrawals", &json!({ "amount": "40.00" })).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let withdrawal: Withdrawal = parse(&body);
    assert_eq!(withdrawal.payout_reference.as_deref(), Some("po_test_1"));
    {
        let payouts = mp.processor.payouts.lock().unwrap();
        assert_eq!(payouts[0].account, "acct_123");
        assert_eq!(payouts[0].amount_minor, 4000);
    }
    let (status, body) = mp.get("/api/sellers/sam/processor_balance").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let balance: ProcessorBalance = parse(&body);
    assert_eq!(balance.available, money("250"));
}

#[actix_web::test]
async fn failed_payout_leaves_the_wallet_alone() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.seller("sam", "US", 60).await;
    mp.credit("sam", "100.00", "USD").await;
    mp.put_json("/api/sellers/sam/processor_account", &json!({ "account": "acct_123" })).await;
    mp.processor.set_down(true);
    let (status, _) = mp.post_json("/api/sellers/sam/withdrawals", &json!({ "amount": "40.00" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let (_, body) = mp.get("/api/sellers/sam/wallet").await;
    let wallet: Wallet = parse(&body);
    assert_eq!(wallet.balance, money("100.00"));
}

#[actix_web::test]
async fn refused_withdrawals() {
    let _ = env_logger::try_init().ok();
    let mp = TestMarketplace::new().await;
    mp.seller("ada", "NG", 3).await;
    mp.credit("ada", "50000.00", "NGN").await;
    let (status, body) = mp.post_json("/api/sellers/ada/withdrawals", &json!({ "amount": "10000.00" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("days after the account was created"), "{body}");

    mp.seller("sam", "US", 60).await;
    mp.credit("sam", "40.00", "USD").await;
    let (status, body) = mp.post_json("/api/sellers/sam/withdrawals", &json!({ "amount": "50.00" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("available balance is 40"), "{body}");
    let (status, _) = mp.post_json("/api/sellers/sam/withdrawals", &json!({ "amount": "5.00" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = mp.get("/api/sellers/nobody/wallet").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
