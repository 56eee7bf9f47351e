use std::str::FromStr;

use cucumber::{then, when};
use log::*;
use marketplace_engine::{
    db_types::{DeliveryType, NewOrder, NewRefund, OrderId, OrderStatusType, RefundInitiator, RefundStatus},
    order_objects::NewCartItem,
    MarketplaceError,
    WalletRepository,
};

use crate::{cucumber::MarketplaceWorld, support::marketplace::money};

//------------------------------------------   Orders   ---------------------------------------------------------------

#[when(expr = "customer {word} opens a {word} order {word} at store {word}")]
async fn open_order(world: &mut MarketplaceWorld, customer: String, kind: String, order_id: String, store: String) {
    let delivery_type = DeliveryType::from_str(&kind).expect("Unknown delivery type");
    let order = NewOrder::new(OrderId::from(order_id.as_str()), store.as_str(), customer.as_str(), delivery_type);
    let result = world.mp().orders.start_order(order).await;
    world.remember(result);
}

#[when(expr = "they add {int} x {string} at {word} to order {word}")]
async fn add_item(world: &mut MarketplaceWorld, quantity: u32, name: String, price: String, order_id: String) {
    let item = NewCartItem::new(name.as_str(), money(&price), quantity);
    let result = world.mp().orders.add_item(&OrderId::from(order_id.as_str()), item).await;
    world.remember(result);
}

#[when(expr = "order {word} is marked {word}")]
async fn advance_order(world: &mut MarketplaceWorld, order_id: String, step_name: String) {
    let id = OrderId::from(order_id.as_str());
    let orders = &world.mp().orders;
    let result = match step_name.as_str() {
        "done_adding" => orders.finish_adding(&id).await,
        "bagging" => orders.mark_bagged(&id).await,
        "ready_for_payment" => orders.request_payment(&id).await,
        _ => panic!("Unknown order step: {step_name}"),
    };
    world.remember(result);
}

#[when(expr = "order {word} is paid by card")]
async fn pay_by_card(world: &mut MarketplaceWorld, order_id: String) {
    let order = world.order(&order_id).await;
    world.mp().pay_by_card(&order).await;
}

#[when(expr = "order {word} is cancelled because {string}")]
async fn cancel(world: &mut MarketplaceWorld, order_id: String, reason: String) {
    let result = world.mp().orders.cancel_order(&OrderId::from(order_id.as_str()), &reason).await;
    world.remember(result);
}

#[when(expr = "a pickup code is issued for order {word}")]
async fn issue_code(world: &mut MarketplaceWorld, order_id: String) {
    let order = world.mp().orders.issue_pickup_code(&OrderId::from(order_id.as_str())).await.expect("No pickup code");
    world.pickup_code = order.pickup_code.map(|c| c.as_str().to_string());
}

#[when(expr = "the pickup code is presented for order {word}")]
async fn present_code(world: &mut MarketplaceWorld, order_id: String) {
    let code = world.pickup_code.clone().expect("No pickup code was issued");
    let result = world.mp().orders.verify_pickup_code(&OrderId::from(order_id.as_str()), &code).await;
    world.remember(result);
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut MarketplaceWorld, order_id: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Unknown order status");
    let order = world.order(&order_id).await;
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} totals {word} with delivery {word} and service fee {word}")]
async fn order_totals(world: &mut MarketplaceWorld, order_id: String, total: String, delivery: String, service: String) {
    let order = world.order(&order_id).await;
    let fees = order.fees.expect("Fees were not frozen");
    assert_eq!(fees.total, money(&total));
    assert_eq!(fees.delivery_fee, money(&delivery));
    assert_eq!(fees.service_fee, money(&service));
}

#[then("the cart is locked")]
async fn cart_locked(world: &mut MarketplaceWorld) {
    match world.last_error.take() {
        Some(MarketplaceError::OrderLocked(_)) => {},
        other => panic!("Expected a locked cart, got {other:?}"),
    }
}

#[then("the step is refused as out of order")]
async fn invalid_transition(world: &mut MarketplaceWorld) {
    match world.last_error.take() {
        Some(MarketplaceError::InvalidTransition(msg)) => debug!("Refused as expected: {msg}"),
        other => panic!("Expected an invalid transition, got {other:?}"),
    }
}

#[then("the pickup code has already been used")]
async fn code_used(world: &mut MarketplaceWorld) {
    match world.last_error.take() {
        Some(MarketplaceError::AlreadyProcessed(_)) => {},
        other => panic!("Expected the code to be spent, got {other:?}"),
    }
}

//------------------------------------------   Refunds   --------------------------------------------------------------

#[when(expr = "customer requests a refund of {word} for order {word}")]
async fn request_refund(world: &mut MarketplaceWorld, amount: String, order_id: String) {
    let order = world.order(&order_id).await;
    let payment_method = order.payment_method.expect("Order has not been paid");
    let request = NewRefund {
        order_id: order.order_id.clone(),
        amount: money(&amount),
        currency: order.currency.clone(),
        reason: "Damaged in transit".into(),
        payment_method,
        charge_reference: order.payment_reference.clone(),
        initiator: RefundInitiator::Customer,
    };
    let result = world.mp().refunds.request_refund(request).await;
    world.last_refund = world.remember(result);
}

#[when("the seller approves the refund")]
async fn approve_refund(world: &mut MarketplaceWorld) {
    let id = world.last_refund.as_ref().expect("No refund was requested").id;
    let result = world.mp().refunds.approve_refund(id).await;
    if let Some(refund) = world.remember(result) {
        world.last_refund = Some(refund);
    }
}

#[then(expr = "the refund is {word}")]
async fn refund_status(world: &mut MarketplaceWorld, status: String) {
    let expected = RefundStatus::from_str(&status).expect("Unknown refund status");
    let id = world.last_refund.as_ref().expect("No refund was requested").id;
    let refund = world.mp().refunds.fetch_refund(id).await.expect("Error fetching refund");
    assert_eq!(refund.status, expected);
}

#[then(expr = "the payment processor refunded {int} time(s)")]
async fn processor_refunds(world: &mut MarketplaceWorld, count: usize) {
    assert_eq!(world.mp().processor.refund_count(), count);
}

//------------------------------------------   Wallets   --------------------------------------------------------------

#[when(expr = "seller {word} withdraws {word}")]
async fn withdraw(world: &mut MarketplaceWorld, seller_id: String, amount: String) {
    let result = world.mp().withdrawals.request_withdrawal(&seller_id, money(&amount)).await;
    world.last_withdrawal = world.remember(result);
}

#[then(expr = "the withdrawal is taxed {word} leaving {word}")]
async fn withdrawal_taxed(world: &mut MarketplaceWorld, tax: String, net: String) {
    let withdrawal = world.last_withdrawal.as_ref().expect("No withdrawal was recorded");
    assert_eq!(withdrawal.tax, money(&tax));
    assert_eq!(withdrawal.net_amount, money(&net));
}

#[then(expr = "the withdrawal is refused with {string}")]
async fn withdrawal_refused(world: &mut MarketplaceWorld, fragment: String) {
    match world.last_error.take() {
        Some(e @ MarketplaceError::WithdrawalNotAllowed(_)) => {
            let msg = e.to_string();
            assert!(msg.contains(&fragment), "'{msg}' does not mention '{fragment}'");
        },
        other => panic!("Expected the withdrawal to be refused, got {other:?}"),
    }
}

#[then(expr = "seller {word} has a balance of {word}")]
async fn wallet_balance(world: &mut MarketplaceWorld, seller_id: String, balance: String) {
    let wallet = world.mp().db.fetch_wallet(&seller_id).await.expect("Error fetching wallet").expect("No wallet");
    assert_eq!(wallet.balance, money(&balance));
}
