use cucumber::given;
use marketplace_engine::{
    db_types::{FeeSettings, ServiceFeeType},
    WalletRepository,
};
use rust_decimal::Decimal;

use crate::{
    cucumber::MarketplaceWorld,
    support::marketplace::{money, Marketplace},
};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketplaceWorld) {
    world.system = Some(Marketplace::new().await);
}

#[given(expr = "store {word} with delivery fee {word} and a {word}% service fee capped at {word}")]
async fn store_with_fees(world: &mut MarketplaceWorld, store_id: String, delivery: String, rate: String, cap: String) {
    let settings = FeeSettings {
        delivery_enabled: true,
        delivery_fee: money(&delivery),
        service_fee_enabled: true,
        service_fee_type: ServiceFeeType::Percentage,
        service_fee_rate: rate.parse::<Decimal>().expect("Not a valid rate"),
        service_fee_max: money(&cap),
        ..Default::default()
    };
    world.mp().open_store("sam", &store_id, settings).await;
}

#[given(expr = "store {word} with free delivery over {word}")]
async fn store_with_threshold(world: &mut MarketplaceWorld, store_id: String, threshold: String) {
    let settings = FeeSettings {
        delivery_enabled: true,
        delivery_fee: money("4.00"),
        free_delivery_threshold: money(&threshold),
        ..Default::default()
    };
    world.mp().open_store("sam", &store_id, settings).await;
}

#[given(expr = "seller {word} in {word} who joined {int} days ago with a balance of {word}")]
async fn funded_seller(world: &mut MarketplaceWorld, seller_id: String, country: String, days: i64, balance: String) {
    let mp = world.mp();
    mp.seller(&seller_id, &country, days).await;
    let currency = mp.withdrawals.wallet(&seller_id).await.expect("Error fetching wallet").currency;
    mp.db.credit_wallet(&seller_id, money(&balance), &currency).await.expect("Error funding wallet");
}
