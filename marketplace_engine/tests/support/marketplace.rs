use std::str::FromStr;

use chrono::{Duration, Utc};
use log::*;
use marketplace_engine::{
    db_types::{DeliveryType, FeeSettings, NewOrder, Order, OrderId, PaymentMethod, Seller, ServiceFeeType, Store},
    events::EventProducers,
    order_objects::NewCartItem,
    rules::checkout::PaymentConfirmation,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    CheckoutApi,
    MarketplaceDatabase,
    MessagingApi,
    OrderFlowApi,
    RefundApi,
    SellerRepository,
    SqliteDatabase,
    StoreApi,
    WithdrawalApi,
};
use mkt_common::Money;
use rust_decimal::Decimal;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use super::stub_processor::StubProcessor;

pub fn money(s: &str) -> Money {
    Money::from_str(s).unwrap()
}

/// Delivery at 3.00 and a 2.5% service fee capped at 5.00.
pub fn standard_fees() -> FeeSettings {
    FeeSettings {
        delivery_enabled: true,
        delivery_fee: money("3.00"),
        service_fee_enabled: true,
        service_fee_type: ServiceFeeType::Percentage,
        service_fee_rate: Decimal::new(25, 1),
        service_fee_max: money("5.00"),
        ..Default::default()
    }
}

/// Every API wired to one fresh database and a stub payment processor.
pub struct Marketplace {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub processor: StubProcessor,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub checkout: CheckoutApi<SqliteDatabase, StubProcessor>,
    pub refunds: RefundApi<SqliteDatabase, StubProcessor>,
    pub withdrawals: WithdrawalApi<SqliteDatabase, StubProcessor>,
    pub stores: StoreApi<SqliteDatabase>,
    pub messages: MessagingApi<SqliteDatabase>,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Marketplace ({})", self.db_path)
    }
}

impl Marketplace {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let processor = StubProcessor::default();
        Self {
            db_path: url,
            orders: OrderFlowApi::new(db.clone(), producers.clone()),
            checkout: CheckoutApi::new(db.clone(), processor.clone()),
            refunds: RefundApi::new(db.clone(), processor.clone(), producers.clone()),
            withdrawals: WithdrawalApi::new(db.clone(), processor.clone(), producers),
            stores: StoreApi::new(db.clone()),
            messages: MessagingApi::new(db.clone()),
            processor,
            db,
        }
    }

    /// Registers a seller who joined `days_ago` days ago.
    pub async fn seller(&self, seller_id: &str, country: &str, days_ago: i64) -> Seller {
        let seller = Seller {
            seller_id: seller_id.to_string(),
            country: country.to_string(),
            processor_account: None,
            created_at: Utc::now() - Duration::days(days_ago),
        };
        self.db.insert_seller(seller).await.expect("Error registering seller")
    }

    /// Opens `store_id` for a long-standing US seller.
    pub async fn open_store(&self, seller_id: &str, store_id: &str, fee_settings: FeeSettings) -> Store {
        if self.db.fetch_seller(seller_id).await.unwrap().is_none() {
            self.seller(seller_id, "US", 60).await;
        }
        let store = Store {
            store_id: store_id.to_string(),
            seller_id: seller_id.to_string(),
            name: format!("{store_id} market"),
            fee_settings,
        };
        self.stores.save_store(store).await.expect("Error saving store")
    }

    /// Fills a cart with `items` (name, price, quantity) and takes it through to `ready_for_payment`.
    pub async fn order_ready_for_payment(
        &self,
        order_id: &str,
        store_id: &str,
        delivery_type: DeliveryType,
        items: &[(&str, &str, u32)],
    ) -> Order {
        let id = OrderId::from(order_id);
        self.orders
            .start_order(NewOrder::new(id.clone(), store_id, "alice", delivery_type))
            .await
            .expect("Error starting order");
        for (name, price, quantity) in items {
            self.orders.add_item(&id, NewCartItem::new(*name, money(price), *quantity)).await.expect("Error adding item");
        }
        self.orders.finish_adding(&id).await.expect("Error finishing cart");
        self.orders.mark_bagged(&id).await.expect("Error bagging order");
        self.orders.request_payment(&id).await.expect("Error requesting payment")
    }

    /// Pays the frozen total by card.
    pub async fn pay_by_card(&self, order: &Order) -> Order {
        let payment = PaymentConfirmation {
            method: PaymentMethod::Card,
            amount: order.amount_due(),
            reference: Some(format!("ch_{}", order.order_id.as_str())),
        };
        self.orders.record_payment(&order.order_id, payment).await.expect("Error recording payment")
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        self.db.pool().close().await;
        if let Err(e) = Sqlite::drop_database(&self.db_path).await {
            warn!("🚀️ Could not remove {}: {e}", self.db_path);
        }
    }
}
