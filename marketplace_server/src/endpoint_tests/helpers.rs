use std::str::FromStr;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::{Duration, Utc};
use log::debug;
use marketplace_engine::{
    db_types::{DeliveryType, FeeSettings, NewOrder, Order, OrderId, Seller, ServiceFeeType, Store},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SellerRepository,
    SqliteDatabase,
    StoreRepository,
    WalletRepository,
};
use mkt_common::{Money, Secret};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};

use super::mocks::{MockGeo, RecordingProcessor};
use crate::{
    config::ServerOptions,
    middleware::StripeSignatureMiddlewareFactory,
    routes::StripeWebhookRoute,
    server::{api_scope, configure_api_data},
};

pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

pub fn money(s: &str) -> Money {
    Money::from_str(s).unwrap()
}

pub fn parse<T: DeserializeOwned>(body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Unexpected response body {body}: {e}"))
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

/// A fresh database behind the full API, with a recording payment processor.
pub struct TestMarketplace {
    pub db: SqliteDatabase,
    pub processor: RecordingProcessor,
    pub options: ServerOptions,
    visitor_country: Option<String>,
}

impl TestMarketplace {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        Self { db, processor: RecordingProcessor::default(), options: ServerOptions::default(), visitor_country: None }
    }

    /// Every IP address resolves to `country`. Without this, lookups fail.
    pub fn with_visitor_country(mut self, country: &str) -> Self {
        self.visitor_country = Some(country.to_string());
        self
    }

    fn geo(&self) -> MockGeo {
        let mut geo = MockGeo::new();
        let country = self.visitor_country.clone();
        geo.expect_country_for_ip().returning(move |ip| {
            country.clone().ok_or(marketplace_engine::traits::GeoLookupError::UnknownAddress(ip))
        });
        geo
    }

    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new()
            .configure(|cfg| {
                let producers = EventProducers::default();
                configure_api_data(cfg, self.db.clone(), self.processor.clone(), self.geo(), producers, &self.options)
            })
            .service(api_scope::<SqliteDatabase, RecordingProcessor, MockGeo>());
        let service = test::init_service(app).await;
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
        debug!("Response {status}: {body}");
        (status, body)
    }

    /// Calls the Stripe webhook behind signature checks with [`WEBHOOK_SECRET`].
    pub async fn call_webhook(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new()
            .configure(|cfg| {
                let producers = EventProducers::default();
                configure_api_data(cfg, self.db.clone(), self.processor.clone(), self.geo(), producers, &self.options)
            })
            .service(
                web::scope("/webhooks")
                    .wrap(StripeSignatureMiddlewareFactory::new(Secret::new(WEBHOOK_SECRET.to_string()), 300, true))
                    .service(StripeWebhookRoute::<SqliteDatabase>::new()),
            );
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
                (status, body)
            },
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::get().uri(path)).await
    }

    pub async fn post(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::post().uri(path)).await
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> (StatusCode, String) {
        self.call(TestRequest::post().uri(path).set_json(body)).await
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, body: &T) -> (StatusCode, String) {
        self.call(TestRequest::put().uri(path).set_json(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::delete().uri(path)).await
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

    pub async fn store(&self, seller_id: &str, store_id: &str, fee_settings: FeeSettings) -> Store {
        if self.db.fetch_seller(seller_id).await.unwrap().is_none() {
            self.seller(seller_id, "US", 60).await;
        }
        let store = Store {
            store_id: store_id.to_string(),
            seller_id: seller_id.to_string(),
            name: format!("{store_id} market"),
            fee_settings,
        };
        self.db.upsert_store(store).await.expect("Error saving store")
    }

    pub async fn credit(&self, seller_id: &str, amount: &str, currency: &str) {
        self.db.credit_wallet(seller_id, money(amount), currency).await.expect("Error crediting wallet");
    }

    /// Opens an order, adds `items` (name, price, quantity) and takes it to `ready_for_payment`, all over HTTP.
    pub async fn order_ready_for_payment(
        &self,
        order_id: &str,
        store_id: &str,
        delivery_type: DeliveryType,
        items: &[(&str, &str, u32)],
    ) -> Order {
        let new_order = NewOrder::new(OrderId::from(order_id), store_id, "alice", delivery_type);
        let (status, body) = self.post_json("/api/orders", &new_order).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        for (name, price, quantity) in items {
            let item = serde_json::json!({ "name": name, "price": money(price), "quantity": quantity });
            let (status, body) = self.post_json(&format!("/api/orders/{order_id}/items"), &item).await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }
        for step in ["done_adding", "bagging", "request_payment"] {
            let (status, body) = self.post(&format!("/api/orders/{order_id}/{step}")).await;
            assert_eq!(status, StatusCode::OK, "{step}: {body}");
        }
        let (_, body) = self.get(&format!("/api/orders/{order_id}")).await;
        parse(&body)
    }
}
