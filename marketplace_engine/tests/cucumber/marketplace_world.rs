use cucumber::World;
use marketplace_engine::{
    db_types::{Order, OrderId, Refund, Withdrawal},
    MarketplaceError,
};

use crate::support::marketplace::Marketplace;

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<Marketplace>,
    pub last_error: Option<MarketplaceError>,
    pub last_withdrawal: Option<Withdrawal>,
    pub last_refund: Option<Refund>,
    pub pickup_code: Option<String>,
}

impl MarketplaceWorld {
    pub fn mp(&self) -> &Marketplace {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub async fn order(&self, order_id: &str) -> Order {
        self.mp().orders.fetch_order(&OrderId::from(order_id)).await.expect("Error fetching order")
    }

    /// Keeps the outcome of a step whose failure a later step asserts on.
    pub fn remember<T>(&mut self, result: Result<T, MarketplaceError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                self.last_error = Some(e);
                None
            },
        }
    }
}
