use std::fmt::Debug;

use chrono::Utc;
use log::*;
use mkt_common::helpers::normalize_country_code;
use rust_decimal::Decimal;

use crate::{
    db_types::{FeeSettings, Seller, ServiceFeeType, Store},
    mp_api::errors::MarketplaceError,
    rules::validation::ValidationErrors,
    traits::{RepositoryError, SellerRepository, StoreRepository},
};

/// Sellers and their stores.
pub struct StoreApi<B> {
    db: B,
}

impl<B> Debug for StoreApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreApi")
    }
}

impl<B> StoreApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> StoreApi<B>
where B: StoreRepository + SellerRepository
{
    /// Registers a new seller. The country must be an ISO 3166 alpha-2 code.
    pub async fn register_seller(&self, seller_id: &str, country: &str) -> Result<Seller, MarketplaceError> {
        let mut errors = ValidationErrors::new();
        let country_code = normalize_country_code(country);
        errors
            .check(!seller_id.trim().is_empty(), "A seller id is required")
            .check(country_code.is_some(), format!("{country} is not a valid country code"));
        errors.into_result()?;
        let seller = Seller {
            seller_id: seller_id.to_string(),
            country: country_code.unwrap_or_default(),
            processor_account: None,
            created_at: Utc::now(),
        };
        let seller = self.db.insert_seller(seller).await.map_err(|e| match e {
            RepositoryError::AlreadyExists(_) => MarketplaceError::AlreadyExists(format!("Seller {seller_id}")),
            e => e.into(),
        })?;
        info!("🏪️ Seller {seller_id} registered in {}", seller.country);
        Ok(seller)
    }

    pub async fn seller(&self, seller_id: &str) -> Result<Seller, MarketplaceError> {
        self.db.fetch_seller(seller_id).await?.ok_or_else(|| MarketplaceError::SellerNotFound(seller_id.to_string()))
    }

    pub async fn link_processor_account(&self, seller_id: &str, account: &str) -> Result<Seller, MarketplaceError> {
        if account.trim().is_empty() {
            return Err(MarketplaceError::invalid("A payment processor account id is required"));
        }
        self.seller(seller_id).await?;
        Ok(self.db.set_processor_account(seller_id, account).await?)
    }

    /// Creates or updates a store. The owning seller must exist.
    pub async fn save_store(&self, store: Store) -> Result<Store, MarketplaceError> {
        let mut errors = validate_fee_settings(&store.fee_settings);
        errors
            .check(!store.store_id.trim().is_empty(), "A store id is required")
            .check(!store.name.trim().is_empty(), "The store needs a name");
        errors.into_result()?;
        self.seller(&store.seller_id).await?;
        let store = self.db.upsert_store(store).await?;
        debug!("🏪️ Store {} saved for seller {}", store.store_id, store.seller_id);
        Ok(store)
    }

    pub async fn store(&self, store_id: &str) -> Result<Store, MarketplaceError> {
        self.db.fetch_store(store_id).await?.ok_or_else(|| MarketplaceError::StoreNotFound(store_id.to_string()))
    }

    /// Replaces a store's fee settings. Orders that already requested payment keep the fees they were quoted.
    pub async fn update_fee_settings(&self, store_id: &str, settings: FeeSettings) -> Result<Store, MarketplaceError> {
        validate_fee_settings(&settings).into_result()?;
        self.store(store_id).await?;
        let store = self.db.update_fee_settings(store_id, &settings).await?;
        debug!("🏪️ Fee settings updated for store {store_id}");
        Ok(store)
    }
}

fn validate_fee_settings(settings: &FeeSettings) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors
        .check(!settings.delivery_fee.is_negative(), "The delivery fee cannot be negative")
        .check(!settings.free_delivery_threshold.is_negative(), "The free delivery threshold cannot be negative")
        .check(!settings.service_fee_amount.is_negative(), "The service fee cannot be negative")
        .check(!settings.service_fee_max.is_negative(), "The service fee cap cannot be negative");
    if settings.service_fee_enabled && settings.service_fee_type == ServiceFeeType::Percentage {
        errors.check(
            settings.service_fee_rate >= Decimal::ZERO && settings.service_fee_rate <= Decimal::ONE_HUNDRED,
            "The service fee rate must be between 0 and 100 percent",
        );
    }
    errors
}
