use crate::{
    db_types::{FeeSettings, Seller, Store},
    traits::RepositoryError,
};

#[allow(async_fn_in_trait)]
pub trait StoreRepository {
    /// Creates the store, or replaces the name and settings of an existing store with the same id.
    async fn upsert_store(&self, store: Store) -> Result<Store, RepositoryError>;

    async fn fetch_store(&self, store_id: &str) -> Result<Option<Store>, RepositoryError>;

    async fn update_fee_settings(&self, store_id: &str, settings: &FeeSettings) -> Result<Store, RepositoryError>;
}

#[allow(async_fn_in_trait)]
pub trait SellerRepository {
    /// Registers a seller. Fails with [`RepositoryError::AlreadyExists`] if the seller id is taken.
    async fn insert_seller(&self, seller: Seller) -> Result<Seller, RepositoryError>;

    async fn fetch_seller(&self, seller_id: &str) -> Result<Option<Seller>, RepositoryError>;

    /// Links the seller to their connected account at the payment processor.
    async fn set_processor_account(&self, seller_id: &str, account: &str) -> Result<Seller, RepositoryError>;
}
