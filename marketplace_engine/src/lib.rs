//! Marketplace Engine
//!
//! The marketplace engine runs the checkout of a chat-based marketplace: a customer fills a cart in a conversation with
//! a store, the seller bags the goods, the customer pays, and the order is handed off by delivery or at the store
//! against a pickup code. This library contains the core logic of that flow. It is provider-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Pure business rules ([`mod@rules`]): the order lifecycle state machine, the fee calculator, refund routing,
//!    pickup codes, checkout validation and withdrawal eligibility. None of these touch storage.
//! 2. Storage ([`mod@traits`] and [`mod@sqlite`]). Backends implement the repository traits, and the
//!    [`MarketplaceDatabase`] trait for the operations that must be atomic. SQLite is the supported backend.
//! 3. The public API ([`mod@mp_api`]). These structs combine the rules with a backend and a payment processor, and
//!    are what a server calls.
//!
//! The engine also emits events when orders change status, payments are recorded, refunds move along and sellers
//! withdraw money. A simple Actor framework is used so that you can easily hook into these events and perform custom
//! actions. See [`mod@events`].
pub mod db_types;
pub mod events;
pub mod mp_api;
pub mod rules;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mp_api::{
    checkout_api::CheckoutApi,
    errors::{MarketplaceError, RemoteFailure},
    messaging_api::MessagingApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    refund_api::RefundApi,
    store_api::StoreApi,
    withdrawal_api::WithdrawalApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CountryResolver,
    MarketplaceDatabase,
    MessageRepository,
    OrderRepository,
    PaymentProcessor,
    RefundRepository,
    RepositoryError,
    SellerRepository,
    StoreRepository,
    WalletRepository,
    WithdrawalRepository,
};
