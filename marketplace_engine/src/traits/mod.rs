//! # Backend and external service contracts
//!
//! This module defines the behaviour the marketplace engine needs from the outside world.
//!
//! ## Storage
//! Each kind of record has its own repository trait. A backend implements all of them, plus the composite operations
//! in [`MarketplaceDatabase`] that have to touch several tables atomically.
//!
//! * [`OrderRepository`] stores orders and performs conditional status changes.
//! * [`StoreRepository`] stores store profiles and their fee settings.
//! * [`SellerRepository`] stores seller accounts.
//! * [`WalletRepository`] tracks seller balances and earnings.
//! * [`RefundRepository`] stores refund requests and their progress.
//! * [`WithdrawalRepository`] records withdrawals and debits wallets.
//! * [`MessageRepository`] stores buyer/seller conversation messages.
//!
//! Every state change that must happen at most once (claiming a pickup code, approving a refund, moving an order
//! along) is a conditional update keyed on the expected current state. If another caller got there first, the update
//! affects nothing and the repository returns [`RepositoryError::Conflict`].
//!
//! ## External services
//! * [`PaymentProcessor`] charges, refunds and pays out through the payment provider.
//! * [`CountryResolver`] maps a client IP address to a country.
mod country_resolver;
mod data_objects;
mod marketplace_database;
mod message_repository;
mod order_repository;
mod payment_processor;
mod refund_repository;
mod store_repository;
mod wallet_repository;
mod withdrawal_repository;

pub use country_resolver::{CountryResolver, GeoLookupError};
pub use data_objects::{OrderStatusChange, PickupClaim, RefundTransition};
pub use marketplace_database::{MarketplaceDatabase, RepositoryError};
pub use message_repository::MessageRepository;
pub use order_repository::OrderRepository;
pub use payment_processor::{
    PaymentIntent,
    PaymentIntentRequest,
    PaymentProcessor,
    Payout,
    PayoutRequest,
    ProcessorBalance,
    ProcessorError,
    ProcessorRefund,
    ProcessorRefundRequest,
};
pub use refund_repository::RefundRepository;
pub use store_repository::{SellerRepository, StoreRepository};
pub use wallet_repository::WalletRepository;
pub use withdrawal_repository::WithdrawalRepository;
