//! # Marketplace engine public API
//!
//! The `mp_api` module exposes the programmatic API of the marketplace engine. The API is modular, so that clients
//! can pick the parts they need.
//!
//! * [`order_flow_api`] moves orders through their lifecycle: cart, bagging, payment, pickup code and handoff.
//! * [`checkout_api`] selects payment methods and creates payment intents with the payment processor.
//! * [`refund_api`] handles refund requests, automatic processor refunds and the manual transfer flow.
//! * [`withdrawal_api`] lets sellers withdraw from their wallet.
//! * [`store_api`] registers sellers and manages store fee settings.
//! * [`messaging_api`] posts and reads conversation messages.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits it needs, plus the external services and
//! event producers where relevant.
//!
//! ```rust,ignore
//! use marketplace_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let session = api.session(&order_id).await?;
//! ```
pub mod checkout_api;
pub mod errors;
pub mod messaging_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod refund_api;
pub mod store_api;
pub mod withdrawal_api;
