//! Pure business rules for the marketplace order flow.
//!
//! Nothing in this module performs I/O. The APIs in [`crate::mp_api`] load state from a backend, ask these functions
//! what is allowed, and then persist the outcome.
pub mod checkout;
pub mod fees;
pub mod lifecycle;
pub mod pickup_code;
pub mod refunds;
pub mod validation;
pub mod withdrawals;
