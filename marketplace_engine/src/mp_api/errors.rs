use log::*;
use thiserror::Error;

use crate::{
    db_types::OrderId,
    rules::{
        lifecycle::LifecycleError,
        refunds::RefundRuleError,
        validation::ValidationErrors,
        withdrawals::WithdrawalError,
    },
    traits::{ProcessorError, RepositoryError},
};

/// A call to an external service failed. Nothing was changed as a result of the failed call.
#[derive(Debug, Clone, Error)]
#[error("{service} failed: {message}")]
pub struct RemoteFailure {
    pub service: String,
    pub message: String,
}

impl RemoteFailure {
    pub fn new<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self { service: service.into(), message: message.into() }
    }
}

impl From<ProcessorError> for RemoteFailure {
    fn from(e: ProcessorError) -> Self {
        Self::new("The payment processor", e.to_string())
    }
}

/// A best-effort side effect (a chat message, an analytics event) failed after the primary operation succeeded.
///
/// These are logged and swallowed. They never fail the operation that triggered them.
#[derive(Debug, Clone, Error)]
#[error("Could not {effect}: {reason}")]
pub struct SideEffectFailure {
    pub effect: String,
    pub reason: String,
}

impl SideEffectFailure {
    pub fn new<S: Into<String>, R: ToString>(effect: S, reason: R) -> Self {
        Self { effect: effect.into(), reason: reason.to_string() }
    }

    pub fn log(&self) {
        warn!("⚠️ {self}");
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("Invalid request. {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{0}")]
    Remote(#[from] RemoteFailure),
    #[error("Order {0} is locked. Items can no longer be added, removed or changed.")]
    OrderLocked(OrderId),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("This request has already been processed. {0}")]
    AlreadyProcessed(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Store {0} does not exist")]
    StoreNotFound(String),
    #[error("Seller {0} does not exist")]
    SellerNotFound(String),
    #[error("Refund #{0} does not exist")]
    RefundNotFound(i64),
    #[error("Withdrawal not allowed. {0}")]
    WithdrawalNotAllowed(#[from] WithdrawalError),
    #[error("Could not find a free pickup code for store {0}")]
    PickupCodesExhausted(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl MarketplaceError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Validation(ValidationErrors::single(message))
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(s) => Self::AlreadyProcessed(s),
            RepositoryError::AlreadyExists(s) => Self::AlreadyExists(s),
            RepositoryError::NotFound(s) => Self::DatabaseError(format!("{s} was expected to exist, but does not")),
            RepositoryError::DatabaseError(s) | RepositoryError::CorruptData(s) => Self::DatabaseError(s),
        }
    }
}

impl From<LifecycleError> for MarketplaceError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::OrderLocked(id) => Self::OrderLocked(id),
            LifecycleError::EmptyCart(_) => Self::invalid(e.to_string()),
            LifecycleError::InvalidTransition { .. } | LifecycleError::ActionNotAllowed { .. } => {
                Self::InvalidTransition(e.to_string())
            },
        }
    }
}

impl From<RefundRuleError> for MarketplaceError {
    fn from(e: RefundRuleError) -> Self {
        Self::InvalidTransition(e.to_string())
    }
}

impl From<ProcessorError> for MarketplaceError {
    fn from(e: ProcessorError) -> Self {
        Self::Remote(e.into())
    }
}
