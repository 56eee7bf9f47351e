use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use marketplace_engine::MarketplaceError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Webhook signature check failed. {0}")]
    InvalidSignature(String),
    #[error("{0}")]
    Marketplace(#[from] MarketplaceError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Marketplace(e) => marketplace_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::Marketplace(MarketplaceError::Validation(errors)) => {
                json!({ "error": self.to_string(), "details": errors.messages() })
            },
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

fn marketplace_status(e: &MarketplaceError) -> StatusCode {
    match e {
        MarketplaceError::Validation(_) => StatusCode::BAD_REQUEST,
        MarketplaceError::OrderLocked(_) |
        MarketplaceError::InvalidTransition(_) |
        MarketplaceError::AlreadyProcessed(_) |
        MarketplaceError::AlreadyExists(_) => StatusCode::CONFLICT,
        MarketplaceError::OrderNotFound(_) |
        MarketplaceError::StoreNotFound(_) |
        MarketplaceError::SellerNotFound(_) |
        MarketplaceError::RefundNotFound(_) => StatusCode::NOT_FOUND,
        MarketplaceError::WithdrawalNotAllowed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketplaceError::Remote(_) => StatusCode::BAD_GATEWAY,
        MarketplaceError::PickupCodesExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        MarketplaceError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
