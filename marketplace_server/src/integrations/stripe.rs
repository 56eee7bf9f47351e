//! A [`PaymentProcessor`] backed by the Stripe REST API.
//!
//! Stripe takes form-encoded request bodies and answers with JSON. Amounts are in minor units and currencies are
//! lower-case ISO codes. Calls on behalf of a seller's connected account carry the `Stripe-Account` header.
use std::sync::Arc;

use log::*;
use marketplace_engine::{
    db_types::PaymentMethod,
    traits::{
        PaymentIntent,
        PaymentIntentRequest,
        PaymentProcessor,
        Payout,
        PayoutRequest,
        ProcessorBalance,
        ProcessorError,
        ProcessorRefund,
        ProcessorRefundRequest,
    },
};
use mkt_common::Money;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{config::StripeConfig, errors::ServerError};

#[derive(Clone)]
pub struct StripeClient {
    api_url: String,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    status: String,
}

#[derive(Deserialize)]
struct StripeObject {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct StripeFunds {
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct StripeBalance {
    available: Vec<StripeFunds>,
    pending: Vec<StripeFunds>,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid Stripe API key. {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { api_url: config.api_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    async fn form_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        account: Option<&str>,
    ) -> Result<T, ProcessorError> {
        let url = format!("{}{path}", self.api_url);
        trace!("💳️ Sending Stripe request: {method} {url}");
        let mut req = self.client.request(method.clone(), url);
        if let Some(account) = account {
            req = req.header("Stripe-Account", account);
        }
        if !params.is_empty() {
            req = if method == Method::GET { req.query(params) } else { req.form(params) };
        }
        let response = req.send().await.map_err(|e| ProcessorError::Unavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ Stripe request successful. {status}");
            return response.json::<T>().await.map_err(|e| ProcessorError::Unavailable(e.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&body).map(|b| b.error.message).unwrap_or(body);
        warn!("💳️ Stripe answered {status}: {message}");
        Err(classify_failure(status, message))
    }
}

fn classify_failure(status: StatusCode, message: String) -> ProcessorError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => ProcessorError::InvalidRequest(message),
        StatusCode::TOO_MANY_REQUESTS => ProcessorError::Unavailable(message),
        s if s.is_client_error() => ProcessorError::Rejected(message),
        _ => ProcessorError::Unavailable(format!("{status} {message}")),
    }
}

/// The Stripe payment method type that settles `method`. Wallet payments are card payments as far as Stripe is
/// concerned.
fn stripe_method_type(method: PaymentMethod) -> Option<&'static str> {
    match method {
        PaymentMethod::Card | PaymentMethod::GooglePay | PaymentMethod::ApplePay => Some("card"),
        PaymentMethod::Paypal => Some("paypal"),
        PaymentMethod::Klarna => Some("klarna"),
        PaymentMethod::BankTransfer | PaymentMethod::Cash => None,
    }
}

fn sum_for_currency(funds: &[StripeFunds], currency: &str) -> Money {
    funds
        .iter()
        .filter(|f| f.currency.eq_ignore_ascii_case(currency))
        .map(|f| Money::from_minor_units(f.amount))
        .sum()
}

fn param<V: ToString>(key: &str, value: V) -> (String, String) {
    (key.to_string(), value.to_string())
}

impl PaymentProcessor for StripeClient {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<PaymentIntent, ProcessorError> {
        let method_type = stripe_method_type(request.method)
            .ok_or_else(|| ProcessorError::InvalidRequest(format!("{} is not settled by Stripe", request.method)))?;
        let mut params = vec![
            param("amount", request.amount_minor),
            param("currency", request.currency.to_ascii_lowercase()),
            param("payment_method_types[]", method_type),
            param("metadata[order_id]", request.order_id.as_str()),
            param("metadata[method]", request.method),
        ];
        if let Some(account) = &request.destination_account {
            params.push(param("transfer_data[destination]", account));
        }
        let intent: StripePaymentIntent = self.form_query(Method::POST, "/payment_intents", &params, None).await?;
        debug!("💳️ Stripe payment intent {} created for order {}", intent.id, request.order_id);
        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            amount_minor: intent.amount,
            currency: intent.currency.to_ascii_uppercase(),
            status: intent.status,
        })
    }

    async fn create_refund(&self, request: ProcessorRefundRequest) -> Result<ProcessorRefund, ProcessorError> {
        let target = if request.charge_reference.starts_with("pi_") { "payment_intent" } else { "charge" };
        let params = vec![
            param(target, &request.charge_reference),
            param("amount", request.amount_minor),
            param("reason", "requested_by_customer"),
            param("metadata[reason]", &request.reason),
        ];
        let refund: StripeObject = self.form_query(Method::POST, "/refunds", &params, None).await?;
        debug!("💳️ Stripe refund {} is {}", refund.id, refund.status);
        Ok(ProcessorRefund { id: refund.id, status: refund.status })
    }

    async fn account_balance(&self, account: Option<&str>) -> Result<ProcessorBalance, ProcessorError> {
        let balance: StripeBalance = self.form_query(Method::GET, "/balance", &[], account).await?;
        let currency = balance
            .available
            .first()
            .or_else(|| balance.pending.first())
            .map(|f| f.currency.clone())
            .unwrap_or_else(|| mkt_common::DEFAULT_CURRENCY_CODE.to_ascii_lowercase());
        Ok(ProcessorBalance {
            available: sum_for_currency(&balance.available, &currency),
            pending: sum_for_currency(&balance.pending, &currency),
            currency: currency.to_ascii_uppercase(),
        })
    }

    async fn create_payout(&self, request: PayoutRequest) -> Result<Payout, ProcessorError> {
        let params =
            vec![param("amount", request.amount_minor), param("currency", request.currency.to_ascii_lowercase())];
        let payout: StripeObject = self.form_query(Method::POST, "/payouts", &params, Some(&request.account)).await?;
        debug!("💳️ Stripe payout {} to {} is {}", payout.id, request.account, payout.status);
        Ok(Payout { id: payout.id, status: payout.status })
    }
}
