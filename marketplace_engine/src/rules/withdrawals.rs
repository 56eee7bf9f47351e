//! Withdrawal eligibility.
//!
//! A seller can withdraw from their wallet once their account is [`ELIGIBILITY_WAIT_DAYS`] days old, up to
//! `monthly_limit` times per calendar month, in amounts within the bounds configured for their country.
use chrono::{DateTime, Datelike, Duration, Months, Utc};
use mkt_common::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Seller, Wallet};

pub const ELIGIBILITY_WAIT_DAYS: i64 = 14;
pub const MONTHLY_WITHDRAWAL_LIMIT: u32 = 3;
/// Used for sellers whose country has no withdrawal configuration.
pub const DEFAULT_WITHDRAWAL_COUNTRY: &str = "US";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalError {
    #[error("Withdrawals are available from {eligible_from}, {ELIGIBILITY_WAIT_DAYS} days after the account was created")]
    NotYetEligible { eligible_from: DateTime<Utc> },
    #[error("The limit of {limit} withdrawals per month has been reached")]
    MonthlyLimitReached { limit: u32 },
    #[error("Withdrawals must be between {min} and {max} {currency}. {amount} is out of bounds")]
    OutOfBounds { amount: Money, min: Money, max: Money, currency: String },
    #[error("Cannot withdraw {requested}. The available balance is {available}")]
    InsufficientBalance { requested: Money, available: Money },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryConfig {
    pub country: String,
    pub currency: String,
    pub min_amount: Money,
    pub max_amount: Money,
    /// Percentage withheld as tax, e.g. `15` for 15%.
    pub tax_rate: Decimal,
    pub monthly_limit: u32,
}

impl CountryConfig {
    fn new(country: &str, currency: &str, min: i64, max: i64, tax_rate: Decimal) -> Self {
        Self {
            country: country.to_string(),
            currency: currency.to_string(),
            min_amount: Money::from(min),
            max_amount: Money::from(max),
            tax_rate,
            monthly_limit: MONTHLY_WITHDRAWAL_LIMIT,
        }
    }
}

/// The withdrawal configuration for an ISO 3166 alpha-2 country code.
pub fn country_config(country: &str) -> Option<CountryConfig> {
    let config = match country.to_ascii_uppercase().as_str() {
        "US" => CountryConfig::new("US", "USD", 10, 10_000, Decimal::ZERO),
        "GB" => CountryConfig::new("GB", "GBP", 10, 8_000, Decimal::ZERO),
        "ZA" => CountryConfig::new("ZA", "ZAR", 100, 100_000, Decimal::new(15, 0)),
        "NG" => CountryConfig::new("NG", "NGN", 5_000, 5_000_000, Decimal::new(75, 1)),
        "KE" => CountryConfig::new("KE", "KES", 1_000, 1_000_000, Decimal::new(16, 0)),
        _ => return None,
    };
    Some(config)
}

/// Like [`country_config`], but falls back to the [`DEFAULT_WITHDRAWAL_COUNTRY`].
pub fn country_config_or_default(country: &str) -> CountryConfig {
    country_config(country)
        .or_else(|| country_config(DEFAULT_WITHDRAWAL_COUNTRY))
        .unwrap_or_else(|| CountryConfig::new(DEFAULT_WITHDRAWAL_COUNTRY, "USD", 10, 10_000, Decimal::ZERO))
}

/// What the seller will receive for an allowed withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQuote {
    pub amount: Money,
    pub tax: Money,
    pub net_amount: Money,
    pub currency: String,
    pub country: String,
}

/// Everything needed to decide whether a withdrawal may go ahead.
#[derive(Debug, Clone)]
pub struct WithdrawalCheck<'a> {
    pub seller: &'a Seller,
    pub wallet: &'a Wallet,
    pub config: &'a CountryConfig,
    pub withdrawals_this_month: u32,
    pub now: DateTime<Utc>,
}

/// The first instant a seller created at `created_at` may withdraw.
pub fn eligible_from(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(ELIGIBILITY_WAIT_DAYS)
}

/// Checks a withdrawal of `amount`. On success, returns the tax and net payout.
pub fn check_withdrawal(check: &WithdrawalCheck, amount: Money) -> Result<WithdrawalQuote, WithdrawalError> {
    let WithdrawalCheck { seller, wallet, config, withdrawals_this_month, now } = check;
    let eligible_from = eligible_from(seller.created_at);
    if *now < eligible_from {
        return Err(WithdrawalError::NotYetEligible { eligible_from });
    }
    if *withdrawals_this_month >= config.monthly_limit {
        return Err(WithdrawalError::MonthlyLimitReached { limit: config.monthly_limit });
    }
    if amount < config.min_amount || amount > config.max_amount {
        return Err(WithdrawalError::OutOfBounds {
            amount,
            min: config.min_amount,
            max: config.max_amount,
            currency: config.currency.clone(),
        });
    }
    if amount > wallet.balance {
        return Err(WithdrawalError::InsufficientBalance { requested: amount, available: wallet.balance });
    }
    let tax = amount.percent(config.tax_rate);
    Ok(WithdrawalQuote {
        amount,
        tax,
        net_amount: amount - tax,
        currency: config.currency.clone(),
        country: config.country.clone(),
    })
}

/// The start (inclusive) and end (exclusive) of the calendar month containing `now`, in UTC.
pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or(now);
    let end = start.checked_add_months(Months::new(1)).unwrap_or_else(|| start + Duration::days(31));
    (start, end)
}
