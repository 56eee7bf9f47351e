use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryType, FeeSettings, Order, PaymentMethod},
    rules::validation::ValidationErrors,
};

/// Countries in which Klarna is offered at checkout.
pub const KLARNA_COUNTRIES: [&str; 12] = ["US", "GB", "DE", "AT", "NL", "BE", "SE", "NO", "FI", "DK", "AU", "CA"];

/// The payment methods a customer in `country` can choose from for an order at a store with `settings`.
pub fn available_payment_methods(
    settings: &FeeSettings,
    delivery_type: DeliveryType,
    country: &str,
) -> Vec<PaymentMethod> {
    if settings.manual_transfer_only {
        return vec![PaymentMethod::BankTransfer];
    }
    let mut methods = Vec::with_capacity(7);
    if settings.card_payments_enabled {
        methods.push(PaymentMethod::Card);
        methods.push(PaymentMethod::ApplePay);
    }
    if settings.google_pay_enabled {
        methods.push(PaymentMethod::GooglePay);
    }
    if settings.card_payments_enabled && KLARNA_COUNTRIES.contains(&country.to_ascii_uppercase().as_str()) {
        methods.push(PaymentMethod::Klarna);
    }
    methods.push(PaymentMethod::Paypal);
    methods.push(PaymentMethod::BankTransfer);
    if delivery_type == DeliveryType::PayAtStore {
        methods.push(PaymentMethod::Cash);
    }
    methods
}

/// A payment the seller or the payment processor reports for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub method: PaymentMethod,
    pub amount: Money,
    /// The processor's charge reference. Required for processor-settled payments.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Checks a reported payment against the order's frozen total and the store's payment settings.
///
/// The customer's country is not known at this point, so a Klarna payment is accepted whenever card payments are.
pub fn validate_payment(
    payment: &PaymentConfirmation,
    order: &Order,
    settings: &FeeSettings,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let allowed = match payment.method {
        PaymentMethod::Klarna => !settings.manual_transfer_only && settings.card_payments_enabled,
        method => available_payment_methods(settings, order.delivery_type, "").contains(&method),
    };
    errors.check(allowed, format!("{} payments are not accepted for this order", payment.method));
    match &order.fees {
        Some(fees) => errors.check(
            payment.amount == fees.total,
            format!("The payment of {} does not match the order total of {}", payment.amount, fees.total),
        ),
        None => errors.check(false, "Payment has not been requested for this order"),
    };
    if payment.method.is_processor_settled() {
        let has_reference = payment.reference.as_ref().is_some_and(|r| !r.trim().is_empty());
        errors.check(has_reference, "A payment reference is required for digital payments");
    }
    errors.into_result()
}

/// Validates a card number: spaces and dashes are ignored, 12 to 19 digits, valid Luhn checksum.
pub fn validate_card_number(number: &str) -> Result<(), ValidationErrors> {
    let cleaned = number.chars().filter(|c| !matches!(c, ' ' | '-')).collect::<String>();
    let mut errors = ValidationErrors::new();
    if cleaned.is_empty() {
        errors.push("A card number is required");
        return errors.into_result();
    }
    let digits = cleaned.chars().map(|c| c.to_digit(10)).collect::<Option<Vec<u32>>>();
    let Some(digits) = digits else {
        errors.push("The card number may only contain digits");
        return errors.into_result();
    };
    errors.check((12..=19).contains(&digits.len()), "The card number must have between 12 and 19 digits");
    errors.check(luhn_checksum(&digits) == 0, "The card number is not valid");
    errors.into_result()
}

fn luhn_checksum(digits: &[u32]) -> u32 {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10
}
