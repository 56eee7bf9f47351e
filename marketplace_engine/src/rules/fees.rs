//! Delivery and service fee calculation.
//!
//! Fees are computed from the cart subtotal and the store's [`FeeSettings`]. All arithmetic is exact; nothing is
//! rounded until an amount is handed to the payment processor.
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{DeliveryType, FeeSettings, OrderItem, ServiceFeeType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub service_fee: Money,
    pub total: Money,
}

impl FeeBreakdown {
    pub fn zero() -> Self {
        Self::default()
    }

    /// The part of the total that belongs to the seller. The service fee is kept by the platform.
    pub fn seller_share(&self) -> Money {
        self.subtotal + self.delivery_fee
    }
}

/// Calculates the fees for an order with the given subtotal.
pub fn calculate_fees(subtotal: Money, settings: &FeeSettings, delivery_type: DeliveryType) -> FeeBreakdown {
    let delivery_fee = delivery_fee(subtotal, settings, delivery_type);
    let service_fee = service_fee(subtotal, settings);
    let total = subtotal + delivery_fee + service_fee;
    FeeBreakdown { subtotal, delivery_fee, service_fee, total }
}

/// Calculates the fees for a list of cart items. An empty cart costs nothing.
pub fn quote_items(items: &[OrderItem], settings: &FeeSettings, delivery_type: DeliveryType) -> FeeBreakdown {
    if items.is_empty() {
        return FeeBreakdown::zero();
    }
    let subtotal = items.iter().map(OrderItem::line_total).sum();
    calculate_fees(subtotal, settings, delivery_type)
}

fn delivery_fee(subtotal: Money, settings: &FeeSettings, delivery_type: DeliveryType) -> Money {
    if delivery_type.is_collected_at_store() || !settings.delivery_enabled {
        return Money::zero();
    }
    let threshold = settings.free_delivery_threshold;
    if threshold.is_positive() && subtotal >= threshold {
        Money::zero()
    } else {
        settings.delivery_fee
    }
}

fn service_fee(subtotal: Money, settings: &FeeSettings) -> Money {
    if !settings.service_fee_enabled {
        return Money::zero();
    }
    match settings.service_fee_type {
        ServiceFeeType::Percentage => {
            let fee = subtotal.percent(settings.service_fee_rate);
            let cap = settings.service_fee_max;
            if cap.is_positive() && fee > cap {
                cap
            } else {
                fee
            }
        },
        ServiceFeeType::Fixed => settings.service_fee_amount,
    }
}
