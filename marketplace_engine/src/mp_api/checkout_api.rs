use std::{fmt::Debug, net::IpAddr};

use log::*;

use crate::{
    db_types::{Order, OrderId, PaymentMethod},
    mp_api::errors::MarketplaceError,
    rules::{
        checkout::{available_payment_methods, validate_card_number},
        lifecycle::{ensure_action_allowed, OrderAction},
        validation::ValidationErrors,
    },
    traits::{CountryResolver, MarketplaceDatabase, PaymentIntent, PaymentIntentRequest, PaymentProcessor},
};

/// Payment method selection and payment intents for orders that are ready for payment.
pub struct CheckoutApi<B, P> {
    db: B,
    processor: P,
}

impl<B, P> Debug for CheckoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, P> CheckoutApi<B, P> {
    pub fn new(db: B, processor: P) -> Self {
        Self { db, processor }
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// The payment methods available to a customer in `country` for this order.
    pub async fn payment_options(
        &self,
        order_id: &OrderId,
        country: &str,
    ) -> Result<Vec<PaymentMethod>, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let store = self
            .db
            .fetch_store(&order.store_id)
            .await?
            .ok_or_else(|| MarketplaceError::StoreNotFound(order.store_id.clone()))?;
        Ok(available_payment_methods(&store.fee_settings, order.delivery_type, country))
    }

    /// Like [`Self::payment_options`], but locates the customer by IP address. If the lookup fails, the customer is
    /// assumed to be in `default_country`.
    pub async fn payment_options_for_ip<R: CountryResolver>(
        &self,
        order_id: &OrderId,
        ip: IpAddr,
        resolver: &R,
        default_country: &str,
    ) -> Result<Vec<PaymentMethod>, MarketplaceError> {
        let country = resolver.country_or_default(ip, default_country).await;
        trace!("💳️ Customer at {ip} is shopping from {country}");
        self.payment_options(order_id, &country).await
    }

    /// Asks the payment processor to prepare a charge for the order's frozen total.
    ///
    /// The order must be ready for payment, and `method` must be a processor-settled method available to the customer.
    /// Nothing is recorded against the order. The payment is recorded once the processor confirms it.
    pub async fn create_payment_intent(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
        country: &str,
    ) -> Result<PaymentIntent, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_action_allowed(&order, OrderAction::RecordPayment)?;
        let store = self
            .db
            .fetch_store(&order.store_id)
            .await?
            .ok_or_else(|| MarketplaceError::StoreNotFound(order.store_id.clone()))?;
        let seller = self.db.fetch_seller(&store.seller_id).await?;
        let mut errors = ValidationErrors::new();
        errors
            .check(
                available_payment_methods(&store.fee_settings, order.delivery_type, country).contains(&method),
                format!("{method} is not available for this order"),
            )
            .check(method.is_processor_settled(), format!("{method} payments are not taken online"));
        let amount_minor = order.fees.as_ref().and_then(|f| f.total.to_minor_units());
        errors.check(amount_minor.is_some_and(|a| a > 0), "The order total cannot be charged");
        errors.into_result()?;
        let request = PaymentIntentRequest {
            order_id: order_id.clone(),
            amount_minor: amount_minor.unwrap_or_default(),
            currency: order.currency.clone(),
            method,
            destination_account: seller.and_then(|s| s.processor_account),
        };
        let intent = self.processor.create_payment_intent(request).await?;
        info!("💳️ Payment intent {} created for order {order_id} ({} minor units)", intent.id, intent.amount_minor);
        Ok(intent)
    }

    /// Checks a card number before it is handed to the payment processor.
    pub fn validate_card(&self, number: &str) -> Result<(), MarketplaceError> {
        validate_card_number(number).map_err(MarketplaceError::from)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
    }
}
