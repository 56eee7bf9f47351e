use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{MessageKind, NewMessage, NewOrder, Order, OrderId, OrderItem, OrderStatusType, Store},
    events::{EventProducers, OrderPaidEvent, OrderStatusChangedEvent},
    mp_api::{
        errors::{MarketplaceError, SideEffectFailure},
        order_objects::{NewCartItem, OrderSession, WorkflowPhase},
    },
    rules::{
        checkout::{validate_payment, PaymentConfirmation},
        fees::{quote_items, FeeBreakdown},
        lifecycle::{allowed_actions, check_transition, ensure_action_allowed, ensure_cart_mutable, OrderAction},
        pickup_code::{PickupCode, MAX_PICKUP_CODE_ATTEMPTS},
        validation::ValidationErrors,
    },
    traits::{MarketplaceDatabase, OrderStatusChange, PickupClaim, RepositoryError},
};

/// The sender name used for messages the order flow posts into a conversation.
pub const SYSTEM_SENDER: &str = "system";

/// `OrderFlowApi` is the primary API for moving orders through their lifecycle, from the first item in the cart to
/// the handoff.
///
/// Every status change is a conditional update. If two callers race to move the same order, exactly one wins and the
/// other receives [`MarketplaceError::AlreadyProcessed`].
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Opens a new, empty cart at the given store.
    pub async fn start_order(&self, order: NewOrder) -> Result<Order, MarketplaceError> {
        let mut errors = ValidationErrors::new();
        errors
            .check(!order.order_id.as_str().trim().is_empty(), "An order id is required")
            .check(!order.customer_id.trim().is_empty(), "A customer id is required");
        errors.into_result()?;
        self.fetch_store(&order.store_id).await?;
        let order = self.db.insert_order(order).await.map_err(|e| match e {
            RepositoryError::AlreadyExists(_) => MarketplaceError::AlreadyExists("The order".to_string()),
            e => e.into(),
        })?;
        debug!("🔄️🛒️ Order {} opened at store {} for {}", order.order_id, order.store_id, order.customer_id);
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
    }

    /// Adds an item to the cart. If an item with the same name is already in the cart, its quantity is increased
    /// instead.
    pub async fn add_item(&self, order_id: &OrderId, item: NewCartItem) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_cart_mutable(&order)?;
        let item = item.into_order_item(&order.currency);
        validate_item(&item, &order)?;
        let mut items = order.items.clone();
        match items.iter_mut().find(|i| i.name == item.name) {
            Some(existing) if existing.price != item.price => {
                return Err(MarketplaceError::invalid(format!(
                    "{} is already in the cart at a different price ({})",
                    item.name, existing.price
                )));
            },
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }
        self.save_cart(order_id, items).await
    }

    /// Sets the quantity of a cart item. A quantity of zero removes the item.
    pub async fn update_quantity(
        &self,
        order_id: &OrderId,
        name: &str,
        quantity: u32,
    ) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_cart_mutable(&order)?;
        let mut items = order.items;
        let Some(pos) = items.iter().position(|i| i.name == name) else {
            return Err(MarketplaceError::invalid(format!("There is no {name} in the cart")));
        };
        if quantity == 0 {
            items.remove(pos);
        } else {
            items[pos].quantity = quantity;
        }
        self.save_cart(order_id, items).await
    }

    pub async fn remove_item(&self, order_id: &OrderId, name: &str) -> Result<Order, MarketplaceError> {
        self.update_quantity(order_id, name, 0).await
    }

    /// The customer is done adding items. From here on the cart is locked for good.
    pub async fn finish_adding(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let change = OrderStatusChange::new(OrderStatusType::Shopping, OrderStatusType::DoneAdding);
        let order = self.transition(order, change).await?;
        self.post_system_message(&order, MessageKind::DoneAdding).await;
        Ok(order)
    }

    pub async fn mark_bagged(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let change = OrderStatusChange::new(OrderStatusType::DoneAdding, OrderStatusType::Bagging);
        let order = self.transition(order, change).await?;
        self.post_system_message(&order, MessageKind::ItemsBagged).await;
        Ok(order)
    }

    /// Freezes the fees for the bagged order and asks the customer to pay.
    pub async fn request_payment(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let store = self.fetch_store(&order.store_id).await?;
        let fees = quote_items(&order.items, &store.fee_settings, order.delivery_type);
        debug!("🔄️💰️ Fees for order {order_id} frozen at {} ({} on top of the goods)", fees.total, fees.total - fees.subtotal);
        let change =
            OrderStatusChange::new(OrderStatusType::Bagging, OrderStatusType::ReadyForPayment).with_fees(fees.clone());
        let order = self.transition(order, change).await?;
        self.post_system_message(&order, MessageKind::PaymentRequest { fees }).await;
        Ok(order)
    }

    /// Records a payment for an order that is ready for payment.
    ///
    /// The payment must match the frozen total and use a method the store accepts. Processor-settled payments credit
    /// the seller's wallet with their share in the same transaction that marks the order as paid.
    pub async fn record_payment(
        &self,
        order_id: &OrderId,
        payment: PaymentConfirmation,
    ) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_action_allowed(&order, OrderAction::RecordPayment)?;
        let store = self.fetch_store(&order.store_id).await?;
        validate_payment(&payment, &order, &store.fee_settings)?;
        check_transition(&order, OrderStatusType::Paid)?;
        let change = OrderStatusChange::new(OrderStatusType::ReadyForPayment, OrderStatusType::Paid)
            .with_payment(payment.method, payment.reference.clone());
        let (paid, wallet) = self.db.mark_order_paid(order_id, &store.seller_id, change).await?;
        info!(
            "🔄️💰️ Order {order_id} paid with {}. Seller {} balance is now {}",
            payment.method, wallet.seller_id, wallet.balance
        );
        self.call_status_changed_hook(order.status, &paid).await;
        for producer in &self.producers.order_paid_producer {
            producer.publish_event(OrderPaidEvent::new(paid.clone(), wallet.clone())).await;
        }
        let kind = MessageKind::PaymentConfirmed { method: payment.method, amount: payment.amount };
        self.post_system_message(&paid, kind).await;
        Ok(paid)
    }

    /// Issues the pickup code the customer shows at handoff.
    ///
    /// The code is unique among the store's unclaimed codes. Generation is retried up to
    /// [`MAX_PICKUP_CODE_ATTEMPTS`] times before giving up.
    pub async fn issue_pickup_code(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        ensure_action_allowed(&order, OrderAction::IssuePickupCode)?;
        for attempt in 1..=MAX_PICKUP_CODE_ATTEMPTS {
            let code = PickupCode::generate();
            if self.db.pickup_code_in_use(&order.store_id, &code).await? {
                debug!("🔄️🔑️ Pickup code collision for store {} on attempt {attempt}", order.store_id);
                continue;
            }
            let order = self.db.set_pickup_code(order_id, &code).await?;
            debug!("🔄️🔑️ Pickup code issued for order {order_id}");
            self.post_system_message(&order, MessageKind::PickupCode { code }).await;
            return Ok(order);
        }
        warn!("🔄️🔑️ Gave up looking for a free pickup code for store {}", order.store_id);
        Err(MarketplaceError::PickupCodesExhausted(order.store_id))
    }

    /// Verifies the code presented at handoff and completes the order.
    ///
    /// A code can be redeemed exactly once. A second attempt fails with [`MarketplaceError::AlreadyProcessed`], even
    /// if it races the first one.
    pub async fn verify_pickup_code(&self, order_id: &OrderId, input: &str) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        if order.pickup_code_used {
            let msg = format!("The pickup code for order {order_id} was already used");
            return Err(MarketplaceError::AlreadyProcessed(msg));
        }
        let Some(code) = &order.pickup_code else {
            return Err(MarketplaceError::invalid("No pickup code has been issued for this order"));
        };
        if !code.matches(input) {
            warn!("🔄️🔑️ Incorrect pickup code presented for order {order_id}");
            return Err(MarketplaceError::invalid("The pickup code does not match"));
        }
        ensure_action_allowed(&order, OrderAction::VerifyPickupCode)?;
        let new_status = order.delivery_type.handoff_status();
        check_transition(&order, new_status)?;
        let claim = PickupClaim {
            expected: order.status,
            new_status,
            settle_in_cash: order.status == OrderStatusType::ReadyForPayment,
        };
        let completed = self.db.claim_pickup_code(order_id, claim).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                MarketplaceError::AlreadyProcessed(format!("The pickup code for order {order_id} was already used"))
            },
            e => e.into(),
        })?;
        info!("🔄️📦️ Order {order_id} handed over. Status is now {}", completed.status);
        self.call_status_changed_hook(order.status, &completed).await;
        self.post_system_message(&completed, MessageKind::HandoffConfirmed { status: completed.status }).await;
        Ok(completed)
    }

    /// Cancels an order that has not reached a terminal state yet. The cart stays locked.
    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let change = OrderStatusChange::new(order.status, OrderStatusType::Cancelled);
        let order = self.transition(order, change).await?;
        info!("🔄️❌️ Order {order_id} cancelled. {reason}");
        self.post_system_message(&order, MessageKind::OrderCancelled { reason: reason.to_string() }).await;
        Ok(order)
    }

    /// The frozen fees if payment was requested, otherwise a live quote for the current cart.
    pub async fn quote(&self, order_id: &OrderId) -> Result<FeeBreakdown, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let store = self.fetch_store(&order.store_id).await?;
        Ok(current_quote(&order, &store))
    }

    pub async fn allowed_actions(&self, order_id: &OrderId) -> Result<Vec<OrderAction>, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        Ok(allowed_actions(&order))
    }

    /// Builds the complete view of an order.
    pub async fn session(&self, order_id: &OrderId) -> Result<OrderSession, MarketplaceError> {
        let order = self.fetch_order(order_id).await?;
        let store = self.fetch_store(&order.store_id).await?;
        let refunds = self.db.fetch_refunds_for_order(order_id).await?;
        Ok(OrderSession {
            quote: current_quote(&order, &store),
            phase: WorkflowPhase::from(&order),
            allowed_actions: allowed_actions(&order),
            fee_settings: store.fee_settings,
            refunds,
            order,
        })
    }

    pub async fn orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, MarketplaceError> {
        Ok(self.db.fetch_orders_for_customer(customer_id).await?)
    }

    pub async fn orders_for_store(&self, store_id: &str) -> Result<Vec<Order>, MarketplaceError> {
        Ok(self.db.fetch_orders_for_store(store_id).await?)
    }

    async fn fetch_store(&self, store_id: &str) -> Result<Store, MarketplaceError> {
        self.db.fetch_store(store_id).await?.ok_or_else(|| MarketplaceError::StoreNotFound(store_id.to_string()))
    }

    async fn save_cart(&self, order_id: &OrderId, items: Vec<OrderItem>) -> Result<Order, MarketplaceError> {
        let order = self.db.replace_items(order_id, &items).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => MarketplaceError::OrderLocked(order_id.clone()),
            e => e.into(),
        })?;
        trace!("🔄️🛒️ Cart for order {order_id} now has {} lines, subtotal {}", order.items.len(), order.subtotal());
        let kind = MessageKind::CartUpdated { item_count: order.items.len(), subtotal: order.subtotal() };
        self.post_system_message(&order, kind).await;
        Ok(order)
    }

    async fn transition(&self, order: Order, change: OrderStatusChange) -> Result<Order, MarketplaceError> {
        check_transition(&order, change.new_status)?;
        let old_status = order.status;
        let updated = self.db.change_status(&order.order_id, change).await?;
        debug!("🔄️📦️ Order {} moved from {old_status} to {}", updated.order_id, updated.status);
        self.call_status_changed_hook(old_status, &updated).await;
        Ok(updated)
    }

    async fn call_status_changed_hook(&self, old_status: OrderStatusType, order: &Order) {
        for producer in &self.producers.order_status_changed_producer {
            trace!("🔄️📦️ Notifying order status hook subscribers");
            producer.publish_event(OrderStatusChangedEvent::new(old_status, order.clone())).await;
        }
    }

    async fn post_system_message(&self, order: &Order, kind: MessageKind) {
        let message = NewMessage::new(order.order_id.as_str(), SYSTEM_SENDER, kind);
        if let Err(e) = self.db.insert_message(message).await {
            SideEffectFailure::new(format!("post a message for order {}", order.order_id), e).log();
        }
    }
}

fn current_quote(order: &Order, store: &Store) -> FeeBreakdown {
    match &order.fees {
        Some(fees) => fees.clone(),
        None => quote_items(&order.items, &store.fee_settings, order.delivery_type),
    }
}

fn validate_item(item: &OrderItem, order: &Order) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors
        .check(!item.name.trim().is_empty(), "The item needs a name")
        .check(item.price.is_positive(), format!("The price of {} must be greater than zero", item.name))
        .check(item.quantity > 0, format!("The quantity of {} must be at least one", item.name))
        .check(
            item.currency == order.currency,
            format!("{} is priced in {}, but the order is in {}", item.name, item.currency, order.currency),
        );
    errors.into_result()
}
