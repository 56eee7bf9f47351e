use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{MessageKind, NewMessage, NewRefund, Order, OrderId, Refund, RefundStatus, Wallet},
    events::{EventProducers, RefundUpdatedEvent},
    mp_api::{
        errors::{MarketplaceError, SideEffectFailure},
        order_flow_api::SYSTEM_SENDER,
    },
    rules::{
        refunds::{
            check_refund_transition,
            requires_seller_approval,
            route_refund,
            validate_refund_request,
            RefundRoute,
        },
        validation::ValidationErrors,
    },
    traits::{MarketplaceDatabase, PaymentProcessor, ProcessorRefundRequest, RefundTransition, RepositoryError},
};

/// Refund requests, approval and the manual transfer flow.
pub struct RefundApi<B, P> {
    db: B,
    processor: P,
    producers: EventProducers,
}

impl<B, P> Debug for RefundApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B, P> RefundApi<B, P> {
    pub fn new(db: B, processor: P, producers: EventProducers) -> Self {
        Self { db, processor, producers }
    }
}

impl<B, P> RefundApi<B, P>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    /// Requests a refund for a paid order.
    ///
    /// Requests from customers wait for the seller's approval. Refunds the seller initiates are approved straight away,
    /// which for digital payments means the processor refund is issued before this call returns. If that approval
    /// fails, the request is discarded again and the order is left as it was.
    ///
    /// The refund is always made against the payment reference stored on the order.
    pub async fn request_refund(&self, mut request: NewRefund) -> Result<Refund, MarketplaceError> {
        let order = self.fetch_order(&request.order_id).await?;
        let store = self
            .db
            .fetch_store(&order.store_id)
            .await?
            .ok_or_else(|| MarketplaceError::StoreNotFound(order.store_id.clone()))?;
        validate_refund_request(&request, &order, &store.fee_settings)?;
        request.charge_reference = order.payment_reference.clone();
        let initiator = request.initiator;
        let refund = self.db.insert_refund(request, RefundStatus::Requested).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                MarketplaceError::AlreadyProcessed(format!("Order {} already has a refund in progress", order.order_id))
            },
            e => e.into(),
        })?;
        info!(
            "🔄️💸️ Refund #{} of {} requested by the {initiator} for order {} ({:?} route)",
            refund.id,
            refund.amount,
            refund.order_id,
            route_refund(refund.payment_method)
        );
        if requires_seller_approval(initiator) {
            self.notify(&refund, None).await;
            return Ok(refund);
        }
        match self.approve_refund(refund.id).await {
            Ok(approved) => Ok(approved),
            Err(e) => {
                warn!("🔄️💸️ Refund #{} could not be approved: {e}. Discarding the request.", refund.id);
                if let Err(discard_err) = self.db.discard_refund(refund.id).await {
                    error!("🔄️💸️ Refund #{} was not approved and could not be discarded. {discard_err}", refund.id);
                }
                Err(e)
            },
        }
    }

    /// The seller approves a refund.
    ///
    /// Digital payments are refunded through the payment processor, and the amount is deducted from the seller's
    /// wallet. If the processor call fails, the refund is returned to `requested` and the failure is reported; nothing
    /// else changes. Other payments move to `awaiting_transfer`, and the seller has to transfer the money themselves.
    pub async fn approve_refund(&self, refund_id: i64) -> Result<Refund, MarketplaceError> {
        let refund = self.fetch_refund(refund_id).await?;
        match route_refund(refund.payment_method) {
            RefundRoute::Manual => {
                let change = RefundTransition::new(RefundStatus::Requested, RefundStatus::AwaitingTransfer);
                self.transition(&refund, change).await
            },
            RefundRoute::Automatic => self.refund_through_processor(refund).await,
        }
    }

    pub async fn reject_refund(&self, refund_id: i64) -> Result<Refund, MarketplaceError> {
        let refund = self.fetch_refund(refund_id).await?;
        self.transition(&refund, RefundTransition::new(RefundStatus::Requested, RefundStatus::Rejected)).await
    }

    /// The seller uploads proof of a manual refund transfer.
    pub async fn upload_transfer_proof(&self, refund_id: i64, proof_url: &str) -> Result<Refund, MarketplaceError> {
        validate_url(proof_url, "proof of transfer")?;
        let refund = self.fetch_refund(refund_id).await?;
        let change =
            RefundTransition::new(RefundStatus::AwaitingTransfer, RefundStatus::ProofUploaded).with_proof_url(proof_url);
        self.transition(&refund, change).await
    }

    /// The customer confirms the manual transfer arrived.
    pub async fn confirm_refund_received(&self, refund_id: i64) -> Result<Refund, MarketplaceError> {
        let refund = self.fetch_refund(refund_id).await?;
        self.transition(&refund, RefundTransition::new(RefundStatus::ProofUploaded, RefundStatus::Received)).await
    }

    /// The customer disputes a manual transfer, e.g. because the money never arrived.
    pub async fn open_dispute(&self, refund_id: i64, reason: &str) -> Result<Refund, MarketplaceError> {
        if reason.trim().is_empty() {
            return Err(MarketplaceError::invalid("A reason for the dispute is required"));
        }
        let refund = self.fetch_refund(refund_id).await?;
        let change =
            RefundTransition::new(RefundStatus::ProofUploaded, RefundStatus::Disputed).with_dispute_reason(reason);
        self.transition(&refund, change).await
    }

    pub async fn fetch_refund(&self, refund_id: i64) -> Result<Refund, MarketplaceError> {
        self.db.fetch_refund(refund_id).await?.ok_or(MarketplaceError::RefundNotFound(refund_id))
    }

    pub async fn refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, MarketplaceError> {
        Ok(self.db.fetch_refunds_for_order(order_id).await?)
    }

    async fn refund_through_processor(&self, refund: Refund) -> Result<Refund, MarketplaceError> {
        let refund_id = refund.id;
        let order = self.fetch_order(&refund.order_id).await?;
        let mut errors = ValidationErrors::new();
        let charge_reference = order.payment_reference.clone().filter(|c| !c.trim().is_empty());
        errors.check(charge_reference.is_some(), "The order has no payment reference to refund against");
        let amount_minor = refund.amount.to_minor_units();
        errors.check(amount_minor.is_some_and(|a| a > 0), format!("{} cannot be refunded", refund.amount));
        errors.into_result()?;
        let seller_id = self
            .db
            .fetch_store(&order.store_id)
            .await?
            .map(|s| s.seller_id)
            .ok_or_else(|| MarketplaceError::StoreNotFound(order.store_id.clone()))?;
        // Claim the refund. A concurrent approval fails here, before anything is sent to the processor.
        let claimed =
            self.transition(&refund, RefundTransition::new(RefundStatus::Requested, RefundStatus::Processing)).await?;
        let request = ProcessorRefundRequest {
            charge_reference: charge_reference.unwrap_or_default(),
            amount_minor: amount_minor.unwrap_or_default(),
            currency: claimed.currency.clone(),
            reason: claimed.reason.clone(),
        };
        let processor_refund = match self.processor.create_refund(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("🔄️💸️ The payment processor could not refund #{refund_id}: {e}. Releasing the refund.");
                let release = RefundTransition::new(RefundStatus::Processing, RefundStatus::Requested);
                if let Err(release_err) = self.db.transition_refund(refund_id, release).await {
                    error!("🔄️💸️ Refund #{refund_id} is stuck in processing. {release_err}");
                }
                return Err(e.into());
            },
        };
        let (completed, wallet) =
            match self.db.complete_refund(refund_id, &seller_id, &processor_refund.id).await {
                Ok(done) => done,
                Err(e) => {
                    error!(
                        "🔄️💸️ The processor refunded #{refund_id} as {}, but recording it failed. The refund is left in \
                         processing and seller {seller_id}'s wallet was not charged. {e}",
                        processor_refund.id
                    );
                    return Err(e.into());
                },
            };
        info!(
            "🔄️💸️ Refund #{refund_id} completed by the processor as {}. Seller {seller_id} balance is now {}",
            processor_refund.id, wallet.balance
        );
        self.notify(&completed, Some(wallet)).await;
        Ok(completed)
    }

    async fn transition(&self, refund: &Refund, change: RefundTransition) -> Result<Refund, MarketplaceError> {
        check_refund_transition(refund, change.new_status)?;
        let new_status = change.new_status;
        let updated = self.db.transition_refund(refund.id, change).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                MarketplaceError::AlreadyProcessed(format!("Refund #{} is no longer {}", refund.id, refund.status))
            },
            e => e.into(),
        })?;
        debug!("🔄️💸️ Refund #{} moved from {} to {new_status}", refund.id, refund.status);
        if new_status != RefundStatus::Processing {
            self.notify(&updated, None).await;
        }
        Ok(updated)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketplaceError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketplaceError::OrderNotFound(order_id.clone()))
    }

    async fn notify(&self, refund: &Refund, wallet: Option<Wallet>) {
        for producer in &self.producers.refund_updated_producer {
            producer.publish_event(RefundUpdatedEvent::new(refund.clone(), wallet.clone())).await;
        }
        let kind = MessageKind::RefundUpdate { refund_id: refund.id, status: refund.status };
        let message = NewMessage::new(refund.order_id.as_str(), SYSTEM_SENDER, kind);
        if let Err(e) = self.db.insert_message(message).await {
            SideEffectFailure::new(format!("post a refund update for order {}", refund.order_id), e).log();
        }
    }
}

fn validate_url(url: &str, what: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let url = url.trim();
    errors.check(!url.is_empty(), format!("A link to the {what} is required"));
    errors.check(
        url.is_empty() || url.starts_with("https://") || url.starts_with("http://"),
        format!("The {what} must be a web link"),
    );
    errors.into_result()
}
