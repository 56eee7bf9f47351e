use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderPaidEvent,
    OrderStatusChangedEvent,
    RefundUpdatedEvent,
    WithdrawalRecordedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub refund_updated_producer: Vec<EventProducer<RefundUpdatedEvent>>,
    pub withdrawal_recorded_producer: Vec<EventProducer<WithdrawalRecordedEvent>>,
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_refund_updated: Option<EventHandler<RefundUpdatedEvent>>,
    pub on_withdrawal_recorded: Option<EventHandler<WithdrawalRecordedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f)),
            on_refund_updated: hooks.on_refund_updated.map(|f| EventHandler::new(buffer_size, f)),
            on_withdrawal_recorded: hooks.on_withdrawal_recorded.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_updated {
            result.refund_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal_recorded {
            result.withdrawal_recorded_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_updated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_withdrawal_recorded {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_refund_updated: Option<Handler<RefundUpdatedEvent>>,
    pub on_withdrawal_recorded: Option<Handler<WithdrawalRecordedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_refund_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundUpdatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_refund_updated = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal_recorded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalRecordedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_withdrawal_recorded = Some(Arc::new(f));
        self
    }
}
