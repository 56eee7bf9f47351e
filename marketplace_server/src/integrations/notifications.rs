//! Forwards marketplace events to an external notification service.
//!
//! Every event is posted as JSON to a single webhook URL, tagged with its `event` name. Delivery is best-effort: a
//! failed post is logged and dropped.
use futures::future::BoxFuture;
use log::*;
use marketplace_engine::events::{
    EventHandlers,
    EventHooks,
    OrderStatusChangedEvent,
    RefundUpdatedEvent,
    WithdrawalRecordedEvent,
};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::ServerError;

#[derive(Clone)]
struct Notifier {
    url: String,
    client: Client,
}

impl Notifier {
    fn post(&self, event: &'static str, payload: Value) -> BoxFuture<'static, ()> {
        let notifier = self.clone();
        Box::pin(async move {
            let body = json!({ "event": event, "data": payload });
            match notifier.client.post(&notifier.url).json(&body).send().await {
                Ok(res) if res.status().is_success() => trace!("📬️ {event} notification delivered"),
                Ok(res) => warn!("📬️ The notification service answered {} to {event}", res.status()),
                Err(e) => warn!("📬️ Could not deliver {event} notification. {e}"),
            }
        })
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!("📬️ Could not serialize a notification. {e}");
        Value::Null
    })
}

/// Builds the event handlers that forward order status changes, refund updates and withdrawals to `url`.
pub fn create_notification_event_handlers(url: &str, buffer_size: usize) -> Result<EventHandlers, ServerError> {
    let client = Client::builder().build().map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier = Notifier { url: url.to_string(), client };
    let mut hooks = EventHooks::default();
    let n = notifier.clone();
    hooks.on_order_status_changed(move |ev: OrderStatusChangedEvent| {
        let payload = json!({
            "order_id": ev.order.order_id.as_str(),
            "store_id": ev.order.store_id,
            "customer_id": ev.order.customer_id,
            "old_status": ev.old_status.to_string(),
            "new_status": ev.order.status.to_string(),
        });
        n.post("order_status_changed", payload)
    });
    let n = notifier.clone();
    hooks.on_refund_updated(move |ev: RefundUpdatedEvent| n.post("refund_updated", to_value(&ev.refund)));
    hooks.on_withdrawal_recorded(move |ev: WithdrawalRecordedEvent| {
        notifier.post("withdrawal_recorded", to_value(&ev.withdrawal))
    });
    info!("📬️ Order updates will be forwarded to {url}");
    Ok(EventHandlers::new(buffer_size, hooks))
}
