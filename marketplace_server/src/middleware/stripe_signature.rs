//! Stripe webhook signature middleware for Actix Web.
//!
//! Stripe signs every webhook delivery with the endpoint's signing secret. The `Stripe-Signature` header carries the
//! unix time of the delivery and one or more HMAC-SHA256 signatures of `{timestamp}.{body}`.
//!
//! Wrap the webhook scope with this middleware so that handlers only ever see genuine, recent deliveries.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    web,
    Error,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mkt_common::Secret;

use crate::helpers::{calculate_stripe_signature, StripeSignatureHeader};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

pub struct StripeSignatureMiddlewareFactory {
    secret: Secret<String>,
    tolerance_secs: i64,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl StripeSignatureMiddlewareFactory {
    pub fn new(secret: Secret<String>, tolerance_secs: i64, enabled: bool) -> Self {
        Self { secret, tolerance_secs, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for StripeSignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = StripeSignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(StripeSignatureMiddlewareService {
            secret: self.secret.clone(),
            tolerance_secs: self.tolerance_secs,
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct StripeSignatureMiddlewareService<S> {
    secret: Secret<String>,
    tolerance_secs: i64,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for StripeSignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.reveal().clone();
        let tolerance_secs = self.tolerance_secs;
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking Stripe signature for request");
            if !enabled {
                trace!("🔐️ Signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let header = req
                .headers()
                .get(STRIPE_SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔐️ No Stripe signature found in request. Denying access.");
                    ErrorUnauthorized("No Stripe signature found.")
                })?
                .parse::<StripeSignatureHeader>()
                .map_err(|e| {
                    warn!("🔐️ Malformed Stripe signature header. {e}");
                    ErrorUnauthorized("Malformed Stripe signature.")
                })?;
            let age = Utc::now().timestamp() - header.timestamp;
            if age.abs() > tolerance_secs {
                warn!("🔐️ Stripe webhook is {age}s old, outside the {tolerance_secs}s tolerance. Denying access.");
                return Err(ErrorUnauthorized("The webhook timestamp is outside the tolerance window."));
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let expected = calculate_stripe_signature(&secret, header.timestamp, data.as_ref());
            if header.signatures.iter().any(|s| s == &expected) {
                trace!("🔐️ Stripe signature check for request ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid Stripe signature found in request. Denying access.");
                Err(ErrorUnauthorized("Invalid Stripe signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
