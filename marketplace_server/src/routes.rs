//! Request handler definitions
//!
//! Every handler is a thin shim over one engine API call. Handlers that need more than a line or two of glue keep that
//! glue in a private helper below the handler.
//!
//! All handlers are async. Database and payment processor calls are awaited, so a slow call never blocks the worker
//! thread that is serving it.
use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use marketplace_engine::{
    db_types::{FeeSettings, NewOrder, NewRefund, OrderId, PaymentMethod, Store},
    order_objects::NewCartItem,
    rules::checkout::PaymentConfirmation,
    traits::{CountryResolver, MarketplaceDatabase, PaymentProcessor},
    CheckoutApi,
    MarketplaceError,
    MessagingApi,
    OrderFlowApi,
    RefundApi,
    StoreApi,
    WithdrawalApi,
};
use mkt_common::Money;

use crate::{
    config::ServerOptions,
    data_objects::{
        CancelParams,
        CardCheckParams,
        DisputeParams,
        JsonResponse,
        MessageParams,
        PaymentIntentParams,
        PaymentOptionsQuery,
        PickupCodeParams,
        ProcessorAccountParams,
        QuantityUpdate,
        SellerRegistration,
        StripeEvent,
        StripePaymentIntentObject,
        TransferProofParams,
        WithdrawalParams,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(start_order => Post "/orders" impl MarketplaceDatabase);
/// Opens a new, empty cart. The order id is chosen by the client and must be unique.
pub async fn start_order<B: MarketplaceDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order {} for store {}", order.order_id, order.store_id);
    let order = api.start_order(order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl MarketplaceDatabase);
pub async fn order_by_id<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET order {order_id}");
    Ok(HttpResponse::Ok().json(api.fetch_order(&order_id).await?))
}

route!(order_session => Get "/orders/{order_id}/session" impl MarketplaceDatabase);
/// The order together with its phase, quote, allowed actions and refunds. This is what buyer and seller views render.
pub async fn order_session<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET session for order {order_id}");
    Ok(HttpResponse::Ok().json(api.session(&order_id).await?))
}

route!(order_quote => Get "/orders/{order_id}/quote" impl MarketplaceDatabase);
pub async fn order_quote<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    Ok(HttpResponse::Ok().json(api.quote(&order_id).await?))
}

route!(add_item => Post "/orders/{order_id}/items" impl MarketplaceDatabase);
pub async fn add_item<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    body: web::Json<NewCartItem>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let item = body.into_inner();
    debug!("💻️ POST {} x {} to order {order_id}", item.quantity, item.name);
    Ok(HttpResponse::Ok().json(api.add_item(&order_id, item).await?))
}

route!(update_quantity => Put "/orders/{order_id}/items/{name}" impl MarketplaceDatabase);
pub async fn update_quantity<B: MarketplaceDatabase>(
    path: web::Path<(OrderId, String)>,
    body: web::Json<QuantityUpdate>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, name) = path.into_inner();
    debug!("💻️ PUT quantity of {name} in order {order_id} to {}", body.quantity);
    Ok(HttpResponse::Ok().json(api.update_quantity(&order_id, &name, body.quantity).await?))
}

route!(remove_item => Delete "/orders/{order_id}/items/{name}" impl MarketplaceDatabase);
pub async fn remove_item<B: MarketplaceDatabase>(
    path: web::Path<(OrderId, String)>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order_id, name) = path.into_inner();
    debug!("💻️ DELETE {name} from order {order_id}");
    Ok(HttpResponse::Ok().json(api.remove_item(&order_id, &name).await?))
}

route!(finish_adding => Post "/orders/{order_id}/done_adding" impl MarketplaceDatabase);
pub async fn finish_adding<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST done adding for order {order_id}");
    Ok(HttpResponse::Ok().json(api.finish_adding(&order_id).await?))
}

route!(mark_bagged => Post "/orders/{order_id}/bagging" impl MarketplaceDatabase);
pub async fn mark_bagged<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST bagging for order {order_id}");
    Ok(HttpResponse::Ok().json(api.mark_bagged(&order_id).await?))
}

route!(request_payment => Post "/orders/{order_id}/request_payment" impl MarketplaceDatabase);
pub async fn request_payment<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST request payment for order {order_id}");
    Ok(HttpResponse::Ok().json(api.request_payment(&order_id).await?))
}

route!(record_payment => Post "/orders/{order_id}/payment" impl MarketplaceDatabase);
/// Records a payment taken outside the card flow, e.g. a bank transfer the seller has seen arrive, or cash at the
/// counter. Card payments are recorded by the Stripe webhook.
pub async fn record_payment<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    body: web::Json<PaymentConfirmation>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let payment = body.into_inner();
    info!("💻️ POST {} payment of {} for order {order_id}", payment.method, payment.amount);
    Ok(HttpResponse::Ok().json(api.record_payment(&order_id, payment).await?))
}

route!(issue_pickup_code => Post "/orders/{order_id}/pickup_code" impl MarketplaceDatabase);
pub async fn issue_pickup_code<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST pickup code for order {order_id}");
    Ok(HttpResponse::Ok().json(api.issue_pickup_code(&order_id).await?))
}

route!(verify_pickup_code => Post "/orders/{order_id}/pickup_code/verify" impl MarketplaceDatabase);
pub async fn verify_pickup_code<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    body: web::Json<PickupCodeParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST pickup code verification for order {order_id}");
    Ok(HttpResponse::Ok().json(api.verify_pickup_code(&order_id, &body.code).await?))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl MarketplaceDatabase);
pub async fn cancel_order<B: MarketplaceDatabase>(
    path: web::Path<OrderId>,
    body: web::Json<CancelParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST cancel order {order_id}: {}", body.reason);
    Ok(HttpResponse::Ok().json(api.cancel_order(&order_id, &body.reason).await?))
}

route!(customer_orders => Get "/customers/{customer_id}/orders" impl MarketplaceDatabase);
pub async fn customer_orders<B: MarketplaceDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = path.into_inner();
    trace!("💻️ GET orders for customer {customer_id}");
    Ok(HttpResponse::Ok().json(api.orders_for_customer(&customer_id).await?))
}

route!(store_orders => Get "/stores/{store_id}/orders" impl MarketplaceDatabase);
pub async fn store_orders<B: MarketplaceDatabase>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let store_id = path.into_inner();
    trace!("💻️ GET orders for store {store_id}");
    Ok(HttpResponse::Ok().json(api.orders_for_store(&store_id).await?))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(payment_options => Get "/orders/{order_id}/payment_options" impl MarketplaceDatabase, PaymentProcessor, CountryResolver);
/// The payment methods the customer can use. The customer's country comes from the `country` query parameter if it
/// is given, or from their IP address otherwise.
pub async fn payment_options<B, P, R>(
    req: HttpRequest,
    path: web::Path<OrderId>,
    query: web::Query<PaymentOptionsQuery>,
    api: web::Data<CheckoutApi<B, P>>,
    resolver: web::Data<R>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
    R: CountryResolver,
{
    let order_id = path.into_inner();
    let methods = match query.into_inner().country {
        Some(country) => api.payment_options(&order_id, &country).await?,
        None => {
            let ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
            match ip {
                Some(ip) => {
                    api.payment_options_for_ip(&order_id, ip, resolver.as_ref(), &options.default_country).await?
                },
                None => {
                    warn!("💻️ No remote address for payment options request. Using {}", options.default_country);
                    api.payment_options(&order_id, &options.default_country).await?
                },
            }
        },
    };
    Ok(HttpResponse::Ok().json(methods))
}

route!(payment_intent => Post "/orders/{order_id}/payment_intent" impl MarketplaceDatabase, PaymentProcessor);
pub async fn payment_intent<B, P>(
    path: web::Path<OrderId>,
    body: web::Json<PaymentIntentParams>,
    api: web::Data<CheckoutApi<B, P>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let order_id = path.into_inner();
    let PaymentIntentParams { method, country } = body.into_inner();
    let country = country.unwrap_or_else(|| options.default_country.clone());
    debug!("💻️ POST {method} payment intent for order {order_id} from {country}");
    Ok(HttpResponse::Ok().json(api.create_payment_intent(&order_id, method, &country).await?))
}

route!(check_card => Post "/cards/check" impl MarketplaceDatabase, PaymentProcessor);
/// Catches mistyped card numbers before the customer is sent to the processor. Nothing is stored.
pub async fn check_card<B, P>(
    body: web::Json<CardCheckParams>,
    api: web::Data<CheckoutApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    api.validate_card(&body.number)?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Card number looks valid")))
}

//----------------------------------------------   Refunds  ----------------------------------------------------
route!(request_refund => Post "/refunds" impl MarketplaceDatabase, PaymentProcessor);
pub async fn request_refund<B, P>(
    body: web::Json<NewRefund>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let request = body.into_inner();
    info!("💻️ POST refund of {} for order {} by the {}", request.amount, request.order_id, request.initiator);
    Ok(HttpResponse::Created().json(api.request_refund(request).await?))
}

route!(refund_by_id => Get "/refunds/{id}" impl MarketplaceDatabase, PaymentProcessor);
pub async fn refund_by_id<B, P>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    Ok(HttpResponse::Ok().json(api.fetch_refund(path.into_inner()).await?))
}

route!(refunds_for_order => Get "/orders/{order_id}/refunds" impl MarketplaceDatabase, PaymentProcessor);
pub async fn refunds_for_order<B, P>(
    path: web::Path<OrderId>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    Ok(HttpResponse::Ok().json(api.refunds_for_order(&path.into_inner()).await?))
}

route!(approve_refund => Post "/refunds/{id}/approve" impl MarketplaceDatabase, PaymentProcessor);
pub async fn approve_refund<B, P>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let id = path.into_inner();
    info!("💻️ POST approve refund #{id}");
    Ok(HttpResponse::Ok().json(api.approve_refund(id).await?))
}

route!(reject_refund => Post "/refunds/{id}/reject" impl MarketplaceDatabase, PaymentProcessor);
pub async fn reject_refund<B, P>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let id = path.into_inner();
    info!("💻️ POST reject refund #{id}");
    Ok(HttpResponse::Ok().json(api.reject_refund(id).await?))
}

route!(upload_transfer_proof => Post "/refunds/{id}/proof" impl MarketplaceDatabase, PaymentProcessor);
pub async fn upload_transfer_proof<B, P>(
    path: web::Path<i64>,
    body: web::Json<TransferProofParams>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let id = path.into_inner();
    debug!("💻️ POST transfer proof for refund #{id}");
    Ok(HttpResponse::Ok().json(api.upload_transfer_proof(id, &body.url).await?))
}

route!(confirm_refund => Post "/refunds/{id}/received" impl MarketplaceDatabase, PaymentProcessor);
pub async fn confirm_refund<B, P>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let id = path.into_inner();
    debug!("💻️ POST refund #{id} received");
    Ok(HttpResponse::Ok().json(api.confirm_refund_received(id).await?))
}

route!(dispute_refund => Post "/refunds/{id}/dispute" impl MarketplaceDatabase, PaymentProcessor);
pub async fn dispute_refund<B, P>(
    path: web::Path<i64>,
    body: web::Json<DisputeParams>,
    api: web::Data<RefundApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let id = path.into_inner();
    info!("💻️ POST dispute for refund #{id}: {}", body.reason);
    Ok(HttpResponse::Ok().json(api.open_dispute(id, &body.reason).await?))
}

//----------------------------------------------   Sellers & stores  --------------------------------------------------
route!(register_seller => Post "/sellers" impl MarketplaceDatabase);
pub async fn register_seller<B: MarketplaceDatabase>(
    body: web::Json<SellerRegistration>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let SellerRegistration { seller_id, country } = body.into_inner();
    info!("💻️ POST new seller {seller_id} in {country}");
    Ok(HttpResponse::Created().json(api.register_seller(&seller_id, &country).await?))
}

route!(seller_by_id => Get "/sellers/{seller_id}" impl MarketplaceDatabase);
pub async fn seller_by_id<B: MarketplaceDatabase>(
    path: web::Path<String>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    Ok(HttpResponse::Ok().json(api.seller(&path.into_inner()).await?))
}

route!(link_processor_account => Put "/sellers/{seller_id}/processor_account" impl MarketplaceDatabase);
pub async fn link_processor_account<B: MarketplaceDatabase>(
    path: web::Path<String>,
    body: web::Json<ProcessorAccountParams>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    info!("💻️ PUT processor account for seller {seller_id}");
    Ok(HttpResponse::Ok().json(api.link_processor_account(&seller_id, &body.account).await?))
}

route!(save_store => Put "/stores" impl MarketplaceDatabase);
pub async fn save_store<B: MarketplaceDatabase>(
    body: web::Json<Store>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let store = body.into_inner();
    debug!("💻️ PUT store {} for seller {}", store.store_id, store.seller_id);
    Ok(HttpResponse::Ok().json(api.save_store(store).await?))
}

route!(store_by_id => Get "/stores/{store_id}" impl MarketplaceDatabase);
pub async fn store_by_id<B: MarketplaceDatabase>(
    path: web::Path<String>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    Ok(HttpResponse::Ok().json(api.store(&path.into_inner()).await?))
}

route!(update_fee_settings => Put "/stores/{store_id}/fees" impl MarketplaceDatabase);
pub async fn update_fee_settings<B: MarketplaceDatabase>(
    path: web::Path<String>,
    body: web::Json<FeeSettings>,
    api: web::Data<StoreApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let store_id = path.into_inner();
    debug!("💻️ PUT fee settings for store {store_id}");
    Ok(HttpResponse::Ok().json(api.update_fee_settings(&store_id, body.into_inner()).await?))
}

//----------------------------------------------   Wallets  ----------------------------------------------------
route!(wallet => Get "/sellers/{seller_id}/wallet" impl MarketplaceDatabase, PaymentProcessor);
pub async fn wallet<B, P>(
    path: web::Path<String>,
    api: web::Data<WithdrawalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    Ok(HttpResponse::Ok().json(api.wallet(&path.into_inner()).await?))
}

route!(withdrawal_eligibility => Get "/sellers/{seller_id}/eligibility" impl MarketplaceDatabase, PaymentProcessor);
pub async fn withdrawal_eligibility<B, P>(
    path: web::Path<String>,
    api: web::Data<WithdrawalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    Ok(HttpResponse::Ok().json(api.eligibility(&path.into_inner()).await?))
}

route!(withdrawals => Get "/sellers/{seller_id}/withdrawals" impl MarketplaceDatabase, PaymentProcessor);
pub async fn withdrawals<B, P>(
    path: web::Path<String>,
    api: web::Data<WithdrawalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    Ok(HttpResponse::Ok().json(api.withdrawals(&path.into_inner()).await?))
}

route!(request_withdrawal => Post "/sellers/{seller_id}/withdrawals" impl MarketplaceDatabase, PaymentProcessor);
pub async fn request_withdrawal<B, P>(
    path: web::Path<String>,
    body: web::Json<WithdrawalParams>,
    api: web::Data<WithdrawalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    let seller_id = path.into_inner();
    info!("💻️ POST withdrawal of {} for seller {seller_id}", body.amount);
    Ok(HttpResponse::Created().json(api.request_withdrawal(&seller_id, body.amount).await?))
}

route!(processor_balance => Get "/sellers/{seller_id}/processor_balance" impl MarketplaceDatabase, PaymentProcessor);
pub async fn processor_balance<B, P>(
    path: web::Path<String>,
    api: web::Data<WithdrawalApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    P: PaymentProcessor,
{
    Ok(HttpResponse::Ok().json(api.processor_balance(&path.into_inner()).await?))
}

//----------------------------------------------   Messages  ----------------------------------------------------
route!(conversation => Get "/conversations/{conversation_id}/messages" impl MarketplaceDatabase);
pub async fn conversation<B: MarketplaceDatabase>(
    path: web::Path<String>,
    api: web::Data<MessagingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    Ok(HttpResponse::Ok().json(api.messages(&path.into_inner()).await?))
}

route!(send_message => Post "/conversations/{conversation_id}/messages" impl MarketplaceDatabase);
pub async fn send_message<B: MarketplaceDatabase>(
    path: web::Path<String>,
    body: web::Json<MessageParams>,
    api: web::Data<MessagingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let conversation_id = path.into_inner();
    let MessageParams { sender, kind } = body.into_inner();
    trace!("💻️ POST message from {sender} to {conversation_id}");
    Ok(HttpResponse::Created().json(api.send(&conversation_id, &sender, kind).await?))
}

//----------------------------------------------   Stripe webhook  ----------------------------------------------------
route!(stripe_webhook => Post "/stripe" impl MarketplaceDatabase);
/// Receives Stripe webhook deliveries. Signatures are checked by middleware before this handler runs.
///
/// A succeeded payment intent marks its order as paid. Stripe retries deliveries, so a payment that was already
/// recorded is acknowledged without error. Every other event type is acknowledged and ignored.
pub async fn stripe_webhook<B: MarketplaceDatabase>(
    body: web::Json<StripeEvent>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let event = body.into_inner();
    debug!("💻️ Stripe webhook {} ({})", event.id, event.event_type);
    if event.event_type != "payment_intent.succeeded" {
        trace!("💻️ Ignoring Stripe event {}", event.event_type);
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Event ignored")));
    }
    let intent = serde_json::from_value::<StripePaymentIntentObject>(event.data.object)
        .map_err(|e| ServerError::InvalidRequestBody(format!("Not a payment intent. {e}")))?;
    match record_intent_payment(intent, api.as_ref()).await {
        Ok(message) => Ok(HttpResponse::Ok().json(JsonResponse::success(message))),
        Err(ServerError::Marketplace(MarketplaceError::AlreadyProcessed(msg))) => {
            info!("💻️ Stripe redelivered a payment that was already recorded. {msg}");
            Ok(HttpResponse::Ok().json(JsonResponse::success("Payment already recorded")))
        },
        Err(e) => Err(e),
    }
}

async fn record_intent_payment<B: MarketplaceDatabase>(
    intent: StripePaymentIntentObject,
    api: &OrderFlowApi<B>,
) -> Result<String, ServerError> {
    let order_id = intent
        .metadata
        .get("order_id")
        .map(|id| OrderId::from(id.as_str()))
        .ok_or_else(|| ServerError::InvalidRequestBody(format!("Payment intent {} has no order id", intent.id)))?;
    let method = intent
        .metadata
        .get("method")
        .and_then(|m| PaymentMethod::from_str(m).ok())
        .unwrap_or(PaymentMethod::Card);
    let order = api.fetch_order(&order_id).await?;
    if order.payment_reference.as_deref() == Some(intent.id.as_str()) {
        info!("💻️ Stripe redelivered payment {} for order {order_id}. It was already recorded.", intent.id);
        return Ok(format!("Order {order_id} was already paid with {}", intent.id));
    }
    // Stripe reports minor units. The frozen total may carry sub-cent precision, so compare after rounding.
    let amount_due = order.amount_due();
    let amount = if amount_due.to_minor_units() == Some(intent.amount_received) {
        amount_due
    } else {
        Money::from_minor_units(intent.amount_received)
    };
    let payment = PaymentConfirmation { method, amount, reference: Some(intent.id.clone()) };
    let paid = api.record_payment(&order_id, payment).await?;
    Ok(format!("Order {} paid with {}", paid.order_id, intent.id))
}
