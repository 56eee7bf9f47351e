use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer, Scope};
use log::*;
use marketplace_engine::{
    events::{EventHandlers, EventProducers},
    traits::{CountryResolver, MarketplaceDatabase, PaymentProcessor},
    CheckoutApi,
    MessagingApi,
    OrderFlowApi,
    RefundApi,
    SqliteDatabase,
    StoreApi,
    WithdrawalApi,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{geo::IpApiResolver, notifications::create_notification_event_handlers, stripe::StripeClient},
    middleware::StripeSignatureMiddlewareFactory,
    routes::{
        health,
        AddItemRoute,
        ApproveRefundRoute,
        CancelOrderRoute,
        CheckCardRoute,
        ConfirmRefundRoute,
        ConversationRoute,
        CustomerOrdersRoute,
        DisputeRefundRoute,
        FinishAddingRoute,
        IssuePickupCodeRoute,
        LinkProcessorAccountRoute,
        MarkBaggedRoute,
        OrderByIdRoute,
        OrderQuoteRoute,
        OrderSessionRoute,
        PaymentIntentRoute,
        PaymentOptionsRoute,
        ProcessorBalanceRoute,
        RecordPaymentRoute,
        RefundByIdRoute,
        RefundsForOrderRoute,
        RegisterSellerRoute,
        RejectRefundRoute,
        RemoveItemRoute,
        RequestPaymentRoute,
        RequestRefundRoute,
        RequestWithdrawalRoute,
        SaveStoreRoute,
        SellerByIdRoute,
        SendMessageRoute,
        StartOrderRoute,
        StoreByIdRoute,
        StoreOrdersRoute,
        StripeWebhookRoute,
        UpdateFeeSettingsRoute,
        UpdateQuantityRoute,
        UploadTransferProofRoute,
        VerifyPickupCodeRoute,
        WalletRoute,
        WithdrawalEligibilityRoute,
        WithdrawalsRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migration failed. {e}")))?;
    let processor = StripeClient::new(&config.stripe)?;
    let resolver = IpApiResolver::new(&config.geoip_url)?;
    let producers = match &config.notify_webhook_url {
        Some(url) => {
            let handlers = create_notification_event_handlers(url, config.event_buffer_size)?;
            info!("📬️ Posting marketplace updates to {url}");
            start_event_handlers(handlers).await
        },
        None => {
            info!("📬️ No notification webhook configured. Marketplace updates will not be posted anywhere.");
            EventProducers::default()
        },
    };
    let srv = create_server_instance(config, db, processor, resolver, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: StripeClient,
    resolver: IpApiResolver,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let stripe = config.stripe.clone();
    let srv = HttpServer::new(move || {
        let webhook_scope = web::scope("/webhooks")
            .wrap(StripeSignatureMiddlewareFactory::new(
                stripe.webhook_secret.clone(),
                stripe.webhook_tolerance_secs,
                stripe.webhook_checks,
            ))
            .service(StripeWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .configure(|cfg| {
                configure_api_data(cfg, db.clone(), processor.clone(), resolver.clone(), producers.clone(), &options)
            })
            .service(health)
            .service(api_scope::<SqliteDatabase, StripeClient, IpApiResolver>())
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers one instance of every engine API, plus the resolver and the request options, as shared app data.
pub fn configure_api_data<B, P, R>(
    cfg: &mut web::ServiceConfig,
    db: B,
    processor: P,
    resolver: R,
    producers: EventProducers,
    options: &ServerOptions,
) where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + Clone + 'static,
    R: CountryResolver + 'static,
{
    cfg.app_data(web::Data::new(OrderFlowApi::new(db.clone(), producers.clone())))
        .app_data(web::Data::new(CheckoutApi::new(db.clone(), processor.clone())))
        .app_data(web::Data::new(RefundApi::new(db.clone(), processor.clone(), producers.clone())))
        .app_data(web::Data::new(WithdrawalApi::new(db.clone(), processor, producers)))
        .app_data(web::Data::new(StoreApi::new(db.clone())))
        .app_data(web::Data::new(MessagingApi::new(db)))
        .app_data(web::Data::new(resolver))
        .app_data(web::Data::new(options.clone()));
}

/// All the marketplace API routes, under `/api`.
pub fn api_scope<B, P, R>() -> Scope
where
    B: MarketplaceDatabase + 'static,
    P: PaymentProcessor + 'static,
    R: CountryResolver + 'static,
{
    web::scope("/api")
        // Orders
        .service(StartOrderRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(OrderSessionRoute::<B>::new())
        .service(OrderQuoteRoute::<B>::new())
        .service(AddItemRoute::<B>::new())
        .service(UpdateQuantityRoute::<B>::new())
        .service(RemoveItemRoute::<B>::new())
        .service(FinishAddingRoute::<B>::new())
        .service(MarkBaggedRoute::<B>::new())
        .service(RequestPaymentRoute::<B>::new())
        .service(RecordPaymentRoute::<B>::new())
        .service(IssuePickupCodeRoute::<B>::new())
        .service(VerifyPickupCodeRoute::<B>::new())
        .service(CancelOrderRoute::<B>::new())
        .service(CustomerOrdersRoute::<B>::new())
        .service(StoreOrdersRoute::<B>::new())
        // Checkout
        .service(PaymentOptionsRoute::<B, P, R>::new())
        .service(PaymentIntentRoute::<B, P>::new())
        .service(CheckCardRoute::<B, P>::new())
        // Refunds
        .service(RequestRefundRoute::<B, P>::new())
        .service(RefundByIdRoute::<B, P>::new())
        .service(RefundsForOrderRoute::<B, P>::new())
        .service(ApproveRefundRoute::<B, P>::new())
        .service(RejectRefundRoute::<B, P>::new())
        .service(UploadTransferProofRoute::<B, P>::new())
        .service(ConfirmRefundRoute::<B, P>::new())
        .service(DisputeRefundRoute::<B, P>::new())
        // Sellers and stores
        .service(RegisterSellerRoute::<B>::new())
        .service(SellerByIdRoute::<B>::new())
        .service(LinkProcessorAccountRoute::<B>::new())
        .service(SaveStoreRoute::<B>::new())
        .service(StoreByIdRoute::<B>::new())
        .service(UpdateFeeSettingsRoute::<B>::new())
        // Wallets
        .service(WalletRoute::<B, P>::new())
        .service(WithdrawalEligibilityRoute::<B, P>::new())
        .service(WithdrawalsRoute::<B, P>::new())
        .service(RequestWithdrawalRoute::<B, P>::new())
        .service(ProcessorBalanceRoute::<B, P>::new())
        // Messages
        .service(ConversationRoute::<B>::new())
        .service(SendMessageRoute::<B>::new())
}

/// Starts the event hooks and returns the producers to hand to the engine APIs.
pub async fn start_event_handlers(handlers: EventHandlers) -> EventProducers {
    let producers = handlers.producers();
    handlers.start_handlers().await;
    producers
}
