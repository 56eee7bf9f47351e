use std::env;

use log::*;
use mkt_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8370;
const DEFAULT_COUNTRY: &str = "US";
const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const DEFAULT_GEOIP_URL: &str = "http://ip-api.com/json";
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;
/// Webhook deliveries older than this are refused.
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The country assumed for customers whose location cannot be determined.
    pub default_country: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    pub event_buffer_size: usize,
    pub stripe: StripeConfig,
    pub geoip_url: String,
    /// Order, refund and withdrawal updates are posted here as JSON, if set.
    pub notify_webhook_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct StripeConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    /// The signing secret for incoming webhooks (`whsec_...`).
    pub webhook_secret: Secret<String>,
    pub webhook_checks: bool,
    pub webhook_tolerance_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            default_country: DEFAULT_COUNTRY.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            stripe: StripeConfig::default(),
            geoip_url: DEFAULT_GEOIP_URL.to_string(),
            notify_webhook_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let default_country = env::var("MKT_DEFAULT_COUNTRY")
            .ok()
            .and_then(|s| {
                let code = mkt_common::helpers::normalize_country_code(&s);
                if code.is_none() {
                    warn!("🪛️ {s} is not a valid country code for MKT_DEFAULT_COUNTRY.");
                }
                code
            })
            .unwrap_or_else(|| {
                info!("🪛️ Using {DEFAULT_COUNTRY} as the default customer country.");
                DEFAULT_COUNTRY.to_string()
            });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MKT_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MKT_USE_FORWARDED").ok(), false);
        let event_buffer_size = env::var("MKT_EVENT_BUFFER_SIZE")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for MKT_EVENT_BUFFER_SIZE. {e}"))
                    .ok()
            })
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        let geoip_url = env::var("MKT_GEOIP_URL").ok().unwrap_or_else(|| DEFAULT_GEOIP_URL.into());
        let notify_webhook_url = env::var("MKT_NOTIFY_WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty());
        if notify_webhook_url.is_none() {
            info!("🪛️ MKT_NOTIFY_WEBHOOK_URL is not set. Order updates will not be forwarded.");
        }
        Self {
            host,
            port,
            database_url,
            default_country,
            use_x_forwarded_for,
            use_forwarded,
            event_buffer_size,
            stripe: StripeConfig::from_env_or_defaults(),
            geoip_url,
            notify_webhook_url,
        }
    }
}

impl StripeConfig {
    pub fn from_env_or_defaults() -> Self {
        let api_url = env::var("MKT_STRIPE_API_URL").ok().unwrap_or_else(|| DEFAULT_STRIPE_API_URL.into());
        let api_key = env::var("MKT_STRIPE_API_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_STRIPE_API_KEY is not set. Card payments, refunds and payouts will fail.");
            String::default()
        });
        let webhook_secret = env::var("MKT_STRIPE_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_STRIPE_WEBHOOK_SECRET is not set. Please set it to the signing secret for your webhook.");
            String::default()
        });
        let webhook_checks = parse_boolean_flag(env::var("MKT_STRIPE_WEBHOOK_CHECKS").ok(), true);
        if !webhook_checks {
            warn!("🚨️ Stripe webhook signature checks are DISABLED. Anyone can mark orders as paid. 🚨️");
        }
        let webhook_tolerance_secs = env::var("MKT_STRIPE_WEBHOOK_TOLERANCE")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for MKT_STRIPE_WEBHOOK_TOLERANCE. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS);
        Self {
            api_url,
            api_key: Secret::new(api_key),
            webhook_secret: Secret::new(webhook_secret),
            webhook_checks,
            webhook_tolerance_secs,
        }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The non-secret part of the configuration that request handlers need.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub default_country: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            default_country: config.default_country.clone(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}
