//! A [`CountryResolver`] backed by an ip-api.com style JSON lookup service.
use std::{net::IpAddr, sync::Arc, time::Duration};

use log::*;
use marketplace_engine::traits::{CountryResolver, GeoLookupError};
use mkt_common::helpers::normalize_country_code;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::ServerError;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct IpApiResolver {
    base_url: String,
    client: Arc<Client>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    status: String,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl IpApiResolver {
    pub fn new(base_url: &str) -> Result<Self, ServerError> {
        let client =
            Client::builder().timeout(LOOKUP_TIMEOUT).build().map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }
}

/// Addresses that no lookup service can place.
fn is_unroutable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

impl CountryResolver for IpApiResolver {
    async fn country_for_ip(&self, ip: IpAddr) -> Result<String, GeoLookupError> {
        if is_unroutable(ip) {
            return Err(GeoLookupError::UnknownAddress(ip));
        }
        let url = format!("{}/{ip}", self.base_url);
        trace!("🌍️ Looking up {ip}");
        let response = self
            .client
            .get(url)
            .query(&[("fields", "status,message,countryCode")])
            .send()
            .await
            .map_err(|e| GeoLookupError::LookupFailed(ip, e.to_string()))?
            .json::<LookupResponse>()
            .await
            .map_err(|e| GeoLookupError::LookupFailed(ip, e.to_string()))?;
        if response.status != "success" {
            let reason = response.message.unwrap_or(response.status);
            return Err(GeoLookupError::LookupFailed(ip, reason));
        }
        response
            .country_code
            .as_deref()
            .and_then(normalize_country_code)
            .ok_or(GeoLookupError::UnknownAddress(ip))
    }
}
