use std::net::IpAddr;

use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GeoLookupError {
    #[error("Could not look up the location of {0}: {1}")]
    LookupFailed(IpAddr, String),
    #[error("No country is known for {0}")]
    UnknownAddress(IpAddr),
}

/// Maps a client IP address to an ISO 3166 alpha-2 country code.
#[allow(async_fn_in_trait)]
pub trait CountryResolver {
    async fn country_for_ip(&self, ip: IpAddr) -> Result<String, GeoLookupError>;

    /// Resolves the country for `ip`, falling back to `default` if the lookup fails for any reason.
    async fn country_or_default(&self, ip: IpAddr, default: &str) -> String {
        match self.country_for_ip(ip).await {
            Ok(country) => country,
            Err(e) => {
                warn!("🌍️ Geo lookup failed. Using the default country {default}. {e}");
                default.to_string()
            },
        }
    }
}
