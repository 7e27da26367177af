//! IP geolocation over an ordered chain of providers.
//!
//! Every provider answers with its own schema. A normalizer per
//! [`GeoShape`] translates the raw body into a [`GeoFix`]; a fix is only
//! accepted when it carries finite coordinates.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{GeoEndpoint, GeoShape, IP_PLACEHOLDER};
use crate::core::classify::{AddressClass, classify};
use crate::core::error::{LocateError, ProviderMiss};
use crate::core::http::HttpFetch;
use crate::core::models::{LocationOrigin, ResolvedLocation};
use crate::core::public_ip::PublicAddressResolver;
use crate::core::utils::format_coordinates;

/// Provider-independent geolocation answer
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub ip: Option<IpAddr>,
    pub timezone: Option<String>,
}

impl GeoFix {
    /// "City, Region, Country" with absent and repeated parts skipped
    pub fn display_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for part in [&self.city, &self.region, &self.country].into_iter().flatten() {
            let part = part.trim();
            if !part.is_empty() && !parts.contains(&part) {
                parts.push(part);
            }
        }

        if parts.is_empty() {
            format_coordinates(self.latitude, self.longitude)
        } else {
            parts.join(", ")
        }
    }

    pub fn into_resolved(self, origin: LocationOrigin) -> ResolvedLocation {
        ResolvedLocation {
            display_name: self.display_name(),
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone,
            source_ip: self.ip,
            origin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiCoBody {
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    ip: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpInfoBody {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    loc: Option<String>,
    ip: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiComBody {
    city: Option<String>,
    region_name: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    query: Option<String>,
    timezone: Option<String>,
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ProviderMiss> {
    serde_json::from_value(body).map_err(|e| ProviderMiss::schema(&e))
}

fn finite_pair(latitude: Option<f64>, longitude: Option<f64>) -> Result<(f64, f64), ProviderMiss> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok((lat, lon)),
        _ => Err(ProviderMiss::MissingCoordinates),
    }
}

fn parse_ip(raw: Option<&str>) -> Option<IpAddr> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Split ipinfo's "lat,lon" string
fn split_loc(loc: Option<&str>) -> (Option<f64>, Option<f64>) {
    match loc.and_then(|l| l.split_once(',')) {
        Some((lat, lon)) => (lat.trim().parse().ok(), lon.trim().parse().ok()),
        None => (None, None),
    }
}

impl GeoShape {
    /// Translate a provider body into a fix.
    ///
    /// `requested` is the address the chain asked about, if any.
    pub fn normalize(&self, body: Value, requested: Option<IpAddr>) -> Result<GeoFix, ProviderMiss> {
        match self {
            GeoShape::IpApiCo => {
                let b: IpApiCoBody = decode(body)?;
                let (latitude, longitude) = finite_pair(b.latitude, b.longitude)?;
                Ok(GeoFix {
                    city: b.city,
                    region: b.region,
                    country: b.country_name,
                    latitude,
                    longitude,
                    ip: parse_ip(b.ip.as_deref()).or(requested),
                    timezone: b.timezone,
                })
            }
            GeoShape::IpInfo => {
                let b: IpInfoBody = decode(body)?;
                let (lat, lon) = split_loc(b.loc.as_deref());
                let (latitude, longitude) = finite_pair(lat, lon)?;
                Ok(GeoFix {
                    city: b.city,
                    region: b.region,
                    country: b.country,
                    latitude,
                    longitude,
                    ip: parse_ip(b.ip.as_deref()).or(requested),
                    timezone: b.timezone,
                })
            }
            GeoShape::IpApiCom => {
                let b: IpApiComBody = decode(body)?;
                let (latitude, longitude) = finite_pair(b.lat, b.lon)?;
                // caller-only provider: its echo describes the server, not the
                // address we were asked about
                Ok(GeoFix {
                    city: b.city,
                    region: b.region_name,
                    country: b.country,
                    latitude,
                    longitude,
                    ip: requested.or_else(|| parse_ip(b.query.as_deref())),
                    timezone: b.timezone,
                })
            }
        }
    }
}

/// Best-effort location of an IP address
#[derive(Clone)]
pub struct IpGeolocator {
    fetcher: Arc<dyn HttpFetch>,
    public_ip: PublicAddressResolver,
    endpoints: Vec<GeoEndpoint>,
    timeout: Duration,
}

impl IpGeolocator {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        public_ip: PublicAddressResolver,
        endpoints: Vec<GeoEndpoint>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            public_ip,
            endpoints,
            timeout,
        }
    }

    /// Locate `address`, or the server's own public address when `address`
    /// is absent, private or malformed
    pub async fn geolocate(&self, address: Option<&str>) -> Result<ResolvedLocation, LocateError> {
        tracing::info!("Getting geolocation from IP: {}", address.unwrap_or("auto-detect"));

        let (target, origin) = self.prepare_address(address).await;

        for endpoint in &self.endpoints {
            let url = request_url(endpoint, target);
            tracing::debug!("Trying geolocation service: {}", url);

            match self.query(endpoint, &url, target).await {
                Ok(fix) => {
                    tracing::info!(
                        "Successfully got location from {}: {} ({}, {})",
                        endpoint.url,
                        fix.display_name(),
                        fix.latitude,
                        fix.longitude
                    );
                    return Ok(fix.into_resolved(origin));
                }
                Err(miss) => {
                    tracing::warn!("Failed geolocation service {}: {}", endpoint.url, miss);
                }
            }
        }

        tracing::error!("All geolocation services failed");
        Err(LocateError::AllProvidersExhausted {
            attempted: self.endpoints.len(),
        })
    }

    /// Decide which address the providers are asked about
    async fn prepare_address(&self, address: Option<&str>) -> (Option<IpAddr>, LocationOrigin) {
        if let Some(AddressClass::Public(ip)) = address.map(classify) {
            return (Some(ip), LocationOrigin::ClientIp);
        }

        match self.public_ip.resolve().await {
            Ok(ip) => {
                tracing::info!("Using public IP for geolocation: {}", ip);
                (Some(ip), LocationOrigin::AutoPublicIp)
            }
            Err(_) => {
                tracing::warn!("Using current location (no specific IP)");
                (None, LocationOrigin::AutoPublicIp)
            }
        }
    }

    async fn query(
        &self,
        endpoint: &GeoEndpoint,
        url: &str,
        target: Option<IpAddr>,
    ) -> Result<GeoFix, ProviderMiss> {
        let body = self.fetcher.get_json(url, &[], self.timeout).await?;
        endpoint.shape.normalize(body, target)
    }
}

/// URL for one provider: the address form when there is an address and the
/// provider supports it, the caller form otherwise
fn request_url(endpoint: &GeoEndpoint, target: Option<IpAddr>) -> String {
    match (target, &endpoint.address_url) {
        (Some(ip), Some(template)) => template.replace(IP_PLACEHOLDER, &ip.to_string()),
        _ => endpoint.url.clone(),
    }
}
