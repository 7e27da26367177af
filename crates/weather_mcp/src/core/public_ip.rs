//! Discovery of the server's own public address through echo services.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{EchoShape, PublicIpEndpoint};
use crate::core::error::{LocateError, ProviderMiss};
use crate::core::http::HttpFetch;

#[derive(Debug, Deserialize)]
struct JsonEcho {
    ip: Option<String>,
}

/// Queries public-address echo services in order until one answers with a
/// well-formed address
#[derive(Clone)]
pub struct PublicAddressResolver {
    fetcher: Arc<dyn HttpFetch>,
    endpoints: Vec<PublicIpEndpoint>,
    timeout: Duration,
}

impl PublicAddressResolver {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        endpoints: Vec<PublicIpEndpoint>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            timeout,
        }
    }

    pub async fn resolve(&self) -> Result<IpAddr, LocateError> {
        tracing::debug!("Attempting to get public IP address");

        for endpoint in &self.endpoints {
            tracing::debug!("Trying public IP service: {}", endpoint.url);
            match self.query(endpoint).await {
                Ok(ip) => {
                    tracing::info!(
                        "Successfully obtained public IP: {} from {}",
                        ip,
                        endpoint.url
                    );
                    return Ok(ip);
                }
                Err(miss) => {
                    tracing::warn!("Failed to get public IP from {}: {}", endpoint.url, miss);
                }
            }
        }

        tracing::error!("All public IP services failed");
        Err(LocateError::AllProvidersExhausted {
            attempted: self.endpoints.len(),
        })
    }

    async fn query(&self, endpoint: &PublicIpEndpoint) -> Result<IpAddr, ProviderMiss> {
        let raw = match endpoint.shape {
            EchoShape::JsonIp => {
                let body = self
                    .fetcher
                    .get_json(&endpoint.url, &[], self.timeout)
                    .await?;
                let echo: JsonEcho =
                    serde_json::from_value(body).map_err(|e| ProviderMiss::schema(&e))?;
                echo.ip.unwrap_or_default()
            }
            EchoShape::PlainText => {
                self.fetcher
                    .get_text(&endpoint.url, &[], self.timeout)
                    .await?
            }
        };

        parse_address(&raw)
    }
}

fn parse_address(raw: &str) -> Result<IpAddr, ProviderMiss> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| ProviderMiss::MalformedAddress { len: raw.len() })
}
