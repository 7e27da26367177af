//! Location resolution precedence ladder.
//!
//! Explicit coordinates win, then a place name, then IP geolocation, then the
//! configured default location. Only a place name that cannot be geocoded is
//! reported as an error.

use std::sync::Arc;

use crate::config::{DefaultLocation, ServiceConfig};
use crate::core::error::ResolveError;
use crate::core::geocode::PlaceGeocoder;
use crate::core::geolocate::IpGeolocator;
use crate::core::http::HttpFetch;
use crate::core::models::{LocationOrigin, LocationQuery, ResolvedLocation};
use crate::core::public_ip::PublicAddressResolver;

#[derive(Clone)]
pub struct LocationResolver {
    geocoder: PlaceGeocoder,
    geolocator: IpGeolocator,
    default_location: DefaultLocation,
}

impl LocationResolver {
    pub fn new(config: &ServiceConfig, fetcher: Arc<dyn HttpFetch>) -> Self {
        let public_ip = PublicAddressResolver::new(
            fetcher.clone(),
            config.public_ip_endpoints.clone(),
            config.public_ip_timeout,
        );
        let geolocator = IpGeolocator::new(
            fetcher.clone(),
            public_ip,
            config.geo_endpoints.clone(),
            config.lookup_timeout,
        );
        let geocoder = PlaceGeocoder::new(fetcher, config.geocoder.clone(), config.lookup_timeout);

        Self {
            geocoder,
            geolocator,
            default_location: config.default_location.clone(),
        }
    }

    pub async fn resolve(&self, query: &LocationQuery) -> Result<ResolvedLocation, ResolveError> {
        match (query.latitude, query.longitude) {
            (Some(latitude), Some(longitude)) => {
                tracing::debug!("Using explicit coordinates: {}, {}", latitude, longitude);
                return Ok(ResolvedLocation::from_coordinates(latitude, longitude));
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("Ignoring incomplete coordinates: latitude and longitude must both be given");
            }
            (None, None) => {}
        }

        if let Some(name) = query.location_name.as_deref().map(str::trim)
            && !name.is_empty()
        {
            tracing::debug!("Geocoding location name: {}", name);
            return self
                .geocoder
                .geocode(name)
                .await
                .map_err(|_| ResolveError::LocationNotFound {
                    name: name.to_string(),
                });
        }

        match self.geolocator.geolocate(query.client_ip.as_deref()).await {
            Ok(location) => Ok(location),
            Err(e) => {
                tracing::warn!(
                    "IP geolocation failed ({}), using default location {}",
                    e,
                    self.default_location.name
                );
                Ok(self.default_resolved())
            }
        }
    }

    fn default_resolved(&self) -> ResolvedLocation {
        let default = &self.default_location;
        ResolvedLocation {
            latitude: default.latitude,
            longitude: default.longitude,
            display_name: default.name.clone(),
            timezone: default.timezone.clone(),
            source_ip: None,
            origin: LocationOrigin::DefaultFallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::core::http::testing::ScriptedFetcher;

    fn resolver(fetcher: Arc<ScriptedFetcher>) -> LocationResolver {
        LocationResolver::new(&ServiceConfig::default(), fetcher)
    }

    fn query(name: Option<&str>, lat: Option<f64>, lon: Option<f64>, ip: Option<&str>) -> LocationQuery {
        LocationQuery {
            location_name: name.map(str::to_string),
            latitude: lat,
            longitude: lon,
            client_ip: ip.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_explicit_coordinates_win_without_io() {
        let fetcher = Arc::new(ScriptedFetcher::new());

        let location = resolver(fetcher.clone())
            .resolve(&query(Some("Tokyo"), Some(51.5074), Some(-0.1278), Some("8.8.8.8")))
            .await
            .unwrap();

        assert_eq!(location.origin, LocationOrigin::ExplicitCoords);
        assert_eq!(location.latitude, 51.5074);
        assert_eq!(location.longitude, -0.1278);
        assert_eq!(location.display_name, "Coordinates: 51.5074, -0.1278");
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_coordinates_are_explicit() {
        let fetcher = Arc::new(ScriptedFetcher::new());

        let location = resolver(fetcher)
            .resolve(&query(None, Some(0.0), Some(0.0), None))
            .await
            .unwrap();

        assert_eq!(location.origin, LocationOrigin::ExplicitCoords);
    }

    #[tokio::test]
    async fn test_place_name_miss_does_not_fall_through() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on_json(
                    "https://geocoding-api.open-meteo.com/v1/search",
                    json!({"generationtime_ms": 0.3}),
                )
                .on_json("https://api.ipify.org?format=json", json!({"ip": "8.8.8.8"})),
        );

        let result = resolver(fetcher.clone())
            .resolve(&query(Some("Zzqxnotarealplace"), None, None, Some("8.8.8.8")))
            .await;

        assert_eq!(
            result,
            Err(ResolveError::LocationNotFound {
                name: "Zzqxnotarealplace".to_string()
            })
        );
        assert!(
            fetcher.calls().iter().all(|c| c.contains("geocoding-api")),
            "unexpected calls: {:?}",
            fetcher.calls()
        );
    }

    #[tokio::test]
    async fn test_all_geolocation_failures_fall_back_to_default() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on_timeout("https://ipapi.co/8.8.8.8/json/")
                .on_timeout("https://ipinfo.io/8.8.8.8/json")
                .on_timeout("http://ip-api.com/json/"),
        );

        let location = resolver(fetcher)
            .resolve(&query(None, None, None, Some("8.8.8.8")))
            .await
            .unwrap();

        assert_eq!(location.origin, LocationOrigin::DefaultFallback);
        assert_eq!(location.latitude, 40.7128);
        assert_eq!(location.longitude, -74.0060);
        assert_eq!(location.headline(), "New York, USA (default fallback)");
        assert_eq!(location.timezone.as_deref(), Some("America/New_York"));
    }

    #[tokio::test]
    async fn test_incomplete_coordinates_are_ignored() {
        let fetcher = Arc::new(ScriptedFetcher::new().on_json(
            "https://geocoding-api.open-meteo.com/v1/search",
            json!({"results": [{"name": "Cairo", "country": "Egypt", "latitude": 30.06263, "longitude": 31.24967}]}),
        ));

        let location = resolver(fetcher)
            .resolve(&query(Some("Cairo"), Some(10.0), None, None))
            .await
            .unwrap();

        assert_eq!(location.origin, LocationOrigin::PlaceName);
        assert_eq!(location.display_name, "Cairo, Egypt");
    }

    #[tokio::test]
    async fn test_client_ip_tier() {
        let fetcher = Arc::new(ScriptedFetcher::new().on_json(
            "https://ipapi.co/8.8.8.8/json/",
            json!({"ip": "8.8.8.8", "city": "Mountain View", "country_name": "United States", "latitude": 37.4, "longitude": -122.1}),
        ));

        let location = resolver(fetcher)
            .resolve(&query(None, None, None, Some("8.8.8.8")))
            .await
            .unwrap();

        assert_eq!(location.origin, LocationOrigin::ClientIp);
        assert_eq!(location.headline(), "Mountain View, United States (IP-based)");
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on_json("https://api.ipify.org?format=json", json!({"ip": "1.1.1.1"}))
                .on_json(
                    "https://ipapi.co/1.1.1.1/json/",
                    json!({"ip": "1.1.1.1", "city": "Sydney", "region": "New South Wales", "country_name": "Australia", "latitude": -33.86, "longitude": 151.2, "timezone": "Australia/Sydney"}),
                ),
        );
        let resolver = resolver(fetcher);
        let request = query(None, None, None, Some("192.168.1.5"));

        let first = resolver.resolve(&request).await.unwrap();
        let second = resolver.resolve(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.origin, LocationOrigin::AutoPublicIp);
    }

    #[tokio::test]
    async fn test_each_chain_uses_its_own_timeout() {
        let config = ServiceConfig {
            public_ip_timeout: Duration::from_secs(3),
            lookup_timeout: Duration::from_secs(7),
            ..ServiceConfig::default()
        };
        let echo_urls: Vec<String> = config
            .public_ip_endpoints
            .iter()
            .map(|e| e.url.clone())
            .collect();
        let fetcher = Arc::new(ScriptedFetcher::new().on_json(
            "https://geocoding-api.open-meteo.com/v1/search",
            json!({"generationtime_ms": 0.2}),
        ));
        let resolver = LocationResolver::new(&config, fetcher.clone());

        let location = resolver
            .resolve(&query(None, None, None, Some("10.0.0.8")))
            .await
            .unwrap();
        assert_eq!(location.origin, LocationOrigin::DefaultFallback);

        let result = resolver
            .resolve(&query(Some("Springfield, XX"), None, None, None))
            .await;
        assert!(result.is_err());

        let calls = fetcher.timed_calls();
        let (echo, lookups): (Vec<_>, Vec<_>) =
            calls.iter().partition(|(key, _)| echo_urls.contains(key));

        // three echo services, three geolocation services, two geocoder queries
        assert_eq!(echo.len(), 3);
        assert_eq!(lookups.len(), 5);
        assert!(echo.iter().all(|(_, timeout)| *timeout == Duration::from_secs(3)));
        assert!(
            lookups
                .iter()
                .all(|(_, timeout)| *timeout == Duration::from_secs(7)),
            "unexpected timeouts: {:?}",
            lookups
        );
        assert!(lookups.iter().any(|(key, _)| key.contains("geocoding-api")));
    }
}
