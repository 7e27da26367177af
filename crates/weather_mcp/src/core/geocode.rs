//! Free-text place name geocoding against the Open-Meteo search API.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::GeocoderSettings;
use crate::core::error::{GeocodeError, ProviderMiss};
use crate::core::http::HttpFetch;
use crate::core::models::{LocationOrigin, ResolvedLocation};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    name: Option<String>,
    admin1: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
}

impl Candidate {
    fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    fn into_resolved(self, query: &str, latitude: f64, longitude: f64) -> ResolvedLocation {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| query.to_string());

        let mut parts = vec![name];
        parts.extend(
            [self.admin1, self.country]
                .into_iter()
                .flatten()
                .filter(|extra| !extra.trim().is_empty()),
        );

        ResolvedLocation {
            latitude,
            longitude,
            display_name: parts.join(", "),
            timezone: self.timezone,
            source_ip: None,
            origin: LocationOrigin::PlaceName,
        }
    }
}

/// The original query followed by progressively shorter comma-truncated
/// forms, e.g. "A, B, C" then "A, B" then "A"
pub fn simplified_queries(name: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    let mut current = name.trim();

    loop {
        if !current.is_empty() && !queries.iter().any(|q| q == current) {
            queries.push(current.to_string());
        }
        match current.rfind(',') {
            Some(idx) => current = current[..idx].trim(),
            None => break,
        }
    }

    queries
}

/// Resolves place names to coordinates, retrying with simplified names
#[derive(Clone)]
pub struct PlaceGeocoder {
    fetcher: Arc<dyn HttpFetch>,
    settings: GeocoderSettings,
    timeout: Duration,
}

impl PlaceGeocoder {
    pub fn new(fetcher: Arc<dyn HttpFetch>, settings: GeocoderSettings, timeout: Duration) -> Self {
        Self {
            fetcher,
            settings,
            timeout,
        }
    }

    pub async fn geocode(&self, name: &str) -> Result<ResolvedLocation, GeocodeError> {
        let queries = simplified_queries(name);

        for (attempt, query) in queries.iter().enumerate() {
            if attempt > 0 {
                tracing::info!("Trying simplified search: {}", query);
            }

            match self.search(query).await {
                Ok(Some(location)) => {
                    tracing::info!(
                        "Found location: {} ({}, {})",
                        location.display_name,
                        location.latitude,
                        location.longitude
                    );
                    return Ok(location);
                }
                Ok(None) => {
                    tracing::debug!("No geocoding results for: {}", query);
                }
                Err(miss) => {
                    tracing::error!("Geocoding error for '{}': {}", query, miss);
                    break;
                }
            }
        }

        tracing::warn!("Location not found: {}", name);
        Err(GeocodeError::NotFound {
            query: name.to_string(),
        })
    }

    /// One search request; `Ok(None)` when the provider has no usable
    /// candidate
    async fn search(&self, query: &str) -> Result<Option<ResolvedLocation>, ProviderMiss> {
        let params = [
            ("name", query.to_string()),
            ("count", self.settings.count.to_string()),
            ("language", self.settings.language.clone()),
            ("format", "json".to_string()),
        ];

        let body = self
            .fetcher
            .get_json(&self.settings.url, &params, self.timeout)
            .await?;
        let response: SearchResponse =
            serde_json::from_value(body).map_err(|e| ProviderMiss::schema(&e))?;

        Ok(response
            .results
            .unwrap_or_default()
            .into_iter()
            .find_map(|candidate| {
                candidate
                    .coordinates()
                    .map(|(lat, lon)| candidate.into_resolved(query, lat, lon))
            }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::core::http::testing::ScriptedFetcher;

    const SEARCH: &str = "https://geocoding-api.open-meteo.com/v1/search";

    fn search_key(name: &str) -> String {
        format!("{}?name={}&count=5&language=en&format=json", SEARCH, name)
    }

    fn geocoder(fetcher: Arc<ScriptedFetcher>) -> PlaceGeocoder {
        PlaceGeocoder::new(
            fetcher,
            ServiceConfig::default().geocoder,
            Duration::from_secs(10),
        )
    }

    fn springfield() -> serde_json::Value {
        json!({
            "results": [{
                "name": "Springfield",
                "admin1": "Illinois",
                "country": "United States",
                "latitude": 39.80172,
                "longitude": -89.64371,
                "timezone": "America/Chicago"
            }]
        })
    }

    #[test]
    fn test_simplified_queries() {
        assert_eq!(
            simplified_queries("Springfield, Illinois, USA"),
            vec!["Springfield, Illinois, USA", "Springfield, Illinois", "Springfield"]
        );
        assert_eq!(simplified_queries("Paris"), vec!["Paris"]);
        assert_eq!(simplified_queries(", Paris"), vec![", Paris"]);
        assert_eq!(simplified_queries("Paris,,"), vec!["Paris,,", "Paris,", "Paris"]);
    }

    #[tokio::test]
    async fn test_comma_retry_finds_simpler_match() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .on_json(search_key("Springfield, Illinois, USA"), json!({"generationtime_ms": 0.4}))
                .on_json(search_key("Springfield, Illinois"), json!({"results": []}))
                .on_json(search_key("Springfield"), springfield()),
        );

        let location = geocoder(fetcher.clone())
            .geocode("Springfield, Illinois, USA")
            .await
            .unwrap();

        assert_eq!(location.origin, LocationOrigin::PlaceName);
        assert_eq!(location.display_name, "Springfield, Illinois, United States");
        assert_eq!(location.latitude, 39.80172);
        assert_eq!(location.timezone.as_deref(), Some("America/Chicago"));
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_place_is_not_found() {
        let fetcher = Arc::new(
            ScriptedFetcher::new().on_json(search_key("Zzqxnotarealplace"), json!({"generationtime_ms": 0.2})),
        );

        let result = geocoder(fetcher.clone()).geocode("Zzqxnotarealplace").await;

        assert_eq!(
            result,
            Err(GeocodeError::NotFound {
                query: "Zzqxnotarealplace".to_string()
            })
        );
        assert_eq!(fetcher.calls(), vec![search_key("Zzqxnotarealplace")]);
    }

    #[tokio::test]
    async fn test_candidate_without_coordinates_is_skipped() {
        let fetcher = Arc::new(ScriptedFetcher::new().on_json(
            search_key("Lima"),
            json!({
                "results": [
                    {"name": "Lima", "country": "Peru"},
                    {"name": "Lima", "admin1": "Ohio", "country": "United States", "latitude": 40.74255, "longitude": -84.10523}
                ]
            }),
        ));

        let location = geocoder(fetcher).geocode("Lima").await.unwrap();

        assert_eq!(location.display_name, "Lima, Ohio, United States");
    }

    #[tokio::test]
    async fn test_transport_error_stops_retries() {
        let fetcher = Arc::new(ScriptedFetcher::new().on_timeout(SEARCH));

        let result = geocoder(fetcher.clone()).geocode("Portland, Oregon").await;

        assert!(matches!(result, Err(GeocodeError::NotFound { .. })));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_display_keeps_repeated_parts() {
        let fetcher = Arc::new(ScriptedFetcher::new().on_json(
            search_key("Monaco"),
            json!({"results": [{"name": "Monaco", "country": "Monaco", "latitude": 43.73333, "longitude": 7.41667}]}),
        ));

        let location = geocoder(fetcher).geocode("Monaco").await.unwrap();

        assert_eq!(location.display_name, "Monaco, Monaco");
        assert!(location.timezone.is_none());
    }
}
