//! # Weather MCP Server Core
//!
//! This module resolves where a request is about and fetches the weather and
//! local time for that place.
//!
//! ## Features
//! - Location precedence: explicit coordinates, place name, caller IP,
//!   auto-detected public IP, default location
//! - Ordered provider chains with per-provider response normalization
//! - Private/public address classification
//! - Current weather and multi-day forecasts from Open-Meteo
//! - Spoken local time for the resolved timezone
//!
//! ## Modules
//! - `error`: Custom error types and error handling
//! - `models`: Data structures for requests and responses
//! - `http`: The HTTP fetch port and its reqwest adapter
//! - `classify`: Private/public IP address classification
//! - `public_ip`: Public address discovery over echo services
//! - `geolocate`: IP geolocation provider chain
//! - `geocode`: Place-name geocoding with simplified-query retry
//! - `resolver`: Location resolution orchestrator
//! - `weather`: Forecast fetching and Markdown rendering
//! - `spoken`: Spoken time-of-day formatting
//! - `utils`: Helper functions for formatting and number words

pub mod classify;
pub mod error;
pub mod geocode;
pub mod geolocate;
pub mod http;
pub mod models;
pub mod public_ip;
pub mod resolver;
pub mod spoken;
pub mod utils;
pub mod weather;
