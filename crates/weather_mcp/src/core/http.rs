use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde_json::Value;

use crate::core::error::{FetchError, WeatherServerError, WeatherServerResult};

pub type FetchResult<T> = Result<T, FetchError>;

/// Query string parameters for a GET request
pub type QueryParams<'a> = &'a [(&'a str, String)];

const DEFAULT_USER_AGENT: &str = concat!("mcp-server-weather/", env!("CARGO_PKG_VERSION"));

/// Outbound HTTP capability used by every provider chain
///
/// Each call carries its own timeout. Any non-2xx status or undecodable body
/// is reported as an error, never as a partial value.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET `url` and decode the body as JSON
    async fn get_json(
        &self,
        url: &str,
        query: QueryParams<'_>,
        timeout: Duration,
    ) -> FetchResult<Value>;

    /// GET `url` and return the body as text
    async fn get_text(
        &self,
        url: &str,
        query: QueryParams<'_>,
        timeout: Duration,
    ) -> FetchResult<String>;
}

/// Build a reqwest client with optional user agent and proxy
pub fn build_client(user_agent: Option<&str>, proxy_url: Option<&str>) -> WeatherServerResult<Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT));

    if let Some(proxy_url) = proxy_url {
        let proxy = Proxy::all(proxy_url).map_err(|e| WeatherServerError::ClientError {
            message: format!("invalid proxy URL {}: {}", proxy_url, e),
        })?;
        builder = builder.proxy(proxy);
    }

    builder.build().map_err(|e| WeatherServerError::ClientError {
        message: e.to_string(),
    })
}

/// `HttpFetch` backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        url: &str,
        query: QueryParams<'_>,
        timeout: Duration,
    ) -> FetchResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

fn map_reqwest_error(url: &str, timeout: Duration, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else if error.is_decode() || error.is_body() {
        FetchError::Malformed {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Unreachable {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get_json(
        &self,
        url: &str,
        query: QueryParams<'_>,
        timeout: Duration,
    ) -> FetchResult<Value> {
        let response = self.send(url, query, timeout).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))
    }

    async fn get_text(
        &self,
        url: &str,
        query: QueryParams<'_>,
        timeout: Duration,
    ) -> FetchResult<String> {
        let response = self.send(url, query, timeout).await?;
        response
            .text()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))
    }
}

/// In-memory `HttpFetch` double that replays scripted answers and records
/// every request it receives
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    pub(crate) enum Scripted {
        Json(Value),
        Text(String),
        Fail(FetchError),
    }

    #[derive(Debug, Default)]
    pub(crate) struct ScriptedFetcher {
        routes: HashMap<String, Scripted>,
        calls: Mutex<Vec<(String, Duration)>>,
    }

    impl ScriptedFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Script the answer for a URL; keys may include a query string to
        /// match one exact request, or omit it to match any query
        pub(crate) fn on(mut self, key: impl Into<String>, answer: Scripted) -> Self {
            self.routes.insert(key.into(), answer);
            self
        }

        pub(crate) fn on_json(self, key: impl Into<String>, body: Value) -> Self {
            self.on(key, Scripted::Json(body))
        }

        pub(crate) fn on_text(self, key: impl Into<String>, body: &str) -> Self {
            self.on(key, Scripted::Text(body.to_string()))
        }

        pub(crate) fn on_timeout(self, key: impl Into<String>) -> Self {
            let key = key.into();
            let error = FetchError::Timeout {
                url: key.clone(),
                timeout: Duration::from_secs(10),
            };
            self.on(key, Scripted::Fail(error))
        }

        /// Every request seen so far, as `url?k=v&k=v`
        pub(crate) fn calls(&self) -> Vec<String> {
            self.timed_calls().into_iter().map(|(key, _)| key).collect()
        }

        /// Every request seen so far with the timeout it was sent with
        pub(crate) fn timed_calls(&self) -> Vec<(String, Duration)> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub(crate) fn request_key(url: &str, query: QueryParams<'_>) -> String {
            if query.is_empty() {
                return url.to_string();
            }
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            format!("{}?{}", url, pairs.join("&"))
        }

        fn answer(
            &self,
            url: &str,
            query: QueryParams<'_>,
            timeout: Duration,
        ) -> FetchResult<Scripted> {
            let key = Self::request_key(url, query);
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((key.clone(), timeout));
            }

            self.routes
                .get(&key)
                .or_else(|| self.routes.get(url))
                .cloned()
                .ok_or_else(|| FetchError::Unreachable {
                    url: url.to_string(),
                    message: "no scripted response".to_string(),
                })
        }
    }

    #[async_trait]
    impl HttpFetch for ScriptedFetcher {
        async fn get_json(
            &self,
            url: &str,
            query: QueryParams<'_>,
            timeout: Duration,
        ) -> FetchResult<Value> {
            match self.answer(url, query, timeout)? {
                Scripted::Json(body) => Ok(body),
                Scripted::Text(body) => {
                    serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
                Scripted::Fail(error) => Err(error),
            }
        }

        async fn get_text(
            &self,
            url: &str,
            query: QueryParams<'_>,
            timeout: Duration,
        ) -> FetchResult<String> {
            match self.answer(url, query, timeout)? {
                Scripted::Json(body) => Ok(body.to_string()),
                Scripted::Text(body) => Ok(body),
                Scripted::Fail(error) => Err(error),
            }
        }
    }
}
