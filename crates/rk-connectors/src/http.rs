//! HTTP utilities for connectors.
//!
//! [`HttpClient`] wraps `reqwest` with authentication, rate limiting and
//! error mapping. Reads are retried with exponential backoff. Writes are
//! sent exactly once: a failed mutation is reported to the caller, never
//! replayed behind its back.

use crate::secure_string::SecureString;
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use rand::Rng;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token lifetime assumed when the issuer omits `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// HTTP client with auth, retry and rate limiting.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    access_token: Arc<RwLock<Option<CachedToken>>>,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

#[derive(Clone)]
struct CachedToken {
    value: SecureString,
    expires_at: Instant,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    /// Period duration.
    pub period: Duration,
    /// Maximum burst size.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 10,
        }
    }
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a new HTTP client with rate limiting.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        // TLS verification can only be switched off in debug builds.
        let verify_tls = if config.verify_tls {
            true
        } else if cfg!(debug_assertions) {
            warn!(
                base_url = %config.base_url,
                connector_name = %config.name,
                "TLS certificate verification disabled"
            );
            false
        } else {
            warn!(
                connector_name = %config.name,
                "Ignoring request to disable TLS verification in a release build"
            );
            true
        };

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .cookie_store(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = match rate_limit {
            Some(rl) => {
                let per_request = rl.period / rl.max_requests.max(1);
                let quota = Quota::with_period(per_request)
                    .ok_or_else(|| {
                        ConnectorError::ConfigError("Rate limit period must be non-zero".into())
                    })?
                    .allow_burst(NonZeroU32::new(rl.burst_size).unwrap_or(NonZeroU32::MIN));
                Some(Arc::new(GovernorRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            client,
            config,
            access_token: Arc::new(RwLock::new(None)),
            rate_limiter,
        })
    }

    /// Builds a URL from a path. Absolute URLs pass through untouched.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Connector name this client belongs to.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// GET with retry.
    pub async fn get(&self, path: &str) -> ConnectorResult<Response> {
        let request = self.client.get(self.build_url(path));
        self.execute_with_retry(request).await
    }

    /// GET with query parameters, with retry.
    pub async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ConnectorResult<Response> {
        let request = self.client.get(self.build_url(path)).query(query);
        self.execute_with_retry(request).await
    }

    /// GET with retry, deserializing the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ConnectorResult<T> {
        let response = self.get(path).await?;
        self.parse_json_response(response).await
    }

    /// POST a JSON body once.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<Response> {
        let request = self.client.post(self.build_url(path)).json(body);
        self.execute_once(request).await
    }

    /// POST a multipart form once.
    pub async fn post_multipart(&self, path: &str, form: Form) -> ConnectorResult<Response> {
        let request = self.client.post(self.build_url(path)).multipart(form);
        self.execute_once(request).await
    }

    /// PUT without a body once.
    pub async fn put_empty(&self, path: &str) -> ConnectorResult<Response> {
        let request = self
            .client
            .put(self.build_url(path))
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.execute_once(request).await
    }

    /// DELETE once.
    pub async fn delete(&self, path: &str) -> ConnectorResult<Response> {
        let request = self.client.delete(self.build_url(path));
        self.execute_once(request).await
    }

    async fn parse_json_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> ConnectorResult<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.without_url().to_string()))?;

        serde_json::from_str(&text).map_err(|e| {
            ConnectorError::InvalidResponse(format!(
                "Failed to parse response (status {}): {} - Body: {}",
                status,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Sends a request a single time.
    async fn execute_once(&self, request: RequestBuilder) -> ConnectorResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let request = self.add_auth(request).await?;
        let response = request.send().await.map_err(map_transport_error)?;
        classify_response(response).await
    }

    /// Sends a request, retrying server errors and transport failures.
    async fn execute_with_retry(&self, request: RequestBuilder) -> ConnectorResult<Response> {
        let request = self.add_auth(request).await?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!(connector = %self.config.name, "Retry attempt {} after {:?}", attempt, delay);
                sleep(delay).await;
                delay = std::cmp::min(delay * 2 + rand_jitter(), Duration::from_secs(30));
            }

            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| ConnectorError::Internal("Failed to clone request".to_string()))?;

            let response = match attempt_request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(map_transport_error(e));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.config.max_retries {
                let retry_after = retry_after_secs(&response);
                warn!(connector = %self.config.name, "Rate limited, waiting {} seconds", retry_after);
                sleep(Duration::from_secs(retry_after)).await;
                last_error = Some(ConnectorError::RateLimited(retry_after));
                continue;
            }
            if status.is_server_error() && attempt < self.config.max_retries {
                warn!(connector = %self.config.name, "Server error {}, retrying", status);
                last_error = Some(ConnectorError::RequestFailed(format!(
                    "Server error: {}",
                    status
                )));
                continue;
            }

            return classify_response(response).await;
        }

        Err(last_error.unwrap_or_else(|| ConnectorError::Internal("Unknown error".to_string())))
    }

    async fn add_auth(&self, request: RequestBuilder) -> ConnectorResult<RequestBuilder> {
        match &self.config.auth {
            AuthConfig::None => Ok(request),
            AuthConfig::ApiKey { key, header_name } => {
                Ok(request.header(header_name, key.expose_secret()))
            }
            AuthConfig::BearerToken { token } => Ok(request.bearer_auth(token.expose_secret())),
            AuthConfig::BotToken { token } => Ok(request.header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", token.expose_secret()),
            )),
            AuthConfig::Basic { username, password } => {
                Ok(request.basic_auth(username, Some(password.expose_secret())))
            }
            AuthConfig::OAuth2 { .. } | AuthConfig::MetadataServer { .. } => {
                let token = self.access_token().await?;
                Ok(request.bearer_auth(token.expose_secret()))
            }
        }
    }

    /// Returns a cached access token, minting a new one when near expiry.
    async fn access_token(&self) -> ConnectorResult<SecureString> {
        {
            let cached = self.access_token.read().await;
            if let Some(t) = &*cached {
                if t.expires_at > Instant::now() + Duration::from_secs(60) {
                    return Ok(t.value.clone());
                }
            }
        }

        info!(connector = %self.config.name, "Fetching new access token");

        let request = match &self.config.auth {
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                scopes,
            } => {
                let mut params = vec![
                    ("grant_type", "client_credentials".to_string()),
                    ("client_id", client_id.clone()),
                    ("client_secret", client_secret.expose_secret().to_string()),
                ];
                if !scopes.is_empty() {
                    params.push(("scope", scopes.join(" ")));
                }
                self.client.post(token_url).form(&params)
            }
            AuthConfig::MetadataServer { token_url, scopes } => {
                let mut request = self.client.get(token_url).header("Metadata-Flavor", "Google");
                if !scopes.is_empty() {
                    request = request.query(&[("scopes", scopes.join(","))]);
                }
                request
            }
            _ => {
                return Err(ConnectorError::ConfigError(
                    "Connector is not configured for token authentication".into(),
                ))
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| ConnectorError::AuthenticationFailed(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectorError::AuthenticationFailed(format!(
                "Token request failed: {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        let value = SecureString::new(token.access_token);
        let ttl = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        *self.access_token.write().await = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });

        Ok(value)
    }
}

/// Drops the URL first: query strings can carry credentials.
fn map_transport_error(e: reqwest::Error) -> ConnectorError {
    let e = e.without_url();
    if e.is_timeout() {
        ConnectorError::Timeout(e.to_string())
    } else if e.is_connect() {
        ConnectorError::ConnectionFailed(e.to_string())
    } else {
        ConnectorError::RequestFailed(e.to_string())
    }
}

fn retry_after_secs(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v.ceil() as u64)
        .unwrap_or(60)
}

/// Maps non-success statuses onto connector errors.
async fn classify_response(response: Response) -> ConnectorResult<Response> {
    let status = response.status();
    if status.is_success() || status.is_redirection() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(ConnectorError::RateLimited(retry_after_secs(
            &response,
        ))),
        StatusCode::UNAUTHORIZED => Err(ConnectorError::AuthenticationFailed("Unauthorized".into())),
        StatusCode::FORBIDDEN => Err(ConnectorError::AuthorizationDenied("Forbidden".into())),
        StatusCode::NOT_FOUND => Err(ConnectorError::NotFound("Resource not found".into())),
        s if s.is_client_error() => {
            let body = response.text().await.unwrap_or_default();
            Err(ConnectorError::RequestFailed(format!(
                "Client error {}: {}",
                s,
                body.chars().take(500).collect::<String>()
            )))
        }
        s => Err(ConnectorError::RequestFailed(format!("Server error: {}", s))),
    }
}

fn rand_jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_connector_config;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, auth: AuthConfig, max_retries: u32) -> ConnectorConfig {
        let mut config = test_connector_config("http-test", &server.uri());
        config.auth = auth;
        config.max_retries = max_retries;
        config
    }

    #[test]
    fn test_build_url() {
        let client =
            HttpClient::new(test_connector_config("test", "https://api.example.com/")).unwrap();
        assert_eq!(client.build_url("/v1/users"), "https://api.example.com/v1/users");
        assert_eq!(client.build_url("v1/users"), "https://api.example.com/v1/users");
        assert_eq!(
            client.build_url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 100);
        assert_eq!(config.burst_size, 10);
    }

    #[tokio::test]
    async fn test_get_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = HttpClient::new(config_for(&server, AuthConfig::None, 2)).unwrap();
        let response = client.get("/flaky").await.unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn test_writes_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/members/x"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(config_for(&server, AuthConfig::None, 3)).unwrap();
        let err = client.delete("/members/x").await.unwrap_err();
        assert!(matches!(err, ConnectorError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_bot_token_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bot abc"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let auth = AuthConfig::BotToken {
            token: SecureString::from("abc"),
        };
        let client = HttpClient::new(config_for(&server, auth, 0)).unwrap();
        assert!(client.get("/me").await.is_ok());
    }

    #[tokio::test]
    async fn test_oauth2_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let auth = AuthConfig::OAuth2 {
            client_id: "id".into(),
            client_secret: SecureString::from("secret"),
            token_url: format!("{}/token", server.uri()),
            scopes: vec![],
        };
        let client = HttpClient::new(config_for(&server, auth, 0)).unwrap();
        client.get("/data").await.unwrap();
        client.get("/data").await.unwrap();
    }

    #[tokio::test]
    async fn test_not_found_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(config_for(&server, AuthConfig::None, 0)).unwrap();
        assert!(matches!(
            client.get("/missing").await,
            Err(ConnectorError::NotFound(_))
        ));
    }
}
