use crate::error::{HarvestError, Result};
use crate::models::FetchOutcome;
use crate::utils::constants::{API_VERSION, ENV_SUBSCRIPTION_KEY, ENV_TOKEN};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Issues a single GET and classifies the result.
///
/// Implementations never fail: every error condition is folded into a
/// [`FetchOutcome`] so the batch fetcher can keep one outcome per URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> FetchOutcome;
}

/// API credentials, read from the `token` and `ocp` environment variables.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub subscription_key: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name).map_err(|_| {
                HarvestError::Config(format!("Environment variable '{}' is not set", name))
            })
        };

        Ok(Self {
            token: read(ENV_TOKEN)?,
            subscription_key: read(ENV_SUBSCRIPTION_KEY)?,
        })
    }

    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut bearer = header_value(&format!("Bearer {}", self.token), "Authorization")?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        headers.insert(
            HeaderName::from_static("api-version"),
            HeaderValue::from_static(API_VERSION),
        );

        let mut subscription = header_value(&self.subscription_key, "Ocp-Apim-Subscription-Key")?;
        subscription.set_sensitive(true);
        headers.insert(
            HeaderName::from_static("ocp-apim-subscription-key"),
            subscription,
        );

        Ok(headers)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

fn header_value(value: &str, header: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        HarvestError::Config(format!("Credential for '{}' is not a valid header value", header))
    })
}

/// reqwest-backed transport sharing one connection pool and header set.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .default_headers(credentials.headers()?)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(e),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty());
            return FetchOutcome::HttpError {
                status: status.as_u16(),
                message,
            };
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return classify_error(e),
        };

        match serde_json::from_slice(&body) {
            Ok(payload) => FetchOutcome::Success(payload),
            Err(e) => {
                debug!(url, error = %e, "Response body is not valid JSON");
                FetchOutcome::TransportError(format!("invalid JSON body: {}", e))
            }
        }
    }
}

fn classify_error(error: reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::Timeout
    } else {
        FetchOutcome::TransportError(error.to_string())
    }
}
