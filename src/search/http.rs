//! Result download over HTTP

use std::time::Duration;

use tracing::{debug, warn};

use crate::models::ResultError;

/// Connect timeout used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Read timeout used when none is configured
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// User and optional password sent as HTTP basic auth
#[derive(Clone)]
struct BasicAuth {
    user: String,
    password: Option<String>,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth").field("user", &self.user).finish_non_exhaustive()
    }
}

/// HTTP GET client with fixed connect and read timeouts
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    auth: Option<BasicAuth>,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + read_timeout)
            .build()?;
        Ok(Self { client, auth: None })
    }

    /// A fetcher sharing this client that sends basic auth with every request
    pub fn with_basic_auth(&self, user: &str, password: Option<&str>) -> Self {
        Self {
            client: self.client.clone(),
            auth: Some(BasicAuth {
                user: user.to_string(),
                password: password.map(str::to_string),
            }),
        }
    }

    /// GET `url` and return the body of a 200 response.
    ///
    /// Timeouts map to [`ErrorCode::Timeout`](crate::models::ErrorCode),
    /// other transport failures to `Request`, any status but 200 to `Server`.
    pub async fn get_text(&self, url: &str, headers: &[(String, String)]) -> Result<String, ResultError> {
        debug!("Requesting {}", url);

        let mut request = self.client.get(url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, auth.password.as_deref());
        }
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        if status != 200 {
            warn!("{} returned status {}", url, status);
            return Err(ResultError::server(status));
        }

        response.text().await.map_err(|e| classify(url, e))
    }
}

fn classify(url: &str, error: reqwest::Error) -> ResultError {
    warn!("Request to {} failed: {}", url, error);
    if error.is_timeout() {
        ResultError::timeout()
    } else {
        ResultError::request()
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
                .timeout(DEFAULT_CONNECT_TIMEOUT + DEFAULT_READ_TIMEOUT)
                .build()
                .unwrap_or_default(),
            auth: None,
        }
    }
}
