//! HTTP transport used to reach the licensing server.
//!
//! The core only needs "GET this url, give me status and body". Any `Err`
//! returned by an [`HttpClient`] is treated as the server being unreachable.
//! Non-2xx responses are not errors: their bodies still carry the server's
//! JSON answer.

use crate::error::LicenceResult;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with the given body.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Blocking HTTP GET capability.
pub trait HttpClient: Send + Sync {
    /// Performs a GET request against an absolute url.
    fn get(&self, url: &str) -> LicenceResult<HttpResponse>;
}

#[cfg(feature = "online")]
pub use online::ReqwestClient;

#[cfg(feature = "online")]
mod online {
    use super::{HttpClient, HttpResponse};
    use crate::config::LicenceConfig;
    use crate::error::{LicenceError, LicenceResult};
    use std::time::Duration;
    use tracing::debug;

    /// [`HttpClient`] backed by `reqwest`'s blocking client.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::blocking::Client,
    }

    impl ReqwestClient {
        /// Builds a client using the configured timeout and user agent.
        pub fn new(config: &LicenceConfig) -> LicenceResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| LicenceError::Transport(format!("http client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        fn get(&self, url: &str) -> LicenceResult<HttpResponse> {
            let resp = self
                .client
                .get(url)
                .header("Accept", "application/json")
                .send()
                .map_err(|e| LicenceError::Transport(format!("request failed: {}", e.without_url())))?;

            let status = resp.status().as_u16();
            if !resp.status().is_success() {
                debug!(status, "licensing server answered with a non-success status");
            }

            let body = resp
                .text()
                .map_err(|e| LicenceError::Transport(format!("read body: {}", e.without_url())))?;
            Ok(HttpResponse { status, body })
        }
    }
}
