//! HTTP transport for the remote API

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sends a request and returns the raw response body
///
/// A form body means POST; no body means GET.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, form_body: Option<&str>) -> Result<Vec<u8>, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_options(DEFAULT_TIMEOUT_SECS, None)
    }

    pub fn with_options(timeout_secs: u64, user_agent: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent.to_string());
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, form_body: Option<&str>) -> Result<Vec<u8>, TransportError> {
        let url = url::Url::parse(url)?;

        let request = match form_body {
            Some(body) => {
                debug!("POSTing request to {}", url);
                self.client
                    .post(url)
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(body.to_string())
            }
            None => {
                debug!("GETting request from {}", url);
                self.client.get(url)
            }
        };

        let response = request.send().await?;

        // The API reports application errors with non-2xx codes and an XML
        // error body, so the body is returned regardless of status.
        let status = response.status();
        if !status.is_success() {
            warn!("API responded with HTTP {}", status);
        }

        Ok(response.bytes().await?.to_vec())
    }
}
