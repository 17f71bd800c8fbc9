//! Cached request/response gateway
//!
//! [`Gateway::fetch`] canonicalizes the request, opens a cache transaction,
//! hits the transport only on a miss, decodes the envelope and commits the raw
//! body for exactly as long as the server declared it valid. Application errors
//! are cached too, so repeating a failing call inside the error's validity
//! window replays the cached error without a network round trip.

use crate::cache::{create_cache, CacheStore, CacheTransaction, ClassifyOutcome, CommitOutcome};
use crate::config::GatewayConfig;
use crate::envelope::{Element, Envelope};
use crate::error::{GatewayError, Result};
use crate::request::{Credential, ParamValue, RequestKey};
use crate::transport::{HttpTransport, Transport};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// A successful API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResult<T = Element> {
    pub result: T,
    /// Server's current time (Unix seconds)
    pub timestamp: Option<i64>,
    /// Server's cached-until time (Unix seconds)
    pub expires: Option<i64>,
}

impl<T> ApiResult<T> {
    /// Replace the payload, keeping the time metadata
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        ApiResult {
            result: f(self.result),
            timestamp: self.timestamp,
            expires: self.expires,
        }
    }
}

/// Time metadata of the most recently decoded response; diagnostic only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastTimestamps {
    pub current_time: Option<i64>,
    pub cached_until: Option<i64>,
}

impl ClassifyOutcome for GatewayError {
    fn commit_outcome(&self) -> CommitOutcome {
        match self {
            GatewayError::Application(e) => CommitOutcome::ApplicationFailure {
                timestamp: e.timestamp,
                expires: e.expires,
            },
            _ => CommitOutcome::OtherFailure,
        }
    }
}

pub struct Gateway {
    base_url: String,
    credential: Option<Credential>,
    cache: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    last_timestamps: Mutex<LastTimestamps>,
}

impl Gateway {
    /// Build a gateway with an HTTP transport and the configured cache backend
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate().map_err(GatewayError::Config)?;

        let transport =
            HttpTransport::with_options(config.timeout_secs, config.user_agent.as_deref())?;
        let cache = create_cache(&config.cache)
            .map_err(|e| GatewayError::Config(format!("{:#}", e)))?;

        Ok(Self::with_parts(
            config.base_url,
            config.credential,
            cache,
            Arc::new(transport),
        ))
    }

    /// Build a gateway from explicit collaborators
    pub fn with_parts(
        base_url: impl Into<String>,
        credential: Option<Credential>,
        cache: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
            cache,
            transport,
            last_timestamps: Mutex::new(LastTimestamps::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn last_timestamps(&self) -> LastTimestamps {
        self.last_timestamps
            .lock()
            .map(|last| *last)
            .unwrap_or_default()
    }

    /// Request a path such as `server/ServerStatus` from the API.
    ///
    /// Fails with [`GatewayError::Application`] when the server reports an error.
    pub async fn fetch<I, K, V>(&self, path: &str, params: I) -> Result<ApiResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let request = RequestKey::new(path, params, self.credential.as_ref());

        let mut txn = CacheTransaction::begin(self.cache.as_ref(), request.cache_key());
        let result = self.fetch_in(&request, &mut txn).await;
        txn.close(CommitOutcome::of(&result));

        result
    }

    async fn fetch_in(
        &self,
        request: &RequestKey,
        txn: &mut CacheTransaction<'_>,
    ) -> Result<ApiResult> {
        let cached = txn.value().map(Envelope::decode);
        let envelope = match cached {
            Some(decoded) => {
                debug!("Cache hit, returning cached payload");
                decoded?
            }
            None => {
                let body = self.send(request).await?;
                let envelope = Envelope::decode(&body);
                txn.set_value(body);
                envelope?
            }
        };

        self.record_timestamps(envelope.timestamp, envelope.expires);
        txn.set_duration_from(envelope.timestamp, envelope.expires);

        let (timestamp, expires) = (envelope.timestamp, envelope.expires);
        match envelope.into_result() {
            Ok(result) => Ok(ApiResult {
                result,
                timestamp,
                expires,
            }),
            Err(e) => {
                error!("Raising API error: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn send(&self, request: &RequestKey) -> Result<Vec<u8>> {
        let url = request.absolute_url(&self.base_url);
        let body = if request.has_params() {
            Some(request.encoded_params())
        } else {
            None
        };

        Ok(self.transport.send(&url, body.as_deref()).await?)
    }

    fn record_timestamps(&self, current_time: Option<i64>, cached_until: Option<i64>) {
        if let Ok(mut last) = self.last_timestamps.lock() {
            *last = LastTimestamps {
                current_time,
                cached_until,
            };
        }
    }
}
