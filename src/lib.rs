//! Evegate - caching client gateway for the EVE XML API
//!
//! Responses carry their own caching directives (`currentTime` / `cachedUntil`),
//! and the gateway caches each raw body, including error bodies, for exactly
//! the window the server declared.

pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod gateway;
pub mod output;
pub mod request;
pub mod server;
pub mod transport;

pub use cache::{create_cache, CacheStore, CacheTransaction, CommitOutcome, MemoryCache};
pub use config::{ConfigOptions, GatewayConfig};
pub use envelope::{Element, Envelope};
pub use error::{ApplicationError, DecodeError, GatewayError, Result, TransportError};
pub use gateway::{ApiResult, Gateway, LastTimestamps};
pub use output::OutputEnvelope;
pub use request::{Credential, ParamValue, RequestKey};
pub use transport::{HttpTransport, Transport};

/// Evegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
