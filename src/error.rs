//! Evegate error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// The application error carried by this error, if any
    pub fn as_application(&self) -> Option<&ApplicationError> {
        match self {
            GatewayError::Application(e) => Some(e),
            _ => None,
        }
    }
}

/// Domain-level failure reported by the server inside a well-formed response.
///
/// Carries the server's own time metadata so the failing response can be cached
/// for as long as the server says it stays valid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code={code})")]
pub struct ApplicationError {
    pub code: i64,
    pub message: String,
    pub timestamp: Option<i64>,
    pub expires: Option<i64>,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed response: {0}")]
    Structure(String),

    #[error("invalid value {value:?} for field '{field}'")]
    Field { field: String, value: String },
}
