//! Response envelope decoding
//!
//! Every response from the remote API is an XML document shaped like
//!
//! ```xml
//! <eveapi version="2">
//!     <currentTime>2009-10-18 17:05:31</currentTime>
//!     <result>...</result>            <!-- or <error code="123">message</error> -->
//!     <cachedUntil>2009-11-18 17:05:31</cachedUntil>
//! </eveapi>
//! ```
//!
//! Both the success and the error shape carry the server's current time and
//! its declared validity horizon; these drive the cache lifetime.

use crate::error::{ApplicationError, DecodeError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use std::collections::BTreeMap;

pub const CURRENT_TIME_FIELD: &str = "currentTime";
pub const CACHED_UNTIL_FIELD: &str = "cachedUntil";
pub const RESULT_FIELD: &str = "result";
pub const ERROR_FIELD: &str = "error";

/// Owned XML element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Element>,
}

impl Element {
    /// Parse a complete document and return its root element
    pub fn parse(body: &[u8]) -> Result<Element, DecodeError> {
        let text = std::str::from_utf8(body)?;
        let mut reader = Reader::from_str(text.trim_start());

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Element::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DecodeError::Structure("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let content = t.unescape()?;
                    match stack.last_mut() {
                        Some(top) => top.text.push_str(&content),
                        None if content.trim().is_empty() => {}
                        None => {
                            return Err(DecodeError::Structure(
                                "text outside of the root element".into(),
                            ))
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(std::str::from_utf8(&data.into_inner())?);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(DecodeError::Structure("unclosed element at end of document".into()));
        }
        root.ok_or_else(|| DecodeError::Structure("document has no root element".into()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Element, DecodeError> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_string();
        let mut attributes = BTreeMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            attributes.insert(key, attr.unescape_value()?.into_owned());
        }
        Ok(Element {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Direct text content, untrimmed
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child with the given name
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(DecodeError::Structure("multiple root elements".into())),
    }
    Ok(())
}

/// Decoded outcome of a response
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Success, carrying the `result` subtree
    Result(Element),
    /// Application-level error reported by the server
    Error { code: i64, message: String },
}

/// A decoded response: outcome plus the server's time metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub outcome: Outcome,
    /// Server's "current time" (Unix seconds)
    pub timestamp: Option<i64>,
    /// Server's "cached until" (Unix seconds)
    pub expires: Option<i64>,
}

impl Envelope {
    pub fn decode(body: &[u8]) -> Result<Envelope, DecodeError> {
        let root = Element::parse(body)?;

        let timestamp = root.get_ts(CURRENT_TIME_FIELD)?;
        let expires = root.get_ts(CACHED_UNTIL_FIELD)?;

        if let Some(error) = root.find(ERROR_FIELD) {
            let raw_code = error
                .attr("code")
                .ok_or_else(|| DecodeError::Structure("error element has no code".into()))?;
            let code = raw_code
                .trim()
                .parse::<i64>()
                .map_err(|_| DecodeError::Field {
                    field: "error.code".to_string(),
                    value: raw_code.to_string(),
                })?;

            return Ok(Envelope {
                outcome: Outcome::Error {
                    code,
                    message: error.text().trim().to_string(),
                },
                timestamp,
                expires,
            });
        }

        let result = root
            .find(RESULT_FIELD)
            .cloned()
            .ok_or_else(|| DecodeError::Structure("response has neither result nor error".into()))?;

        Ok(Envelope {
            outcome: Outcome::Result(result),
            timestamp,
            expires,
        })
    }

    /// Cache lifetime declared by the server, `expires - timestamp`
    pub fn duration(&self) -> Option<i64> {
        derive_duration(self.timestamp, self.expires)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error { .. })
    }

    /// Split into the result subtree or the application error it describes
    pub fn into_result(self) -> Result<Element, ApplicationError> {
        match self.outcome {
            Outcome::Result(result) => Ok(result),
            Outcome::Error { code, message } => Err(ApplicationError {
                code,
                message,
                timestamp: self.timestamp,
                expires: self.expires,
            }),
        }
    }
}

/// Seconds between the server's current time and its declared expiry
pub fn derive_duration(timestamp: Option<i64>, expires: Option<i64>) -> Option<i64> {
    match (timestamp, expires) {
        (Some(timestamp), Some(expires)) => Some(expires - timestamp),
        _ => None,
    }
}
