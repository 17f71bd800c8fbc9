//! Canonical request keys
//!
//! A [`RequestKey`] is the order-independent identity of a (path, parameters) pair.
//! Parameter names are sorted, values are stringified, and list values are
//! comma-joined in their given order. The cache key derived from it is a SHA-256
//! digest of the canonical form, so it is stable across process restarts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Version prefix for cache keys; bump when the key layout changes
pub const CACHE_VERSION: &str = "1";

/// Parameter name carrying the credential id
pub const KEY_ID_PARAM: &str = "keyID";

/// Parameter name carrying the credential secret
pub const V_CODE_PARAM: &str = "vCode";

/// Fixed-length mask substituted for secrets in logs
pub const SECRET_MASK: &str = "********";

/// A request parameter value: a scalar or an ordered list of scalars
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    /// Wire form of the value. Lists become comma-joined strings.
    pub fn clean(&self) -> String {
        match self {
            ParamValue::Scalar(s) => s.clone(),
            ParamValue::List(items) => items.join(","),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Scalar(value.clone())
    }
}

macro_rules! scalar_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_display!(i32, i64, u32, u64, usize);

impl<T: ToString> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString> From<&[T]> for ParamValue {
    fn from(values: &[T]) -> Self {
        ParamValue::List(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString, const N: usize> From<[T; N]> for ParamValue {
    fn from(values: [T; N]) -> Self {
        ParamValue::List(values.iter().map(ToString::to_string).collect())
    }
}

/// API credential: a key id and its verification code
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub key_id: String,
    pub v_code: String,
}

impl Credential {
    pub fn new(key_id: impl ToString, v_code: impl Into<String>) -> Self {
        Self {
            key_id: key_id.to_string(),
            v_code: v_code.into(),
        }
    }

    /// Validate the credential
    pub fn validate(&self) -> Result<(), String> {
        if self.key_id.is_empty() {
            return Err("Credential key id cannot be empty".to_string());
        }
        if self.v_code.is_empty() {
            return Err("Credential verification code cannot be empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("v_code", &SECRET_MASK)
            .finish()
    }
}

/// Immutable, canonicalized identity of an API request
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    path: String,
    params: Vec<(String, String)>,
}

impl RequestKey {
    /// Build a key from a path, a parameter mapping and an optional credential.
    ///
    /// Credential parameters are merged before sorting, so keyed and unkeyed
    /// requests to the same path never share a key.
    pub fn new<I, K, V>(path: &str, params: I, credential: Option<&Credential>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut sorted: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().clean()))
            .collect();

        if let Some(credential) = credential {
            sorted.insert(KEY_ID_PARAM.to_string(), credential.key_id.clone());
            sorted.insert(V_CODE_PARAM.to_string(), credential.v_code.clone());
        }

        let key = Self {
            path: path.to_string(),
            params: sorted.into_iter().collect(),
        };
        debug!("Created request key: {:?}", key);
        key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Sorted (name, value) pairs
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// Form-urlencoded parameters, in canonical order
    pub fn encoded_params(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }

    /// Absolute URL of this request against the given base URL
    pub fn absolute_url(&self, base_url: &str) -> String {
        format!(
            "{}/{}.xml.aspx",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Deterministic cache key
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.path.as_bytes());
        hasher.update(b"?");
        hasher.update(self.encoded_params().as_bytes());
        format!("{}-{:x}", CACHE_VERSION, hasher.finalize())
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(k, v)| {
                if k == V_CODE_PARAM {
                    (k.as_str(), SECRET_MASK)
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();

        f.debug_struct("RequestKey")
            .field("path", &self.path)
            .field("params", &redacted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> Vec<(&'static str, ParamValue)> {
        Vec::new()
    }

    #[test]
    fn test_param_order_does_not_matter() {
        let k1 = RequestKey::new("foo/bar", [("a", 1), ("b", 2)], None);
        let k2 = RequestKey::new("foo/bar", [("b", 2), ("a", 1)], None);

        assert_eq!(k1, k2);
        assert_eq!(k1.cache_key(), k2.cache_key());
    }

    #[test]
    fn test_key_variance() {
        let a1 = RequestKey::new("foo/bar", [("a", 1)], None);
        let b2 = RequestKey::new("foo/bar", [("b", 2)], None);
        let a2 = RequestKey::new("foo/bar", [("a", 2)], None);
        assert_ne!(a1.cache_key(), b2.cache_key());
        assert_ne!(a1.cache_key(), a2.cache_key());

        let bar = RequestKey::new("foo/bar", no_params(), None);
        let baz = RequestKey::new("foo/baz", no_params(), None);
        assert_ne!(bar.cache_key(), baz.cache_key());
    }

    #[test]
    fn test_list_values_keep_their_order() {
        let k1 = RequestKey::new("p", [("ids", vec![1, 2, 3])], None);
        let k2 = RequestKey::new("p", [("ids", vec![3, 2, 1])], None);

        assert_eq!(k1.params(), &[("ids".to_string(), "1,2,3".to_string())]);
        assert_ne!(k1.cache_key(), k2.cache_key());
    }

    #[test]
    fn test_list_and_joined_scalar_are_equivalent() {
        let list = RequestKey::new("p", [("ids", vec![1, 2])], None);
        let scalar = RequestKey::new("p", [("ids", "1,2")], None);
        assert_eq!(list, scalar);
    }

    #[test]
    fn test_credential_separates_keys() {
        let credential = Credential::new(1, "code");
        let plain = RequestKey::new("p", no_params(), None);
        let keyed = RequestKey::new("p", no_params(), Some(&credential));

        assert_ne!(plain, keyed);
        assert_ne!(plain.cache_key(), keyed.cache_key());
    }

    #[test]
    fn test_encoded_params_with_credential() {
        let credential = Credential::new(1, "code");
        let key = RequestKey::new("foo", [("a", vec![2, 3, 4])], Some(&credential));

        assert_eq!(key.encoded_params(), "a=2%2C3%2C4&keyID=1&vCode=code");
    }

    #[test]
    fn test_absolute_url() {
        let key = RequestKey::new("corp/AssetList", no_params(), None);
        assert_eq!(
            key.absolute_url("https://api.eveonline.com/"),
            "https://api.eveonline.com/corp/AssetList.xml.aspx"
        );
    }

    #[test]
    fn test_cache_key_is_stable() {
        let key = RequestKey::new("foo/bar", [("a", "1")], None);
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"foo/bar?a=1");
            format!("1-{:x}", hasher.finalize())
        };
        assert_eq!(key.cache_key(), expected);
    }

    #[test]
    fn test_debug_masks_secret() {
        let credential = Credential::new(42, "super-secret-verification-code");
        let key = RequestKey::new("p", [("a", 1)], Some(&credential));

        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains(SECRET_MASK));
        assert!(rendered.contains("42"));

        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_credential_validate() {
        assert!(Credential::new(1, "code").validate().is_ok());
        assert!(Credential::new("", "code").validate().is_err());
        assert!(Credential::new(1, "").validate().is_err());
    }
}
