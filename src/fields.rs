//! Typed field accessors and value parsers for response trees

use crate::envelope::Element;
use crate::error::DecodeError;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Textual timestamp format used by the API (always UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds between 1601-01-01 and the Unix epoch
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Parse an API timestamp into Unix seconds.
///
/// Empty strings, all-zero dates such as `0000-00-00 00:00:00` and
/// non-positive instants (the API emits `0001-01-01 00:00:00` for dates that
/// do not exist) decode to `None`.
pub fn parse_ts(value: &str) -> Result<Option<i64>, DecodeError> {
    let value = value.trim();
    if value.is_empty() || is_zero_date(value) {
        return Ok(None);
    }

    let parsed =
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| DecodeError::Field {
            field: "timestamp".to_string(),
            value: value.to_string(),
        })?;
    let ts = parsed.and_utc().timestamp();

    Ok(if ts > 0 { Some(ts) } else { None })
}

fn is_zero_date(value: &str) -> bool {
    value.contains('0') && value.bytes().filter(u8::is_ascii_digit).all(|b| b == b'0')
}

/// Convert a Windows FILETIME (100ns ticks since 1601) into Unix seconds
pub fn parse_ms_date(ticks: i64) -> i64 {
    ticks / 10_000_000 - FILETIME_EPOCH_OFFSET
}

/// A value from a "key: value" text block
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

fn int_pattern() -> Option<&'static Regex> {
    static INT: OnceLock<Option<Regex>> = OnceLock::new();
    INT.get_or_init(|| Regex::new(r"^-?\d+$").ok()).as_ref()
}

fn float_pattern() -> Option<&'static Regex> {
    static FLOAT: OnceLock<Option<Regex>> = OnceLock::new();
    FLOAT.get_or_init(|| Regex::new(r"^-?\d+\.\d+$").ok()).as_ref()
}

fn looks_like_int(val: &str) -> bool {
    int_pattern().is_some_and(|re| re.is_match(val))
}

fn looks_like_float(val: &str) -> bool {
    float_pattern().is_some_and(|re| re.is_match(val))
}

/// Parse newline-delimited `key: value` lines.
///
/// Keys containing `Date` hold FILETIME ticks and are converted to Unix seconds.
pub fn parse_keyval_data(data: &str) -> BTreeMap<String, KeyValue> {
    let mut results = BTreeMap::new();

    for line in data.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, val) = match line.split_once(": ") {
            Some((key, val)) => (key, val.trim()),
            None => (line.trim_end_matches(':'), ""),
        };

        let parsed = if key.contains("Date") {
            match val.parse::<i64>() {
                Ok(ticks) => KeyValue::Int(parse_ms_date(ticks)),
                Err(_) => KeyValue::Text(val.to_string()),
            }
        } else if val == "null" {
            KeyValue::Null
        } else if looks_like_int(val) {
            val.parse::<i64>()
                .map(KeyValue::Int)
                .unwrap_or_else(|_| KeyValue::Text(val.to_string()))
        } else if looks_like_float(val) {
            val.parse::<f64>()
                .map(KeyValue::Float)
                .unwrap_or_else(|_| KeyValue::Text(val.to_string()))
        } else {
            KeyValue::Text(val.to_string())
        };

        results.insert(key.to_string(), parsed);
    }

    results
}

fn field_error(field: &str, value: &str) -> DecodeError {
    DecodeError::Field {
        field: field.to_string(),
        value: value.to_string(),
    }
}

impl Element {
    /// Text of the named child, or `None` if the child is missing or empty
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.find(field)
            .map(Element::text)
            .filter(|text| !text.is_empty())
    }

    pub fn get_int(&self, field: &str) -> Result<Option<i64>, DecodeError> {
        match self.get_str(field) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| field_error(field, raw)),
            None => Ok(None),
        }
    }

    pub fn get_float(&self, field: &str) -> Result<Option<f64>, DecodeError> {
        match self.get_str(field) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| field_error(field, raw)),
            None => Ok(None),
        }
    }

    /// `True` / `False` as emitted by the API; anything else is `None`
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get_str(field).map(str::trim) {
            Some("True") => Some(true),
            Some("False") => Some(false),
            _ => None,
        }
    }

    pub fn get_ts(&self, field: &str) -> Result<Option<i64>, DecodeError> {
        match self.get_str(field) {
            Some(raw) => parse_ts(raw).map_err(|_| field_error(field, raw)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::parse(
            br#"<result>
                <name>Desmont McCallock</name>
                <count>1234</count>
                <balance>209127923.31</balance>
                <online>True</online>
                <banned>False</banned>
                <weird>maybe</weird>
                <created>2012-06-12 12:04:33</created>
                <empty/>
                <bad>12x</bad>
            </result>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_ts() {
        assert_eq!(parse_ts("2012-06-12 12:04:33").unwrap(), Some(1339502673));
        assert_eq!(parse_ts("").unwrap(), None);
        assert_eq!(parse_ts("0001-01-01 00:00:00").unwrap(), None);
        assert_eq!(parse_ts("1970-01-01 00:00:00").unwrap(), None);
        assert_eq!(parse_ts("0000-00-00 00:00:00").unwrap(), None);
        assert_eq!(parse_ts("  ").unwrap(), None);
        assert_eq!(parse_ts("0000-00-00").unwrap(), None);
        assert!(parse_ts("yesterday").is_err());
    }

    #[test]
    fn test_typed_getters() {
        let elem = sample();

        assert_eq!(elem.get_str("name"), Some("Desmont McCallock"));
        assert_eq!(elem.get_str("missing"), None);
        assert_eq!(elem.get_str("empty"), None);

        assert_eq!(elem.get_int("count").unwrap(), Some(1234));
        assert_eq!(elem.get_int("missing").unwrap(), None);
        assert!(elem.get_int("bad").is_err());

        assert_eq!(elem.get_float("balance").unwrap(), Some(209127923.31));
        assert_eq!(elem.get_float("empty").unwrap(), None);

        assert_eq!(elem.get_bool("online"), Some(true));
        assert_eq!(elem.get_bool("banned"), Some(false));
        assert_eq!(elem.get_bool("weird"), None);
        assert_eq!(elem.get_bool("missing"), None);

        assert_eq!(elem.get_ts("created").unwrap(), Some(1339502673));
        assert_eq!(elem.get_ts("missing").unwrap(), None);
    }

    #[test]
    fn test_parse_ms_date() {
        assert_eq!(parse_ms_date(129122878140000000), 1267814214);
    }

    #[test]
    fn test_parse_keyval_data() {
        let data = "
            toCorpOrAllianceID:
            shipTypeID: 587
            security: -0.5
            againstID: null
            declareDate: 129122878140000000
            name: Some Name
        ";
        let parsed = parse_keyval_data(data);

        assert_eq!(parsed["toCorpOrAllianceID"], KeyValue::Text(String::new()));
        assert_eq!(parsed["shipTypeID"], KeyValue::Int(587));
        assert_eq!(parsed["security"], KeyValue::Float(-0.5));
        assert_eq!(parsed["againstID"], KeyValue::Null);
        assert_eq!(parsed["declareDate"], KeyValue::Int(1267814214));
        assert_eq!(parsed["name"], KeyValue::Text("Some Name".to_string()));
    }

    #[test]
    fn test_number_detection() {
        assert!(looks_like_int("42"));
        assert!(looks_like_int("-7"));
        assert!(!looks_like_int("4.2"));
        assert!(!looks_like_int("12x"));
        assert!(!looks_like_int("-"));

        assert!(looks_like_float("-0.5"));
        assert!(!looks_like_float("1."));
        assert!(!looks_like_float(".5"));
        assert!(!looks_like_float("1.2.3"));

        let parsed = parse_keyval_data("a: 1.2.3\nb: 007");
        assert_eq!(parsed["a"], KeyValue::Text("1.2.3".to_string()));
        assert_eq!(parsed["b"], KeyValue::Int(7));
    }
}
