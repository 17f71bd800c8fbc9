//! Gateway caching behaviour against a recording transport

use async_trait::async_trait;
use evegate::cache::{CacheStore, MemoryCache};
use evegate::server::Server;
use evegate::{
    Credential, Gateway, GatewayError, LastTimestamps, ParamValue, RequestKey, Transport,
    TransportError,
};
use std::sync::{Arc, Mutex};

const TEST_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<eveapi version="2">
    <currentTime>2009-10-18 17:05:31</currentTime>
    <result>
        <rowset>
            <row foo="bar" />
            <row foo="baz" />
        </rowset>
    </result>
    <cachedUntil>2009-11-18 17:05:31</cachedUntil>
</eveapi>"#;

const ERROR_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<eveapi version="2">
    <currentTime>2009-10-18 17:05:31</currentTime>
    <error code="123">
        Test error message.
    </error>
    <cachedUntil>2009-11-18 19:05:31</cachedUntil>
</eveapi>"#;

const SHORT_ERROR_XML: &str = r#"<eveapi version="2">
    <currentTime>2009-10-18 17:05:31</currentTime>
    <error code="203">Authentication failure.</error>
    <cachedUntil>2009-10-18 17:06:31</cachedUntil>
</eveapi>"#;

const SERVER_STATUS_XML: &str = r#"<eveapi version="2">
    <currentTime>2011-09-05 19:10:31</currentTime>
    <result>
        <serverOpen>True</serverOpen>
        <onlinePlayers>38102</onlinePlayers>
    </result>
    <cachedUntil>2011-09-05 19:13:31</cachedUntil>
</eveapi>"#;

type Call = (String, Option<String>);

/// Transport that records every call and replays a fixed outcome
struct RecordingTransport {
    body: Option<&'static str>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingTransport {
    fn returning(body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, url: &str, form_body: Option<&str>) -> Result<Vec<u8>, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), form_body.map(ToString::to_string)));

        match self.body {
            Some(body) => Ok(body.as_bytes().to_vec()),
            None => Err(TransportError::Unavailable("connection refused".to_string())),
        }
    }
}

fn gateway_with(
    transport: Arc<RecordingTransport>,
    cache: Arc<MemoryCache>,
    credential: Option<Credential>,
) -> Gateway {
    Gateway::with_parts("https://api.eveonline.com", credential, cache, transport)
}

fn no_params() -> Vec<(String, ParamValue)> {
    Vec::new()
}

#[tokio::test]
async fn get_decodes_result_and_records_timestamps() {
    let transport = RecordingTransport::returning(TEST_XML);
    let gateway = gateway_with(transport.clone(), Arc::new(MemoryCache::new()), None);

    let response = gateway
        .fetch("foo/Bar", [("a", vec![1, 2, 3])])
        .await
        .unwrap();

    let rows: Vec<_> = response
        .result
        .find("rowset")
        .unwrap()
        .find_all("row")
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].attr("foo"), Some("bar"));
    assert_eq!(response.timestamp, Some(1255885531));
    assert_eq!(response.expires, Some(1258563931));
    assert_eq!(
        gateway.last_timestamps(),
        LastTimestamps {
            current_time: Some(1255885531),
            cached_until: Some(1258563931),
        }
    );

    assert_eq!(
        transport.calls(),
        vec![(
            "https://api.eveonline.com/foo/Bar.xml.aspx".to_string(),
            Some("a=1%2C2%2C3".to_string())
        )]
    );
}

#[tokio::test]
async fn second_identical_call_is_served_from_cache() {
    let transport = RecordingTransport::returning(TEST_XML);
    let gateway = gateway_with(transport.clone(), Arc::new(MemoryCache::new()), None);

    let first = gateway.fetch("foo/Bar", [("a", 1), ("b", 2)]).await.unwrap();
    let second = gateway.fetch("foo/Bar", [("b", 2), ("a", 1)]).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn cached_result_skips_transport() {
    let transport = RecordingTransport::returning(ERROR_XML);
    let cache = Arc::new(MemoryCache::new());
    let key = RequestKey::new("foo/Bar", [("a", vec![1, 2, 3])], None);
    cache.put(&key.cache_key(), TEST_XML.as_bytes(), 3600).unwrap();

    let gateway = gateway_with(transport.clone(), cache, None);
    let response = gateway
        .fetch("foo/Bar", [("a", vec![1, 2, 3])])
        .await
        .unwrap();

    assert!(transport.calls().is_empty());
    assert_eq!(response.timestamp, Some(1255885531));
    assert_eq!(gateway.last_timestamps().cached_until, Some(1258563931));
}

#[tokio::test]
async fn get_with_credential_sends_key_params() {
    let transport = RecordingTransport::returning(TEST_XML);
    let gateway = gateway_with(
        transport.clone(),
        Arc::new(MemoryCache::new()),
        Some(Credential::new(1, "code")),
    );

    gateway.fetch("foo", [("a", vec![2, 3, 4])]).await.unwrap();

    assert_eq!(
        transport.calls(),
        vec![(
            "https://api.eveonline.com/foo.xml.aspx".to_string(),
            Some("a=2%2C3%2C4&keyID=1&vCode=code".to_string())
        )]
    );
}

#[tokio::test]
async fn keyed_and_unkeyed_requests_are_cached_separately() {
    let transport = RecordingTransport::returning(TEST_XML);
    let cache = Arc::new(MemoryCache::new());

    let plain = gateway_with(transport.clone(), cache.clone(), None);
    let keyed = gateway_with(transport.clone(), cache, Some(Credential::new(1, "code")));

    plain.fetch("p", no_params()).await.unwrap();
    keyed.fetch("p", no_params()).await.unwrap();

    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn request_without_params_uses_get() {
    let transport = RecordingTransport::returning(TEST_XML);
    let gateway = gateway_with(transport.clone(), Arc::new(MemoryCache::new()), None);

    gateway.fetch("eve/Status", no_params()).await.unwrap();

    assert_eq!(transport.calls()[0].1, None);
}

#[tokio::test]
async fn application_error_carries_server_metadata() {
    let transport = RecordingTransport::returning(ERROR_XML);
    let gateway = gateway_with(transport, Arc::new(MemoryCache::new()), None);

    let err = gateway.fetch("eve/Error", no_params()).await.unwrap_err();
    let api_err = err.as_application().expect("application error");

    assert_eq!(api_err.code, 123);
    assert_eq!(api_err.message, "Test error message.");
    assert_eq!(api_err.timestamp, Some(1255885531));
    assert_eq!(api_err.expires, Some(1258571131));
    assert_eq!(
        gateway.last_timestamps(),
        LastTimestamps {
            current_time: Some(1255885531),
            cached_until: Some(1258571131),
        }
    );
}

#[tokio::test]
async fn application_error_is_replayed_from_cache() {
    let transport = RecordingTransport::returning(SHORT_ERROR_XML);
    let cache = Arc::new(MemoryCache::new());
    let gateway = gateway_with(transport.clone(), cache.clone(), None);

    let first = gateway.fetch("account/Characters", no_params()).await.unwrap_err();
    let second = gateway.fetch("account/Characters", no_params()).await.unwrap_err();

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(first.as_application(), second.as_application());
    assert_eq!(second.as_application().map(|e| e.code), Some(203));

    let key = RequestKey::new("account/Characters", no_params(), None);
    assert_eq!(
        cache.get(&key.cache_key()).unwrap(),
        Some(SHORT_ERROR_XML.as_bytes().to_vec())
    );
}

#[tokio::test]
async fn cached_error_skips_transport() {
    let transport = RecordingTransport::returning(TEST_XML);
    let cache = Arc::new(MemoryCache::new());
    let key = RequestKey::new("foo/Bar", [("a", vec![1, 2, 3])], None);
    cache.put(&key.cache_key(), ERROR_XML.as_bytes(), 3600).unwrap();

    let gateway = gateway_with(transport.clone(), cache, None);
    let err = gateway
        .fetch("foo/Bar", [("a", vec![1, 2, 3])])
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Application(_)));
    assert!(transport.calls().is_empty());
    assert_eq!(gateway.last_timestamps().cached_until, Some(1258571131));
}

#[tokio::test]
async fn transport_failure_propagates_and_is_not_cached() {
    let transport = RecordingTransport::failing();
    let cache = Arc::new(MemoryCache::new());
    let gateway = gateway_with(transport.clone(), cache.clone(), None);

    let err = gateway.fetch("eve/Status", no_params()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));

    let err = gateway.fetch("eve/Status", no_params()).await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));

    assert_eq!(transport.calls().len(), 2);
    assert_eq!(cache.stats().unwrap().total_entries, 0);
}

#[tokio::test]
async fn server_status_helper() {
    let transport = RecordingTransport::returning(SERVER_STATUS_XML);
    let gateway = gateway_with(transport.clone(), Arc::new(MemoryCache::new()), None);

    let response = Server::new(&gateway).server_status().await.unwrap();

    assert!(response.result.online);
    assert_eq!(response.result.players, 38102);
    assert_eq!(response.expires.zip(response.timestamp).map(|(e, t)| e - t), Some(180));
    assert_eq!(
        transport.calls()[0].0,
        "https://api.eveonline.com/server/ServerStatus.xml.aspx"
    );
}
