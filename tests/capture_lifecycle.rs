use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use serial_test::serial;

use netscope_core::api::capture_api::{
    activate, clear_records, configure, find_record, get_all_records, is_active,
    query_records, register_decryptor, search_records, set_decryption_enabled,
    subscribe_records,
};
use netscope_core::capture::{CapturingClient, DecryptionError, HttpClient, NetworkConfig};
use netscope_core::models::{CachePolicy, RecordFilter, StatusRange};
use netscope_core::storage::StoreEvent;

/// Serves canned responses keyed by path.
struct CannedClient;

impl HttpClient for CannedClient {
    type Body = Full<Bytes>;
    type Error = io::Error;

    fn send(
        &self,
        request: Request<Bytes>,
    ) -> BoxFuture<'static, Result<Response<Full<Bytes>>, io::Error>> {
        let path = request.uri().path().to_string();
        async move {
            let response = match path.as_str() {
                "/secret" => Response::builder()
                    .status(200)
                    .header("content-type", "text/plain")
                    .header("x-encrypted", "1")
                    .body(Full::new(Bytes::from_static(b"ZLPUSA")))
                    .unwrap(),
                "/private" => Response::builder()
                    .status(200)
                    .header("cache-control", "no-store")
                    .body(Full::new(Bytes::from_static(b"{}")))
                    .unwrap(),
                "/gone" => Response::builder()
                    .status(500)
                    .body(Full::new(Bytes::from_static(b"boom")))
                    .unwrap(),
                "/down" => return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
                _ => Response::builder()
                    .status(200)
                    .header("content-type", "application/json")
                    .body(Full::new(Bytes::from(format!("{{\"path\":\"{path}\"}}"))))
                    .unwrap(),
            };
            Ok(response)
        }
        .boxed()
    }
}

fn get(url: &str) -> Request<Bytes> {
    Request::builder().uri(url).body(Bytes::new()).unwrap()
}

async fn fetch(client: &CapturingClient<CannedClient>, url: &str) -> Option<Bytes> {
    let response = client.send(get(url)).await.ok()?;
    Some(response.into_body().collect().await.unwrap().to_bytes())
}

fn capturing_client() -> &'static CapturingClient<CannedClient> {
    static CLIENT: once_cell::sync::Lazy<CapturingClient<CannedClient>> =
        once_cell::sync::Lazy::new(|| CapturingClient::new(CannedClient));
    activate(&*CLIENT);
    &CLIENT
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn traffic_is_recorded_searchable_and_clearable() {
    configure(&NetworkConfig::default());
    let client = capturing_client();
    clear_records();

    fetch(client, "http://api.test/users").await.unwrap();
    fetch(client, "https://api.test/private").await.unwrap();
    fetch(client, "http://api.test/gone").await.unwrap();
    assert!(fetch(client, "http://api.test/down").await.is_none());

    let records = get_all_records();
    assert_eq!(records.len(), 4);
    let users = &records[0];
    assert_eq!(users.url, "http://api.test/users");
    assert_eq!(users.cache_policy, Some(CachePolicy::Allowed));
    assert_eq!(users.response_body.as_deref(), Some(&b"{\"path\":\"/users\"}"[..]));
    assert_eq!(find_record(users.id).unwrap().url, users.url);

    assert_eq!(records[1].cache_policy, Some(CachePolicy::NotAllowed));
    assert!(!records[2].is_success());
    assert_eq!(records[2].error().unwrap().description, "internal server error");
    assert!(!records[3].is_success());

    assert_eq!(search_records("USERS").len(), 1);
    assert_eq!(search_records("api.test").len(), 4);

    let server_errors = query_records(&RecordFilter {
        status_ranges: vec![StatusRange::SERVER_ERROR],
        ..RecordFilter::default()
    });
    assert_eq!(server_errors.len(), 1);

    let errors = query_records(&RecordFilter {
        only_errors: true,
        ..RecordFilter::default()
    });
    let error_urls: Vec<&str> = errors.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(error_urls, ["http://api.test/gone", "http://api.test/down"]);

    assert_eq!(clear_records(), 4);
    assert!(get_all_records().is_empty());
}

#[tokio::test]
#[serial]
async fn repeated_activation_is_a_noop() {
    let client = capturing_client();
    assert!(is_active());
    assert!(client.is_capturing());
    assert!(!activate(client));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn marked_responses_are_decrypted_before_storage() {
    configure(&NetworkConfig::default());
    let client = capturing_client();
    clear_records();
    set_decryption_enabled(true);
    register_decryptor(
        "/secret",
        Arc::new(|payload: &[u8]| -> Result<Vec<u8>, DecryptionError> {
            Ok(payload.iter().rev().map(|b| b.to_ascii_lowercase()).collect())
        }),
    );
    let mut events = subscribe_records();

    let body = fetch(client, "http://vault.test/secret").await.unwrap();
    assert_eq!(&body[..], b"ZLPUSA");

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    let StoreEvent::Inserted { id, .. } = event else {
        panic!("expected insert, got {event:?}");
    };
    let record = find_record(id).unwrap();
    assert!(record.is_encrypted());
    assert_eq!(record.response_body.as_deref(), Some(&b"ZLPUSA"[..]));
    assert_eq!(record.decrypted_response_body(), Some(&b"asuplz"[..]));

    set_decryption_enabled(false);
    clear_records();
}

#[tokio::test]
#[serial]
async fn filters_exclude_traffic() {
    configure(&NetworkConfig {
        ignored_urls: vec!["/users".into()],
        ..NetworkConfig::default()
    });
    let client = capturing_client();
    clear_records();

    fetch(client, "http://api.test/users").await.unwrap();
    fetch(client, "http://api.test/orders").await.unwrap();

    let records = get_all_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "http://api.test/orders");

    configure(&NetworkConfig::default());
    clear_records();
}
